//! Prompt construction: the Korean expert-role analysis prompt and the
//! short re-query prompt, both fed to the same [`crate::model::ModelEngine`].
//!
//! Grounded on the external-interfaces contract's prompt format
//! description and `gemma_summarizer.py`'s re-query flow (an in-context
//! "원본: ..." example plus the prior summary, asking only for a
//! noun-phrase re-summary with no JSON required).

/// Builds the primary analysis prompt: a Korean expert-role instruction
/// asking for `{summary, keyword, paragraphs}` fenced as ```json, with
/// the ≤25-char noun-phrase summary rule, the three-keyword rule, the
/// 2-3 paragraph rule, and the five canonical sentiment tokens spelled
/// out.
pub fn build_analysis_prompt(conversation: &str) -> String {
    format!(
        r#"당신은 상담 통화 내용을 분석하는 전문가입니다. 아래 대화 내용을 분석하여 다음 JSON 형식으로만 응답하세요.

요구사항:
- summary: 전체 통화 내용을 25자 이내의 명사형 어구로 요약 (예: "환불 안내", "계좌 확인")
- keyword: 핵심 키워드 3개를 쉼표로 구분
- paragraphs: 대화를 2~3개 문단으로 나누어 각 문단마다 summary, keyword, sentiment를 작성
- sentiment는 다음 5개 중 하나만 사용: 강한긍정, 약한긍정, 보통, 약한부정, 강한부정

출력 형식:
```json
{{
  "summary": "...",
  "keyword": "...",
  "paragraphs": [
    {{"summary": "...", "keyword": "...", "sentiment": "보통"}}
  ]
}}
```

대화 내용:
{conversation}"#
    )
}

/// Builds the short re-query prompt used when a summary trips the
/// length gate: one in-context example plus the prior summary, asking
/// for a brief noun-phrase re-summary. No JSON fencing — the worker
/// applies only `postprocess::apply_noun_form_only` to the raw result.
pub fn build_requery_prompt(previous_summary: &str) -> String {
    format!(
        r#"다음 요약을 25자 이내의 간결한 명사형 어구로 다시 요약하세요.

원본: "고객이 환불 절차와 필요 서류에 대해 문의하였고 상담원이 환불 신청 방법과 처리 기간을 안내해드렸습니다"
요약: 환불 절차 안내

원본: "{previous_summary}"
요약:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_prompt_contains_the_conversation_and_the_schema() {
        let prompt = build_analysis_prompt("나 > 안녕하세요\n상대방 > 네 안녕하세요");
        assert!(prompt.contains("```json"));
        assert!(prompt.contains("paragraphs"));
        assert!(prompt.contains("강한긍정"));
        assert!(prompt.contains("나 > 안녕하세요"));
    }

    #[test]
    fn requery_prompt_embeds_the_previous_summary_and_requests_no_json() {
        let prompt = build_requery_prompt("환불을 안내해드렸습니다");
        assert!(prompt.contains("환불을 안내해드렸습니다"));
        assert!(!prompt.contains("```json"));
    }
}
