//! Wire types for the request and response JSON payloads carried in slot
//! payload bytes, and for the LLM artifact itself.
//!
//! Field naming follows the wire contract verbatim (including the
//! lowercase `transactionid`/`sequenceno`/`returncode` spellings) rather
//! than idiomatic Rust naming, the same tradeoff `ai/types.rs` makes for
//! `NativeToolSpec` ("must NOT use rename_all = camelCase... matches the
//! wire format").

use serde::{Deserialize, Serialize};

/// One segment of a raw STT transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttSegment {
    pub transcript: String,
    #[serde(rename = "recType")]
    pub rec_type: i32,
}

/// Request payload, accepted in either of the two shapes from the
/// external interfaces contract: pre-transcribed (`text` present) or raw
/// STT (`sttResultList` present).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPayload {
    pub request_id: String,
    #[serde(default)]
    pub transactionid: String,
    #[serde(default)]
    pub sequenceno: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "sttResultList", skip_serializing_if = "Option::is_none")]
    pub stt_result_list: Option<Vec<SttSegment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// Canonical sentiment token. Unknown inputs normalize to `Neutral`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    #[serde(rename = "강한긍정")]
    StrongPositive,
    #[serde(rename = "약한긍정")]
    WeakPositive,
    #[serde(rename = "보통")]
    Neutral,
    #[serde(rename = "약한부정")]
    WeakNegative,
    #[serde(rename = "강한부정")]
    StrongNegative,
}

impl Default for Sentiment {
    fn default() -> Self {
        Sentiment::Neutral
    }
}

/// Normalizes any input token to one of the five canonical sentiment
/// values, per the mapping table. Unknown tokens map to `Neutral`.
pub fn normalize_sentiment(input: &str) -> Sentiment {
    match input {
        "강한긍정" => Sentiment::StrongPositive,
        "약한긍정" | "긍정" | "만족" | "신남" => Sentiment::WeakPositive,
        "보통" | "중립" => Sentiment::Neutral,
        "약한부정" | "부정" | "불만" | "우려" => Sentiment::WeakNegative,
        "강한부정" | "화남" => Sentiment::StrongNegative,
        _ => Sentiment::Neutral,
    }
}

/// One paragraph-level summary within an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub summary: String,
    pub keyword: String,
    pub sentiment: Sentiment,
}

impl Paragraph {
    /// The substitute used when `paragraphs` is empty or missing.
    pub fn default_placeholder() -> Self {
        Self {
            summary: "요약이 불가능한 내용입니다.".to_string(),
            keyword: String::new(),
            sentiment: Sentiment::Neutral,
        }
    }
}

/// The typed LLM artifact returned inside `response.summary` on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Artifact {
    pub summary: String,
    pub keyword: String,
    pub paragraphs: Vec<Paragraph>,
}

impl Artifact {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// The `response` object nested inside the top-level envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseBody {
    pub result: String,
    #[serde(rename = "failReason")]
    pub fail_reason: String,
    pub summary: serde_json::Value,
}

impl ResponseBody {
    pub fn success(artifact: Artifact) -> Self {
        Self {
            result: "0".to_string(),
            fail_reason: String::new(),
            summary: serde_json::to_value(artifact).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            result: "1".to_string(),
            fail_reason: reason.into(),
            summary: serde_json::Value::String(String::new()),
        }
    }
}

/// Top-level response envelope written back into the slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub transactionid: String,
    pub sequenceno: String,
    pub returncode: String,
    pub returndescription: String,
    pub response: ResponseBody,
}

impl ResponseEnvelope {
    pub fn new(transactionid: String, sequenceno: String, body: ResponseBody) -> Self {
        Self {
            transactionid,
            sequenceno,
            returncode: "1".to_string(),
            returndescription: "Success".to_string(),
            response: body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_normalization_covers_every_input_to_one_of_five() {
        let canonical = [
            Sentiment::StrongPositive,
            Sentiment::WeakPositive,
            Sentiment::Neutral,
            Sentiment::WeakNegative,
            Sentiment::StrongNegative,
        ];
        for input in [
            "강한긍정", "약한긍정", "보통", "약한부정", "강한부정", "긍정", "만족", "신남",
            "부정", "불만", "우려", "중립", "화남", "garbage-token",
        ] {
            assert!(canonical.contains(&normalize_sentiment(input)));
        }
    }

    #[test]
    fn request_payload_accepts_pre_transcribed_shape() {
        let json = r#"{"request_id":"r1","transactionid":"t1","sequenceno":"1","text":"hello"}"#;
        let parsed: RequestPayload = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.text.as_deref(), Some("hello"));
        assert!(parsed.stt_result_list.is_none());
    }

    #[test]
    fn request_payload_accepts_raw_stt_shape() {
        let json = r#"{"request_id":"r1","sttResultList":[{"transcript":"hi","recType":4}]}"#;
        let parsed: RequestPayload = serde_json::from_str(json).unwrap();
        assert!(parsed.text.is_none());
        assert_eq!(parsed.stt_result_list.unwrap().len(), 1);
    }

    #[test]
    fn response_failure_has_empty_string_summary() {
        let body = ResponseBody::failure("boom");
        assert_eq!(body.summary, serde_json::Value::String(String::new()));
        assert_eq!(body.result, "1");
    }
}
