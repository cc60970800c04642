//! Response post-processing (C8): the pass applied to a freshly
//! extracted [`Artifact`] before it becomes a response, and again (in a
//! reduced form) after the re-query loop's noun-form rewrite.
//!
//! Grounded on `ResponsePostprocessor`: example-leakage filtering,
//! whitespace collapse, the 120-byte length gate (spec supersedes the
//! source's 80-byte threshold), keyword dedupe/cap/rejoin, paragraph
//! best-sentence scoring, and the sentiment canonicalization table.
//! Verb-to-noun rewriting has no surviving source table to port — it is
//! authored here as an ordered `LazyLock<Regex>` table in the same style
//! `response_cleaning.rs` uses for its own ordered pattern list.

use std::sync::LazyLock;

use regex::Regex;

use crate::protocol::{normalize_sentiment, Artifact, Paragraph};

pub const LENGTH_GATE_PREFIX: &str = "[재질의 필요] ";
const MAX_SUMMARY_BYTES: usize = 120;
const MAX_KEYWORDS: usize = 5;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static SUMMARY_EXAMPLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)예시.*내용",
        r"(?i)샘플.*내용",
        r"(?i)테스트.*내용",
        r"(?i)출력.*예시",
        r"(?i)분석.*규칙",
        r"(?i)출력.*형식",
        r"(?i)```json",
        r"(?i)```",
        r"(?i)JSON.*형식",
        r"(?i)다음.*형식",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static PARAGRAPH_EXAMPLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)예시.*내용",
        r"(?i)샘플.*내용",
        r"(?i)테스트.*내용",
        r"(?i)출력.*예시",
        r"(?i)분석.*규칙",
        r"(?i)출력.*형식",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// Splits text into sentences, keeping the terminating punctuation with
/// the sentence it closes. `regex` has no lookbehind, so this is a plain
/// character scan rather than the source's `re.split(r'(?<=[.!?])\s+')`.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        if SENTENCE_TERMINATORS.contains(&ch) {
            while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                chars.next();
            }
            sentences.push(current.trim().to_string());
            current.clear();
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }
    sentences
}

const POSITIVE_KEYWORDS: &[&str] = &["문의", "답변", "안내", "설명", "처리", "해결", "확인", "검토", "분석"];
const ACTION_WORDS: &[&str] = &[
    "문의", "답변", "안내", "설명", "처리", "해결", "확인", "검토", "분석", "제공", "발급", "이용",
];
const NEGATIVE_WORDS: &[&str] = &["불가능", "불가", "오류", "실패", "문제"];

/// Ordered verb-to-noun rewrite table applied to a summary so it reads
/// as a noun phrase rather than a full sentence, used both by the
/// length-gate pass and, alone, by the re-query loop. Longer/more
/// specific endings are listed before their shorter substrings so the
/// first match wins.
static NOUN_FORM_TABLE: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"안내해드렸습니다\.?$").unwrap(), "안내"),
        (Regex::new(r"안내드렸습니다\.?$").unwrap(), "안내"),
        (Regex::new(r"안내하였습니다\.?$").unwrap(), "안내"),
        (Regex::new(r"안내합니다\.?$").unwrap(), "안내"),
        (Regex::new(r"확인해드렸습니다\.?$").unwrap(), "확인"),
        (Regex::new(r"확인하였습니다\.?$").unwrap(), "확인"),
        (Regex::new(r"확인했습니다\.?$").unwrap(), "확인"),
        (Regex::new(r"확인합니다\.?$").unwrap(), "확인"),
        (Regex::new(r"처리해드렸습니다\.?$").unwrap(), "처리"),
        (Regex::new(r"처리하였습니다\.?$").unwrap(), "처리"),
        (Regex::new(r"처리했습니다\.?$").unwrap(), "처리"),
        (Regex::new(r"처리합니다\.?$").unwrap(), "처리"),
        (Regex::new(r"설명해드렸습니다\.?$").unwrap(), "설명"),
        (Regex::new(r"설명하였습니다\.?$").unwrap(), "설명"),
        (Regex::new(r"설명했습니다\.?$").unwrap(), "설명"),
        (Regex::new(r"해결해드렸습니다\.?$").unwrap(), "해결"),
        (Regex::new(r"해결하였습니다\.?$").unwrap(), "해결"),
        (Regex::new(r"해결했습니다\.?$").unwrap(), "해결"),
        (Regex::new(r"답변해드렸습니다\.?$").unwrap(), "답변"),
        (Regex::new(r"답변하였습니다\.?$").unwrap(), "답변"),
        (Regex::new(r"답변했습니다\.?$").unwrap(), "답변"),
        (Regex::new(r"발급해드렸습니다\.?$").unwrap(), "발급"),
        (Regex::new(r"발급하였습니다\.?$").unwrap(), "발급"),
        (Regex::new(r"되었습니다\.?$").unwrap(), "됨"),
        (Regex::new(r"됩니다\.?$").unwrap(), "됨"),
        (Regex::new(r"했습니다\.?$").unwrap(), ""),
        (Regex::new(r"합니다\.?$").unwrap(), ""),
    ]
});

/// Rewrites a trailing verb ending to its noun form, e.g.
/// "환불을 안내해드렸습니다" -> "환불 안내". Idempotent: once no table
/// entry matches, the text is returned unchanged, so a second call is a
/// no-op (`noun_form(noun_form(x)) == noun_form(x)`).
pub fn to_noun_form(text: &str) -> String {
    for (pattern, replacement) in NOUN_FORM_TABLE.iter() {
        if pattern.is_match(text) {
            let rewritten = pattern.replace(text, *replacement);
            return rewritten.trim().to_string();
        }
    }
    text.to_string()
}

fn matches_any(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Scores and picks the single best sentence by length band, positive
/// keyword presence, action-verb count, and a penalty for negative
/// tokens. Ties resolve to the first-seen sentence via stable `max_by_key`.
fn select_best_sentence(sentences: &[String]) -> String {
    if sentences.is_empty() {
        return String::new();
    }
    if sentences.len() == 1 {
        return sentences[0].clone();
    }

    sentences
        .iter()
        .map(|sentence| {
            let mut score = 0i32;
            let length = sentence.trim().chars().count();
            score += if (10..=50).contains(&length) {
                3
            } else if (5..=80).contains(&length) {
                2
            } else {
                1
            };

            if POSITIVE_KEYWORDS.iter().any(|k| sentence.contains(k)) {
                score += 2;
            }
            score += ACTION_WORDS.iter().filter(|w| sentence.contains(*w)).count() as i32;
            score -= NEGATIVE_WORDS.iter().filter(|w| sentence.contains(*w)).count() as i32;

            (sentence.clone(), score)
        })
        .fold(None::<(String, i32)>, |best, candidate| match best {
            Some((_, best_score)) if best_score >= candidate.1 => best,
            _ => Some(candidate),
        })
        .map(|(sentence, _)| sentence)
        .unwrap_or_default()
}

/// Applies the example-leakage filter, whitespace collapse, and the
/// 120-byte length gate to a top-level summary. Already-gated summaries
/// (carrying the prefix) pass through unchanged, making the gate
/// idempotent under repeated application.
pub fn process_summary(value: &str) -> String {
    if value.is_empty() {
        return "요약이 불가능한 내용입니다.".to_string();
    }
    if value.starts_with(LENGTH_GATE_PREFIX) {
        return value.to_string();
    }
    if matches_any(&SUMMARY_EXAMPLE_PATTERNS, value) {
        return "요약 없음".to_string();
    }

    let cleaned = collapse_whitespace(value);
    let rewritten = collapse_whitespace(&to_noun_form(&cleaned));
    if rewritten.len() > MAX_SUMMARY_BYTES {
        format!("{LENGTH_GATE_PREFIX}{rewritten}")
    } else {
        rewritten
    }
}

/// Strips the length-gate prefix and applies only the noun-form
/// rewrite, per the re-query contract: the result must not re-trigger
/// the length gate on its next pass through `process_summary`.
pub fn apply_noun_form_only(value: &str) -> String {
    let stripped = value
        .strip_prefix(LENGTH_GATE_PREFIX)
        .unwrap_or(value)
        .trim();
    to_noun_form(stripped)
}

/// Splits a comma-joined or already-listed keyword string into at most
/// [`MAX_KEYWORDS`] deduplicated entries, rejoined with `", "`.
pub fn process_keywords(value: &str) -> String {
    if value.is_empty() {
        return "키워드 없음".to_string();
    }

    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for raw in value.split(',') {
        let kw = raw.trim();
        if kw.is_empty() {
            continue;
        }
        if seen.insert(kw.to_string()) {
            unique.push(kw.to_string());
            if unique.len() == MAX_KEYWORDS {
                break;
            }
        }
    }

    if unique.is_empty() {
        "키워드 없음".to_string()
    } else {
        unique.join(", ")
    }
}

fn process_paragraph_summary(summary: &str) -> String {
    if summary.is_empty() {
        return "문단 요약 없음".to_string();
    }
    if matches_any(&PARAGRAPH_EXAMPLE_PATTERNS, summary) {
        return "문단 요약 없음".to_string();
    }

    let cleaned = collapse_whitespace(summary);
    let sentences: Vec<String> = split_sentences(&cleaned)
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();

    let best = if sentences.is_empty() {
        cleaned
    } else {
        select_best_sentence(&sentences)
    };
    to_noun_form(&best)
}

fn process_paragraph_keyword(keyword: &str) -> String {
    if keyword.is_empty() {
        return "키워드 없음".to_string();
    }
    collapse_whitespace(keyword)
}

const MAX_PARAGRAPHS: usize = 3;

/// Post-processes every paragraph, capped at [`MAX_PARAGRAPHS`] entries:
/// summary best-sentence selection plus noun-form rewrite (no length
/// gate — paragraph summaries are exempt), keyword cleanup (uncapped,
/// unlike the top-level keyword field), and sentiment canonicalization.
pub fn process_paragraphs(paragraphs: &[Paragraph]) -> Vec<Paragraph> {
    paragraphs
        .iter()
        .take(MAX_PARAGRAPHS)
        .map(|p| Paragraph {
            summary: process_paragraph_summary(&p.summary),
            keyword: process_paragraph_keyword(&p.keyword),
            sentiment: normalize_sentiment(&sentiment_to_str(p.sentiment)),
        })
        .collect()
}

fn sentiment_to_str(sentiment: crate::protocol::Sentiment) -> String {
    use crate::protocol::Sentiment::*;
    match sentiment {
        StrongPositive => "강한긍정",
        WeakPositive => "약한긍정",
        Neutral => "보통",
        WeakNegative => "약한부정",
        StrongNegative => "강한부정",
    }
    .to_string()
}

/// Full post-processing pass over a freshly extracted artifact: summary
/// gate, keyword cap, and per-paragraph cleanup. When `paragraphs` ends
/// up empty after filtering, one placeholder paragraph stands in so
/// downstream consumers always see at least one entry.
pub fn process_artifact(artifact: Artifact) -> Artifact {
    let paragraphs = process_paragraphs(&artifact.paragraphs);
    Artifact {
        summary: process_summary(&artifact.summary),
        keyword: process_keywords(&artifact.keyword),
        paragraphs: if paragraphs.is_empty() {
            vec![Paragraph::default_placeholder()]
        } else {
            paragraphs
        },
    }
}
