//! STT transcript preprocessing: speaker-tagging, text cleaning, and the
//! consecutive-line dedup/merge/filler-removal pass applied before a raw
//! STT transcript is handed to the prompt builder.
//!
//! Grounded on `STTPreprocessor`: `recType` 4 is the agent's own channel
//! ("나"), 2 is the counterparty ("상대방"), anything else becomes
//! `화자{n}`. The dedup pass is a single forward scan, not a generic
//! dedup-by-set, so that merges replace the previous line in place
//! rather than reordering the conversation.

use std::sync::LazyLock;

use regex::Regex;

use crate::protocol::SttSegment;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DISALLOWED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s가-힣.,!?()\-:]").unwrap());

const FILLER_WORDS: &[&str] = &["네", "아", "음", "어", "그", "응", "yes", "no", "ok"];

/// Sentinel rendered when a request's `sttResultList` is empty.
pub const EMPTY_CONVERSATION: &str = "대화 내용이 없습니다.";

/// Collapses whitespace runs and strips characters outside the allowed
/// class (word chars, whitespace, Hangul syllables, and a small set of
/// punctuation).
pub fn clean_text(text: &str) -> String {
    let collapsed = WHITESPACE.replace_all(text.trim(), " ");
    DISALLOWED_CHARS.replace_all(&collapsed, "").into_owned()
}

fn speaker_for(rec_type: i32) -> String {
    match rec_type {
        4 => "나".to_string(),
        2 => "상대방".to_string(),
        other => format!("화자{other}"),
    }
}

/// One speaker-tagged conversation line (`"{speaker} > {text}"` once
/// rendered).
#[derive(Debug, Clone, PartialEq)]
struct Line {
    speaker: String,
    text: String,
}

impl Line {
    fn render(&self) -> String {
        format!("{} > {}", self.speaker, self.text)
    }
}

/// Drops exact consecutive repeats, short filler repeats from the same
/// speaker, and merges same-speaker lines that are substrings of each
/// other by replacing the previous line in place with the longer text —
/// never appending a new line for a merge.
fn remove_duplicates(lines: Vec<Line>) -> Vec<Line> {
    let mut cleaned: Vec<Line> = Vec::new();
    let mut prev_speaker: Option<String> = None;
    let mut prev_text: Option<String> = None;

    for line in lines {
        let text = line.text.trim().to_string();
        if text.is_empty() {
            continue;
        }

        if prev_speaker.as_deref() == Some(line.speaker.as_str()) {
            let prev = prev_text.as_deref().unwrap_or("");

            if text == prev {
                continue;
            }
            if text.chars().count() <= 3 && FILLER_WORDS.contains(&text.as_str()) {
                continue;
            }
            if !prev.is_empty() && (prev.contains(&text) || text.contains(prev)) {
                if text.len() > prev.len() {
                    if let Some(last) = cleaned.last_mut() {
                        *last = Line {
                            speaker: line.speaker.clone(),
                            text: text.clone(),
                        };
                    }
                }
                prev_text = Some(text);
                prev_speaker = Some(line.speaker);
                continue;
            }
        }

        prev_speaker = Some(line.speaker.clone());
        prev_text = Some(text.clone());
        cleaned.push(Line {
            speaker: line.speaker,
            text,
        });
    }

    cleaned
}

/// Renders a raw STT segment list into the `"{speaker} > {text}"` block
/// handed to the prompt builder, applying speaker-tagging, text
/// cleaning, and the dedup/merge pass in order.
pub fn preprocess_stt_result(segments: &[SttSegment]) -> String {
    if segments.is_empty() {
        return EMPTY_CONVERSATION.to_string();
    }

    let mut lines = Vec::with_capacity(segments.len());
    for segment in segments {
        let transcript = segment.transcript.trim();
        if transcript.is_empty() {
            continue;
        }
        let cleaned = clean_text(transcript);
        if cleaned.is_empty() {
            continue;
        }
        lines.push(Line {
            speaker: speaker_for(segment.rec_type),
            text: cleaned,
        });
    }

    let deduped = remove_duplicates(lines);
    deduped
        .iter()
        .map(Line::render)
        .collect::<Vec<_>>()
        .join("\n")
}
