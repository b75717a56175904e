//! # Text Extractor
//! Turns a raw conversation record into the ordered list of snippets that
//! get classified.
//!
//! Accepted shapes:
//! - plain string: a transcript, split into sentences and grouped in windows of 3
//! - object with a string `message`: one snippet
//! - object with a `Full Conversation` array: customer messages only
//!
//! Anything else yields no snippets, which the analyzer turns into the
//! neutral default. Extraction never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Hard cap on snippet length, in characters.
pub const MAX_SNIPPET_CHARS: usize = 1024;

const SENTENCE_WINDOW: usize = 3;
const MIN_SENTENCE_CHARS: usize = 10;
const MIN_WINDOW_CHARS: usize = 20;
const MIN_MESSAGE_CHARS: usize = 5;

const PREVIEW_MESSAGES: usize = 3;
const PREVIEW_CHARS: usize = 120;

static SENTENCE_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]").expect("sentence split regex"));

/// One bounded unit of text for the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet(String);

impl Snippet {
    /// Truncates to [`MAX_SNIPPET_CHARS`]; never rejects.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.chars().count() > MAX_SNIPPET_CHARS {
            Snippet(text.chars().take(MAX_SNIPPET_CHARS).collect())
        } else {
            Snippet(text)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single message of the `Full Conversation` shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadMessage {
    /// True when the sender field is absent or empty.
    pub from_customer: bool,
    pub text: String,
}

/// Parsed view of the three accepted input shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversation {
    Transcript(String),
    Message(String),
    Thread(Vec<ThreadMessage>),
    Unrecognized,
}

impl Conversation {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Conversation::Transcript(s.clone()),
            Value::Object(map) => {
                if let Some(Value::String(msg)) = map.get("message") {
                    return Conversation::Message(msg.clone());
                }
                let messages = match map.get("Full Conversation") {
                    Some(Value::Array(items)) => items.iter().map(thread_message).collect(),
                    _ => Vec::new(),
                };
                Conversation::Thread(messages)
            }
            _ => Conversation::Unrecognized,
        }
    }

    /// Snippets in input order. Empty is legal.
    pub fn snippets(&self) -> Vec<Snippet> {
        match self {
            Conversation::Transcript(text) => transcript_windows(text),
            Conversation::Message(msg) => {
                let msg = msg.trim();
                if char_len(msg) > MIN_MESSAGE_CHARS {
                    vec![Snippet::new(msg)]
                } else {
                    Vec::new()
                }
            }
            Conversation::Thread(messages) => messages
                .iter()
                .filter(|m| m.from_customer)
                .map(|m| m.text.trim())
                .filter(|t| char_len(t) > MIN_MESSAGE_CHARS)
                .map(Snippet::new)
                .collect(),
            Conversation::Unrecognized => Vec::new(),
        }
    }
}

fn thread_message(item: &Value) -> ThreadMessage {
    let from_customer = item.get("sender").map_or(true, is_falsy);
    let text = item
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    ThreadMessage {
        from_customer,
        text,
    }
}

/// Empty-ish sender values count as "no sender".
fn is_falsy(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn transcript_windows(text: &str) -> Vec<Snippet> {
    let sentences: Vec<&str> = SENTENCE_SPLIT
        .split(text)
        .map(str::trim)
        .filter(|s| char_len(s) > MIN_SENTENCE_CHARS)
        .collect();

    sentences
        .chunks(SENTENCE_WINDOW)
        .map(|w| w.join(" "))
        .filter(|w| char_len(w) > MIN_WINDOW_CHARS)
        .map(Snippet::new)
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Conversation identifier from `_id` or `id`, strings or numbers.
pub fn conversation_id(value: &Value) -> Option<String> {
    ["_id", "id"].iter().find_map(|k| match value.get(*k) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Short preview of the customer side for the review dashboard.
pub fn message_preview(value: &Value) -> String {
    let messages: &[Value] = match value.get("Full Conversation") {
        Some(Value::Array(items)) => items.as_slice(),
        _ => {
            if let Some(Value::String(msg)) = value.get("message") {
                return truncate_chars(msg.trim(), PREVIEW_CHARS);
            }
            &[]
        }
    };

    let customer: Vec<&str> = messages
        .iter()
        .filter(|m| m.get("sender").map_or(true, is_falsy))
        .filter_map(|m| m.get("message").and_then(Value::as_str))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .take(PREVIEW_MESSAGES)
        .collect();

    if !customer.is_empty() {
        return truncate_chars(&customer.join(" | "), PREVIEW_CHARS);
    }

    if let Some(first) = messages.first() {
        let msg = first.get("message").and_then(Value::as_str).unwrap_or("");
        return truncate_chars(msg, PREVIEW_CHARS);
    }

    "(no messages)".to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
