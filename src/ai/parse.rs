//! Best-effort extraction of structured content from model output.
//!
//! Models are asked to return JSON but routinely wrap it in markdown fences
//! or prose. Extraction tries, in order: the whole text, the first fenced
//! code block, the first brace-delimited span. If nothing parses the raw
//! text is returned as a JSON string and the caller decides what to do.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Normalizes raw model output into a `serde_json::Value`.
pub fn extract_json(text: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return value;
    }
    if let Some(block) = fenced_block(text) {
        if let Ok(value) = serde_json::from_str::<Value>(block.trim()) {
            return value;
        }
    }
    if let Some(span) = brace_span(text) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            return value;
        }
    }
    Value::String(text.to_string())
}

/// Content of the first ```json (or plain ```) fenced block, if any.
fn fenced_block(text: &str) -> Option<&str> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let re = FENCE
        .get_or_init(|| Regex::new(r"(?is)```(?:json)?\s*(.*?)```").expect("fence regex"));
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// The span from the first `{` to the last `}`, covering JSON objects
/// embedded in prose.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_json_object() {
        let value = extract_json(r#"{"title": "Capitals", "questions": []}"#);
        assert_eq!(value["title"], "Capitals");
    }

    #[test]
    fn parses_bare_json_array() {
        let value = extract_json(r#"[{"title": "Overview", "description": "ok"}]"#);
        assert_eq!(value[0]["title"], "Overview");
    }

    #[test]
    fn parses_fenced_json_with_language_tag() {
        let text = "Here is the quiz you asked for:\n```json\n{\"title\": \"Rivers\"}\n```\nEnjoy!";
        assert_eq!(extract_json(text), json!({"title": "Rivers"}));
    }

    #[test]
    fn parses_fenced_json_without_language_tag() {
        let text = "```\n[1, 2, 3]\n```";
        assert_eq!(extract_json(text), json!([1, 2, 3]));
    }

    #[test]
    fn parses_object_embedded_in_prose() {
        let text = "Sure! The result is {\"score\": 5} as requested.";
        assert_eq!(extract_json(text), json!({"score": 5}));
    }

    #[test]
    fn unparsable_text_comes_back_as_string() {
        let text = "I could not produce JSON this time, sorry.";
        assert_eq!(extract_json(text), Value::String(text.to_string()));
    }

    #[test]
    fn broken_fence_falls_through_to_brace_span() {
        let text = "```json\nnot json at all\n``` but later {\"ok\": true} appears";
        assert_eq!(extract_json(text), json!({"ok": true}));
    }
}
