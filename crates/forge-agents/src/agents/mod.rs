//! Planning agents: turn the request into a scope, the scope into
//! an architecture, and the architecture into an ordered file plan.
//!
//! Both model-backed stages degrade to a default value when the model
//! errors or returns unparseable output; the pipeline never stops here.

pub mod architect;
pub mod strategist;

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

pub use architect::{file_plan, Architecture, Service};
pub use strategist::ProjectScope;

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-zA-Z]*\s*\n?(.*?)```").unwrap());

/// The JSON object embedded in a model reply: fenced block contents if
/// present, then the span from the first `{` to the last `}`.
pub fn extract_json(raw: &str) -> Option<&str> {
    let text = FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map_or(raw, |m| m.as_str());
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a stage reply into `T`.
pub fn parse_reply<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let json = extract_json(raw).ok_or_else(|| "no JSON object in reply".to_string())?;
    serde_json::from_str(json).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_extract_json_fenced_with_prose() {
        let raw = "Here you go:\n```json\n{\"a\": {\"b\": 2}}\n```\nThanks";
        assert_eq!(extract_json(raw), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn test_extract_json_none() {
        assert_eq!(extract_json("no braces here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_parse_reply_reports_error() {
        let err = parse_reply::<ProjectScope>("{not json}").unwrap_err();
        assert!(!err.is_empty());
    }
}
