//! Pulling JSON out of free-form model replies.
//!
//! Models wrap JSON in markdown fences or chatter around it. These helpers
//! strip fences and slice out the outermost object or array.

use serde::de::DeserializeOwned;

use crate::error::{AdapterError, Result};

pub fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    clean.strip_suffix("```").unwrap_or(clean).trim()
}

fn fragment(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start <= end).then(|| &text[start..=end])
}

/// Parse the outermost `{...}` in `text`.
pub fn json_object<T: DeserializeOwned>(text: &str) -> Result<T> {
    let clean = strip_markdown_fences(text);
    let body = fragment(clean, '{', '}')
        .ok_or_else(|| AdapterError::Malformed("no JSON object in reply".to_string()))?;
    Ok(serde_json::from_str(body)?)
}

/// Parse the outermost `[...]` in `text`.
pub fn json_array<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let clean = strip_markdown_fences(text);
    let body = fragment(clean, '[', ']')
        .ok_or_else(|| AdapterError::Malformed("no JSON array in reply".to_string()))?;
    Ok(serde_json::from_str(body)?)
}

/// A bare `null` reply, meaning the model had nothing to offer.
pub fn is_null_reply(text: &str) -> bool {
    strip_markdown_fences(text).eq_ignore_ascii_case("null")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        ok: bool,
    }

    #[test]
    fn test_strips_fences_and_chatter() {
        let reply = "Sure! Here you go:\n```json\n{\"ok\": true}\n```";
        let parsed: Reply = json_object(reply).unwrap();
        assert_eq!(parsed, Reply { ok: true });
    }

    #[test]
    fn test_arrays_inside_prose() {
        let values: Vec<u32> = json_array("The ids are [1, 2, 3].").unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_json_is_malformed() {
        let err = json_object::<Reply>("I cannot help with that").unwrap_err();
        assert!(matches!(err, AdapterError::Malformed(_)));
        assert!(json_array::<u32>("nothing").is_err());
    }

    #[test]
    fn test_null_reply_detection() {
        assert!(is_null_reply(" null "));
        assert!(is_null_reply("```\nNULL\n```"));
        assert!(!is_null_reply("{\"title\": null}"));
    }
}
