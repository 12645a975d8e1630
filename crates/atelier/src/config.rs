//! Engine configuration

use serde::{Deserialize, Serialize};

/// Knobs for how tool results are rendered back to the model.
///
/// These only shape the payload returned to the model; the tree is never
/// altered by them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix each `view` line with its 1-based number and a tab
    pub number_view_lines: bool,
    /// Maximum size of a `view` payload in bytes (`None` = unlimited)
    pub max_view_bytes: Option<u64>,
}

impl EngineConfig {
    /// Parse a config from JSON, filling omitted fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

const TRUNCATION_MARKER: &str = "\n... [output truncated] ...\n";

/// Cut `text` to at most `limit` bytes on a char boundary, appending a marker
/// when anything was dropped.
pub(crate) fn truncate_output(text: String, limit: Option<u64>) -> (String, bool) {
    let Some(limit) = limit else {
        return (text, false);
    };
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    if text.len() <= limit {
        return (text, false);
    }

    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = text[..end].to_string();
    truncated.push_str(TRUNCATION_MARKER);
    (truncated, true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(!config.number_view_lines);
        assert_eq!(config.max_view_bytes, None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"number_view_lines": true}"#).unwrap();
        assert!(config.number_view_lines);
        assert_eq!(config.max_view_bytes, None);

        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_truncate_unlimited() {
        let (out, truncated) = truncate_output("hello".to_string(), None);
        assert_eq!(out, "hello");
        assert!(!truncated);
    }

    #[test]
    fn test_truncate_under_limit() {
        let (out, truncated) = truncate_output("hello".to_string(), Some(5));
        assert_eq!(out, "hello");
        assert!(!truncated);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // "é" is two bytes; a limit of 2 lands inside it
        let (out, truncated) = truncate_output("aé".to_string(), Some(2));
        assert!(truncated);
        assert!(out.starts_with('a'));
        assert!(!out.starts_with("aé"));
        assert!(out.contains("[output truncated]"));
    }
}
