//! Structured-output parsing of model responses.
//!
//! Models frequently wrap JSON answers in Markdown code fences even when told
//! not to. Parsing strips a single leading fence marker (optionally tagged
//! `json`) and a single trailing one, then requires strict JSON. On failure
//! the caller gets a corrective re-prompt quoting the raw text verbatim.

use serde::de::DeserializeOwned;

/// Corrective re-prompt synthesized from an unparsable response.
///
/// Pure data; executing it (sending it back to the model) is the caller's job.
#[derive(Debug, Clone)]
pub struct RepairPrompt {
    /// The raw model output that failed to parse, verbatim.
    pub raw: String,
    /// Why parsing failed.
    pub parse_error: String,
}

impl RepairPrompt {
    /// Render the follow-up prompt sent back to the model.
    pub fn to_message(&self) -> String {
        format!(
            "Your previous response was not valid JSON.\n\
             Parse error: {}\n\n\
             Previous response:\n{}\n\n\
             Respond again with ONLY a strict JSON object. \
             No explanation, no Markdown, no code fences.",
            self.parse_error, self.raw
        )
    }
}

/// Strip one leading and one trailing Markdown code-fence marker.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop an optional language tag on the fence line.
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.trim_start_matches(['\r', '\n']).trim_start();
    }

    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }

    text
}

/// Parse a model response into `T`, tolerating code-fence wrapping.
///
/// On failure returns the corrective [`RepairPrompt`] instead of an error type,
/// because a parse failure is a retry signal, not a fault.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, Box<RepairPrompt>> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(cleaned).map_err(|e| {
        Box::new(RepairPrompt {
            raw: raw.to_string(),
            parse_error: e.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_plain_json_parses() {
        let v: Value = parse_structured(r#"{"sceneName": "S"}"#).unwrap();
        assert_eq!(v["sceneName"], "S");
    }

    #[test]
    fn test_fenced_json_parses() {
        let v: Value = parse_structured("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(v["a"], 1);

        let v: Value = parse_structured("```\n{\"a\": 2}\n```").unwrap();
        assert_eq!(v["a"], 2);
    }

    #[test]
    fn test_strip_is_single_layer() {
        // Only one fence layer is stripped; a double-fenced body stays broken.
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("{}"), "{}");
    }

    #[test]
    fn test_repair_prompt_quotes_raw_verbatim() {
        let raw = "Sure! Here is the JSON you asked for:\n{\"sceneName\": oops}";
        let err = parse_structured::<Value>(raw).unwrap_err();
        assert_eq!(err.raw, raw);
        assert!(err.to_message().contains(raw));
        assert!(err.to_message().contains("ONLY a strict JSON object"));
    }

    #[test]
    fn test_trailing_prose_fails() {
        let result = parse_structured::<Value>("{\"a\": 1} trailing words");
        assert!(result.is_err());
    }
}
