use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, warn};

use super::error::PipelineError;
use crate::data::ProjectDocument;

/// Characters of the failing span kept for diagnostics. Generator failures are
/// usually truncations, so the tail says the most.
const DIAGNOSTIC_TAIL_CHARS: usize = 100;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:[A-Za-z0-9_+-]*\r?\n)?").expect("valid regex"))
}

/// Turns raw generator output into a validated [`ProjectDocument`].
pub struct ResponseExtractor;

impl ResponseExtractor {
    /// Extracts the project document embedded in `raw`.
    ///
    /// Steps: drop code fences, keep the span from the first `{` to the last `}`,
    /// parse it, then check the document shape.
    pub fn extract(raw: &str) -> Result<ProjectDocument, PipelineError> {
        let cleaned = Self::strip_fences(raw);
        let span = Self::isolate_document(&cleaned).ok_or(PipelineError::MalformedResponse)?;

        debug!(raw_length = raw.len(), cleaned_length = span.len(), "Isolated response document");

        let value: Value = serde_json::from_str(span).map_err(|e| {
            let tail = tail_chars(span, DIAGNOSTIC_TAIL_CHARS);
            warn!(error = %e, tail = %tail, "Response is not valid JSON, content might be truncated");
            PipelineError::ParseError { tail }
        })?;

        Self::validate(&value)?;

        serde_json::from_value(value).map_err(|e| PipelineError::SchemaViolation(e.to_string()))
    }

    /// Removes every triple-backtick fence marker. A language tag is removed only
    /// when it ends the line, as on an opening fence.
    pub fn strip_fences(raw: &str) -> String {
        fence_re().replace_all(raw, "").into_owned()
    }

    /// Returns the inclusive span between the first `{` and the last `}`.
    pub fn isolate_document(text: &str) -> Option<&str> {
        let first = text.find('{')?;
        let last = text.rfind('}')?;
        if last < first {
            return None;
        }
        Some(&text[first..=last])
    }

    fn validate(value: &Value) -> Result<(), PipelineError> {
        if !value.get("metadata").is_some_and(Value::is_object) {
            return Err(PipelineError::SchemaViolation(
                "missing 'metadata' object".to_string(),
            ));
        }

        let files = value
            .get("files")
            .and_then(Value::as_array)
            .ok_or_else(|| PipelineError::SchemaViolation("missing 'files' array".to_string()))?;

        for (idx, file) in files.iter().enumerate() {
            if !file.is_object() {
                return Err(PipelineError::SchemaViolation(format!(
                    "files[{}] is not an object",
                    idx
                )));
            }

            for field in ["path", "content"] {
                match file.get(field).and_then(Value::as_str) {
                    Some(s) if !s.is_empty() => {}
                    _ => {
                        return Err(PipelineError::SchemaViolation(format!(
                            "files[{}].{} must be a non-empty string",
                            idx, field
                        )));
                    }
                }
            }

            match file.get("description") {
                None | Some(Value::Null) | Some(Value::String(_)) => {}
                Some(_) => {
                    return Err(PipelineError::SchemaViolation(format!(
                        "files[{}].description must be a string",
                        idx
                    )));
                }
            }
        }

        Ok(())
    }
}

fn tail_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}
