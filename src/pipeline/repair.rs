//! Response repair: coerce the model's reply text into the output schema.
//!
//! Even when told to answer with bare JSON, models regularly
//!
//! - wrap the answer in a ` ```json … ``` ` fence, and
//! - copy LaTeX or Windows paths into strings without escaping the
//!   backslashes (`"\frac{a}{b}"`), which is invalid JSON.
//!
//! [`repair_and_parse`] fixes both, in a fixed order:
//!
//! 1. trim, strip a leading ` ```json ` and a trailing ` ``` `
//! 2. strict parse against the schema
//! 3. on failure, double every backslash and parse again
//! 4. on failure, report a schema-validation error for this attempt

use crate::error::CallError;
use crate::schema::{OutputSchema, SchemaInstance};
use tracing::debug;

const JSON_FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Run the repair protocol over `reply`.
pub fn repair_and_parse(reply: &str, schema: &OutputSchema) -> Result<SchemaInstance, CallError> {
    let text = strip_json_fences(reply);

    let strict_err = match schema.parse(text) {
        Ok(instance) => return Ok(instance),
        Err(e) => e,
    };
    debug!("Strict parse failed ({}); escaping backslashes", strict_err);

    schema
        .parse(&escape_backslashes(text))
        .map_err(|repaired_err| CallError::SchemaValidation {
            schema: schema.name.clone(),
            detail: format!("{strict_err}; after backslash repair: {repaired_err}"),
        })
}

/// Step 1: remove one leading ` ```json ` and one trailing ` ``` `, then trim.
pub fn strip_json_fences(reply: &str) -> &str {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix(JSON_FENCE_OPEN) {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix(FENCE_CLOSE) {
        text = rest;
    }
    text.trim()
}

/// Step 3: replace each `\` with `\\`.
pub fn escape_backslashes(text: &str) -> String {
    text.replace('\\', "\\\\")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn summary() -> OutputSchema {
        OutputSchema::new("Summary").field("summary", FieldType::String)
    }

    #[test]
    fn bare_json_parses() {
        let inst = repair_and_parse(r#"{"summary": "a red square"}"#, &summary()).unwrap();
        assert_eq!(inst.get_str("summary"), Some("a red square"));
    }

    #[test]
    fn fenced_json_is_stripped() {
        let inst = repair_and_parse("```json\n{\"summary\": \"ok\"}\n```", &summary()).unwrap();
        assert_eq!(inst.get_str("summary"), Some("ok"));
    }

    #[test]
    fn fence_stripping_matches_bare_parse() {
        let schema = OutputSchema::new("Cell")
            .field("row", FieldType::Integer)
            .field("text", FieldType::String)
            .field("tags", FieldType::array_of(FieldType::String));
        let bare = r#"{"row": 3, "text": "x < y", "tags": ["a", "b"]}"#;
        let fenced = format!("  ```json\n{bare}\n```  ");
        assert_eq!(
            repair_and_parse(bare, &schema).unwrap(),
            repair_and_parse(&fenced, &schema).unwrap()
        );
    }

    #[test]
    fn only_json_fence_is_stripped_at_start() {
        // A plain ``` opening fence is not part of the protocol.
        let err = repair_and_parse("```\n{\"summary\": \"ok\"}\n```", &summary()).unwrap_err();
        assert!(matches!(err, CallError::SchemaValidation { .. }));
    }

    #[test]
    fn trailing_fence_alone_is_stripped() {
        let inst = repair_and_parse("{\"summary\": \"ok\"}\n```", &summary()).unwrap();
        assert_eq!(inst.get_str("summary"), Some("ok"));
    }

    #[test]
    fn unescaped_backslashes_are_repaired() {
        let raw = r#"{"summary": "\alpha + \beta \leq \gamma"}"#;
        assert!(summary().parse(raw).is_err(), "strict parse must fail first");

        let repaired = repair_and_parse(raw, &summary()).unwrap();
        let intended = summary()
            .parse(r#"{"summary": "\\alpha + \\beta \\leq \\gamma"}"#)
            .unwrap();
        assert_eq!(repaired, intended);
        assert_eq!(repaired.get_str("summary"), Some(r"\alpha + \beta \leq \gamma"));
    }

    #[test]
    fn fenced_and_backslashed_together() {
        let raw = "```json\n{\"summary\": \"C:\\Users\\page.png\"}\n```";
        let inst = repair_and_parse(raw, &summary()).unwrap();
        assert_eq!(inst.get_str("summary"), Some(r"C:\Users\page.png"));
    }

    #[test]
    fn valid_escapes_survive_strict_parse() {
        let inst = repair_and_parse(r#"{"summary": "line\nbreak"}"#, &summary()).unwrap();
        assert_eq!(inst.get_str("summary"), Some("line\nbreak"));
    }

    #[test]
    fn both_attempts_failing_is_schema_error() {
        let err = repair_and_parse("I could not read the image.", &summary()).unwrap_err();
        match err {
            CallError::SchemaValidation { schema, detail } => {
                assert_eq!(schema, "Summary");
                assert!(detail.contains("after backslash repair"), "got: {detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn wrong_shape_is_schema_error() {
        let err = repair_and_parse(r#"{"caption": "x"}"#, &summary()).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn escape_doubles_every_backslash() {
        assert_eq!(escape_backslashes(r"a\b\\c"), r"a\\b\\\\c");
    }
}
