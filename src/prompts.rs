//! System instructions for structured vision calls.
//!
//! Every call gets the same instruction shape: follow the user prompt, answer
//! with JSON matching the embedded schema, and nothing else. The schema is
//! pretty-printed so the model sees nesting the way a human would.

use crate::schema::OutputSchema;

/// Opening line of every system instruction.
pub const TASK_PREAMBLE: &str = "Follow the instructions given by the user prompt. \
You must provide your response in JSON format matching this schema:";

/// Closing line forbidding any markup around the JSON.
pub const OUTPUT_RULES: &str = "Respond only with the JSON object, nothing else. \
Do not include ```json, ```, or any other formatting.";

/// Build the system instruction for `schema`.
pub fn system_instruction(schema: &OutputSchema) -> String {
    // Serialising a serde_json::Value cannot fail.
    let rendered = serde_json::to_string_pretty(&schema.to_json_schema()).unwrap_or_default();
    format!("{TASK_PREAMBLE}\n\n{rendered}\n\n{OUTPUT_RULES}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    #[test]
    fn instruction_embeds_schema_and_rules() {
        let schema = OutputSchema::new("Summary").field("summary", FieldType::String);
        let s = system_instruction(&schema);
        assert!(s.starts_with(TASK_PREAMBLE));
        assert!(s.contains("\"title\": \"Summary\""), "got: {s}");
        assert!(s.contains("\"summary\""));
        assert!(s.ends_with(OUTPUT_RULES));
    }
}
