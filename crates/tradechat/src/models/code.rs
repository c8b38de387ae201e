use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A generated strategy script, produced once by the code generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Code {
    /// What the script computes and how
    pub description: String,
    /// The import block, kept apart from the body
    pub imports: String,
    /// The script body
    pub code: String,
}

impl Code {
    /// JSON schema handed to the model for structured output
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": {"type": "string", "description": "Short description of the script"},
                "imports": {"type": "string", "description": "Import statements only"},
                "code": {"type": "string", "description": "The script body without imports"}
            },
            "required": ["description", "imports", "code"],
            "additionalProperties": false
        })
    }

    /// Render the artifact the way it is shown to the user and kept in history
    pub fn to_markdown(&self) -> String {
        format!(
            "{}\n\n```python\n{}\n\n{}\n```",
            self.description.trim(),
            self.imports.trim(),
            self.code.trim()
        )
    }
}
