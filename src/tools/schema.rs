//! Tool descriptors and their prompt/LLM renderings.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ToolError {
    #[error("Tool name must not be empty")]
    EmptyName,

    #[error("Tool name '{0}' contains whitespace")]
    InvalidName(String),

    #[error("Invalid parameter schema for tool '{tool}': {reason}")]
    InvalidSchema { tool: String, reason: String },
}

/// Where a tool is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOrigin {
    /// Discovered on the Coral server and forwarded there.
    Coral,
    /// Implemented by this process.
    Local,
}

/// Shape of what a tool returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Text content only.
    Content,
    /// Text content for the model plus a side artifact kept out of the prompt.
    ContentAndArtifact,
}

/// Validated description of a callable tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub origin: ToolOrigin,
    pub response_format: ResponseFormat,
}

impl ToolDescriptor {
    /// Build a descriptor, rejecting empty names and non-object schemas.
    ///
    /// A `null` schema is accepted and normalized to an empty object schema,
    /// which is what servers mean when they omit `inputSchema`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        origin: ToolOrigin,
        response_format: ResponseFormat,
    ) -> Result<Self, ToolError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ToolError::EmptyName);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(ToolError::InvalidName(name));
        }

        let parameters = match parameters {
            Value::Null => json!({ "type": "object", "properties": {} }),
            other => other,
        };
        validate_schema(&name, &parameters)?;

        Ok(Self {
            name,
            description: description.into(),
            parameters,
            origin,
            response_format,
        })
    }

    /// OpenAI function-calling definition.
    pub fn to_function_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

fn validate_schema(tool: &str, schema: &Value) -> Result<(), ToolError> {
    let invalid = |reason: &str| ToolError::InvalidSchema {
        tool: tool.to_string(),
        reason: reason.to_string(),
    };

    let object = schema
        .as_object()
        .ok_or_else(|| invalid("schema must be a JSON object"))?;

    if let Some(kind) = object.get("type") {
        if kind.as_str() != Some("object") {
            return Err(invalid("top-level type must be \"object\""));
        }
    }
    if let Some(properties) = object.get("properties") {
        if !properties.is_object() {
            return Err(invalid("properties must be an object"));
        }
    }
    if let Some(required) = object.get("required") {
        let all_strings = required
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string));
        if !all_strings {
            return Err(invalid("required must be an array of strings"));
        }
    }
    Ok(())
}

/// Double every brace so the text survives prompt-template substitution.
pub fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

/// One `Tool: <name>, Schema: <json>` line per tool, braces escaped.
pub fn describe_tools<'a, I>(tools: I) -> String
where
    I: IntoIterator<Item = &'a ToolDescriptor>,
{
    tools
        .into_iter()
        .map(|tool| {
            format!(
                "Tool: {}, Schema: {}",
                escape_braces(&tool.name),
                escape_braces(&tool.parameters.to_string())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic_schema() -> Value {
        json!({
            "properties": {
                "topic": {"type": "string", "description": "The topic for the research report"}
            },
            "required": ["topic"],
            "type": "object"
        })
    }

    #[test]
    fn accepts_object_schemas() {
        let tool = ToolDescriptor::new(
            "open_deepresearch",
            "Research",
            topic_schema(),
            ToolOrigin::Local,
            ResponseFormat::ContentAndArtifact,
        )
        .unwrap();
        assert_eq!(tool.parameters, topic_schema());
    }

    #[test]
    fn null_schema_becomes_empty_object() {
        let tool = ToolDescriptor::new(
            "list_agents",
            "",
            Value::Null,
            ToolOrigin::Coral,
            ResponseFormat::Content,
        )
        .unwrap();
        assert_eq!(tool.parameters, json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn rejects_malformed_descriptors() {
        let build = |name: &str, schema: Value| {
            ToolDescriptor::new(name, "", schema, ToolOrigin::Coral, ResponseFormat::Content)
        };

        assert_eq!(build("", json!({})), Err(ToolError::EmptyName));
        assert!(matches!(build("send message", json!({})), Err(ToolError::InvalidName(_))));
        assert!(matches!(build("t", json!("string")), Err(ToolError::InvalidSchema { .. })));
        assert!(matches!(build("t", json!({"type": "array"})), Err(ToolError::InvalidSchema { .. })));
        assert!(matches!(build("t", json!({"properties": []})), Err(ToolError::InvalidSchema { .. })));
        assert!(matches!(build("t", json!({"required": [1]})), Err(ToolError::InvalidSchema { .. })));
    }

    #[test]
    fn description_lines_escape_braces() {
        let tool = ToolDescriptor::new(
            "send_message",
            "",
            json!({"type": "object", "properties": {"threadId": {"type": "string"}}}),
            ToolOrigin::Coral,
            ResponseFormat::Content,
        )
        .unwrap();
        assert_eq!(
            describe_tools([&tool]),
            r#"Tool: send_message, Schema: {{"type":"object","properties":{{"threadId":{{"type":"string"}}}}}}"#
        );
    }

    #[test]
    fn function_schema_wraps_parameters() {
        let tool = ToolDescriptor::new(
            "open_deepresearch",
            "Research",
            topic_schema(),
            ToolOrigin::Local,
            ResponseFormat::ContentAndArtifact,
        )
        .unwrap();
        let schema = tool.to_function_schema();
        assert_eq!(schema["type"], "function");
        assert_eq!(schema["function"]["name"], "open_deepresearch");
        assert_eq!(schema["function"]["parameters"]["required"], json!(["topic"]));
    }
}
