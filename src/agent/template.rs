//! Minimal prompt templates: `{name}` placeholders, `{{` and `}}` literals.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("No value for template variable '{0}'")]
    MissingVariable(String),

    #[error("Unmatched '{brace}' at byte {position}")]
    UnmatchedBrace { brace: char, position: usize },
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Substitute `vars` and collapse doubled braces.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<String, TemplateError> {
        let source = self.source.as_str();
        let mut out = String::with_capacity(source.len());
        let mut chars = source.char_indices().peekable();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, next)| next) == Some('{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek().map(|&(_, next)| next) == Some('}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let start = position + 1;
                    let end = source[start..]
                        .find('}')
                        .map(|offset| start + offset)
                        .ok_or(TemplateError::UnmatchedBrace { brace: '{', position })?;
                    let name = &source[start..end];
                    let value = vars
                        .iter()
                        .find(|(key, _)| *key == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| TemplateError::MissingVariable(name.to_string()))?;
                    out.push_str(value);
                    while chars.peek().is_some_and(|&(i, _)| i <= end) {
                        chars.next();
                    }
                }
                '}' => return Err(TemplateError::UnmatchedBrace { brace: '}', position }),
                other => out.push(other),
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::escape_braces;
    use serde_json::{json, Value};

    #[test]
    fn substitutes_variables() {
        let template = PromptTemplate::new("wait {timeout} ms for {who}");
        assert_eq!(
            template.render(&[("timeout", "30000"), ("who", "mentions")]).unwrap(),
            "wait 30000 ms for mentions"
        );
    }

    #[test]
    fn escaped_schema_survives_rendering() {
        let schema = json!({
            "properties": {"topic": {"type": "string", "description": "The topic {for} the report"}},
            "required": ["topic"],
            "type": "object"
        });
        let raw = schema.to_string();
        let template = PromptTemplate::new(format!("Schema: {}\nNext", escape_braces(&raw)));

        let rendered = template.render(&[]).unwrap();
        let embedded = rendered
            .strip_prefix("Schema: ")
            .and_then(|rest| rest.strip_suffix("\nNext"))
            .unwrap();

        assert_eq!(embedded, raw);
        assert_eq!(serde_json::from_str::<Value>(embedded).unwrap(), schema);
        assert!(!rendered.contains("{{"));
        assert_eq!(rendered.matches('{').count(), raw.matches('{').count());
    }

    #[test]
    fn reports_missing_variables_and_stray_braces() {
        assert_eq!(
            PromptTemplate::new("{agent_scratchpad}").render(&[]),
            Err(TemplateError::MissingVariable("agent_scratchpad".to_string()))
        );
        assert_eq!(
            PromptTemplate::new("a } b").render(&[]),
            Err(TemplateError::UnmatchedBrace { brace: '}', position: 2 })
        );
        assert_eq!(
            PromptTemplate::new("open {").render(&[]),
            Err(TemplateError::UnmatchedBrace { brace: '{', position: 5 })
        );
    }
}
