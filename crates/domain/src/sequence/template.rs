use std::fmt;

use serde_json::{Map, Value};

use super::bindings::{Bindings, stringify};
use crate::error::ExpressionError;

/// `{alias.field.path}` inside a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub alias: String,
    pub path: Vec<String>,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}", self.alias)?;
        for segment in &self.path {
            write!(f, ".{segment}")?;
        }
        f.write_str("}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Reference(Reference),
}

/// A string split into literal text and references.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    segments: Vec<Segment>,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Parse the body of a marker; `None` when it is not `ident(.ident)*`.
fn parse_reference(body: &str) -> Option<Reference> {
    let mut parts = body.split('.');
    let alias = parts.next()?;
    let valid = |s: &str| !s.is_empty() && s.chars().all(is_ident_char);
    if !valid(alias) {
        return None;
    }
    let path: Vec<String> = parts.map(str::to_string).collect();
    if !path.iter().all(|p| valid(p)) {
        return None;
    }
    Some(Reference {
        alias: alias.to_string(),
        path,
    })
}

impl Template {
    /// Split `text` into segments. Braces that do not form a marker stay
    /// literal, so JSON snippets pass through untouched.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = text;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let reference = after
                .find(['{', '}'])
                .filter(|&close| after[close..].starts_with('}'))
                .and_then(|close| parse_reference(&after[..close]).map(|r| (r, close)));
            match reference {
                Some((reference, close)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Reference(reference));
                    rest = &after[close + 1..];
                }
                None => {
                    literal.push('{');
                    rest = after;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the template contains no reference.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Substitute every reference.
    ///
    /// # Errors
    ///
    /// Fails on the first reference that does not resolve.
    pub fn render(&self, bindings: &Bindings) -> Result<String, ExpressionError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Reference(reference) => out.push_str(&stringify(bindings.lookup(reference)?)),
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Reference(reference) => write!(f, "{reference}")?,
            }
        }
        Ok(())
    }
}

/// A JSON value whose strings may contain references.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatedValue {
    /// Copied as-is.
    Raw(Value),
    Text(Template),
    Array(Vec<TemplatedValue>),
    Object(Vec<(String, TemplatedValue)>),
}

impl TemplatedValue {
    /// Parse every string in `value`, recursively.
    #[must_use]
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::Text(Template::parse(text)),
            Value::Array(items) => Self::Array(items.iter().map(Self::parse).collect()),
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::parse(v)))
                    .collect(),
            ),
            other => Self::Raw(other.clone()),
        }
    }

    /// # Errors
    ///
    /// Fails on the first reference that does not resolve.
    pub fn render(&self, bindings: &Bindings) -> Result<Value, ExpressionError> {
        Ok(match self {
            Self::Raw(value) => value.clone(),
            Self::Text(template) => Value::String(template.render(bindings)?),
            Self::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| item.render(bindings))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Object(fields) => {
                let mut map = Map::new();
                for (key, value) in fields {
                    map.insert(key.clone(), value.render(bindings)?);
                }
                Value::Object(map)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn should_split_literals_and_references() {
        let template = Template::parse("Temp: {w.temperature_c}C");
        assert_eq!(
            template.segments(),
            [
                Segment::Literal("Temp: ".to_string()),
                Segment::Reference(Reference {
                    alias: "w".to_string(),
                    path: vec!["temperature_c".to_string()],
                }),
                Segment::Literal("C".to_string()),
            ]
        );
        assert_eq!(template.to_string(), "Temp: {w.temperature_c}C");
    }

    #[test]
    fn should_keep_non_marker_braces_literal() {
        for text in ["{}", "{ w.x }", r#"{"a": 1}"#, "{a..b}", "open { only", "{a{b.c}"] {
            let template = Template::parse(text);
            assert_eq!(template.to_string(), text);
        }
        assert!(Template::parse(r#"{"a": 1}"#).is_literal());
        assert!(!Template::parse("{a{b.c}").is_literal());
    }

    #[test]
    fn should_render_references_from_bindings() {
        let mut bindings = Bindings::new();
        bindings.bind("w", json!({"temperature_c": 21.5, "sensor_type": "DHT22"}));
        let template = Template::parse("{w.sensor_type}: {w.temperature_c}");
        assert_eq!(template.render(&bindings).unwrap(), "DHT22: 21.5");
    }

    #[test]
    fn should_render_whole_object_for_bare_alias() {
        let mut bindings = Bindings::new();
        bindings.bind("r", json!({"value": true}));
        assert_eq!(
            Template::parse("{r}").render(&bindings).unwrap(),
            r#"{"value":true}"#
        );
    }

    #[test]
    fn should_name_failing_marker() {
        let bindings = Bindings::new();
        let err = Template::parse("x {missing.field} y").render(&bindings).unwrap_err();
        assert_eq!(err.to_string(), "unresolved reference {missing.field}: alias 'missing' is not bound");
    }

    #[test]
    fn should_render_nested_values() {
        let mut bindings = Bindings::new();
        bindings.bind("r", json!({"pin": 17}));
        let value = TemplatedValue::parse(&json!({
            "device": "{r.pin}",
            "times": 2,
            "tags": ["a", "{r.pin}"]
        }));
        assert_eq!(
            value.render(&bindings).unwrap(),
            json!({"device": "17", "times": 2, "tags": ["a", "17"]})
        );
    }
}
