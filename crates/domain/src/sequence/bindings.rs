use std::collections::HashMap;

use serde_json::Value;

use super::template::Reference;
use crate::error::ExpressionError;

/// Results bound to aliases during one run.
#[derive(Debug, Default, Clone)]
pub struct Bindings {
    values: HashMap<String, Value>,
}

impl Bindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` to `alias`, replacing any earlier result.
    pub fn bind(&mut self, alias: impl Into<String>, value: Value) {
        self.values.insert(alias.into(), value);
    }

    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.values.get(alias)
    }

    /// Follow a reference to the value it names.
    ///
    /// Path segments index objects by key and arrays by position.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::UnboundAlias`] or
    /// [`ExpressionError::MissingPath`].
    pub fn lookup(&self, reference: &Reference) -> Result<&Value, ExpressionError> {
        let mut current = self
            .values
            .get(&reference.alias)
            .ok_or_else(|| ExpressionError::UnboundAlias {
                marker: reference.to_string(),
                alias: reference.alias.clone(),
            })?;
        for segment in &reference.path {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            current = next.ok_or_else(|| ExpressionError::MissingPath {
                marker: reference.to_string(),
                path: reference.path.join("."),
            })?;
        }
        Ok(current)
    }
}

/// Text substituted for a value: strings verbatim, everything else as JSON.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn reference(alias: &str, path: &[&str]) -> Reference {
        Reference {
            alias: alias.to_string(),
            path: path.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn should_follow_nested_path() {
        let mut bindings = Bindings::new();
        bindings.bind("w", json!({"reading": {"temperature_c": 21.5}, "list": [1, 2]}));

        let value = bindings.lookup(&reference("w", &["reading", "temperature_c"])).unwrap();
        assert_eq!(value, &json!(21.5));
        let value = bindings.lookup(&reference("w", &["list", "1"])).unwrap();
        assert_eq!(value, &json!(2));
    }

    #[test]
    fn should_fail_unbound_alias() {
        let bindings = Bindings::new();
        let err = bindings.lookup(&reference("w", &["x"])).unwrap_err();
        assert_eq!(
            err,
            ExpressionError::UnboundAlias {
                marker: "{w.x}".to_string(),
                alias: "w".to_string(),
            }
        );
    }

    #[test]
    fn should_fail_missing_field() {
        let mut bindings = Bindings::new();
        bindings.bind("w", json!({"value": true}));
        let err = bindings.lookup(&reference("w", &["value", "deep"])).unwrap_err();
        assert!(matches!(err, ExpressionError::MissingPath { path, .. } if path == "value.deep"));
    }

    #[test]
    fn should_stringify_strings_verbatim_and_others_as_json() {
        assert_eq!(stringify(&json!("on")), "on");
        assert_eq!(stringify(&json!(21.5)), "21.5");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&json!(null)), "null");
        assert_eq!(stringify(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
