use serde_json::Value;

use super::bindings::Bindings;
use super::expression::Condition;
use super::template::{Template, TemplatedValue};
use crate::command::COMMAND_NAMES;
use crate::error::{ExpressionError, InvalidValue, PinHubError, StructuralError};

/// Deepest nesting of branches and nested sequences a run accepts.
pub const MAX_DEPTH: usize = 32;

/// What happens to the run when a command step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    #[default]
    Abort,
    Continue,
}

/// A command invocation whose string fields may reference earlier results.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandStep {
    pub alias: Option<String>,
    pub on_error: ErrorPolicy,
    fields: Vec<(String, TemplatedValue)>,
}

impl CommandStep {
    /// The request this step sends once references are substituted.
    ///
    /// # Errors
    ///
    /// Fails on the first reference that does not resolve.
    pub fn render(&self, bindings: &Bindings) -> Result<Value, ExpressionError> {
        let mut map = serde_json::Map::new();
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.render(bindings)?);
        }
        Ok(Value::Object(map))
    }

    /// Name the result is bound to: the `as` alias, else `step_<index>`.
    #[must_use]
    pub fn binding_name(&self, index: usize) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| format!("step_{index}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Command(CommandStep),
    Conditional {
        condition: Condition,
        then: Box<Step>,
        otherwise: Option<Box<Step>>,
    },
}

/// One parsed entry of a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Nesting level, 1 for the steps of a top-level sequence.
    pub depth: usize,
    pub kind: StepKind,
}

fn invalid(message: impl Into<String>) -> PinHubError {
    StructuralError::InvalidStep(message.into()).into()
}

impl Step {
    /// Parse the steps of a sequence found at `depth`.
    ///
    /// # Errors
    ///
    /// Returns [`StructuralError::EmptySequence`] for an empty list and the
    /// first step error otherwise, prefixed with the step index.
    pub fn parse_all(values: &[Value], depth: usize) -> Result<Vec<Self>, PinHubError> {
        if values.is_empty() {
            return Err(StructuralError::EmptySequence.into());
        }
        values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                Self::parse(value, depth).map_err(|err| match err {
                    PinHubError::Structural(StructuralError::InvalidStep(message)) => {
                        invalid(format!("step {index}: {message}"))
                    }
                    other => other,
                })
            })
            .collect()
    }

    /// Parse a single step.
    ///
    /// # Errors
    ///
    /// Returns [`StructuralError::NestingTooDeep`] past [`MAX_DEPTH`],
    /// [`StructuralError::InvalidStep`] or [`StructuralError::UnknownCommand`]
    /// for malformed steps, and [`PinHubError::Expression`] for a malformed
    /// condition.
    pub fn parse(value: &Value, depth: usize) -> Result<Self, PinHubError> {
        if depth > MAX_DEPTH {
            return Err(StructuralError::NestingTooDeep { limit: MAX_DEPTH }.into());
        }
        let Value::Object(map) = value else {
            return Err(invalid("each step must be an object"));
        };

        if let Some(condition) = map.get("if") {
            let Value::String(condition) = condition else {
                return Err(invalid("'if' must be a string"));
            };
            let condition = Condition::parse(condition)?;
            let then = map
                .get("then")
                .filter(|v| !v.is_null())
                .ok_or_else(|| invalid("conditional step requires 'then'"))?;
            let then = Box::new(Self::parse(then, depth + 1)?);
            let otherwise = match map.get("else").filter(|v| !v.is_null()) {
                Some(branch) => Some(Box::new(Self::parse(branch, depth + 1)?)),
                None => None,
            };
            return Ok(Self {
                depth,
                kind: StepKind::Conditional {
                    condition,
                    then,
                    otherwise,
                },
            });
        }

        let Some(Value::String(command)) = map.get("command") else {
            return Err(invalid("step requires 'command' or 'if'"));
        };
        if Template::parse(command).is_literal() && !COMMAND_NAMES.contains(&command.as_str()) {
            return Err(StructuralError::UnknownCommand(command.clone()).into());
        }
        if command == "sequence"
            && let Some(Value::Array(nested)) = map.get("steps")
        {
            Self::parse_all(nested, depth + 1)?;
        }

        let alias = match map.get("as") {
            None | Some(Value::Null) => None,
            Some(Value::String(alias)) if !alias.is_empty() => Some(alias.clone()),
            Some(_) => return Err(invalid("'as' must be a non-empty string")),
        };
        let on_error = match map.get("on_error") {
            None | Some(Value::Null) => ErrorPolicy::Abort,
            Some(Value::String(policy)) if policy == "continue" => ErrorPolicy::Continue,
            Some(Value::String(policy)) if policy == "abort" => ErrorPolicy::Abort,
            Some(other) => {
                return Err(InvalidValue::NotOneOf {
                    field: "on_error",
                    allowed: "continue, abort",
                    value: other.as_str().map_or_else(|| other.to_string(), str::to_string),
                }
                .into());
            }
        };
        let fields = map
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "as" | "on_error"))
            .map(|(key, value)| {
                // nested steps get their own environment when they run
                let templated = if key == "steps" {
                    TemplatedValue::Raw(value.clone())
                } else {
                    TemplatedValue::parse(value)
                };
                (key.clone(), templated)
            })
            .collect();

        Ok(Self {
            depth,
            kind: StepKind::Command(CommandStep {
                alias,
                on_error,
                fields,
            }),
        })
    }
}
