use std::fmt;

use super::bindings::Bindings;
use super::template::Template;
use crate::error::ExpressionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Ge,
    Le,
    Eq,
    Ne,
    Gt,
    Lt,
}

impl Operator {
    /// Two-character operators first so `>=` is never read as `>`.
    const ALL: [Self; 6] = [Self::Ge, Self::Le, Self::Eq, Self::Ne, Self::Gt, Self::Lt];

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
        }
    }

    fn is_ordering(self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }

    #[allow(clippy::float_cmp)]
    fn compare_numbers(self, left: f64, right: f64) -> bool {
        match self {
            Self::Ge => left >= right,
            Self::Le => left <= right,
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Gt => left > right,
            Self::Lt => left < right,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Form {
    Compare {
        left: Template,
        op: Operator,
        right: Template,
    },
    Truthy(Template),
}

/// The `if` expression of a conditional step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    source: String,
    form: Form,
}

/// Left-most operator occurrence, preferring the longer symbol at a tie.
fn find_operator(text: &str) -> Option<(usize, Operator)> {
    (0..text.len())
        .filter(|&i| text.is_char_boundary(i))
        .find_map(|i| {
            Operator::ALL
                .into_iter()
                .find(|op| text[i..].starts_with(op.symbol()))
                .map(|op| (i, op))
        })
}

impl Condition {
    /// # Errors
    ///
    /// Returns [`ExpressionError::Malformed`] when the text is blank or one
    /// side of the operator is missing.
    pub fn parse(text: &str) -> Result<Self, ExpressionError> {
        let malformed = || ExpressionError::Malformed(text.to_string());
        if text.trim().is_empty() {
            return Err(malformed());
        }
        let form = match find_operator(text) {
            Some((at, op)) => {
                let left = text[..at].trim();
                let right = text[at + op.symbol().len()..].trim();
                if left.is_empty() || right.is_empty() {
                    return Err(malformed());
                }
                Form::Compare {
                    left: Template::parse(left),
                    op,
                    right: Template::parse(right),
                }
            }
            None => Form::Truthy(Template::parse(text.trim())),
        };
        Ok(Self {
            source: text.to_string(),
            form,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Substitute references and evaluate.
    ///
    /// Both sides are compared as numbers when both parse as one; otherwise
    /// `==` and `!=` compare the text and ordering operators fail.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError`] for unresolved references or an ordering
    /// comparison between non-numeric operands.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<bool, ExpressionError> {
        match &self.form {
            Form::Truthy(template) => {
                let text = template.render(bindings)?;
                let text = text.trim().to_ascii_lowercase();
                Ok(!matches!(text.as_str(), "" | "false" | "0" | "none" | "null"))
            }
            Form::Compare { left, op, right } => {
                let left = left.render(bindings)?;
                let right = right.render(bindings)?;
                let (left, right) = (left.trim(), right.trim());
                match (left.parse::<f64>(), right.parse::<f64>()) {
                    (Ok(l), Ok(r)) => Ok(op.compare_numbers(l, r)),
                    _ if op.is_ordering() => Err(ExpressionError::NonNumericOrdering {
                        left: left.to_string(),
                        op: op.symbol(),
                        right: right.to_string(),
                    }),
                    _ => Ok((left == right) == (*op == Operator::Eq)),
                }
            }
        }
    }
}
