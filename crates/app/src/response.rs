//! Response objects.
//!
//! Handlers return [`Outcome`]; [`to_response`] turns it into the single
//! JSON object written back to the caller. Every failure keeps whatever
//! context the handler had gathered so far.

use pinhub_domain::error::{ErrorKind, PinHubError};
use serde_json::{Map, Value};

/// Fields of a successful response, `success` excluded.
pub type Fields = Map<String, Value>;

/// A failed command together with the fields known at the time.
#[derive(Debug)]
pub struct Failure {
    pub error: PinHubError,
    pub context: Fields,
}

impl Failure {
    #[must_use]
    pub fn new(error: PinHubError) -> Self {
        Self {
            error,
            context: Fields::new(),
        }
    }

    /// Attach a context field.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    /// The failure as response fields, `success: false` included.
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        let mut response = Fields::new();
        response.insert("success".into(), Value::Bool(false));
        response.insert("error".into(), Value::String(self.error.to_string()));
        let kind = self.error.kind();
        response.insert(
            "error_kind".into(),
            serde_json::to_value(kind).unwrap_or(Value::Null),
        );
        match (&self.error, kind) {
            (_, ErrorKind::HardwareIo) => {
                response.insert("retryable".into(), Value::Bool(self.error.is_retryable()));
            }
            (_, ErrorKind::Timeout) => {
                response.insert("timed_out".into(), Value::Bool(true));
            }
            (PinHubError::UnknownRoutine { available, .. }, _) => {
                response.insert("available_routines".into(), available.clone().into());
            }
            _ => {}
        }
        for (key, value) in &self.context {
            response.entry(key.clone()).or_insert_with(|| value.clone());
        }
        response
    }
}

impl From<PinHubError> for Failure {
    fn from(error: PinHubError) -> Self {
        Self::new(error)
    }
}

/// Result of running one command.
pub type Outcome = Result<Fields, Failure>;

/// Render an outcome as the response object.
#[must_use]
pub fn to_response(outcome: Outcome) -> Value {
    match outcome {
        Ok(fields) => {
            let mut response = Fields::new();
            response.insert("success".into(), Value::Bool(true));
            response.extend(fields);
            Value::Object(response)
        }
        Err(failure) => Value::Object(failure.to_fields()),
    }
}
