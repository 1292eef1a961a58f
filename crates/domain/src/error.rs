//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`PinHubError`] via `From`, so the command dispatcher can always turn a
//! failure into a well-formed response object.

use serde::Serialize;

/// Top-level error for every pinhub operation.
#[derive(Debug, thiserror::Error)]
pub enum PinHubError {
    /// The identifier is neither a registered name nor a pin number.
    #[error("'{identifier}' is not a registered name and not a pin number")]
    UnknownDevice { identifier: String },

    /// No routine is stored under the given name.
    #[error("routine '{name}' not found")]
    UnknownRoutine {
        name: String,
        /// Names of the routines that do exist.
        available: Vec<String>,
    },

    /// A command was issued without one of its required fields.
    #[error("{command} requires: {field}")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },

    /// A field was present but its value is unacceptable.
    #[error(transparent)]
    InvalidValue(#[from] InvalidValue),

    /// No pin I/O provider variant can serve the request.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// `wait_for` reached its deadline.
    #[error("timed out after {timeout_s}s, pin never reached {expected}")]
    Timeout {
        timeout_s: f64,
        /// `"HIGH"` or `"LOW"`.
        expected: &'static str,
    },

    /// A sensor, serial or pin call failed at the hardware level.
    #[error("{operation} failed{}: {message}", if *.retryable { " (retry)" } else { "" })]
    HardwareIo {
        operation: &'static str,
        message: String,
        /// Whether repeating the same call may succeed.
        retryable: bool,
    },

    /// Template substitution or condition evaluation failed.
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// The request or sequence is malformed.
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// A step of a sequence run failed.
    #[error("step {index} ('{alias}') failed: {source}")]
    StepFailed {
        index: usize,
        alias: String,
        #[source]
        source: Box<PinHubError>,
    },

    /// The persisted configuration could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PinHubError {
    /// Shorthand for a hardware failure that is worth retrying.
    #[must_use]
    pub fn retryable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::HardwareIo {
            operation,
            message: message.into(),
            retryable: true,
        }
    }

    /// Shorthand for a hardware failure that will not go away on retry.
    #[must_use]
    pub fn hardware(operation: &'static str, message: impl Into<String>) -> Self {
        Self::HardwareIo {
            operation,
            message: message.into(),
            retryable: false,
        }
    }

    /// Machine-readable category of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownDevice { .. } => ErrorKind::UnknownDevice,
            Self::UnknownRoutine { .. } => ErrorKind::UnknownRoutine,
            Self::MissingField { .. } => ErrorKind::MissingField,
            Self::InvalidValue(_) => ErrorKind::InvalidValue,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::HardwareIo { .. } => ErrorKind::HardwareIo,
            Self::Expression(_) => ErrorKind::Expression,
            Self::Structural(_) => ErrorKind::Structural,
            Self::StepFailed { source, .. } => source.kind(),
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether the failure is transient, following nested step failures.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HardwareIo { retryable, .. } => *retryable,
            Self::StepFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Category reported as `error_kind` in failure responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownDevice,
    UnknownRoutine,
    MissingField,
    InvalidValue,
    BackendUnavailable,
    Timeout,
    HardwareIo,
    Expression,
    Structural,
    Storage,
}

/// A field value outside of what the command accepts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidValue {
    /// Names must not be empty.
    #[error("name must not be empty")]
    EmptyName,

    /// Purely numeric names would collide with pin-number addressing.
    #[error("name '{0}' is purely numeric and would be ambiguous with a pin number")]
    NumericName(String),

    /// The name is already bound to another pin.
    #[error("'{name}' is already used by pin {pin}")]
    NameInUse { name: String, pin: u32 },

    /// Pin numbers are non-negative.
    #[error("pin must be a non-negative integer, got {0}")]
    NegativePin(i64),

    #[error("level must be 0.0–1.0, got {0}")]
    LevelOutOfRange(f64),

    #[error("duty_cycle must be 0.0–1.0, got {0}")]
    DutyCycleOutOfRange(f64),

    #[error("angle must be 0–180 degrees, got {0}")]
    AngleOutOfRange(f64),

    /// A numeric field outside its accepted range.
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: String,
    },

    /// A field that must be a number could not be read as one.
    #[error("{field} must be a number, got '{value}'")]
    NotANumber { field: &'static str, value: String },

    /// A field has the wrong JSON type.
    #[error("{field} must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    /// A field only accepts a fixed set of words.
    #[error("{field} must be one of: {allowed}, got '{value}'")]
    NotOneOf {
        field: &'static str,
        allowed: &'static str,
        value: String,
    },

    /// Text that cannot be represented in the requested encoding.
    #[error("data cannot be encoded as {0}")]
    Unencodable(&'static str),
}

/// A template reference or condition that cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    /// The marker names an alias that no earlier step bound.
    #[error("unresolved reference {marker}: alias '{alias}' is not bound")]
    UnboundAlias { marker: String, alias: String },

    /// The alias is bound but the field path does not exist.
    #[error("unresolved reference {marker}: no field '{path}'")]
    MissingPath { marker: String, path: String },

    /// Ordering operators need numeric operands.
    #[error("cannot compare non-numeric operands with '{op}': '{left}' vs '{right}'")]
    NonNumericOrdering {
        left: String,
        op: &'static str,
        right: String,
    },

    /// The condition text is empty or has an operand missing.
    #[error("malformed condition '{0}'")]
    Malformed(String),
}

/// A request, step or sequence whose shape is wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid step: {0}")]
    InvalidStep(String),

    #[error("sequence requires: steps (non-empty list of command payloads)")]
    EmptySequence,

    #[error("nesting deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
}
