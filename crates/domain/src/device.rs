//! Device: a human name bound to a pin, with its wiring options.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{InvalidValue, PinHubError};

/// PWM frequency used when a device does not specify one.
pub const DEFAULT_FREQUENCY_HZ: f64 = 100.0;

/// What is wired to the pin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Output,
    Relay,
    Input,
    Sensor,
    Pwm,
    Servo,
}

impl DeviceType {
    pub const ALLOWED: &'static str = "output, relay, input, sensor, pwm, servo";

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Output => "output",
            Self::Relay => "relay",
            Self::Input => "input",
            Self::Sensor => "sensor",
            Self::Pwm => "pwm",
            Self::Servo => "servo",
        }
    }

    /// Whether `read_all` samples devices of this type.
    #[must_use]
    pub fn is_readable(self) -> bool {
        matches!(self, Self::Input | Self::Sensor)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "output" => Ok(Self::Output),
            "relay" => Ok(Self::Relay),
            "input" => Ok(Self::Input),
            "sensor" => Ok(Self::Sensor),
            "pwm" => Ok(Self::Pwm),
            "servo" => Ok(Self::Servo),
            other => Err(InvalidValue::NotOneOf {
                field: "type",
                allowed: Self::ALLOWED,
                value: other.to_string(),
            }),
        }
    }
}

fn default_frequency() -> f64 {
    DEFAULT_FREQUENCY_HZ
}

/// A named pin.
///
/// The name is the key of the registry table, so it is not part of the
/// serialized record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(skip)]
    pub name: String,
    pub pin: u32,
    #[serde(rename = "type", default)]
    pub kind: DeviceType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub active_low: bool,
    #[serde(default)]
    pub pull_up: bool,
    #[serde(default = "default_frequency")]
    pub frequency: f64,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PinHubError::InvalidValue`] when the name is empty or reads as a
    /// pin number, or when the frequency is not a positive number.
    pub fn validate(&self) -> Result<(), PinHubError> {
        validate_name(&self.name)?;
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(InvalidValue::OutOfRange {
                field: "frequency",
                expected: "a positive number of hertz",
                value: self.frequency.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// The record reported by `list_devices`, name included.
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "pin": self.pin,
            "type": self.kind,
            "description": self.description,
            "active_low": self.active_low,
            "pull_up": self.pull_up,
            "frequency": self.frequency,
        })
    }
}

/// Reject names that cannot be told apart from a pin number.
///
/// # Errors
///
/// Returns [`InvalidValue::EmptyName`] or [`InvalidValue::NumericName`].
pub fn validate_name(name: &str) -> Result<(), InvalidValue> {
    if name.trim().is_empty() {
        return Err(InvalidValue::EmptyName);
    }
    if Identifier::Name(name.to_string()).as_number().is_some() {
        return Err(InvalidValue::NumericName(name.to_string()));
    }
    Ok(())
}

/// Convert a user-supplied pin number into a physical pin.
///
/// # Errors
///
/// Returns [`InvalidValue::NegativePin`] for negative numbers and
/// [`InvalidValue::OutOfRange`] past `u32::MAX`.
pub fn pin_number(raw: i64) -> Result<u32, InvalidValue> {
    if raw < 0 {
        return Err(InvalidValue::NegativePin(raw));
    }
    u32::try_from(raw).map_err(|_| InvalidValue::OutOfRange {
        field: "pin",
        expected: "a valid pin number",
        value: raw.to_string(),
    })
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    name: Option<String>,
    pin: Option<i64>,
    kind: Option<DeviceType>,
    description: Option<String>,
    active_low: bool,
    pull_up: bool,
    frequency: Option<f64>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn pin(mut self, pin: i64) -> Self {
        self.pin = Some(pin);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: DeviceType) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    #[must_use]
    pub fn pull_up(mut self, pull_up: bool) -> Self {
        self.pull_up = pull_up;
        self
    }

    #[must_use]
    pub fn frequency(mut self, frequency: f64) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`PinHubError::InvalidValue`] if the name is missing, empty
    /// or numeric, if the pin is negative, or if the frequency is invalid.
    pub fn build(self) -> Result<Device, PinHubError> {
        let device = Device {
            name: self.name.unwrap_or_default(),
            pin: pin_number(self.pin.unwrap_or_default())?,
            kind: self.kind.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            active_low: self.active_low,
            pull_up: self.pull_up,
            frequency: self.frequency.unwrap_or(DEFAULT_FREQUENCY_HZ),
        };
        device.validate()?;
        Ok(device)
    }
}

/// How a command names its target: a registered name or a pin number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Name(String),
    Number(i64),
}

impl Identifier {
    /// The pin number this identifier spells, if any.
    #[must_use]
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Name(s) => s.trim().parse().ok(),
        }
    }

    /// The identifier as a registry key, when it is a string.
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

/// Resolved target of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum PinAddress {
    /// A pin with a registered name and options.
    Registered(Device),
    /// A pin addressed by number with nothing stored about it.
    Bare(u32),
}

impl PinAddress {
    #[must_use]
    pub fn pin(&self) -> u32 {
        match self {
            Self::Registered(device) => device.pin,
            Self::Bare(pin) => *pin,
        }
    }

    #[must_use]
    pub fn device(&self) -> Option<&Device> {
        match self {
            Self::Registered(device) => Some(device),
            Self::Bare(_) => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> DeviceType {
        self.device().map_or(DeviceType::Output, |d| d.kind)
    }

    #[must_use]
    pub fn active_low(&self) -> bool {
        self.device().is_some_and(|d| d.active_low)
    }

    #[must_use]
    pub fn pull_up(&self) -> bool {
        self.device().is_some_and(|d| d.pull_up)
    }

    #[must_use]
    pub fn frequency(&self) -> f64 {
        self.device().map_or(DEFAULT_FREQUENCY_HZ, |d| d.frequency)
    }

    #[must_use]
    pub fn description(&self) -> Cow<'_, str> {
        match self {
            Self::Registered(device) => Cow::Borrowed(device.description.as_str()),
            Self::Bare(pin) => Cow::Owned(format!("Pin {pin} (not registered)")),
        }
    }
}
