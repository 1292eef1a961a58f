//! The closed set of requests pinhub understands.
//!
//! Requests arrive as JSON objects with a `command` field. Parsing is lenient
//! about representation (numbers may be sent as strings, so values
//! substituted from templates still work) and strict about meaning.

use serde_json::{Map, Value};

use crate::device::{Device, DeviceType, Identifier};
use crate::error::{InvalidValue, PinHubError, StructuralError};
use crate::hardware::{DhtModel, Encoding, LcdBus, LcdPanel, PinMode, SerialLink};
use crate::sequence::Step;

/// Every command name, in the order they are documented.
pub const COMMAND_NAMES: [&str; 27] = [
    "activate",
    "deactivate",
    "toggle",
    "read",
    "read_all",
    "set",
    "blink",
    "pulse",
    "wait_for",
    "set_angle",
    "set_mode",
    "dht_read",
    "lcd_print",
    "lcd_clear",
    "serial_write",
    "serial_read",
    "serial_readline",
    "sequence",
    "save_routine",
    "run_routine",
    "delete_routine",
    "list_routines",
    "rename",
    "register",
    "unregister",
    "list_devices",
    "list_backends",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Activate {
        target: Identifier,
    },
    Deactivate {
        target: Identifier,
    },
    Toggle {
        target: Identifier,
    },
    Read {
        target: Identifier,
    },
    ReadAll,
    Set {
        target: Identifier,
        level: f64,
    },
    Blink {
        target: Identifier,
        times: u32,
        on_ms: u64,
        off_ms: u64,
    },
    Pulse {
        target: Identifier,
        duration_ms: u64,
    },
    WaitFor {
        target: Identifier,
        state: bool,
        timeout_s: f64,
        poll_ms: u64,
    },
    SetAngle {
        target: Identifier,
        angle: f64,
    },
    SetMode {
        target: Identifier,
        mode: PinMode,
    },
    DhtRead {
        target: Identifier,
        model: DhtModel,
    },
    LcdPrint {
        panel: LcdPanel,
        text: String,
        line: u16,
    },
    LcdClear {
        panel: LcdPanel,
    },
    SerialWrite {
        link: SerialLink,
        data: String,
        encoding: Encoding,
    },
    SerialRead {
        link: SerialLink,
        length: usize,
        timeout_s: f64,
        encoding: Encoding,
    },
    SerialReadline {
        link: SerialLink,
        timeout_s: f64,
        encoding: Encoding,
    },
    Sequence {
        steps: Vec<Step>,
    },
    SaveRoutine {
        name: String,
        description: String,
        steps: Vec<Value>,
    },
    RunRoutine {
        name: String,
    },
    DeleteRoutine {
        name: String,
    },
    ListRoutines,
    Rename {
        target: Identifier,
        new_name: String,
    },
    Register(Device),
    Unregister {
        target: Identifier,
    },
    ListDevices,
    ListBackends,
}

impl Command {
    /// Parse a request object.
    ///
    /// `depth` is the nesting level the request runs at: 0 for a top-level
    /// request, the step's level for a step of a sequence.
    ///
    /// # Errors
    ///
    /// Returns [`StructuralError`] for a missing or unknown command,
    /// [`PinHubError::MissingField`] and [`PinHubError::InvalidValue`] for bad
    /// fields, and any step error for `sequence`.
    pub fn parse(request: &Value, depth: usize) -> Result<Self, PinHubError> {
        let Value::Object(map) = request else {
            return Err(StructuralError::InvalidRequest("request must be a JSON object".into()).into());
        };
        let name = match map.get("command") {
            Some(Value::String(name)) => name.as_str(),
            None | Some(Value::Null) => {
                return Err(StructuralError::InvalidRequest("missing 'command'".into()).into());
            }
            Some(_) => {
                return Err(StructuralError::InvalidRequest("'command' must be a string".into()).into());
            }
        };
        let Some(command) = COMMAND_NAMES.iter().copied().find(|c| *c == name) else {
            return Err(StructuralError::UnknownCommand(name.to_string()).into());
        };
        let p = Payload { command, map };

        Ok(match command {
            "activate" => Self::Activate { target: p.target()? },
            "deactivate" => Self::Deactivate { target: p.target()? },
            "toggle" => Self::Toggle { target: p.target()? },
            "read" => Self::Read { target: p.target()? },
            "read_all" => Self::ReadAll,
            "set" => {
                let target = p.target()?;
                let level = p.require("level", Payload::number)?;
                if !(0.0..=1.0).contains(&level) {
                    return Err(InvalidValue::LevelOutOfRange(level).into());
                }
                Self::Set { target, level }
            }
            "blink" => Self::Blink {
                target: p.target()?,
                times: p.unsigned("times", 3)?,
                on_ms: p.unsigned("on_ms", 500)?,
                off_ms: p.unsigned("off_ms", 500)?,
            },
            "pulse" => Self::Pulse {
                target: p.target()?,
                duration_ms: p.unsigned("duration_ms", 1000)?,
            },
            "wait_for" => {
                let target = p.target()?;
                let poll_ms = p.unsigned("poll_ms", 100)?;
                if poll_ms == 0 {
                    return Err(out_of_range("poll_ms", "at least 1", 0));
                }
                Self::WaitFor {
                    target,
                    state: p.flag("state", true)?,
                    timeout_s: p.seconds("timeout_s", 30.0)?,
                    poll_ms,
                }
            }
            "set_angle" => {
                let target = p.target()?;
                let angle = p.require("angle", Payload::number)?;
                if !(0.0..=180.0).contains(&angle) {
                    return Err(InvalidValue::AngleOutOfRange(angle).into());
                }
                Self::SetAngle { target, angle }
            }
            "set_mode" => Self::SetMode {
                target: p.target()?,
                mode: p.require("mode", Payload::text)?.parse()?,
            },
            "dht_read" => Self::DhtRead {
                target: p.target()?,
                model: p.text_field("sensor_type")?.map_or(Ok(DhtModel::default()), |s| s.parse())?,
            },
            "lcd_print" => {
                let text = p.require("text", Payload::text)?;
                let panel = p.lcd_panel()?;
                let line = panel.check_line(p.integer("line")?.unwrap_or(1))?;
                Self::LcdPrint { panel, text, line }
            }
            "lcd_clear" => Self::LcdClear {
                panel: p.lcd_panel()?,
            },
            "serial_write" => Self::SerialWrite {
                data: p.require("data", Payload::text)?,
                link: p.serial_link()?,
                encoding: p.encoding()?,
            },
            "serial_read" => {
                let length: usize = p.unsigned("length", 256)?;
                if length == 0 {
                    return Err(out_of_range("length", "at least 1", 0));
                }
                Self::SerialRead {
                    link: p.serial_link()?,
                    length,
                    timeout_s: p.seconds("timeout_s", 2.0)?,
                    encoding: p.encoding()?,
                }
            }
            "serial_readline" => Self::SerialReadline {
                link: p.serial_link()?,
                timeout_s: p.seconds("timeout_s", 5.0)?,
                encoding: p.encoding()?,
            },
            "sequence" => {
                let steps = p.steps()?;
                Self::Sequence {
                    steps: Step::parse_all(steps, depth + 1)?,
                }
            }
            "save_routine" => {
                let steps = p.steps()?;
                Self::SaveRoutine {
                    name: p.require("name", Payload::text)?,
                    description: p.text_field("description")?.unwrap_or_default(),
                    steps: steps.to_vec(),
                }
            }
            "run_routine" => Self::RunRoutine {
                name: p.require("name", Payload::text)?,
            },
            "delete_routine" => Self::DeleteRoutine {
                name: p.require("name", Payload::text)?,
            },
            "list_routines" => Self::ListRoutines,
            "rename" => Self::Rename {
                target: p
                    .first_identifier(&["device", "pin", "old"])?
                    .ok_or_else(|| p.missing("device"))?,
                new_name: p
                    .first_present(&["new_name", "name"])
                    .map(|(field, value)| Payload::text(field, value))
                    .transpose()?
                    .ok_or_else(|| p.missing("new_name"))?,
            },
            "register" => {
                let name = p.require("name", Payload::text)?;
                let pin = p.integer("pin")?.ok_or_else(|| p.missing("pin"))?;
                let kind = p.text_field("type")?.map_or(Ok(DeviceType::default()), |s| s.parse())?;
                let mut builder = Device::builder()
                    .name(name)
                    .pin(pin)
                    .kind(kind)
                    .description(p.text_field("description")?.unwrap_or_default())
                    .active_low(p.flag("active_low", false)?)
                    .pull_up(p.flag("pull_up", false)?);
                if let Some(frequency) = p.get("frequency") {
                    builder = builder.frequency(Payload::number("frequency", frequency)?);
                }
                Self::Register(builder.build()?)
            }
            "unregister" => Self::Unregister {
                target: p
                    .first_identifier(&["name", "device", "pin"])?
                    .ok_or_else(|| p.missing("name"))?,
            },
            "list_devices" => Self::ListDevices,
            "list_backends" => Self::ListBackends,
            other => return Err(StructuralError::UnknownCommand(other.to_string()).into()),
        })
    }

    /// The `command` string of this request.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Activate { .. } => "activate",
            Self::Deactivate { .. } => "deactivate",
            Self::Toggle { .. } => "toggle",
            Self::Read { .. } => "read",
            Self::ReadAll => "read_all",
            Self::Set { .. } => "set",
            Self::Blink { .. } => "blink",
            Self::Pulse { .. } => "pulse",
            Self::WaitFor { .. } => "wait_for",
            Self::SetAngle { .. } => "set_angle",
            Self::SetMode { .. } => "set_mode",
            Self::DhtRead { .. } => "dht_read",
            Self::LcdPrint { .. } => "lcd_print",
            Self::LcdClear { .. } => "lcd_clear",
            Self::SerialWrite { .. } => "serial_write",
            Self::SerialRead { .. } => "serial_read",
            Self::SerialReadline { .. } => "serial_readline",
            Self::Sequence { .. } => "sequence",
            Self::SaveRoutine { .. } => "save_routine",
            Self::RunRoutine { .. } => "run_routine",
            Self::DeleteRoutine { .. } => "delete_routine",
            Self::ListRoutines => "list_routines",
            Self::Rename { .. } => "rename",
            Self::Register(_) => "register",
            Self::Unregister { .. } => "unregister",
            Self::ListDevices => "list_devices",
            Self::ListBackends => "list_backends",
        }
    }
}

fn out_of_range(field: &'static str, expected: &'static str, value: impl ToString) -> PinHubError {
    InvalidValue::OutOfRange {
        field,
        expected,
        value: value.to_string(),
    }
    .into()
}

/// Field reader over a request object.
struct Payload<'a> {
    command: &'static str,
    map: &'a Map<String, Value>,
}

impl<'a> Payload<'a> {
    /// A field that is present and not `null`.
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.map.get(field).filter(|v| !v.is_null())
    }

    fn first_present(&self, fields: &[&'static str]) -> Option<(&'static str, &'a Value)> {
        fields
            .iter()
            .find_map(|field| self.get(field).map(|value| (*field, value)))
    }

    fn missing(&self, field: &'static str) -> PinHubError {
        PinHubError::MissingField {
            command: self.command,
            field,
        }
    }

    fn require<T>(
        &self,
        field: &'static str,
        read: impl Fn(&'static str, &Value) -> Result<T, PinHubError>,
    ) -> Result<T, PinHubError> {
        let value = self.get(field).ok_or_else(|| self.missing(field))?;
        read(field, value)
    }

    fn number(field: &'static str, value: &Value) -> Result<f64, PinHubError> {
        match value {
            Value::Number(n) => n.as_f64().ok_or_else(|| {
                InvalidValue::NotANumber {
                    field,
                    value: n.to_string(),
                }
                .into()
            }),
            Value::String(s) => s.trim().parse().map_err(|_| {
                InvalidValue::NotANumber {
                    field,
                    value: s.clone(),
                }
                .into()
            }),
            _ => Err(InvalidValue::WrongType {
                field,
                expected: "a number",
            }
            .into()),
        }
    }

    fn text(field: &'static str, value: &Value) -> Result<String, PinHubError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(_) | Value::Bool(_) => Ok(value.to_string()),
            _ => Err(InvalidValue::WrongType {
                field,
                expected: "a string",
            }
            .into()),
        }
    }

    fn integer_value(field: &'static str, value: &Value) -> Result<i64, PinHubError> {
        let not_integer = || -> PinHubError {
            InvalidValue::NotANumber {
                field,
                value: crate::sequence::stringify(value),
            }
            .into()
        };
        match value {
            Value::Number(n) => n.as_i64().ok_or_else(not_integer),
            Value::String(s) => {
                let s = s.trim();
                match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    Some(hex) => i64::from_str_radix(hex, 16).map_err(|_| not_integer()),
                    None => s.parse().map_err(|_| not_integer()),
                }
            }
            _ => Err(InvalidValue::WrongType {
                field,
                expected: "an integer",
            }
            .into()),
        }
    }

    fn text_field(&self, field: &'static str) -> Result<Option<String>, PinHubError> {
        self.get(field).map(|v| Self::text(field, v)).transpose()
    }

    fn integer(&self, field: &'static str) -> Result<Option<i64>, PinHubError> {
        self.get(field)
            .map(|v| Self::integer_value(field, v))
            .transpose()
    }

    /// A non-negative integer with a default.
    fn unsigned<T: TryFrom<i64>>(&self, field: &'static str, default: T) -> Result<T, PinHubError> {
        match self.integer(field)? {
            None => Ok(default),
            Some(raw) => T::try_from(raw).map_err(|_| out_of_range(field, "a non-negative integer", raw)),
        }
    }

    /// A duration in seconds with a default.
    fn seconds(&self, field: &'static str, default: f64) -> Result<f64, PinHubError> {
        let value = self
            .get(field)
            .map(|v| Self::number(field, v))
            .transpose()?
            .unwrap_or(default);
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(out_of_range(field, "a non-negative number of seconds", value))
        }
    }

    /// Booleans, numbers, or one of `true/1/high/on`.
    fn flag(&self, field: &'static str, default: bool) -> Result<bool, PinHubError> {
        Ok(match self.get(field) {
            None => default,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "high" | "on"
            ),
            Some(_) => {
                return Err(InvalidValue::WrongType {
                    field,
                    expected: "a boolean",
                }
                .into());
            }
        })
    }

    fn identifier(field: &'static str, value: &Value) -> Result<Identifier, PinHubError> {
        match value {
            Value::String(s) => Ok(Identifier::Name(s.clone())),
            Value::Number(n) => n.as_i64().map(Identifier::Number).ok_or_else(|| {
                InvalidValue::WrongType {
                    field,
                    expected: "a name or an integer pin number",
                }
                .into()
            }),
            _ => Err(InvalidValue::WrongType {
                field,
                expected: "a name or an integer pin number",
            }
            .into()),
        }
    }

    fn first_identifier(&self, fields: &[&'static str]) -> Result<Option<Identifier>, PinHubError> {
        self.first_present(fields)
            .filter(|(_, value)| value.as_str() != Some(""))
            .map(|(field, value)| Self::identifier(field, value))
            .transpose()
    }

    /// The `device` field, or `pin` as an alias.
    fn target(&self) -> Result<Identifier, PinHubError> {
        self.first_identifier(&["device", "pin"])?
            .ok_or_else(|| self.missing("device"))
    }

    fn steps(&self) -> Result<&'a [Value], PinHubError> {
        match self.get("steps") {
            Some(Value::Array(steps)) if !steps.is_empty() => Ok(steps),
            _ => Err(StructuralError::EmptySequence.into()),
        }
    }

    fn pin_field(&self, field: &'static str) -> Result<u32, PinHubError> {
        let raw = self.integer(field)?.ok_or_else(|| self.missing(field))?;
        Ok(crate::device::pin_number(raw)?)
    }

    fn lcd_panel(&self) -> Result<LcdPanel, PinHubError> {
        let cols: u16 = self.unsigned("cols", 16)?;
        let rows: u16 = self.unsigned("rows", 2)?;
        if cols == 0 {
            return Err(out_of_range("cols", "at least 1", cols));
        }
        if rows == 0 {
            return Err(out_of_range("rows", "at least 1", rows));
        }
        let mode = self.text_field("mode")?.unwrap_or_else(|| "i2c".to_string());
        let bus = match mode.as_str() {
            "i2c" => LcdBus::I2c {
                address: self.unsigned("i2c_address", 0x27)?,
            },
            "gpio" => {
                let rs = self.pin_field("rs_pin")?;
                let e = self.pin_field("e_pin")?;
                let pins = match self.get("data_pins") {
                    None => return Err(self.missing("data_pins")),
                    Some(Value::Array(pins)) if pins.len() == 4 => pins,
                    Some(_) => {
                        return Err(InvalidValue::WrongType {
                            field: "data_pins",
                            expected: "a list of 4 pin numbers [D4, D5, D6, D7]",
                        }
                        .into());
                    }
                };
                let mut data = [0_u32; 4];
                for (slot, pin) in data.iter_mut().zip(pins) {
                    *slot = crate::device::pin_number(Self::integer_value("data_pins", pin)?)?;
                }
                LcdBus::Gpio { rs, e, data }
            }
            other => {
                return Err(InvalidValue::NotOneOf {
                    field: "mode",
                    allowed: "i2c, gpio",
                    value: other.to_string(),
                }
                .into());
            }
        };
        Ok(LcdPanel { cols, rows, bus })
    }

    fn serial_link(&self) -> Result<SerialLink, PinHubError> {
        let defaults = SerialLink::default();
        let baud: u32 = self.unsigned("baud", defaults.baud)?;
        if baud == 0 {
            return Err(out_of_range("baud", "a positive baud rate", baud));
        }
        Ok(SerialLink {
            port: self.text_field("port")?.unwrap_or(defaults.port),
            baud,
        })
    }

    fn encoding(&self) -> Result<Encoding, PinHubError> {
        match self.text_field("encoding")? {
            Some(name) => Ok(name.parse()?),
            None => Ok(Encoding::default()),
        }
    }
}
