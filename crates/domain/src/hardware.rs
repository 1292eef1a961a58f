//! Value types passed to the pin and peripheral ports.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::InvalidValue;

/// Direction of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    Input,
    Output,
}

impl PinMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PinMode {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            other => Err(InvalidValue::NotOneOf {
                field: "mode",
                allowed: "input, output",
                value: other.to_string(),
            }),
        }
    }
}

/// DHT temperature/humidity sensor family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum DhtModel {
    #[serde(rename = "DHT11")]
    Dht11,
    #[default]
    #[serde(rename = "DHT22")]
    Dht22,
}

impl DhtModel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dht11 => "DHT11",
            Self::Dht22 => "DHT22",
        }
    }
}

impl FromStr for DhtModel {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DHT11" => Ok(Self::Dht11),
            "DHT22" => Ok(Self::Dht22),
            _ => Err(InvalidValue::NotOneOf {
                field: "sensor_type",
                allowed: "DHT11, DHT22",
                value: s.to_string(),
            }),
        }
    }
}

/// Raw measurement returned by a DHT sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DhtReading {
    pub temperature_c: f64,
    pub humidity_pct: f64,
}

impl DhtReading {
    #[must_use]
    pub fn temperature_f(&self) -> f64 {
        self.temperature_c * 9.0 / 5.0 + 32.0
    }
}

/// Round to one decimal place, as sensors report.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// How an HD44780 character display is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdBus {
    /// Behind a PCF8574 I2C backpack.
    I2c { address: u16 },
    /// Four-bit parallel wiring on GPIO pins.
    Gpio { rs: u32, e: u32, data: [u32; 4] },
}

impl LcdBus {
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Self::I2c { .. } => "i2c",
            Self::Gpio { .. } => "gpio",
        }
    }
}

/// A character display and its geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcdPanel {
    pub cols: u16,
    pub rows: u16,
    pub bus: LcdBus,
}

impl LcdPanel {
    /// Truncate or pad `text` to exactly one display line.
    #[must_use]
    pub fn fit(&self, text: &str) -> String {
        let width = usize::from(self.cols);
        let mut line: String = text.chars().take(width).collect();
        let len = line.chars().count();
        line.extend(std::iter::repeat_n(' ', width - len));
        line
    }

    /// Check that `line` (1-based) exists on this panel.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidValue::OutOfRange`] when it does not.
    pub fn check_line(&self, line: i64) -> Result<u16, InvalidValue> {
        u16::try_from(line)
            .ok()
            .filter(|l| (1..=self.rows).contains(l))
            .ok_or_else(|| InvalidValue::OutOfRange {
                field: "line",
                expected: "between 1 and the number of rows",
                value: line.to_string(),
            })
    }
}

/// A UART device and its speed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialLink {
    pub port: String,
    pub baud: u32,
}

impl Default for SerialLink {
    fn default() -> Self {
        Self {
            port: "/dev/serial0".to_string(),
            baud: 9600,
        }
    }
}

/// Text encoding used on a serial link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl Encoding {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin-1",
        }
    }

    /// # Errors
    ///
    /// Returns [`InvalidValue::Unencodable`] when `text` has characters
    /// outside the encoding's range.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, InvalidValue> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Ascii => {
                if text.is_ascii() {
                    Ok(text.as_bytes().to_vec())
                } else {
                    Err(InvalidValue::Unencodable(self.as_str()))
                }
            }
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| InvalidValue::Unencodable(self.as_str())))
                .collect(),
        }
    }

    /// Decode bytes, replacing anything invalid with U+FFFD.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { char::from(b) } else { char::REPLACEMENT_CHARACTER })
                .collect(),
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

impl FromStr for Encoding {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            _ => Err(InvalidValue::NotOneOf {
                field: "encoding",
                allowed: "utf-8, ascii, latin-1",
                value: s.to_string(),
            }),
        }
    }
}

/// Availability of one pin backend on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendProbe {
    pub name: String,
    pub available: bool,
    /// Whether pin state outlives the process.
    pub persistent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> LcdPanel {
        LcdPanel {
            cols: 8,
            rows: 2,
            bus: LcdBus::I2c { address: 0x27 },
        }
    }

    #[test]
    fn should_pad_and_truncate_lcd_text() {
        assert_eq!(panel().fit("hi"), "hi      ");
        assert_eq!(panel().fit("temperature"), "temperat");
        assert_eq!(panel().fit("héllo wörld"), "héllo wö");
    }

    #[test]
    fn should_validate_lcd_line() {
        assert_eq!(panel().check_line(2).unwrap(), 2);
        assert!(panel().check_line(0).is_err());
        assert!(panel().check_line(3).is_err());
    }

    #[test]
    fn should_encode_latin1_and_reject_wide_chars() {
        assert_eq!(Encoding::Latin1.encode("é").unwrap(), vec![0xE9]);
        assert!(Encoding::Latin1.encode("€").is_err());
        assert!(Encoding::Ascii.encode("é").is_err());
        assert_eq!(Encoding::Latin1.decode(&[0x41, 0xE9]), "Aé");
    }

    #[test]
    fn should_decode_utf8_lossily() {
        assert_eq!(Encoding::Utf8.decode(&[0x6F, 0x6B, 0xFF]), "ok\u{FFFD}");
    }

    #[test]
    fn should_parse_encoding_aliases() {
        assert_eq!("UTF8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("iso-8859-1".parse::<Encoding>().unwrap(), Encoding::Latin1);
        assert!("utf-16".parse::<Encoding>().is_err());
    }

    #[test]
    fn should_parse_dht_model_case_insensitively() {
        assert_eq!("dht11".parse::<DhtModel>().unwrap(), DhtModel::Dht11);
        assert!("DHT33".parse::<DhtModel>().is_err());
    }

    #[test]
    fn should_round_to_one_decimal() {
        assert!((round1(21.46) - 21.5).abs() < 1e-9);
        let reading = DhtReading {
            temperature_c: 20.0,
            humidity_pct: 40.0,
        };
        assert!((reading.temperature_f() - 68.0).abs() < 1e-9);
    }
}
