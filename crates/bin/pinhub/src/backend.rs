//! Backend selection: decides once per process which adapter drives the
//! pins and which one serves sensors, displays and serial links.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use pinhub_adapter_pinctrl::{PROGRAM, PinctrlController, find_on_path};
use pinhub_adapter_rppal::{RppalController, RppalPeripherals};
use pinhub_adapter_virtual::VirtualBoard;
use pinhub_app::ports::{Peripherals, PinIo};
use pinhub_domain::error::PinHubError;
use pinhub_domain::hardware::{BackendProbe, DhtModel, DhtReading, LcdPanel, PinMode, SerialLink};
use serde::Deserialize;

/// Which pin backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `pinctrl` when installed, then `rppal`.
    #[default]
    Auto,
    Pinctrl,
    Rppal,
    Virtual,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Pinctrl => "pinctrl",
            Self::Rppal => "rppal",
            Self::Virtual => "virtual",
        })
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "pinctrl" => Ok(Self::Pinctrl),
            "rppal" => Ok(Self::Rppal),
            "virtual" => Ok(Self::Virtual),
            other => Err(format!(
                "unknown backend `{other}` (expected auto, pinctrl, rppal or virtual)"
            )),
        }
    }
}

/// The active pin backend.
pub enum Backend {
    /// `pinctrl` for levels and direction, with rppal for PWM when it can
    /// open GPIO.
    Pinctrl {
        controller: PinctrlController,
        pwm: Option<RppalController>,
    },
    Rppal(RppalController),
    Virtual(VirtualBoard),
    /// No backend could be opened; pin operations fail with the reason.
    /// Registry and routine commands still work.
    Unavailable(String),
}

fn unavailable(reason: &str) -> PinHubError {
    PinHubError::BackendUnavailable(reason.to_string())
}

impl PinIo for Backend {
    fn backend(&self) -> &'static str {
        match self {
            Self::Pinctrl { controller, .. } => controller.backend(),
            Self::Rppal(controller) => controller.backend(),
            Self::Virtual(board) => board.backend(),
            Self::Unavailable(_) => "none",
        }
    }

    fn persistent(&self) -> bool {
        match self {
            Self::Pinctrl { controller, .. } => controller.persistent(),
            Self::Rppal(controller) => controller.persistent(),
            Self::Virtual(board) => board.persistent(),
            Self::Unavailable(_) => false,
        }
    }

    async fn write_digital(&self, pin: u32, high: bool) -> Result<(), PinHubError> {
        match self {
            Self::Pinctrl { controller, .. } => controller.write_digital(pin, high).await,
            Self::Rppal(controller) => controller.write_digital(pin, high).await,
            Self::Virtual(board) => board.write_digital(pin, high).await,
            Self::Unavailable(reason) => Err(unavailable(reason)),
        }
    }

    async fn read_digital(&self, pin: u32, pull_up: bool) -> Result<bool, PinHubError> {
        match self {
            Self::Pinctrl { controller, .. } => controller.read_digital(pin, pull_up).await,
            Self::Rppal(controller) => controller.read_digital(pin, pull_up).await,
            Self::Virtual(board) => board.read_digital(pin, pull_up).await,
            Self::Unavailable(reason) => Err(unavailable(reason)),
        }
    }

    async fn write_pwm(&self, pin: u32, duty_cycle: f64, frequency: f64) -> Result<(), PinHubError> {
        match self {
            Self::Pinctrl { pwm: Some(rppal), .. } | Self::Rppal(rppal) => {
                rppal.write_pwm(pin, duty_cycle, frequency).await
            }
            Self::Pinctrl { controller, pwm: None } => {
                controller.write_pwm(pin, duty_cycle, frequency).await
            }
            Self::Virtual(board) => board.write_pwm(pin, duty_cycle, frequency).await,
            Self::Unavailable(reason) => Err(unavailable(reason)),
        }
    }

    async fn set_direction(&self, pin: u32, mode: PinMode) -> Result<(), PinHubError> {
        match self {
            Self::Pinctrl { controller, .. } => controller.set_direction(pin, mode).await,
            Self::Rppal(controller) => controller.set_direction(pin, mode).await,
            Self::Virtual(board) => board.set_direction(pin, mode).await,
            Self::Unavailable(reason) => Err(unavailable(reason)),
        }
    }
}

/// Sensors, displays and serial links, paired with the pin backend.
pub enum Board {
    Rppal(RppalPeripherals),
    Virtual(VirtualBoard),
}

impl Peripherals for Board {
    async fn read_dht(&self, pin: u32, model: DhtModel) -> Result<DhtReading, PinHubError> {
        match self {
            Self::Rppal(uart) => uart.read_dht(pin, model).await,
            Self::Virtual(board) => board.read_dht(pin, model).await,
        }
    }

    async fn lcd_write(&self, panel: &LcdPanel, line: u16, text: &str) -> Result<(), PinHubError> {
        match self {
            Self::Rppal(uart) => uart.lcd_write(panel, line, text).await,
            Self::Virtual(board) => board.lcd_write(panel, line, text).await,
        }
    }

    async fn lcd_clear(&self, panel: &LcdPanel) -> Result<(), PinHubError> {
        match self {
            Self::Rppal(uart) => uart.lcd_clear(panel).await,
            Self::Virtual(board) => board.lcd_clear(panel).await,
        }
    }

    async fn serial_write(&self, link: &SerialLink, bytes: &[u8]) -> Result<usize, PinHubError> {
        match self {
            Self::Rppal(uart) => uart.serial_write(link, bytes).await,
            Self::Virtual(board) => board.serial_write(link, bytes).await,
        }
    }

    async fn serial_read(
        &self,
        link: &SerialLink,
        max: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, PinHubError> {
        match self {
            Self::Rppal(uart) => uart.serial_read(link, max, timeout).await,
            Self::Virtual(board) => board.serial_read(link, max, timeout).await,
        }
    }

    async fn serial_readline(&self, link: &SerialLink, timeout: Duration) -> Result<Vec<u8>, PinHubError> {
        match self {
            Self::Rppal(uart) => uart.serial_readline(link, timeout).await,
            Self::Virtual(board) => board.serial_readline(link, timeout).await,
        }
    }
}

fn open_pinctrl() -> Result<Backend, String> {
    let controller = PinctrlController::detect().ok_or_else(|| format!("`{PROGRAM}` is not on PATH"))?;
    Ok(Backend::Pinctrl {
        controller,
        pwm: RppalController::new().ok(),
    })
}

fn open_rppal() -> Result<Backend, String> {
    RppalController::new()
        .map(Backend::Rppal)
        .map_err(|err| format!("rppal could not open GPIO: {err}"))
}

/// Open the backend for `kind`.
///
/// Never fails: when nothing can be opened the result is
/// [`Backend::Unavailable`] so that commands which do not touch pins keep
/// working.
#[must_use]
pub fn select(kind: BackendKind) -> (Backend, Board) {
    let pins = match kind {
        BackendKind::Virtual => {
            let board = VirtualBoard::new();
            return (Backend::Virtual(board.clone()), Board::Virtual(board));
        }
        BackendKind::Pinctrl => open_pinctrl(),
        BackendKind::Rppal => open_rppal(),
        BackendKind::Auto => open_pinctrl().or_else(|pinctrl| {
            open_rppal().map_err(|rppal| format!("no GPIO backend found: {pinctrl}; {rppal}"))
        }),
    };
    let pins = pins.unwrap_or_else(|reason| {
        tracing::warn!(%kind, %reason, "pin backend unavailable");
        Backend::Unavailable(reason)
    });
    tracing::debug!(%kind, backend = pins.backend(), "selected pin backend");
    (pins, Board::Rppal(RppalPeripherals))
}

/// Availability of every backend on this host, in order of preference.
#[must_use]
pub fn probe() -> Vec<BackendProbe> {
    vec![
        BackendProbe {
            name: "pinctrl".into(),
            available: find_on_path(PROGRAM).is_some(),
            persistent: true,
        },
        BackendProbe {
            name: "rppal".into(),
            available: RppalController::is_available(),
            persistent: false,
        },
        BackendProbe {
            name: "virtual".into(),
            available: true,
            persistent: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_backend_names() {
        assert_eq!("virtual".parse::<BackendKind>().unwrap(), BackendKind::Virtual);
        assert_eq!(" PINCTRL ".parse::<BackendKind>().unwrap(), BackendKind::Pinctrl);
        assert!("gpiozero".parse::<BackendKind>().is_err());
    }

    #[test]
    fn should_select_virtual_board() {
        let (pins, board) = select(BackendKind::Virtual);
        assert_eq!(pins.backend(), "virtual");
        assert!(matches!(board, Board::Virtual(_)));
    }

    #[tokio::test]
    async fn should_share_virtual_state_between_pins_and_board() {
        let (pins, board) = select(BackendKind::Virtual);
        let (Backend::Virtual(a), Board::Virtual(b)) = (&pins, &board) else {
            panic!("expected virtual backend");
        };
        a.write_digital(4, true).await.unwrap();
        assert_eq!(b.level(4), Some(true));
    }

    #[tokio::test]
    async fn should_fail_pin_operations_when_unavailable() {
        let pins = Backend::Unavailable("no gpio".into());
        let err = pins.write_digital(17, true).await.unwrap_err();
        assert!(matches!(err, PinHubError::BackendUnavailable(reason) if reason == "no gpio"));
        assert_eq!(pins.backend(), "none");
    }

    #[test]
    fn should_always_offer_virtual_probe() {
        let probes = probe();
        let names: Vec<_> = probes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["pinctrl", "rppal", "virtual"]);
        assert!(probes[2].available);
        assert!(probes[0].persistent);
    }
}
