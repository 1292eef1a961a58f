//! UART access through `rppal::uart`.

use std::time::{Duration, Instant};

use pinhub_app::ports::Peripherals;
use pinhub_domain::error::PinHubError;
use pinhub_domain::hardware::{DhtModel, DhtReading, LcdPanel, SerialLink};
use rppal::uart::{Parity, Uart};

use crate::error::RppalError;

/// Longest read timeout the UART driver accepts.
const MAX_READ_TIMEOUT: Duration = Duration::from_millis(25_500);

fn open(link: &SerialLink) -> Result<Uart, RppalError> {
    Ok(Uart::with_path(&link.port, link.baud, Parity::None, 8, 1)?)
}

fn write_blocking(link: &SerialLink, bytes: &[u8]) -> Result<usize, RppalError> {
    let mut uart = open(link)?;
    let mut written = 0;
    while written < bytes.len() {
        written += uart.write(&bytes[written..])?;
    }
    uart.drain()?;
    Ok(written)
}

/// Read until `max` bytes arrived, `timeout` elapsed or, when
/// `until_newline` is set, a `\n` was received.
fn read_blocking(
    link: &SerialLink,
    max: usize,
    timeout: Duration,
    until_newline: bool,
) -> Result<Vec<u8>, RppalError> {
    let mut uart = open(link)?;
    let deadline = Instant::now() + timeout;
    let mut received = Vec::new();
    let mut buffer = [0_u8; 64];
    while received.len() < max {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        uart.set_read_mode(0, remaining.min(MAX_READ_TIMEOUT))?;
        let wanted = if until_newline {
            1
        } else {
            (max - received.len()).min(buffer.len())
        };
        let count = uart.read(&mut buffer[..wanted])?;
        received.extend_from_slice(&buffer[..count]);
        if until_newline && count == 1 && buffer[0] == b'\n' {
            break;
        }
    }
    Ok(received)
}

/// Serial links over the Pi's UARTs.
///
/// Each call opens the port, does its work on a blocking thread and closes
/// it again.
#[derive(Debug, Clone, Copy, Default)]
pub struct RppalPeripherals;

impl RppalPeripherals {
    async fn blocking<T, F>(work: F) -> Result<T, PinHubError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, RppalError> + Send + 'static,
    {
        let value = tokio::task::spawn_blocking(work)
            .await
            .map_err(RppalError::from)??;
        Ok(value)
    }
}

impl Peripherals for RppalPeripherals {
    async fn read_dht(&self, pin: u32, model: DhtModel) -> Result<DhtReading, PinHubError> {
        Err(PinHubError::BackendUnavailable(format!(
            "rppal cannot read a {} sensor on pin {pin}",
            model.as_str()
        )))
    }

    async fn lcd_write(&self, panel: &LcdPanel, _line: u16, _text: &str) -> Result<(), PinHubError> {
        Err(PinHubError::BackendUnavailable(format!(
            "rppal cannot drive an LCD over {}",
            panel.bus.mode()
        )))
    }

    async fn lcd_clear(&self, panel: &LcdPanel) -> Result<(), PinHubError> {
        Err(PinHubError::BackendUnavailable(format!(
            "rppal cannot drive an LCD over {}",
            panel.bus.mode()
        )))
    }

    async fn serial_write(&self, link: &SerialLink, bytes: &[u8]) -> Result<usize, PinHubError> {
        let link = link.clone();
        let bytes = bytes.to_vec();
        Self::blocking(move || write_blocking(&link, &bytes)).await
    }

    async fn serial_read(
        &self,
        link: &SerialLink,
        max: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, PinHubError> {
        let link = link.clone();
        Self::blocking(move || read_blocking(&link, max, timeout, false)).await
    }

    async fn serial_readline(&self, link: &SerialLink, timeout: Duration) -> Result<Vec<u8>, PinHubError> {
        let link = link.clone();
        Self::blocking(move || read_blocking(&link, usize::MAX, timeout, true)).await
    }
}

#[cfg(test)]
mod tests {
    use pinhub_domain::hardware::LcdBus;

    use super::*;

    #[tokio::test]
    async fn should_not_offer_dht_or_lcd() {
        let peripherals = RppalPeripherals;
        let panel = LcdPanel {
            cols: 16,
            rows: 2,
            bus: LcdBus::I2c { address: 0x27 },
        };
        assert!(matches!(
            peripherals.read_dht(4, DhtModel::Dht22).await,
            Err(PinHubError::BackendUnavailable(_))
        ));
        assert!(matches!(
            peripherals.lcd_clear(&panel).await,
            Err(PinHubError::BackendUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn should_report_missing_port_as_hardware_error() {
        let link = SerialLink {
            port: "/nonexistent/ttyAMA9".into(),
            baud: 9600,
        };
        let err = RppalPeripherals
            .serial_write(&link, b"hello")
            .await
            .unwrap_err();
        assert!(matches!(err, PinHubError::HardwareIo { .. }));
    }
}
