use std::time::Duration;

use pinhub_app::ports::Peripherals;
use pinhub_domain::error::PinHubError;
use pinhub_domain::hardware::{DhtModel, DhtReading, LcdPanel, SerialLink};

use crate::VirtualBoard;

impl Peripherals for VirtualBoard {
    async fn read_dht(&self, pin: u32, model: DhtModel) -> Result<DhtReading, PinHubError> {
        tracing::trace!(pin, model = model.as_str(), "virtual dht read");
        self.lock_state()
            .dht
            .ok_or_else(|| PinHubError::retryable("dht_read", "checksum did not validate"))
    }

    async fn lcd_write(&self, panel: &LcdPanel, line: u16, text: &str) -> Result<(), PinHubError> {
        if line == 0 || line > panel.rows {
            return Err(PinHubError::hardware(
                "lcd_write",
                format!("line {line} is outside a {}-row display", panel.rows),
            ));
        }
        self.lock_state().lcd.insert(line, text.to_string());
        Ok(())
    }

    async fn lcd_clear(&self, _panel: &LcdPanel) -> Result<(), PinHubError> {
        self.lock_state().lcd.clear();
        Ok(())
    }

    async fn serial_write(&self, link: &SerialLink, bytes: &[u8]) -> Result<usize, PinHubError> {
        let mut state = self.lock_state();
        if state.loopback {
            state.serial.extend(bytes);
        }
        tracing::trace!(port = %link.port, len = bytes.len(), "virtual serial write");
        Ok(bytes.len())
    }

    async fn serial_read(
        &self,
        _link: &SerialLink,
        max: usize,
        _timeout: Duration,
    ) -> Result<Vec<u8>, PinHubError> {
        let mut state = self.lock_state();
        let count = max.min(state.serial.len());
        Ok(state.serial.drain(..count).collect())
    }

    async fn serial_readline(&self, _link: &SerialLink, _timeout: Duration) -> Result<Vec<u8>, PinHubError> {
        let mut state = self.lock_state();
        let count = state
            .serial
            .iter()
            .position(|&b| b == b'\n')
            .map_or(state.serial.len(), |i| i + 1);
        Ok(state.serial.drain(..count).collect())
    }
}
