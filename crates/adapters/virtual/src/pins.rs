use pinhub_app::ports::PinIo;
use pinhub_domain::error::PinHubError;
use pinhub_domain::hardware::PinMode;

use crate::VirtualBoard;

impl PinIo for VirtualBoard {
    fn backend(&self) -> &'static str {
        "virtual"
    }

    fn persistent(&self) -> bool {
        false
    }

    async fn write_digital(&self, pin: u32, high: bool) -> Result<(), PinHubError> {
        let mut state = self.lock_state();
        state.levels.insert(pin, high);
        state.pwm.remove(&pin);
        tracing::trace!(pin, high, "virtual write");
        Ok(())
    }

    async fn read_digital(&self, pin: u32, pull_up: bool) -> Result<bool, PinHubError> {
        Ok(self.lock_state().levels.get(&pin).copied().unwrap_or(pull_up))
    }

    async fn write_pwm(&self, pin: u32, duty_cycle: f64, frequency: f64) -> Result<(), PinHubError> {
        self.lock_state().pwm.insert(pin, (duty_cycle, frequency));
        tracing::trace!(pin, duty_cycle, frequency, "virtual pwm");
        Ok(())
    }

    async fn set_direction(&self, pin: u32, mode: PinMode) -> Result<(), PinHubError> {
        self.lock_state().modes.insert(pin, mode);
        Ok(())
    }
}
