//! Logical pin access on top of the raw [`PinIo`] port.
//!
//! Handlers speak in logical levels ("on" means the device is on). The
//! driver maps them to physical levels using the device's wiring options.

use pinhub_domain::device::PinAddress;
use pinhub_domain::error::{InvalidValue, PinHubError};
use pinhub_domain::hardware::PinMode;

use crate::ports::PinIo;

/// PWM frequency used for hobby servos.
pub const SERVO_FREQUENCY_HZ: f64 = 50.0;

/// Duty cycle for a servo angle: 1 ms (5%) at 0° up to 2 ms (10%) at 180°.
#[must_use]
pub fn servo_duty_cycle(angle: f64) -> f64 {
    0.05 + (angle / 180.0) * 0.05
}

/// Applies `active_low` and `pull_up` and validates PWM parameters.
pub struct PinDriver<P> {
    io: P,
}

impl<P: PinIo> PinDriver<P> {
    pub fn new(io: P) -> Self {
        Self { io }
    }

    /// Name of the backend behind this driver.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.io.backend()
    }

    /// Whether pin state outlives the process.
    #[must_use]
    pub fn persistent(&self) -> bool {
        self.io.persistent()
    }

    /// Drive the pin to a logical level and return that level.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn write(&self, address: &PinAddress, on: bool) -> Result<bool, PinHubError> {
        let physical = on ^ address.active_low();
        self.io.write_digital(address.pin(), physical).await?;
        tracing::debug!(pin = address.pin(), on, physical, "wrote pin");
        Ok(on)
    }

    /// Read the logical level of a pin.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn read(&self, address: &PinAddress) -> Result<bool, PinHubError> {
        let physical = self
            .io
            .read_digital(address.pin(), address.pull_up())
            .await?;
        Ok(physical ^ address.active_low())
    }

    /// Start PWM output. The duty cycle is not inverted for `active_low`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidValue::DutyCycleOutOfRange`] outside `[0, 1]`,
    /// [`InvalidValue::OutOfRange`] for a non-positive frequency, and
    /// propagates backend failures.
    pub async fn pwm(
        &self,
        address: &PinAddress,
        duty_cycle: f64,
        frequency: f64,
    ) -> Result<(), PinHubError> {
        if !(0.0..=1.0).contains(&duty_cycle) {
            return Err(InvalidValue::DutyCycleOutOfRange(duty_cycle).into());
        }
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(InvalidValue::OutOfRange {
                field: "frequency",
                expected: "a positive number of hertz",
                value: frequency.to_string(),
            }
            .into());
        }
        self.io.write_pwm(address.pin(), duty_cycle, frequency).await
    }

    /// Configure the pin as input or output.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn set_direction(&self, address: &PinAddress, mode: PinMode) -> Result<(), PinHubError> {
        self.io.set_direction(address.pin(), mode).await
    }
}
