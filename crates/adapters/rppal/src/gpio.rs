//! Register-level GPIO through `rppal::gpio`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use pinhub_app::ports::PinIo;
use pinhub_domain::error::PinHubError;
use pinhub_domain::hardware::PinMode;
use rppal::gpio::{Gpio, InputPin, OutputPin};

use crate::error::RppalError;

pub(crate) fn bcm(pin: u32) -> Result<u8, RppalError> {
    u8::try_from(pin).map_err(|_| RppalError::PinNumber(pin))
}

/// A pin claimed from the GPIO peripheral.
enum Held {
    Output(OutputPin),
    Input { pin: InputPin, pull_up: bool },
}

/// Transient controller: claimed pins are released, and reset, when the
/// controller is dropped.
pub struct RppalController {
    gpio: Gpio,
    held: Mutex<HashMap<u8, Held>>,
}

impl RppalController {
    /// Open the GPIO peripheral.
    ///
    /// # Errors
    ///
    /// Fails when the host has no accessible GPIO (not a Raspberry Pi, or
    /// missing permissions on `/dev/gpiomem`).
    pub fn new() -> Result<Self, RppalError> {
        Ok(Self {
            gpio: Gpio::new()?,
            held: Mutex::new(HashMap::new()),
        })
    }

    /// Whether GPIO can be opened on this host.
    #[must_use]
    pub fn is_available() -> bool {
        Gpio::new().is_ok()
    }

    fn held(&self) -> MutexGuard<'_, HashMap<u8, Held>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `action` on the pin as an output, claiming it if needed.
    fn with_output<T>(
        &self,
        pin: u32,
        action: impl FnOnce(&mut OutputPin) -> Result<T, RppalError>,
    ) -> Result<T, RppalError> {
        let number = bcm(pin)?;
        let mut held = self.held();
        if let Some(Held::Output(output)) = held.get_mut(&number) {
            return action(output);
        }
        held.remove(&number);
        let mut output = self.gpio.get(number)?.into_output();
        let value = action(&mut output);
        held.insert(number, Held::Output(output));
        value
    }

    /// Claim the pin as an input and return its level.
    fn claim_input(
        &self,
        held: &mut HashMap<u8, Held>,
        number: u8,
        pull_up: bool,
    ) -> Result<bool, RppalError> {
        held.remove(&number);
        let pin = self.gpio.get(number)?;
        let pin = if pull_up {
            pin.into_input_pullup()
        } else {
            pin.into_input()
        };
        let level = pin.is_high();
        held.insert(number, Held::Input { pin, pull_up });
        Ok(level)
    }

    fn read(&self, pin: u32, pull_up: bool) -> Result<bool, RppalError> {
        let number = bcm(pin)?;
        let mut held = self.held();
        match held.get(&number) {
            Some(Held::Output(output)) => return Ok(output.is_set_high()),
            Some(Held::Input { pin, pull_up: current }) if *current == pull_up => {
                return Ok(pin.is_high());
            }
            _ => {}
        }
        self.claim_input(&mut held, number, pull_up)
    }
}

impl PinIo for RppalController {
    fn backend(&self) -> &'static str {
        "rppal"
    }

    fn persistent(&self) -> bool {
        false
    }

    async fn write_digital(&self, pin: u32, high: bool) -> Result<(), PinHubError> {
        self.with_output(pin, |output| {
            output.clear_pwm()?;
            if high {
                output.set_high();
            } else {
                output.set_low();
            }
            Ok(())
        })?;
        Ok(())
    }

    async fn read_digital(&self, pin: u32, pull_up: bool) -> Result<bool, PinHubError> {
        Ok(self.read(pin, pull_up)?)
    }

    async fn write_pwm(&self, pin: u32, duty_cycle: f64, frequency: f64) -> Result<(), PinHubError> {
        self.with_output(pin, |output| {
            output.set_pwm_frequency(frequency, duty_cycle)?;
            Ok(())
        })?;
        tracing::debug!(pin, duty_cycle, frequency, "software pwm started");
        Ok(())
    }

    async fn set_direction(&self, pin: u32, mode: PinMode) -> Result<(), PinHubError> {
        match mode {
            PinMode::Output => self.with_output(pin, |_| Ok(()))?,
            PinMode::Input => {
                let number = bcm(pin)?;
                self.claim_input(&mut self.held(), number, false)?;
            }
        }
        Ok(())
    }
}
