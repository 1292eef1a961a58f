//! Name ↔ pin registry rules.
//!
//! Names and strings that read as pin numbers are disjoint, so an
//! identifier is looked up as a name first and only then read as a pin
//! number. At most one name maps to a given pin.

use crate::device::{Device, Identifier, PinAddress, pin_number, validate_name};
use crate::error::{InvalidValue, PinHubError};
use crate::pin_config::NamedTable;

/// The device table as stored in [`crate::pin_config::PinConfig`].
pub type DeviceTable = NamedTable<Device>;

/// What a `register` call changed besides writing the device.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Registration {
    /// The device previously stored under the same name.
    pub replaced: Option<Device>,
    /// Another name that was bound to the same pin and has been dropped.
    pub displaced: Option<String>,
}

impl NamedTable<Device> {
    /// The device registered on `pin`, if any.
    #[must_use]
    pub fn by_pin(&self, pin: u32) -> Option<&Device> {
        self.iter().find(|d| d.pin == pin)
    }

    /// Resolve a command target.
    ///
    /// # Errors
    ///
    /// Returns [`PinHubError::UnknownDevice`] when the identifier is neither a
    /// registered name nor a number, and [`PinHubError::InvalidValue`] for a
    /// negative pin number.
    pub fn resolve(&self, identifier: &Identifier) -> Result<PinAddress, PinHubError> {
        if let Some(device) = identifier.as_name().and_then(|name| self.get(name)) {
            return Ok(PinAddress::Registered(device.clone()));
        }
        let Some(raw) = identifier.as_number() else {
            return Err(PinHubError::UnknownDevice {
                identifier: identifier.to_string(),
            });
        };
        let pin = pin_number(raw)?;
        Ok(self
            .by_pin(pin)
            .map_or(PinAddress::Bare(pin), |d| PinAddress::Registered(d.clone())))
    }

    /// Insert or overwrite `device` under its name.
    ///
    /// Any other name bound to the same pin is removed.
    ///
    /// # Errors
    ///
    /// Returns [`PinHubError::InvalidValue`] if the device does not validate.
    pub fn register(&mut self, device: Device) -> Result<Registration, PinHubError> {
        device.validate()?;
        let displaced = self
            .by_pin(device.pin)
            .filter(|d| d.name != device.name)
            .map(|d| d.name.clone());
        if let Some(other) = &displaced {
            self.remove(other);
        }
        let replaced = self.upsert(device);
        Ok(Registration {
            replaced,
            displaced,
        })
    }

    /// Bind the pin behind `identifier` to `new_name`.
    ///
    /// The old name disappears in the same mutation. Renaming a bare pin
    /// creates a fresh `output` device.
    ///
    /// # Errors
    ///
    /// Returns [`PinHubError::UnknownDevice`] if `identifier` does not
    /// resolve, and [`PinHubError::InvalidValue`] if `new_name` is invalid or
    /// already used by another pin.
    pub fn rename(&mut self, identifier: &Identifier, new_name: &str) -> Result<Device, PinHubError> {
        validate_name(new_name)?;
        let address = self.resolve(identifier)?;
        let pin = address.pin();
        if let Some(existing) = self.get(new_name).filter(|d| d.pin != pin) {
            return Err(InvalidValue::NameInUse {
                name: new_name.to_string(),
                pin: existing.pin,
            }
            .into());
        }

        let renamed = match address {
            PinAddress::Registered(mut device) => {
                let idx = self.position(&device.name);
                device.name = new_name.to_string();
                match idx {
                    Some(idx) => {
                        self.replace_at(idx, device.clone());
                    }
                    None => {
                        self.upsert(device.clone());
                    }
                }
                device
            }
            PinAddress::Bare(pin) => {
                let device = Device::builder()
                    .name(new_name)
                    .pin(i64::from(pin))
                    .build()?;
                self.upsert(device.clone());
                device
            }
        };
        Ok(renamed)
    }

    /// Remove the registration behind a name or a pin number.
    ///
    /// A missing target is not an error; `None` is returned.
    pub fn unregister(&mut self, identifier: &Identifier) -> Option<Device> {
        if let Some(device) = identifier.as_name().and_then(|name| self.remove(name)) {
            return Some(device);
        }
        let pin = identifier
            .as_number()
            .and_then(|raw| u32::try_from(raw).ok())?;
        let name = self.by_pin(pin)?.name.clone();
        self.remove(&name)
    }
}
