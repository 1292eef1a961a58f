//! Device registry service: name ↔ pin bindings.

use pinhub_domain::device::{Device, Identifier, PinAddress};
use pinhub_domain::error::PinHubError;
use pinhub_domain::registry::Registration;

use crate::ports::ConfigStore;

/// Application service for resolving and editing device registrations.
pub struct DeviceRegistry<S> {
    store: S,
}

impl<S: ConfigStore> DeviceRegistry<S> {
    /// Create a new service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Turn a name or pin number into a pin address.
    ///
    /// # Errors
    ///
    /// Returns [`PinHubError::UnknownDevice`] when the identifier is neither a
    /// registered name nor a pin number, or a storage error.
    #[tracing::instrument(skip(self), fields(%identifier))]
    pub async fn resolve(&self, identifier: &Identifier) -> Result<PinAddress, PinHubError> {
        self.store.load().await?.devices.resolve(identifier)
    }

    /// Register (or overwrite) a device.
    ///
    /// # Errors
    ///
    /// Returns [`PinHubError::InvalidValue`] if the device does not validate,
    /// or a storage error.
    #[tracing::instrument(skip(self, device), fields(name = %device.name, pin = device.pin))]
    pub async fn register(&self, device: Device) -> Result<Registration, PinHubError> {
        let registration = self
            .store
            .update(move |config| config.devices.register(device))
            .await?;
        if let Some(displaced) = &registration.displaced {
            tracing::info!(%displaced, "dropped previous name for pin");
        }
        Ok(registration)
    }

    /// Give the pin behind `identifier` a new name.
    ///
    /// # Errors
    ///
    /// Returns [`PinHubError::UnknownDevice`] for an unresolvable target,
    /// [`PinHubError::InvalidValue`] for an invalid or taken name, or a
    /// storage error.
    #[tracing::instrument(skip(self), fields(%identifier))]
    pub async fn rename(&self, identifier: &Identifier, new_name: &str) -> Result<Device, PinHubError> {
        let identifier = identifier.clone();
        let new_name = new_name.to_string();
        self.store
            .update(move |config| config.devices.rename(&identifier, &new_name))
            .await
    }

    /// Drop a registration. Returns the removed device, if there was one.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[tracing::instrument(skip(self), fields(%identifier))]
    pub async fn unregister(&self, identifier: &Identifier) -> Result<Option<Device>, PinHubError> {
        let identifier = identifier.clone();
        self.store
            .update(move |config| Ok(config.devices.unregister(&identifier)))
            .await
    }

    /// All registered devices, in registration order.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn list(&self) -> Result<Vec<Device>, PinHubError> {
        Ok(self.store.load().await?.devices.iter().cloned().collect())
    }
}
