//! Routine service: saved sequences.

use pinhub_domain::error::PinHubError;
use pinhub_domain::routine::Routine;
use pinhub_domain::time::now;

use crate::ports::ConfigStore;

/// Application service for routine CRUD operations.
pub struct RoutineService<S> {
    store: S,
}

impl<S: ConfigStore> RoutineService<S> {
    /// Create a new service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validate and store a routine. Returns `true` if one was overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`PinHubError::Structural`] for empty or malformed steps,
    /// [`PinHubError::InvalidValue`] for an empty name, or a storage error.
    #[tracing::instrument(skip(self, description, steps), fields(steps = steps.len()))]
    pub async fn save(
        &self,
        name: &str,
        description: &str,
        steps: Vec<serde_json::Value>,
    ) -> Result<bool, PinHubError> {
        let routine = Routine::new(name, description, steps, now())?;
        self.store
            .update(move |config| Ok(config.routines.save(routine)))
            .await
    }

    /// Look up a routine by name.
    ///
    /// # Errors
    ///
    /// Returns [`PinHubError::UnknownRoutine`] listing the saved names, or a
    /// storage error.
    pub async fn find(&self, name: &str) -> Result<Routine, PinHubError> {
        self.store.load().await?.routines.find(name).cloned()
    }

    /// Delete a routine. Returns `false` when there was nothing to delete.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<bool, PinHubError> {
        let name = name.to_string();
        self.store
            .update(move |config| Ok(config.routines.remove(&name).is_some()))
            .await
    }

    /// All saved routines, in save order.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn list(&self) -> Result<Vec<Routine>, PinHubError> {
        Ok(self.store.load().await?.routines.iter().cloned().collect())
    }
}
