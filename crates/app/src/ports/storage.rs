//! Storage port: the persisted device and routine snapshot.

use std::future::Future;

use pinhub_domain::error::PinHubError;
use pinhub_domain::pin_config::PinConfig;

/// Transactional access to the [`PinConfig`] shared by every invocation.
///
/// Implementations must serialise `update` against other processes and
/// replace the stored snapshot atomically.
pub trait ConfigStore: Send + Sync {
    /// Read the current snapshot.
    fn load(&self) -> impl Future<Output = Result<PinConfig, PinHubError>> + Send;

    /// Read the latest snapshot, apply `change` and write it back.
    ///
    /// Nothing is written when `change` fails; its error is returned as is.
    fn update<T, F>(&self, change: F) -> impl Future<Output = Result<T, PinHubError>> + Send
    where
        T: Send + 'static,
        F: FnOnce(&mut PinConfig) -> Result<T, PinHubError> + Send + 'static;
}
