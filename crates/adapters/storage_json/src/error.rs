//! Storage-specific error type.

use std::path::PathBuf;

use pinhub_domain::error::PinHubError;

/// Errors originating from the JSON file store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading, writing or renaming a file failed.
    #[error("i/o error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document exists but is not a valid configuration.
    #[error("invalid configuration in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The advisory lock could not be taken.
    #[error("could not lock {}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: nix::errno::Errno,
    },

    /// The blocking worker did not complete.
    #[error("storage task failed")]
    Task(#[from] tokio::task::JoinError),
}

impl From<StoreError> for PinHubError {
    fn from(err: StoreError) -> Self {
        Self::Storage(Box::new(err))
    }
}
