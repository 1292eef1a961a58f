//! # pinhub-adapter-storage-json
//!
//! Persists the device registry and routines as one JSON document
//! (`pin_config.json`).
//!
//! ## Responsibilities
//! - Implement [`pinhub_app::ports::ConfigStore`]
//! - Serialise concurrent invocations with an advisory `flock` on a sidecar
//!   `<file>.lock`
//! - Re-read the latest document under the lock, apply the change, and
//!   replace the file atomically (temp file in the same directory, fsync,
//!   rename)
//!
//! ## Dependency rule
//! Depends on `pinhub-app` (for port traits) and `pinhub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod error;
mod store;

pub use error::StoreError;
pub use store::JsonFileStore;
