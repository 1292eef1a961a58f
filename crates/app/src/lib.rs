//! # pinhub-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `ConfigStore`: transactional load/update of the persisted snapshot
//!   - `PinIo`: digital, PWM and direction control of physical pins
//!   - `Peripherals`: DHT sensors, character LCDs and serial links
//! - Define **driving/inbound** use-cases:
//!   - `DeviceRegistry`: resolve, register, rename, unregister, list
//!   - `RoutineService`: save, find, delete, list
//!   - `Dispatcher`: runs one request, including sequences and routines
//! - Orchestrate domain objects without knowing *how* persistence or IO works
//!
//! ## Dependency rule
//! Depends on `pinhub-domain` only (plus `tokio::time` for sleeping).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod dispatcher;
pub mod interpreter;
pub mod pin_driver;
pub mod ports;
pub mod response;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
