//! Application services: use-cases over the persisted configuration.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod device_registry;
pub mod routine_service;
