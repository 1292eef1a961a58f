//! # pinhub-adapter-virtual
//!
//! A simulated board used by the test suites and on hosts without GPIO.
//!
//! ## Behaviour
//!
//! | Capability | Simulation |
//! |------------|------------|
//! | Digital pins | Levels kept in memory; an undriven input reads its pull-up |
//! | PWM | Last duty cycle and frequency per pin |
//! | DHT sensors | A fixed reading (21.5 °C, 45 %) that tests may change or break |
//! | LCD | One text buffer per line |
//! | Serial | Loopback: written bytes become readable |
//!
//! Pin state lives only as long as the process, so the backend reports
//! itself as not persistent.
//!
//! ## Dependency rule
//!
//! Depends on `pinhub-app` (port traits) and `pinhub-domain` only.

mod board;
mod peripherals;
mod pins;

pub use board::VirtualBoard;
