//! # pinhub-adapter-rppal
//!
//! Pin and serial access through [`rppal`].
//!
//! ## Responsibilities
//! - [`RppalController`] implements [`pinhub_app::ports::PinIo`]: digital
//!   levels, software PWM and pin direction. Pins are held for the life of
//!   the controller, so a level or PWM signal lasts until the process exits.
//! - [`RppalPeripherals`] implements [`pinhub_app::ports::Peripherals`]:
//!   serial links through `rppal::uart`. DHT sensors and LCDs need bit-level
//!   protocols this adapter does not implement and report
//!   `BackendUnavailable`.
//!
//! ## Dependency rule
//! Depends on `pinhub-app` (port traits) and `pinhub-domain` only.

mod error;
mod gpio;
mod serial;

pub use error::RppalError;
pub use gpio::RppalController;
pub use serial::RppalPeripherals;
