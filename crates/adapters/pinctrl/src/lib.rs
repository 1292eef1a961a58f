//! # pinhub-adapter-pinctrl
//!
//! Pin control through the `pinctrl` utility shipped with Raspberry Pi OS.
//!
//! `pinctrl` writes the GPIO registers and exits, leaving the pin in the
//! state it was set to. That makes this the only backend whose levels
//! survive the end of the process.
//!
//! | Operation | Invocation |
//! |-----------|------------|
//! | write | `pinctrl set N op dh` / `pinctrl set N op dl` |
//! | read | `pinctrl get N`, level parsed after the `|` |
//! | direction | `pinctrl set N ip` / `pinctrl set N op` |
//!
//! PWM is not available; callers pair this controller with a transient
//! backend for that.
//!
//! ## Dependency rule
//!
//! Depends on `pinhub-app` (port traits) and `pinhub-domain` only.

mod controller;
mod error;

pub use controller::{PROGRAM, PinctrlController, find_on_path};
pub use error::PinctrlError;
