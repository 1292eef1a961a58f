//! # pinhub-domain
//!
//! Pure domain model for pinhub, a named-pin controller with a small
//! sequence interpreter on top.
//!
//! ## Responsibilities
//! - Foundational types: error taxonomy, timestamps
//! - Define **Devices** (a name bound to a pin with wiring options)
//! - Define the **Registry** table and its name/pin consistency rules
//! - Define **Routines** (named, persisted step lists)
//! - Define **Commands** (the closed set of requests, parsed from JSON)
//! - Define **Sequences** (steps, templates, conditions, bindings)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod time;

pub mod command;
pub mod device;
pub mod hardware;
pub mod pin_config;
pub mod registry;
pub mod routine;
pub mod sequence;
