//! # pinhub: GPIO command runner
//!
//! Composition root that wires the adapters together and answers one
//! JSON request.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars, CLI flags)
//! - Select the pin backend once per process
//! - Construct the JSON file store and the dispatcher, injecting adapters
//!   via port traits
//! - Turn the request text into exactly one response object
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

pub mod backend;
pub mod config;

use pinhub_adapter_storage_json::JsonFileStore;
use pinhub_app::dispatcher::Dispatcher;
use pinhub_app::response::{Failure, to_response};
use pinhub_domain::error::{PinHubError, StructuralError};
use serde_json::Value;

use crate::config::Config;

/// Parse the request text. It must be a single JSON value.
///
/// # Errors
///
/// Returns a structural error for empty input or malformed JSON.
pub fn parse_request(input: &str) -> Result<Value, PinHubError> {
    if input.trim().is_empty() {
        return Err(StructuralError::InvalidRequest("no request given".to_string()).into());
    }
    serde_json::from_str(input)
        .map_err(|err| StructuralError::InvalidRequest(format!("request is not valid JSON: {err}")).into())
}

/// Answer one request with the backend and store named by `config`.
pub async fn answer(config: &Config, input: &str) -> Value {
    let request = match parse_request(input) {
        Ok(request) => request,
        Err(err) => return to_response(Err(Failure::new(err))),
    };
    let (pins, board) = backend::select(config.backend.kind);
    let store = JsonFileStore::new(&config.store.path);
    Dispatcher::new(store, pins, board)
        .with_backend_probes(backend::probe())
        .handle(&request)
        .await
}

/// Whether a response reports success.
#[must_use]
pub fn succeeded(response: &Value) -> bool {
    response.get("success").and_then(Value::as_bool) == Some(true)
}
