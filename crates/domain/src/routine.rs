//! Routine: a named, persisted list of sequence steps.

use serde::{Deserialize, Serialize};

use crate::error::{InvalidValue, PinHubError};
use crate::pin_config::NamedTable;
use crate::sequence::Step;
use crate::time::Timestamp;

/// Routines as stored in [`crate::pin_config::PinConfig`].
pub type RoutineTable = NamedTable<Routine>;

/// A saved sequence.
///
/// Steps are kept as the JSON the caller sent; they are parsed again each
/// time the routine runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Routine {
    /// Build a routine, checking that every step parses.
    ///
    /// # Errors
    ///
    /// Returns [`PinHubError::InvalidValue`] for an empty name and
    /// [`PinHubError::Structural`] when the steps are empty or malformed.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<serde_json::Value>,
        now: Timestamp,
    ) -> Result<Self, PinHubError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(InvalidValue::EmptyName.into());
        }
        Step::parse_all(&steps, 1)?;
        Ok(Self {
            name,
            description: description.into(),
            steps,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    /// The record reported by `list_routines`.
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "steps": self.steps.len(),
            "description": self.description,
        })
    }
}

impl NamedTable<Routine> {
    /// Store `routine`, keeping the creation time of the one it replaces.
    ///
    /// Returns `true` when an existing routine was overwritten.
    pub fn save(&mut self, mut routine: Routine) -> bool {
        if let Some(existing) = self.get(&routine.name) {
            routine.created_at = existing.created_at.or(routine.created_at);
        }
        self.upsert(routine).is_some()
    }

    /// Look up a routine to run.
    ///
    /// # Errors
    ///
    /// Returns [`PinHubError::UnknownRoutine`] listing the saved names.
    pub fn find(&self, name: &str) -> Result<&Routine, PinHubError> {
        self.get(name).ok_or_else(|| PinHubError::UnknownRoutine {
            name: name.to_string(),
            available: self.names().map(str::to_string).collect(),
        })
    }
}
