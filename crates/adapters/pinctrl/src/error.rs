//! Errors raised while running `pinctrl`.

use std::path::PathBuf;
use std::process::ExitStatus;

use pinhub_domain::error::PinHubError;

#[derive(Debug, thiserror::Error)]
pub enum PinctrlError {
    /// The program could not be started at all.
    #[error("could not run {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`pinctrl {arguments}` exited with {status}: {stderr}")]
    Failed {
        arguments: String,
        status: ExitStatus,
        stderr: String,
    },

    /// `pinctrl get` printed something without a level.
    #[error("cannot read a level from {0:?}")]
    UnexpectedOutput(String),
}

impl From<PinctrlError> for PinHubError {
    fn from(err: PinctrlError) -> Self {
        Self::hardware("pinctrl", err.to_string())
    }
}
