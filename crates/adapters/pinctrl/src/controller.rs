//! [`PinIo`] implementation backed by the `pinctrl` executable.

use std::env;
use std::path::{Path, PathBuf};

use pinhub_app::ports::PinIo;
use pinhub_domain::error::PinHubError;
use pinhub_domain::hardware::PinMode;
use tokio::process::Command;

use crate::error::PinctrlError;

/// Name of the executable looked up on `PATH`.
pub const PROGRAM: &str = "pinctrl";

/// Locate an executable on `PATH`.
#[must_use]
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Extract the level from a `pinctrl get` line such as
/// `17: op -- pd | hi // GPIO17 = output`.
fn parse_level(output: &str) -> Option<bool> {
    let (_, after) = output.split_once('|')?;
    match after.split_whitespace().next()?.to_ascii_lowercase().as_str() {
        "hi" => Some(true),
        "lo" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct PinctrlController {
    program: PathBuf,
}

impl PinctrlController {
    /// Use `pinctrl` from `PATH`, if it is installed.
    #[must_use]
    pub fn detect() -> Option<Self> {
        find_on_path(PROGRAM).map(Self::with_program)
    }

    /// Use a specific executable.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run(&self, arguments: &[&str]) -> Result<String, PinctrlError> {
        tracing::debug!(program = %self.program.display(), ?arguments, "running pinctrl");
        let output = Command::new(&self.program)
            .args(arguments)
            .output()
            .await
            .map_err(|source| PinctrlError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(PinctrlError::Failed {
                arguments: arguments.join(" "),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl PinIo for PinctrlController {
    fn backend(&self) -> &'static str {
        "pinctrl"
    }

    fn persistent(&self) -> bool {
        true
    }

    async fn write_digital(&self, pin: u32, high: bool) -> Result<(), PinHubError> {
        let level = if high { "dh" } else { "dl" };
        self.run(&["set", &pin.to_string(), "op", level]).await?;
        Ok(())
    }

    /// `pinctrl get` reports the pad level without reconfiguring the pin,
    /// so the pull-up hint is not applied here.
    async fn read_digital(&self, pin: u32, _pull_up: bool) -> Result<bool, PinHubError> {
        let output = self.run(&["get", &pin.to_string()]).await?;
        let level = parse_level(&output)
            .ok_or_else(|| PinctrlError::UnexpectedOutput(output.trim().to_string()))?;
        Ok(level)
    }

    async fn write_pwm(&self, pin: u32, _duty_cycle: f64, _frequency: f64) -> Result<(), PinHubError> {
        Err(PinHubError::BackendUnavailable(format!(
            "pinctrl cannot generate PWM on pin {pin}"
        )))
    }

    async fn set_direction(&self, pin: u32, mode: PinMode) -> Result<(), PinHubError> {
        let flag = match mode {
            PinMode::Input => "ip",
            PinMode::Output => "op",
        };
        self.run(&["set", &pin.to_string(), flag]).await?;
        Ok(())
    }
}
