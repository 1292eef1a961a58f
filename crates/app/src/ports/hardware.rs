//! Hardware ports: pin control and the opaque peripheral calls.

use std::future::Future;
use std::time::Duration;

use pinhub_domain::error::PinHubError;
use pinhub_domain::hardware::{DhtModel, DhtReading, LcdPanel, PinMode, SerialLink};

/// Physical pin access.
///
/// Levels are physical: `true` drives the pin high. Active-low inversion is
/// applied above this port by [`crate::pin_driver::PinDriver`].
pub trait PinIo: Send + Sync {
    /// Short name reported in results (e.g. `"pinctrl"`).
    fn backend(&self) -> &'static str;

    /// Whether a written level survives the end of the process.
    fn persistent(&self) -> bool;

    fn write_digital(&self, pin: u32, high: bool) -> impl Future<Output = Result<(), PinHubError>> + Send;

    fn read_digital(&self, pin: u32, pull_up: bool) -> impl Future<Output = Result<bool, PinHubError>> + Send;

    /// Drive a PWM signal; `duty_cycle` is already checked to be in `[0, 1]`.
    fn write_pwm(
        &self,
        pin: u32,
        duty_cycle: f64,
        frequency: f64,
    ) -> impl Future<Output = Result<(), PinHubError>> + Send;

    fn set_direction(&self, pin: u32, mode: PinMode) -> impl Future<Output = Result<(), PinHubError>> + Send;
}

/// Sensors, displays and serial links.
///
/// Protocol details live entirely in the adapter; the application only
/// validates arguments and shapes results.
pub trait Peripherals: Send + Sync {
    /// Read a DHT sensor. Flaky reads should fail with a retryable
    /// [`PinHubError::HardwareIo`].
    fn read_dht(
        &self,
        pin: u32,
        model: DhtModel,
    ) -> impl Future<Output = Result<DhtReading, PinHubError>> + Send;

    /// Write an already fitted line of text (1-based `line`).
    fn lcd_write(
        &self,
        panel: &LcdPanel,
        line: u16,
        text: &str,
    ) -> impl Future<Output = Result<(), PinHubError>> + Send;

    fn lcd_clear(&self, panel: &LcdPanel) -> impl Future<Output = Result<(), PinHubError>> + Send;

    /// Send bytes, returning how many were written.
    fn serial_write(
        &self,
        link: &SerialLink,
        bytes: &[u8],
    ) -> impl Future<Output = Result<usize, PinHubError>> + Send;

    /// Read up to `max` bytes, returning early when `timeout` elapses.
    fn serial_read(
        &self,
        link: &SerialLink,
        max: usize,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, PinHubError>> + Send;

    /// Read up to and including a newline; an empty result means nothing
    /// arrived before `timeout`.
    fn serial_readline(
        &self,
        link: &SerialLink,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, PinHubError>> + Send;
}
