//! rppal-specific error type.

use pinhub_domain::error::PinHubError;

#[derive(Debug, thiserror::Error)]
pub enum RppalError {
    #[error(transparent)]
    Gpio(#[from] rppal::gpio::Error),

    #[error(transparent)]
    Uart(#[from] rppal::uart::Error),

    /// BCM numbers on the Pi fit in a byte.
    #[error("pin {0} does not exist on this board")]
    PinNumber(u32),

    /// The blocking serial worker did not complete.
    #[error("serial task failed")]
    Task(#[from] tokio::task::JoinError),
}

impl From<RppalError> for PinHubError {
    fn from(err: RppalError) -> Self {
        let operation = match err {
            RppalError::Uart(_) | RppalError::Task(_) => "serial",
            RppalError::Gpio(_) | RppalError::PinNumber(_) => "gpio",
        };
        Self::hardware(operation, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_to_hardware_error() {
        let err = PinHubError::from(RppalError::PinNumber(300));
        assert!(matches!(err, PinHubError::HardwareIo { .. }));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("pin 300"));
    }
}
