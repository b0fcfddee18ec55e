//! # Error Types
//!
//! Custom error types for xpad-poll using `thiserror`.
//!
//! A disconnected controller is not an error: queries report it as `None`.

use thiserror::Error;

/// Main error type for xpad-poll
#[derive(Debug, Error)]
pub enum XpadError {
    /// Slot index outside `0..MAX_SLOTS`
    #[error("Slot index {slot} out of range (must be 0-3)")]
    SlotOutOfRange { slot: usize },

    /// Native backend errors
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for xpad-poll
pub type Result<T> = std::result::Result<T, XpadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_out_of_range_message() {
        let err = XpadError::SlotOutOfRange { slot: 7 };
        assert_eq!(err.to_string(), "Slot index 7 out of range (must be 0-3)");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: XpadError = io.into();
        assert!(matches!(err, XpadError::Io(_)));
    }
}
