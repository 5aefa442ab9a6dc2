//! Session configuration

use crate::retransmit::Tick;
use thiserror::Error;

/// Largest accepted window. Keeps every in-window distance far below half
/// the 32-bit sequence space and bounds the slot ring allocation.
pub const MAX_WINDOW_SIZE: usize = 1 << 16;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Window size must be positive")]
    ZeroWindow,

    #[error("Window size {0} exceeds maximum {}", MAX_WINDOW_SIZE)]
    WindowTooLarge(usize),

    #[error("Retransmission timeout must be at least one tick")]
    ZeroTimeout,
}

/// Per-session protocol parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bounds both the sender's in-flight packets and the receiver's
    /// reorder buffer
    pub window_size: usize,
    /// Ticks a packet may stay unacknowledged before it is resent
    pub retransmission_timeout: Tick,
}

impl SessionConfig {
    pub fn new(window_size: usize, retransmission_timeout: Tick) -> Result<Self, ConfigError> {
        let config = SessionConfig {
            window_size,
            retransmission_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.window_size > MAX_WINDOW_SIZE {
            return Err(ConfigError::WindowTooLarge(self.window_size));
        }
        if self.retransmission_timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            window_size: 8,
            retransmission_timeout: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_window() {
        assert_eq!(SessionConfig::new(0, 3), Err(ConfigError::ZeroWindow));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        assert_eq!(SessionConfig::new(4, 0), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn test_rejects_huge_window() {
        assert_eq!(
            SessionConfig::new(MAX_WINDOW_SIZE + 1, 3),
            Err(ConfigError::WindowTooLarge(MAX_WINDOW_SIZE + 1))
        );
    }
}
