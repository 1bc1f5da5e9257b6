//! game configuration

use std::time::Duration;

/// knobs shared by every deck in a game
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameConfig {
    /// how long a deck waits on other peers before reporting a timeout
    pub protocol_timeout: Duration,
    /// how often the session driver checks for timeouts
    pub timeout_check_interval: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            protocol_timeout: Duration::from_secs(30),
            timeout_check_interval: Duration::from_secs(1),
        }
    }
}

impl GameConfig {
    pub fn with_timeout(protocol_timeout: Duration) -> Self {
        Self {
            protocol_timeout,
            ..Self::default()
        }
    }

    /// validate config is consistent
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.timeout_check_interval.is_zero() {
            return Err(ConfigError::InvalidCheckInterval);
        }
        if self.timeout_check_interval > self.protocol_timeout {
            return Err(ConfigError::CheckIntervalTooLong);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("protocol timeout must be > 0")]
    InvalidTimeout,
    #[error("timeout check interval must be > 0")]
    InvalidCheckInterval,
    #[error("timeout check interval must not exceed the protocol timeout")]
    CheckIntervalTooLong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = GameConfig::default();
        assert_eq!(config.protocol_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut config = GameConfig::with_timeout(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::InvalidTimeout));

        config.protocol_timeout = Duration::from_millis(500);
        assert_eq!(config.validate(), Err(ConfigError::CheckIntervalTooLong));

        config.timeout_check_interval = Duration::ZERO;
        assert_eq!(config.validate(), Err(ConfigError::InvalidCheckInterval));
    }
}
