//! Watch configuration.

use std::time::Duration;

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("window size {window} exceeds buffer capacity {capacity}")]
    WindowTooLarge { window: usize, capacity: usize },
}

/// Frame buffering and scheduling settings.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Frames retained per session
    pub buffer_capacity: usize,
    /// Frames sent per inference call
    pub window_size: usize,
    /// Time between scheduler ticks
    pub tick_interval: Duration,
    /// How long connection teardown waits for the scheduler
    pub shutdown_grace: Duration,
    /// Drop results whose prompt no longer matches the session's prompt
    pub drop_stale_results: bool,
    /// Evict sessions idle this long; `None` keeps them for the process lifetime
    pub session_idle_timeout: Option<Duration>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 9,
            window_size: 6,
            tick_interval: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(5),
            drop_stale_results: false,
            session_idle_timeout: None,
        }
    }
}

impl WatchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            buffer_capacity: std::env::var("WATCH_BUFFER_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.buffer_capacity),
            window_size: std::env::var("WATCH_WINDOW_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.window_size),
            tick_interval: std::env::var("WATCH_TICK_MILLIS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            shutdown_grace: std::env::var("WATCH_SHUTDOWN_GRACE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_grace),
            drop_stale_results: std::env::var("WATCH_DROP_STALE_RESULTS")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.drop_stale_results),
            session_idle_timeout: std::env::var("SESSION_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Zero("buffer capacity"));
        }
        if self.window_size == 0 {
            return Err(ConfigError::Zero("window size"));
        }
        if self.window_size > self.buffer_capacity {
            return Err(ConfigError::WindowTooLarge {
                window: self.window_size,
                capacity: self.buffer_capacity,
            });
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Zero("tick interval"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WatchConfig::default();
        assert_eq!(config.buffer_capacity, 9);
        assert_eq!(config.window_size, 6);
        assert!(config.session_idle_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = WatchConfig {
            buffer_capacity: 0,
            ..Default::default()
        };
        assert_eq!(zero.validate(), Err(ConfigError::Zero("buffer capacity")));

        let wide = WatchConfig {
            window_size: 10,
            ..Default::default()
        };
        assert_eq!(
            wide.validate(),
            Err(ConfigError::WindowTooLarge {
                window: 10,
                capacity: 9
            })
        );

        let still = WatchConfig {
            tick_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(still.validate().is_err());
    }
}
