//! Dispatcher Configuration
//!
//! Runtime settings for a [`Dispatcher`](crate::dispatch::Dispatcher): the
//! default per-reaction timeout, a per-channel subscription cap, and whether
//! captured reaction failures are logged.
//!
//! ```rust
//! use std::time::Duration;
//! use dispatchcore::dispatch::DispatcherConfig;
//!
//! let config = DispatcherConfig::builder()
//!     .with_reaction_timeout(Duration::from_millis(250))
//!     .with_max_subscriptions(64)
//!     .build()?;
//! assert_eq!(config.reaction_timeout(), Some(Duration::from_millis(250)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Dispatcher configuration parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Default timeout applied to each reaction, in milliseconds (None = unbounded)
    pub reaction_timeout_ms: Option<u64>,

    /// Maximum subscriptions per channel (None = unlimited)
    pub max_subscriptions_per_channel: Option<usize>,

    /// Log captured reaction failures at warn level
    pub log_failures: bool,
}

/// Configuration validation error
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Reaction timeout must be greater than zero")]
    InvalidReactionTimeout,
    #[error("Maximum subscriptions per channel must be greater than zero")]
    InvalidSubscriptionLimit,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            reaction_timeout_ms: None,
            max_subscriptions_per_channel: None,
            log_failures: true,
        }
    }
}

impl DispatcherConfig {
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn reaction_timeout(&self) -> Option<Duration> {
        self.reaction_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reaction_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidReactionTimeout);
        }

        if self.max_subscriptions_per_channel == Some(0) {
            return Err(ConfigError::InvalidSubscriptionLimit);
        }

        Ok(())
    }
}

/// Configuration builder for fluent API
#[derive(Debug)]
pub struct DispatcherConfigBuilder {
    config: DispatcherConfig,
}

impl DispatcherConfigBuilder {
    /// Set the default per-reaction timeout, rounded up to whole milliseconds
    pub fn with_reaction_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_micros().div_ceil(1000);
        self.config.reaction_timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    /// Set the per-channel subscription cap
    pub fn with_max_subscriptions(mut self, limit: usize) -> Self {
        self.config.max_subscriptions_per_channel = Some(limit);
        self
    }

    pub fn with_failure_logging(mut self, enabled: bool) -> Self {
        self.config.log_failures = enabled;
        self
    }

    /// Build and validate
    pub fn build(self) -> Result<DispatcherConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
