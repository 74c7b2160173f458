//! Throttle configuration.
//!
//! A configuration fixes three things for the life of one throttled flow:
//! - `rate`: target bytes per second.
//! - `chunk_time`: how long one chunk takes at full speed (default 100ms). The
//!   chunk size is `ceil(rate * chunk_time)`, at least one byte.
//! - `window_size`: how many chunk completions the pacing history keeps
//!   (default 30, three seconds at the default chunk time).
//!
//! ```rust
//! use std::time::Duration;
//! use throttler::ThrottleConfig;
//!
//! let config = ThrottleConfig::builder()
//!     .parse_rate("5M")
//!     .chunk_time(Duration::from_millis(50))
//!     .window_size(20)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.chunk_size(), 262_144);
//!
//! // A bare rate is shorthand for the defaults.
//! let config: ThrottleConfig = "2100k".parse().unwrap();
//! assert_eq!(config.window_size(), 30);
//! ```

use crate::error::ConfigError;
use crate::rate::{InvalidRateError, Rate};
use std::str::FromStr;
use std::time::Duration;

/// Default time one chunk takes at full speed.
pub const DEFAULT_CHUNK_TIME: Duration = Duration::from_millis(100);
/// Default number of checkpoints in the pacing window.
pub const DEFAULT_WINDOW_SIZE: usize = 30;

/// Validated configuration for a throttled flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "raw::RawConfig"))]
pub struct ThrottleConfig {
    rate: Rate,
    chunk_time: Duration,
    window_size: usize,
}

impl ThrottleConfig {
    /// Configuration for `rate` with default chunk time and window size.
    pub fn new(rate: Rate) -> Self {
        Self { rate, chunk_time: DEFAULT_CHUNK_TIME, window_size: DEFAULT_WINDOW_SIZE }
    }

    /// Construct a new builder with defaults.
    pub fn builder() -> ThrottleConfigBuilder {
        ThrottleConfigBuilder::new()
    }

    /// Target bytes per second.
    pub fn rate(&self) -> Rate {
        self.rate
    }

    /// Time one chunk takes at full speed.
    pub fn chunk_time(&self) -> Duration {
        self.chunk_time
    }

    /// Maximum number of checkpoints kept in the pacing window.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Size in bytes of one schedulable chunk.
    pub fn chunk_size(&self) -> u64 {
        self.rate.bytes_in(self.chunk_time)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::InvalidWindowSize(self.window_size));
        }
        Ok(())
    }
}

impl From<Rate> for ThrottleConfig {
    fn from(rate: Rate) -> Self {
        Self::new(rate)
    }
}

impl FromStr for ThrottleConfig {
    type Err = InvalidRateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self::new)
    }
}

/// Builder for [`ThrottleConfig`].
#[derive(Debug, Clone)]
pub struct ThrottleConfigBuilder {
    rate: Result<Rate, ConfigError>,
    chunk_time: Duration,
    window_size: usize,
}

impl ThrottleConfigBuilder {
    /// Create a builder with default chunk time and window size and no rate.
    pub fn new() -> Self {
        Self {
            rate: Err(ConfigError::MissingRate),
            chunk_time: DEFAULT_CHUNK_TIME,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    /// Set the rate.
    pub fn rate(mut self, rate: Rate) -> Self {
        self.rate = Ok(rate);
        self
    }

    /// Set the rate from a rate string such as `"5M"`. Parse errors surface
    /// from [`build`](Self::build).
    pub fn parse_rate(mut self, rate: &str) -> Self {
        self.rate = rate.parse().map_err(ConfigError::from);
        self
    }

    /// Set the time one chunk takes at full speed. Zero means 1-byte chunks.
    pub fn chunk_time(mut self, chunk_time: Duration) -> Self {
        self.chunk_time = chunk_time;
        self
    }

    /// Set the number of checkpoints in the pacing window. Must be > 0.
    pub fn window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<ThrottleConfig, ConfigError> {
        let config = ThrottleConfig {
            rate: self.rate?,
            chunk_time: self.chunk_time,
            window_size: self.window_size,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for ThrottleConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "serde")]
mod raw {
    //! Wire shape: either a bare rate, or `{ "rate", "chunkTimeMs", "windowSize" }`.

    use super::{ThrottleConfig, ThrottleConfigBuilder};
    use crate::error::ConfigError;
    use crate::rate::Rate;
    use std::time::Duration;

    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    pub(super) enum RawRate {
        Bytes(u64),
        Text(String),
    }

    impl TryFrom<RawRate> for Rate {
        type Error = ConfigError;

        fn try_from(raw: RawRate) -> Result<Self, Self::Error> {
            let rate = match raw {
                RawRate::Bytes(n) => Rate::bytes_per_second(n)?,
                RawRate::Text(s) => s.parse()?,
            };
            Ok(rate)
        }
    }

    #[derive(serde::Deserialize)]
    #[serde(rename_all = "camelCase", deny_unknown_fields)]
    pub(super) struct RawOptions {
        rate: RawRate,
        chunk_time_ms: Option<u64>,
        window_size: Option<usize>,
    }

    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    pub(super) enum RawConfig {
        Bare(RawRate),
        Options(RawOptions),
    }

    impl TryFrom<RawConfig> for ThrottleConfig {
        type Error = ConfigError;

        fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
            let options = match raw {
                RawConfig::Bare(rate) => return Ok(ThrottleConfig::new(Rate::try_from(rate)?)),
                RawConfig::Options(options) => options,
            };
            let mut builder = ThrottleConfigBuilder::new().rate(Rate::try_from(options.rate)?);
            if let Some(ms) = options.chunk_time_ms {
                builder = builder.chunk_time(Duration::from_millis(ms));
            }
            if let Some(size) = options.window_size {
                builder = builder.window_size(size);
            }
            builder.build()
        }
    }
}
