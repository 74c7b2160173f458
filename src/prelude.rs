//! Convenient re-exports for common throttler types.
pub use crate::{
    config::{ThrottleConfig, ThrottleConfigBuilder},
    error::{ConfigError, ThrottleError},
    handle::ThrottleHandle,
    rate::{InvalidRateError, Rate},
    stream::{ThrottleExt, Throttled},
    throttler::Throttler,
};
