//! Error types for throttled flows
use crate::rate::InvalidRateError;
use std::fmt;

/// Errors produced while building a [`ThrottleConfig`](crate::ThrottleConfig).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No rate was given to the builder.
    #[error("rate is required")]
    MissingRate,
    /// The rate could not be parsed or was zero.
    #[error(transparent)]
    InvalidRate(#[from] InvalidRateError),
    /// `window_size` must be > 0.
    #[error("window_size must be > 0 (got {0})")]
    InvalidWindowSize(usize),
}

/// Error returned by the push-style [`Throttler`](crate::Throttler).
///
/// The pull-style [`Throttled`](crate::Throttled) stream never wraps errors: it
/// yields the upstream's own error value unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleError<E> {
    /// An upstream error delivered through a [`ThrottleHandle`](crate::ThrottleHandle).
    Upstream(E),
    /// The flow was closed, or already ended with an error.
    Closed,
}

impl<E: fmt::Display> fmt::Display for ThrottleError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upstream(e) => write!(f, "{}", e),
            Self::Closed => write!(f, "throttled flow is closed"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ThrottleError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Upstream(e) => Some(e),
            Self::Closed => None,
        }
    }
}

impl<E> ThrottleError<E> {
    /// Check if this error carries an upstream error
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
    /// Check if the flow was closed
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
    /// Get the upstream error if this is an Upstream variant
    pub fn into_upstream(self) -> Option<E> {
        match self {
            Self::Upstream(e) => Some(e),
            Self::Closed => None,
        }
    }
    /// Borrow the upstream error if present.
    pub fn as_upstream(&self) -> Option<&E> {
        match self {
            Self::Upstream(e) => Some(e),
            Self::Closed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct DummyError(&'static str);
    impl fmt::Display for DummyError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }
    impl std::error::Error for DummyError {}

    #[test]
    fn upstream_displays_verbatim() {
        let err = ThrottleError::Upstream(DummyError("disk on fire"));
        assert_eq!(err.to_string(), "disk on fire");
        assert!(err.source().is_some());
    }

    #[test]
    fn closed_has_no_source() {
        let err: ThrottleError<DummyError> = ThrottleError::Closed;
        assert!(err.to_string().contains("closed"));
        assert!(err.source().is_none());
        assert!(err.is_closed());
        assert!(!err.is_upstream());
    }

    #[test]
    fn upstream_accessors() {
        let err = ThrottleError::Upstream(DummyError("x"));
        assert!(err.is_upstream());
        assert_eq!(err.as_upstream(), Some(&DummyError("x")));
        assert_eq!(err.into_upstream(), Some(DummyError("x")));
        assert_eq!(ThrottleError::<DummyError>::Closed.into_upstream(), None);
    }

    #[test]
    fn config_error_wraps_rate_error_transparently() {
        let rate_err = "xyz".parse::<crate::Rate>().unwrap_err();
        let err = ConfigError::from(rate_err.clone());
        assert_eq!(err.to_string(), rate_err.to_string());
        assert!(ConfigError::InvalidWindowSize(0).to_string().contains("window_size"));
    }
}
