#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # throttler
//!
//! Byte-rate limiting for async data pipelines. Data flows through, is
//! released downstream no faster than a configured number of bytes per second,
//! and upstream errors are passed on unchanged.
//!
//! ## How pacing works
//!
//! Incoming blocks are re-cut into fixed-size chunks (the bytes allowed in one
//! `chunk_time`, 100ms by default). Each time a chunk completes, its release
//! time is computed from the oldest entry of a sliding window of recent chunk
//! completions (30 by default). Early chunks are held on a tokio timer; late
//! ones pass straight through, so a slow producer is never slowed further and a
//! fast one is smoothed down to the target rate.
//!
//! ## Quick Start
//!
//! ```rust
//! use bytes::Bytes;
//! use futures::{stream, StreamExt};
//! use throttler::{ThrottleConfig, ThrottleExt};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config: ThrottleConfig = "5M".parse().expect("valid rate");
//!     let source = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from(vec![0u8; 64 * 1024]))]);
//!
//!     let mut throttled = source.throttle(config);
//!     while let Some(piece) = throttled.next().await {
//!         let piece = piece.expect("upstream is infallible here");
//!         // forward `piece` downstream
//!         let _ = piece;
//!     }
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod handle;
pub mod prelude;
pub mod rate;
pub mod scheduler;
pub mod sleeper;
pub mod stream;
pub mod throttler;

// Re-exports
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ThrottleConfig, ThrottleConfigBuilder, DEFAULT_CHUNK_TIME, DEFAULT_WINDOW_SIZE};
pub use error::{ConfigError, ThrottleError};
pub use handle::ThrottleHandle;
pub use rate::{InvalidRateError, InvalidRateKind, Rate};
pub use scheduler::{Checkpoint, Release, Scheduler, Window};
pub use sleeper::{InstantSleeper, Sleep, Sleeper, TokioSleeper, TrackingSleeper};
pub use stream::{ThrottleExt, Throttled};
pub use throttler::Throttler;
