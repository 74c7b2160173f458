//! Push-style throttling.
//!
//! A [`Throttler`] is driven by its producer: each [`submit`](Throttler::submit)
//! hands over one block and a `release` callback. The call returns once every
//! byte of the block has been passed to `release`, holding early chunks on the
//! way. `submit` takes `&mut self`, so a new block can never be submitted while
//! an earlier one is still waiting for its release time.
//!
//! ```rust
//! use throttler::{Throttler, ThrottleError};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut throttler = Throttler::<std::io::Error>::new("10k".parse().unwrap());
//! let mut sent = 0;
//! throttler.submit(vec![0u8; 4096], |piece| sent += piece.len()).await.unwrap();
//! assert_eq!(sent, 4096);
//!
//! throttler.close();
//! assert!(matches!(throttler.submit(vec![1], |_| {}).await, Err(ThrottleError::Closed)));
//! # });
//! ```

use crate::clock::{Clock, MonotonicClock};
use crate::config::ThrottleConfig;
use crate::error::ThrottleError;
use crate::handle::{self, Control, ControlReceiver, ThrottleHandle};
use crate::scheduler::{Release, Scheduler};
use crate::sleeper::{Sleeper, TokioSleeper};
use bytes::Bytes;
use std::sync::Arc;

/// Push-style byte-rate limiter for one data flow.
pub struct Throttler<E> {
    scheduler: Scheduler,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    control: ControlReceiver<E>,
    handle: ThrottleHandle<E>,
    closed: bool,
}

impl<E> std::fmt::Debug for Throttler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttler")
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .field("sleeper", &self.sleeper)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<E> Throttler<E> {
    /// Throttler on the tokio clock and timer.
    pub fn new(config: ThrottleConfig) -> Self {
        Self::with_runtime(config, Arc::new(MonotonicClock::default()), Arc::new(TokioSleeper))
    }

    /// Throttler with an explicit clock and sleeper.
    pub fn with_runtime(
        config: ThrottleConfig,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let (handle, control) = handle::channel();
        Self {
            scheduler: Scheduler::new(&config, clock.now()),
            clock,
            sleeper,
            control,
            handle,
            closed: false,
        }
    }

    /// Handle for delivering an out-of-band error or closing the flow.
    pub fn handle(&self) -> ThrottleHandle<E> {
        self.handle.clone()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Whether further submissions will be refused.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop the flow. Later submissions fail with [`ThrottleError::Closed`].
    pub fn close(&mut self) {
        if !self.closed {
            tracing::debug!(total_bytes = self.scheduler.total_bytes(), "throttler closed");
        }
        self.closed = true;
        self.control.shutdown();
    }

    /// Pace `block` through `release`.
    ///
    /// Pieces reach `release` in order and never exceed one chunk. A control
    /// message from a [`ThrottleHandle`] interrupts a held chunk: that chunk and
    /// the rest of the block are dropped and the error (or `Closed`) returned.
    /// Dropping the returned future while a chunk is held abandons that chunk
    /// and closes the flow: later submissions fail with [`ThrottleError::Closed`].
    pub async fn submit<B, F>(&mut self, block: B, mut release: F) -> Result<(), ThrottleError<E>>
    where
        B: Into<Bytes>,
        F: FnMut(Bytes),
    {
        if self.closed {
            self.control.shutdown();
            return Err(ThrottleError::Closed);
        }
        if let Some(control) = self.control.try_recv() {
            return Err(self.terminate(control));
        }

        let mut input = block.into();
        while let Some(decision) = self.scheduler.next_release(&mut input, self.clock.as_ref()) {
            match decision {
                Release::Now(piece) => release(piece),
                Release::After { chunk, delay } => {
                    tracing::debug!(
                        delay_ms = delay.as_millis() as u64,
                        total_bytes = self.scheduler.total_bytes(),
                        "holding chunk until its release time"
                    );
                    // Left set if this future is dropped mid-hold.
                    self.closed = true;
                    let sleep = self.sleeper.sleep(delay);
                    tokio::select! {
                        biased;
                        control = self.control.recv() => return Err(self.terminate(control)),
                        _ = sleep => {
                            self.closed = false;
                            release(chunk);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn terminate(&mut self, control: Control<E>) -> ThrottleError<E> {
        self.closed = true;
        self.control.shutdown();
        match control {
            Control::Fail(err) => {
                tracing::debug!("throttler failed from handle");
                ThrottleError::Upstream(err)
            }
            Control::Close => {
                tracing::debug!(total_bytes = self.scheduler.total_bytes(), "throttler closed");
                ThrottleError::Closed
            }
        }
    }
}
