//! Pull-style throttling of byte streams.
//!
//! [`Throttled`] wraps any stream of `Result<B, E>` blocks (`B: Into<Bytes>`)
//! and yields the same bytes, in order, no faster than the configured rate.
//!
//! - Blocks are re-chunked; output pieces never exceed one chunk.
//! - Zero-length blocks are skipped.
//! - An upstream `Err(e)` is yielded unchanged and ends the stream.
//! - End of upstream ends the stream as soon as the last block is released.
//! - A [`ThrottleHandle`] can inject an error or close the stream at any time,
//!   including while a chunk is being held.
//!
//! ```rust
//! use bytes::Bytes;
//! use futures::{stream, StreamExt};
//! use throttler::ThrottleExt;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let blocks = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"hello"))]);
//! let mut throttled = blocks.throttle("1k".parse().unwrap());
//! let mut out = Vec::new();
//! while let Some(piece) = throttled.next().await {
//!     out.extend_from_slice(&piece.unwrap());
//! }
//! assert_eq!(out, b"hello");
//! # });
//! ```

use crate::clock::{Clock, MonotonicClock};
use crate::config::ThrottleConfig;
use crate::handle::{self, Control, ControlReceiver, ThrottleHandle};
use crate::scheduler::{Release, Scheduler};
use crate::sleeper::{Sleep, Sleeper, TokioSleeper};
use bytes::Bytes;
use futures::stream::{FusedStream, Stream, TryStream};
use futures::ready;
use pin_project::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A chunk waiting for its release time.
struct Held {
    chunk: Bytes,
    sleep: Sleep,
}

/// Stream adapter that paces an upstream byte stream.
#[pin_project]
pub struct Throttled<S: TryStream> {
    #[pin]
    upstream: S,
    scheduler: Scheduler,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    control: ControlReceiver<S::Error>,
    handle: ThrottleHandle<S::Error>,
    pending: Bytes,
    held: Option<Held>,
    done: bool,
}

impl<S: TryStream> Throttled<S> {
    /// Throttle `upstream` on the tokio clock and timer.
    pub fn new(upstream: S, config: ThrottleConfig) -> Self {
        Self::with_runtime(upstream, config, Arc::new(MonotonicClock::default()), Arc::new(TokioSleeper))
    }

    /// Throttle `upstream` with an explicit clock and sleeper.
    pub fn with_runtime(
        upstream: S,
        config: ThrottleConfig,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let (handle, control) = handle::channel();
        Self {
            upstream,
            scheduler: Scheduler::new(&config, clock.now()),
            clock,
            sleeper,
            control,
            handle,
            pending: Bytes::new(),
            held: None,
            done: false,
        }
    }

    /// Handle for delivering an out-of-band error or closing the stream.
    pub fn handle(&self) -> ThrottleHandle<S::Error> {
        self.handle.clone()
    }

    /// The pacing state.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The wrapped upstream.
    pub fn get_ref(&self) -> &S {
        &self.upstream
    }

    /// Unwrap the upstream. Buffered input and any held chunk are discarded.
    pub fn into_inner(self) -> S {
        self.upstream
    }
}

impl<S> Stream for Throttled<S>
where
    S: TryStream,
    S::Ok: Into<Bytes>,
{
    type Item = Result<Bytes, S::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        if let Poll::Ready(control) = this.control.poll(cx) {
            *this.done = true;
            *this.held = None;
            this.control.shutdown();
            return match control {
                Control::Fail(err) => {
                    tracing::debug!("throttled stream failed from handle");
                    Poll::Ready(Some(Err(err)))
                }
                Control::Close => {
                    tracing::debug!(total_bytes = this.scheduler.total_bytes(), "throttled stream closed");
                    Poll::Ready(None)
                }
            };
        }

        loop {
            if let Some(held) = this.held.as_mut() {
                ready!(held.sleep.as_mut().poll(cx));
                let chunk = std::mem::take(&mut held.chunk);
                *this.held = None;
                tracing::trace!(len = chunk.len(), "released held chunk");
                return Poll::Ready(Some(Ok(chunk)));
            }

            if let Some(release) = this.scheduler.next_release(this.pending, this.clock.as_ref()) {
                match release {
                    Release::Now(piece) => return Poll::Ready(Some(Ok(piece))),
                    Release::After { chunk, delay } => {
                        tracing::debug!(
                            delay_ms = delay.as_millis() as u64,
                            total_bytes = this.scheduler.total_bytes(),
                            "holding chunk until its release time"
                        );
                        *this.held = Some(Held { chunk, sleep: this.sleeper.sleep(delay) });
                        continue;
                    }
                }
            }

            match ready!(this.upstream.as_mut().try_poll_next(cx)) {
                Some(Ok(block)) => *this.pending = block.into(),
                Some(Err(err)) => {
                    *this.done = true;
                    this.control.shutdown();
                    tracing::debug!("upstream failed; ending throttled stream");
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    *this.done = true;
                    this.control.shutdown();
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl<S> FusedStream for Throttled<S>
where
    S: TryStream,
    S::Ok: Into<Bytes>,
{
    fn is_terminated(&self) -> bool {
        self.done
    }
}

impl<S: TryStream> std::fmt::Debug for Throttled<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttled")
            .field("scheduler", &self.scheduler)
            .field("pending", &self.pending.len())
            .field("held", &self.held.as_ref().map(|h| h.chunk.len()))
            .field("done", &self.done)
            .finish()
    }
}

/// Adds [`throttle`](ThrottleExt::throttle) to every fallible byte stream.
pub trait ThrottleExt: TryStream + Sized {
    /// Pace this stream according to `config`.
    fn throttle(self, config: ThrottleConfig) -> Throttled<Self>
    where
        Self::Ok: Into<Bytes>,
    {
        Throttled::new(self, config)
    }
}

impl<S: TryStream> ThrottleExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sleeper::TrackingSleeper;
    use futures::{stream, StreamExt, TryStreamExt};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestError(u32);

    fn config(rate: &str) -> ThrottleConfig {
        rate.parse().unwrap()
    }

    fn tracked(
        blocks: Vec<Result<Vec<u8>, TestError>>,
        rate: &str,
    ) -> (Throttled<impl TryStream<Ok = Vec<u8>, Error = TestError>>, TrackingSleeper) {
        let sleeper = TrackingSleeper::new();
        let throttled = Throttled::with_runtime(
            stream::iter(blocks),
            config(rate),
            Arc::new(ManualClock::new()),
            Arc::new(sleeper.clone()),
        );
        (throttled, sleeper)
    }

    #[tokio::test]
    async fn rechunks_and_holds_early_chunks() {
        let (throttled, sleeper) = tracked(vec![Ok(vec![9; 250])], "1000");
        let pieces: Vec<_> = throttled.map(|r| r.unwrap().len()).collect().await;
        assert_eq!(pieces, vec![100, 100, 50]);
        assert_eq!(sleeper.calls(), vec![Duration::from_millis(100), Duration::from_millis(200)]);
    }

    #[tokio::test]
    async fn skips_empty_blocks() {
        let (throttled, sleeper) =
            tracked(vec![Ok(vec![]), Ok(vec![1, 2]), Ok(vec![]), Ok(vec![3])], "1000");
        let pieces: Vec<_> = throttled.map(|r| r.unwrap()).collect().await;
        assert_eq!(pieces, vec![Bytes::from_static(&[1, 2]), Bytes::from_static(&[3])]);
        assert!(sleeper.calls().is_empty());
    }

    #[tokio::test]
    async fn upstream_error_ends_the_stream() {
        let (mut throttled, _) =
            tracked(vec![Ok(vec![1; 10]), Err(TestError(4)), Ok(vec![2; 10])], "1000");
        assert_eq!(throttled.next().await, Some(Ok(Bytes::from(vec![1; 10]))));
        assert_eq!(throttled.next().await, Some(Err(TestError(4))));
        assert!(throttled.is_terminated());
        assert_eq!(throttled.next().await, None);
        assert!(throttled.handle().is_closed());
    }

    #[tokio::test]
    async fn handle_error_preempts_pending_data() {
        let (mut throttled, _) = tracked(vec![Ok(vec![1; 10])], "1000");
        let handle = throttled.handle();
        assert!(handle.fail(TestError(1)));
        assert_eq!(throttled.next().await, Some(Err(TestError(1))));
        assert_eq!(throttled.next().await, None);
        assert!(!handle.fail(TestError(2)));
    }

    #[tokio::test]
    async fn close_ends_cleanly() {
        let (mut throttled, _) = tracked(vec![Ok(vec![1; 10])], "1000");
        assert!(throttled.handle().close());
        assert_eq!(throttled.next().await, None);
        assert!(throttled.is_terminated());
    }

    #[tokio::test]
    async fn into_inner_returns_the_unconsumed_upstream() {
        let (mut throttled, _) =
            tracked(vec![Ok(vec![1; 10]), Ok(vec![2; 10]), Ok(vec![3; 10])], "1000");
        assert_eq!(throttled.get_ref().size_hint(), (3, Some(3)));
        assert_eq!(throttled.next().await, Some(Ok(Bytes::from(vec![1; 10]))));
        assert_eq!(throttled.get_ref().size_hint(), (2, Some(2)));

        let rest: Vec<Vec<u8>> = throttled.into_inner().try_collect().await.unwrap();
        assert_eq!(rest, vec![vec![2; 10], vec![3; 10]]);
    }

    #[tokio::test]
    async fn accepts_static_slices_and_strings() {
        let blocks = stream::iter(vec![Ok::<_, TestError>("ab"), Ok("cd")]);
        let out: Vec<_> = blocks.throttle(config("1k")).map(|r| r.unwrap()).collect().await;
        assert_eq!(out.concat(), b"abcd");
    }
}
