//! Chunked sliding-window scheduling.
//!
//! The scheduler decides *when* bytes may leave; it never sleeps and performs
//! no I/O. Drivers ([`Throttled`](crate::Throttled), [`Throttler`](crate::Throttler))
//! feed it blocks and act on the [`Release`] decisions it hands back.
//!
//! Semantics:
//! - Input is re-segmented into chunks of `chunk_size` bytes. A piece that does
//!   not complete a chunk is released immediately.
//! - When a chunk completes, its release time (ETA) is computed against the
//!   oldest checkpoint in the window:
//!   `eta = oldest.at + (total_bytes - oldest.bytes) / rate`.
//! - The checkpoint `(total_bytes, max(now, eta))` is appended and the window is
//!   trimmed to the most recent `window_size` entries.
//! - A chunk that is due (`now >= eta`) is released at once; catch-up after a
//!   stall is unlimited. An early chunk must be held for `eta - now`.
//!
//! Invariants:
//! - `0 <= buffered < chunk_size` between calls.
//! - Window entries are non-decreasing in both bytes and time, and there are
//!   never more than `window_size` of them.
//! - Concatenating every released piece reproduces the input exactly.

use crate::clock::Clock;
use crate::config::ThrottleConfig;
use crate::rate::Rate;
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Duration;

/// A pacing checkpoint: `bytes` had been scheduled by time `at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub bytes: u64,
    pub at: Duration,
}

/// Bounded trailing history of checkpoints, oldest first.
#[derive(Debug, Clone)]
pub struct Window {
    entries: VecDeque<Checkpoint>,
    capacity: usize,
}

impl Window {
    fn new(capacity: usize, origin: Checkpoint) -> Self {
        let capacity = capacity.max(1);
        let mut entries = VecDeque::with_capacity(capacity + 1);
        entries.push_back(origin);
        Self { entries, capacity }
    }

    /// Oldest checkpoint still in the window. The window is never empty.
    pub fn oldest(&self) -> Checkpoint {
        self.entries.front().copied().unwrap_or(Checkpoint { bytes: 0, at: Duration::ZERO })
    }

    /// Most recent checkpoint.
    pub fn newest(&self) -> Checkpoint {
        self.entries.back().copied().unwrap_or(Checkpoint { bytes: 0, at: Duration::ZERO })
    }

    /// Number of checkpoints held, between 1 and [`capacity`](Self::capacity).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; at least the newest checkpoint is kept.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of checkpoints (the configured window size).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.entries.iter()
    }

    fn push(&mut self, checkpoint: Checkpoint) {
        self.entries.push_back(checkpoint);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

/// What to do with the next piece of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// Send the piece downstream now.
    Now(Bytes),
    /// Hold the chunk for `delay`, then send it downstream.
    After { chunk: Bytes, delay: Duration },
}

impl Release {
    /// The bytes this decision is about.
    pub fn bytes(&self) -> &Bytes {
        match self {
            Release::Now(piece) => piece,
            Release::After { chunk, .. } => chunk,
        }
    }

    /// How long to hold, if at all.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Release::Now(_) => None,
            Release::After { delay, .. } => Some(*delay),
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Release::Now(piece) => piece,
            Release::After { chunk, .. } => chunk,
        }
    }
}

/// The chunked sliding-window scheduler for one data flow.
#[derive(Debug, Clone)]
pub struct Scheduler {
    rate: Rate,
    chunk_size: u64,
    buffered: u64,
    total_bytes: u64,
    window: Window,
}

impl Scheduler {
    /// Create a scheduler whose window starts at `(0, origin)`.
    pub fn new(config: &ThrottleConfig, origin: Duration) -> Self {
        Self {
            rate: config.rate(),
            chunk_size: config.chunk_size(),
            buffered: 0,
            total_bytes: 0,
            window: Window::new(config.window_size(), Checkpoint { bytes: 0, at: origin }),
        }
    }

    pub fn rate(&self) -> Rate {
        self.rate
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Bytes counted toward the chunk currently filling.
    pub fn buffered(&self) -> u64 {
        self.buffered
    }

    /// Bytes in completed chunks so far.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Carve the next piece off `input` and decide when it may leave.
    ///
    /// Returns `None` once `input` is empty. `clock` is read only when the
    /// piece completes a chunk.
    pub fn next_release(&mut self, input: &mut Bytes, clock: &dyn Clock) -> Option<Release> {
        if input.is_empty() {
            return None;
        }
        let piece = self.carve(input);
        if self.buffered < self.chunk_size {
            return Some(Release::Now(piece));
        }
        let now = clock.now();
        let eta = self.schedule(now);
        if now >= eta {
            Some(Release::Now(piece))
        } else {
            Some(Release::After { chunk: piece, delay: eta - now })
        }
    }

    /// Split off at most the room left in the current chunk.
    fn carve(&mut self, input: &mut Bytes) -> Bytes {
        let room = self.chunk_size - self.buffered;
        let take = usize::try_from(room).map_or(input.len(), |room| room.min(input.len()));
        self.buffered += take as u64;
        input.split_to(take)
    }

    /// Account a completed chunk and return its ETA.
    fn schedule(&mut self, now: Duration) -> Duration {
        self.buffered -= self.chunk_size;
        self.total_bytes += self.chunk_size;

        let oldest = self.window.oldest();
        let eta = oldest.at + self.rate.time_for(self.total_bytes - oldest.bytes);
        self.window.push(Checkpoint { bytes: self.total_bytes, at: now.max(eta) });
        eta
    }
}
