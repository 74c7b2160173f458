#![allow(dead_code)]

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::io;
use std::time::Duration;

/// Deterministic test payload: byte `i` is `i % 251`.
pub fn pattern(range: std::ops::Range<usize>) -> Vec<u8> {
    range.map(|i| (i % 251) as u8).collect()
}

/// Upstream of `size` bytes in blocks of `block` bytes, optionally waiting
/// `delay` before producing each block.
pub fn source(
    size: usize,
    block: usize,
    delay: Option<Duration>,
) -> impl Stream<Item = Result<Bytes, io::Error>> {
    stream::unfold(0usize, move |sent| async move {
        if sent >= size {
            return None;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let n = block.min(size - sent);
        Some((Ok(Bytes::from(pattern(sent..sent + n))), sent + n))
    })
}

/// Collect every released byte, stopping at the first error.
pub async fn drain<S, E>(stream: S) -> Result<Vec<u8>, E>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    futures::pin_mut!(stream);
    let mut out = Vec::new();
    while let Some(piece) = stream.next().await {
        out.extend_from_slice(&piece?);
    }
    Ok(out)
}

/// `elapsed` is within `tolerance` (relative) of `expected`.
pub fn within(elapsed: Duration, expected: Duration, tolerance: f64) -> bool {
    let diff = (elapsed.as_secs_f64() - expected.as_secs_f64()).abs();
    diff / expected.as_secs_f64() < tolerance
}
