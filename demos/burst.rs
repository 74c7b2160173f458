//! Paces a 3 MiB burst down to 1 MiB/s and reports how long it took.
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::time::Instant;
use throttler::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let config: ThrottleConfig = "1m".parse()?;
    let blocks = (0..48).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![0u8; 64 * 1024])));

    let start = Instant::now();
    let mut throttled = stream::iter(blocks).throttle(config);
    let mut total = 0;
    while let Some(piece) = throttled.next().await {
        total += piece?.len();
    }

    println!("moved {} bytes in {:?} (limit {})", total, start.elapsed(), config.rate());
    Ok(())
}
