//! Push-style throttling with an out-of-band failure from another task.
use std::time::Duration;
use throttler::prelude::*;

#[derive(Debug, thiserror::Error)]
#[error("producer gave up")]
struct GaveUp;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let config = ThrottleConfig::builder()
        .parse_rate("64k")
        .chunk_time(Duration::from_millis(50))
        .build()?;
    let mut throttler = Throttler::<GaveUp>::new(config);

    let handle = throttler.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.fail(GaveUp);
    });

    let mut sent = 0;
    loop {
        match throttler.submit(vec![0u8; 16 * 1024], |piece| sent += piece.len()).await {
            Ok(()) => println!("{} bytes out", sent),
            Err(ThrottleError::Upstream(err)) => {
                println!("stopped after {} bytes: {}", sent, err);
                break;
            }
            Err(ThrottleError::Closed) => break,
        }
    }
    Ok(())
}
