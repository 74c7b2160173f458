use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use throttler::{InstantSleeper, ManualClock, Scheduler, ThrottleConfig, Throttled};

const BLOCK: usize = 1024 * 1024;

fn config(rate: &str) -> ThrottleConfig {
    rate.parse().expect("valid rate")
}

// Carving and scheduling one large block, no waiting.
fn bench_next_release(c: &mut Criterion) {
    let block = Bytes::from(vec![0u8; BLOCK]);
    let mut group = c.benchmark_group("scheduler");

    for rate in ["1m", "100m"] {
        group.bench_function(format!("next_release_1mib_at_{}", rate), |b| {
            let clock = ManualClock::new();
            b.iter_batched(
                || Scheduler::new(&config(rate), Duration::ZERO),
                |mut scheduler| {
                    let mut input = block.clone();
                    while let Some(release) = scheduler.next_release(&mut input, &clock) {
                        black_box(release);
                    }
                    scheduler
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// Whole stream adapter overhead with sleeping disabled.
fn bench_stream(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime");
    let blocks: Vec<Bytes> = (0..16).map(|_| Bytes::from(vec![0u8; 64 * 1024])).collect();

    c.bench_function("stream_1mib_in_64k_blocks", |b| {
        b.to_async(&rt).iter(|| {
            let blocks = blocks.iter().cloned().map(Ok::<_, std::io::Error>).collect::<Vec<_>>();
            async move {
                let throttled = Throttled::with_runtime(
                    futures::stream::iter(blocks),
                    config("1m"),
                    Arc::new(ManualClock::new()),
                    Arc::new(InstantSleeper),
                );
                let bytes = throttled.fold(0usize, |n, piece| async move {
                    n + piece.map(|p| p.len()).unwrap_or(0)
                });
                black_box(bytes.await)
            }
        })
    });
}

criterion_group!(benches, bench_next_release, bench_stream);
criterion_main!(benches);
