//! Relay throughput: messages per second through a channel into the
//! in-memory store.
//!
//! Measures producer send cost plus the worker's windowed batching; the
//! store itself is a lock and a `VecDeque`, so this isolates the relay.
//! Channel setup and the final flush are included in each iteration.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use superchannel::prelude::*;

const MESSAGE_SIZES: &[usize] = &[16, 256, 4096];
const MESSAGE_COUNT: usize = 10_000;
const CAPACITIES: &[usize] = &[64, 1024];

fn relay_throughput(c: &mut Criterion) {
    superchannel::dev_tracing::init_tracing();
    let mut group = c.benchmark_group("throughput/relay/memory");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    for &capacity in CAPACITIES {
        for &size in MESSAGE_SIZES {
            group.throughput(Throughput::Elements(MESSAGE_COUNT as u64));
            let id = BenchmarkId::new(format!("cap{capacity}"), size);
            group.bench_with_input(id, &size, |b, &size| {
                let payload = Bytes::from(vec![0u8; size]);
                let options = RelayOptions::new()
                    .with_flush_window(Duration::from_millis(1))
                    .with_purge_on_start(false);

                b.iter(|| {
                    let store = MemoryStore::new();
                    let channel =
                        RelayChannel::spawn("bench", capacity, store.clone(), options.clone())
                            .unwrap();
                    for _ in 0..MESSAGE_COUNT {
                        channel.send(black_box(payload.clone())).unwrap();
                    }
                    let report = channel.shutdown().unwrap();
                    assert_eq!(report.delivered, MESSAGE_COUNT as u64);
                });
            });
        }
    }

    group.finish();
}

fn multi_producer(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput/relay/producers");
    group.sample_size(10);
    group.throughput(Throughput::Elements(MESSAGE_COUNT as u64));

    for producers in [1usize, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(producers),
            &producers,
            |b, &producers| {
                b.iter(|| {
                    let store = MemoryStore::new();
                    let channel = RelayChannel::spawn(
                        "bench",
                        256,
                        store,
                        RelayOptions::new().with_flush_window(Duration::from_millis(1)),
                    )
                    .unwrap();

                    let per_producer = MESSAGE_COUNT / producers;
                    let handles: Vec<_> = (0..producers)
                        .map(|_| {
                            let sender = channel.sender();
                            std::thread::spawn(move || {
                                for _ in 0..per_producer {
                                    sender.send(Bytes::from_static(b"x")).unwrap();
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    channel.shutdown().unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, relay_throughput, multi_producer);
criterion_main!(benches);
