//! Performance benchmarks for cmdlog

use cmdlog::client::LogClient;
use cmdlog::config::ServerConfig;
use cmdlog::protocol::CommandFramer;
use cmdlog::server::LogServer;
use cmdlog::store::RingStore;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use tokio::runtime::Runtime;

/// Benchmark appends into a full ring (every append evicts)
fn bench_ring_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_append");

    for capacity in [10usize, 1000, 100_000].iter() {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            capacity,
            |b, &capacity| {
                let mut ring = RingStore::new(capacity).unwrap();
                for i in 0..capacity {
                    ring.append(format!("warmup {}\n", i).as_bytes()).unwrap();
                }
                b.iter(|| {
                    ring.append(b"benchmark command payload\n").unwrap();
                });
            },
        );
    }

    group.finish();
}

/// Benchmark replaying the whole history in read_range slices
fn bench_ring_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_replay");

    for capacity in [10usize, 100, 1000].iter() {
        let mut ring = RingStore::new(*capacity).unwrap();
        for i in 0..*capacity {
            ring.append(format!("command number {}\n", i).as_bytes()).unwrap();
        }
        group.throughput(Throughput::Bytes(ring.total_size()));
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &ring, |b, ring| {
            b.iter(|| {
                let mut offset = 0u64;
                loop {
                    let bytes = ring.read_range(offset, 1024);
                    if bytes.is_empty() {
                        break;
                    }
                    offset += bytes.len() as u64;
                }
                offset
            });
        });
    }

    group.finish();
}

/// Benchmark seek translation to the newest entry
fn bench_ring_seek(c: &mut Criterion) {
    let mut ring = RingStore::new(1000).unwrap();
    for i in 0..1500 {
        ring.append(format!("command number {}\n", i).as_bytes()).unwrap();
    }

    c.bench_function("ring_seek_last", |b| {
        b.iter(|| ring.seek_to(999, 3).unwrap());
    });
}

/// Benchmark framing a command delivered in small pieces
fn bench_framer(c: &mut Criterion) {
    let command = vec![b'x'; 4096];

    c.bench_function("framer_4k_in_64b_reads", |b| {
        b.iter(|| {
            let mut framer = CommandFramer::new();
            for piece in command.chunks(64) {
                framer.feed(piece).unwrap();
            }
            framer.feed(b"\n").unwrap().unwrap()
        });
    });
}

/// Benchmark a full append round-trip through the server
fn bench_server_roundtrip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let (client, trigger) = rt.block_on(async {
        let mut config = ServerConfig::default();
        config.server.bind_address = "127.0.0.1".to_string();
        config.server.port = 0;
        config.heartbeat.enabled = false;

        let server = LogServer::new(config).await.unwrap();
        let client = LogClient::new(server.local_addr().unwrap().to_string());
        let trigger = server.shutdown_trigger();
        tokio::spawn(server.start());
        (client, trigger)
    });

    let mut group = c.benchmark_group("server_roundtrip");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);
    group.bench_function("append", |b| {
        b.to_async(&rt).iter(|| {
            let client = client.clone();
            async move { client.append(b"roundtrip command").await.unwrap() }
        });
    });
    group.finish();

    trigger.shutdown();
}

criterion_group!(
    benches,
    bench_ring_append,
    bench_ring_replay,
    bench_ring_seek,
    bench_framer,
    bench_server_roundtrip
);
criterion_main!(benches);
