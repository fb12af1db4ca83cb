//! Loopback round-trip benchmark suite.
//!
//! Measures a link's write -> echo -> `BytesReceived` path at different
//! payload sizes, and the full connect/disconnect cycle.
//!
//! Run with: cargo bench --bench loopback
//! Results saved to: target/criterion/

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use groundlink::{EventKind, LinkEvent, LoopbackServer, Subscription, TcpLink};
use tokio::runtime::Runtime;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const PAYLOAD_SIZES: &[usize] = &[16, 280, 4096];
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Helpers
// ============================================================================

async fn connected_link(server: &LoopbackServer) -> (TcpLink, Subscription) {
    let link = TcpLink::new("127.0.0.1", server.port()).expect("link");
    let mut events = link.subscribe();

    link.connect();
    events
        .wait_for(EventKind::Connected, EVENT_TIMEOUT)
        .await
        .expect("connect");

    (link, events)
}

async fn round_trip(link: &TcpLink, events: &mut Subscription, payload: &[u8]) {
    link.write_bytes(payload);

    let mut received = 0;
    while received < payload.len() {
        match events.wait_for(EventKind::BytesReceived, EVENT_TIMEOUT).await {
            Ok(LinkEvent::BytesReceived { data, .. }) => received += data.len(),
            other => panic!("unexpected: {other:?}"),
        }
    }
}

// ============================================================================
// Benchmark: Echo Round Trip
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let server = rt
        .block_on(LoopbackServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .unwrap();
    let (link, events) = rt.block_on(connected_link(&server));
    let events = tokio::sync::Mutex::new(events);

    let mut group = c.benchmark_group("round_trip");

    for &size in PAYLOAD_SIZES {
        let payload = vec![0xFDu8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("echo", size), &payload, |b, payload| {
            b.to_async(&rt).iter(|| async {
                let mut events = events.lock().await;
                round_trip(&link, &mut events, payload).await;
            });
        });
    }

    group.finish();

    link.disconnect();
    drop(link);
    drop(server);
}

// ============================================================================
// Benchmark: Connect Cycle
// ============================================================================

fn bench_connect_cycle(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let server = rt
        .block_on(LoopbackServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .unwrap();
    let link = TcpLink::new("127.0.0.1", server.port()).unwrap();
    let events = tokio::sync::Mutex::new(link.subscribe());

    let mut group = c.benchmark_group("connect_cycle");
    group.sample_size(50);

    group.bench_function("connect_disconnect", |b| {
        b.to_async(&rt).iter(|| async {
            let mut events = events.lock().await;
            link.connect();
            events
                .wait_for(EventKind::Connected, EVENT_TIMEOUT)
                .await
                .expect("connect");
            link.disconnect();
            events
                .wait_for(EventKind::Disconnected, EVENT_TIMEOUT)
                .await
                .expect("disconnect");
            events.drain();
        });
    });

    group.finish();

    drop(link);
    drop(server);
}

criterion_group!(benches, bench_round_trip, bench_connect_cycle);
criterion_main!(benches);
