//! Criterion benchmarks for the discovery codec and the offset estimator.
//!
//! Run with:
//! ```bash
//! cargo bench --package timesync-core --bench codec_bench
//! ```

use std::net::{IpAddr, Ipv4Addr};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use timesync_core::{
    decode_discovery, decode_offer, decode_time_reply, encode_offer, encode_time_reply, Endpoint,
    OffsetSample,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn endpoint(last_octet: u8) -> Endpoint {
    Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet)), 5000)
}

fn offer_array(count: u8) -> Vec<u8> {
    let list: Vec<Endpoint> = (1..=count).map(endpoint).collect();
    let json = serde_json::to_string(&list).unwrap_or_default();
    format!("OFFER{json}").into_bytes()
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_offer(c: &mut Criterion) {
    let mut group = c.benchmark_group("offer");

    group.bench_function("encode_single", |b| {
        let ep = endpoint(5);
        b.iter(|| encode_offer(black_box(&ep)))
    });

    let single = encode_offer(&endpoint(5)).unwrap_or_default();
    group.bench_function("decode_single", |b| b.iter(|| decode_offer(black_box(&single))));

    for count in [4u8, 32] {
        let bytes = offer_array(count);
        group.bench_with_input(BenchmarkId::new("decode_array", count), &bytes, |b, bytes| {
            b.iter(|| decode_offer(black_box(bytes)))
        });
    }

    group.bench_function("decode_discover", |b| {
        b.iter(|| decode_discovery(black_box(b"DISCOVER")))
    });

    group.finish();
}

fn bench_time(c: &mut Criterion) {
    let mut group = c.benchmark_group("time");

    group.bench_function("encode_reply", |b| {
        b.iter(|| encode_time_reply(black_box(1_700_000_000_123)))
    });
    group.bench_function("decode_reply", |b| {
        b.iter(|| decode_time_reply(black_box("1700000000123\n")))
    });
    group.bench_function("estimate", |b| {
        let sample = OffsetSample::new(1_700_000_000_520, 1_700_000_000_000, 1_700_000_000_040);
        b.iter(|| black_box(sample).estimate())
    });

    group.finish();
}

criterion_group!(benches, bench_offer, bench_time);
criterion_main!(benches);
