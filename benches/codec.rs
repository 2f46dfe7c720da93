//! Message codec benchmark suite.
//!
//! Benchmarks decoding of the frames a busy instance pushes most often:
//! - `state_changed` events (two-pass event decode)
//! - `get_states` results at several entity counts
//!
//! Run with: cargo bench --bench codec
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::{Value, json};

use hago::Message;

// ============================================================================
// Fixtures
// ============================================================================

const TS: &str = "2016-11-26T01:37:24.265390+00:00";
const STATE_COUNTS: &[usize] = &[10, 100, 1000];

fn state(entity_id: &str, value: &str) -> Value {
    json!({
        "entity_id": entity_id,
        "state": value,
        "attributes": {"friendly_name": entity_id, "brightness": 180},
        "last_changed": TS,
        "last_updated": TS
    })
}

fn state_changed_frame() -> Vec<u8> {
    json!({
        "type": "event",
        "id": 1,
        "event": {
            "event_type": "state_changed",
            "time_fired": TS,
            "origin": "LOCAL",
            "data": {
                "entity_id": "light.kitchen",
                "old_state": state("light.kitchen", "off"),
                "new_state": state("light.kitchen", "on")
            }
        }
    })
    .to_string()
    .into_bytes()
}

fn states_result_frame(count: usize) -> Vec<u8> {
    let states: Vec<_> = (0..count)
        .map(|i| state(&format!("sensor.s{i}"), "21.5"))
        .collect();
    json!({"type": "result", "id": 2, "success": true, "result": states})
        .to_string()
        .into_bytes()
}

// ============================================================================
// Benchmark: Event Decode
// ============================================================================

fn bench_event_decode(c: &mut Criterion) {
    let frame = state_changed_frame();

    let mut group = c.benchmark_group("event_decode");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("state_changed", |b| {
        b.iter(|| Message::decode(black_box(&frame)).expect("valid frame"));
    });
    group.finish();
}

// ============================================================================
// Benchmark: Result Decode
// ============================================================================

fn bench_result_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("result_decode");

    for &count in STATE_COUNTS {
        let frame = states_result_frame(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("get_states", count), &frame, |b, frame| {
            b.iter(|| Message::decode(black_box(frame)).expect("valid frame"));
        });
    }

    group.finish();
}

// ============================================================================
// Main
// ============================================================================

criterion_group!(benches, bench_event_decode, bench_result_decode);
criterion_main!(benches);
