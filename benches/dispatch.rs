//! Inbound hot path benchmarks.
//!
//! Measures frame classification and event fan-out, which run for every
//! telemetry update (several per second per overlay).
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;

use overlay_transport::protocol::classify;
use overlay_transport::{EventChannel, EventTag, NormalizedEvent};

// ============================================================================
// Payloads
// ============================================================================

const HEARTBEAT: &str = ".";
const SEND: &str = r#"{"type":"send","from":"A","msg":"hello"}"#;
const MALFORMED: &str = r#"{"type":"broadcast","#;

fn combat_data() -> String {
    let combatants: serde_json::Map<String, serde_json::Value> = (0..24)
        .map(|i| {
            (
                format!("Player {i}"),
                json!({ "name": format!("Player {i}"), "encdps": "1234.56", "damage": "98765" }),
            )
        })
        .collect();

    json!({
        "type": "broadcast",
        "msgtype": "CombatData",
        "msg": {
            "Encounter": { "title": "Striking Dummy", "duration": "05:00", "encdps": "4567.8" },
            "Combatant": combatants,
        }
    })
    .to_string()
}

// ============================================================================
// Benchmark: Classification
// ============================================================================

fn bench_classify(c: &mut Criterion) {
    let data = combat_data();
    let mut group = c.benchmark_group("classify");

    for (name, payload) in [
        ("heartbeat", HEARTBEAT),
        ("send", SEND),
        ("malformed", MALFORMED),
        ("combat_data", data.as_str()),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), payload, |b, payload| {
            b.iter(|| classify(black_box(payload)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Fan-out
// ============================================================================

const LISTENER_COUNTS: &[usize] = &[1, 8, 64];

fn bench_emit(c: &mut Criterion) {
    let event = NormalizedEvent::Data(json!({ "Encounter": { "encdps": "4567.8" } }));
    let mut group = c.benchmark_group("emit");

    for &count in LISTENER_COUNTS {
        let channel = EventChannel::<NormalizedEvent>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..count {
            let hits = Arc::clone(&hits);
            channel.subscribe(EventTag::Data, move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
            });
        }

        group.bench_with_input(BenchmarkId::new("listeners", count), &count, |b, _| {
            b.iter(|| channel.emit(black_box(&event)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_emit);
criterion_main!(benches);
