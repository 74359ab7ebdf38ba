use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mnx_dom::sequence::Sequence;
use mnx_dom::{for_each_event, Document, ValidationOptions, WalkControl, WalkOptions};
use serde_json::{json, Value};

const VALID_SCORE: &str = include_str!("../tests/data/valid_score.json");

// ============================================================================
// Test Data: one part of 4/4 measures, each a triplet and three quarters
// ============================================================================

fn generate_score(measures: usize) -> Value {
    let mut globals = Vec::with_capacity(measures);
    let mut parts = Vec::with_capacity(measures);
    for m in 0..measures {
        globals.push(if m == 0 {
            json!({"time": {"count": 4, "unit": 4}})
        } else {
            json!({})
        });
        let mut content = vec![json!({
            "type": "tuplet",
            "inner": {"multiple": 3, "duration": {"base": "eighth"}},
            "outer": {"multiple": 2, "duration": {"base": "eighth"}},
            "content": (0..3).map(|i| json!({
                "id": format!("m{m}t{i}"),
                "duration": {"base": "eighth"},
                "notes": [{"id": format!("m{m}t{i}n"), "pitch": {"step": "C", "octave": 5}}]
            })).collect::<Vec<_>>()
        })];
        for i in 0..3 {
            content.push(json!({
                "type": "event",
                "id": format!("m{m}e{i}"),
                "duration": {"base": "quarter"},
                "notes": [{"id": format!("m{m}e{i}n"), "pitch": {"step": "D", "octave": 4}}]
            }));
        }
        parts.push(json!({
            "beams": [{"events": [format!("m{m}t0"), format!("m{m}t1"), format!("m{m}t2")]}],
            "sequences": [{"content": content}]
        }));
    }
    json!({
        "mnx": {"version": 1},
        "global": {"measures": globals},
        "parts": [{"id": "P1", "measures": parts}]
    })
}

fn load(text: &str) -> Document {
    Document::from_reader(text.as_bytes()).unwrap()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_load_fixture(c: &mut Criterion) {
    c.bench_function("load_valid_score", |b| b.iter(|| load(black_box(VALID_SCORE))));
}

fn bench_walk_fixture(c: &mut Criterion) {
    let doc = load(VALID_SCORE);
    let sequence: Sequence = doc.bind_at("/parts/0/measures/0/sequences/0").unwrap();
    c.bench_function("walk_fixture_sequence", |b| {
        b.iter(|| {
            let mut count = 0;
            let outcome = for_each_event(black_box(&sequence), WalkOptions::default(), |_, _| {
                count += 1;
                WalkControl::Continue
            });
            black_box((outcome, count))
        })
    });
}

fn bench_validate_fixture(c: &mut Criterion) {
    let doc = load(VALID_SCORE);
    let options = ValidationOptions::default();
    c.bench_function("validate_valid_score", |b| {
        b.iter(|| doc.validate(black_box(&options)))
    });
}

fn bench_validate_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate_by_measures");
    let options = ValidationOptions::default();

    for measures in [10, 100, 500] {
        let doc = Document::from_value(generate_score(measures)).unwrap();
        group.throughput(Throughput::Elements(measures as u64));
        group.bench_with_input(BenchmarkId::from_parameter(measures), &doc, |b, doc| {
            b.iter(|| doc.validate(black_box(&options)))
        });
    }
    group.finish();
}

fn bench_entity_map_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_map_by_measures");

    for measures in [10, 100, 500] {
        let doc = Document::from_value(generate_score(measures)).unwrap();
        group.throughput(Throughput::Elements(measures as u64));
        group.bench_with_input(BenchmarkId::from_parameter(measures), &doc, |b, doc| {
            b.iter(|| black_box(doc).build_entity_map().unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_load_fixture,
    bench_walk_fixture,
    bench_validate_fixture,
    bench_validate_scaling,
    bench_entity_map_scaling
);
criterion_main!(benches);
