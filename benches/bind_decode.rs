use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use nuodb_middleware::prelude::*;
use nuodb_middleware::test_utils::{FakeClient, open_fake};
use nuodb_middleware::wire::BindBatch;
use std::hint::black_box;

const SELECT_ROWS: &str = "SELECT id, name, score, created, payload FROM bench WHERE id > ?";

fn sample_row(i: i64) -> Vec<RowValues> {
    vec![
        RowValues::Int(i),
        RowValues::Text(format!("name-{i}")),
        RowValues::Float(i as f64 * 0.5),
        RowValues::from(Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap()),
        RowValues::Blob(vec![0u8; 64]),
    ]
}

fn bench_bind(c: &mut Criterion) {
    let args = sample_row(7);
    c.bench_function("bind_batch_encode", |b| {
        b.iter(|| {
            let batch = BindBatch::encode(black_box(&args), args.len()).unwrap();
            black_box(batch.len())
        });
    });
}

fn bench_fetch(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_rows");
    for &row_count in &[10usize, 1_000] {
        let rows = (0..row_count as i64).map(sample_row).collect();
        let client = FakeClient::new().with_rows(
            SELECT_ROWS,
            ["ID", "NAME", "SCORE", "CREATED", "PAYLOAD"],
            rows,
        );
        let conn = open_fake(&client).unwrap();
        let stmt = conn.prepare(SELECT_ROWS).unwrap();
        let probe = client.probe();

        group.bench_with_input(BenchmarkId::from_parameter(row_count), &row_count, |b, _| {
            b.iter(|| {
                // keep the fake's call log from growing across iterations
                probe.clear_calls();
                let mut rows = stmt.query(&[RowValues::Int(0)], &Deadline::none()).unwrap();
                let mut dest = vec![RowValues::Null; rows.column_count()];
                let mut seen = 0usize;
                while rows.next(&mut dest).unwrap() {
                    seen += 1;
                }
                black_box(seen)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_bind, bench_fetch);
criterion_main!(benches);
