use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use prepbox::{
    Dataset, ExerciseInput, ExerciseKind, JsonRow, NullSink, Sandbox, SandboxConfig,
    SignatureBuilder, UnavailableBackend, split_statements,
};
use serde_json::json;
use tokio::runtime::Runtime;

fn seed_script(tables: usize, rows_per_table: usize) -> String {
    let mut script = String::new();
    for t in 0..tables {
        script.push_str(&format!(
            "-- table {t}\nCREATE TABLE t{t} (id INT, name VARCHAR, note VARCHAR)\n"
        ));
        for r in 0..rows_per_table {
            script.push_str(&format!(
                "INSERT INTO t{t} VALUES ({r}, 'name;{r}', \"quoted \\\" {r}\");\n"
            ));
        }
    }
    script
}

fn rows(count: usize) -> Vec<JsonRow> {
    (0..count)
        .map(|i| match json!({"id": i, "name": format!("name{}", i), "value": i as f64 * 1.5}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        })
        .collect()
}

fn datasets(count: usize, rows_per_dataset: usize) -> Vec<Dataset> {
    (0..count)
        .map(|i| {
            Dataset::new(format!("d{}", i), format!("Dataset {}", i))
                .with_table_name(format!("d{}", i))
                .with_rows(rows(rows_per_dataset))
        })
        .collect()
}

fn bench_split_statements(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_statements");

    for rows in [10, 100, 1_000] {
        let script = seed_script(4, rows);
        group.throughput(Throughput::Bytes(script.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &script, |b, script| {
            b.iter(|| black_box(split_statements(script)))
        });
    }

    group.finish();
}

fn bench_signature(c: &mut Criterion) {
    let mut group = c.benchmark_group("signature");
    let builder = SignatureBuilder::default();

    for rows in [10, 1_000, 10_000] {
        let sets = datasets(4, rows);
        group.bench_with_input(BenchmarkId::new("rows_per_dataset", rows), &sets, |b, sets| {
            b.iter(|| black_box(builder.build(sets, Some("CREATE TABLE x (id INT)"), ExerciseKind::Sql)))
        });
    }

    group.finish();
}

fn bench_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare");
    group.sample_size(10);

    let rt = Runtime::new().unwrap();

    group.bench_function("cold_load_4x500", |b| {
        b.to_async(&rt).iter(|| async {
            let sandbox = Sandbox::with_backend(
                SandboxConfig::default(),
                Arc::new(NullSink),
                Arc::new(UnavailableBackend),
            )
            .unwrap();
            let exercise = ExerciseInput::new(ExerciseKind::Sql).with_datasets(datasets(4, 500));
            black_box(sandbox.prepare(exercise).await.unwrap())
        })
    });

    let sandbox = Sandbox::with_backend(
        SandboxConfig::default(),
        Arc::new(NullSink),
        Arc::new(UnavailableBackend),
    )
    .unwrap();
    let exercise = ExerciseInput::new(ExerciseKind::Sql).with_datasets(datasets(4, 500));
    rt.block_on(sandbox.prepare(exercise.clone())).unwrap();

    group.bench_function("up_to_date_4x500", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(sandbox.prepare(exercise.clone()).await.unwrap()) })
    });

    group.finish();
}

criterion_group!(benches, bench_split_statements, bench_signature, bench_prepare);
criterion_main!(benches);
