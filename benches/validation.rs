//! Benchmarks for validation pipelines
//!
//! Run with: cargo bench --bench validation

#![allow(clippy::unwrap_used)]

use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fintran::prelude::*;
use rust_decimal::Decimal;

const PIPELINE: &str = r#"
[[validators]]
type = "positive_amounts"
severity = "warning"

[[validators]]
type = "currency_consistency"

[[validators]]
type = "detect_duplicates"
params = { fields = ["date", "account", "amount", "currency"] }

[[validators]]
type = "detect_missing"
params = { fields = ["description", "reference"] }

[[validators]]
type = "detect_outliers"
params = { method = "iqr" }
"#;

/// Generate a ledger with a sprinkling of duplicates and missing descriptions
fn generate_table(rows: usize) -> IrTable {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let records = (0..rows).map(|i| {
        let n = if i % 97 == 0 { i.saturating_sub(1) } else { i };
        let record = Record::new(
            start + Days::new((n % 365) as u64),
            format!("{}", 1000 + n % 50),
            Decimal::new((n as i64 * 7919) % 100_000 + 100, 2),
            "USD",
        )
        .with_reference(format!("INV-{:06}", n));
        if n % 5 == 0 {
            record
        } else {
            record.with_description(format!("Payment {}", n))
        }
    });
    IrTable::from_records(records)
}

fn build_pipeline(parallel: bool) -> ValidationPipeline {
    let mut config = PipelineConfig::from_toml_str(PIPELINE).unwrap();
    config.parallel = parallel;
    config.build(&ValidatorRegistry::with_builtins()).unwrap()
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let sequential = build_pipeline(false);
    let parallel = build_pipeline(true);

    for rows in [1_000, 10_000, 50_000] {
        let table = generate_table(rows);
        group.bench_with_input(BenchmarkId::new("sequential", rows), &table, |b, table| {
            b.iter(|| sequential.run(black_box(table)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("parallel", rows), &table, |b, table| {
            b.iter(|| parallel.run(black_box(table)).unwrap());
        });
    }
    group.finish();
}

fn bench_fuzzy_duplicates(c: &mut Criterion) {
    let mut group = c.benchmark_group("fuzzy_duplicates");
    let registry = ValidatorRegistry::with_builtins();
    let validator = registry
        .create(
            "detect_duplicates",
            &serde_json::json!({ "fields": ["account", "reference"], "mode": "fuzzy" }),
        )
        .unwrap();

    for rows in [100, 500, 1_000] {
        let table = generate_table(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &table, |b, table| {
            b.iter(|| validator.validate(black_box(table)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline, bench_fuzzy_duplicates);
criterion_main!(benches);
