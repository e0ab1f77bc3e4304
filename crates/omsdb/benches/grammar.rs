use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use omsdb::{Builder, ConnectionFactory, DbConfig};

/// SELECT with `n` columns and `n` where conditions:
/// SELECT col0, col1, ... FROM t WHERE col0 = ? AND col1 = ? ...
fn build_select(db: &str, n: usize) -> Builder {
    let connection = ConnectionFactory::create(&DbConfig::new(db, "bench")).unwrap();
    let mut query = Builder::new(connection, true);
    let columns: Vec<String> = (0..n).map(|i| format!("col{i}")).collect();
    query.select(&columns).unwrap().from(["t"]);
    for (i, column) in columns.iter().enumerate() {
        query.where_(column, "=", i as i64).unwrap();
    }
    query.newest("col0").limit(50).offset(100);
    query
}

fn bench_compile(c: &mut Criterion) {
    for db in ["mysql", "pgsql", "sqlsrv", "sqlite"] {
        let mut group = c.benchmark_group(format!("grammar/compile/{db}"));
        for n in [1, 5, 10, 50, 100] {
            let query = build_select(db, n);
            group.bench_with_input(BenchmarkId::from_parameter(n), &query, |b, query| {
                b.iter(|| black_box(query.compile().unwrap()));
            });
        }
        group.finish();
    }
}

fn bench_build_and_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("grammar/build_and_compile");

    for n in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let query = build_select("pgsql", n);
                black_box(query.compile().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_build_and_compile);
criterion_main!(benches);
