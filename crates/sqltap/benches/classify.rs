use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sqltap::StatementKind;

const CASES: &[(&str, &str)] = &[
    ("select", "SELECT id, name, email FROM users WHERE id = $1"),
    ("insert", "insert into users (name, email) values ($1, $2)"),
    (
        "commented",
        "/* service: checkout */ -- hot path\n  UPDATE orders SET state = $1 WHERE id = $2",
    ),
    ("other", "CREATE INDEX CONCURRENTLY idx_users_email ON users (email)"),
];

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("statement_kind/from_sql");

    for (name, sql) in CASES {
        group.bench_with_input(BenchmarkId::from_parameter(name), sql, |b, sql| {
            b.iter(|| black_box(StatementKind::from_sql(sql)));
        });
    }

    group.finish();
}

fn bench_classify_long_prefix(c: &mut Criterion) {
    // Worst case: a long comment block in front of the keyword.
    let sql = format!("/* {} */ SELECT 1", "x".repeat(4096));

    c.bench_function("statement_kind/long_comment_prefix", |b| {
        b.iter(|| black_box(StatementKind::from_sql(&sql)));
    });
}

criterion_group!(benches, bench_classify, bench_classify_long_prefix);
criterion_main!(benches);
