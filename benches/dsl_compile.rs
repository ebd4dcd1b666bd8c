//! Tokenize, parse, and compile overhead for rule expressions.
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rule_engine::dsl;
use rule_engine::registry::RuleRegistry;

const SIMPLE: &str = r#"span.status == "ERROR""#;
const COMPOUND: &str = r#"trace.has(payment.charge_card).where(amount > 1000).where(currency == "USD") and not trace.has(audit.log)"#;

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    group.bench_function("simple_comparison", |b| {
        b.iter(|| dsl::parse(black_box(SIMPLE)).unwrap());
    });

    group.bench_function("compound_trace_expr", |b| {
        b.iter(|| dsl::parse(black_box(COMPOUND)).unwrap());
    });

    group.finish();
}

fn bench_compile_cache(c: &mut Criterion) {
    let registry = RuleRegistry::new(128);
    // Warm the cache once; the benchmark measures cache-hit cost.
    registry.validate_expression(COMPOUND).unwrap();

    c.bench_function("compile_cache_hit", |b| {
        b.iter(|| registry.validate_expression(black_box(COMPOUND)).unwrap());
    });
}

criterion_group!(benches, bench_parse, bench_compile_cache);
criterion_main!(benches);
