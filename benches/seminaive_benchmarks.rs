//! Seminaive evaluation benchmark suite.
//!
//! 1. Transitive closure over graphs of increasing size (seminaive fixpoint
//!    loop cost).
//! 2. Stratified negation over a fixed-size graph (extra stratum overhead).
//! 3. Relation insert/range-query throughput, independent of the rest of
//!    the pipeline.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ramlog::config::Config;
use ramlog::functor::FunctorRegistry;
use ramlog::interpreter::engine::ExecutionContext;
use ramlog::interpreter::generator;
use ramlog::ram::translate;
use ramlog::record_table::RecordTable;
use ramlog::relation::{RangeQuery, Relation};
use ramlog::symbol_table::SymbolTable;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::AtomicI64;

/// A chain graph `0 -> 1 -> 2 -> ... -> n-1` plus one back-edge to force a
/// genuinely recursive (non-trivial) transitive closure.
fn chain_graph_source(n: usize) -> String {
    let mut src = String::from(".decl edge(x: number, y: number)\n.decl path(x: number, y: number)\n");
    for i in 0..n.saturating_sub(1) {
        src.push_str(&format!("edge({i},{}).\n", i + 1));
    }
    if n > 1 {
        src.push_str(&format!("edge({},0).\n", n - 1));
    }
    src.push_str("path(x,y) :- edge(x,y).\npath(x,z) :- path(x,y), edge(y,z).\n");
    src
}

fn run_pipeline(source: &str) {
    let parsed = ramlog::parser::parse(source).expect("parses");
    let mut ast_program = parsed.program;
    ramlog::transform::run(&mut ast_program);
    let ram_program = translate::translate(&ast_program, &parsed.directives).expect("translates");
    let compiled = generator::build(&ram_program, &ast_program);

    let functors = FunctorRegistry::load(&[], &[]).expect("empty functor registry loads");
    let regex_cache: parking_lot::RwLock<HashMap<String, Regex>> = parking_lot::RwLock::new(HashMap::new());
    let auto_increment = AtomicI64::new(0);
    let symbols = SymbolTable::new();
    let records = RecordTable::new();
    let config = Config::default();

    let mut ctx = ExecutionContext::new(
        &compiled.relations,
        &symbols,
        &records,
        &functors,
        &regex_cache,
        &auto_increment,
        config.io.fact_dir.clone(),
        config.io.output_dir.clone(),
        config.effective_jobs(),
    );
    ctx.run(&compiled).expect("program runs");
}

fn bench_transitive_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("transitive_closure");
    for &n in &[10usize, 100, 500] {
        let source = chain_graph_source(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &source, |b, source| {
            b.iter(|| run_pipeline(source));
        });
    }
    group.finish();
}

fn bench_stratified_negation(c: &mut Criterion) {
    let mut group = c.benchmark_group("stratified_negation");
    for &n in &[10usize, 100] {
        let mut source = chain_graph_source(n);
        source.push_str(".decl node(x: number)\n.decl unreached(x: number)\n");
        for i in 0..n {
            source.push_str(&format!("node({i}).\n"));
        }
        source.push_str("unreached(x) :- node(x), !path(0,x).\n");
        group.bench_with_input(BenchmarkId::from_parameter(n), &source, |b, source| {
            b.iter(|| run_pipeline(source));
        });
    }
    group.finish();
}

fn bench_relation_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("relation_insert");
    for &n in &[1_000i64, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let relation = Relation::new(2, false);
                for i in 0..n {
                    relation.insert(Box::from([i, i * 2]));
                }
                relation.len()
            });
        });
    }
    group.finish();
}

fn bench_relation_range_query(c: &mut Criterion) {
    let relation = Relation::new(2, false);
    for i in 0..10_000i64 {
        relation.insert(Box::from([i % 100, i]));
    }
    c.bench_function("relation_range_query_point", |b| {
        b.iter(|| relation.range(&RangeQuery::point(&[42, 4_942])));
    });
}

criterion_group!(
    benches,
    bench_transitive_closure,
    bench_stratified_negation,
    bench_relation_insert,
    bench_relation_range_query
);
criterion_main!(benches);
