//! Property-based checks of invariants that should hold for any program or
//! table contents, not just the literal scenarios in `end_to_end.rs`.

use proptest::prelude::*;
use ramlog::config::Config;
use ramlog::functor::FunctorRegistry;
use ramlog::interpreter::engine::ExecutionContext;
use ramlog::interpreter::generator;
use ramlog::parser;
use ramlog::ram::translate;
use ramlog::record_table::RecordTable;
use ramlog::relation::{RangeQuery, Relation};
use ramlog::symbol_table::SymbolTable;
use ramlog::value::{RamDomain, Word};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicI64;

/// Runs a source program to completion and returns the final contents of
/// `relation` (mirrors `end_to_end.rs`'s helper of the same name, duplicated
/// here since proptest's integration test binaries don't share code).
fn run_and_scan(source: &str, relation: &str) -> Vec<Box<[RamDomain]>> {
    let parsed = parser::parse(source).expect("parses");
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
        1,
    );
    ctx.run(&compiled).expect("program runs");

    compiled.relations.get(relation).unwrap_or_else(|| panic!("no relation `{relation}`")).scan()
}

proptest! {
    /// Interning the same string twice always yields the same index, and
    /// resolving that index always yields the original string back.
    #[test]
    fn symbol_table_roundtrips_any_string(s in "[a-zA-Z0-9_]{0,32}") {
        let table = SymbolTable::new();
        let first = table.lookup(&s);
        let second = table.lookup(&s);
        prop_assert_eq!(first, second);
        prop_assert_eq!(&*table.resolve(first), s.as_str());
    }

    /// Packing the same tuple twice always yields the same record index,
    /// and unpacking it always returns the original tuple.
    #[test]
    fn record_table_roundtrips_any_tuple(data in prop::collection::vec(any::<i32>(), 0..6)) {
        let table = RecordTable::new();
        let data: Vec<RamDomain> = data.into_iter().map(i64::from).collect();
        let idx_a = table.pack(&data, data.len());
        let idx_b = table.pack(&data, data.len());
        prop_assert_eq!(idx_a, idx_b);
        prop_assert_eq!(&*table.unpack(idx_a, data.len()), data.as_slice());
    }

    /// Inserting a tuple is monotone: `len()` never decreases, and a tuple
    /// once inserted is always found by `contains` afterward regardless of
    /// what else gets inserted later.
    #[test]
    fn relation_insert_is_monotone(
        tuples in prop::collection::vec((any::<i16>(), any::<i16>()), 0..20)
    ) {
        let relation = Relation::new(2, false);
        let mut previous_len = 0;
        let mut seen = HashSet::new();
        for (a, b) in tuples {
            let tuple: Box<[RamDomain]> = Box::from([i64::from(a), i64::from(b)]);
            relation.insert(tuple.clone());
            seen.insert((i64::from(a), i64::from(b)));
            prop_assert!(relation.len() >= previous_len);
            previous_len = relation.len();
            prop_assert!(relation.contains(&tuple));
        }
        prop_assert_eq!(relation.len(), seen.len());
    }

    /// A range query with every column bound (`RangeQuery::point`) returns
    /// exactly the tuples a brute-force scan-and-filter would.
    #[test]
    fn point_range_query_matches_brute_force_scan(
        tuples in prop::collection::vec((0i16..5, 0i16..5), 0..30),
        qa in 0i16..5,
        qb in 0i16..5,
    ) {
        let relation = Relation::new(2, false);
        for (a, b) in &tuples {
            relation.insert(Box::from([i64::from(*a), i64::from(*b)]));
        }
        let query_tuple = [i64::from(qa), i64::from(qb)];
        let expected = relation.contains(&query_tuple);

        let hits = relation.range(&RangeQuery::point(&query_tuple));
        prop_assert_eq!(hits.len(), if expected { 1 } else { 0 });
        if expected {
            prop_assert_eq!(&*hits[0], &query_tuple[..]);
        }
    }

    /// An unconstrained range query always returns everything a full scan
    /// would, independent of insertion order.
    #[test]
    fn unconstrained_range_query_matches_full_scan(
        tuples in prop::collection::vec((any::<i16>(), any::<i16>()), 0..30)
    ) {
        let relation = Relation::new(2, false);
        for (a, b) in &tuples {
            relation.insert(Box::from([i64::from(*a), i64::from(*b)]));
        }
        let mut scanned = relation.scan();
        let mut ranged = relation.range(&RangeQuery::unconstrained(2));
        scanned.sort();
        ranged.sort();
        prop_assert_eq!(scanned, ranged);
    }

    /// A `float`-typed addition run through the full pipeline always produces
    /// the IEEE-754 sum of its two operands, for any pair of finite floats —
    /// not the result of adding their raw bit patterns as signed integers.
    #[test]
    fn float_addition_matches_native_ieee_sum(
        x in -1.0e6f64..1.0e6,
        y in -1.0e6f64..1.0e6,
    ) {
        let source = format!(
            "\
.decl measurement(x: float, y: float)
.decl total(z: float)
measurement({x:?}, {y:?}).
total(z) :- measurement(a,b), z = a + b.
"
        );
        let tuples = run_and_scan(&source, "total");
        prop_assert_eq!(tuples.len(), 1);
        let got = Word(tuples[0][0]).as_float();
        prop_assert!((got - (x + y)).abs() <= f64::EPSILON * (x + y).abs().max(1.0));
    }

    /// An `unsigned`-typed subtraction run through the full pipeline always
    /// wraps the same way `u64::wrapping_sub` does, and a `>`/`<` comparison
    /// over the result always orders by that wrapped unsigned value rather
    /// than by the two's-complement bit pattern reinterpreted as signed.
    #[test]
    fn unsigned_subtraction_matches_native_wrapping_sub(
        x in any::<u32>(),
        y in any::<u32>(),
    ) {
        let source = format!(
            "\
.decl pair(x: unsigned, y: unsigned)
.decl diff(z: unsigned)
pair({x}u, {y}u).
diff(z) :- pair(a,b), z = a - b.
"
        );
        let tuples = run_and_scan(&source, "diff");
        prop_assert_eq!(tuples.len(), 1);
        let got = Word(tuples[0][0]).as_unsigned();
        prop_assert_eq!(got, (x as u64).wrapping_sub(y as u64));
    }
}

/// `transform::run` is a fixpoint: running it again on its own output must
/// not change the program any further.
#[test]
fn transform_is_idempotent_on_a_recursive_program() {
    let source = "\
.decl edge(x: number, y: number)
.decl path(x: number, y: number)
edge(1,2).
path(x,y) :- edge(x,y).
path(x,z) :- path(x,y), edge(y,z).
";
    let parsed = ramlog::parser::parse(source).expect("parses");
    let mut once = parsed.program.clone();
    ramlog::transform::run(&mut once);
    let mut twice = once.clone();
    ramlog::transform::run(&mut twice);
    assert_eq!(once, twice);
}
