//! Relation storage and indexing (§4.1).
//!
//! A [`Relation`] holds one logical set of tuples, set semantics (insert is
//! idempotent). Tuples are stored once per column ordering actually
//! requested so a join can range-scan instead of walking the whole table; a
//! fresh ordering is created lazily on first use and kept in sync on every
//! later insert: one index struct per join-key ordering, registered in a
//! per-relation map, generalized from hash buckets to ordered sets since
//! range lookups (not just point lookups) need an order, not a hash.

use crate::value::{RamDomain, MAX_DOMAIN, MIN_DOMAIN};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

pub type Tuple = Box<[RamDomain]>;

/// A concrete low/high bound over every column, in the relation's declared
/// column order. `low[i] == high[i]` marks column `i` bound to an exact
/// value; `low[i] == MIN_DOMAIN && high[i] == MAX_DOMAIN` marks it
/// unconstrained (§4.4 "MIN/MAX sentinels" on an unbound column).
#[derive(Debug, Clone)]
pub struct RangeQuery {
    pub low: Vec<RamDomain>,
    pub high: Vec<RamDomain>,
}

impl RangeQuery {
    /// A point lookup: every column bound to an exact value.
    pub fn point(tuple: &[RamDomain]) -> Self {
        RangeQuery { low: tuple.to_vec(), high: tuple.to_vec() }
    }

    /// The fully unconstrained query over `arity` columns (equivalent to a
    /// full scan, routed through the same code path).
    pub fn unconstrained(arity: usize) -> Self {
        RangeQuery { low: vec![MIN_DOMAIN; arity], high: vec![MAX_DOMAIN; arity] }
    }

    fn bound_columns(&self) -> Vec<usize> {
        (0..self.low.len()).filter(|&i| self.low[i] == self.high[i]).collect()
    }
}

fn permute(columns: &[usize], tuple: &[RamDomain]) -> Tuple {
    columns.iter().map(|&c| tuple[c]).collect()
}

fn unpermute(columns: &[usize], permuted: &[RamDomain]) -> Tuple {
    let mut out = vec![0; permuted.len()];
    for (pos, &col) in columns.iter().enumerate() {
        out[col] = permuted[pos];
    }
    out.into_boxed_slice()
}

/// A relation's tuple storage: one index per column ordering in actual use,
/// all kept in lockstep on insert. Orderings are keyed by their column
/// permutation (`columns[i]` = the i-th column to sort by); the identity
/// permutation `0..arity` always exists.
#[derive(Debug)]
pub struct Relation {
    arity: usize,
    eqrel: bool,
    indexes: RwLock<HashMap<Vec<usize>, BTreeSet<Tuple>>>,
}

impl Relation {
    pub fn new(arity: usize, eqrel: bool) -> Self {
        let mut indexes = HashMap::new();
        indexes.insert(identity(arity), BTreeSet::new());
        Relation { arity, eqrel, indexes: RwLock::new(indexes) }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn is_eqrel(&self) -> bool {
        self.eqrel
    }

    /// Inserts `tuple` if not already present. Returns whether it was new;
    /// a seminaive loop's exit condition is driven by whether any insert
    /// across a whole iteration returned `true`.
    pub fn insert(&self, tuple: Tuple) -> bool {
        debug_assert_eq!(tuple.len(), self.arity);
        let mut indexes = self.indexes.write();
        let id = identity(self.arity);
        let is_new = indexes.get_mut(&id).expect("identity index always present").insert(tuple.clone());
        if is_new {
            let others: Vec<Vec<usize>> = indexes.keys().filter(|k| **k != id).cloned().collect();
            for columns in others {
                let permuted = permute(&columns, &tuple);
                indexes.get_mut(&columns).unwrap().insert(permuted);
            }
        }
        is_new
    }

    pub fn contains(&self, tuple: &[RamDomain]) -> bool {
        let indexes = self.indexes.read();
        indexes[&identity(self.arity)].contains(tuple)
    }

    pub fn len(&self) -> usize {
        self.indexes.read()[&identity(self.arity)].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A full scan, in identity column order.
    pub fn scan(&self) -> Vec<Tuple> {
        self.indexes.read()[&identity(self.arity)].iter().cloned().collect()
    }

    /// Splits a full scan into up to `n` roughly-equal chunks for parallel
    /// iteration (§4.6 "parallel scan"); `rayon` drives the actual work
    /// distribution over whatever this returns.
    pub fn scan_partitioned(&self, n: usize) -> Vec<Vec<Tuple>> {
        let all = self.scan();
        if n <= 1 || all.is_empty() {
            return vec![all];
        }
        let chunk = all.len().div_ceil(n).max(1);
        all.chunks(chunk).map(<[Tuple]>::to_vec).collect()
    }

    /// A range lookup in canonical column order. Lazily builds (and
    /// thereafter keeps in sync via `insert`) the ordering whose prefix is
    /// exactly `query`'s bound columns, so the underlying `BTreeSet::range`
    /// only visits matching rows rather than the whole relation. Correct
    /// for any subset of bound columns: padding the unbound suffix
    /// uniformly with `MIN_DOMAIN`/`MAX_DOMAIN` keeps the lexicographic
    /// range exact, since bound columns never appear after an unbound one
    /// in the chosen ordering.
    pub fn range(&self, query: &RangeQuery) -> Vec<Tuple> {
        let bound = query.bound_columns();
        let mut columns = bound;
        columns.extend((0..self.arity).filter(|c| !columns_contains(&columns, *c)));

        {
            let indexes = self.indexes.read();
            if let Some(set) = indexes.get(&columns) {
                return scan_range(set, &columns, query);
            }
        }
        let mut indexes = self.indexes.write();
        if !indexes.contains_key(&columns) {
            let id = identity(self.arity);
            let snapshot: BTreeSet<Tuple> = indexes[&id].iter().map(|t| permute(&columns, t)).collect();
            indexes.insert(columns.clone(), snapshot);
        }
        scan_range(&indexes[&columns], &columns, query)
    }

    /// Removes every tuple from every index (the RAM `clear` statement).
    pub fn clear(&self) {
        for set in self.indexes.write().values_mut() {
            set.clear();
        }
    }

    /// Swaps this relation's entire contents with `other`'s (the RAM `swap`
    /// statement, used to rotate `new`/`main` pairs in O(1) rather than
    /// copying). Locks are taken in address order to avoid deadlocking
    /// against a concurrent swap of the same pair in the other direction.
    pub fn swap_contents(&self, other: &Relation) {
        let (first, second) = if std::ptr::eq(self, other) {
            return;
        } else if (self as *const Relation) < (other as *const Relation) {
            (self, other)
        } else {
            (other, self)
        };
        let mut a = first.indexes.write();
        let mut b = second.indexes.write();
        std::mem::swap(&mut *a, &mut *b);
    }

    /// Computes the symmetric-transitive-reflexive closure of `self`'s
    /// current pairs unioned with `delta`'s, storing the result back into
    /// `self` (§4.4 "merge-extend"). Each tuple is a pair `(a, b)` meaning
    /// `a ~ b`; only meaningful for an `eqrel`-representation relation.
    pub fn merge_extend(&self, delta: &Relation) {
        debug_assert_eq!(self.arity, 2);
        let mut pairs = self.scan();
        pairs.extend(delta.scan());

        let mut parent: HashMap<RamDomain, RamDomain> = HashMap::new();
        for pair in &pairs {
            union(&mut parent, pair[0], pair[1]);
        }

        let mut classes: HashMap<RamDomain, BTreeSet<RamDomain>> = HashMap::new();
        for pair in &pairs {
            for &elem in pair.iter() {
                let root = find(&mut parent, elem);
                classes.entry(root).or_default().insert(elem);
            }
        }

        for class in classes.values() {
            for &a in class {
                for &b in class {
                    self.insert(Box::from([a, b]));
                }
            }
        }
    }
}

fn identity(arity: usize) -> Vec<usize> {
    (0..arity).collect()
}

fn columns_contains(columns: &[usize], c: usize) -> bool {
    columns.contains(&c)
}

fn scan_range(set: &BTreeSet<Tuple>, columns: &[usize], query: &RangeQuery) -> Vec<Tuple> {
    let low_key: Tuple = columns.iter().map(|&c| query.low[c]).collect();
    let high_key: Tuple = columns.iter().map(|&c| query.high[c]).collect();
    set.range(low_key..=high_key).map(|permuted| unpermute(columns, permuted)).collect()
}

fn find(parent: &mut HashMap<RamDomain, RamDomain>, x: RamDomain) -> RamDomain {
    let p = *parent.entry(x).or_insert(x);
    if p == x {
        x
    } else {
        let root = find(parent, p);
        parent.insert(x, root);
        root
    }
}

fn union(parent: &mut HashMap<RamDomain, RamDomain>, a: RamDomain, b: RamDomain) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent.insert(ra, rb);
    }
}

/// A thread-local cursor over a relation scan's snapshot, handed out per
/// query-tuple-id by the interpreter's engine (§4.6). Snapshotting on
/// creation (rather than iterating the live index) means tuples inserted
/// mid-scan by the same statement never retroactively appear in an
/// in-progress outer loop, matching seminaive evaluation's requirement that
/// a `new`-relation scan started this iteration sees only this iteration's
/// starting contents.
pub struct View {
    tuples: Vec<Tuple>,
    position: usize,
}

impl View {
    pub fn scan(relation: &Relation) -> Self {
        View { tuples: relation.scan(), position: 0 }
    }

    pub fn range(relation: &Relation, query: &RangeQuery) -> Self {
        View { tuples: relation.range(query), position: 0 }
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }

    pub fn next(&mut self) -> Option<&[RamDomain]> {
        let tuple = self.tuples.get(self.position)?;
        self.position += 1;
        Some(tuple)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let r = Relation::new(2, false);
        assert!(r.insert(Box::from([1, 2])));
        assert!(!r.insert(Box::from([1, 2])));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn contains_reflects_inserts() {
        let r = Relation::new(2, false);
        r.insert(Box::from([1, 2]));
        assert!(r.contains(&[1, 2]));
        assert!(!r.contains(&[2, 1]));
    }

    #[test]
    fn range_query_on_first_column_returns_only_matches() {
        let r = Relation::new(2, false);
        r.insert(Box::from([1, 10]));
        r.insert(Box::from([1, 20]));
        r.insert(Box::from([2, 30]));
        let query = RangeQuery { low: vec![1, MIN_DOMAIN], high: vec![1, MAX_DOMAIN] };
        let mut results = r.range(&query);
        results.sort();
        assert_eq!(results, vec![Box::from([1, 10]), Box::from([1, 20])]);
    }

    #[test]
    fn range_query_on_second_column_is_also_correct() {
        let r = Relation::new(2, false);
        r.insert(Box::from([1, 10]));
        r.insert(Box::from([2, 10]));
        r.insert(Box::from([3, 20]));
        let query = RangeQuery { low: vec![MIN_DOMAIN, 10], high: vec![MAX_DOMAIN, 10] };
        let mut results = r.range(&query);
        results.sort();
        assert_eq!(results, vec![Box::from([1, 10]), Box::from([2, 10])]);
    }

    #[test]
    fn clear_empties_every_index() {
        let r = Relation::new(2, false);
        r.insert(Box::from([1, 2]));
        let _ = r.range(&RangeQuery { low: vec![1, MIN_DOMAIN], high: vec![1, MAX_DOMAIN] });
        r.clear();
        assert!(r.is_empty());
        assert!(r.range(&RangeQuery::unconstrained(2)).is_empty());
    }

    #[test]
    fn swap_contents_exchanges_tuples() {
        let a = Relation::new(1, false);
        let b = Relation::new(1, false);
        a.insert(Box::from([1]));
        b.insert(Box::from([2]));
        a.swap_contents(&b);
        assert!(a.contains(&[2]));
        assert!(b.contains(&[1]));
    }

    #[test]
    fn merge_extend_computes_transitive_closure() {
        let main = Relation::new(2, true);
        let delta = Relation::new(2, true);
        delta.insert(Box::from([1, 2]));
        delta.insert(Box::from([2, 3]));
        main.merge_extend(&delta);
        assert!(main.contains(&[1, 3]));
        assert!(main.contains(&[3, 1]));
        assert!(main.contains(&[1, 1]));
    }

    #[test]
    fn view_yields_a_stable_snapshot() {
        let r = Relation::new(1, false);
        r.insert(Box::from([1]));
        let mut view = View::scan(&r);
        r.insert(Box::from([2]));
        assert_eq!(view.next(), Some(&[1][..]));
        assert_eq!(view.next(), None);
    }
}
