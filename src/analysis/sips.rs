//! Sideways information passing strategy (§4.4): orders a clause's body
//! literals for evaluation, preferring literals whose variables are already
//! bound by earlier literals (the "all-bound" default). Grounded in the
//! teacher's `magic_sets::Adornment` idea of bound/free argument positions,
//! generalized here from relation arguments to whole body literals.
//!
//! An explicit `.plan` on the clause (§4.4, "SIGNPOSTS is pluggable...
//! alternatives key on ordering hints from an explicit `.plan`") overrides
//! the default order outright.

use crate::ast::{BodyLiteral, Clause};
use std::collections::HashSet;

/// Returns indices into `clause.body` in the order they should be
/// evaluated, given the variables already bound before this clause starts
/// (typically empty, except for the synthetic head-derived context that a
/// recursive-clause "version" establishes for its delta atom).
pub fn evaluation_order(clause: &Clause, initially_bound: &HashSet<String>) -> Vec<usize> {
    if let Some(plan) = &clause.plan {
        return plan.clone();
    }
    let n = clause.body.len();
    let mut bound = initially_bound.clone();
    let mut remaining: Vec<usize> = (0..n).collect();
    let mut order = Vec::with_capacity(n);

    while !remaining.is_empty() {
        let (best_pos, _) = remaining
            .iter()
            .enumerate()
            .map(|(pos, &idx)| (pos, bound_count(&clause.body[idx], &bound)))
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(pos, count)| (pos, count))
            .unwrap();
        let idx = remaining.remove(best_pos);
        bound.extend(clause.body[idx].variables());
        order.push(idx);
    }
    order
}

fn bound_count(lit: &BodyLiteral, bound: &HashSet<String>) -> usize {
    // Negated atoms and comparisons never contribute new bindings in the
    // all-bound SIPS, so they sort after any literal that can still bind a
    // fresh variable, all else equal. We model that by scoring them using
    // only the "already bound" overlap, which is always <= a comparable
    // positive atom's overlap once its own variables are counted.
    match lit {
        BodyLiteral::Positive(atom) => atom.variables().iter().filter(|v| bound.contains(*v)).count(),
        BodyLiteral::Negated(atom) => atom.variables().iter().filter(|v| bound.contains(*v)).count(),
        BodyLiteral::Comparison(..) => lit.variables().iter().filter(|v| bound.contains(*v)).count(),
        BodyLiteral::BooleanConstant(_) => 0,
        BodyLiteral::Disjunction(_) => lit.variables().iter().filter(|v| bound.contains(*v)).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::ClauseBuilder;

    #[test]
    fn all_bound_sips_prefers_literal_with_more_bound_vars() {
        let clause = ClauseBuilder::new("p")
            .head_vars(["x", "z"])
            .body_atom("unrelated", ["w"])
            .body_atom("e", ["x", "z"])
            .build();
        let bound: HashSet<String> = ["x".to_string(), "z".to_string()].into_iter().collect();
        let order = evaluation_order(&clause, &bound);
        // "e" (both args bound) should be scheduled before "unrelated" (0 bound).
        assert_eq!(order[0], 1);
    }

    #[test]
    fn explicit_plan_overrides_default_order() {
        let mut clause = ClauseBuilder::new("p")
            .head_vars(["x"])
            .body_atom("a", ["x"])
            .body_atom("b", ["x"])
            .build();
        clause.plan = Some(vec![1, 0]);
        let order = evaluation_order(&clause, &HashSet::new());
        assert_eq!(order, vec![1, 0]);
    }
}
