//! # AST transformation pipeline (§4.2)
//!
//! A transformer is a function `Program -> (Program, changed)`. The
//! combinators below (`Sequence`, `Conditional`, `While`, `Fixpoint`, `Null`)
//! compose individual passes as first-class values instead of one big
//! method, so the outer driver (`pipeline()`) can wrap the whole thing in a
//! single top-level fixpoint.

mod passes;

pub use passes::*;

use crate::ast::Program;

/// A single rewrite step: mutates `program` in place and reports whether it
/// changed anything.
pub trait Transform {
    fn apply(&self, program: &mut Program) -> bool;

    fn name(&self) -> &'static str;
}

impl<F> Transform for F
where
    F: Fn(&mut Program) -> bool,
{
    fn apply(&self, program: &mut Program) -> bool {
        self(program)
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<F>()
    }
}

/// Named wrapper so trait-object transforms still report a stable `name()`
/// for logging, since closures' `type_name` is an unstable compiler detail.
pub struct Named<F> {
    pub label: &'static str,
    pub f: F,
}

impl<F> Transform for Named<F>
where
    F: Fn(&mut Program) -> bool,
{
    fn apply(&self, program: &mut Program) -> bool {
        (self.f)(program)
    }

    fn name(&self) -> &'static str {
        self.label
    }
}

pub fn named<F>(label: &'static str, f: F) -> Named<F>
where
    F: Fn(&mut Program) -> bool,
{
    Named { label, f }
}

/// Runs each pass once in order; reports "changed" if any did.
pub struct Sequence {
    pub steps: Vec<Box<dyn Transform>>,
}

impl Transform for Sequence {
    fn apply(&self, program: &mut Program) -> bool {
        let mut changed = false;
        for step in &self.steps {
            let step_changed = step.apply(program);
            if step_changed {
                tracing::debug!(pass = step.name(), "transform pass changed the program");
            }
            changed |= step_changed;
        }
        changed
    }

    fn name(&self) -> &'static str {
        "sequence"
    }
}

/// Runs the inner transform iff `predicate(program)` holds.
pub struct Conditional<P> {
    pub predicate: P,
    pub inner: Box<dyn Transform>,
}

impl<P> Transform for Conditional<P>
where
    P: Fn(&Program) -> bool,
{
    fn apply(&self, program: &mut Program) -> bool {
        if (self.predicate)(program) {
            self.inner.apply(program)
        } else {
            false
        }
    }

    fn name(&self) -> &'static str {
        "conditional"
    }
}

/// Repeats the inner transform while `predicate(program)` holds.
pub struct While<P> {
    pub predicate: P,
    pub inner: Box<dyn Transform>,
}

impl<P> Transform for While<P>
where
    P: Fn(&Program) -> bool,
{
    fn apply(&self, program: &mut Program) -> bool {
        let mut changed = false;
        while (self.predicate)(program) {
            if !self.inner.apply(program) {
                break;
            }
            changed = true;
        }
        changed
    }

    fn name(&self) -> &'static str {
        "while"
    }
}

/// Repeats the inner transform until a single application reports no
/// change.
pub struct Fixpoint {
    pub inner: Box<dyn Transform>,
    pub max_iterations: usize,
}

impl Fixpoint {
    pub fn new(inner: Box<dyn Transform>) -> Self {
        Fixpoint {
            inner,
            max_iterations: 10_000,
        }
    }
}

impl Transform for Fixpoint {
    fn apply(&self, program: &mut Program) -> bool {
        let mut any_change = false;
        for _ in 0..self.max_iterations {
            if !self.inner.apply(program) {
                return any_change;
            }
            any_change = true;
        }
        tracing::warn!(
            max_iterations = self.max_iterations,
            "transform fixpoint did not converge; giving up"
        );
        any_change
    }

    fn name(&self) -> &'static str {
        "fixpoint"
    }
}

/// Identity: never changes anything.
pub struct Null;

impl Transform for Null {
    fn apply(&self, _program: &mut Program) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Builds the full pipeline described by §4.2's "Order" paragraph:
/// (1)-(3) type/overload normalization, then (4)-(5), then (6)-(10)
/// structural simplification, then (11)-(16) pruning, (17) lattice
/// operations last (only if lattices exist). The whole thing is wrapped in
/// an outer fixpoint.
pub fn pipeline() -> Fixpoint {
    let steps: Vec<Box<dyn Transform>> = vec![
        Box::new(named("remove_typecasts", remove_typecasts)),
        Box::new(named("resolve_polymorphic_constants", resolve_polymorphic_constants)),
        Box::new(named("resolve_user_defined_functors", resolve_user_defined_functors)),
        Box::new(named("unique_aggregation_variables", unique_aggregation_variables)),
        Box::new(named("materialize_aggregation_queries", materialize_aggregation_queries)),
        Box::new(named("normalize_constraints", normalize_constraints)),
        Box::new(named("remove_boolean_constraints", remove_boolean_constraints)),
        Box::new(named("replace_singleton_variables", replace_singleton_variables)),
        Box::new(named("partition_body_literals", partition_body_literals)),
        Box::new(named("reduce_existentials", reduce_existentials)),
        Box::new(named("remove_redundant_relations", remove_redundant_relations)),
        Box::new(named("remove_empty_relations", remove_empty_relations)),
        Box::new(named("remove_relation_copies", remove_relation_copies)),
        Box::new(named("fold_anonymous_records", fold_anonymous_records)),
        Box::new(named("remove_constant_binary_constraints", remove_constant_binary_constraints)),
        Box::new(named("remove_redundant_sums", remove_redundant_sums)),
        Box::new(named("insert_lattice_operations", insert_lattice_operations)),
    ];
    Fixpoint::new(Box::new(Sequence { steps }))
}

/// Runs the full pipeline to fixpoint, as `crate::ram::translate` expects.
pub fn run(program: &mut Program) {
    pipeline().apply(program);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_on_already_simplified_program_is_a_fixpoint_in_one_round() {
        use crate::ast::builders::ClauseBuilder;
        let mut program = Program::default();
        program.clauses.push(
            ClauseBuilder::new("p")
                .head_vars(["x", "y"])
                .body_atom("e", ["x", "y"])
                .build(),
        );
        let before = program.clone();
        run(&mut program);
        let snapshot_after_first = program.clone();
        run(&mut program);
        assert_eq!(snapshot_after_first, program, "pipeline should be a no-op fixpoint once stable");
        // Sanity: didn't destroy the one real clause.
        assert_eq!(before.clauses.len().min(1), program.clauses.len().min(1));
    }
}
