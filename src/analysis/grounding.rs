//! Grounding analysis (§4.3, §3.4 invariant): per clause, determine which
//! variables are grounded by some positive body atom, transitively through
//! equality constraints and record initializers.

use crate::ast::{Argument, BodyLiteral, Clause, ComparisonOp};
use crate::error::SemanticError;
use std::collections::HashSet;

/// Computes the set of grounded variable names for `clause`, propagating
/// through `X = <expr>` equality constraints until no new variable is
/// grounded in a pass (a simple fixpoint, since an equality can ground a
/// variable whose own grounding depends on another equality processed
/// later in body order).
pub fn grounded_variables(clause: &Clause) -> HashSet<String> {
    let mut grounded = clause.positive_body_variables();
    loop {
        let mut changed = false;
        for lit in &clause.body {
            if let BodyLiteral::Comparison(ComparisonOp::Eq, lhs, rhs) = lit {
                changed |= propagate_equality(lhs, rhs, &mut grounded);
                changed |= propagate_equality(rhs, lhs, &mut grounded);
            }
        }
        if !changed {
            break;
        }
    }
    grounded
}

fn propagate_equality(side: &Argument, other: &Argument, grounded: &mut HashSet<String>) -> bool {
    if let Argument::Variable(name) = side {
        if !grounded.contains(name) && is_grounded_expr(other, grounded) {
            grounded.insert(name.clone());
            return true;
        }
    }
    false
}

fn is_grounded_expr(arg: &Argument, grounded: &HashSet<String>) -> bool {
    match arg {
        Argument::Variable(name) => grounded.contains(name),
        Argument::UnnamedVariable => false,
        Argument::Numeric(_) | Argument::StringConstant(_) => true,
        Argument::RecordInit(fields) | Argument::BranchInit(_, fields) => {
            fields.iter().all(|f| is_grounded_expr(f, grounded))
        }
        Argument::IntrinsicFunctor(_, args) => args.iter().all(|a| is_grounded_expr(a, grounded)),
        Argument::UserDefinedFunctor(_, args, _, _) => {
            args.iter().all(|a| is_grounded_expr(a, grounded))
        }
        Argument::Typecast(_, inner) => is_grounded_expr(inner, grounded),
        Argument::Aggregate(_) => true,
    }
}

/// Validates that every head variable of `clause` is grounded, per the
/// §3.4 invariant. Returns a [`SemanticError::UngroundedVariable`] naming
/// the first offending variable found, for a deterministic diagnostic.
pub fn check_clause_grounded(clause: &Clause) -> Result<(), SemanticError> {
    let grounded = grounded_variables(clause);
    for var in clause.head.variables() {
        if !grounded.contains(&var) {
            return Err(SemanticError::UngroundedVariable(var, clause.head.relation.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::ClauseBuilder;
    use crate::ast::{Argument, ComparisonOp, NumericConstant};

    #[test]
    fn variable_grounded_transitively_through_equality() {
        let clause = ClauseBuilder::new("p")
            .head_vars(["y"])
            .body_atom("e", ["x"])
            .body_comparison(ComparisonOp::Eq, Argument::Variable("y".into()), Argument::Variable("x".into()))
            .build();
        assert!(check_clause_grounded(&clause).is_ok());
    }

    #[test]
    fn ungrounded_head_variable_is_rejected() {
        let clause = ClauseBuilder::new("p").head_vars(["x", "y"]).body_atom("e", ["x"]).build();
        assert!(check_clause_grounded(&clause).is_err());
    }

    #[test]
    fn constant_equality_grounds_variable() {
        let clause = ClauseBuilder::new("p")
            .head_vars(["y"])
            .body_comparison(
                ComparisonOp::Eq,
                Argument::Variable("y".into()),
                Argument::Numeric(NumericConstant::Signed(5)),
            )
            .build();
        assert!(check_clause_grounded(&clause).is_ok());
    }
}
