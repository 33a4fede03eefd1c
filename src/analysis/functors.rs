//! User-defined functor declaration checks (§6 "User-defined functor ABI").
//!
//! `crate::transform::passes::resolve_user_defined_functors` attaches the
//! declared parameter/return [`crate::value::Kind`]s onto every
//! `UserDefinedFunctor` call it can resolve, but it is a pure AST rewrite
//! that never fails. [`check`] is the validation step that turns a call to
//! an undeclared functor, or one called with the wrong arity, into a
//! [`SemanticError`] before translation proceeds.

use crate::ast::{Argument, Atom, BodyLiteral, Program};
use crate::error::SemanticError;
use std::collections::HashMap;

pub fn check(program: &Program) -> Result<(), SemanticError> {
    let table: HashMap<&str, usize> =
        program.functors.iter().map(|f| (f.name.as_str(), f.arg_types.len())).collect();
    for clause in &program.clauses {
        check_atom(&clause.head, &table)?;
        for lit in &clause.body {
            check_literal(lit, &table)?;
        }
    }
    Ok(())
}

fn check_literal(lit: &BodyLiteral, table: &HashMap<&str, usize>) -> Result<(), SemanticError> {
    match lit {
        BodyLiteral::Positive(a) | BodyLiteral::Negated(a) => check_atom(a, table),
        BodyLiteral::Comparison(_, l, r) => {
            check_arg(l, table)?;
            check_arg(r, table)
        }
        BodyLiteral::Disjunction(lits) => lits.iter().try_for_each(|l| check_literal(l, table)),
        BodyLiteral::BooleanConstant(_) => Ok(()),
    }
}

fn check_atom(atom: &Atom, table: &HashMap<&str, usize>) -> Result<(), SemanticError> {
    atom.args.iter().try_for_each(|a| check_arg(a, table))
}

fn check_arg(arg: &Argument, table: &HashMap<&str, usize>) -> Result<(), SemanticError> {
    match arg {
        Argument::UserDefinedFunctor(name, args, ..) => {
            let expected = *table
                .get(name.as_str())
                .ok_or_else(|| SemanticError::MissingFunctorDeclaration(name.clone()))?;
            if expected != args.len() {
                return Err(SemanticError::FunctorArityMismatch {
                    name: name.clone(),
                    expected,
                    got: args.len(),
                });
            }
            args.iter().try_for_each(|a| check_arg(a, table))
        }
        Argument::RecordInit(fields) | Argument::BranchInit(_, fields) => {
            fields.iter().try_for_each(|a| check_arg(a, table))
        }
        Argument::IntrinsicFunctor(_, args) => args.iter().try_for_each(|a| check_arg(a, table)),
        Argument::Typecast(_, inner) => check_arg(inner, table),
        Argument::Aggregate(agg) => check_arg(&agg.target, table),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{builders::ClauseBuilder, FunctorDecl, QualifiedName};
    use crate::value::Kind;

    #[test]
    fn undeclared_functor_call_is_rejected() {
        let mut program = Program::default();
        program.clauses.push(
            ClauseBuilder::new("p")
                .head_vars(["x"])
                .build(),
        );
        program.clauses[0].body.push(BodyLiteral::Comparison(
            crate::ast::ComparisonOp::Eq,
            Argument::Variable("x".to_string()),
            Argument::UserDefinedFunctor("double".to_string(), vec![Argument::Variable("x".to_string())], vec![Kind::Signed], Kind::Signed),
        ));
        let err = check(&program).unwrap_err();
        assert!(matches!(err, SemanticError::MissingFunctorDeclaration(name) if name == "double"));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let mut program = Program::default();
        program.functors.push(FunctorDecl {
            name: "double".to_string(),
            arg_types: vec![QualifiedName::single("number")],
            return_type: QualifiedName::single("number"),
        });
        program.clauses.push(ClauseBuilder::new("p").head_vars(["x"]).build());
        program.clauses[0].body.push(BodyLiteral::Comparison(
            crate::ast::ComparisonOp::Eq,
            Argument::Variable("x".to_string()),
            Argument::UserDefinedFunctor(
                "double".to_string(),
                vec![Argument::Variable("x".to_string()), Argument::Variable("x".to_string())],
                vec![Kind::Signed, Kind::Signed],
                Kind::Signed,
            ),
        ));
        let err = check(&program).unwrap_err();
        assert!(matches!(err, SemanticError::FunctorArityMismatch { expected: 1, got: 2, .. }));
    }

    #[test]
    fn declared_functor_with_matching_arity_passes() {
        let mut program = Program::default();
        program.functors.push(FunctorDecl {
            name: "double".to_string(),
            arg_types: vec![QualifiedName::single("number")],
            return_type: QualifiedName::single("number"),
        });
        program.clauses.push(ClauseBuilder::new("p").head_vars(["x"]).build());
        program.clauses[0].body.push(BodyLiteral::Comparison(
            crate::ast::ComparisonOp::Eq,
            Argument::Variable("x".to_string()),
            Argument::UserDefinedFunctor(
                "double".to_string(),
                vec![Argument::Variable("x".to_string())],
                vec![Kind::Signed],
                Kind::Signed,
            ),
        ));
        assert!(check(&program).is_ok());
    }
}
