//! Builder patterns for AST construction.
//!
//! Fluent APIs for constructing AST nodes, used heavily by tests and by the
//! transform passes that synthesize fresh clauses (e.g. the aggregation
//! materialization pass in `crate::transform`).
//!
//! ```
//! use ramlog::ast::builders::{AtomBuilder, ClauseBuilder};
//!
//! let atom = AtomBuilder::new("path").var("x").var("y").build();
//!
//! let clause = ClauseBuilder::new("path")
//!     .head_vars(["x", "z"])
//!     .body_atom("path", ["x", "y"])
//!     .body_atom("edge", ["y", "z"])
//!     .build();
//! ```

use super::{Argument, Atom, BodyLiteral, Clause, ComparisonOp, NumericConstant};

#[derive(Debug, Clone)]
pub struct AtomBuilder {
    relation: String,
    args: Vec<Argument>,
}

impl AtomBuilder {
    pub fn new(relation: impl Into<String>) -> Self {
        AtomBuilder {
            relation: relation.into(),
            args: Vec::new(),
        }
    }

    pub fn var(mut self, name: impl Into<String>) -> Self {
        self.args.push(Argument::Variable(name.into()));
        self
    }

    pub fn unnamed(mut self) -> Self {
        self.args.push(Argument::UnnamedVariable);
        self
    }

    pub fn int(mut self, value: i64) -> Self {
        self.args.push(Argument::Numeric(NumericConstant::Signed(value)));
        self
    }

    pub fn string(mut self, value: impl Into<String>) -> Self {
        self.args.push(Argument::StringConstant(value.into()));
        self
    }

    pub fn arg(mut self, arg: Argument) -> Self {
        self.args.push(arg);
        self
    }

    pub fn build(self) -> Atom {
        Atom {
            relation: self.relation,
            args: self.args,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClauseBuilder {
    head_relation: String,
    head_args: Vec<Argument>,
    body: Vec<BodyLiteral>,
}

impl ClauseBuilder {
    pub fn new(head_relation: impl Into<String>) -> Self {
        ClauseBuilder {
            head_relation: head_relation.into(),
            head_args: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn head_vars<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.head_args = vars.into_iter().map(|v| Argument::Variable(v.into())).collect();
        self
    }

    pub fn body_atom<I, S>(mut self, relation: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = AtomBuilder::new(relation);
        for v in vars {
            builder = builder.var(v);
        }
        self.body.push(BodyLiteral::Positive(builder.build()));
        self
    }

    pub fn body_negated<I, S>(mut self, relation: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = AtomBuilder::new(relation);
        for v in vars {
            builder = builder.var(v);
        }
        self.body.push(BodyLiteral::Negated(builder.build()));
        self
    }

    pub fn body_comparison(mut self, op: ComparisonOp, lhs: Argument, rhs: Argument) -> Self {
        self.body.push(BodyLiteral::Comparison(op, lhs, rhs));
        self
    }

    pub fn build(self) -> Clause {
        Clause {
            head: Atom {
                relation: self.head_relation,
                args: self.head_args,
            },
            body: self.body,
            plan: None,
            subsumptive: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_builder_assembles_mixed_argument_kinds() {
        let atom = AtomBuilder::new("score").string("alice").int(10).build();
        assert_eq!(atom.relation, "score");
        assert_eq!(atom.args.len(), 2);
    }

    #[test]
    fn clause_builder_assembles_recursive_clause() {
        let clause = ClauseBuilder::new("path")
            .head_vars(["x", "z"])
            .body_atom("path", ["x", "y"])
            .body_atom("edge", ["y", "z"])
            .build();
        assert!(clause.is_recursive("path"));
        assert!(clause.is_safe());
    }
}
