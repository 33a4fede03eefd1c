//! Precedence graph and stratified-negation dependency tracking.
//!
//! Positive edges (head depends on a relation via a positive atom,
//! same-or-higher stratum allowed) versus negative edges (head depends on a
//! relation via negation, which must sit in a strictly lower stratum).

use crate::ast::{BodyLiteral, Program};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    Positive,
    Negative,
}

/// Directed edge from head-relation to every relation appearing in a body
/// literal of any of its clauses (§4.3 "Precedence graph").
#[derive(Debug, Clone, Default)]
pub struct PrecedenceGraph {
    pub edges: HashMap<String, Vec<(String, DependencyKind)>>,
    pub relations: HashSet<String>,
}

impl PrecedenceGraph {
    pub fn build(program: &Program) -> Self {
        let mut graph = PrecedenceGraph::default();
        graph.relations = program.all_relations();
        for clause in &program.clauses {
            graph.relations.insert(clause.head.relation.clone());
            for lit in &clause.body {
                let (name, kind) = match lit {
                    BodyLiteral::Positive(atom) => (atom.relation.clone(), DependencyKind::Positive),
                    BodyLiteral::Negated(atom) => (atom.relation.clone(), DependencyKind::Negative),
                    _ => continue,
                };
                graph.relations.insert(name.clone());
                graph
                    .edges
                    .entry(clause.head.relation.clone())
                    .or_default()
                    .push((name, kind));
            }
        }
        graph
    }

    pub fn successors(&self, relation: &str) -> &[(String, DependencyKind)] {
        self.edges.get(relation).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::ClauseBuilder;

    #[test]
    fn negation_edge_is_tagged_negative() {
        let mut program = Program::default();
        program.clauses.push(
            ClauseBuilder::new("c")
                .head_vars(["x"])
                .body_atom("a", ["x"])
                .body_negated("b", ["x"])
                .build(),
        );
        let graph = PrecedenceGraph::build(&program);
        let succ = graph.successors("c");
        assert!(succ.contains(&("a".to_string(), DependencyKind::Positive)));
        assert!(succ.contains(&("b".to_string(), DependencyKind::Negative)));
    }
}
