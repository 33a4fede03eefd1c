//! Redundant-relation analysis (§4.3): BFS backward from output relations
//! over the precedence graph; every unvisited relation is redundant.

use super::precedence::PrecedenceGraph;
use crate::ast::Program;
use std::collections::{HashSet, VecDeque};

/// Returns every relation transitively reachable from an output relation
/// (walking the precedence graph backward: a relation is reachable if some
/// reachable relation's clause body mentions it).
///
/// Without explicit output directives threaded in, all declared relations
/// with no further consumer are conservatively treated as roots: this keeps
/// `remove_redundant_relations` a safe no-op until the caller (the CLI
/// driver, which does know the output set from directives) narrows the
/// root set via [`reachable_from`].
pub fn reachable_relations(program: &Program) -> HashSet<String> {
    reachable_from(program, &program.all_relations())
}

pub fn reachable_from(program: &Program, roots: &HashSet<String>) -> HashSet<String> {
    let graph = PrecedenceGraph::build(program);
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = roots.iter().cloned().collect();
    while let Some(relation) = queue.pop_front() {
        if !visited.insert(relation.clone()) {
            continue;
        }
        for (dep, _) in graph.successors(&relation) {
            if !visited.contains(dep) {
                queue.push_back(dep.clone());
            }
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::ClauseBuilder;

    #[test]
    fn relation_unreachable_from_roots_is_excluded() {
        let mut program = Program::default();
        program.clauses.push(ClauseBuilder::new("out").head_vars(["x"]).body_atom("e", ["x"]).build());
        program.clauses.push(ClauseBuilder::new("dead").head_vars(["x"]).body_atom("f", ["x"]).build());
        let roots: HashSet<String> = ["out".to_string()].into_iter().collect();
        let reachable = reachable_from(&program, &roots);
        assert!(reachable.contains("e"));
        assert!(!reachable.contains("dead"));
    }
}
