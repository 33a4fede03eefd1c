//! Relation schedule (§4.3): for each SCC in topological order, the set of
//! relations it computes and the set of predecessor relations whose last
//! use is in that SCC and may be dropped (purged) afterwards.

use super::scc::{SccGraph, SccId};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct ScheduleStep {
    pub scc: SccId,
    pub computes: BTreeSet<String>,
    pub droppable_after: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct RelationSchedule {
    pub steps: Vec<ScheduleStep>,
}

impl RelationSchedule {
    pub fn build(scc_graph: &SccGraph) -> Self {
        let order = scc_graph.topological_order();
        // last_use[relation] = index into `order` of the last SCC that
        // reads it as a predecessor (or computes it, for self-reads).
        let mut last_use: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for (pos, &scc) in order.iter().enumerate() {
            for pred in &scc_graph.predecessors[scc] {
                for relation in &scc_graph.members[*pred] {
                    last_use.insert(relation.clone(), pos);
                }
            }
        }

        let mut steps = Vec::with_capacity(order.len());
        for (pos, &scc) in order.iter().enumerate() {
            let computes = scc_graph.members[scc].clone();
            let mut droppable = BTreeSet::new();
            for pred in &scc_graph.predecessors[scc] {
                for relation in &scc_graph.members[*pred] {
                    if last_use.get(relation) == Some(&pos) {
                        droppable.insert(relation.clone());
                    }
                }
            }
            steps.push(ScheduleStep {
                scc,
                computes,
                droppable_after: droppable,
            });
        }
        RelationSchedule { steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::precedence::PrecedenceGraph;
    use crate::ast::builders::ClauseBuilder;
    use crate::ast::Program;

    #[test]
    fn base_relation_droppable_after_its_only_consumer_runs() {
        let mut program = Program::default();
        program.clauses.push(ClauseBuilder::new("p").head_vars(["x"]).body_atom("e", ["x"]).build());
        let graph = PrecedenceGraph::build(&program);
        let scc_graph = SccGraph::build(&graph);
        let schedule = RelationSchedule::build(&scc_graph);
        let p_step = schedule
            .steps
            .iter()
            .find(|s| s.computes.contains("p"))
            .unwrap();
        assert!(p_step.droppable_after.contains("e"));
    }
}
