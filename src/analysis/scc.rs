//! Strongly connected components over the precedence graph, via Tarjan's
//! algorithm, plus the topologically sorted SCC order (§4.3).

use super::precedence::{DependencyKind, PrecedenceGraph};
use std::collections::{BTreeSet, HashMap};

pub type SccId = usize;

#[derive(Debug, Clone, Default)]
pub struct SccGraph {
    /// Relation name -> SCC id.
    pub membership: HashMap<String, SccId>,
    /// SCC id -> member relation names.
    pub members: Vec<BTreeSet<String>>,
    /// SCC id -> successor SCC ids (edges leaving this SCC).
    pub successors: Vec<BTreeSet<SccId>>,
    /// SCC id -> predecessor SCC ids.
    pub predecessors: Vec<BTreeSet<SccId>>,
    /// True if any edge from this SCC to itself is a negative dependency,
    /// i.e. a relation in the SCC negates another relation also in the SCC.
    /// Such programs are unstratifiable; the translator rejects them before
    /// reaching seminaive evaluation.
    pub has_internal_negation: Vec<bool>,
}

impl SccGraph {
    pub fn build(graph: &PrecedenceGraph) -> Self {
        let tarjan = Tarjan::run(graph);
        let mut result = SccGraph {
            membership: tarjan.membership,
            members: tarjan.members,
            successors: vec![BTreeSet::new(); tarjan.scc_count],
            predecessors: vec![BTreeSet::new(); tarjan.scc_count],
            has_internal_negation: vec![false; tarjan.scc_count],
        };

        for (head, edges) in &graph.edges {
            let head_scc = result.membership[head];
            for (target, kind) in edges {
                let Some(&target_scc) = result.membership.get(target) else {
                    continue;
                };
                if target_scc == head_scc {
                    if *kind == DependencyKind::Negative {
                        result.has_internal_negation[head_scc] = true;
                    }
                    continue;
                }
                result.successors[head_scc].insert(target_scc);
                result.predecessors[target_scc].insert(head_scc);
            }
        }
        result
    }

    pub fn scc_of(&self, relation: &str) -> Option<SccId> {
        self.membership.get(relation).copied()
    }

    pub fn is_recursive(&self, scc: SccId) -> bool {
        self.members[scc].len() > 1
            || self.members[scc]
                .iter()
                .next()
                .map(|r| self.members[scc].contains(r))
                .unwrap_or(false)
                && self.successors[scc].contains(&scc)
    }

    /// Topologically sorted SCC order: root SCCs (no predecessors) come
    /// first, ties broken by the lexicographically least member name, per
    /// §4.3's deterministic tie-break.
    pub fn topological_order(&self) -> Vec<SccId> {
        let n = self.members.len();
        let mut distance = vec![0usize; n];
        let mut order: Vec<SccId> = (0..n).collect();

        // Distance = longest path from any root; computed by repeated
        // relaxation since SCC DAGs here are small (program-sized).
        for _ in 0..n {
            let mut changed = false;
            for scc in 0..n {
                for &succ in &self.successors[scc] {
                    if distance[succ] < distance[scc] + 1 {
                        distance[succ] = distance[scc] + 1;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        order.sort_by(|&a, &b| {
            distance[a]
                .cmp(&distance[b])
                .then_with(|| self.members[a].iter().next().cmp(&self.members[b].iter().next()))
        });
        order
    }
}

struct Tarjan<'g> {
    graph: &'g PrecedenceGraph,
    index_counter: usize,
    stack: Vec<String>,
    on_stack: std::collections::HashSet<String>,
    indices: HashMap<String, usize>,
    lowlink: HashMap<String, usize>,
    membership: HashMap<String, SccId>,
    members: Vec<BTreeSet<String>>,
    scc_count: usize,
}

impl<'g> Tarjan<'g> {
    fn run(graph: &'g PrecedenceGraph) -> Self {
        let mut tarjan = Tarjan {
            graph,
            index_counter: 0,
            stack: Vec::new(),
            on_stack: std::collections::HashSet::new(),
            indices: HashMap::new(),
            lowlink: HashMap::new(),
            membership: HashMap::new(),
            members: Vec::new(),
            scc_count: 0,
        };
        let mut relations: Vec<&String> = graph.relations.iter().collect();
        relations.sort();
        for relation in relations {
            if !tarjan.indices.contains_key(relation) {
                tarjan.strong_connect(relation.clone());
            }
        }
        tarjan
    }

    fn strong_connect(&mut self, v: String) {
        self.indices.insert(v.clone(), self.index_counter);
        self.lowlink.insert(v.clone(), self.index_counter);
        self.index_counter += 1;
        self.stack.push(v.clone());
        self.on_stack.insert(v.clone());

        let mut successors: Vec<String> = self
            .graph
            .successors(&v)
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        successors.sort();
        for w in successors {
            if !self.indices.contains_key(&w) {
                self.strong_connect(w.clone());
                let w_low = self.lowlink[&w];
                let v_low = self.lowlink[&v];
                self.lowlink.insert(v.clone(), v_low.min(w_low));
            } else if self.on_stack.contains(&w) {
                let w_idx = self.indices[&w];
                let v_low = self.lowlink[&v];
                self.lowlink.insert(v.clone(), v_low.min(w_idx));
            }
        }

        if self.lowlink[&v] == self.indices[&v] {
            let scc_id = self.scc_count;
            self.scc_count += 1;
            let mut members = BTreeSet::new();
            loop {
                let w = self.stack.pop().unwrap();
                self.on_stack.remove(&w);
                self.membership.insert(w.clone(), scc_id);
                members.insert(w.clone());
                if w == v {
                    break;
                }
            }
            self.members.push(members);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::ClauseBuilder;
    use crate::ast::Program;

    #[test]
    fn mutually_recursive_relations_share_one_scc() {
        let mut program = Program::default();
        program.clauses.push(ClauseBuilder::new("p").head_vars(["x"]).body_atom("q", ["x"]).build());
        program.clauses.push(ClauseBuilder::new("q").head_vars(["x"]).body_atom("p", ["x"]).build());
        let graph = PrecedenceGraph::build(&program);
        let scc = SccGraph::build(&graph);
        assert_eq!(scc.scc_of("p"), scc.scc_of("q"));
    }

    #[test]
    fn topological_order_places_base_relation_before_dependent() {
        let mut program = Program::default();
        program.clauses.push(ClauseBuilder::new("p").head_vars(["x"]).body_atom("e", ["x"]).build());
        let graph = PrecedenceGraph::build(&program);
        let scc = SccGraph::build(&graph);
        let order = scc.topological_order();
        let e_pos = order.iter().position(|&id| scc.members[id].contains("e")).unwrap();
        let p_pos = order.iter().position(|&id| scc.members[id].contains("p")).unwrap();
        assert!(e_pos < p_pos);
    }

    #[test]
    fn self_negation_within_scc_is_flagged() {
        let mut program = Program::default();
        program.clauses.push(
            ClauseBuilder::new("p")
                .head_vars(["x"])
                .body_atom("q", ["x"])
                .body_negated("p", ["x"])
                .build(),
        );
        program.clauses.push(ClauseBuilder::new("q").head_vars(["x"]).body_atom("p", ["x"]).build());
        let graph = PrecedenceGraph::build(&program);
        let scc = SccGraph::build(&graph);
        let id = scc.scc_of("p").unwrap();
        assert!(scc.has_internal_negation[id]);
    }
}
