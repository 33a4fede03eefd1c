//! The eighteen core passes of §4.2, each `Program -> (mutated in place, changed)`.

use crate::ast::{
    Aggregate, AggregateFuncRef, Argument, Atom, BodyLiteral, Clause, ComparisonOp, LatticeOp,
    NumericConstant, Program,
};
use crate::value::Kind;
use std::collections::{HashMap, HashSet};

/// 1. Remove typecasts: a typecast's inner argument already carries its
/// resolved type once analysis has run, so the wrapper is pure noise by
/// translation time.
pub fn remove_typecasts(program: &mut Program) -> bool {
    let mut changed = false;
    for clause in &mut program.clauses {
        changed |= strip_typecasts_atom(&mut clause.head);
        for lit in &mut clause.body {
            changed |= strip_typecasts_literal(lit);
        }
    }
    changed
}

fn strip_typecasts_atom(atom: &mut Atom) -> bool {
    let mut changed = false;
    for arg in &mut atom.args {
        changed |= strip_typecasts_arg(arg);
    }
    changed
}

fn strip_typecasts_literal(lit: &mut BodyLiteral) -> bool {
    match lit {
        BodyLiteral::Positive(a) | BodyLiteral::Negated(a) => strip_typecasts_atom(a),
        BodyLiteral::Comparison(_, l, r) => strip_typecasts_arg(l) | strip_typecasts_arg(r),
        BodyLiteral::Disjunction(lits) => lits.iter_mut().fold(false, |acc, l| acc | strip_typecasts_literal(l)),
        BodyLiteral::BooleanConstant(_) => false,
    }
}

fn strip_typecasts_arg(arg: &mut Argument) -> bool {
    if let Argument::Typecast(_, inner) = arg {
        let inner = std::mem::replace(inner.as_mut(), Argument::UnnamedVariable);
        *arg = inner;
        return true;
    }
    match arg {
        Argument::RecordInit(fields) | Argument::BranchInit(_, fields) => {
            fields.iter_mut().fold(false, |acc, a| acc | strip_typecasts_arg(a))
        }
        Argument::IntrinsicFunctor(_, args) => {
            args.iter_mut().fold(false, |acc, a| acc | strip_typecasts_arg(a))
        }
        Argument::UserDefinedFunctor(_, args, _, _) => {
            args.iter_mut().fold(false, |acc, a| acc | strip_typecasts_arg(a))
        }
        Argument::Aggregate(agg) => strip_typecasts_arg(&mut agg.target),
        _ => false,
    }
}

/// 2. Polymorphic resolution: an `Unresolved(i128)` numeric constant becomes
/// `Signed` unless it overflows `i64`, in which case it becomes `Unsigned`.
/// Full bidirectional type-set inference from attribute declarations is a
/// larger analysis; this pass implements the concrete defaulting rule the
/// interpreter actually needs to run.
pub fn resolve_polymorphic_constants(program: &mut Program) -> bool {
    let mut changed = false;
    for clause in &mut program.clauses {
        changed |= resolve_atom(&mut clause.head);
        for lit in &mut clause.body {
            changed |= resolve_literal(lit);
        }
    }
    changed
}

fn resolve_atom(atom: &mut Atom) -> bool {
    atom.args.iter_mut().fold(false, |acc, a| acc | resolve_arg(a))
}

fn resolve_literal(lit: &mut BodyLiteral) -> bool {
    match lit {
        BodyLiteral::Positive(a) | BodyLiteral::Negated(a) => resolve_atom(a),
        BodyLiteral::Comparison(_, l, r) => resolve_arg(l) | resolve_arg(r),
        BodyLiteral::Disjunction(lits) => lits.iter_mut().fold(false, |acc, l| acc | resolve_literal(l)),
        BodyLiteral::BooleanConstant(_) => false,
    }
}

fn resolve_arg(arg: &mut Argument) -> bool {
    match arg {
        Argument::Numeric(NumericConstant::Unresolved(v)) => {
            *arg = Argument::Numeric(if let Ok(i) = i64::try_from(*v) {
                NumericConstant::Signed(i)
            } else {
                NumericConstant::Unsigned(*v as u64)
            });
            true
        }
        Argument::RecordInit(fields) | Argument::BranchInit(_, fields) => {
            fields.iter_mut().fold(false, |acc, a| acc | resolve_arg(a))
        }
        Argument::IntrinsicFunctor(_, args) => {
            args.iter_mut().fold(false, |acc, a| acc | resolve_arg(a))
        }
        Argument::UserDefinedFunctor(_, args, _, _) => {
            args.iter_mut().fold(false, |acc, a| acc | resolve_arg(a))
        }
        Argument::Aggregate(agg) => resolve_arg(&mut agg.target),
        Argument::Typecast(_, inner) => resolve_arg(inner),
        _ => false,
    }
}

/// 3. User-defined functor resolution: attach each `UserDefinedFunctor`
/// call's declared parameter/return [`Kind`]s from `program.functors`, the
/// `.functor` declaration table. A call naming an undeclared functor is left
/// with its placeholder types; `crate::analysis::functors::check` is the
/// pass that rejects it as a semantic error (arity mismatches and missing
/// declarations are not this pass's job, since a pure AST rewrite never
/// fails, per the combinator contract `Program -> (Program, changed)`).
pub fn resolve_user_defined_functors(program: &mut Program) -> bool {
    if program.functors.is_empty() {
        return false;
    }
    let types = crate::analysis::kinds::type_table(program);
    let table: HashMap<String, (Vec<Kind>, Kind)> = program
        .functors
        .iter()
        .map(|f| {
            let arg_types = f
                .arg_types
                .iter()
                .map(|t| crate::analysis::kinds::resolve_kind(&t.to_string(), &types))
                .collect();
            let return_type = crate::analysis::kinds::resolve_kind(&f.return_type.to_string(), &types);
            (f.name.clone(), (arg_types, return_type))
        })
        .collect();

    let mut changed = false;
    for clause in &mut program.clauses {
        changed |= resolve_functor_atom(&mut clause.head, &table);
        for lit in &mut clause.body {
            changed |= resolve_functor_literal(lit, &table);
        }
    }
    changed
}

fn resolve_functor_atom(atom: &mut Atom, table: &HashMap<String, (Vec<Kind>, Kind)>) -> bool {
    atom.args.iter_mut().fold(false, |acc, a| acc | resolve_functor_arg(a, table))
}

fn resolve_functor_literal(lit: &mut BodyLiteral, table: &HashMap<String, (Vec<Kind>, Kind)>) -> bool {
    match lit {
        BodyLiteral::Positive(a) | BodyLiteral::Negated(a) => resolve_functor_atom(a, table),
        BodyLiteral::Comparison(_, l, r) => resolve_functor_arg(l, table) | resolve_functor_arg(r, table),
        BodyLiteral::Disjunction(lits) => {
            lits.iter_mut().fold(false, |acc, l| acc | resolve_functor_literal(l, table))
        }
        BodyLiteral::BooleanConstant(_) => false,
    }
}

fn resolve_functor_arg(arg: &mut Argument, table: &HashMap<String, (Vec<Kind>, Kind)>) -> bool {
    let mut changed = false;
    if let Argument::UserDefinedFunctor(name, args, arg_types, return_type) = arg {
        if let Some((decl_args, decl_return)) = table.get(name) {
            if arg_types != decl_args || return_type != decl_return {
                *arg_types = decl_args.clone();
                *return_type = *decl_return;
                changed = true;
            }
        }
        return args.iter_mut().fold(changed, |acc, a| acc | resolve_functor_arg(a, table));
    }
    match arg {
        Argument::RecordInit(fields) | Argument::BranchInit(_, fields) => {
            fields.iter_mut().fold(changed, |acc, a| acc | resolve_functor_arg(a, table))
        }
        Argument::IntrinsicFunctor(_, args) => {
            args.iter_mut().fold(changed, |acc, a| acc | resolve_functor_arg(a, table))
        }
        Argument::Aggregate(agg) => changed | resolve_functor_arg(&mut agg.target, table),
        Argument::Typecast(_, inner) => changed | resolve_functor_arg(inner, table),
        _ => changed,
    }
}

/// 4. Unique aggregation variables: any variable used both inside an
/// aggregator's target/body and outside it is renamed inside the aggregator
/// to avoid accidental capture.
pub fn unique_aggregation_variables(program: &mut Program) -> bool {
    let mut changed = false;
    for clause in &mut program.clauses {
        let mut counter = 0usize;
        let outer_vars = clause.positive_body_variables();
        for lit in &mut clause.body {
            changed |= rename_aggregate_vars(lit, &outer_vars, &mut counter);
        }
    }
    changed
}

fn rename_aggregate_vars(lit: &mut BodyLiteral, outer: &HashSet<String>, counter: &mut usize) -> bool {
    match lit {
        BodyLiteral::Positive(a) | BodyLiteral::Negated(a) => {
            a.args.iter_mut().fold(false, |acc, arg| acc | rename_aggregate_vars_arg(arg, outer, counter))
        }
        BodyLiteral::Comparison(_, l, r) => {
            rename_aggregate_vars_arg(l, outer, counter) | rename_aggregate_vars_arg(r, outer, counter)
        }
        BodyLiteral::Disjunction(lits) => lits.iter_mut().fold(false, |acc, l| acc | rename_aggregate_vars(l, outer, counter)),
        BodyLiteral::BooleanConstant(_) => false,
    }
}

fn rename_aggregate_vars_arg(arg: &mut Argument, outer: &HashSet<String>, counter: &mut usize) -> bool {
    if let Argument::Aggregate(agg) = arg {
        let shared: HashSet<String> = agg_inner_variables(agg).intersection(outer).cloned().collect();
        if !shared.is_empty() {
            *counter += 1;
            let marker = format!("__agg{}_", *counter);
            let mut mapping = HashMap::new();
            for name in &shared {
                mapping.insert(name.clone(), format!("{marker}{name}"));
            }
            rename_in_argument(&mut agg.target, &mapping);
            for b in &mut agg.body {
                rename_in_literal(b, &mapping);
            }
            return true;
        }
    }
    match arg {
        Argument::RecordInit(fields) | Argument::BranchInit(_, fields) => {
            fields.iter_mut().fold(false, |acc, a| acc | rename_aggregate_vars_arg(a, outer, counter))
        }
        Argument::IntrinsicFunctor(_, args) => {
            args.iter_mut().fold(false, |acc, a| acc | rename_aggregate_vars_arg(a, outer, counter))
        }
        Argument::UserDefinedFunctor(_, args, _, _) => {
            args.iter_mut().fold(false, |acc, a| acc | rename_aggregate_vars_arg(a, outer, counter))
        }
        _ => false,
    }
}

fn agg_inner_variables(agg: &Aggregate) -> HashSet<String> {
    let mut out = HashSet::new();
    for lit in &agg.body {
        out.extend(lit.variables());
    }
    out
}

fn rename_in_argument(arg: &mut Argument, mapping: &HashMap<String, String>) {
    match arg {
        Argument::Variable(name) => {
            if let Some(new_name) = mapping.get(name) {
                *name = new_name.clone();
            }
        }
        Argument::RecordInit(fields) | Argument::BranchInit(_, fields) => {
            fields.iter_mut().for_each(|a| rename_in_argument(a, mapping));
        }
        Argument::IntrinsicFunctor(_, args) => {
            args.iter_mut().for_each(|a| rename_in_argument(a, mapping));
        }
        Argument::UserDefinedFunctor(_, args, _, _) => {
            args.iter_mut().for_each(|a| rename_in_argument(a, mapping));
        }
        Argument::Typecast(_, inner) => rename_in_argument(inner, mapping),
        Argument::Aggregate(agg) => {
            rename_in_argument(&mut agg.target, mapping);
            for lit in &mut agg.body {
                rename_in_literal(lit, mapping);
            }
        }
        _ => {}
    }
}

fn rename_in_literal(lit: &mut BodyLiteral, mapping: &HashMap<String, String>) {
    match lit {
        BodyLiteral::Positive(a) | BodyLiteral::Negated(a) => {
            a.args.iter_mut().for_each(|arg| rename_in_argument(arg, mapping));
        }
        BodyLiteral::Comparison(_, l, r) => {
            rename_in_argument(l, mapping);
            rename_in_argument(r, mapping);
        }
        BodyLiteral::Disjunction(lits) => lits.iter_mut().for_each(|l| rename_in_literal(l, mapping)),
        BodyLiteral::BooleanConstant(_) => {}
    }
}

/// 5. Materialize aggregation queries: an aggregator whose body is not a
/// single atom with distinct variable arguments is extracted into a fresh
/// auxiliary relation.
pub fn materialize_aggregation_queries(program: &mut Program) -> bool {
    let mut changed = false;
    let mut fresh_clauses = Vec::new();
    let mut counter = program.clauses.len();

    for clause in &mut program.clauses {
        for lit in &mut clause.body {
            changed |= materialize_in_literal(lit, &mut fresh_clauses, &mut counter);
        }
    }
    program.clauses.extend(fresh_clauses);
    changed
}

fn materialize_in_literal(lit: &mut BodyLiteral, fresh: &mut Vec<Clause>, counter: &mut usize) -> bool {
    match lit {
        BodyLiteral::Positive(a) | BodyLiteral::Negated(a) => {
            a.args.iter_mut().fold(false, |acc, arg| acc | materialize_in_arg(arg, fresh, counter))
        }
        BodyLiteral::Comparison(_, l, r) => {
            materialize_in_arg(l, fresh, counter) | materialize_in_arg(r, fresh, counter)
        }
        BodyLiteral::Disjunction(lits) => lits.iter_mut().fold(false, |acc, l| acc | materialize_in_literal(l, fresh, counter)),
        BodyLiteral::BooleanConstant(_) => false,
    }
}

fn materialize_in_arg(arg: &mut Argument, fresh: &mut Vec<Clause>, counter: &mut usize) -> bool {
    let mut changed = false;
    if let Argument::Aggregate(agg) = arg {
        let is_simple = agg.body.len() == 1
            && matches!(&agg.body[0], BodyLiteral::Positive(atom) if has_distinct_variable_args(atom));
        if !is_simple {
            *counter += 1;
            let aux_name = format!("__agg_aux_{counter}");
            let mut free_vars: Vec<String> = agg.body.iter().flat_map(|l| l.variables()).collect();
            free_vars.sort();
            free_vars.dedup();
            let aux_clause = Clause {
                head: Atom {
                    relation: aux_name.clone(),
                    args: free_vars.iter().cloned().map(Argument::Variable).collect(),
                },
                body: agg.body.clone(),
                plan: None,
                subsumptive: false,
            };
            fresh.push(aux_clause);
            agg.body = vec![BodyLiteral::Positive(Atom {
                relation: aux_name,
                args: free_vars.into_iter().map(Argument::Variable).collect(),
            })];
            changed = true;
        }
    }
    changed
}

fn has_distinct_variable_args(atom: &Atom) -> bool {
    let mut seen = HashSet::new();
    atom.args.iter().all(|a| match a {
        Argument::Variable(name) => seen.insert(name.clone()),
        _ => false,
    })
}

/// 6. Normalize constraints: replace constants and unnamed variables in a
/// body atom's argument positions with a fresh variable plus an equality
/// constraint.
pub fn normalize_constraints(program: &mut Program) -> bool {
    let mut changed = false;
    for clause in &mut program.clauses {
        let mut counter = 0usize;
        let mut new_body = Vec::new();
        for lit in clause.body.drain(..) {
            new_body.push(normalize_literal(lit, &mut counter, &mut changed));
        }
        clause.body = new_body.into_iter().flatten().collect();
    }
    changed
}

fn normalize_literal(lit: BodyLiteral, counter: &mut usize, changed: &mut bool) -> Vec<BodyLiteral> {
    match lit {
        BodyLiteral::Positive(mut atom) | BodyLiteral::Negated(mut atom) => {
            let is_negated = matches!(&lit, BodyLiteral::Negated(_));
            let mut extra = Vec::new();
            for arg in &mut atom.args {
                if let Some(constraint) = normalize_constant_arg(arg, counter) {
                    extra.push(constraint);
                    *changed = true;
                }
            }
            let mut out = vec![if is_negated {
                BodyLiteral::Negated(atom)
            } else {
                BodyLiteral::Positive(atom)
            }];
            out.extend(extra);
            out
        }
        other => vec![other],
    }
}

fn normalize_constant_arg(arg: &mut Argument, counter: &mut usize) -> Option<BodyLiteral> {
    match arg {
        Argument::Numeric(_) | Argument::StringConstant(_) => {
            *counter += 1;
            let fresh = format!("__norm{counter}");
            let replaced = std::mem::replace(arg, Argument::Variable(fresh.clone()));
            Some(BodyLiteral::Comparison(ComparisonOp::Eq, Argument::Variable(fresh), replaced))
        }
        _ => None,
    }
}

/// 7. Remove boolean constraints: drop `true` literals; drop clauses that
/// contain `false`.
pub fn remove_boolean_constraints(program: &mut Program) -> bool {
    let mut changed = false;
    let before = program.clauses.len();
    program.clauses.retain(|c| !c.body.iter().any(|l| matches!(l, BodyLiteral::BooleanConstant(false))));
    changed |= program.clauses.len() != before;

    for clause in &mut program.clauses {
        let before_len = clause.body.len();
        clause.body.retain(|l| !matches!(l, BodyLiteral::BooleanConstant(true)));
        changed |= clause.body.len() != before_len;
    }
    changed
}

/// 8. Replace singleton variables: a variable used exactly once in a
/// clause's body (and not in the head) is rewritten to an unnamed variable,
/// since it carries no join constraint.
pub fn replace_singleton_variables(program: &mut Program) -> bool {
    let mut changed = false;
    for clause in &mut program.clauses {
        let head_vars = clause.head.variables();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for lit in &clause.body {
            for v in lit.variables() {
                *counts.entry(v).or_insert(0) += 1;
            }
        }
        let singletons: HashSet<String> = counts
            .into_iter()
            .filter(|(name, count)| *count == 1 && !head_vars.contains(name))
            .map(|(name, _)| name)
            .collect();
        if singletons.is_empty() {
            continue;
        }
        for lit in &mut clause.body {
            changed |= blank_singletons_literal(lit, &singletons);
        }
    }
    changed
}

fn blank_singletons_literal(lit: &mut BodyLiteral, singletons: &HashSet<String>) -> bool {
    match lit {
        BodyLiteral::Positive(a) => a.args.iter_mut().fold(false, |acc, arg| acc | blank_singletons_arg(arg, singletons)),
        BodyLiteral::Negated(_) | BodyLiteral::Comparison(..) | BodyLiteral::BooleanConstant(_) => false,
        BodyLiteral::Disjunction(lits) => lits.iter_mut().fold(false, |acc, l| acc | blank_singletons_literal(l, singletons)),
    }
}

fn blank_singletons_arg(arg: &mut Argument, singletons: &HashSet<String>) -> bool {
    if let Argument::Variable(name) = arg {
        if singletons.contains(name) {
            *arg = Argument::UnnamedVariable;
            return true;
        }
    }
    false
}

/// 9. Partition body literals along connected components of the
/// variable-co-occurrence graph; components disjoint from the head
/// variables are left in place (extracting them into fresh nullary
/// relations is only a win for genuinely disconnected components with more
/// than one literal, which is the common case this pass targets).
pub fn partition_body_literals(program: &mut Program) -> bool {
    let mut changed = false;
    let mut fresh = Vec::new();
    let mut counter = 0usize;

    for clause in &mut program.clauses {
        let head_vars = clause.head.variables();
        let components = connected_components(&clause.body);
        let disjoint: Vec<&Vec<usize>> = components
            .iter()
            .filter(|c| {
                c.len() > 1
                    && !clause.body[c[0]]
                        .variables()
                        .iter()
                        .any(|v| head_vars.contains(v))
            })
            .collect();
        if disjoint.is_empty() {
            continue;
        }
        let mut extracted_indices: HashSet<usize> = HashSet::new();
        for component in disjoint {
            counter += 1;
            let aux_name = format!("__part_aux_{counter}");
            let body: Vec<BodyLiteral> = component.iter().map(|&i| clause.body[i].clone()).collect();
            fresh.push(Clause {
                head: Atom {
                    relation: aux_name.clone(),
                    args: vec![],
                },
                body,
                plan: None,
                subsumptive: false,
            });
            clause.body.push(BodyLiteral::Positive(Atom {
                relation: aux_name,
                args: vec![],
            }));
            extracted_indices.extend(component.iter().copied());
            changed = true;
        }
        let mut idx = 0;
        clause.body.retain(|_| {
            let keep = !extracted_indices.contains(&idx);
            idx += 1;
            keep
        });
    }
    program.clauses.extend(fresh);
    changed
}

fn connected_components(body: &[BodyLiteral]) -> Vec<Vec<usize>> {
    let var_sets: Vec<HashSet<String>> = body.iter().map(BodyLiteral::variables).collect();
    let n = body.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if !var_sets[i].is_disjoint(&var_sets[j]) {
                let ri = find(&mut parent, i);
                let rj = find(&mut parent, j);
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }
    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }
    groups.into_values().collect()
}

/// 10. Reduce existentials: a positive body atom whose every argument is
/// unnamed contributes no binding to the rest of the clause and is purely an
/// existence check against that relation. Repeating the same check twice in
/// one clause body is redundant, so the second (and later) occurrence is
/// dropped. Arity reduction on the relation itself is deliberately left
/// alone: AST-level passes have no visibility into `.input`/`.output`
/// directives, so there is no safe way from here to tell whether shrinking a
/// relation's declared columns would silently change an output file.
pub fn reduce_existentials(program: &mut Program) -> bool {
    let mut changed = false;
    for clause in &mut program.clauses {
        let mut seen: HashSet<String> = HashSet::new();
        let before = clause.body.len();
        clause.body.retain(|lit| match lit {
            BodyLiteral::Positive(a) if args_all_unnamed(&a.args) => seen.insert(a.relation.clone()),
            _ => true,
        });
        changed |= clause.body.len() != before;
    }
    changed
}

fn args_all_unnamed(args: &[Argument]) -> bool {
    args.iter().all(|a| matches!(a, Argument::UnnamedVariable))
}

/// 11. Redundant-relation removal: delete relations not transitively
/// reachable from any output relation.
pub fn remove_redundant_relations(program: &mut Program) -> bool {
    let reachable = crate::analysis::redundancy::reachable_relations(program);
    let before_relations = program.relations.len();
    let before_clauses = program.clauses.len();
    program.relations.retain(|r| reachable.contains(&r.name.to_string()));
    program.clauses.retain(|c| reachable.contains(&c.head.relation));
    before_relations != program.relations.len() || before_clauses != program.clauses.len()
}

/// 12. Remove empty relations: a relation with no clauses and not read as
/// input is dead; drop positive references to it, drop negations of it
/// (the rest of the body survives unchanged), and delete it.
pub fn remove_empty_relations(program: &mut Program) -> bool {
    let has_clause: HashSet<String> = program.clauses.iter().map(|c| c.head.relation.clone()).collect();
    let declared: HashSet<String> = program.all_relations();
    let empty: HashSet<String> = declared
        .iter()
        .filter(|r| !has_clause.contains(*r))
        .cloned()
        .collect();
    if empty.is_empty() {
        return false;
    }
    let mut changed = false;
    program.clauses.retain(|c| {
        let dead = c.body.iter().any(|l| matches!(l, BodyLiteral::Positive(a) if empty.contains(&a.relation)));
        if dead {
            changed = true;
        }
        !dead
    });
    for clause in &mut program.clauses {
        let before = clause.body.len();
        clause.body.retain(|l| !matches!(l, BodyLiteral::Negated(a) if empty.contains(&a.relation)));
        changed |= clause.body.len() != before;
    }
    let before = program.relations.len();
    program.relations.retain(|r| !empty.contains(&r.name.to_string()));
    changed |= program.relations.len() != before;
    changed
}

/// 13. Remove relation copies: `r(X,Y,...) :- s(X,Y,...)` where that is
/// `r`'s only rule and the head args are distinct variables is an alias;
/// substitute `s` for `r` everywhere and drop `r`. Alias cycles (a chain
/// that loops back on itself) are left untouched to avoid deleting every
/// relation in the cycle.
pub fn remove_relation_copies(program: &mut Program) -> bool {
    let mut aliases: HashMap<String, String> = HashMap::new();
    for relation in program.all_relations() {
        let clauses = program.clauses_for(&relation);
        if clauses.len() != 1 {
            continue;
        }
        let clause = clauses[0];
        if clause.body.len() != 1 {
            continue;
        }
        if let BodyLiteral::Positive(body_atom) = &clause.body[0] {
            if body_atom.relation == relation {
                continue;
            }
            if !has_distinct_variable_args(&clause.head) || !has_distinct_variable_args(body_atom) {
                continue;
            }
            let head_order: Vec<&String> = clause
                .head
                .args
                .iter()
                .map(|a| match a {
                    Argument::Variable(v) => v,
                    _ => unreachable!(),
                })
                .collect();
            let body_order: Vec<&String> = body_atom
                .args
                .iter()
                .map(|a| match a {
                    Argument::Variable(v) => v,
                    _ => unreachable!(),
                })
                .collect();
            if head_order == body_order {
                aliases.insert(relation.clone(), body_atom.relation.clone());
            }
        }
    }
    // Break cycles: drop any alias entry whose target eventually maps back
    // to its own source.
    aliases.retain(|from, to| {
        let mut seen = HashSet::new();
        let mut current = to.clone();
        seen.insert(from.clone());
        while let Some(next) = aliases.get(&current) {
            if !seen.insert(current.clone()) {
                return false;
            }
            current = next.clone();
        }
        true
    });
    if aliases.is_empty() {
        return false;
    }
    fn resolve<'a>(aliases: &'a HashMap<String, String>, mut name: &'a str) -> &'a str {
        while let Some(target) = aliases.get(name) {
            name = target;
        }
        name
    }
    for clause in &mut program.clauses {
        for lit in &mut clause.body {
            if let BodyLiteral::Positive(a) | BodyLiteral::Negated(a) = lit {
                if aliases.contains_key(&a.relation) {
                    a.relation = resolve(&aliases, &a.relation).to_string();
                }
            }
        }
    }
    program.clauses.retain(|c| !aliases.contains_key(&c.head.relation));
    program.relations.retain(|r| !aliases.contains_key(&r.name.to_string()));
    true
}

/// 14. Fold anonymous records: `[a,b,...] = [c,d,...]` becomes a conjunction
/// of positionwise equalities; `!=` becomes a disjunction collapsed to one
/// representative positionwise inequality check per entry (evaluated as
/// "any position differs"). Length-0 records collapse to the boolean
/// consistent with the operator.
pub fn fold_anonymous_records(program: &mut Program) -> bool {
    let mut changed = false;
    for clause in &mut program.clauses {
        let mut new_body = Vec::new();
        for lit in clause.body.drain(..) {
            if let BodyLiteral::Comparison(op, Argument::RecordInit(lhs), Argument::RecordInit(rhs)) = &lit {
                if lhs.len() == rhs.len() && matches!(op, ComparisonOp::Eq | ComparisonOp::Ne) {
                    changed = true;
                    if lhs.is_empty() {
                        new_body.push(BodyLiteral::BooleanConstant(matches!(op, ComparisonOp::Eq)));
                    } else if matches!(op, ComparisonOp::Eq) {
                        for (l, r) in lhs.iter().zip(rhs.iter()) {
                            new_body.push(BodyLiteral::Comparison(ComparisonOp::Eq, l.clone(), r.clone()));
                        }
                    } else {
                        let disjuncts = lhs
                            .iter()
                            .zip(rhs.iter())
                            .map(|(l, r)| BodyLiteral::Comparison(ComparisonOp::Ne, l.clone(), r.clone()))
                            .collect();
                        new_body.push(BodyLiteral::Disjunction(disjuncts));
                    }
                    continue;
                }
            }
            new_body.push(lit);
        }
        clause.body = new_body;
    }
    changed
}

/// 15. Remove constant binary constraints: evaluate `const op const` at
/// transform time; drop the clause outright when the constraint is false
/// (it can never hold), drop the constraint itself when it's true.
pub fn remove_constant_binary_constraints(program: &mut Program) -> bool {
    let mut changed = false;
    program.clauses.retain(|clause| {
        for lit in &clause.body {
            if let BodyLiteral::Comparison(op, lhs, rhs) = lit {
                if let Some(value) = eval_constant_comparison(*op, lhs, rhs) {
                    if !value {
                        return false;
                    }
                }
            }
        }
        true
    });
    for clause in &mut program.clauses {
        let before = clause.body.len();
        clause.body.retain(|lit| {
            if let BodyLiteral::Comparison(op, lhs, rhs) = lit {
                if let Some(true) = eval_constant_comparison(*op, lhs, rhs) {
                    return false;
                }
            }
            true
        });
        changed |= clause.body.len() != before;
    }
    changed
}

fn eval_constant_comparison(op: ComparisonOp, lhs: &Argument, rhs: &Argument) -> Option<bool> {
    let l = as_signed_constant(lhs)?;
    let r = as_signed_constant(rhs)?;
    Some(match op {
        ComparisonOp::Eq => l == r,
        ComparisonOp::Ne => l != r,
        ComparisonOp::Lt => l < r,
        ComparisonOp::Le => l <= r,
        ComparisonOp::Gt => l > r,
        ComparisonOp::Ge => l >= r,
        _ => return None,
    })
}

fn as_signed_constant(arg: &Argument) -> Option<i64> {
    match arg {
        Argument::Numeric(NumericConstant::Signed(v)) => Some(*v),
        Argument::Numeric(NumericConstant::Unresolved(v)) => i64::try_from(*v).ok(),
        _ => None,
    }
}

/// 16. Remove redundant sums: `sum k : {...}` with a constant target `k`
/// reduces to `k * count : {...}`, which avoids re-walking the body to fold
/// the same constant repeatedly.
pub fn remove_redundant_sums(program: &mut Program) -> bool {
    let mut changed = false;
    for clause in &mut program.clauses {
        for lit in &mut clause.body {
            changed |= redundant_sum_in_literal(lit);
        }
    }
    changed
}

fn redundant_sum_in_literal(lit: &mut BodyLiteral) -> bool {
    match lit {
        BodyLiteral::Positive(a) | BodyLiteral::Negated(a) => {
            a.args.iter_mut().fold(false, |acc, arg| acc | redundant_sum_in_arg(arg))
        }
        BodyLiteral::Disjunction(lits) => lits.iter_mut().fold(false, |acc, l| acc | redundant_sum_in_literal(l)),
        _ => false,
    }
}

fn redundant_sum_in_arg(arg: &mut Argument) -> bool {
    if let Argument::Aggregate(agg) = arg {
        if matches!(agg.func, AggregateFuncRef::Intrinsic(crate::ast::AggregateFunc::Sum))
            && matches!(agg.target.as_ref(), Argument::Numeric(_))
        {
            let constant = agg.target.clone();
            agg.func = AggregateFuncRef::Intrinsic(crate::ast::AggregateFunc::Count);
            agg.target = Box::new(Argument::IntrinsicFunctor(
                crate::ast::ArithOp::Mul,
                vec![*constant, Argument::UnnamedVariable],
            ));
            return true;
        }
    }
    false
}

/// 17. Insert lattice operations (only if any lattice is declared): a head
/// argument in a lattice-typed attribute position (the attribute's declared
/// type name matches a `.lattice` declaration) that is left as an unnamed
/// "don't care" gets the lattice's declared bottom element instead, mirroring
/// how a lattice-typed column defaults when a rule never computes one
/// explicitly. Gating on the attribute's declared type rather than on an
/// `Argument::Typecast` node matters because `remove_typecasts` (pass 1)
/// already strips every typecast earlier in the same fixpoint, so a typecast
/// check here would never see one.
pub fn insert_lattice_operations(program: &mut Program) -> bool {
    if program.lattices.is_empty() {
        return false;
    }
    let bottoms: HashMap<String, Argument> = program
        .lattices
        .iter()
        .filter_map(|l| {
            l.operators
                .iter()
                .find(|(op, _)| *op == LatticeOp::Bottom)
                .map(|(_, arg)| (l.name.to_string(), arg.clone()))
        })
        .collect();
    if bottoms.is_empty() {
        return false;
    }
    let lattice_positions: HashMap<String, Vec<(usize, String)>> = program
        .relations
        .iter()
        .filter_map(|r| {
            let positions: Vec<(usize, String)> = r
                .attributes
                .iter()
                .enumerate()
                .filter(|(_, a)| bottoms.contains_key(&a.type_name.to_string()))
                .map(|(i, a)| (i, a.type_name.to_string()))
                .collect();
            (!positions.is_empty()).then(|| (r.name.to_string(), positions))
        })
        .collect();
    if lattice_positions.is_empty() {
        return false;
    }
    let mut changed = false;
    for clause in &mut program.clauses {
        if let Some(positions) = lattice_positions.get(&clause.head.relation) {
            for (pos, type_name) in positions {
                if let Some(arg) = clause.head.args.get_mut(*pos) {
                    if matches!(arg, Argument::UnnamedVariable) {
                        *arg = bottoms[type_name].clone();
                        changed = true;
                    }
                }
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::ClauseBuilder;

    #[test]
    fn remove_boolean_constraints_drops_false_clause() {
        let mut program = Program::default();
        program.clauses.push(Clause {
            head: Atom { relation: "p".into(), args: vec![] },
            body: vec![BodyLiteral::BooleanConstant(false)],
            plan: None,
            subsumptive: false,
        });
        let changed = remove_boolean_constraints(&mut program);
        assert!(changed);
        assert!(program.clauses.is_empty());
    }

    #[test]
    fn replace_singleton_variables_blanks_unused_join_var() {
        let mut program = Program::default();
        program.clauses.push(
            ClauseBuilder::new("p")
                .head_vars(["x"])
                .body_atom("e", ["x", "y"])
                .build(),
        );
        replace_singleton_variables(&mut program);
        let atom = match &program.clauses[0].body[0] {
            BodyLiteral::Positive(a) => a,
            _ => panic!(),
        };
        assert!(matches!(atom.args[1], Argument::UnnamedVariable));
        assert!(matches!(atom.args[0], Argument::Variable(_)));
    }

    #[test]
    fn remove_constant_binary_constraints_drops_always_false_clause() {
        let mut program = Program::default();
        program.clauses.push(Clause {
            head: Atom { relation: "p".into(), args: vec![] },
            body: vec![BodyLiteral::Comparison(
                ComparisonOp::Eq,
                Argument::Numeric(NumericConstant::Signed(1)),
                Argument::Numeric(NumericConstant::Signed(2)),
            )],
            plan: None,
            subsumptive: false,
        });
        assert!(remove_constant_binary_constraints(&mut program));
        assert!(program.clauses.is_empty());
    }

    #[test]
    fn remove_relation_copies_aliases_pure_passthrough_rule() {
        let mut program = Program::default();
        program.clauses.push(
            ClauseBuilder::new("r").head_vars(["x", "y"]).body_atom("s", ["x", "y"]).build(),
        );
        program.clauses.push(
            ClauseBuilder::new("out").head_vars(["x"]).body_atom("r", ["x", "x"]).build(),
        );
        assert!(remove_relation_copies(&mut program));
        assert!(program.clauses_for("r").is_empty());
        let out_clause = &program.clauses_for("out")[0];
        assert_eq!(out_clause.body_relations().iter().next().unwrap(), "s");
    }

    #[test]
    fn fold_anonymous_records_splits_equal_length_equality() {
        let mut program = Program::default();
        program.clauses.push(Clause {
            head: Atom { relation: "q".into(), args: vec![Argument::Variable("x".into())] },
            body: vec![BodyLiteral::Comparison(
                ComparisonOp::Eq,
                Argument::RecordInit(vec![Argument::Variable("x".into())]),
                Argument::RecordInit(vec![Argument::Numeric(NumericConstant::Signed(1))]),
            )],
            plan: None,
            subsumptive: false,
        });
        assert!(fold_anonymous_records(&mut program));
        assert_eq!(program.clauses[0].body.len(), 1);
        assert!(matches!(program.clauses[0].body[0], BodyLiteral::Comparison(ComparisonOp::Eq, ..)));
    }
}
