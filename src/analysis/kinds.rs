//! Attribute-to-representation type resolution (§3.3) and per-clause
//! variable [`Kind`] inference, shared by the interpreter generator
//! ([`crate::interpreter::generator`]) and the AST→RAM translator
//! ([`crate::ram::translate`]) so a declared float/unsigned/symbol attribute
//! keeps its representation through both paths instead of silently defaulting
//! to signed.

use crate::ast::{self, Program};
use crate::value::Kind;
use std::collections::{HashMap, HashSet};

pub fn type_table(program: &Program) -> HashMap<String, ast::Type> {
    program.types.iter().map(|(name, ty)| (name.to_string(), ty.clone())).collect()
}

/// Walks a possibly-aliased type name down to its representation [`Kind`].
/// Built-in names resolve directly; `AliasOf`/`SubsetOf` chains follow their
/// parent until one does; `Record`/`Sum` both resolve to [`Kind::Record`],
/// since both are ultimately stored as a record-table index. A cycle in
/// user-declared types (which semantic analysis is expected to reject before
/// translation) falls back to [`Kind::Signed`] rather than looping forever.
pub fn resolve_kind(type_name: &str, types: &HashMap<String, ast::Type>) -> Kind {
    resolve_kind_visited(type_name, types, &mut HashSet::new())
}

fn resolve_kind_visited(type_name: &str, types: &HashMap<String, ast::Type>, visited: &mut HashSet<String>) -> Kind {
    match type_name {
        "number" => return Kind::Signed,
        "unsigned" => return Kind::Unsigned,
        "float" => return Kind::Float,
        "symbol" => return Kind::Symbol,
        _ => {}
    }
    if !visited.insert(type_name.to_string()) {
        return Kind::Signed;
    }
    match types.get(type_name) {
        Some(ast::Type::Number) => Kind::Signed,
        Some(ast::Type::Unsigned) => Kind::Unsigned,
        Some(ast::Type::Float) => Kind::Float,
        Some(ast::Type::Symbol) => Kind::Symbol,
        Some(ast::Type::Record(_)) | Some(ast::Type::Sum(_)) => Kind::Record,
        Some(ast::Type::AliasOf(parent)) | Some(ast::Type::SubsetOf(parent)) => {
            resolve_kind_visited(&parent.to_string(), types, visited)
        }
        None => Kind::Signed,
    }
}

/// Per-relation declared attribute kinds, keyed by relation name.
pub fn relation_kinds(program: &Program) -> HashMap<String, Vec<Kind>> {
    let types = type_table(program);
    program
        .relations
        .iter()
        .map(|r| {
            let kinds = r.attributes.iter().map(|a| resolve_kind(&a.type_name.to_string(), &types)).collect();
            (r.name.to_string(), kinds)
        })
        .collect()
}

/// Binds each variable appearing in `atom`'s argument positions to that
/// relation's declared attribute [`Kind`], merging into `out`. The first
/// atom to mention a variable wins, consistent with how `normalize_constraints`
/// and grounding both treat the first positive-body binding as authoritative.
pub fn atom_variable_kinds(atom: &ast::Atom, relation_kinds: &HashMap<String, Vec<Kind>>, out: &mut HashMap<String, Kind>) {
    if let Some(kinds) = relation_kinds.get(&atom.relation) {
        for (arg, &kind) in atom.args.iter().zip(kinds) {
            if let ast::Argument::Variable(name) = arg {
                out.entry(name.clone()).or_insert(kind);
            }
        }
    }
}

/// Variable kinds for every positive body atom across a whole clause.
pub fn clause_variable_kinds(clause: &ast::Clause, relation_kinds: &HashMap<String, Vec<Kind>>) -> HashMap<String, Kind> {
    let mut out = HashMap::new();
    for lit in &clause.body {
        if let ast::BodyLiteral::Positive(atom) = lit {
            atom_variable_kinds(atom, relation_kinds, &mut out);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::QualifiedName;

    #[test]
    fn builtin_names_resolve_directly() {
        let types = HashMap::new();
        assert_eq!(resolve_kind("number", &types), Kind::Signed);
        assert_eq!(resolve_kind("symbol", &types), Kind::Symbol);
    }

    #[test]
    fn alias_chain_resolves_to_underlying_builtin() {
        let mut types = HashMap::new();
        types.insert("Id".to_string(), ast::Type::AliasOf(QualifiedName::single("number")));
        assert_eq!(resolve_kind("Id", &types), Kind::Signed);
    }

    #[test]
    fn record_and_sum_resolve_to_record_kind() {
        let mut types = HashMap::new();
        types.insert("Pair".to_string(), ast::Type::Record(vec![]));
        assert_eq!(resolve_kind("Pair", &types), Kind::Record);
    }

    #[test]
    fn cyclic_alias_falls_back_to_signed_instead_of_looping() {
        let mut types = HashMap::new();
        types.insert("A".to_string(), ast::Type::AliasOf(QualifiedName::single("B")));
        types.insert("B".to_string(), ast::Type::AliasOf(QualifiedName::single("A")));
        assert_eq!(resolve_kind("A", &types), Kind::Signed);
    }

    #[test]
    fn clause_variable_kinds_reads_declared_attribute_types() {
        use crate::ast::builders::ClauseBuilder;
        let mut program = Program::default();
        program.relations.push(ast::Relation {
            name: QualifiedName::single("score"),
            attributes: vec![
                ast::Attribute { name: "n".to_string(), type_name: QualifiedName::single("number"), lattice: false },
                ast::Attribute { name: "v".to_string(), type_name: QualifiedName::single("float"), lattice: false },
            ],
            representation: ast::RelationRepresentation::Default,
            location: ast::SourceLocation::default(),
        });
        let clause = ClauseBuilder::new("p").head_vars(["v"]).body_atom("score", ["n", "v"]).build();
        let kinds = clause_variable_kinds(&clause, &relation_kinds(&program));
        assert_eq!(kinds.get("n"), Some(&Kind::Signed));
        assert_eq!(kinds.get("v"), Some(&Kind::Float));
    }
}
