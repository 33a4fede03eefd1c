//! Interpreter-generator step (§4.5): turns a translated [`ram::Program`]
//! into the handles the engine needs at runtime — live [`Relation`]s (one
//! per declared relation plus its `@delta_`/`@new_` seminaive companions)
//! and a per-relation [`Kind`] vector for the I/O layer.
//!
//! There is no dataflow graph to compile here, so "compiling" just means
//! resolving names once up front instead of re-deriving them on every
//! statement execution.

use crate::analysis::kinds::resolve_kind;
use crate::ast;
use crate::ram::{self, translate};
use crate::relation::Relation;
use crate::value::Kind;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolved program handles the engine executes against.
pub struct CompiledProgram {
    pub main: ram::Statement,
    pub subroutines: HashMap<String, ram::Statement>,
    pub relations: HashMap<String, Arc<Relation>>,
    pub kinds: HashMap<String, Vec<Kind>>,
}

/// Builds a [`CompiledProgram`] from a RAM program and the AST it was
/// translated from (needed for attribute type names, which the RAM layer
/// itself does not carry).
pub fn build(ram_program: &ram::Program, ast_program: &ast::Program) -> CompiledProgram {
    let types: HashMap<String, ast::Type> =
        ast_program.types.iter().map(|(name, ty)| (name.to_string(), ty.clone())).collect();

    let mut relations = HashMap::new();
    let mut kinds = HashMap::new();

    for decl in ram_program.relations.values() {
        relations.insert(decl.name.clone(), Arc::new(Relation::new(decl.arity, decl.eqrel)));
        // Seminaive companions share arity and never carry the `eqrel`
        // closure semantics of the base relation: `merge_extend` only ever
        // targets the base relation itself (§4.4).
        relations.insert(translate::delta_name(&decl.name), Arc::new(Relation::new(decl.arity, false)));
        relations.insert(translate::new_name(&decl.name), Arc::new(Relation::new(decl.arity, false)));

        let attr_kinds = ast_program
            .relations
            .iter()
            .find(|r| r.name.to_string() == decl.name)
            .map(|r| r.attributes.iter().map(|a| resolve_kind(&a.type_name.to_string(), &types)).collect())
            .unwrap_or_else(|| vec![Kind::Signed; decl.arity]);
        kinds.insert(decl.name.clone(), attr_kinds);
    }

    CompiledProgram {
        main: ram_program.main.clone(),
        subroutines: ram_program.subroutines.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        relations,
        kinds,
    }
}

