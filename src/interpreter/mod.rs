//! Interpreter (§4.5/§4.6): compiles a [`crate::ram::Program`] into live
//! relation handles ([`generator`]) and walks it to a fixpoint
//! ([`engine`]).

pub mod engine;
pub mod generator;

use crate::ast;
use crate::config::Config;
use crate::error::Error;
use crate::functor::FunctorRegistry;
use crate::ram;
use crate::record_table::RecordTable;
use crate::symbol_table::SymbolTable;
use engine::ExecutionContext;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::AtomicI64;

/// Runs a translated program to completion: loads the configured functor
/// libraries, builds the compiled relation set, then executes `main`.
/// `symbols`/`records` are threaded in rather than created here so a caller
/// can inspect them afterward (e.g. a REPL resolving output symbols).
pub fn run(
    ram_program: &ram::Program,
    ast_program: &ast::Program,
    config: &Config,
    symbols: &SymbolTable,
    records: &RecordTable,
) -> Result<(), Error> {
    let functors = FunctorRegistry::load(&config.library_dirs, &config.libraries)
        .map_err(|e| Error::Config(e.to_string()))?;
    let compiled = generator::build(ram_program, ast_program);
    let regex_cache: RwLock<HashMap<String, Regex>> = RwLock::new(HashMap::new());
    let auto_increment = AtomicI64::new(0);

    let mut ctx = ExecutionContext::new(
        &compiled.relations,
        symbols,
        records,
        &functors,
        &regex_cache,
        &auto_increment,
        config.io.fact_dir.clone(),
        config.io.output_dir.clone(),
        config.effective_jobs(),
    );
    if let Some(path) = &config.profile.path {
        ctx = ctx.with_profile(path).map_err(|e| Error::Config(format!("failed to open profile output `{}`: {e}", path.display())))?;
    }
    ctx.run(&compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::ram::translate;
    use std::collections::HashMap;

    /// Smoke-tests the whole pipeline on a two-rule, non-recursive program:
    /// facts for `a`, a copy rule into `b`.
    #[test]
    fn runs_a_trivial_fact_copy_program() {
        let source = ".decl a(x:number)\n.decl b(x:number)\na(1).\na(2).\nb(x) :- a(x).\n";
        let parsed = parser::parse(source).expect("parses");
        let mut ast_program = parsed.program.clone();
        crate::transform::run(&mut ast_program);
        let directives: HashMap<String, Vec<HashMap<String, String>>> = HashMap::new();
        let ram_program = translate::translate(&ast_program, &directives).expect("translates");

        let config = Config::default();
        let symbols = SymbolTable::new();
        let records = RecordTable::new();
        let result = run(&ram_program, &ast_program, &config, &symbols, &records);
        assert!(result.is_ok());
    }
}
