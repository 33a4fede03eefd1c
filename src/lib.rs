//! # ramlog
//!
//! A Datalog compiler and bytecode interpreter: a typed, stratified
//! Horn-clause language is parsed ([`parser`]), normalized to a fixpoint by
//! a rewrite pipeline ([`transform`]), lowered to a relational-algebra-
//! machine program ([`ram`]) via stratification/precedence analyses
//! ([`analysis`]), and evaluated to completion by a seminaive tree-walking
//! interpreter ([`interpreter`]) over in-memory indexed relations
//! ([`relation`]).
//!
//! ## Pipeline
//! ```text
//! source text
//!     -> parser::parse            Program + directive map
//!     -> transform::run            fixpoint-normalized Program
//!     -> ram::translate::translate  ram::Program (one subroutine per stratum)
//!     -> interpreter::run           fixpoint evaluation, I/O side effects
//! ```

pub mod analysis;
pub mod ast;
pub mod config;
pub mod error;
pub mod functor;
pub mod interpreter;
pub mod io;
pub mod parser;
pub mod ram;
pub mod record_table;
pub mod relation;
pub mod symbol_table;
pub mod transform;
pub mod value;

pub use config::Config;
pub use error::{Error, Result};
