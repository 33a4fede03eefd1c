//! # AST analyses (§4.3)
//!
//! Pure read-only passes over a [`crate::ast::Program`] that the translator
//! and the transform pipeline depend on: precedence/SCC/stratification, I/O
//! classification, redundant-relation reachability, grounding, and SIPS
//! (sideways information passing).

pub mod functors;
pub mod grounding;
pub mod io_types;
pub mod kinds;
pub mod precedence;
pub mod redundancy;
pub mod scc;
pub mod schedule;
pub mod sips;

pub use precedence::{DependencyKind, PrecedenceGraph};
pub use scc::{SccGraph, SccId};
pub use schedule::RelationSchedule;
