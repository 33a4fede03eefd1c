//! Crate-wide error types.
//!
//! One `thiserror`-derived enum per phase, composed into a top-level
//! [`Error`] via `#[from]`. Some error kinds are fatal; others are recovered
//! locally with a logged warning — see each call site.

use thiserror::Error;

/// Errors raised while validating or transforming an AST (spec §7 kind (b)).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("relation `{0}` has no declared type for argument {1}")]
    UndeclaredArgument(String, usize),

    #[error("user-defined functor `{0}` has no declaration")]
    MissingFunctorDeclaration(String),

    #[error("user-defined functor `{0}` called with {got} arguments, declared with {expected}")]
    FunctorArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("variable `{0}` in clause head for `{1}` is not grounded by any body atom or equality constraint")]
    UngroundedVariable(String, String),

    #[error("type conflict for `{0}`: expected {1}, found {2}")]
    TypeConflict(String, String, String),

    #[error("clause for `{0}` is unsafe: negated atom `{1}` has a variable outside the positive body")]
    UnsafeNegation(String, String),

    #[error("numeric constant in `{0}` could not be resolved to a concrete type")]
    UnresolvedPolymorphicConstant(String),

    #[error("aggregator body in clause for `{0}` has no well-defined denotation")]
    IllFormedAggregator(String),

    #[error("relation `{0}` negates a relation in its own recursive stratum; the program is not stratifiable")]
    Unstratifiable(String),
}

/// Errors raised while lowering an AST to a RAM program (spec §4.4).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error("operator `{0}` left polymorphic after type resolution")]
    UnresolvedOperator(String),

    #[error("relation `{0}` used with pattern of arity {got}, but its arity is {expected}")]
    ArityMismatch {
        relation: String,
        expected: usize,
        got: usize,
    },

    #[error("no ordering selected for relation `{0}`")]
    MissingOrdering(String),
}

/// I/O errors, used both for fact loading (recoverable, §7 kind (c)) and for
/// output writing (fatal, §7 kind (d)). The caller decides which bucket a
/// given instance falls into based on the `operation` it occurred during.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed row {row} in `{file}`: expected {expected} fields, found {got}")]
    MalformedRow {
        file: String,
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("unknown IO type `{0}`")]
    UnknownIoType(String),

    #[error("directive `{0}` is required for IO type `{1}`")]
    MissingDirective(String, String),

    #[error("sqlite support was not compiled in (enable the `sqlite` feature)")]
    SqliteDisabled,
}

/// Top-level error returned by the CLI driver. A single line derived from
/// `Display` is written to the error stream per §6.
#[derive(Error, Debug)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Signal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
