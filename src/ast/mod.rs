//! # AST Model (§3.4)
//!
//! An immutable-by-cloning tree of rules, atoms, literals, arguments, types
//! and aggregators. Nodes are created by the parser, mutated only by
//! [`crate::transform`] passes (each returns a changed-flag), then frozen
//! for translation by [`crate::ram::translate`].

use crate::value::Kind;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// An interned dotted name (`foo.bar.baz`). Two equal names are expected to
/// share an index once run through a qualified-name interner; the AST layer
/// itself just stores segments and compares lexicographically, since the
/// interning concern belongs to the symbol table, not the tree shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    segments: Vec<String>,
}

impl QualifiedName {
    pub fn new(segments: Vec<String>) -> Self {
        QualifiedName { segments }
    }

    pub fn single(name: impl Into<String>) -> Self {
        QualifiedName {
            segments: vec![name.into()],
        }
    }

    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        QualifiedName { segments }
    }

    pub fn prepend(&self, segment: impl Into<String>) -> Self {
        let mut segments = vec![segment.into()];
        segments.extend(self.segments.clone());
        QualifiedName { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// A type as declared in a `.type` / relation attribute position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Number,
    Unsigned,
    Float,
    Symbol,
    Record(Vec<(String, QualifiedName)>),
    Sum(Vec<(String, Vec<QualifiedName>)>),
    SubsetOf(QualifiedName),
    AliasOf(QualifiedName),
}

/// How a relation's tuples are represented/stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelationRepresentation {
    #[default]
    Default,
    EquivalenceRelation,
    Info,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub type_name: QualifiedName,
    pub lattice: bool,
}

/// A declared relation: head or body, input/output/internal — classified
/// later by the I/O-type analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: QualifiedName,
    pub attributes: Vec<Attribute>,
    pub representation: RelationRepresentation,
    pub location: SourceLocation,
}

impl Relation {
    pub fn arity(&self) -> usize {
        self.attributes.len()
    }
}

/// How a relation is read/written, derived from its directives (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoType {
    Input,
    Output,
    PrintSize,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Min,
    Max,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BAnd,
    BOr,
    BXor,
    LShift,
    RShift,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    NotMatch,
    Contains,
}

/// A resolved numeric literal tag. Before the polymorphic-resolution pass
/// runs, a bare numeric constant is ambiguous between these; afterward,
/// exactly one applies (§8 "Overload resolution").
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericConstant {
    Unresolved(i128),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

/// A clause/aggregator argument (§3.4).
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Variable(String),
    UnnamedVariable,
    Numeric(NumericConstant),
    StringConstant(String),
    RecordInit(Vec<Argument>),
    BranchInit(String, Vec<Argument>),
    IntrinsicFunctor(ArithOp, Vec<Argument>),
    /// A call to a declared external functor. `arg_types`/`return_type`
    /// start out as placeholders (`Signed`) at parse time and are filled in
    /// from the matching [`FunctorDecl`] by
    /// `crate::transform::passes::resolve_user_defined_functors`.
    UserDefinedFunctor(String, Vec<Argument>, Vec<Kind>, Kind),
    Typecast(QualifiedName, Box<Argument>),
    Aggregate(Box<Aggregate>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub func: AggregateFuncRef,
    pub target: Box<Argument>,
    pub body: Vec<BodyLiteral>,
}

/// Either a built-in aggregator or a user-defined one named by a relation
/// that supplies the fold function. The AST keeps both in one slot since
/// they occupy the same syntactic position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateFuncRef {
    Intrinsic(AggregateFunc),
    UserDefined(String),
}

/// An atom: `relation(arg0, arg1, ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub relation: String,
    pub args: Vec<Argument>,
}

impl Atom {
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn variables(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        for arg in &self.args {
            collect_variables(arg, &mut out);
        }
        out
    }

    pub fn has_aggregates(&self) -> bool {
        self.args.iter().any(argument_has_aggregate)
    }
}

fn collect_variables(arg: &Argument, out: &mut HashSet<String>) {
    match arg {
        Argument::Variable(name) => {
            out.insert(name.clone());
        }
        Argument::RecordInit(fields) => fields.iter().for_each(|a| collect_variables(a, out)),
        Argument::BranchInit(_, fields) => fields.iter().for_each(|a| collect_variables(a, out)),
        Argument::IntrinsicFunctor(_, args) => args.iter().for_each(|a| collect_variables(a, out)),
        Argument::UserDefinedFunctor(_, args, _, _) => args.iter().for_each(|a| collect_variables(a, out)),
        Argument::Typecast(_, inner) => collect_variables(inner, out),
        Argument::Aggregate(agg) => {
            // Variables bound purely inside the aggregator body do not
            // escape; the grounding analysis treats the aggregator as a
            // unit, so we deliberately don't recurse into `agg.body` here.
            collect_variables(&agg.target, out);
        }
        Argument::UnnamedVariable | Argument::Numeric(_) | Argument::StringConstant(_) => {}
    }
}

fn argument_has_aggregate(arg: &Argument) -> bool {
    match arg {
        Argument::Aggregate(_) => true,
        Argument::RecordInit(fields) | Argument::BranchInit(_, fields) => {
            fields.iter().any(argument_has_aggregate)
        }
        Argument::IntrinsicFunctor(_, args) => args.iter().any(argument_has_aggregate),
        Argument::UserDefinedFunctor(_, args, _, _) => args.iter().any(argument_has_aggregate),
        Argument::Typecast(_, inner) => argument_has_aggregate(inner),
        _ => false,
    }
}

/// A body literal (§3.4 `Literal`, restricted to what can appear in a body
/// position).
#[derive(Debug, Clone, PartialEq)]
pub enum BodyLiteral {
    Positive(Atom),
    Negated(Atom),
    Comparison(ComparisonOp, Argument, Argument),
    BooleanConstant(bool),
    Disjunction(Vec<BodyLiteral>),
}

impl BodyLiteral {
    pub fn variables(&self) -> HashSet<String> {
        match self {
            BodyLiteral::Positive(atom) | BodyLiteral::Negated(atom) => atom.variables(),
            BodyLiteral::Comparison(_, lhs, rhs) => {
                let mut out = HashSet::new();
                collect_variables(lhs, &mut out);
                collect_variables(rhs, &mut out);
                out
            }
            BodyLiteral::BooleanConstant(_) => HashSet::new(),
            BodyLiteral::Disjunction(lits) => {
                let mut out = HashSet::new();
                for lit in lits {
                    out.extend(lit.variables());
                }
                out
            }
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, BodyLiteral::Negated(_))
    }

    pub fn relation_name(&self) -> Option<&str> {
        match self {
            BodyLiteral::Positive(atom) | BodyLiteral::Negated(atom) => Some(&atom.relation),
            _ => None,
        }
    }
}

/// `head :- body.` A clause with an empty body is a fact.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub head: Atom,
    pub body: Vec<BodyLiteral>,
    pub plan: Option<Vec<usize>>,
    pub subsumptive: bool,
}

impl Clause {
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    /// All variables grounded by a positive body atom (does not follow
    /// equality constraints; see `crate::analysis::grounding` for the full
    /// transitive computation used by the safety checker).
    pub fn positive_body_variables(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        for lit in &self.body {
            if let BodyLiteral::Positive(atom) = lit {
                out.extend(atom.variables());
            }
        }
        out
    }

    /// Range restriction: every head variable must be grounded by some
    /// positive body atom. This is a conservative approximation of full
    /// grounding (constants, record patterns, and equality-propagated
    /// grounding are handled by `crate::analysis::grounding`); it is
    /// sufficient for rejecting the obviously unsafe case.
    pub fn is_safe(&self) -> bool {
        let grounded = self.positive_body_variables();
        self.head.variables().iter().all(|v| grounded.contains(v))
    }

    pub fn is_recursive(&self, head_relation: &str) -> bool {
        self.body.iter().any(|lit| lit.relation_name() == Some(head_relation))
    }

    pub fn body_relations(&self) -> BTreeSet<String> {
        self.body
            .iter()
            .filter_map(|lit| lit.relation_name().map(str::to_owned))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatticeOp {
    Bottom,
    Top,
    Lub,
    Glb,
    Leq,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    pub name: QualifiedName,
    pub operators: Vec<(LatticeOp, Argument)>,
}

/// A `.functor name(T1, T2): Tret` declaration (§6 "User-defined functor
/// ABI"). Argument/return type names are resolved to [`Kind`]s by
/// `crate::transform::passes::resolve_user_defined_functors`, the same way
/// relation attribute types are resolved in `crate::analysis::kinds`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctorDecl {
    pub name: String,
    pub arg_types: Vec<QualifiedName>,
    pub return_type: QualifiedName,
}

/// The full program: types, relations, clauses, functors and (optionally)
/// lattices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub types: Vec<(QualifiedName, Type)>,
    pub relations: Vec<Relation>,
    pub clauses: Vec<Clause>,
    pub lattices: Vec<Lattice>,
    pub functors: Vec<FunctorDecl>,
}

impl Program {
    pub fn all_relations(&self) -> BTreeSet<String> {
        self.relations.iter().map(|r| r.name.to_string()).collect()
    }

    /// "Extensional" relations: those with no rules deriving them (facts and
    /// declared-but-unpopulated input relations are both EDB from the
    /// evaluator's perspective).
    pub fn edbs(&self) -> BTreeSet<String> {
        let idbs = self.idbs();
        self.all_relations().into_iter().filter(|r| !idbs.contains(r)).collect()
    }

    /// "Intensional" relations: those with at least one non-fact clause.
    pub fn idbs(&self) -> BTreeSet<String> {
        self.clauses
            .iter()
            .filter(|c| !c.is_fact())
            .map(|c| c.head.relation.clone())
            .collect()
    }

    pub fn clauses_for(&self, relation: &str) -> Vec<&Clause> {
        self.clauses.iter().filter(|c| c.head.relation == relation).collect()
    }

    pub fn recursive_rules(&self) -> Vec<&Clause> {
        self.clauses.iter().filter(|c| c.is_recursive(&c.head.relation)).collect()
    }

    pub fn non_recursive_rules(&self) -> Vec<&Clause> {
        self.clauses.iter().filter(|c| !c.is_recursive(&c.head.relation)).collect()
    }

    pub fn is_safe(&self) -> bool {
        self.clauses.iter().all(Clause::is_safe)
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name.to_string() == name)
    }

    pub fn functor(&self, name: &str) -> Option<&FunctorDecl> {
        self.functors.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Argument {
        Argument::Variable(name.to_string())
    }

    fn atom(relation: &str, args: Vec<Argument>) -> Atom {
        Atom {
            relation: relation.to_string(),
            args,
        }
    }

    #[test]
    fn atom_variables_collects_nested_record_fields() {
        let a = atom("r", vec![Argument::RecordInit(vec![var("x"), var("y")]), var("z")]);
        let vars = a.variables();
        assert!(vars.contains("x") && vars.contains("y") && vars.contains("z"));
    }

    #[test]
    fn clause_safety_rejects_ungrounded_head_variable() {
        let clause = Clause {
            head: atom("p", vec![var("x"), var("y")]),
            body: vec![BodyLiteral::Positive(atom("e", vec![var("x")]))],
            plan: None,
            subsumptive: false,
        };
        assert!(!clause.is_safe());
    }

    #[test]
    fn clause_safety_accepts_fully_grounded_head() {
        let clause = Clause {
            head: atom("p", vec![var("x"), var("y")]),
            body: vec![BodyLiteral::Positive(atom("e", vec![var("x"), var("y")]))],
            plan: None,
            subsumptive: false,
        };
        assert!(clause.is_safe());
    }

    #[test]
    fn recursive_clause_detected_by_self_reference() {
        let clause = Clause {
            head: atom("p", vec![var("x"), var("z")]),
            body: vec![
                BodyLiteral::Positive(atom("p", vec![var("x"), var("y")])),
                BodyLiteral::Positive(atom("e", vec![var("y"), var("z")])),
            ],
            plan: None,
            subsumptive: false,
        };
        assert!(clause.is_recursive("p"));
    }

    #[test]
    fn program_splits_edbs_and_idbs() {
        let mut program = Program::default();
        program.clauses.push(Clause {
            head: atom("p", vec![var("x")]),
            body: vec![BodyLiteral::Positive(atom("e", vec![var("x")]))],
            plan: None,
            subsumptive: false,
        });
        program.relations.push(Relation {
            name: QualifiedName::single("p"),
            attributes: vec![],
            representation: RelationRepresentation::Default,
            location: SourceLocation::default(),
        });
        program.relations.push(Relation {
            name: QualifiedName::single("e"),
            attributes: vec![],
            representation: RelationRepresentation::Default,
            location: SourceLocation::default(),
        });
        assert!(program.idbs().contains("p"));
        assert!(program.edbs().contains("e"));
        assert!(!program.edbs().contains("p"));
    }

    #[test]
    fn qualified_name_append_and_display() {
        let q = QualifiedName::single("a").append("b").append("c");
        assert_eq!(q.to_string(), "a.b.c");
    }
}
