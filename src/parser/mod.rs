//! Hand-written recursive-descent parser for the textual Datalog surface
//! syntax: `.type`/`.decl`/`.input`/`.output`/`.printsize`/`.functor`
//! directives, Prolog-style rules and facts, arithmetic expressions,
//! records, branches, and aggregates.
//!
//! This module exists so the CLI binary has a path from source text to the
//! [`crate::ast::Program`] the rest of the pipeline consumes. It supports
//! the syntax exercised by every end-to-end scenario this crate tests
//! against; a few rarely-used grammar corners (sum types, lattice
//! declarations, nested conjunctions inside a disjunct) are intentionally
//! not supported — see the per-function notes below.

use crate::ast::{
    Aggregate, AggregateFunc, AggregateFuncRef, ArithOp, Argument, Atom, Attribute, BodyLiteral,
    Clause, ComparisonOp, FunctorDecl, NumericConstant, Program, QualifiedName, Relation,
    RelationRepresentation, SourceLocation, Type,
};
use crate::value::Kind;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    Directive(String),
    Dot,
    Comma,
    Semicolon,
    Colon,
    ColonDash,
    Bang,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dollar,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Subset,
    TildeEq,
    BangTilde,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Shl,
    Shr,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    fn new(message: impl Into<String>) -> Self {
        ParseError { message: message.into() }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Per-relation directive statements (`.input`/`.output`/`.printsize`),
/// keyed by relation name, in the shape [`crate::ram::translate::translate`]
/// and [`crate::analysis::io_types::classify`] expect.
pub type Directives = HashMap<String, Vec<HashMap<String, String>>>;

pub struct ParsedProgram {
    pub program: Program,
    pub directives: Directives,
}

pub fn parse(source: &str) -> Result<ParsedProgram, ParseError> {
    let tokens = lex(source)?;
    Parser { tokens, pos: 0 }.parse_program()
}

fn lex(source: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                i += 1;
            }
            i += 2;
            continue;
        }
        if c == '.' {
            if let Some(next) = chars.get(i + 1) {
                if next.is_ascii_alphabetic() {
                    let start = i + 1;
                    let mut j = start;
                    while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                        j += 1;
                    }
                    tokens.push(Token::Directive(chars[start..j].iter().collect()));
                    i = j;
                    continue;
                }
            }
            tokens.push(Token::Dot);
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            if c == '0' && matches!(chars.get(i + 1), Some('x') | Some('X')) {
                i += 2;
                while i < chars.len() && chars[i].is_ascii_hexdigit() {
                    i += 1;
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
                continue;
            }
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(char::is_ascii_digit) {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if matches!(chars.get(i), Some('e') | Some('E')) {
                let mut k = i + 1;
                if matches!(chars.get(k), Some('+') | Some('-')) {
                    k += 1;
                }
                if chars.get(k).is_some_and(char::is_ascii_digit) {
                    i = k;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            if matches!(chars.get(i), Some('u') | Some('U') | Some('f') | Some('F')) {
                i += 1;
            }
            tokens.push(Token::Number(chars[start..i].iter().collect()));
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }
        if c == '"' {
            i += 1;
            let mut s = String::new();
            while i < chars.len() && chars[i] != '"' {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    i += 1;
                    s.push(match chars[i] {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                } else {
                    s.push(chars[i]);
                }
                i += 1;
            }
            if i >= chars.len() {
                return Err(ParseError::new("unterminated string literal"));
            }
            i += 1;
            tokens.push(Token::Str(s));
            continue;
        }

        macro_rules! two_char {
            ($second:expr, $tok:expr, $fallback:expr) => {{
                if chars.get(i + 1) == Some(&$second) {
                    tokens.push($tok);
                    i += 2;
                } else {
                    tokens.push($fallback);
                    i += 1;
                }
                continue;
            }};
        }

        match c {
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            '$' => {
                tokens.push(Token::Dollar);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '&' => {
                tokens.push(Token::Amp);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            ':' => two_char!('-', Token::ColonDash, Token::Colon),
            '=' => two_char!('~', Token::TildeEq, Token::Eq),
            '!' => two_char!('~', Token::BangTilde, Token::Bang),
            '<' => {
                if chars.get(i + 1) == Some(&':') {
                    tokens.push(Token::Subset);
                    i += 2;
                } else if chars.get(i + 1) == Some(&'<') {
                    tokens.push(Token::Shl);
                    i += 2;
                } else if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'>') {
                    tokens.push(Token::Shr);
                    i += 2;
                } else if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            other => return Err(ParseError::new(format!("unexpected character `{other}`"))),
        }
    }
    // `!=` needs a token of lookahead the `two_char!` arm for `!` doesn't
    // give it (that arm only special-cases `!~`); merge it as a cheap
    // post-pass instead of complicating the main scan loop.
    let mut merged = Vec::with_capacity(tokens.len());
    let mut it = tokens.into_iter().peekable();
    while let Some(tok) = it.next() {
        if tok == Token::Bang {
            if let Some(Token::Eq) = it.peek() {
                it.next();
                merged.push(Token::Ne);
                continue;
            }
        }
        merged.push(tok);
    }
    merged.push(Token::Eof);
    Ok(merged)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, tok: &Token) -> bool {
        self.peek() == tok
    }

    fn eat(&mut self, tok: Token) -> bool {
        if self.check(&tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token) -> Result<(), ParseError> {
        if self.eat(tok.clone()) {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, found {:?}", tok, self.peek())))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(self.error(format!("expected identifier, found {other:?}"))),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message.into())
    }

    fn parse_qualified_name(&mut self) -> Result<QualifiedName, ParseError> {
        let mut name = QualifiedName::single(self.expect_ident()?);
        while self.eat(Token::Dot) {
            name = name.append(self.expect_ident()?);
        }
        Ok(name)
    }

    fn parse_program(&mut self) -> Result<ParsedProgram, ParseError> {
        let mut program = Program::default();
        let mut directives: Directives = HashMap::new();

        loop {
            match self.peek().clone() {
                Token::Eof => break,
                Token::Directive(word) => {
                    self.advance();
                    match word.as_str() {
                        "type" => {
                            let (name, ty) = self.parse_type_decl()?;
                            program.types.push((name, ty));
                        }
                        "decl" => {
                            let (relation, sugar) = self.parse_decl()?;
                            if let Some((op, name)) = sugar {
                                directives
                                    .entry(name)
                                    .or_default()
                                    .push(HashMap::from([("operation".to_string(), op)]));
                            }
                            program.relations.push(relation);
                        }
                        "input" | "output" | "printsize" => {
                            let (name, map) = self.parse_io_directive(&word)?;
                            directives.entry(name).or_default().push(map);
                        }
                        "functor" => {
                            program.functors.push(self.parse_functor_decl()?);
                        }
                        "plan" => self.apply_plan_to_last_clause(&mut program)?,
                        other => return Err(self.error(format!("unsupported directive `.{other}`"))),
                    }
                }
                _ => program.clauses.push(self.parse_clause()?),
            }
        }
        Ok(ParsedProgram { program, directives })
    }

    /// `.type Name = number|unsigned|float|symbol`, `.type Name = [f:T,...]`
    /// (record), `.type Name <: Parent` (subset), or `.type Name = Other`
    /// (alias). Sum types are not accepted by this parser: no end-to-end
    /// scenario this crate evaluates needs one, and it is flagged in
    /// DESIGN.md as a known surface-syntax gap rather than silently
    /// misparsed.
    fn parse_type_decl(&mut self) -> Result<(QualifiedName, Type), ParseError> {
        let name = QualifiedName::single(self.expect_ident()?);
        if self.eat(Token::Subset) {
            let parent = self.parse_qualified_name()?;
            self.expect(Token::Dot)?;
            return Ok((name, Type::SubsetOf(parent)));
        }
        self.expect(Token::Eq)?;
        if self.check(&Token::LBracket) {
            let fields = self.parse_record_fields()?;
            self.expect(Token::Dot)?;
            return Ok((name, Type::Record(fields)));
        }
        let rhs = self.expect_ident()?;
        self.expect(Token::Dot)?;
        let ty = match rhs.as_str() {
            "number" => Type::Number,
            "unsigned" => Type::Unsigned,
            "float" => Type::Float,
            "symbol" => Type::Symbol,
            other => Type::AliasOf(QualifiedName::single(other)),
        };
        Ok((name, ty))
    }

    fn parse_record_fields(&mut self) -> Result<Vec<(String, QualifiedName)>, ParseError> {
        self.expect(Token::LBracket)?;
        let mut fields = Vec::new();
        if !self.check(&Token::RBracket) {
            loop {
                let fname = self.expect_ident()?;
                self.expect(Token::Colon)?;
                let fty = self.parse_qualified_name()?;
                fields.push((fname, fty));
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RBracket)?;
        Ok(fields)
    }

    /// `.decl name(attr: Type, ...) [eqrel] [input|output|printsize] ...`.
    /// A trailing `input`/`output`/`printsize` word is sugar for a matching
    /// directive with no extra keys (e.g. defaulting the fact file name to
    /// the relation name); an explicit `.input`/`.output` statement with
    /// directive keys still overrides/augments it.
    fn parse_decl(&mut self) -> Result<(Relation, Option<(String, String)>), ParseError> {
        let name = self.expect_ident()?;
        self.expect(Token::LParen)?;
        let mut attributes = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let aname = self.expect_ident()?;
                self.expect(Token::Colon)?;
                let tname = self.parse_qualified_name()?;
                attributes.push(Attribute { name: aname, type_name: tname, lattice: false });
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;

        let mut representation = RelationRepresentation::Default;
        let mut sugar = None;
        while let Token::Ident(word) = self.peek().clone() {
            match word.as_str() {
                "eqrel" => representation = RelationRepresentation::EquivalenceRelation,
                "input" | "output" | "printsize" => sugar = Some((word.clone(), name.clone())),
                "overridable" | "inline" | "magic" | "no_magic" | "brie" | "btree" => {}
                _ => break,
            }
            self.advance();
        }
        self.expect(Token::Dot)?;
        Ok((
            Relation {
                name: QualifiedName::single(name),
                attributes,
                representation,
                location: SourceLocation::default(),
            },
            sugar,
        ))
    }

    /// `.functor name(T1, T2, ...): Tret` declares an external functor's
    /// parameter and return types, the same way `.decl` declares a
    /// relation's attribute types. Resolved to [`Kind`]s against the
    /// program's declared types by
    /// `crate::transform::passes::resolve_user_defined_functors`.
    fn parse_functor_decl(&mut self) -> Result<FunctorDecl, ParseError> {
        let name = self.expect_ident()?;
        self.expect(Token::LParen)?;
        let mut arg_types = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                arg_types.push(self.parse_qualified_name()?);
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        self.expect(Token::Colon)?;
        let return_type = self.parse_qualified_name()?;
        self.expect(Token::Dot)?;
        Ok(FunctorDecl { name, arg_types, return_type })
    }

    fn parse_io_directive(&mut self, operation: &str) -> Result<(String, HashMap<String, String>), ParseError> {
        let name = self.expect_ident()?;
        let mut map = HashMap::new();
        map.insert("operation".to_string(), operation.to_string());
        if self.eat(Token::LParen) {
            if !self.check(&Token::RParen) {
                loop {
                    let key = self.expect_ident()?;
                    self.expect(Token::Eq)?;
                    let value = self.parse_directive_value()?;
                    map.insert(key, value);
                    if !self.eat(Token::Comma) {
                        break;
                    }
                }
            }
            self.expect(Token::RParen)?;
        }
        self.expect(Token::Dot)?;
        Ok((name, map))
    }

    fn parse_directive_value(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Str(s) => Ok(s),
            Token::Ident(s) => Ok(s),
            Token::Number(s) => Ok(s),
            other => Err(self.error(format!("expected directive value, found {other:?}"))),
        }
    }

    /// `.plan N:(i0,i1,...)` applies to the clause just parsed. The stratum
    /// number `N` is accepted (multiple numbered plans per clause are legal
    /// grammar, one per alternative stratum) but only one evaluation order
    /// is kept per clause, matching what
    /// `crate::analysis::sips::evaluation_order` consumes.
    fn apply_plan_to_last_clause(&mut self, program: &mut Program) -> Result<(), ParseError> {
        self.parse_usize()?;
        self.expect(Token::Colon)?;
        self.expect(Token::LParen)?;
        let mut order = Vec::new();
        if !self.check(&Token::RParen) {
            order.push(self.parse_usize()?);
            while self.eat(Token::Comma) {
                order.push(self.parse_usize()?);
            }
        }
        self.expect(Token::RParen)?;
        self.expect(Token::Dot)?;
        if let Some(clause) = program.clauses.last_mut() {
            clause.plan = Some(order);
        }
        Ok(())
    }

    fn parse_usize(&mut self) -> Result<usize, ParseError> {
        match self.advance() {
            Token::Number(s) => s.parse().map_err(|_| self.error(format!("expected integer, found `{s}`"))),
            other => Err(self.error(format!("expected integer, found {other:?}"))),
        }
    }

    fn parse_clause(&mut self) -> Result<Clause, ParseError> {
        let head = self.parse_atom()?;
        if self.eat(Token::Dot) {
            return Ok(Clause { head, body: vec![], plan: None, subsumptive: false });
        }
        self.expect(Token::ColonDash)?;
        let body = self.parse_body()?;
        self.expect(Token::Dot)?;
        Ok(Clause { head, body, plan: None, subsumptive: false })
    }

    fn parse_atom(&mut self) -> Result<Atom, ParseError> {
        let relation = self.expect_ident()?;
        self.expect(Token::LParen)?;
        let args = self.parse_call_args()?;
        self.expect(Token::RParen)?;
        Ok(Atom { relation, args })
    }

    fn parse_call_args(&mut self) -> Result<Vec<Argument>, ParseError> {
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            args.push(self.parse_expr()?);
            while self.eat(Token::Comma) {
                args.push(self.parse_expr()?);
            }
        }
        Ok(args)
    }

    fn parse_body(&mut self) -> Result<Vec<BodyLiteral>, ParseError> {
        let mut lits = vec![self.parse_body_literal()?];
        while self.eat(Token::Comma) {
            lits.push(self.parse_body_literal()?);
        }
        Ok(lits)
    }

    /// A brace-delimited, `;`-separated group of single literals (no nested
    /// conjunctions per disjunct — `crate::ast::BodyLiteral::Disjunction`
    /// holds a flat `Vec<BodyLiteral>`, so that is what this produces).
    fn parse_disjunction(&mut self) -> Result<BodyLiteral, ParseError> {
        self.expect(Token::LBrace)?;
        let mut lits = vec![self.parse_body_literal()?];
        while self.eat(Token::Semicolon) {
            lits.push(self.parse_body_literal()?);
        }
        self.expect(Token::RBrace)?;
        Ok(BodyLiteral::Disjunction(lits))
    }

    fn parse_body_literal(&mut self) -> Result<BodyLiteral, ParseError> {
        if self.eat(Token::Bang) {
            return Ok(BodyLiteral::Negated(self.parse_atom()?));
        }
        if self.check(&Token::LBrace) {
            return self.parse_disjunction();
        }
        if let Token::Ident(name) = self.peek().clone() {
            if (name == "true" || name == "false") && self.peek_at(1) != Some(&Token::LParen) {
                self.advance();
                return Ok(BodyLiteral::BooleanConstant(name == "true"));
            }
            if self.peek_at(1) == Some(&Token::LParen) {
                self.advance();
                self.expect(Token::LParen)?;
                let args = self.parse_call_args()?;
                self.expect(Token::RParen)?;
                if self.at_comparison_op() {
                    let lhs = Argument::UserDefinedFunctor(name, args, Vec::new(), Kind::Signed);
                    return self.parse_comparison_tail(lhs);
                }
                return Ok(BodyLiteral::Positive(Atom { relation: name, args }));
            }
        }
        let lhs = self.parse_expr()?;
        self.parse_comparison_tail(lhs)
    }

    fn at_comparison_op(&self) -> bool {
        matches!(
            self.peek(),
            Token::Eq | Token::Ne | Token::Lt | Token::Le | Token::Gt | Token::Ge | Token::TildeEq | Token::BangTilde
        ) || matches!(self.peek(), Token::Ident(w) if w == "contains")
    }

    fn parse_comparison_tail(&mut self, lhs: Argument) -> Result<BodyLiteral, ParseError> {
        let op = match self.advance() {
            Token::Eq => ComparisonOp::Eq,
            Token::Ne => ComparisonOp::Ne,
            Token::Lt => ComparisonOp::Lt,
            Token::Le => ComparisonOp::Le,
            Token::Gt => ComparisonOp::Gt,
            Token::Ge => ComparisonOp::Ge,
            Token::TildeEq => ComparisonOp::Match,
            Token::BangTilde => ComparisonOp::NotMatch,
            Token::Ident(w) if w == "contains" => ComparisonOp::Contains,
            other => return Err(self.error(format!("expected comparison operator, found {other:?}"))),
        };
        let rhs = self.parse_expr()?;
        Ok(BodyLiteral::Comparison(op, lhs, rhs))
    }

    fn parse_expr(&mut self) -> Result<Argument, ParseError> {
        self.parse_bor()
    }

    fn parse_bor(&mut self) -> Result<Argument, ParseError> {
        let mut lhs = self.parse_bxor()?;
        while self.eat(Token::Pipe) {
            let rhs = self.parse_bxor()?;
            lhs = Argument::IntrinsicFunctor(ArithOp::BOr, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_bxor(&mut self) -> Result<Argument, ParseError> {
        let mut lhs = self.parse_band()?;
        while self.eat(Token::Caret) {
            let rhs = self.parse_band()?;
            lhs = Argument::IntrinsicFunctor(ArithOp::BXor, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_band(&mut self) -> Result<Argument, ParseError> {
        let mut lhs = self.parse_shift()?;
        while self.eat(Token::Amp) {
            let rhs = self.parse_shift()?;
            lhs = Argument::IntrinsicFunctor(ArithOp::BAnd, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> Result<Argument, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            if self.eat(Token::Shl) {
                let rhs = self.parse_additive()?;
                lhs = Argument::IntrinsicFunctor(ArithOp::LShift, vec![lhs, rhs]);
            } else if self.eat(Token::Shr) {
                let rhs = self.parse_additive()?;
                lhs = Argument::IntrinsicFunctor(ArithOp::RShift, vec![lhs, rhs]);
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Argument, ParseError> {
        let mut lhs = self.parse_mult()?;
        loop {
            if self.eat(Token::Plus) {
                let rhs = self.parse_mult()?;
                lhs = Argument::IntrinsicFunctor(ArithOp::Add, vec![lhs, rhs]);
            } else if self.eat(Token::Minus) {
                let rhs = self.parse_mult()?;
                lhs = Argument::IntrinsicFunctor(ArithOp::Sub, vec![lhs, rhs]);
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_mult(&mut self) -> Result<Argument, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            if self.eat(Token::Star) {
                let rhs = self.parse_unary()?;
                lhs = Argument::IntrinsicFunctor(ArithOp::Mul, vec![lhs, rhs]);
            } else if self.eat(Token::Slash) {
                let rhs = self.parse_unary()?;
                lhs = Argument::IntrinsicFunctor(ArithOp::Div, vec![lhs, rhs]);
            } else if self.eat(Token::Percent) {
                let rhs = self.parse_unary()?;
                lhs = Argument::IntrinsicFunctor(ArithOp::Mod, vec![lhs, rhs]);
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Argument, ParseError> {
        if self.eat(Token::Minus) {
            let inner = self.parse_unary()?;
            return Ok(Argument::IntrinsicFunctor(ArithOp::Neg, vec![inner]));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Argument, ParseError> {
        match self.peek().clone() {
            Token::Number(text) => {
                self.advance();
                Ok(Argument::Numeric(parse_numeric_constant(&text)))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Argument::StringConstant(s))
            }
            Token::LBracket => self.parse_record_init(),
            Token::Dollar => self.parse_branch_init(),
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                self.advance();
                if name == "_" {
                    return Ok(Argument::UnnamedVariable);
                }
                if let Some(func) = aggregate_func(&name) {
                    return self.parse_aggregate(func);
                }
                if name == "as" {
                    return self.parse_typecast();
                }
                if self.eat(Token::LParen) {
                    let args = self.parse_call_args()?;
                    self.expect(Token::RParen)?;
                    return Ok(Argument::UserDefinedFunctor(name, args, Vec::new(), Kind::Signed));
                }
                Ok(Argument::Variable(name))
            }
            other => Err(self.error(format!("expected an expression, found {other:?}"))),
        }
    }

    fn parse_record_init(&mut self) -> Result<Argument, ParseError> {
        self.expect(Token::LBracket)?;
        let mut args = Vec::new();
        if !self.check(&Token::RBracket) {
            args.push(self.parse_expr()?);
            while self.eat(Token::Comma) {
                args.push(self.parse_expr()?);
            }
        }
        self.expect(Token::RBracket)?;
        Ok(Argument::RecordInit(args))
    }

    fn parse_branch_init(&mut self) -> Result<Argument, ParseError> {
        self.expect(Token::Dollar)?;
        let name = self.expect_ident()?;
        let mut args = Vec::new();
        if self.eat(Token::LParen) {
            args = self.parse_call_args()?;
            self.expect(Token::RParen)?;
        }
        Ok(Argument::BranchInit(name, args))
    }

    fn parse_typecast(&mut self) -> Result<Argument, ParseError> {
        self.expect(Token::LParen)?;
        let inner = self.parse_expr()?;
        self.expect(Token::Comma)?;
        let ty = self.parse_qualified_name()?;
        self.expect(Token::RParen)?;
        Ok(Argument::Typecast(ty, Box::new(inner)))
    }

    /// `count : body`, `sum target : body`, etc. `body` is either a single
    /// literal or a brace-delimited, comma-separated conjunction; `count`
    /// has no target expression (a placeholder is stored, never read by
    /// `crate::ram::translate::lower_aggregate_operation`).
    fn parse_aggregate(&mut self, func: AggregateFuncRef) -> Result<Argument, ParseError> {
        let target = if self.check(&Token::Colon) {
            Box::new(Argument::Numeric(NumericConstant::Unresolved(1)))
        } else {
            Box::new(self.parse_expr()?)
        };
        self.expect(Token::Colon)?;
        let body = if self.eat(Token::LBrace) {
            let mut lits = vec![self.parse_body_literal()?];
            while self.eat(Token::Comma) {
                lits.push(self.parse_body_literal()?);
            }
            self.expect(Token::RBrace)?;
            lits
        } else {
            vec![self.parse_body_literal()?]
        };
        Ok(Argument::Aggregate(Box::new(Aggregate { func, target, body })))
    }
}

fn aggregate_func(name: &str) -> Option<AggregateFuncRef> {
    match name {
        "count" => Some(AggregateFuncRef::Intrinsic(AggregateFunc::Count)),
        "sum" => Some(AggregateFuncRef::Intrinsic(AggregateFunc::Sum)),
        "min" => Some(AggregateFuncRef::Intrinsic(AggregateFunc::Min)),
        "max" => Some(AggregateFuncRef::Intrinsic(AggregateFunc::Max)),
        "mean" => Some(AggregateFuncRef::Intrinsic(AggregateFunc::Mean)),
        _ => None,
    }
}

fn parse_numeric_constant(text: &str) -> NumericConstant {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if let Ok(v) = i128::from_str_radix(hex, 16) {
            return NumericConstant::Unresolved(v);
        }
    }
    let lower = text.to_ascii_lowercase();
    if lower.ends_with('f') {
        if let Ok(v) = text[..text.len() - 1].parse::<f64>() {
            return NumericConstant::Float(v);
        }
    }
    if lower.contains('.') || lower.contains('e') {
        if let Ok(v) = text.parse::<f64>() {
            return NumericConstant::Float(v);
        }
    }
    if lower.ends_with('u') {
        if let Ok(v) = text[..text.len() - 1].parse::<u64>() {
            return NumericConstant::Unsigned(v);
        }
    }
    NumericConstant::Unresolved(text.parse::<i128>().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BodyLiteral;

    #[test]
    fn parses_transitive_closure_program() {
        let src = "e(1,2).\ne(2,3).\np(x,y) :- e(x,y).\np(x,z) :- p(x,y), e(y,z).\n";
        let parsed = parse(src).unwrap();
        assert_eq!(parsed.program.clauses.len(), 4);
        assert!(parsed.program.clauses[0].is_fact());
        assert!(parsed.program.clauses[3].is_recursive("p"));
    }

    #[test]
    fn parses_decl_and_io_directives() {
        let src = ".decl a(x: number)\n.input a(filename=\"a.facts\")\n.decl b(x: number)\n.output b.\n";
        let parsed = parse(src).unwrap();
        assert_eq!(parsed.program.relations.len(), 2);
        assert_eq!(parsed.directives["a"][0]["operation"], "input");
        assert_eq!(parsed.directives["a"][0]["filename"], "a.facts");
        assert_eq!(parsed.directives["b"][0]["operation"], "output");
    }

    #[test]
    fn parses_negation() {
        let parsed = parse("c(x) :- a(x), !b(x).").unwrap();
        let clause = &parsed.program.clauses[0];
        assert!(matches!(clause.body[1], BodyLiteral::Negated(_)));
    }

    #[test]
    fn parses_aggregate_rule() {
        let parsed = parse("total(n, s) :- score(n, _), s = sum v : { score(n, v) }.").unwrap();
        let clause = &parsed.program.clauses[0];
        match &clause.body[1] {
            BodyLiteral::Comparison(ComparisonOp::Eq, Argument::Variable(var), Argument::Aggregate(agg)) => {
                assert_eq!(var, "s");
                assert_eq!(agg.func, AggregateFuncRef::Intrinsic(AggregateFunc::Sum));
                assert_eq!(agg.body.len(), 1);
            }
            other => panic!("unexpected literal: {other:?}"),
        }
    }

    #[test]
    fn parses_record_equality() {
        let parsed = parse("q(x,y) :- r(x,y), [x,y] = [1,2].").unwrap();
        let clause = &parsed.program.clauses[0];
        assert!(matches!(
            clause.body[1],
            BodyLiteral::Comparison(ComparisonOp::Eq, Argument::RecordInit(_), Argument::RecordInit(_))
        ));
    }

    #[test]
    fn parses_eqrel_decl() {
        let parsed = parse(".decl eq(x: number, y: number) eqrel\n").unwrap();
        assert_eq!(parsed.program.relations[0].representation, RelationRepresentation::EquivalenceRelation);
    }

    #[test]
    fn parses_explicit_plan() {
        let src = "p(x) :- a(x), b(x).\n.plan 1:(1,0)\n";
        let parsed = parse(src).unwrap();
        assert_eq!(parsed.program.clauses[0].plan, Some(vec![1, 0]));
    }
}
