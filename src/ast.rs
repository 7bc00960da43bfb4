//! Abstract Syntax Tree definitions for ARO.
//!
//! This module defines the complete AST representation for parsed ARO
//! programs: imports, feature sets, statements (ARO/Publish/Require/Match/
//! ForEach), expressions, and patterns. Every node carries a [`Span`] so
//! diagnostics can point back at source text.
//!
//! # Example
//!
//! ```rust
//! use aro::ast::{Span, QualifiedNoun};
//!
//! let span = Span::new(0, 10, 1, 1);
//! let noun = QualifiedNoun {
//!     base: "name".to_string(),
//!     annotation: None,
//!     span,
//! };
//! assert_eq!(noun.base, "name");
//! ```

#[cfg(feature = "serde-types")]
use serde::{Deserialize, Serialize};

/// Source location information for error reporting and tooling.
///
/// A span tracks the byte offsets and 1-based line/column of the start of a
/// token or node, plus its ending byte offset. Spans compose via
/// [`Span::merge`]: `min(start) .. max(end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct Span {
    /// Starting byte offset (inclusive).
    pub start: usize,
    /// Ending byte offset (exclusive).
    pub end: usize,
    /// Line number (1-indexed) of the start of the span.
    pub line: usize,
    /// Column number (1-indexed) of the start of the span.
    pub column: usize,
}

impl Span {
    /// Creates a new span with the given positions.
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Merges two spans, creating a span that covers both.
    pub fn merge(&self, other: &Span) -> Span {
        let (earlier, earlier_col) = if self.start <= other.start {
            (self.line, self.column)
        } else {
            (other.line, other.column)
        };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: earlier,
            column: earlier_col,
        }
    }

    /// Returns the length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if the span covers zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders the span as `line:column`, matching the diagnostic pretty form.
    pub fn render(&self) -> String {
        format!("{}:{}", self.line, self.column)
    }
}

/// A full ARO program: an ordered list of imports followed by an ordered
/// list of feature sets.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct Program {
    /// Import declarations, in source order.
    pub imports: Vec<ImportDeclaration>,
    /// Feature sets, in source order.
    pub feature_sets: Vec<FeatureSet>,
    /// Span covering the whole program.
    pub span: Span,
}

/// A relative import path: `import ./some/path`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct ImportDeclaration {
    /// The raw path text (dots, slashes, hyphens, identifiers).
    pub path: String,
    /// Source location.
    pub span: Span,
}

/// A named group of statements: `(Name: Business Activity) [when guard] { ... }`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct FeatureSet {
    /// The feature set's name.
    pub name: String,
    /// The business-activity label (e.g. `"Greeting"`, `"Order Placed Handler"`).
    pub activity: String,
    /// Optional guard expression gating whether this feature set runs.
    pub guard: Option<Box<Expr>>,
    /// Statements in source order.
    pub statements: Vec<Statement>,
    /// Source location.
    pub span: Span,
}

/// A statement inside a feature set body.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum Statement {
    /// An Action-Result-Object sentence.
    Aro(AroStatement),
    /// `Publish as <external> <internal>.`
    Publish(PublishStatement),
    /// `Require <name> from <source>.`
    Require(RequireStatement),
    /// `match <subject> { case ... otherwise ... }`
    Match(MatchStatement),
    /// `[parallel] for each <item> [at <index>] in <collection> { ... }`
    ForEach(ForEachLoop),
}

impl Statement {
    /// Returns the span of the statement, regardless of variant.
    pub fn span(&self) -> Span {
        match self {
            Statement::Aro(s) => s.span,
            Statement::Publish(s) => s.span,
            Statement::Require(s) => s.span,
            Statement::Match(s) => s.span,
            Statement::ForEach(s) => s.span,
        }
    }
}

/// The verb of an ARO statement: classified into a semantic role by the
/// analyzer (not the parser — classification depends on a word list, not
/// grammar), but parsed here as a plain capitalized identifier.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct Action {
    /// The verb text, e.g. `"Extract"`, `"Compute"`, `"Publish"`.
    pub verb: String,
    /// Source location.
    pub span: Span,
}

/// The semantic role an action verb is classified into by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum ActionRole {
    /// Reads from an external source, binding a new internal symbol.
    Request,
    /// Reads an already-known value, binding a new internal symbol.
    Own,
    /// Writes/emits/logs a value; may itself read the object.
    Response,
    /// Exports an internal symbol under an external name.
    Export,
    /// Binds a side-effecting resource (server lifecycle, filesystem, etc).
    Server,
}

/// A full Action-Result-Object sentence.
///
/// `ActionVerb [article] <Result [as Type]> Preposition {expr | [article] <Object>}
/// [with ...] [to expr] [where FIELD OP value] [by /regex/flags] [when expr].`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct AroStatement {
    /// The action verb.
    pub action: Action,
    /// The result qualified-noun (what this statement binds or sinks).
    pub result: QualifiedNoun,
    /// The object clause (preposition + object).
    pub object: ObjectClause,
    /// The value source feeding the result, if any.
    pub value: ValueSource,
    /// Query modifiers (`where`, aggregation, `by /regex/`).
    pub query: QueryModifiers,
    /// Range modifiers (`to`, `with`).
    pub range: RangeModifiers,
    /// Optional trailing guard (`when expr`).
    pub guard: Option<Box<Expr>>,
    /// Source location.
    pub span: Span,
}

/// A qualified noun: `base [: annotation]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct QualifiedNoun {
    /// The base variable/noun name.
    pub base: String,
    /// An optional specifier following `:`.
    pub annotation: Option<NounAnnotation>,
    /// Source location.
    pub span: Span,
}

/// The specifier after a qualified noun's `:`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum NounAnnotation {
    /// A coarse type annotation, e.g. `List<String>`.
    Type(TypeAnnotation),
    /// A command/path string literal, e.g. `"id"`.
    StringLiteral(String),
    /// A date offset, e.g. `+7d`.
    DateOffset {
        /// `+1` or `-1`.
        sign: i32,
        /// The magnitude.
        amount: i64,
        /// The unit letter (`d`, `h`, `m`, `s`, ...).
        unit: char,
    },
    /// A single numeric index, e.g. `5`.
    Index(i64),
    /// A numeric range, e.g. `0-19`.
    Range(i64, i64),
    /// A pick list, e.g. `0,3,7`.
    Pick(Vec<i64>),
    /// A dotted or slashed path specifier.
    Path(String),
}

/// A coarse type annotation as written in source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum TypeAnnotation {
    /// A primitive scalar type.
    Primitive(PrimitiveType),
    /// `List<T>`.
    List(Box<TypeAnnotation>),
    /// `Map<K, V>`.
    Map(Box<TypeAnnotation>, Box<TypeAnnotation>),
    /// A named schema reference.
    SchemaRef(String),
}

/// Primitive scalar types recognized by the coarse type lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum PrimitiveType {
    /// `String`.
    String,
    /// `Integer`.
    Integer,
    /// `Float`.
    Float,
    /// `Boolean`.
    Boolean,
}

/// The preposition introducing an object clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum Preposition {
    /// `from`
    From,
    /// `for`
    For,
    /// `against`
    Against,
    /// `to`
    To,
    /// `into`
    Into,
    /// `via`
    Via,
    /// `with`
    With,
    /// `on`
    On,
    /// `at`
    At,
    /// `by`
    By,
}

/// An object clause: `preposition {expr | [article] <object>}`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct ObjectClause {
    /// The preposition.
    pub preposition: Preposition,
    /// The object itself.
    pub object: ObjectSlot,
    /// Source location.
    pub span: Span,
}

/// The contents of an object slot: either a qualified noun, or an
/// expression (in which case the parser synthesizes the sentinel object
/// name `_expression_`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum ObjectSlot {
    /// `[article] <qualified-noun>`.
    Noun(QualifiedNoun),
    /// An expression standing in for the object.
    Expression(Box<Expr>),
}

/// The sentinel base name synthesized when an object slot is an expression.
pub const EXPRESSION_SENTINEL: &str = "_expression_";

/// The value feeding a statement's result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum ValueSource {
    /// No explicit value source.
    None,
    /// A literal value.
    Literal(Literal),
    /// A general expression.
    Expression(Box<Expr>),
    /// A sink expression (abbreviated sink-verb form).
    Sink(Box<Expr>),
}

/// `with` after the object, either an aggregation function or a second
/// expression (set-operation mode) — selected by whether the object was an
/// expression sentinel.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum WithClause {
    /// `with sum`, `with count(field)`, etc.
    Aggregation {
        /// The aggregation function.
        func: AggregationFn,
        /// An optional field argument.
        field: Option<String>,
    },
    /// `with <expr>` in set-operation mode.
    Expression(Box<Expr>),
}

/// Aggregation functions usable in a `with` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum AggregationFn {
    /// `sum`
    Sum,
    /// `count`
    Count,
    /// `avg`
    Avg,
    /// `min`
    Min,
    /// `max`
    Max,
}

/// `where <field> OP <value>`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct WhereClause {
    /// The field name being tested.
    pub field: String,
    /// The comparison operator.
    pub op: CompareOp,
    /// The value compared against.
    pub value: Box<Expr>,
    /// Source location.
    pub span: Span,
}

/// Comparison operators usable in a `where` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum CompareOp {
    /// `is`
    Is,
    /// `is not`
    IsNot,
    /// `=`
    Eq,
    /// `==`
    EqEq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `contains`
    Contains,
    /// `matches`
    Matches,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

/// Query modifiers attached to an ARO statement.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct QueryModifiers {
    /// `where <field> OP value`.
    pub where_clause: Option<WhereClause>,
    /// `by /regex/flags`.
    pub by_pattern: Option<Literal>,
}

/// Range modifiers attached to an ARO statement.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct RangeModifiers {
    /// `to <expr>`.
    pub to: Option<Box<Expr>>,
    /// `with {aggregation | expr}`.
    pub with: Option<WithClause>,
}

/// `Publish as <external> <internal>.`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct PublishStatement {
    /// The internal name being exported; must resolve to an earlier symbol.
    pub internal_name: String,
    /// The external name it is published as.
    pub external_name: String,
    /// Source location.
    pub span: Span,
}

/// `Require <name> from <source>.`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct RequireStatement {
    /// The name being required.
    pub name: String,
    /// The textual description of where it comes from
    /// (`framework`, `environment`, or a feature-set name).
    pub source_desc: String,
    /// Source location.
    pub span: Span,
}

/// `match <subject> { (case pattern [where expr] { stmt* })* [otherwise { stmt* }] }`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct MatchStatement {
    /// The subject expression being matched.
    pub subject: Box<Expr>,
    /// The case arms, in source order.
    pub cases: Vec<MatchCase>,
    /// The `otherwise` body, if present.
    pub otherwise: Option<Vec<Statement>>,
    /// Source location.
    pub span: Span,
}

/// A single `case` arm of a `match` statement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct MatchCase {
    /// The pattern to match against.
    pub pattern: Pattern,
    /// An optional `where` guard.
    pub guard: Option<Box<Expr>>,
    /// The case body.
    pub body: Vec<Statement>,
    /// Source location.
    pub span: Span,
}

/// A `match` pattern.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum Pattern {
    /// A literal value pattern.
    Literal(Literal),
    /// A variable-binding pattern.
    Variable(String),
    /// The wildcard pattern `_`.
    Wildcard,
    /// A regex pattern.
    Regex(String),
}

/// `[parallel] for each <item> [at <index>] in <collection> [with <concurrency: N>] [where expr] { stmt* }`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct ForEachLoop {
    /// Whether this loop weakens ordering (`parallel for each`).
    pub parallel: bool,
    /// The per-iteration item binding name.
    pub item: String,
    /// An optional per-iteration index binding name.
    pub index: Option<String>,
    /// The collection expression being iterated.
    pub collection: Box<Expr>,
    /// An optional concurrency bound for parallel loops.
    pub concurrency: Option<u32>,
    /// An optional `where` filter.
    pub where_clause: Option<Box<Expr>>,
    /// The loop body.
    pub body: Vec<Statement>,
    /// Source location.
    pub span: Span,
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum Literal {
    /// A string literal.
    String(String),
    /// An integer literal.
    Int(i64),
    /// A floating point literal.
    Float(f64),
    /// A boolean literal.
    Bool(bool),
    /// `null`.
    Null,
    /// A regex literal, with its pattern text and flag letters.
    Regex {
        /// The regex source pattern (without delimiters).
        pattern: String,
        /// Flag letters, e.g. `"im"`.
        flags: String,
    },
}

/// A piece of an interpolated string: either literal text or an embedded
/// expression from a `${...}` segment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum StringPart {
    /// Literal text between interpolations.
    Literal(String),
    /// An interpolated expression.
    Expr(Box<Expr>),
}

/// A binary operator, with precedence per the Pratt table in [`crate::pratt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum BinaryOp {
    /// `or`
    Or,
    /// `and`
    And,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `contains`
    Contains,
    /// `is`
    Is,
}

/// A unary (prefix) operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `not x`
    Not,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum Expr {
    /// A literal value.
    Literal(Literal, Span),
    /// An array literal: `[e1, e2, ...]`.
    Array(Vec<Expr>, Span),
    /// A map literal: `{k1: v1, k2: v2, ...}`.
    Map(Vec<(Expr, Expr)>, Span),
    /// A variable reference: `<name>`.
    Variable(String, Span),
    /// An interpolated string assembly.
    InterpolatedString(Vec<StringPart>, Span),
    /// A binary expression.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// The left operand.
        left: Box<Expr>,
        /// The right operand.
        right: Box<Expr>,
        /// Source location.
        span: Span,
    },
    /// A unary expression.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
        /// Source location.
        span: Span,
    },
    /// Member access: `expr.field`.
    Member {
        /// The receiver expression.
        object: Box<Expr>,
        /// The field name.
        field: String,
        /// Source location.
        span: Span,
    },
    /// Subscript: `expr[index]`.
    Subscript {
        /// The receiver expression.
        object: Box<Expr>,
        /// The index expression.
        index: Box<Expr>,
        /// Source location.
        span: Span,
    },
    /// A parenthesized expression.
    Grouped(Box<Expr>, Span),
    /// Postfix `exists`.
    Exists(Box<Expr>, Span),
    /// `expr is Type` / `expr is defined` / `expr is empty`.
    TypeCheck {
        /// The checked expression.
        expr: Box<Expr>,
        /// The textual type/predicate name being checked against.
        check: String,
        /// Source location.
        span: Span,
    },
    /// A cast expression: `expr as Type`.
    Cast {
        /// The casted expression.
        expr: Box<Expr>,
        /// The target type.
        target_type: TypeAnnotation,
        /// Source location.
        span: Span,
    },
}

impl Expr {
    /// Returns the span of this expression.
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, s)
            | Expr::Array(_, s)
            | Expr::Map(_, s)
            | Expr::Variable(_, s)
            | Expr::InterpolatedString(_, s)
            | Expr::Grouped(_, s)
            | Expr::Exists(_, s) => *s,
            Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Member { span, .. }
            | Expr::Subscript { span, .. }
            | Expr::TypeCheck { span, .. }
            | Expr::Cast { span, .. } => *span,
        }
    }

    /// Recursively collects the names of every `Variable` reference reached
    /// by walking binary/unary/member/subscript/grouped/existence/type-check/
    /// array/map/interpolation nodes (spec §4.G "expressions contribute
    /// extra input dependencies").
    pub fn collect_variable_refs(&self, out: &mut Vec<String>) {
        match self {
            Expr::Literal(..) => {}
            Expr::Array(items, _) => items.iter().for_each(|e| e.collect_variable_refs(out)),
            Expr::Map(pairs, _) => pairs.iter().for_each(|(k, v)| {
                k.collect_variable_refs(out);
                v.collect_variable_refs(out);
            }),
            Expr::Variable(name, _) => out.push(name.clone()),
            Expr::InterpolatedString(parts, _) => {
                for part in parts {
                    if let StringPart::Expr(e) = part {
                        e.collect_variable_refs(out);
                    }
                }
            }
            Expr::Binary { left, right, .. } => {
                left.collect_variable_refs(out);
                right.collect_variable_refs(out);
            }
            Expr::Unary { operand, .. } => operand.collect_variable_refs(out),
            Expr::Member { object, .. } => object.collect_variable_refs(out),
            Expr::Subscript { object, index, .. } => {
                object.collect_variable_refs(out);
                index.collect_variable_refs(out);
            }
            Expr::Grouped(inner, _) => inner.collect_variable_refs(out),
            Expr::Exists(inner, _) => inner.collect_variable_refs(out),
            Expr::TypeCheck { expr, .. } => expr.collect_variable_refs(out),
            Expr::Cast { expr, .. } => expr.collect_variable_refs(out),
        }
    }
}

/// A read-only visitor over the AST.
///
/// Each method has a default implementation that recurses into children; a
/// visitor need only override the nodes it cares about. This replaces an
/// open-class hierarchy with pattern matching over the closed [`Statement`]
/// and [`Expr`] sum types.
pub trait Visitor {
    /// Visits a whole program.
    fn visit_program(&mut self, program: &Program) {
        for fs in &program.feature_sets {
            self.visit_feature_set(fs);
        }
    }

    /// Visits a feature set.
    fn visit_feature_set(&mut self, feature_set: &FeatureSet) {
        if let Some(guard) = &feature_set.guard {
            self.visit_expr(guard);
        }
        for stmt in &feature_set.statements {
            self.visit_statement(stmt);
        }
    }

    /// Visits a statement, dispatching on its variant.
    fn visit_statement(&mut self, statement: &Statement) {
        walk_statement(self, statement);
    }

    /// Visits an expression, dispatching on its variant.
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

/// Default recursive walk over a statement's children, calling back into
/// the visitor's `visit_expr`/`visit_statement`.
pub fn walk_statement<V: Visitor + ?Sized>(visitor: &mut V, statement: &Statement) {
    match statement {
        Statement::Aro(aro) => {
            if let ObjectSlot::Expression(e) = &aro.object.object {
                visitor.visit_expr(e);
            }
            match &aro.value {
                ValueSource::Expression(e) | ValueSource::Sink(e) => visitor.visit_expr(e),
                ValueSource::Literal(_) | ValueSource::None => {}
            }
            if let Some(w) = &aro.query.where_clause {
                visitor.visit_expr(&w.value);
            }
            if let Some(to) = &aro.range.to {
                visitor.visit_expr(to);
            }
            if let Some(WithClause::Expression(e)) = &aro.range.with {
                visitor.visit_expr(e);
            }
            if let Some(g) = &aro.guard {
                visitor.visit_expr(g);
            }
        }
        Statement::Publish(_) | Statement::Require(_) => {}
        Statement::Match(m) => {
            visitor.visit_expr(&m.subject);
            for case in &m.cases {
                if let Some(g) = &case.guard {
                    visitor.visit_expr(g);
                }
                for stmt in &case.body {
                    visitor.visit_statement(stmt);
                }
            }
            if let Some(body) = &m.otherwise {
                for stmt in body {
                    visitor.visit_statement(stmt);
                }
            }
        }
        Statement::ForEach(f) => {
            visitor.visit_expr(&f.collection);
            if let Some(w) = &f.where_clause {
                visitor.visit_expr(w);
            }
            for stmt in &f.body {
                visitor.visit_statement(stmt);
            }
        }
    }
}

/// Default recursive walk over an expression's children.
pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::Literal(..) | Expr::Variable(..) => {}
        Expr::Array(items, _) => items.iter().for_each(|e| visitor.visit_expr(e)),
        Expr::Map(pairs, _) => pairs.iter().for_each(|(k, v)| {
            visitor.visit_expr(k);
            visitor.visit_expr(v);
        }),
        Expr::InterpolatedString(parts, _) => {
            for part in parts {
                if let StringPart::Expr(e) = part {
                    visitor.visit_expr(e);
                }
            }
        }
        Expr::Binary { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        Expr::Unary { operand, .. } => visitor.visit_expr(operand),
        Expr::Member { object, .. } => visitor.visit_expr(object),
        Expr::Subscript { object, index, .. } => {
            visitor.visit_expr(object);
            visitor.visit_expr(index);
        }
        Expr::Grouped(inner, _) | Expr::Exists(inner, _) => visitor.visit_expr(inner),
        Expr::TypeCheck { expr, .. } => visitor.visit_expr(expr),
        Expr::Cast { expr, .. } => visitor.visit_expr(expr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_merge_takes_min_start_max_end() {
        let a = Span::new(5, 10, 2, 3);
        let b = Span::new(0, 7, 1, 1);
        let merged = a.merge(&b);
        assert_eq!(merged.start, 0);
        assert_eq!(merged.end, 10);
        assert_eq!(merged.line, 1);
    }

    #[test]
    fn collect_variable_refs_walks_binary_tree() {
        let span = Span::default();
        let expr = Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(Expr::Variable("a".into(), span)),
            right: Box::new(Expr::Member {
                object: Box::new(Expr::Variable("b".into(), span)),
                field: "c".into(),
                span,
            }),
            span,
        };
        let mut names = Vec::new();
        expr.collect_variable_refs(&mut names);
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
