//! Recursive-descent statement parser with an embedded Pratt expression
//! parser (spec component E).
//!
//! `Parser::parse` never aborts on a malformed statement: it records a
//! [`ParseError`] as a diagnostic and resynchronizes to the next statement
//! or feature-set boundary, so a single source file can report many errors
//! in one pass.

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::pratt::{infix_binding_power, postfix_binding_power, prefix_binding_power, to_binary_op};

/// Verbs that admit the abbreviated "sink" statement form:
/// `Verb expression Preposition [article] <Object>.`
const SINK_VERBS: &[&str] = &["log", "print", "output", "debug", "write", "send", "dispatch"];

/// Parses a token stream into a [`Program`], collecting [`ParseError`]s
/// side-channel rather than aborting.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    /// Creates a parser over an already-lexed token stream.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    /// Lexes and parses `source` in one call, returning the program and any
    /// diagnostics gathered from either the lexer or the parser.
    pub fn parse_source(source: &str) -> (Program, Vec<ParseError>) {
        let mut lexer = Lexer::new(source);
        let mut tokens: Vec<Token> = (&mut lexer).collect();
        let lexer_errors: Vec<ParseError> = lexer.errors().iter().cloned().map(ParseError::from).collect();
        tokens.push(Token::new(TokenKind::Eof, "", Span::default()));
        let mut parser = Parser::new(tokens);
        let program = parser.parse_program();
        let mut errors = lexer_errors;
        errors.extend(parser.errors);
        (program, errors)
    }

    /// Parses a complete program: imports then feature sets.
    pub fn parse_program(&mut self) -> Program {
        let start_span = self.peek().span;
        let mut imports = Vec::new();
        while self.check(TokenKind::Import) {
            match self.parse_import() {
                Ok(import) => imports.push(import),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize_feature_set();
                }
            }
        }

        let mut feature_sets = Vec::new();
        while !self.is_at_end() {
            match self.parse_feature_set() {
                Ok(fs) => feature_sets.push(fs),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize_feature_set();
                }
            }
        }

        let end_span = self
            .tokens
            .last()
            .map(|t| t.span)
            .unwrap_or(start_span);

        Program {
            imports,
            feature_sets,
            span: start_span.merge(&end_span),
        }
    }

    // === Token stream primitives ===

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek2(&self) -> &Token {
        let idx = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else if self.is_at_end() {
            Err(ParseError::UnexpectedEndOfFile {
                context: expected.to_string(),
                span: self.peek().span,
            })
        } else {
            let found = self.peek().clone();
            Err(ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: format!("{:?}('{}')", found.kind, found.lexeme),
                span: found.span,
            })
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<Token, ParseError> {
        self.expect(TokenKind::Identifier, expected)
    }

    /// Like [`Self::expect_identifier`], but also accepts a reserved
    /// keyword's lexeme as a word — verbs, noun bases, and field names are
    /// open-ended business vocabulary that may coincide with a reserved
    /// word (e.g. an `Assert` verb colliding with the `assert` keyword).
    fn expect_word(&mut self, expected: &str) -> Result<Token, ParseError> {
        if token_is_word(self.peek().kind) {
            Ok(self.advance())
        } else if self.is_at_end() {
            Err(ParseError::UnexpectedEndOfFile {
                context: expected.to_string(),
                span: self.peek().span,
            })
        } else {
            let found = self.peek().clone();
            Err(ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: format!("{:?}('{}')", found.kind, found.lexeme),
                span: found.span,
            })
        }
    }

    // === Error recovery ===

    /// "On parse error in a feature set, report and synchronize to the next
    /// statement boundary: advance past the next `.`, or stop at `}` or
    /// `<`." (spec §4.E)
    fn synchronize_statement(&mut self) {
        while !self.is_at_end() {
            if self.check(TokenKind::RBrace) || self.check(TokenKind::Lt) {
                return;
            }
            let tok = self.advance();
            if tok.kind == TokenKind::Dot {
                return;
            }
        }
    }

    /// "On error at feature-set boundary, advance until the next `(`."
    fn synchronize_feature_set(&mut self) {
        while !self.is_at_end() && !self.check(TokenKind::LParen) {
            self.advance();
        }
    }

    // === Imports ===

    fn parse_import(&mut self) -> Result<ImportDeclaration, ParseError> {
        let start = self.expect(TokenKind::Import, "'import'")?;
        let mut path = String::new();
        let mut end_span = start.span;
        while matches!(
            self.peek().kind,
            TokenKind::Dot | TokenKind::Slash | TokenKind::Hyphen | TokenKind::Identifier
        ) {
            let tok = self.advance();
            path.push_str(&tok.lexeme);
            end_span = tok.span;
        }
        if path.is_empty() {
            return Err(ParseError::InvalidStatement {
                message: "expected an import path".to_string(),
                span: start.span,
            });
        }
        Ok(ImportDeclaration {
            path,
            span: start.span.merge(&end_span),
        })
    }

    // === Feature sets ===

    fn parse_feature_set(&mut self) -> Result<FeatureSet, ParseError> {
        let lparen = self.expect(TokenKind::LParen, "'('")?;
        let name_tok = self.expect_identifier("feature set name").map_err(|_| {
            ParseError::MissingFeatureSetName { span: lparen.span }
        })?;
        self.expect(TokenKind::Colon, "':'")?;

        let mut activity_words = Vec::new();
        while !self.check(TokenKind::RParen) && !self.is_at_end() {
            activity_words.push(self.advance().lexeme);
        }
        if activity_words.is_empty() {
            return Err(ParseError::MissingBusinessActivity {
                span: self.peek().span,
            });
        }
        let activity = activity_words.join(" ");
        self.expect(TokenKind::RParen, "')'")?;

        let guard = if self.check(TokenKind::When) {
            self.advance();
            Some(Box::new(self.parse_expr(0)?))
        } else {
            None
        };

        let lbrace = self.expect(TokenKind::LBrace, "'{'")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize_statement();
                }
            }
        }
        let rbrace = self.expect(TokenKind::RBrace, "'}'")?;

        if statements.is_empty() {
            self.errors.push(ParseError::EmptyFeatureSet {
                name: name_tok.lexeme.clone(),
                span: lparen.span.merge(&rbrace.span),
            });
        }

        Ok(FeatureSet {
            name: name_tok.lexeme,
            activity,
            guard,
            statements,
            span: lparen.span.merge(&rbrace.span).merge(&lbrace.span),
        })
    }

    // === Statements ===

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match self.peek().kind {
            TokenKind::Match => self.parse_match_statement().map(Statement::Match),
            TokenKind::Parallel | TokenKind::For => self.parse_for_each().map(Statement::ForEach),
            TokenKind::Publish => self.parse_publish().map(Statement::Publish),
            TokenKind::Require => self.parse_require().map(Statement::Require),
            TokenKind::Lt => self.parse_aro_statement().map(Statement::Aro),
            _ => {
                let found = self.peek().clone();
                Err(ParseError::UnexpectedToken {
                    expected: "a statement ('<Verb>', 'match', 'for each', 'Publish', or 'Require')"
                        .to_string(),
                    found: format!("{:?}('{}')", found.kind, found.lexeme),
                    span: found.span,
                })
            }
        }
    }

    /// `ActionVerb [article] <Result [as Type]> Preposition {expression |
    /// [article] <Object>} [with {expr | aggregation}] [to expr]
    /// [where FIELD OP value] [by /regex/flags] [when expr].`
    fn parse_aro_statement(&mut self) -> Result<AroStatement, ParseError> {
        let verb_lt = self.expect(TokenKind::Lt, "'<'")?;
        let verb_tok = self.expect_word("an action verb")?;
        let verb_gt = self.expect(TokenKind::Gt, "'>'")?;
        let action = Action {
            verb: verb_tok.lexeme.clone(),
            span: verb_lt.span.merge(&verb_gt.span),
        };

        let is_sink = SINK_VERBS.contains(&verb_tok.lexeme.to_ascii_lowercase().as_str());

        let (result, value) = if is_sink {
            let sink_expr = self.parse_expr(0)?;
            let result = QualifiedNoun {
                base: EXPRESSION_SENTINEL.to_string(),
                annotation: None,
                span: sink_expr.span(),
            };
            (result, ValueSource::Sink(Box::new(sink_expr)))
        } else {
            self.skip_article();
            self.expect(TokenKind::Lt, "'<' opening the result")?;
            let result = self.parse_qualified_noun_inner()?;
            self.expect(TokenKind::Gt, "'>' closing the result")?;
            (result, ValueSource::None)
        };

        let preposition_tok = self.expect_preposition()?;
        let preposition = token_to_preposition(preposition_tok.kind).unwrap();

        let object = self.parse_object_clause(preposition, preposition_tok.span)?;

        let with = if self.check(TokenKind::With) {
            self.advance();
            Some(self.parse_with_clause()?)
        } else {
            None
        };

        let to = if self.check(TokenKind::To) {
            self.advance();
            Some(Box::new(self.parse_expr(0)?))
        } else {
            None
        };

        let where_clause = if self.check(TokenKind::Where) {
            Some(self.parse_where_clause()?)
        } else {
            None
        };

        let by_pattern = if self.check(TokenKind::By) {
            self.advance();
            let tok = self.expect(TokenKind::RegexLiteral, "a regex literal")?;
            let (pattern, flags) = parse_regex_lexeme(&tok.lexeme);
            Some(Literal::Regex { pattern, flags })
        } else {
            None
        };

        let guard = if self.check(TokenKind::When) {
            self.advance();
            Some(Box::new(self.parse_expr(0)?))
        } else {
            None
        };

        let terminator = self.expect(TokenKind::Dot, "'.' ending the statement")?;

        Ok(AroStatement {
            span: action.span.merge(&terminator.span),
            action,
            result,
            object,
            value,
            query: QueryModifiers {
                where_clause,
                by_pattern,
            },
            range: RangeModifiers { to, with },
            guard,
        })
    }

    fn skip_article(&mut self) {
        if matches!(self.peek().kind, TokenKind::A | TokenKind::An | TokenKind::The) {
            self.advance();
        }
    }

    fn expect_preposition(&mut self) -> Result<Token, ParseError> {
        if self.peek().kind.is_preposition() {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            Err(ParseError::UnexpectedToken {
                expected: "a preposition (from/for/against/to/into/via/with/on/at/by)".to_string(),
                found: format!("{:?}('{}')", found.kind, found.lexeme),
                span: found.span,
            })
        }
    }

    /// "After a preposition of kind `to | from | with | for` that is
    /// followed by a non-article expression-start token, the slot is an
    /// expression... Otherwise the slot is `[article] <qualified-noun>`."
    fn parse_object_clause(&mut self, preposition: Preposition, prep_span: Span) -> Result<ObjectClause, ParseError> {
        self.skip_article();
        let (object, span) = if self.check(TokenKind::Lt) {
            let lt = self.advance();
            let noun = self.parse_qualified_noun_inner()?;
            let gt = self.expect(TokenKind::Gt, "'>' closing the object")?;
            (ObjectSlot::Noun(noun), lt.span.merge(&gt.span))
        } else if matches!(
            preposition,
            Preposition::To | Preposition::From | Preposition::With | Preposition::For
        ) {
            let expr = self.parse_expr(0)?;
            let span = expr.span();
            (ObjectSlot::Expression(Box::new(expr)), span)
        } else {
            let found = self.peek().clone();
            return Err(ParseError::UnexpectedToken {
                expected: "'<' opening an object, or an expression".to_string(),
                found: format!("{:?}('{}')", found.kind, found.lexeme),
                span: found.span,
            });
        };
        Ok(ObjectClause {
            preposition,
            object,
            span: prep_span.merge(&span),
        })
    }

    fn parse_with_clause(&mut self) -> Result<WithClause, ParseError> {
        if self.check(TokenKind::Identifier) {
            let lower = self.peek().lexeme.to_ascii_lowercase();
            let func = match lower.as_str() {
                "sum" => Some(AggregationFn::Sum),
                "count" => Some(AggregationFn::Count),
                "avg" => Some(AggregationFn::Avg),
                "min" => Some(AggregationFn::Min),
                "max" => Some(AggregationFn::Max),
                _ => None,
            };
            if let Some(func) = func {
                self.advance();
                let field = if self.check(TokenKind::LParen) {
                    self.advance();
                    let name = self.expect_identifier("field name")?.lexeme;
                    self.expect(TokenKind::RParen, "')'")?;
                    Some(name)
                } else {
                    None
                };
                return Ok(WithClause::Aggregation { func, field });
            }
        }
        let expr = self.parse_expr(0)?;
        Ok(WithClause::Expression(Box::new(expr)))
    }

    fn parse_where_clause(&mut self) -> Result<WhereClause, ParseError> {
        let where_tok = self.expect(TokenKind::Where, "'where'")?;
        let field = self.expect_identifier("field name")?.lexeme;
        let op = self.parse_compare_op()?;
        let value = self.parse_expr(0)?;
        let span = where_tok.span.merge(&value.span());
        Ok(WhereClause {
            field,
            op,
            value: Box::new(value),
            span,
        })
    }

    fn parse_compare_op(&mut self) -> Result<CompareOp, ParseError> {
        let tok = self.advance();
        Ok(match tok.kind {
            TokenKind::Is => {
                if self.check(TokenKind::Not) {
                    self.advance();
                    CompareOp::IsNot
                } else {
                    CompareOp::Is
                }
            }
            TokenKind::Equal => CompareOp::Eq,
            TokenKind::EqEq => CompareOp::EqEq,
            TokenKind::NotEq => CompareOp::Ne,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::LtEq => CompareOp::Le,
            TokenKind::GtEq => CompareOp::Ge,
            TokenKind::Contains => CompareOp::Contains,
            TokenKind::Matches => CompareOp::Matches,
            TokenKind::In => CompareOp::In,
            TokenKind::Not => {
                self.expect(TokenKind::In, "'in' after 'not'")?;
                CompareOp::NotIn
            }
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "a comparison operator".to_string(),
                    found: format!("{other:?}"),
                    span: tok.span,
                })
            }
        })
    }

    // === Qualified nouns ===

    fn parse_qualified_noun_inner(&mut self) -> Result<QualifiedNoun, ParseError> {
        let base_tok = self.expect_word("a noun")?;
        let mut span = base_tok.span;
        let annotation = if self.check(TokenKind::Colon) {
            self.advance();
            let (ann, ann_span) = self.parse_noun_annotation()?;
            span = span.merge(&ann_span);
            Some(ann)
        } else if self.check(TokenKind::As) {
            self.advance();
            let ty = self.parse_type_annotation()?;
            span = span.merge(&self.tokens[self.pos - 1].span);
            Some(NounAnnotation::Type(ty))
        } else {
            None
        };
        Ok(QualifiedNoun {
            base: base_tok.lexeme,
            annotation,
            span,
        })
    }

    fn parse_noun_annotation(&mut self) -> Result<(NounAnnotation, Span), ParseError> {
        match self.peek().kind {
            TokenKind::StringSegment => {
                let (parts, span) = self.parse_string_assembly()?;
                let text = match parts.as_slice() {
                    [StringPart::Literal(s)] => s.clone(),
                    _ => {
                        return Err(ParseError::InvalidQualifiedNoun {
                            message: "annotation string literals cannot interpolate".to_string(),
                            span,
                        })
                    }
                };
                Ok((NounAnnotation::StringLiteral(text), span))
            }
            TokenKind::Plus | TokenKind::Hyphen => self.parse_date_offset(),
            TokenKind::IntLiteral => self.parse_index_range_or_pick(),
            TokenKind::Identifier => {
                let lexeme = self.peek().lexeme.clone();
                if matches!(
                    lexeme.as_str(),
                    "String" | "Integer" | "Float" | "Boolean" | "List" | "Map"
                ) {
                    let start = self.peek().span;
                    let ty = self.parse_type_annotation()?;
                    Ok((NounAnnotation::Type(ty), start))
                } else {
                    let tok = self.advance();
                    Ok((NounAnnotation::Path(tok.lexeme), tok.span))
                }
            }
            _ => {
                let found = self.peek().clone();
                Err(ParseError::InvalidQualifiedNoun {
                    message: format!("unexpected annotation token {:?}", found.kind),
                    span: found.span,
                })
            }
        }
    }

    fn parse_date_offset(&mut self) -> Result<(NounAnnotation, Span), ParseError> {
        let sign_tok = self.advance();
        let sign = if sign_tok.kind == TokenKind::Hyphen { -1 } else { 1 };
        let amount_tok = self.expect(TokenKind::IntLiteral, "a date offset amount")?;
        let amount: i64 = amount_tok.lexeme.parse().unwrap_or(0);
        let unit_tok = self.expect_identifier("a date offset unit (d/h/m/s/w)")?;
        let unit = unit_tok.lexeme.chars().next().unwrap_or('d');
        let span = sign_tok.span.merge(&unit_tok.span);
        Ok((
            NounAnnotation::DateOffset {
                sign,
                amount: amount * sign as i64,
                unit,
            },
            span,
        ))
    }

    fn parse_index_range_or_pick(&mut self) -> Result<(NounAnnotation, Span), ParseError> {
        let first_tok = self.expect(TokenKind::IntLiteral, "a numeric index")?;
        let first: i64 = first_tok.lexeme.parse().unwrap_or(0);
        let mut span = first_tok.span;

        if self.check(TokenKind::Hyphen) {
            self.advance();
            let second_tok = self.expect(TokenKind::IntLiteral, "a range end")?;
            let second: i64 = second_tok.lexeme.parse().unwrap_or(0);
            span = span.merge(&second_tok.span);
            return Ok((NounAnnotation::Range(first, second), span));
        }

        if self.check(TokenKind::Comma) {
            let mut picks = vec![first];
            while self.check(TokenKind::Comma) {
                self.advance();
                let tok = self.expect(TokenKind::IntLiteral, "a pick-list element")?;
                picks.push(tok.lexeme.parse().unwrap_or(0));
                span = span.merge(&tok.span);
            }
            return Ok((NounAnnotation::Pick(picks), span));
        }

        Ok((NounAnnotation::Index(first), span))
    }

    fn parse_type_annotation(&mut self) -> Result<TypeAnnotation, ParseError> {
        let tok = self.expect_identifier("a type name")?;
        Ok(match tok.lexeme.as_str() {
            "String" | "string" => TypeAnnotation::Primitive(PrimitiveType::String),
            "Integer" | "integer" | "Int" | "int" => TypeAnnotation::Primitive(PrimitiveType::Integer),
            "Float" | "float" | "Double" | "double" => TypeAnnotation::Primitive(PrimitiveType::Float),
            "Boolean" | "boolean" | "Bool" | "bool" => TypeAnnotation::Primitive(PrimitiveType::Boolean),
            "List" | "list" => {
                self.expect(TokenKind::Lt, "'<' opening List's type argument")?;
                let inner = self.parse_type_annotation()?;
                self.expect(TokenKind::Gt, "'>' closing List's type argument")?;
                TypeAnnotation::List(Box::new(inner))
            }
            "Map" | "map" => {
                self.expect(TokenKind::Lt, "'<' opening Map's type arguments")?;
                let key = self.parse_type_annotation()?;
                self.expect(TokenKind::Comma, "',' between Map's key and value types")?;
                let value = self.parse_type_annotation()?;
                self.expect(TokenKind::Gt, "'>' closing Map's type arguments")?;
                TypeAnnotation::Map(Box::new(key), Box::new(value))
            }
            other => TypeAnnotation::SchemaRef(other.to_string()),
        })
    }

    // === Publish / Require ===

    fn parse_publish(&mut self) -> Result<PublishStatement, ParseError> {
        let publish_tok = self.expect(TokenKind::Publish, "'Publish'")?;
        self.expect(TokenKind::As, "'as'")?;
        self.expect(TokenKind::Lt, "'<' opening the external name")?;
        let external_name = self.expect_identifier("an external name")?.lexeme;
        self.expect(TokenKind::Gt, "'>' closing the external name")?;
        self.expect(TokenKind::Lt, "'<' opening the internal name")?;
        let internal_name = self.expect_identifier("an internal name")?.lexeme;
        self.expect(TokenKind::Gt, "'>' closing the internal name")?;
        let terminator = self.expect(TokenKind::Dot, "'.' ending the Publish statement")?;
        Ok(PublishStatement {
            internal_name,
            external_name,
            span: publish_tok.span.merge(&terminator.span),
        })
    }

    fn parse_require(&mut self) -> Result<RequireStatement, ParseError> {
        let require_tok = self.expect(TokenKind::Require, "'Require'")?;
        self.expect(TokenKind::Lt, "'<' opening the required name")?;
        let name = self.expect_identifier("a name")?.lexeme;
        self.expect(TokenKind::Gt, "'>' closing the required name")?;
        self.expect(TokenKind::From, "'from'")?;
        let mut words = Vec::new();
        while !self.check(TokenKind::Dot) && !self.is_at_end() {
            words.push(self.advance().lexeme);
        }
        let terminator = self.expect(TokenKind::Dot, "'.' ending the Require statement")?;
        Ok(RequireStatement {
            name,
            source_desc: words.join(" "),
            span: require_tok.span.merge(&terminator.span),
        })
    }

    // === Match ===

    fn parse_match_statement(&mut self) -> Result<MatchStatement, ParseError> {
        let match_tok = self.expect(TokenKind::Match, "'match'")?;
        let subject = Box::new(self.parse_expr(0)?);
        self.expect(TokenKind::LBrace, "'{' opening the match body")?;

        let mut cases = Vec::new();
        while self.check(TokenKind::Case) {
            let case_tok = self.advance();
            let pattern = self.parse_pattern()?;
            let guard = if self.check(TokenKind::Where) {
                self.advance();
                Some(Box::new(self.parse_expr(0)?))
            } else {
                None
            };
            self.expect(TokenKind::LBrace, "'{' opening the case body")?;
            let body = self.parse_statements_until_rbrace();
            let rbrace = self.expect(TokenKind::RBrace, "'}' closing the case body")?;
            cases.push(MatchCase {
                pattern,
                guard,
                body,
                span: case_tok.span.merge(&rbrace.span),
            });
        }

        let otherwise = if self.check(TokenKind::Otherwise) {
            self.advance();
            self.expect(TokenKind::LBrace, "'{' opening the otherwise body")?;
            let body = self.parse_statements_until_rbrace();
            self.expect(TokenKind::RBrace, "'}' closing the otherwise body")?;
            Some(body)
        } else {
            None
        };

        let rbrace = self.expect(TokenKind::RBrace, "'}' closing the match statement")?;

        Ok(MatchStatement {
            subject,
            cases,
            otherwise,
            span: match_tok.span.merge(&rbrace.span),
        })
    }

    fn parse_statements_until_rbrace(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize_statement();
                }
            }
        }
        statements
    }

    fn parse_pattern(&mut self) -> Result<Pattern, ParseError> {
        match self.peek().kind {
            TokenKind::RegexLiteral => {
                let tok = self.advance();
                let (pattern, _flags) = parse_regex_lexeme(&tok.lexeme);
                Ok(Pattern::Regex(pattern))
            }
            TokenKind::IntLiteral => {
                let tok = self.advance();
                Ok(Pattern::Literal(Literal::Int(tok.lexeme.parse().unwrap_or(0))))
            }
            TokenKind::FloatLiteral => {
                let tok = self.advance();
                Ok(Pattern::Literal(Literal::Float(tok.lexeme.parse().unwrap_or(0.0))))
            }
            TokenKind::True => {
                self.advance();
                Ok(Pattern::Literal(Literal::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Pattern::Literal(Literal::Bool(false)))
            }
            TokenKind::Null | TokenKind::Nil => {
                self.advance();
                Ok(Pattern::Literal(Literal::Null))
            }
            TokenKind::StringSegment => {
                let (parts, span) = self.parse_string_assembly()?;
                match parts.as_slice() {
                    [StringPart::Literal(s)] => Ok(Pattern::Literal(Literal::String(s.clone()))),
                    _ => Err(ParseError::InvalidStatement {
                        message: "match patterns cannot interpolate".to_string(),
                        span,
                    }),
                }
            }
            TokenKind::Identifier if self.peek().lexeme == "_" => {
                self.advance();
                Ok(Pattern::Wildcard)
            }
            TokenKind::Identifier => Ok(Pattern::Variable(self.advance().lexeme)),
            _ => {
                let found = self.peek().clone();
                Err(ParseError::UnexpectedToken {
                    expected: "a match pattern".to_string(),
                    found: format!("{:?}", found.kind),
                    span: found.span,
                })
            }
        }
    }

    // === For-each ===

    fn parse_for_each(&mut self) -> Result<ForEachLoop, ParseError> {
        let start_span;
        let parallel = if self.check(TokenKind::Parallel) {
            start_span = self.advance().span;
            true
        } else {
            start_span = self.peek().span;
            false
        };
        self.expect(TokenKind::For, "'for'")?;
        self.expect(TokenKind::Each, "'each'")?;
        let item = self.expect_identifier("a loop item name")?.lexeme;
        let index = if self.check(TokenKind::At) {
            self.advance();
            Some(self.expect_identifier("a loop index name")?.lexeme)
        } else {
            None
        };
        self.expect(TokenKind::In, "'in'")?;
        let collection = Box::new(self.parse_expr(0)?);

        let concurrency = if self.check(TokenKind::With) {
            self.advance();
            self.expect(TokenKind::Lt, "'<' opening the concurrency clause")?;
            self.expect(TokenKind::Concurrency, "'concurrency'")?;
            self.expect(TokenKind::Colon, "':'")?;
            let n = self.expect(TokenKind::IntLiteral, "a concurrency bound")?;
            self.expect(TokenKind::Gt, "'>' closing the concurrency clause")?;
            Some(n.lexeme.parse().unwrap_or(0))
        } else {
            None
        };

        let where_clause = if self.check(TokenKind::Where) {
            self.advance();
            Some(Box::new(self.parse_expr(0)?))
        } else {
            None
        };

        self.expect(TokenKind::LBrace, "'{' opening the loop body")?;
        let body = self.parse_statements_until_rbrace();
        let rbrace = self.expect(TokenKind::RBrace, "'}' closing the loop body")?;

        Ok(ForEachLoop {
            parallel,
            item,
            index,
            collection,
            concurrency,
            where_clause,
            body,
            span: start_span.merge(&rbrace.span),
        })
    }

    // === Expressions (Pratt) ===

    /// Parses an expression, recursing while the next infix/postfix
    /// operator's left binding power is at least `min_bp`.
    pub fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix_expr()?;

        loop {
            if self.check(TokenKind::Dot) && self.peek2_starts_member_field() {
                if postfix_binding_power(TokenKind::Dot).unwrap() < min_bp {
                    break;
                }
                self.advance();
                let field_tok = self.expect_identifier("a field name")?;
                let span = lhs.span().merge(&field_tok.span);
                lhs = Expr::Member {
                    object: Box::new(lhs),
                    field: field_tok.lexeme,
                    span,
                };
                continue;
            }

            if self.check(TokenKind::LBracket) {
                self.advance();
                let index = self.parse_expr(0)?;
                let end = self.expect(TokenKind::RBracket, "']'")?;
                let span = lhs.span().merge(&end.span);
                lhs = Expr::Subscript {
                    object: Box::new(lhs),
                    index: Box::new(index),
                    span,
                };
                continue;
            }

            if self.check(TokenKind::As) {
                self.advance();
                let ty = self.parse_type_annotation()?;
                let end_span = self.tokens[self.pos - 1].span;
                let span = lhs.span().merge(&end_span);
                lhs = Expr::Cast {
                    expr: Box::new(lhs),
                    target_type: ty,
                    span,
                };
                continue;
            }

            if self.check(TokenKind::Exists) {
                let tok = self.advance();
                let span = lhs.span().merge(&tok.span);
                lhs = Expr::Exists(Box::new(lhs), span);
                continue;
            }

            if self.check(TokenKind::Is) && self.peek2_is_typecheck_predicate() {
                let is_tok = self.advance();
                let check_tok = self.advance();
                let span = lhs.span().merge(&is_tok.span).merge(&check_tok.span);
                lhs = Expr::TypeCheck {
                    expr: Box::new(lhs),
                    check: check_tok.lexeme,
                    span,
                };
                continue;
            }

            let kind = self.peek().kind;
            if matches!(kind, TokenKind::Lt | TokenKind::Gt) && self.peek2().kind == TokenKind::Identifier {
                // `<` / `>` opens a fresh variable reference, not a comparison.
                break;
            }

            let Some((l_bp, r_bp)) = infix_binding_power(kind) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            let op_tok = self.advance();
            let op = to_binary_op(op_tok.kind).expect("infix_binding_power implies to_binary_op");
            let rhs = self.parse_expr(r_bp)?;
            let span = lhs.span().merge(&rhs.span());
            lhs = Expr::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
                span,
            };
        }

        Ok(lhs)
    }

    fn peek2_starts_member_field(&self) -> bool {
        let tok = self.peek2();
        tok.kind == TokenKind::Identifier && tok.lexeme.chars().next().is_some_and(|c| c.is_lowercase())
    }

    fn peek2_is_typecheck_predicate(&self) -> bool {
        let tok = self.peek2();
        tok.kind == TokenKind::Defined || tok.kind == TokenKind::Empty || tok.kind == TokenKind::Identifier
    }

    fn parse_prefix_expr(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::IntLiteral => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(tok.lexeme.parse().unwrap_or(0)), tok.span))
            }
            TokenKind::FloatLiteral => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(tok.lexeme.parse().unwrap_or(0.0)), tok.span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true), tok.span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false), tok.span))
            }
            TokenKind::Null | TokenKind::Nil => {
                self.advance();
                Ok(Expr::Literal(Literal::Null, tok.span))
            }
            TokenKind::RegexLiteral => {
                self.advance();
                let (pattern, flags) = parse_regex_lexeme(&tok.lexeme);
                Ok(Expr::Literal(Literal::Regex { pattern, flags }, tok.span))
            }
            TokenKind::StringSegment => {
                let (parts, span) = self.parse_string_assembly()?;
                match parts.as_slice() {
                    [StringPart::Literal(s)] => Ok(Expr::Literal(Literal::String(s.clone()), span)),
                    _ => Ok(Expr::InterpolatedString(parts, span)),
                }
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_map_literal(),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr(0)?;
                let end = self.expect(TokenKind::RParen, "')'")?;
                Ok(Expr::Grouped(Box::new(inner), tok.span.merge(&end.span)))
            }
            TokenKind::Hyphen => {
                self.advance();
                let bp = prefix_binding_power(TokenKind::Hyphen).unwrap();
                let operand = self.parse_expr(bp)?;
                let span = tok.span.merge(&operand.span());
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                    span,
                })
            }
            TokenKind::Not => {
                self.advance();
                let bp = prefix_binding_power(TokenKind::Not).unwrap();
                let operand = self.parse_expr(bp)?;
                let span = tok.span.merge(&operand.span());
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                    span,
                })
            }
            TokenKind::Lt => self.parse_variable_ref(),
            _ => Err(ParseError::UnexpectedToken {
                expected: "an expression".to_string(),
                found: format!("{:?}('{}')", tok.kind, tok.lexeme),
                span: tok.span,
            }),
        }
    }

    fn parse_variable_ref(&mut self) -> Result<Expr, ParseError> {
        let lt = self.expect(TokenKind::Lt, "'<'")?;
        let base = self.expect_identifier("a variable name")?;
        let gt = self.expect(TokenKind::Gt, "'>'")?;
        Ok(Expr::Variable(base.lexeme, lt.span.merge(&gt.span)))
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let lbracket = self.expect(TokenKind::LBracket, "'['")?;
        let mut items = Vec::new();
        if !self.check(TokenKind::RBracket) {
            loop {
                items.push(self.parse_expr(0)?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        let rbracket = self.expect(TokenKind::RBracket, "']'")?;
        Ok(Expr::Array(items, lbracket.span.merge(&rbracket.span)))
    }

    fn parse_map_literal(&mut self) -> Result<Expr, ParseError> {
        let lbrace = self.expect(TokenKind::LBrace, "'{'")?;
        let mut pairs = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let key = self.parse_expr(0)?;
                self.expect(TokenKind::Colon, "':'")?;
                let value = self.parse_expr(0)?;
                pairs.push((key, value));
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        let rbrace = self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Expr::Map(pairs, lbrace.span.merge(&rbrace.span)))
    }

    /// Consumes a `stringSegment (interpolationStart tokens* interpolationEnd
    /// stringSegment)*` run, producing the assembled parts.
    fn parse_string_assembly(&mut self) -> Result<(Vec<StringPart>, Span), ParseError> {
        let first = self.expect(TokenKind::StringSegment, "a string literal")?;
        let mut span = first.span;
        let mut parts = vec![StringPart::Literal(first.lexeme)];

        while self.check(TokenKind::InterpolationStart) {
            let start = self.advance();
            span = span.merge(&start.span);
            let expr = self.parse_expr(0)?;
            span = span.merge(&expr.span());
            parts.push(StringPart::Expr(Box::new(expr)));
            let end = self.expect(TokenKind::InterpolationEnd, "'}' closing the interpolation")?;
            span = span.merge(&end.span);
            let seg = self.expect(TokenKind::StringSegment, "a string segment")?;
            span = span.merge(&seg.span);
            parts.push(StringPart::Literal(seg.lexeme));
        }

        Ok((parts, span))
    }
}

/// Parses a regex token's lexeme (`/pattern/flags`) into its pattern and
/// flags, accounting for escaped slashes inside the pattern.
fn parse_regex_lexeme(lexeme: &str) -> (String, String) {
    let body = &lexeme[1..];
    let mut depth_escaped = false;
    let mut split_at = body.len();
    for (i, ch) in body.char_indices() {
        if depth_escaped {
            depth_escaped = false;
            continue;
        }
        if ch == '\\' {
            depth_escaped = true;
            continue;
        }
        if ch == '/' {
            split_at = i;
            break;
        }
    }
    let pattern = body[..split_at].to_string();
    let flags = body[split_at + 1..].to_string();
    (pattern, flags)
}

/// True for any token kind whose lexeme reads as a plain word: identifiers
/// plus every reserved keyword/article/preposition. Used where business
/// vocabulary (action verbs, noun bases) may coincide with a reserved word.
fn token_is_word(kind: TokenKind) -> bool {
    use TokenKind::*;
    !matches!(
        kind,
        LParen
            | RParen
            | LBrace
            | RBrace
            | LBracket
            | RBracket
            | Lt
            | Gt
            | Colon
            | ColonColon
            | Dot
            | Hyphen
            | Comma
            | Semicolon
            | AtSign
            | Question
            | Arrow
            | FatArrow
            | Equal
            | Plus
            | Star
            | Slash
            | Percent
            | PlusPlus
            | EqEq
            | NotEq
            | LtEq
            | GtEq
            | StringLiteral
            | IntLiteral
            | FloatLiteral
            | RegexLiteral
            | StringSegment
            | InterpolationStart
            | InterpolationEnd
            | Eof
            | Error
    )
}

fn token_to_preposition(kind: TokenKind) -> Option<Preposition> {
    Some(match kind {
        TokenKind::From => Preposition::From,
        TokenKind::For => Preposition::For,
        TokenKind::Against => Preposition::Against,
        TokenKind::To => Preposition::To,
        TokenKind::Into => Preposition::Into,
        TokenKind::Via => Preposition::Via,
        TokenKind::With => Preposition::With,
        TokenKind::On => Preposition::On,
        TokenKind::At => Preposition::At,
        TokenKind::By => Preposition::By,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_aro_statement_parses() {
        let src = "(Greeter: Greeting) { <Extract> the <id> from the <request>. }";
        let (program, errors) = Parser::parse_source(src);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(program.feature_sets.len(), 1);
        let fs = &program.feature_sets[0];
        assert_eq!(fs.name, "Greeter");
        assert_eq!(fs.activity, "Greeting");
        assert_eq!(fs.statements.len(), 1);
        match &fs.statements[0] {
            Statement::Aro(aro) => {
                assert_eq!(aro.action.verb, "Extract");
                assert_eq!(aro.result.base, "id");
                assert_eq!(aro.object.preposition, Preposition::From);
            }
            other => panic!("expected Aro statement, got {other:?}"),
        }
    }

    #[test]
    fn precedence_multiplication_binds_tighter_than_addition() {
        let src = "(F: A) { <Log> <a> + <b> * <c> to <sink>. }";
        let (program, errors) = Parser::parse_source(src);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        let Statement::Aro(aro) = &program.feature_sets[0].statements[0] else {
            panic!("expected aro statement")
        };
        let ValueSource::Sink(expr) = &aro.value else {
            panic!("expected sink value")
        };
        match expr.as_ref() {
            Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => {
                assert!(matches!(right.as_ref(), Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("expected a+b*c to parse as a+(b*c), got {other:?}"),
        }
    }

    #[test]
    fn not_and_precedence() {
        let src = "(F: A) { <Log> not <x> and <y> to <sink>. }";
        let (program, errors) = Parser::parse_source(src);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        let Statement::Aro(aro) = &program.feature_sets[0].statements[0] else {
            panic!("expected aro statement")
        };
        let ValueSource::Sink(expr) = &aro.value else {
            panic!("expected sink value")
        };
        match expr.as_ref() {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                ..
            } => {
                assert!(matches!(
                    left.as_ref(),
                    Expr::Unary {
                        op: UnaryOp::Not,
                        ..
                    }
                ));
            }
            other => panic!("expected (not x) and y, got {other:?}"),
        }
    }

    #[test]
    fn match_otherwise_rejects_trailing_case() {
        let src = r#"
        (F: A) {
            match <x> {
                case 1 { <Log> <x> to <sink>. }
                otherwise { <Log> <x> to <sink>. }
                case 2 { <Log> <x> to <sink>. }
            }
        }
        "#;
        let (_program, errors) = Parser::parse_source(src);
        assert!(!errors.is_empty(), "expected a parse error after a trailing case");
    }

    #[test]
    fn sink_verb_abbreviated_form() {
        let src = r#"(F: A) { <Log> "hello ${name}" to <console>. }"#;
        let (program, errors) = Parser::parse_source(src);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        let Statement::Aro(aro) = &program.feature_sets[0].statements[0] else {
            panic!("expected aro statement")
        };
        assert!(matches!(aro.value, ValueSource::Sink(_)));
        assert_eq!(aro.result.base, EXPRESSION_SENTINEL);
    }

    #[test]
    fn qualified_noun_with_type_annotation() {
        let src = "(F: A) { <Extract> the <id: Integer> from the <request>. }";
        let (program, errors) = Parser::parse_source(src);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        let Statement::Aro(aro) = &program.feature_sets[0].statements[0] else {
            panic!("expected aro statement")
        };
        assert!(matches!(
            aro.result.annotation,
            Some(NounAnnotation::Type(TypeAnnotation::Primitive(PrimitiveType::Integer)))
        ));
    }

    #[test]
    fn where_clause_parses_comparison() {
        let src = "(F: A) { <Filter> the <rows> from the <orders> where amount > <threshold>. }";
        let (program, errors) = Parser::parse_source(src);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        let Statement::Aro(aro) = &program.feature_sets[0].statements[0] else {
            panic!("expected aro statement")
        };
        let where_clause = aro.query.where_clause.as_ref().expect("where clause");
        assert_eq!(where_clause.field, "amount");
        assert_eq!(where_clause.op, CompareOp::Gt);
    }

    #[test]
    fn for_each_loop_parses() {
        let src = "(F: A) { for each item at idx in <rows> { <Log> <item> to <console>. } }";
        let (program, errors) = Parser::parse_source(src);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        match &program.feature_sets[0].statements[0] {
            Statement::ForEach(loop_) => {
                assert_eq!(loop_.item, "item");
                assert_eq!(loop_.index.as_deref(), Some("idx"));
                assert!(!loop_.parallel);
            }
            other => panic!("expected for-each loop, got {other:?}"),
        }
    }

    #[test]
    fn publish_and_require_statements_parse() {
        let src = r#"
        (F: A) {
            Require <config> from framework.
            Publish as <ExternalName> <internal_name>.
        }
        "#;
        let (program, errors) = Parser::parse_source(src);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(program.feature_sets[0].statements.len(), 2);
    }

    #[test]
    fn malformed_statement_recovers_and_continues() {
        let src = r#"
        (F: A) {
            <Extract> the <id> from.
            <Log> <id> to <console>.
        }
        "#;
        let (program, errors) = Parser::parse_source(src);
        assert!(!errors.is_empty());
        assert_eq!(program.feature_sets[0].statements.len(), 1);
    }
}
