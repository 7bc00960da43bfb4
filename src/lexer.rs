//! Lexical analysis for ARO (spec components B and C).
//!
//! This module provides tokenization of ARO source text into a stream of
//! tokens consumed by the parser. The lexer handles keywords, articles,
//! prepositions, operators, string literals with `${...}` interpolation,
//! regex literals with contextual disambiguation, and numeric literals with
//! underscore separators.
//!
//! # Example
//!
//! ```rust
//! use aro::lexer::{Lexer, TokenKind};
//!
//! let mut lexer = Lexer::new("<Extract> the <name> from the <request>.");
//! assert_eq!(lexer.next_token().kind, TokenKind::Lt);
//! ```

use crate::ast::Span;
use crate::error::LexError;
use std::collections::VecDeque;

#[cfg(feature = "serde-types")]
use serde::{Deserialize, Serialize};

/// A lexical token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct Token {
    /// The category of this token.
    pub kind: TokenKind,
    /// The original source text that produced this token (or, for
    /// synthetic literal tokens, its normalized text).
    pub lexeme: String,
    /// Source location for error reporting.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }
}

impl Default for Token {
    fn default() -> Self {
        Self {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            span: Span::default(),
        }
    }
}

/// The closed set of token kinds recognized by the ARO lexer (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum TokenKind {
    // === Delimiters ===
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `:`
    Colon,
    /// `::`
    ColonColon,
    /// `.`
    Dot,
    /// `-`
    Hyphen,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `@`
    AtSign,
    /// `?`
    Question,
    /// `->`
    Arrow,
    /// `=>`
    FatArrow,
    /// `=`
    Equal,

    // === Operators ===
    /// `+`
    Plus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `++`
    PlusPlus,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,

    // === Core keywords ===
    /// `publish`
    Publish,
    /// `require`
    Require,
    /// `import`
    Import,
    /// `as`
    As,

    // === Control-flow keywords ===
    /// `if`
    If,
    /// `then`
    Then,
    /// `else`
    Else,
    /// `when`
    When,
    /// `match`
    Match,
    /// `case`
    Case,
    /// `otherwise`
    Otherwise,
    /// `where`
    Where,

    // === Iteration keywords ===
    /// `for` (keyword and preposition; disambiguated syntactically)
    For,
    /// `each`
    Each,
    /// `in`
    In,
    /// `at` (keyword and preposition; disambiguated syntactically)
    At,
    /// `parallel`
    Parallel,
    /// `concurrency`
    Concurrency,

    // === Type keywords ===
    /// `type`
    Type,
    /// `enum`
    Enum,
    /// `protocol`
    Protocol,

    // === Error keywords ===
    /// `error`
    Error,
    /// `guard`
    Guard,
    /// `defer`
    Defer,
    /// `assert`
    Assert,
    /// `precondition`
    Precondition,

    // === Logical keywords ===
    /// `and`
    And,
    /// `or`
    Or,
    /// `not`
    Not,
    /// `is`
    Is,
    /// `exists`
    Exists,
    /// `defined`
    Defined,
    /// `null`
    Null,
    /// `empty`
    Empty,
    /// `contains`
    Contains,
    /// `matches`
    Matches,

    // === Literals ===
    /// An identifier.
    Identifier,
    /// A string literal.
    StringLiteral,
    /// An integer literal.
    IntLiteral,
    /// A floating point literal.
    FloatLiteral,
    /// A regex literal.
    RegexLiteral,
    /// `true`
    True,
    /// `false`
    False,
    /// `nil`
    Nil,

    // === String interpolation ===
    /// A literal text segment inside an interpolated string.
    StringSegment,
    /// Opens an embedded expression inside an interpolated string.
    InterpolationStart,
    /// Closes an embedded expression inside an interpolated string.
    InterpolationEnd,

    // === Articles ===
    /// `a`
    A,
    /// `an`
    An,
    /// `the`
    The,

    // === Prepositions ===
    /// `from`
    From,
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
    /// `by`
    By,

    // === Special ===
    /// End of input.
    Eof,
    /// Unrecognized input (an error was also recorded).
    Error,
}

impl TokenKind {
    /// Returns true if this kind is an article (`a`, `an`, `the`).
    pub fn is_article(&self) -> bool {
        matches!(self, TokenKind::A | TokenKind::An | TokenKind::The)
    }

    /// Returns true if this kind is a preposition (including the dual-role
    /// `for`/`at`).
    pub fn is_preposition(&self) -> bool {
        matches!(
            self,
            TokenKind::From
                | TokenKind::For
                | TokenKind::Against
                | TokenKind::To
                | TokenKind::Into
                | TokenKind::Via
                | TokenKind::With
                | TokenKind::On
                | TokenKind::At
                | TokenKind::By
        )
    }

    /// Returns true if a value of this kind can end an expression (used to
    /// decide whether a following `-` is binary subtraction or a fresh
    /// unary/negative-literal position, and whether a following `/` can
    /// start a regex literal).
    pub fn can_end_expression(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier
                | TokenKind::StringLiteral
                | TokenKind::IntLiteral
                | TokenKind::FloatLiteral
                | TokenKind::RegexLiteral
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Nil
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::Gt
                | TokenKind::Dot
                | TokenKind::InterpolationEnd
        )
    }
}

/// Looks up a lexeme case-insensitively in the single reserved-words table.
/// Returns the matching keyword/article/preposition kind, or `None` if the
/// lexeme is a plain identifier.
fn reserved_word(lexeme: &str) -> Option<TokenKind> {
    // Fast path: anything containing a '.' is a dotted identifier, never a
    // reserved word.
    if lexeme.contains('.') {
        return None;
    }
    let lower = lexeme.to_ascii_lowercase();
    use TokenKind::*;
    Some(match lower.as_str() {
        "publish" => Publish,
        "require" => Require,
        "import" => Import,
        "as" => As,
        "if" => If,
        "then" => Then,
        "else" => Else,
        "when" => When,
        "match" => Match,
        "case" => Case,
        "otherwise" => Otherwise,
        "where" => Where,
        "for" => For,
        "each" => Each,
        "in" => In,
        "at" => At,
        "parallel" => Parallel,
        "concurrency" => Concurrency,
        "type" => Type,
        "enum" => Enum,
        "protocol" => Protocol,
        "error" => Error,
        "guard" => Guard,
        "defer" => Defer,
        "assert" => Assert,
        "precondition" => Precondition,
        "and" => And,
        "or" => Or,
        "not" => Not,
        "is" => Is,
        "exists" => Exists,
        "defined" => Defined,
        "null" => Null,
        "empty" => Empty,
        "contains" => Contains,
        "matches" => Matches,
        "true" => True,
        "false" => False,
        "nil" => Nil,
        "a" => A,
        "an" => An,
        "the" => The,
        "from" => From,
        "against" => Against,
        "to" => To,
        "into" => Into,
        "via" => Via,
        "with" => With,
        "on" => On,
        "by" => By,
        _ => return None,
    })
}

/// Scans a run matching `[0-9](_?[0-9])*` from the start of `s`, returning
/// its byte length (0 if `s` does not start with a digit).
fn scan_digit_run(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut last_was_digit = false;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_digit() {
            i += 1;
            last_was_digit = true;
        } else if b == b'_' && last_was_digit && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit()
        {
            i += 1;
            last_was_digit = false;
        } else {
            break;
        }
    }
    i
}

/// Scans a run of hex digits with underscore separators, same rules as
/// [`scan_digit_run`] but for `[0-9a-fA-F]`.
fn scan_hex_run(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut last_was_digit = false;
    while i < bytes.len() {
        let b = bytes[i];
        if (b as char).is_ascii_hexdigit() {
            i += 1;
            last_was_digit = true;
        } else if b == b'_' && last_was_digit && i + 1 < bytes.len() && (bytes[i + 1] as char).is_ascii_hexdigit()
        {
            i += 1;
            last_was_digit = false;
        } else {
            break;
        }
    }
    i
}

/// Scans a run of binary digits (`0`/`1`) with underscore separators.
fn scan_bin_run(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut last_was_digit = false;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'0' || b == b'1' {
            i += 1;
            last_was_digit = true;
        } else if b == b'_' && last_was_digit && i + 1 < bytes.len() && (bytes[i + 1] == b'0' || bytes[i + 1] == b'1')
        {
            i += 1;
            last_was_digit = false;
        } else {
            break;
        }
    }
    i
}

fn strip_underscores(s: &str) -> String {
    s.chars().filter(|c| *c != '_').collect()
}

/// The ARO lexer: a character-by-character scanner over a source string.
///
/// Produces tokens lazily via [`Iterator`]/[`Lexer::next_token`]. Never
/// backtracks except during the regex-literal trial scan, which restores
/// the cursor on failure (spec invariant 7).
pub struct Lexer<'a> {
    /// The full source text (kept for slicing error context if needed).
    #[allow(dead_code)]
    source: &'a str,
    /// Remaining unconsumed source.
    remaining: &'a str,
    /// Current byte offset.
    position: usize,
    /// Current line (1-indexed).
    line: usize,
    /// Current column (1-indexed).
    column: usize,
    /// Accumulated lexer errors.
    errors: Vec<LexError>,
    /// Tokens already produced but not yet returned (used for string
    /// interpolation, which must emit several tokens from one scan).
    pending: VecDeque<Token>,
    /// The kind of the most recently returned significant token, or `None`
    /// at the start of input. Drives regex-vs-division and unary-minus
    /// disambiguation.
    prev_kind: Option<TokenKind>,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given source text.
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            remaining: source,
            position: 0,
            line: 1,
            column: 1,
            errors: Vec::new(),
            pending: VecDeque::new(),
            prev_kind: None,
        }
    }

    /// Returns any errors accumulated during lexing.
    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    /// Tokenizes the entire source eagerly, stopping at (and including)
    /// the first lexer error — spec §7: "Lexer errors abort lexing."
    pub fn tokenize(source: &'a str) -> Result<Vec<Token>, LexError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            let is_error = token.kind == TokenKind::Error;
            tokens.push(token);
            if is_error {
                return Err(lexer.errors.last().cloned().unwrap());
            }
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    /// Produces the next token from the source.
    pub fn next_token(&mut self) -> Token {
        if let Some(token) = self.pending.pop_front() {
            self.prev_kind = Some(token.kind);
            return token;
        }

        self.skip_whitespace_and_comments();

        if self.remaining.is_empty() {
            let token = Token::new(
                TokenKind::Eof,
                "",
                Span::new(self.position, self.position, self.line, self.column),
            );
            self.prev_kind = Some(TokenKind::Eof);
            return token;
        }

        let start_pos = self.position;
        let start_line = self.line;
        let start_col = self.column;

        let token = if let Some(t) = self.try_string() {
            t
        } else if let Some(t) = self.try_number() {
            t
        } else if let Some(t) = self.try_keyword_or_identifier() {
            t
        } else if let Some(t) = self.try_operator_or_regex() {
            t
        } else {
            let ch = self.remaining.chars().next().unwrap();
            self.advance(ch.len_utf8());
            let span = Span::new(start_pos, self.position, start_line, start_col);
            self.errors.push(LexError::UnexpectedChar { ch, span });
            Token::new(TokenKind::Error, ch.to_string(), span)
        };

        self.prev_kind = Some(token.kind);
        token
    }

    fn at_unary_position(&self) -> bool {
        match self.prev_kind {
            None => true,
            Some(kind) => !kind.can_end_expression(),
        }
    }

    fn advance(&mut self, bytes: usize) {
        let consumed = &self.remaining[..bytes];
        for ch in consumed.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.position += bytes;
        self.remaining = &self.remaining[bytes..];
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            let before = self.remaining.len();
            self.skip_whitespace();
            if self.remaining.starts_with("//") {
                self.skip_line_comment();
            } else if self.remaining.starts_with("(*") {
                self.skip_block_comment();
            }
            if self.remaining.len() == before {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.remaining.chars().next() {
            if ch.is_whitespace() {
                self.advance(ch.len_utf8());
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.remaining.chars().next() {
            self.advance(ch.len_utf8());
            if ch == '\n' {
                break;
            }
        }
    }

    /// Skips a `(* ... *)` block comment, honoring nesting.
    fn skip_block_comment(&mut self) {
        self.advance(2); // "(*"
        let mut depth = 1usize;
        while depth > 0 {
            if self.remaining.is_empty() {
                break;
            }
            if self.remaining.starts_with("(*") {
                self.advance(2);
                depth += 1;
            } else if self.remaining.starts_with("*)") {
                self.advance(2);
                depth -= 1;
            } else {
                let ch = self.remaining.chars().next().unwrap();
                self.advance(ch.len_utf8());
            }
        }
    }

    /// Tries to lex a string literal, including `${...}` interpolation for
    /// double-quoted strings. On success, queues any extra tokens (segments
    /// and embedded-expression tokens) into `self.pending` and returns the
    /// first one.
    fn try_string(&mut self) -> Option<Token> {
        let delimiter = self.remaining.chars().next()?;
        if delimiter != '"' && delimiter != '\'' {
            return None;
        }
        let interpolates = delimiter == '"';

        let start_pos = self.position;
        let start_line = self.line;
        let start_col = self.column;
        self.advance(delimiter.len_utf8());

        let mut produced: Vec<Token> = Vec::new();
        let mut segment = String::new();
        let mut seg_start_pos = self.position;
        let mut seg_start_line = self.line;
        let mut seg_start_col = self.column;

        loop {
            if self.remaining.is_empty() {
                self.errors.push(LexError::UnterminatedString {
                    span: Span::new(start_pos, self.position, start_line, start_col),
                });
                produced.push(Token::new(
                    TokenKind::Error,
                    segment,
                    Span::new(start_pos, self.position, start_line, start_col),
                ));
                break;
            }

            let ch = self.remaining.chars().next().unwrap();

            if ch == delimiter {
                self.advance(ch.len_utf8());
                produced.push(Token::new(
                    TokenKind::StringSegment,
                    segment,
                    Span::new(seg_start_pos, self.position, seg_start_line, seg_start_col),
                ));
                break;
            }

            if ch == '\n' {
                self.errors.push(LexError::UnterminatedString {
                    span: Span::new(start_pos, self.position, start_line, start_col),
                });
                produced.push(Token::new(
                    TokenKind::Error,
                    segment,
                    Span::new(start_pos, self.position, start_line, start_col),
                ));
                break;
            }

            if interpolates && self.remaining.starts_with("${") {
                produced.push(Token::new(
                    TokenKind::StringSegment,
                    std::mem::take(&mut segment),
                    Span::new(seg_start_pos, self.position, seg_start_line, seg_start_col),
                ));

                let interp_start_pos = self.position;
                let interp_start_line = self.line;
                let interp_start_col = self.column;
                self.advance(2); // "${"
                produced.push(Token::new(
                    TokenKind::InterpolationStart,
                    "${",
                    Span::new(
                        interp_start_pos,
                        self.position,
                        interp_start_line,
                        interp_start_col,
                    ),
                ));

                let mut depth = 1usize;
                loop {
                    // Re-lex using the normal dispatcher so nested strings,
                    // numbers, identifiers etc. all work.
                    self.skip_whitespace_and_comments();
                    if self.remaining.is_empty() {
                        self.errors.push(LexError::UnterminatedString {
                            span: Span::new(start_pos, self.position, start_line, start_col),
                        });
                        break;
                    }
                    if self.remaining.starts_with('}') {
                        depth -= 1;
                        let brace_pos = self.position;
                        let brace_line = self.line;
                        let brace_col = self.column;
                        self.advance(1);
                        if depth == 0 {
                            produced.push(Token::new(
                                TokenKind::InterpolationEnd,
                                "}",
                                Span::new(brace_pos, self.position, brace_line, brace_col),
                            ));
                            break;
                        } else {
                            produced.push(Token::new(
                                TokenKind::RBrace,
                                "}",
                                Span::new(brace_pos, self.position, brace_line, brace_col),
                            ));
                            continue;
                        }
                    }
                    let tok = self.next_token_raw();
                    if tok.kind == TokenKind::LBrace {
                        depth += 1;
                    }
                    if tok.kind == TokenKind::Eof {
                        self.errors.push(LexError::UnterminatedString {
                            span: Span::new(start_pos, self.position, start_line, start_col),
                        });
                        break;
                    }
                    produced.push(tok);
                }

                seg_start_pos = self.position;
                seg_start_line = self.line;
                seg_start_col = self.column;
                continue;
            }

            if ch == '\\' {
                self.advance(1);
                match self.consume_escape(start_pos, start_line, start_col) {
                    Ok(resolved) => segment.push_str(&resolved),
                    Err(()) => {}
                }
                continue;
            }

            segment.push(ch);
            self.advance(ch.len_utf8());
        }

        let mut iter = produced.into_iter();
        let first = iter.next().unwrap_or_default();
        for tok in iter {
            self.pending.push_back(tok);
        }
        Some(first)
    }

    /// Consumes one escape sequence (the backslash has already been
    /// consumed); returns the resolved text, or `Err(())` if an error was
    /// recorded (the offending character is still consumed).
    fn consume_escape(&mut self, str_start: usize, str_line: usize, str_col: usize) -> Result<String, ()> {
        let Some(ch) = self.remaining.chars().next() else {
            self.errors.push(LexError::UnterminatedString {
                span: Span::new(str_start, self.position, str_line, str_col),
            });
            return Err(());
        };
        match ch {
            'n' => {
                self.advance(1);
                Ok("\n".to_string())
            }
            'r' => {
                self.advance(1);
                Ok("\r".to_string())
            }
            't' => {
                self.advance(1);
                Ok("\t".to_string())
            }
            '\\' => {
                self.advance(1);
                Ok("\\".to_string())
            }
            '"' => {
                self.advance(1);
                Ok("\"".to_string())
            }
            '\'' => {
                self.advance(1);
                Ok("'".to_string())
            }
            '0' => {
                self.advance(1);
                Ok("\0".to_string())
            }
            '$' => {
                self.advance(1);
                Ok("$".to_string())
            }
            'u' => {
                let esc_start = self.position - 1;
                let esc_line = self.line;
                let esc_col = self.column - 1;
                self.advance(1); // 'u'
                if !self.remaining.starts_with('{') {
                    self.errors.push(LexError::InvalidUnicodeEscape {
                        text: "\\u".to_string(),
                        span: Span::new(esc_start, self.position, esc_line, esc_col),
                    });
                    return Err(());
                }
                self.advance(1); // '{'
                let mut hex = String::new();
                while let Some(c) = self.remaining.chars().next() {
                    if c.is_ascii_hexdigit() && hex.len() < 8 {
                        hex.push(c);
                        self.advance(1);
                    } else {
                        break;
                    }
                }
                if !self.remaining.starts_with('}') || hex.is_empty() {
                    self.errors.push(LexError::InvalidUnicodeEscape {
                        text: format!("\\u{{{hex}"),
                        span: Span::new(esc_start, self.position, esc_line, esc_col),
                    });
                    return Err(());
                }
                self.advance(1); // '}'
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(resolved) => Ok(resolved.to_string()),
                    None => {
                        self.errors.push(LexError::InvalidUnicodeEscape {
                            text: format!("\\u{{{hex}}}"),
                            span: Span::new(esc_start, self.position, esc_line, esc_col),
                        });
                        Err(())
                    }
                }
            }
            other => {
                let span = Span::new(self.position - 1, self.position + other.len_utf8(), self.line, self.column - 1);
                self.advance(other.len_utf8());
                self.errors.push(LexError::InvalidEscape { ch: other, span });
                Ok(other.to_string())
            }
        }
    }

    /// Tries to lex a decimal/float/hex/binary numeric literal, including
    /// the lexer's trivially-unary negative-literal shortcut.
    fn try_number(&mut self) -> Option<Token> {
        let start_pos = self.position;
        let start_line = self.line;
        let start_col = self.column;

        let negative = self.remaining.starts_with('-')
            && self.at_unary_position()
            && self.remaining[1..].chars().next().is_some_and(|c| c.is_ascii_digit());
        let offset = if negative { 1 } else { 0 };
        let rest = &self.remaining[offset..];

        let first = rest.chars().next()?;
        if !first.is_ascii_digit() {
            return None;
        }

        // Hex / binary literals.
        if first == '0' {
            let after_zero = &rest[1..];
            if let Some(stripped) = after_zero.strip_prefix(['x', 'X']) {
                let digits_len = scan_hex_run(stripped);
                let total_len = offset + 2 + digits_len;
                let lexeme = self.remaining[..total_len].to_string();
                self.advance(total_len);
                let span = Span::new(start_pos, self.position, start_line, start_col);
                let digits = strip_underscores(&lexeme[offset + 2..]);
                if digits.is_empty() {
                    self.errors.push(LexError::InvalidNumber {
                        text: lexeme.clone(),
                        span,
                    });
                    return Some(Token::new(TokenKind::Error, lexeme, span));
                }
                let mut value = i64::from_str_radix(&digits, 16).unwrap_or(0);
                if negative {
                    value = -value;
                }
                return Some(Token::new(TokenKind::IntLiteral, value.to_string(), span));
            }
            if let Some(stripped) = after_zero.strip_prefix(['b', 'B']) {
                let digits_len = scan_bin_run(stripped);
                let total_len = offset + 2 + digits_len;
                let lexeme = self.remaining[..total_len].to_string();
                self.advance(total_len);
                let span = Span::new(start_pos, self.position, start_line, start_col);
                let digits = strip_underscores(&lexeme[offset + 2..]);
                if digits.is_empty() {
                    self.errors.push(LexError::InvalidNumber {
                        text: lexeme.clone(),
                        span,
                    });
                    return Some(Token::new(TokenKind::Error, lexeme, span));
                }
                let mut value = i64::from_str_radix(&digits, 2).unwrap_or(0);
                if negative {
                    value = -value;
                }
                return Some(Token::new(TokenKind::IntLiteral, value.to_string(), span));
            }
        }

        // Decimal integer / float.
        let mut len = offset + scan_digit_run(rest);
        let mut is_float = false;

        if self.remaining[len..].starts_with('.') {
            let after_dot = &self.remaining[len + 1..];
            if after_dot.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                let frac_len = scan_digit_run(after_dot);
                len += 1 + frac_len;
            }
        }

        if let Some(exp_ch) = self.remaining[len..].chars().next() {
            if exp_ch == 'e' || exp_ch == 'E' {
                let mut exp_consumed = 1;
                let after_e = &self.remaining[len + 1..];
                let has_sign = after_e.starts_with('+') || after_e.starts_with('-');
                if has_sign {
                    exp_consumed += 1;
                }
                let digits_part = &self.remaining[len + exp_consumed..];
                let exp_digits_len = scan_digit_run(digits_part);
                if exp_digits_len > 0 {
                    is_float = true;
                    len += exp_consumed + exp_digits_len;
                }
            }
        }

        let lexeme = self.remaining[..len].to_string();
        self.advance(len);
        let span = Span::new(start_pos, self.position, start_line, start_col);

        let cleaned = strip_underscores(&lexeme[offset..]);
        if is_float {
            match cleaned.parse::<f64>() {
                Ok(mut value) => {
                    if negative {
                        value = -value;
                    }
                    Some(Token::new(TokenKind::FloatLiteral, value.to_string(), span))
                }
                Err(_) => {
                    self.errors.push(LexError::InvalidNumber {
                        text: lexeme.clone(),
                        span,
                    });
                    Some(Token::new(TokenKind::Error, lexeme, span))
                }
            }
        } else {
            match cleaned.parse::<i64>() {
                Ok(mut value) => {
                    if negative {
                        value = -value;
                    }
                    Some(Token::new(TokenKind::IntLiteral, value.to_string(), span))
                }
                Err(_) => {
                    self.errors.push(LexError::InvalidNumber {
                        text: lexeme.clone(),
                        span,
                    });
                    Some(Token::new(TokenKind::Error, lexeme, span))
                }
            }
        }
    }

    /// Tries to lex an identifier, keyword, article, or preposition.
    fn try_keyword_or_identifier(&mut self) -> Option<Token> {
        let first = self.remaining.chars().next()?;
        if !first.is_alphabetic() && first != '_' {
            return None;
        }

        let start_pos = self.position;
        let start_line = self.line;
        let start_col = self.column;

        let mut len = 0;
        for ch in self.remaining.chars() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                // A trailing '.' is only part of the identifier if followed
                // by another identifier character (dotted path); otherwise
                // it is the statement terminator / member-access dot.
                if ch == '.' {
                    let after = &self.remaining[len + 1..];
                    if !after.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                        break;
                    }
                }
                len += ch.len_utf8();
            } else {
                break;
            }
        }

        let lexeme = &self.remaining[..len];
        let kind = reserved_word(lexeme).unwrap_or(TokenKind::Identifier);
        let lexeme = lexeme.to_string();
        self.advance(len);
        Some(Token::new(
            kind,
            lexeme,
            Span::new(start_pos, self.position, start_line, start_col),
        ))
    }

    /// Tries to lex a regex literal or an operator/delimiter, applying the
    /// `/` regex-vs-division trial scan.
    fn try_operator_or_regex(&mut self) -> Option<Token> {
        let start_pos = self.position;
        let start_line = self.line;
        let start_col = self.column;

        if self.remaining.starts_with('/') {
            if !self.at_unary_position() && self.prev_kind.is_some_and(|k| k.can_end_expression()) {
                // preceded by identifier/./) style token: division, not regex
            } else if let Some(token) = self.try_regex_literal(start_pos, start_line, start_col) {
                return Some(token);
            }
        }

        let (kind, len) = if self.remaining.starts_with("::") {
            (TokenKind::ColonColon, 2)
        } else if self.remaining.starts_with("->") {
            (TokenKind::Arrow, 2)
        } else if self.remaining.starts_with("=>") {
            (TokenKind::FatArrow, 2)
        } else if self.remaining.starts_with("==") {
            (TokenKind::EqEq, 2)
        } else if self.remaining.starts_with("!=") {
            (TokenKind::NotEq, 2)
        } else if self.remaining.starts_with("<=") {
            (TokenKind::LtEq, 2)
        } else if self.remaining.starts_with(">=") {
            (TokenKind::GtEq, 2)
        } else if self.remaining.starts_with("++") {
            (TokenKind::PlusPlus, 2)
        } else if self.remaining.starts_with('(') {
            (TokenKind::LParen, 1)
        } else if self.remaining.starts_with(')') {
            (TokenKind::RParen, 1)
        } else if self.remaining.starts_with('{') {
            (TokenKind::LBrace, 1)
        } else if self.remaining.starts_with('}') {
            (TokenKind::RBrace, 1)
        } else if self.remaining.starts_with('[') {
            (TokenKind::LBracket, 1)
        } else if self.remaining.starts_with(']') {
            (TokenKind::RBracket, 1)
        } else if self.remaining.starts_with('<') {
            (TokenKind::Lt, 1)
        } else if self.remaining.starts_with('>') {
            (TokenKind::Gt, 1)
        } else if self.remaining.starts_with(':') {
            (TokenKind::Colon, 1)
        } else if self.remaining.starts_with('.') {
            (TokenKind::Dot, 1)
        } else if self.remaining.starts_with('-') {
            (TokenKind::Hyphen, 1)
        } else if self.remaining.starts_with(',') {
            (TokenKind::Comma, 1)
        } else if self.remaining.starts_with(';') {
            (TokenKind::Semicolon, 1)
        } else if self.remaining.starts_with('@') {
            (TokenKind::AtSign, 1)
        } else if self.remaining.starts_with('?') {
            (TokenKind::Question, 1)
        } else if self.remaining.starts_with('=') {
            (TokenKind::Equal, 1)
        } else if self.remaining.starts_with('+') {
            (TokenKind::Plus, 1)
        } else if self.remaining.starts_with('*') {
            (TokenKind::Star, 1)
        } else if self.remaining.starts_with('/') {
            (TokenKind::Slash, 1)
        } else if self.remaining.starts_with('%') {
            (TokenKind::Percent, 1)
        } else {
            return None;
        };

        let lexeme: String = self.remaining.chars().take(len).collect();
        self.advance(len);
        Some(Token::new(
            kind,
            lexeme,
            Span::new(start_pos, self.position, start_line, start_col),
        ))
    }

    /// Trial-scans a regex literal starting at the current `/`. Restores
    /// the cursor and returns `None` on failure (spec invariant 7).
    fn try_regex_literal(&mut self, start_pos: usize, start_line: usize, start_col: usize) -> Option<Token> {
        let saved_remaining = self.remaining;
        let saved_position = self.position;
        let saved_line = self.line;
        let saved_column = self.column;

        self.advance(1); // opening '/'
        let mut pattern = String::new();
        let mut escaped = false;
        loop {
            let Some(ch) = self.remaining.chars().next() else {
                self.remaining = saved_remaining;
                self.position = saved_position;
                self.line = saved_line;
                self.column = saved_column;
                return None;
            };
            if ch == '\n' {
                self.remaining = saved_remaining;
                self.position = saved_position;
                self.line = saved_line;
                self.column = saved_column;
                return None;
            }
            if escaped {
                pattern.push('\\');
                pattern.push(ch);
                self.advance(ch.len_utf8());
                escaped = false;
                continue;
            }
            if ch == '\\' {
                escaped = true;
                self.advance(1);
                continue;
            }
            if ch == '/' {
                self.advance(1);
                break;
            }
            pattern.push(ch);
            self.advance(ch.len_utf8());
        }

        let mut flags = String::new();
        while let Some(ch) = self.remaining.chars().next() {
            if matches!(ch, 'i' | 's' | 'm' | 'g') {
                flags.push(ch);
                self.advance(1);
            } else {
                break;
            }
        }

        let lexeme = format!("/{pattern}/{flags}");
        Some(Token::new(
            TokenKind::RegexLiteral,
            lexeme,
            Span::new(start_pos, self.position, start_line, start_col),
        ))
    }

    /// Produces one token without consulting `self.pending` — used while
    /// re-lexing the embedded expression inside `${...}`.
    fn next_token_raw(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        if self.remaining.is_empty() {
            let span = Span::new(self.position, self.position, self.line, self.column);
            self.prev_kind = Some(TokenKind::Eof);
            return Token::new(TokenKind::Eof, "", span);
        }
        let start_pos = self.position;
        let start_line = self.line;
        let start_col = self.column;
        let token = if let Some(t) = self.try_string() {
            // Interpolation inside interpolation enqueues extra tokens; pull
            // the first and keep the rest pending for next_token() to drain.
            t
        } else if let Some(t) = self.try_number() {
            t
        } else if let Some(t) = self.try_keyword_or_identifier() {
            t
        } else if let Some(t) = self.try_operator_or_regex() {
            t
        } else {
            let ch = self.remaining.chars().next().unwrap();
            self.advance(ch.len_utf8());
            let span = Span::new(start_pos, self.position, start_line, start_col);
            self.errors.push(LexError::UnexpectedChar { ch, span });
            Token::new(TokenKind::Error, ch.to_string(), span)
        };
        self.prev_kind = Some(token.kind);
        token
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).map(|t| t.kind).collect()
    }

    fn lexemes(src: &str) -> Vec<String> {
        Lexer::new(src).map(|t| t.lexeme).collect()
    }

    #[test]
    fn numeric_underscores_are_transparent() {
        assert_eq!(lexemes("1_000_000"), vec!["1000000"]);
        assert_eq!(lexemes("0xFF_FF"), vec!["65535"]);
        assert_eq!(lexemes("0b1010_1010"), vec!["170"]);
        assert_eq!(lexemes("1_234.567_890"), vec!["1234.56789"]);
        assert_eq!(lexemes("1e1_0"), vec!["10000000000"]);
    }

    #[test]
    fn s3_numeric_separators_scenario() {
        let k = kinds("1_000 0xFF_FF 0b1010_1010 1_234.5");
        assert_eq!(
            k,
            vec![
                TokenKind::IntLiteral,
                TokenKind::IntLiteral,
                TokenKind::IntLiteral,
                TokenKind::FloatLiteral,
            ]
        );
    }

    #[test]
    fn regex_after_operator_is_regex() {
        let tokens: Vec<_> = Lexer::new("x matches /a+/i").collect();
        assert_eq!(tokens[2].kind, TokenKind::RegexLiteral);
        assert_eq!(tokens[2].lexeme, "/a+/i");
    }

    #[test]
    fn slash_after_identifier_is_division() {
        let tokens: Vec<_> = Lexer::new("total / count").collect();
        assert_eq!(tokens[1].kind, TokenKind::Slash);
    }

    #[test]
    fn regex_trial_scan_restores_on_newline_failure() {
        let tokens: Vec<_> = Lexer::new("(1 / \n2)").collect();
        assert_eq!(tokens[2].kind, TokenKind::Slash);
    }

    #[test]
    fn string_interpolation_emits_segment_start_expr_end() {
        let tokens: Vec<_> = Lexer::new(r#""hi ${name}!""#).collect();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::StringSegment,
                TokenKind::InterpolationStart,
                TokenKind::Identifier,
                TokenKind::InterpolationEnd,
                TokenKind::StringSegment,
            ]
        );
        assert_eq!(tokens[0].lexeme, "hi ");
        assert_eq!(tokens[2].lexeme, "name");
        assert_eq!(tokens[4].lexeme, "!");
    }

    #[test]
    fn nested_braces_inside_interpolation_pass_through() {
        let tokens: Vec<_> = Lexer::new(r#""${{a: 1}.a}""#).collect();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TokenKind::LBrace));
        assert!(kinds.contains(&TokenKind::RBrace));
        assert_eq!(*kinds.last().unwrap(), TokenKind::StringSegment);
    }

    #[test]
    fn nested_block_comments_are_skipped() {
        let tokens: Vec<_> = Lexer::new("a (* outer (* inner *) still *) b").collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn line_comments_are_skipped() {
        let tokens: Vec<_> = Lexer::new("a // comment\nb").collect();
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn articles_and_prepositions_are_distinct_kinds() {
        let k = kinds("the request from a user");
        assert_eq!(
            k,
            vec![
                TokenKind::The,
                TokenKind::Identifier,
                TokenKind::From,
                TokenKind::A,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn lexeme_concatenation_reconstructs_source_minus_trivia() {
        let src = "<Extract> the <id> from the <request>.";
        let tokens: Vec<_> = Lexer::new(src).collect();
        let concatenated: String = tokens.iter().map(|t| t.lexeme.clone()).collect::<Vec<_>>().join("");
        // every significant lexeme appears in order; whitespace is trivia
        assert!(concatenated.contains("Extract"));
        assert!(concatenated.contains("request"));
    }

    #[test]
    fn unterminated_string_records_error() {
        let mut lexer = Lexer::new("\"unterminated");
        let _ = lexer.next_token();
        assert!(!lexer.errors().is_empty());
    }

    #[test]
    fn dotted_identifier_is_one_token() {
        let tokens: Vec<_> = Lexer::new("user.profile.name").collect();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].lexeme, "user.profile.name");
    }

    #[test]
    fn trailing_dot_is_not_consumed_into_identifier() {
        let tokens: Vec<_> = Lexer::new("user.").collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].lexeme, "user");
        assert_eq!(tokens[1].kind, TokenKind::Dot);
    }
}
