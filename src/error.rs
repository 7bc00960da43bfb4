//! Error types for ARO.
//!
//! This module defines the error taxonomies of spec §7: [`LexError`],
//! [`ParseError`], [`SemanticError`], and the streaming runtime's
//! [`StreamError`]. Each carries enough source-location information to
//! render a precise diagnostic.

use crate::ast::Span;
use thiserror::Error;

/// Errors that can occur during lexical analysis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    /// An unexpected character was encountered.
    #[error("unexpected character '{ch}' at line {}, column {}", span.line, span.column)]
    UnexpectedChar {
        /// The unexpected character.
        ch: char,
        /// Location in the source.
        span: Span,
    },

    /// A string literal was not properly terminated.
    #[error("unterminated string literal starting at line {}, column {}", span.line, span.column)]
    UnterminatedString {
        /// Location of the opening quote.
        span: Span,
    },

    /// An invalid escape sequence was found in a string.
    #[error("invalid escape sequence '\\{ch}' at line {}, column {}", span.line, span.column)]
    InvalidEscape {
        /// The character after the backslash.
        ch: char,
        /// Location of the escape sequence.
        span: Span,
    },

    /// A numeric literal was malformed (e.g. a stray underscore or a
    /// digitless exponent).
    #[error("invalid number '{text}' at line {}, column {}", span.line, span.column)]
    InvalidNumber {
        /// The offending text.
        text: String,
        /// Location in the source.
        span: Span,
    },

    /// A `\u{...}` escape used an invalid or out-of-range code point.
    #[error("invalid unicode escape '{text}' at line {}, column {}", span.line, span.column)]
    InvalidUnicodeEscape {
        /// The offending escape text.
        text: String,
        /// Location in the source.
        span: Span,
    },
}

/// Errors that can occur during parsing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// An unexpected token was encountered.
    #[error("expected {expected}, found {found} at line {}, column {}", span.line, span.column)]
    UnexpectedToken {
        /// Description of what was expected.
        expected: String,
        /// Description of what was found.
        found: String,
        /// Location of the unexpected token.
        span: Span,
    },

    /// Unexpected end of file.
    #[error("unexpected end of file at line {}, column {}: {context}", span.line, span.column)]
    UnexpectedEndOfFile {
        /// Context about what was being parsed.
        context: String,
        /// Location at end of file.
        span: Span,
    },

    /// A statement uses an invalid predicate or structure.
    #[error("{message} at line {}, column {}", span.line, span.column)]
    InvalidStatement {
        /// Description of the error.
        message: String,
        /// Location of the invalid statement.
        span: Span,
    },

    /// A feature set was missing its `(Name: Activity)` header name.
    #[error("missing feature set name at line {}, column {}", span.line, span.column)]
    MissingFeatureSetName {
        /// Location where the name was expected.
        span: Span,
    },

    /// A feature set was missing its business-activity label.
    #[error("missing business activity at line {}, column {}", span.line, span.column)]
    MissingBusinessActivity {
        /// Location where the activity label was expected.
        span: Span,
    },

    /// A qualified noun (`base [: annotation]`) was malformed.
    #[error("invalid qualified noun: {message} at line {}, column {}", span.line, span.column)]
    InvalidQualifiedNoun {
        /// Description of the error.
        message: String,
        /// Location of the invalid noun.
        span: Span,
    },

    /// A feature set body contained no statements.
    #[error("empty feature set '{name}' at line {}, column {}", span.line, span.column)]
    EmptyFeatureSet {
        /// The feature set's name.
        name: String,
        /// Location of the feature set.
        span: Span,
    },

    /// A lexer error occurred during parsing.
    #[error("lexer error: {0}")]
    LexerError(#[from] LexError),
}

/// Errors produced by the semantic analyzer (spec §4.G).
///
/// Semantic analysis never aborts on these — they are collected as
/// diagnostics alongside warnings, and the analyzer always returns an
/// `AnalyzedProgram`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    /// A variable was referenced without a dominating definition on every
    /// path reaching the use.
    #[error("undefined variable '{name}' at line {}, column {}", span.line, span.column)]
    UndefinedVariable {
        /// The undefined variable's name.
        name: String,
        /// Location of the reference.
        span: Span,
    },

    /// A non-`_`-prefixed variable was rebound by a non-rebinding verb.
    #[error(
        "'{name}' is already defined at line {}, column {} and cannot be rebound here (line {}, column {}); use Accept/Update/Modify/Change/Set to rebind",
        original.line, original.column, duplicate.line, duplicate.column
    )]
    DuplicateDefinition {
        /// The rebound variable's name.
        name: String,
        /// Where it was first defined.
        original: Span,
        /// Where the illegal rebinding occurred.
        duplicate: Span,
    },

    /// A dependency could not be resolved against the global registry or
    /// the known-external set.
    #[error("undefined external dependency '{name}' in feature set '{feature_set}'")]
    UndefinedExternalDependency {
        /// The unresolved name.
        name: String,
        /// The feature set that depends on it.
        feature_set: String,
    },

    /// A circular dependency was detected (e.g. an emitted-event cycle).
    #[error("circular dependency: {}", path.join(" -> "))]
    CircularDependency {
        /// The cycle, rendered as a chain of names.
        path: Vec<String>,
    },

    /// A `Publish` statement's internal name did not resolve.
    #[error("cannot publish undefined variable '{name}' at line {}, column {}", span.line, span.column)]
    InvalidPublish {
        /// The unresolved internal name.
        name: String,
        /// Location of the `Publish` statement.
        span: Span,
    },

    /// A type mismatch was detected by the coarse type lattice.
    #[error("type error: expected {expected}, found {found} at line {}, column {}", span.line, span.column)]
    TypeError {
        /// The expected type's textual name.
        expected: String,
        /// The found type's textual name.
        found: String,
        /// Location of the mismatch.
        span: Span,
    },
}

/// Errors propagated through a stream's fail channel (spec §7, final
/// paragraph). Once a stream fails, every downstream operator terminates
/// with the same error, and every teed consumer observes it exactly once.
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    /// A CSV/JSONL line exceeded the configured maximum length.
    #[error("line too long: {length} bytes exceeds limit of {limit}")]
    LineTooLong {
        /// The actual line length in bytes.
        length: usize,
        /// The configured limit.
        limit: usize,
    },

    /// `stream_from_json_array` was pointed at a JSON value that was not an
    /// array.
    #[error("expected a JSON array at the top level")]
    NotAnArray,

    /// A JSONL/JSON-array element was not a JSON object.
    #[error("element at index {index} was not a JSON object")]
    ElementNotObject {
        /// The offending element's index.
        index: usize,
    },

    /// A line failed to parse as JSON.
    #[error("malformed JSON at line {line}: {message}")]
    MalformedJson {
        /// The 1-based line number.
        line: usize,
        /// The underlying parse error message.
        message: String,
    },

    /// A tee operation referenced a consumer id that does not exist.
    #[error("invalid consumer id {0}")]
    InvalidConsumer(usize),

    /// A tee consumer fell behind the ring buffer's retention window.
    #[error("consumer {0} fell too far behind and was evicted")]
    ConsumerTooSlow(usize),

    /// An I/O error occurred, typically during spill/restore.
    #[error("I/O error: {0}")]
    Io(String),

    /// A spilled partition failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Io(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for StreamError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        StreamError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Serialization(err.to_string())
    }
}

impl PartialEq for StreamError {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_renders_location() {
        let err = LexError::UnexpectedChar {
            ch: '~',
            span: Span::new(3, 4, 2, 5),
        };
        assert!(err.to_string().contains("line 2, column 5"));
    }

    #[test]
    fn parse_error_wraps_lex_error() {
        let lex = LexError::UnterminatedString {
            span: Span::default(),
        };
        let parse: ParseError = lex.into();
        assert!(matches!(parse, ParseError::LexerError(_)));
    }

    #[test]
    fn duplicate_definition_mentions_both_spans() {
        let err = SemanticError::DuplicateDefinition {
            name: "x".into(),
            original: Span::new(0, 1, 1, 1),
            duplicate: Span::new(10, 11, 2, 1),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 1, column 1"));
        assert!(msg.contains("line 2, column 1"));
    }
}
