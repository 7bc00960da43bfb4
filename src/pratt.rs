//! Binding-power tables for the Pratt (precedence-climbing) expression
//! parser used by [`crate::parser`].
//!
//! Precedence, loosest to tightest: `or` < `and` < equality < comparison <
//! additive < multiplicative < unary < postfix (member access, subscript,
//! `is`/`as`/`exists`). Every binary operator here is left-associative, so
//! each level's pair is `(2L, 2L + 1)` — the right binding power is one
//! higher than the left, which is what makes `parse_expr` stop rather than
//! re-enter when it meets another operator at the same level.

use crate::ast::BinaryOp;
use crate::lexer::TokenKind;

/// Returns the `(left, right)` binding power of `kind` as an infix
/// operator, or `None` if `kind` cannot appear infix.
pub fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8)> {
    use TokenKind::*;
    let bp = match kind {
        Or => (1, 2),
        And => (3, 4),
        EqEq | NotEq => (5, 6),
        Lt | Gt | LtEq | GtEq => (7, 8),
        Plus | Hyphen => (9, 10),
        Star | Slash | Percent => (11, 12),
        Contains | Is => (7, 8),
        _ => return None,
    };
    Some(bp)
}

/// Returns the binding power of `kind` as a prefix operator, or `None` if
/// `kind` cannot start a prefix expression.
pub fn prefix_binding_power(kind: TokenKind) -> Option<u8> {
    match kind {
        TokenKind::Not | TokenKind::Hyphen => Some(13),
        _ => None,
    }
}

/// Returns the binding power of `kind` as a postfix/infix-tight operator
/// (member access, subscript, `is`, `as`, `exists`). These all bind tighter
/// than any arithmetic operator.
pub fn postfix_binding_power(kind: TokenKind) -> Option<u8> {
    match kind {
        TokenKind::Dot | TokenKind::LBracket | TokenKind::As => Some(15),
        _ => None,
    }
}

/// Maps an infix token kind to its AST [`BinaryOp`], if any.
pub fn to_binary_op(kind: TokenKind) -> Option<BinaryOp> {
    use TokenKind::*;
    Some(match kind {
        Or => BinaryOp::Or,
        And => BinaryOp::And,
        EqEq => BinaryOp::Eq,
        NotEq => BinaryOp::Ne,
        Lt => BinaryOp::Lt,
        Gt => BinaryOp::Gt,
        LtEq => BinaryOp::Le,
        GtEq => BinaryOp::Ge,
        Plus => BinaryOp::Add,
        Hyphen => BinaryOp::Sub,
        Star => BinaryOp::Mul,
        Slash => BinaryOp::Div,
        Percent => BinaryOp::Mod,
        Contains => BinaryOp::Contains,
        Is => BinaryOp::Is,
        _ => return None,
    })
}
