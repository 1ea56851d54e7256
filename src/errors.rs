// SPDX-License-Identifier: MIT

use crate::lexer::Source;

use core::fmt;

use thiserror::Error;

/// Error raised when rule text fails to lex or parse.
///
/// Carries the position of the failure; the `Display` implementation renders
/// the offending source line with a caret, the same format the lexer uses
/// for its own diagnostics.
#[derive(Clone)]
pub struct ParseError {
    source: Source,
    /// Line number, starting at 1.
    pub line: u32,
    /// Column number, starting at 1.
    pub col: u32,
    /// Bare description of the failure, without source context.
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(source: &Source, line: u32, col: u32, message: impl Into<String>) -> Self {
        Self {
            source: source.clone(),
            line,
            col,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(
            &self
                .source
                .message(self.line, self.col, "parse error", &self.message),
        )
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ParseError({}:{}:{}: {})",
            self.source.origin(),
            self.line,
            self.col,
            self.message
        )
    }
}

impl PartialEq for ParseError {
    fn eq(&self, other: &Self) -> bool {
        self.line == other.line && self.col == other.col && self.message == other.message
    }
}

impl Eq for ParseError {}

impl std::error::Error for ParseError {}

/// Errors raised while executing a compiled rule.
///
/// A rule that merely evaluates to a denying [`Authorization`] is not an
/// error; these are genuine failures, kept distinct from falsy results.
///
/// [`Authorization`]: crate::Authorization
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("unsupported operand type(s) for {op}: '{lhs}' and '{rhs}'")]
    UnsupportedBinary {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("unsupported operand type for {op}: '{operand}'")]
    UnsupportedUnary {
        op: &'static str,
        operand: &'static str,
    },

    #[error("'{lhs}' and '{rhs}' are not orderable")]
    NotOrderable {
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("argument of type '{container}' does not support membership tests")]
    NotAContainer { container: &'static str },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in {op}")]
    IntegerOverflow { op: &'static str },

    #[error("negative shift count")]
    NegativeShiftCount,

    #[error("object does not provide the '{capability}' capability")]
    MissingCapability { capability: &'static str },

    #[error("{builtin}: {message}")]
    Builtin {
        builtin: &'static str,
        message: String,
    },

    /// The evaluated program was unbalanced. The compiler guarantees stack
    /// balance, so hitting this indicates a compiler bug, not a rule bug.
    #[error("stack underflow; the evaluated program is unbalanced")]
    StackUnderflow,

    #[error("evaluation finished without producing an authorization")]
    NoAuthorization,

    #[error("rule nesting exceeded {limit} levels")]
    DepthLimitExceeded { limit: usize },

    #[error("evaluation exceeded the budget of {limit} instructions")]
    InstructionLimitExceeded { limit: usize },
}

impl EvaluationError {
    pub(crate) fn builtin(builtin: &'static str, message: impl Into<String>) -> Self {
        Self::Builtin {
            builtin,
            message: message.into(),
        }
    }
}

/// Any failure a [`Policy`](crate::Policy) evaluation can surface.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvaluationError),
}
