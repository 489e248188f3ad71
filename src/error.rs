//! Error types shared by the compiler front end and the rewriting core.

use thiserror::Error;

/// The error type produced while turning source text into a [`Node`](crate::node::Node).
///
/// Every variant is terminal for the current compilation; multi-line
/// compilation wraps errors in [`CompileError::OnLine`] so callers can report
/// the offending source line.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    /// Malformed source: bracket/quote mismatches, illegal operator
    /// positions, unresolvable leaves, and similar.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The input was blank. Hard failure for single expressions, soft
    /// (line skipped) during document compilation.
    #[error("empty expression")]
    EmptyString,

    /// An attempt to redeclare a name that already has a syntax definition.
    #[error("'{0}' is already a defined keyword")]
    DuplicateKeyword(String),

    /// A `@`-prefixed literal that names no known type.
    #[error("'{0}' is not a valid type literal")]
    InvalidType(String),

    /// A constant literal that names no known constant.
    #[error("no such constant '{0}'")]
    NoSuchConstant(String),

    /// Rows of unequal length were supplied where a matrix was inferred.
    #[error("matrix rows must have equal length")]
    DimensionMismatch,

    /// Document compilation was aborted through a
    /// [`CancelToken`](crate::compiler::CancelToken).
    #[error("compilation cancelled")]
    Cancelled,

    /// An error attributed to a specific line of a multi-line document.
    #[error("error on line {line}: {source}")]
    OnLine {
        /// The 1-based line number the error was raised from.
        line: usize,
        /// The underlying error.
        source: Box<CompileError>,
    },
}

impl CompileError {
    /// Attributes `self` to the given 1-based `line`, unless it already
    /// carries a line number.
    pub fn on_line(self, line: usize) -> Self {
        match self {
            err @ CompileError::OnLine { .. } => err,
            err => CompileError::OnLine {
                line,
                source: Box::new(err),
            },
        }
    }
}

/// The error type produced while rewriting a tree.
///
/// "No rule matched" is *not* an error (the simplifier returns the
/// partially-simplified node instead); these arise only when an invoked
/// rule definition fails on arguments it declared itself applicable to.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// An operation received matrices or vectors of incompatible dimensions.
    #[error("dimension mismatch")]
    DimensionMismatch,

    /// A subscript fell outside the bounds of its operand.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// The offending index.
        index: i64,
        /// The length of the subscripted collection.
        len: usize,
    },

    /// A numeric rule was invoked on values outside its domain.
    #[error("math error: {0}")]
    Math(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_line_wraps_once() {
        let err = CompileError::Syntax("() mismatch".into()).on_line(3);
        assert_eq!(
            err,
            CompileError::OnLine {
                line: 3,
                source: Box::new(CompileError::Syntax("() mismatch".into()))
            }
        );

        // a second attribution keeps the original line
        let rewrapped = err.clone().on_line(7);
        assert_eq!(rewrapped, err);
    }

    #[test]
    fn display_includes_line() {
        let err = CompileError::EmptyString.on_line(12);
        assert_eq!(err.to_string(), "error on line 12: empty expression");
    }
}
