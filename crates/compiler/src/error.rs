//! Compiler error types.
//!
//! One enum covers the whole pipeline so every stage can propagate with
//! `?`. User-facing kinds (syntax, semantic, dead-code) print the way the
//! test harness expects; internal kinds (verification, backend limits)
//! indicate bugs or programs beyond the backend's limits and abort
//! compilation.

use std::fmt;

use crate::ir::VerifyError;

#[derive(Debug)]
pub enum CompileError {
    /// Malformed source; carries the position that stopped the parser.
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    /// A program that parses but is not a valid ChocoPy program.
    Semantic(String),
    /// Dead code reported by the warning pass.
    DeadCode(String),
    /// An IR invariant or operation predicate failed after a pass.
    Verify(VerifyError),
    /// A stack frame outgrew the 12-bit immediate range.
    BackendLimit(String),
    Io(std::io::Error),
}

impl CompileError {
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn semantic(message: impl Into<String>) -> CompileError {
        CompileError::Semantic(message.into())
    }

    /// Whether this is a diagnosable user error (as opposed to an
    /// internal failure).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CompileError::Syntax { .. } | CompileError::Semantic(_) | CompileError::DeadCode(_)
        )
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Syntax {
                line,
                column,
                message,
            } => write!(f, "SyntaxError (line {}, column {}): {}", line, column, message),
            CompileError::Semantic(message) => write!(f, "Semantic error: {}", message),
            CompileError::DeadCode(message) => {
                write!(f, "[Warning] Dead code found: {}", message)
            }
            CompileError::Verify(e) => write!(f, "{}", e),
            CompileError::BackendLimit(message) => {
                write!(f, "Backend limit exceeded: {}", message)
            }
            CompileError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<VerifyError> for CompileError {
    fn from(e: VerifyError) -> Self {
        CompileError::Verify(e)
    }
}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        CompileError::Io(e)
    }
}
