use std::io;

use thiserror::Error;

/// A 1-based line/column position in the surface source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLoc {
    pub line: usize,
    pub column: usize,
}

/// Compiler error — the closed set of failure kinds the pipeline can raise.
///
/// Every variant carries a human-readable message; parse errors usually also
/// carry a source position. Errors propagate to the driver, which reports
/// them and exits nonzero. There is no partial-output recovery.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The surface text is not syntactically valid, or it uses a construct
    /// outside the supported subset in a way the adapter cannot soft-skip.
    #[error("parse error{}: {message}", loc_suffix(.loc))]
    Parse {
        message: String,
        loc: Option<SourceLoc>,
    },

    /// The AST cannot be emitted (unknown callee, malformed node, oversized
    /// string immediate, unpatched jump).
    #[error("codegen error{}: {message}", loc_suffix(.loc))]
    CodeGen {
        message: String,
        loc: Option<SourceLoc>,
    },

    /// A rewrite precondition was violated inside an optimizer pass.
    #[error("optimization error{}: {message}", loc_suffix(.loc))]
    Optimize {
        message: String,
        loc: Option<SourceLoc>,
    },

    /// Input unreadable or output unwritable.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CompileError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            loc: None,
        }
    }

    pub fn parse_at(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::Parse {
            message: message.into(),
            loc: Some(SourceLoc { line, column }),
        }
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        Self::CodeGen {
            message: message.into(),
            loc: None,
        }
    }

    pub fn optimize(message: impl Into<String>) -> Self {
        Self::Optimize {
            message: message.into(),
            loc: None,
        }
    }
}

fn loc_suffix(loc: &Option<SourceLoc>) -> String {
    match loc {
        Some(l) => format!(" at line {}, column {}", l.line, l.column),
        None => String::new(),
    }
}
