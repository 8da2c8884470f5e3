use crate::ast::Module;
use crate::error::CompileError;

/// Frontend trait — parses surface syntax and produces the internal AST.
///
/// The contract is a pure function: source text in, a valid module (or a
/// parse error) out. The compiler depends only on the AST shapes, never on
/// the surface grammar.
pub trait Frontend {
    /// Name of this frontend (e.g., "python").
    fn name(&self) -> &str;

    /// Parse the source and produce a module.
    fn parse(&self, source: &str) -> Result<Module, CompileError>;
}
