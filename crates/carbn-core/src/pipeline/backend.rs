use crate::ast::Module;
use crate::error::CompileError;

/// Backend trait — emits target bytes from the AST.
///
/// A backend must accept any legal module, whether or not the optimizer ran
/// over it first. On error the partially built output is discarded.
pub trait Backend {
    /// Name of this backend (e.g., "bytecode").
    fn name(&self) -> &str;

    /// Generate output bytes from the module.
    fn generate(&self, module: &Module) -> Result<Vec<u8>, CompileError>;
}
