use log::debug;

use crate::ast::Module;
use crate::error::CompileError;
use crate::passes::{
    CommonSubexpressionElimination, ConstantFolding, DeadCodeElimination, FunctionCatalog,
    FunctionInlining, RecursivePatternRewrite, TailCallToLoop,
};

/// Result of applying a transform pass.
pub struct TransformResult {
    pub module: Module,
    /// Whether the pass modified the module.
    pub changed: bool,
}

/// Transform trait — a pass that rewrites the AST.
///
/// Examples: constant folding, common-subexpression elimination, function
/// inlining, dead code elimination.
pub trait Transform {
    /// Name of this transform pass.
    fn name(&self) -> &str;

    /// Apply this transform to a module, returning the transformed module
    /// and whether any changes were made.
    fn apply(&self, module: Module) -> Result<TransformResult, CompileError>;
}

/// An ordered sequence of transforms to apply.
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    pub fn add(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Run all transforms once, in insertion order.
    pub fn run(&self, mut module: Module) -> Result<Module, CompileError> {
        for transform in &self.transforms {
            let result = transform.apply(module)?;
            debug!(
                "pass {}: {}",
                transform.name(),
                if result.changed { "changed" } else { "no change" }
            );
            module = result.module;
        }
        Ok(module)
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewriting pass names, in pipeline order. Function collection and
/// recursion detection run before these as analyses (see
/// [`FunctionCatalog::collect`]).
pub const PASS_NAMES: &[&str] = &[
    "constant-folding",
    "common-subexpression-elimination",
    "function-inlining",
    "recursive-pattern-rewrite",
    "tail-call-to-loop",
    "dead-code-elimination",
];

/// Run the full optimizer pipeline over a module.
///
/// Ordering matters: folding precedes DCE so dead branches are visible, and
/// the recursion analysis precedes both inlining (which must avoid recursive
/// functions) and the tail-call conversion (which needs the recursion set).
pub fn optimize(module: Module) -> Result<Module, CompileError> {
    let catalog = FunctionCatalog::collect(&module);
    debug!(
        "collected {} function(s), {} recursive",
        catalog.defs.len(),
        catalog.recursive.len()
    );

    let recursive = catalog.recursive.clone();
    let mut pipeline = TransformPipeline::new();
    pipeline.add(Box::new(ConstantFolding));
    pipeline.add(Box::new(CommonSubexpressionElimination));
    pipeline.add(Box::new(FunctionInlining::new(catalog)));
    pipeline.add(Box::new(RecursivePatternRewrite));
    pipeline.add(Box::new(TailCallToLoop::new(recursive)));
    pipeline.add(Box::new(DeadCodeElimination));
    pipeline.run(module)
}
