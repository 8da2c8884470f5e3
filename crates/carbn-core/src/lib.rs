//! Core of the Carbon bytecode compiler: the internal AST, the closed error
//! set, the optimizer passes, and the pipeline seams (frontend, transform,
//! backend) the other crates plug into.
//!
//! Data flow through the compiler is strictly linear:
//!
//! ```text
//! source text → AST → [optimized AST] → bytes
//! ```
//!
//! The optimizer is optional; the backend accepts any legal AST.

pub mod ast;
pub mod error;
pub mod passes;
pub mod pipeline;

pub use ast::{BinOp, CmpOp, Expr, FunctionDef, Literal, LogicalOp, Module, Stmt, UnaryOp};
pub use error::{CompileError, SourceLoc};
pub use pipeline::{optimize, Backend, Frontend, Transform, TransformPipeline, TransformResult};
