//! Dead-code elimination.
//!
//! Drops the statement-level null constants earlier passes leave behind
//! (erased `while` loops, soft-skipped surface constructs) from the module
//! body, and replaces any `if` whose test is a literal with the selected
//! branch's statements, spliced into the enclosing body.

use crate::ast::{Expr, Module, Stmt};
use crate::error::CompileError;
use crate::pipeline::{Transform, TransformResult};

pub struct DeadCodeElimination;

impl Transform for DeadCodeElimination {
    fn name(&self) -> &str {
        "dead-code-elimination"
    }

    fn apply(&self, module: Module) -> Result<TransformResult, CompileError> {
        let mut changed = false;
        let body = eliminate(module.body, true, &mut changed);
        Ok(TransformResult {
            module: Module { body },
            changed,
        })
    }
}

/// `top_level` controls null-statement dropping, which the pass only does in
/// the module body; branch selection applies everywhere.
fn eliminate(stmts: Vec<Stmt>, top_level: bool, changed: &mut bool) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        match stmt {
            Stmt::If { test, body, orelse } => {
                if let Expr::Constant(lit) = &test {
                    *changed = true;
                    let branch = if lit.is_truthy() { body } else { orelse };
                    out.extend(eliminate(branch, top_level, changed));
                } else {
                    out.push(Stmt::If {
                        test,
                        body: eliminate(body, false, changed),
                        orelse: eliminate(orelse, false, changed),
                    });
                }
            }
            Stmt::While { test, body } => out.push(Stmt::While {
                test,
                body: eliminate(body, false, changed),
            }),
            Stmt::For { target, iter, body } => out.push(Stmt::For {
                target,
                iter,
                body: eliminate(body, false, changed),
            }),
            Stmt::FunctionDef(def) => {
                let crate::ast::FunctionDef { name, args, body } = def;
                out.push(Stmt::FunctionDef(crate::ast::FunctionDef {
                    name,
                    args,
                    body: eliminate(body, false, changed),
                }));
            }
            ref s if top_level && s.is_null() => {
                *changed = true;
            }
            other => out.push(other),
        }
    }
    out
}
