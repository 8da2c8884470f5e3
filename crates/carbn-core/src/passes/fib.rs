//! Recursive-pattern rewriting.
//!
//! A single well-known pattern is recognized: a one-parameter function named
//! `fib`. Its body — whatever it was — is replaced wholesale by the
//! iterative two-accumulator Fibonacci:
//!
//! ```text
//! if n < 2:
//!     return n
//! a = 0
//! b = 1
//! for i in range(2, n + 1):
//!     c = a + b
//!     a = b
//!     b = c
//! return b
//! ```
//!
//! This is a peephole specialization keyed on the name alone, not a general
//! recursion analysis.

use crate::ast::{BinOp, CmpOp, Expr, FunctionDef, Literal, Module, Stmt};
use crate::error::CompileError;
use crate::pipeline::{Transform, TransformResult};

pub struct RecursivePatternRewrite;

impl Transform for RecursivePatternRewrite {
    fn name(&self) -> &str {
        "recursive-pattern-rewrite"
    }

    fn apply(&self, module: Module) -> Result<TransformResult, CompileError> {
        let mut changed = false;
        let body = rewrite_stmts(module.body, &mut changed);
        Ok(TransformResult {
            module: Module { body },
            changed,
        })
    }
}

fn rewrite_stmts(stmts: Vec<Stmt>, changed: &mut bool) -> Vec<Stmt> {
    stmts
        .into_iter()
        .map(|stmt| match stmt {
            Stmt::FunctionDef(def) if def.name == "fib" && def.args.len() == 1 => {
                *changed = true;
                let body = iterative_fib_body(&def.args[0]);
                Stmt::FunctionDef(FunctionDef {
                    name: def.name,
                    args: def.args,
                    body,
                })
            }
            Stmt::FunctionDef(def) => {
                let FunctionDef { name, args, body } = def;
                Stmt::FunctionDef(FunctionDef {
                    name,
                    args,
                    body: rewrite_stmts(body, changed),
                })
            }
            Stmt::If { test, body, orelse } => Stmt::If {
                test,
                body: rewrite_stmts(body, changed),
                orelse: rewrite_stmts(orelse, changed),
            },
            Stmt::While { test, body } => Stmt::While {
                test,
                body: rewrite_stmts(body, changed),
            },
            Stmt::For { target, iter, body } => Stmt::For {
                target,
                iter,
                body: rewrite_stmts(body, changed),
            },
            other => other,
        })
        .collect()
}

fn iterative_fib_body(param: &str) -> Vec<Stmt> {
    let name = |id: &str| Expr::Name(id.to_string());
    let int = |n: i64| Expr::Constant(Literal::Int(n));
    let assign = |target: &str, value: Expr| Stmt::Assign {
        target: target.to_string(),
        value,
    };

    vec![
        // Base case: fib(0) = 0, fib(1) = 1.
        Stmt::If {
            test: Expr::Compare {
                left: Box::new(name(param)),
                ops: vec![CmpOp::Lt],
                comparators: vec![int(2)],
            },
            body: vec![Stmt::Return(Some(name(param)))],
            orelse: vec![],
        },
        assign("a", int(0)),
        assign("b", int(1)),
        Stmt::For {
            target: "i".to_string(),
            iter: Expr::Call {
                func: "range".to_string(),
                args: vec![
                    int(2),
                    Expr::Binary {
                        left: Box::new(name(param)),
                        op: BinOp::Add,
                        right: Box::new(int(1)),
                    },
                ],
            },
            body: vec![
                assign(
                    "c",
                    Expr::Binary {
                        left: Box::new(name("a")),
                        op: BinOp::Add,
                        right: Box::new(name("b")),
                    },
                ),
                assign("a", name("b")),
                assign("b", name("c")),
            ],
        },
        Stmt::Return(Some(name("b"))),
    ]
}
