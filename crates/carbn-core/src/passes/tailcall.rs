//! Tail-call-to-loop conversion.
//!
//! A self-recursive function whose top-level body contains
//! `return f(args...)` statements is rewritten to rebind its parameters and
//! loop instead of calling itself:
//!
//! ```text
//! def f(a, b):            def f(a, b):
//!     ...                     _a_orig = a
//!     return f(x, y)  →       _b_orig = b
//!                             while True:
//!                                 ...
//!                                 a = x
//!                                 b = y
//! ```
//!
//! The `_<name>_orig` bindings snapshot the incoming arguments; nothing reads
//! them, but they are kept for debugging. Returns that are not tail calls
//! stay as written and exit the loop (and the function) normally. Tail calls
//! nested inside `if`/`else` bodies are not converted.

use std::collections::HashSet;

use crate::ast::{Expr, FunctionDef, Literal, Module, Stmt};
use crate::error::CompileError;
use crate::pipeline::{Transform, TransformResult};

pub struct TailCallToLoop {
    recursive: HashSet<String>,
}

impl TailCallToLoop {
    pub fn new(recursive: HashSet<String>) -> Self {
        Self { recursive }
    }
}

impl Transform for TailCallToLoop {
    fn name(&self) -> &str {
        "tail-call-to-loop"
    }

    fn apply(&self, module: Module) -> Result<TransformResult, CompileError> {
        let mut changed = false;
        let body = module
            .body
            .into_iter()
            .map(|stmt| match stmt {
                Stmt::FunctionDef(def) if self.recursive.contains(&def.name) => {
                    Stmt::FunctionDef(convert(def, &mut changed))
                }
                other => other,
            })
            .collect();

        Ok(TransformResult {
            module: Module { body },
            changed,
        })
    }
}

fn is_tail_call(stmt: &Stmt, func_name: &str) -> bool {
    matches!(stmt, Stmt::Return(Some(Expr::Call { func, .. })) if func == func_name)
}

fn convert(def: FunctionDef, changed: &mut bool) -> FunctionDef {
    if !def.body.iter().any(|stmt| is_tail_call(stmt, &def.name)) {
        return def;
    }
    *changed = true;

    let FunctionDef { name, args, body } = def;

    let mut new_body: Vec<Stmt> = args
        .iter()
        .map(|arg| Stmt::Assign {
            target: format!("_{arg}_orig"),
            value: Expr::Name(arg.clone()),
        })
        .collect();

    let mut loop_body = Vec::with_capacity(body.len());
    for stmt in body {
        match stmt {
            Stmt::Return(Some(Expr::Call { func, args: call_args })) if func == name => {
                // Rebind parameters from the call arguments, left to right,
                // then fall through to the next loop iteration.
                for (param, arg) in args.iter().zip(call_args) {
                    loop_body.push(Stmt::Assign {
                        target: param.clone(),
                        value: arg,
                    });
                }
            }
            other => loop_body.push(other),
        }
    }

    new_body.push(Stmt::While {
        test: Expr::Constant(Literal::Bool(true)),
        body: loop_body,
    });

    FunctionDef {
        name,
        args,
        body: new_body,
    }
}
