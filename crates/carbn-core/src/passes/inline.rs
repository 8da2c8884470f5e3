//! Function inlining.
//!
//! Only the cheapest shape is inlined: a non-recursive function whose body
//! is exactly one `return expr`. The call is replaced by `expr` with each
//! parameter substituted by the corresponding argument expression —
//! capture-free, because such a body has no bindings beyond its parameters.
//! Calls to empty or `return None` bodies stay as calls (their cost is
//! already minimal), and multi-statement bodies are never inlined.

use crate::ast::{Expr, FunctionDef, Literal, Module, Stmt};
use crate::error::CompileError;
use crate::passes::catalog::FunctionCatalog;
use crate::pipeline::{Transform, TransformResult};

/// Cap on structural recursion while rewriting; trees deeper than this are
/// returned as-is.
const MAX_TRAVERSAL_DEPTH: usize = 20;

/// Cap on how deep a chain of inlined calls may grow.
const MAX_INLINE_DEPTH: usize = 10;

pub struct FunctionInlining {
    catalog: FunctionCatalog,
}

impl FunctionInlining {
    pub fn new(catalog: FunctionCatalog) -> Self {
        Self { catalog }
    }
}

impl Transform for FunctionInlining {
    fn name(&self) -> &str {
        "function-inlining"
    }

    fn apply(&self, module: Module) -> Result<TransformResult, CompileError> {
        let mut changed = false;
        let body = self.inline_stmts(module.body, 0, &mut changed);
        Ok(TransformResult {
            module: Module { body },
            changed,
        })
    }
}

impl FunctionInlining {
    fn inline_stmts(&self, stmts: Vec<Stmt>, depth: usize, changed: &mut bool) -> Vec<Stmt> {
        if depth > MAX_TRAVERSAL_DEPTH {
            return stmts;
        }
        stmts
            .into_iter()
            .map(|stmt| self.inline_stmt(stmt, depth + 1, changed))
            .collect()
    }

    fn inline_stmt(&self, stmt: Stmt, depth: usize, changed: &mut bool) -> Stmt {
        match stmt {
            Stmt::Assign { target, value } => Stmt::Assign {
                target,
                value: self.inline_expr(value, depth + 1, changed),
            },
            Stmt::Expr(value) => Stmt::Expr(self.inline_expr(value, depth + 1, changed)),
            Stmt::If { test, body, orelse } => Stmt::If {
                test: self.inline_expr(test, depth + 1, changed),
                body: self.inline_stmts(body, depth + 1, changed),
                orelse: self.inline_stmts(orelse, depth + 1, changed),
            },
            Stmt::While { test, body } => Stmt::While {
                test: self.inline_expr(test, depth + 1, changed),
                body: self.inline_stmts(body, depth + 1, changed),
            },
            Stmt::For { target, iter, body } => Stmt::For {
                target,
                iter: self.inline_expr(iter, depth + 1, changed),
                body: self.inline_stmts(body, depth + 1, changed),
            },
            Stmt::FunctionDef(def) => {
                let FunctionDef { name, args, body } = def;
                Stmt::FunctionDef(FunctionDef {
                    name,
                    args,
                    body: self.inline_stmts(body, depth + 1, changed),
                })
            }
            Stmt::Return(value) => {
                Stmt::Return(value.map(|v| self.inline_expr(v, depth + 1, changed)))
            }
        }
    }

    fn inline_expr(&self, expr: Expr, depth: usize, changed: &mut bool) -> Expr {
        if depth > MAX_TRAVERSAL_DEPTH {
            return expr;
        }
        match expr {
            Expr::Call { func, args } => {
                let args: Vec<Expr> = args
                    .into_iter()
                    .map(|a| self.inline_expr(a, depth + 1, changed))
                    .collect();

                if depth < MAX_INLINE_DEPTH {
                    if let Some(def) = self.catalog.inlinable(&func) {
                        if let Some(ret) = single_return_expr(def) {
                            let mut inlined = ret.clone();
                            for (param, arg) in def.args.iter().zip(&args) {
                                inlined = substitute(inlined, param, arg);
                            }
                            *changed = true;
                            // The substituted body may itself contain
                            // inlinable calls.
                            return self.inline_expr(inlined, depth + 1, changed);
                        }
                    }
                }

                Expr::Call { func, args }
            }
            Expr::Binary { left, op, right } => Expr::Binary {
                left: Box::new(self.inline_expr(*left, depth + 1, changed)),
                op,
                right: Box::new(self.inline_expr(*right, depth + 1, changed)),
            },
            Expr::Unary { op, operand } => Expr::Unary {
                op,
                operand: Box::new(self.inline_expr(*operand, depth + 1, changed)),
            },
            Expr::Compare {
                left,
                ops,
                comparators,
            } => Expr::Compare {
                left: Box::new(self.inline_expr(*left, depth + 1, changed)),
                ops,
                comparators: comparators
                    .into_iter()
                    .map(|c| self.inline_expr(c, depth + 1, changed))
                    .collect(),
            },
            Expr::Logical { op, values } => Expr::Logical {
                op,
                values: values
                    .into_iter()
                    .map(|v| self.inline_expr(v, depth + 1, changed))
                    .collect(),
            },
            Expr::List(elts) => Expr::List(
                elts.into_iter()
                    .map(|e| self.inline_expr(e, depth + 1, changed))
                    .collect(),
            ),
            Expr::Name(_) | Expr::Constant(_) => expr,
        }
    }
}

/// The returned expression of a body that is exactly `return expr`, where
/// `expr` is a real value (not the null literal).
fn single_return_expr(def: &FunctionDef) -> Option<&Expr> {
    match def.body.as_slice() {
        [Stmt::Return(Some(expr))] if !matches!(expr, Expr::Constant(Literal::Null)) => {
            Some(expr)
        }
        _ => None,
    }
}

/// Replace every free occurrence of `name` in `expr` with `replacement`.
fn substitute(expr: Expr, name: &str, replacement: &Expr) -> Expr {
    match expr {
        Expr::Name(id) if id == name => replacement.clone(),
        Expr::Name(_) | Expr::Constant(_) => expr,
        Expr::Binary { left, op, right } => Expr::Binary {
            left: Box::new(substitute(*left, name, replacement)),
            op,
            right: Box::new(substitute(*right, name, replacement)),
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op,
            operand: Box::new(substitute(*operand, name, replacement)),
        },
        Expr::Compare {
            left,
            ops,
            comparators,
        } => Expr::Compare {
            left: Box::new(substitute(*left, name, replacement)),
            ops,
            comparators: comparators
                .into_iter()
                .map(|c| substitute(c, name, replacement))
                .collect(),
        },
        Expr::Logical { op, values } => Expr::Logical {
            op,
            values: values
                .into_iter()
                .map(|v| substitute(v, name, replacement))
                .collect(),
        },
        Expr::Call { func, args } => Expr::Call {
            func,
            args: args
                .into_iter()
                .map(|a| substitute(a, name, replacement))
                .collect(),
        },
        Expr::List(elts) => Expr::List(
            elts.into_iter()
                .map(|e| substitute(e, name, replacement))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    fn var(name: &str) -> Expr {
        Expr::Name(name.to_string())
    }

    fn int(n: i64) -> Expr {
        Expr::Constant(Literal::Int(n))
    }

    fn call(func: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            func: func.to_string(),
            args,
        }
    }

    fn func(name: &str, args: &[&str], body: Vec<Stmt>) -> Stmt {
        Stmt::FunctionDef(FunctionDef {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            body,
        })
    }

    fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    fn run(body: Vec<Stmt>) -> Vec<Stmt> {
        let module = Module { body };
        let catalog = FunctionCatalog::collect(&module);
        FunctionInlining::new(catalog)
            .apply(module)
            .unwrap()
            .module
            .body
    }

    #[test]
    fn single_return_call_is_substituted() {
        // def double(v): return v * 2 — double(a + 1) → (a + 1) * 2
        let body = run(vec![
            func(
                "double",
                &["v"],
                vec![Stmt::Return(Some(binary(var("v"), BinOp::Mul, int(2))))],
            ),
            Stmt::Assign {
                target: "x".to_string(),
                value: call("double", vec![binary(var("a"), BinOp::Add, int(1))]),
            },
        ]);

        assert_eq!(
            body[1],
            Stmt::Assign {
                target: "x".to_string(),
                value: binary(binary(var("a"), BinOp::Add, int(1)), BinOp::Mul, int(2)),
            }
        );
    }

    #[test]
    fn substitution_reaches_every_expression_position() {
        // def pick(v): return max(v, -v) — both occurrences replaced.
        let neg = |e: Expr| Expr::Unary {
            op: crate::ast::UnaryOp::Neg,
            operand: Box::new(e),
        };
        let body = run(vec![
            func(
                "pick",
                &["v"],
                vec![Stmt::Return(Some(call("max", vec![var("v"), neg(var("v"))])))],
            ),
            Stmt::Assign {
                target: "x".to_string(),
                value: call("pick", vec![var("a")]),
            },
        ]);

        assert_eq!(
            body[1],
            Stmt::Assign {
                target: "x".to_string(),
                value: call("max", vec![var("a"), neg(var("a"))]),
            }
        );
    }

    #[test]
    fn recursive_function_is_not_inlined() {
        let recursive_call = call("f", vec![var("n")]);
        let body = run(vec![
            func("f", &["n"], vec![Stmt::Return(Some(recursive_call.clone()))]),
            Stmt::Assign {
                target: "x".to_string(),
                value: call("f", vec![int(3)]),
            },
        ]);

        assert_eq!(
            body[1],
            Stmt::Assign {
                target: "x".to_string(),
                value: call("f", vec![int(3)]),
            }
        );
    }

    #[test]
    fn multi_statement_body_is_not_inlined() {
        let body = run(vec![
            func(
                "f",
                &["n"],
                vec![
                    Stmt::Assign {
                        target: "t".to_string(),
                        value: binary(var("n"), BinOp::Mul, int(2)),
                    },
                    Stmt::Return(Some(var("t"))),
                ],
            ),
            Stmt::Assign {
                target: "x".to_string(),
                value: call("f", vec![int(3)]),
            },
        ]);

        assert_eq!(
            body[1],
            Stmt::Assign {
                target: "x".to_string(),
                value: call("f", vec![int(3)]),
            }
        );
    }

    #[test]
    fn return_null_body_stays_a_call() {
        let body = run(vec![
            func(
                "noop",
                &[],
                vec![Stmt::Return(Some(Expr::Constant(Literal::Null)))],
            ),
            Stmt::Expr(call("noop", vec![])),
        ]);

        assert_eq!(body[1], Stmt::Expr(call("noop", vec![])));
    }

    #[test]
    fn empty_body_stays_a_call() {
        let body = run(vec![
            func("noop", &[], vec![]),
            Stmt::Expr(call("noop", vec![])),
        ]);
        assert_eq!(body[1], Stmt::Expr(call("noop", vec![])));
    }

    #[test]
    fn chained_single_return_functions_inline_through() {
        // g(v) = v + 1; f(v) = g(v) * 2 — f(a) → (a + 1) * 2
        let body = run(vec![
            func(
                "g",
                &["v"],
                vec![Stmt::Return(Some(binary(var("v"), BinOp::Add, int(1))))],
            ),
            func(
                "f",
                &["v"],
                vec![Stmt::Return(Some(binary(
                    call("g", vec![var("v")]),
                    BinOp::Mul,
                    int(2),
                )))],
            ),
            Stmt::Assign {
                target: "x".to_string(),
                value: call("f", vec![var("a")]),
            },
        ]);

        assert_eq!(
            body[2],
            Stmt::Assign {
                target: "x".to_string(),
                value: binary(binary(var("a"), BinOp::Add, int(1)), BinOp::Mul, int(2)),
            }
        );
    }

    #[test]
    fn calls_inside_function_bodies_are_inlined_too() {
        let body = run(vec![
            func(
                "inc",
                &["v"],
                vec![Stmt::Return(Some(binary(var("v"), BinOp::Add, int(1))))],
            ),
            func(
                "user",
                &["n"],
                vec![Stmt::Return(Some(call("inc", vec![var("n")])))],
            ),
        ]);

        match &body[1] {
            Stmt::FunctionDef(def) => {
                assert_eq!(
                    def.body,
                    vec![Stmt::Return(Some(binary(var("n"), BinOp::Add, int(1))))]
                );
            }
            other => panic!("Expected FunctionDef, got: {other:?}"),
        }
    }
}
