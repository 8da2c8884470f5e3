//! Common-subexpression elimination.
//!
//! A module-level linear scan: the first assignment computing an expression
//! registers its fingerprint; later assignments computing the same
//! fingerprint reuse the earlier binding by name instead. The scan never
//! crosses a function boundary and never descends into blocks — module
//! statements are the only context considered.
//!
//! Rebinding a variable drops every recorded expression that was computed
//! from it (or bound to it), so a reuse can never observe a stale operand.
//! Expressions containing calls to impure builtins never participate.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::ast::{Expr, Module, Stmt};
use crate::error::CompileError;
use crate::pipeline::{Transform, TransformResult};

pub struct CommonSubexpressionElimination;

struct AvailableExpr {
    /// Variable holding the previously computed value.
    bound_to: String,
    /// Free names the expression reads; used for invalidation.
    names: HashSet<String>,
}

impl Transform for CommonSubexpressionElimination {
    fn name(&self) -> &str {
        "common-subexpression-elimination"
    }

    fn apply(&self, module: Module) -> Result<TransformResult, CompileError> {
        let mut changed = false;
        let mut available: IndexMap<String, AvailableExpr> = IndexMap::new();
        let mut body = Vec::with_capacity(module.body.len());

        for stmt in module.body {
            match stmt {
                Stmt::Assign { target, value } => {
                    let mut value = value;
                    let mut pending_insert = None;

                    if is_candidate(&value) {
                        let fp = fingerprint(&value);
                        if let Some(entry) = available.get(&fp) {
                            value = Expr::Name(entry.bound_to.clone());
                            changed = true;
                        } else {
                            let mut names = HashSet::new();
                            collect_names(&value, &mut names);
                            // `x = x * 2` must not register: after the store,
                            // `x` no longer holds the operand that was read.
                            if !names.contains(&target) {
                                pending_insert = Some((fp, names));
                            }
                        }
                    }

                    available
                        .retain(|_, e| e.bound_to != target && !e.names.contains(&target));
                    if let Some((fp, names)) = pending_insert {
                        available.insert(
                            fp,
                            AvailableExpr {
                                bound_to: target.clone(),
                                names,
                            },
                        );
                    }

                    body.push(Stmt::Assign { target, value });
                }
                other => body.push(other),
            }
        }

        Ok(TransformResult {
            module: Module { body },
            changed,
        })
    }
}

/// Assignments of bare names and literals gain nothing from reuse, and
/// impure builtins must be re-evaluated at every occurrence.
fn is_candidate(value: &Expr) -> bool {
    !matches!(value, Expr::Name(_) | Expr::Constant(_)) && !contains_impure_call(value)
}

fn contains_impure_call(expr: &Expr) -> bool {
    match expr {
        Expr::Binary { left, right, .. } => {
            contains_impure_call(left) || contains_impure_call(right)
        }
        Expr::Unary { operand, .. } => contains_impure_call(operand),
        Expr::Compare {
            left, comparators, ..
        } => contains_impure_call(left) || comparators.iter().any(contains_impure_call),
        Expr::Logical { values, .. } => values.iter().any(contains_impure_call),
        Expr::Call { func, args } => {
            matches!(func.as_str(), "input" | "print") || args.iter().any(contains_impure_call)
        }
        Expr::Name(_) | Expr::Constant(_) => false,
        Expr::List(elts) => elts.iter().any(contains_impure_call),
    }
}

/// Canonical textual fingerprint of an expression. Structurally identical
/// expressions render identically; literal kinds stay distinguishable.
pub(crate) fn fingerprint(expr: &Expr) -> String {
    match expr {
        Expr::Binary { left, op, right } => {
            format!("({} {op} {})", fingerprint(left), fingerprint(right))
        }
        Expr::Unary { op, operand } => format!("({op} {})", fingerprint(operand)),
        Expr::Compare {
            left,
            ops,
            comparators,
        } => {
            let mut out = format!("({}", fingerprint(left));
            for (op, comparator) in ops.iter().zip(comparators) {
                out.push_str(&format!(" {op} {}", fingerprint(comparator)));
            }
            out.push(')');
            out
        }
        Expr::Logical { op, values } => {
            let rendered: Vec<String> = values.iter().map(fingerprint).collect();
            format!("({op} {})", rendered.join(" "))
        }
        Expr::Call { func, args } => {
            let rendered: Vec<String> = args.iter().map(fingerprint).collect();
            format!("{func}({})", rendered.join(","))
        }
        Expr::Name(id) => id.clone(),
        Expr::Constant(lit) => lit.to_string(),
        Expr::List(elts) => {
            let rendered: Vec<String> = elts.iter().map(fingerprint).collect();
            format!("[{}]", rendered.join(","))
        }
    }
}

fn collect_names(expr: &Expr, out: &mut HashSet<String>) {
    match expr {
        Expr::Binary { left, right, .. } => {
            collect_names(left, out);
            collect_names(right, out);
        }
        Expr::Unary { operand, .. } => collect_names(operand, out),
        Expr::Compare {
            left, comparators, ..
        } => {
            collect_names(left, out);
            for comparator in comparators {
                collect_names(comparator, out);
            }
        }
        Expr::Logical { values, .. } => {
            for value in values {
                collect_names(value, out);
            }
        }
        Expr::Call { args, .. } => {
            for arg in args {
                collect_names(arg, out);
            }
        }
        Expr::Name(id) => {
            out.insert(id.clone());
        }
        Expr::Constant(_) => {}
        Expr::List(elts) => {
            for elt in elts {
                collect_names(elt, out);
            }
        }
    }
}
