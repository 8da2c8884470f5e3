//! Function collection and self-recursion detection.
//!
//! These two analyses run before the rewriting passes: inlining needs the
//! definition table and must avoid recursive functions, and the tail-call
//! conversion only looks at functions known to be self-recursive.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::ast::{Expr, FunctionDef, Module, Stmt};

/// Result of scanning a module for function definitions.
#[derive(Debug, Clone, Default)]
pub struct FunctionCatalog {
    /// Every `FunctionDef` in the tree, by name. When a name is defined more
    /// than once, the last definition wins.
    pub defs: IndexMap<String, FunctionDef>,
    /// Names of functions whose body calls the function itself. Only direct
    /// self-recursion is recorded; mutual recursion is not detected.
    pub recursive: HashSet<String>,
}

impl FunctionCatalog {
    pub fn collect(module: &Module) -> Self {
        let mut defs = IndexMap::new();
        collect_defs(&module.body, &mut defs);

        let recursive = defs
            .iter()
            .filter(|(name, def)| stmts_call(&def.body, name))
            .map(|(name, _)| name.clone())
            .collect();

        Self { defs, recursive }
    }

    /// A function may be inlined when it is not self-recursive and its body
    /// is at most five statements.
    pub fn inlinable(&self, name: &str) -> Option<&FunctionDef> {
        let def = self.defs.get(name)?;
        if self.recursive.contains(name) || def.body.len() > 5 {
            return None;
        }
        Some(def)
    }
}

fn collect_defs(stmts: &[Stmt], defs: &mut IndexMap<String, FunctionDef>) {
    for stmt in stmts {
        match stmt {
            Stmt::FunctionDef(def) => {
                defs.insert(def.name.clone(), def.clone());
                collect_defs(&def.body, defs);
            }
            Stmt::If { body, orelse, .. } => {
                collect_defs(body, defs);
                collect_defs(orelse, defs);
            }
            Stmt::While { body, .. } | Stmt::For { body, .. } => {
                collect_defs(body, defs);
            }
            _ => {}
        }
    }
}

/// Whether any statement calls `name`. Bodies of nested function definitions
/// are skipped: a call there does not re-enter the enclosing function.
fn stmts_call(stmts: &[Stmt], name: &str) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Assign { value, .. } => expr_calls(value, name),
        Stmt::Expr(value) => expr_calls(value, name),
        Stmt::If { test, body, orelse } => {
            expr_calls(test, name) || stmts_call(body, name) || stmts_call(orelse, name)
        }
        Stmt::While { test, body } => expr_calls(test, name) || stmts_call(body, name),
        Stmt::For { iter, body, .. } => expr_calls(iter, name) || stmts_call(body, name),
        Stmt::FunctionDef(_) => false,
        Stmt::Return(value) => value.as_ref().is_some_and(|v| expr_calls(v, name)),
    })
}

fn expr_calls(expr: &Expr, name: &str) -> bool {
    match expr {
        Expr::Binary { left, right, .. } => expr_calls(left, name) || expr_calls(right, name),
        Expr::Unary { operand, .. } => expr_calls(operand, name),
        Expr::Compare {
            left, comparators, ..
        } => expr_calls(left, name) || comparators.iter().any(|c| expr_calls(c, name)),
        Expr::Logical { values, .. } => values.iter().any(|v| expr_calls(v, name)),
        Expr::Call { func, args } => func == name || args.iter().any(|a| expr_calls(a, name)),
        Expr::Name(_) | Expr::Constant(_) => false,
        Expr::List(elts) => elts.iter().any(|e| expr_calls(e, name)),
    }
}
