//! Constant folding.
//!
//! Bottom-up evaluation of expressions whose operands are all literals,
//! branch selection for `if` statements with a literal test, and erasure of
//! `while` loops whose test is statically false. Arithmetic follows the
//! surface language's host semantics: true division, sign-of-divisor modulo,
//! bools coerce to ints, string concatenation on `+`. Any evaluation failure
//! (overflow, division by zero, type mismatch) aborts that particular fold
//! and leaves the node as written; it becomes a runtime matter if the code
//! is ever executed.

use std::cmp::Ordering;

use crate::ast::{BinOp, CmpOp, Expr, FunctionDef, Literal, Module, Stmt, UnaryOp};
use crate::error::CompileError;
use crate::pipeline::{Transform, TransformResult};

pub struct ConstantFolding;

impl Transform for ConstantFolding {
    fn name(&self) -> &str {
        "constant-folding"
    }

    fn apply(&self, module: Module) -> Result<TransformResult, CompileError> {
        let mut changed = false;
        let body = fold_stmts(module.body, &mut changed);
        Ok(TransformResult {
            module: Module { body },
            changed,
        })
    }
}

pub(crate) fn fold_stmts(stmts: Vec<Stmt>, changed: &mut bool) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        match stmt {
            Stmt::If { test, body, orelse } => {
                let test = fold_expr(test, changed);
                if let Expr::Constant(lit) = &test {
                    // Select the taken branch and splice it into the
                    // enclosing body.
                    *changed = true;
                    let branch = if lit.is_truthy() { body } else { orelse };
                    out.extend(fold_stmts(branch, changed));
                } else {
                    out.push(Stmt::If {
                        test,
                        body: fold_stmts(body, changed),
                        orelse: fold_stmts(orelse, changed),
                    });
                }
            }
            Stmt::While { test, body } => {
                let test = fold_expr(test, changed);
                let statically_false =
                    matches!(&test, Expr::Constant(lit) if !lit.is_truthy());
                if statically_false {
                    // Leave a null statement for DCE to drop.
                    *changed = true;
                    out.push(Stmt::null());
                } else {
                    out.push(Stmt::While {
                        test,
                        body: fold_stmts(body, changed),
                    });
                }
            }
            Stmt::Assign { target, value } => out.push(Stmt::Assign {
                target,
                value: fold_expr(value, changed),
            }),
            Stmt::Expr(value) => out.push(Stmt::Expr(fold_expr(value, changed))),
            Stmt::For { target, iter, body } => out.push(Stmt::For {
                target,
                iter: fold_expr(iter, changed),
                body: fold_stmts(body, changed),
            }),
            Stmt::FunctionDef(def) => {
                let FunctionDef { name, args, body } = def;
                out.push(Stmt::FunctionDef(FunctionDef {
                    name,
                    args,
                    body: fold_stmts(body, changed),
                }));
            }
            Stmt::Return(value) => {
                out.push(Stmt::Return(value.map(|v| fold_expr(v, changed))));
            }
        }
    }
    out
}

pub(crate) fn fold_expr(expr: Expr, changed: &mut bool) -> Expr {
    match expr {
        Expr::Binary { left, op, right } => {
            let left = fold_expr(*left, changed);
            let right = fold_expr(*right, changed);
            if let (Expr::Constant(l), Expr::Constant(r)) = (&left, &right) {
                if let Some(folded) = eval_binary(l, op, r) {
                    *changed = true;
                    return Expr::Constant(folded);
                }
            }
            Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            }
        }
        Expr::Unary { op, operand } => {
            let operand = fold_expr(*operand, changed);
            if let Expr::Constant(lit) = &operand {
                if let Some(folded) = eval_unary(op, lit) {
                    *changed = true;
                    return Expr::Constant(folded);
                }
            }
            Expr::Unary {
                op,
                operand: Box::new(operand),
            }
        }
        Expr::Compare {
            left,
            ops,
            comparators,
        } => {
            let left = fold_expr(*left, changed);
            let comparators: Vec<Expr> = comparators
                .into_iter()
                .map(|c| fold_expr(c, changed))
                .collect();
            // Only single-op chains fold; longer chains keep their emission
            // semantics.
            if ops.len() == 1 && comparators.len() == 1 {
                if let (Expr::Constant(l), Expr::Constant(r)) = (&left, &comparators[0]) {
                    if let Some(result) = eval_compare(l, ops[0], r) {
                        *changed = true;
                        return Expr::Constant(Literal::Bool(result));
                    }
                }
            }
            Expr::Compare {
                left: Box::new(left),
                ops,
                comparators,
            }
        }
        Expr::Logical { op, values } => Expr::Logical {
            op,
            values: values.into_iter().map(|v| fold_expr(v, changed)).collect(),
        },
        Expr::Call { func, args } => {
            let args: Vec<Expr> = args.into_iter().map(|a| fold_expr(a, changed)).collect();
            if is_pure_builtin(&func) {
                let literals: Option<Vec<Literal>> = args
                    .iter()
                    .map(|a| match a {
                        Expr::Constant(lit) => Some(lit.clone()),
                        _ => None,
                    })
                    .collect();
                if let Some(literals) = literals {
                    if let Some(folded) = eval_builtin(&func, &literals) {
                        *changed = true;
                        return Expr::Constant(folded);
                    }
                }
            }
            Expr::Call { func, args }
        }
        Expr::List(elts) => {
            Expr::List(elts.into_iter().map(|e| fold_expr(e, changed)).collect())
        }
        Expr::Name(_) | Expr::Constant(_) => expr,
    }
}

fn is_pure_builtin(func: &str) -> bool {
    matches!(func, "len" | "abs" | "min" | "max")
}

/// A literal viewed as a number. Bools coerce to 0/1; strings and null do not
/// coerce.
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(&self) -> f64 {
        match self {
            Num::Int(i) => *i as f64,
            Num::Float(f) => *f,
        }
    }
}

fn numeric(lit: &Literal) -> Option<Num> {
    match lit {
        Literal::Int(i) => Some(Num::Int(*i)),
        Literal::Float(f) => Some(Num::Float(*f)),
        Literal::Bool(b) => Some(Num::Int(*b as i64)),
        Literal::Str(_) | Literal::Null => None,
    }
}

fn eval_binary(left: &Literal, op: BinOp, right: &Literal) -> Option<Literal> {
    if let (Literal::Str(a), BinOp::Add, Literal::Str(b)) = (left, op, right) {
        return Some(Literal::Str(format!("{a}{b}")));
    }

    let l = numeric(left)?;
    let r = numeric(right)?;

    match (l, r) {
        (Num::Int(a), Num::Int(b)) => match op {
            BinOp::Add => a.checked_add(b).map(Literal::Int),
            BinOp::Sub => a.checked_sub(b).map(Literal::Int),
            BinOp::Mul => a.checked_mul(b).map(Literal::Int),
            // True division: an int/int quotient is a float.
            BinOp::Div => (b != 0).then(|| Literal::Float(a as f64 / b as f64)),
            BinOp::Mod => {
                if b == 0 {
                    return None;
                }
                // Remainder takes the sign of the divisor.
                let rem = a.checked_rem(b)?;
                let adjusted = if rem != 0 && (rem < 0) != (b < 0) {
                    rem + b
                } else {
                    rem
                };
                Some(Literal::Int(adjusted))
            }
        },
        (l, r) => {
            let a = l.as_f64();
            let b = r.as_f64();
            match op {
                BinOp::Add => Some(Literal::Float(a + b)),
                BinOp::Sub => Some(Literal::Float(a - b)),
                BinOp::Mul => Some(Literal::Float(a * b)),
                BinOp::Div => (b != 0.0).then(|| Literal::Float(a / b)),
                BinOp::Mod => {
                    (b != 0.0).then(|| Literal::Float(a - (a / b).floor() * b))
                }
            }
        }
    }
}

fn eval_unary(op: UnaryOp, operand: &Literal) -> Option<Literal> {
    match op {
        UnaryOp::Not => Some(Literal::Bool(!operand.is_truthy())),
        UnaryOp::Neg => match numeric(operand)? {
            Num::Int(i) => i.checked_neg().map(Literal::Int),
            Num::Float(f) => Some(Literal::Float(-f)),
        },
    }
}

fn literal_eq(left: &Literal, right: &Literal) -> bool {
    match (numeric(left), numeric(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => match (left, right) {
            (Literal::Str(a), Literal::Str(b)) => a == b,
            (Literal::Null, Literal::Null) => true,
            // Values of unrelated kinds compare unequal rather than failing.
            _ => false,
        },
    }
}

/// Ordering for literals that are mutually orderable (numbers with numbers,
/// strings with strings). `None` aborts the fold.
fn literal_cmp(left: &Literal, right: &Literal) -> Option<Ordering> {
    match (numeric(left), numeric(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => Some(a.cmp(&b)),
        (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
        _ => match (left, right) {
            (Literal::Str(a), Literal::Str(b)) => Some(a.cmp(b)),
            _ => None,
        },
    }
}

fn eval_compare(left: &Literal, op: CmpOp, right: &Literal) -> Option<bool> {
    match op {
        CmpOp::Eq => Some(literal_eq(left, right)),
        CmpOp::Ne => Some(!literal_eq(left, right)),
        CmpOp::Lt => literal_cmp(left, right).map(Ordering::is_lt),
        CmpOp::Le => literal_cmp(left, right).map(Ordering::is_le),
        CmpOp::Gt => literal_cmp(left, right).map(Ordering::is_gt),
        CmpOp::Ge => literal_cmp(left, right).map(Ordering::is_ge),
    }
}

fn eval_builtin(func: &str, args: &[Literal]) -> Option<Literal> {
    match func {
        "len" => match args {
            [Literal::Str(s)] => i64::try_from(s.chars().count()).ok().map(Literal::Int),
            _ => None,
        },
        "abs" => match args {
            [lit] => match numeric(lit)? {
                Num::Int(i) => i.checked_abs().map(Literal::Int),
                Num::Float(f) => Some(Literal::Float(f.abs())),
            },
            _ => None,
        },
        "min" | "max" => {
            let (first, rest) = args.split_first()?;
            let mut best: &Literal = first;
            for arg in rest {
                let ord = literal_cmp(arg, best)?;
                let take = if func == "min" {
                    ord == Ordering::Less
                } else {
                    ord == Ordering::Greater
                };
                if take {
                    best = arg;
                }
            }
            Some(best.clone())
        }
        _ => None,
    }
}
