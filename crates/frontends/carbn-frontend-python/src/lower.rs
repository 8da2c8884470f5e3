//! Surface-tree → internal-AST lowering.
//!
//! The mapping is 1:1 for the supported subset. Whole statements or
//! expressions outside the subset lower to the null constant (a soft no-op
//! the backend never emits for), while a supported node carrying an operator
//! outside the closed tag sets is a construction error and fails the parse.

use std::collections::HashSet;

use carbn_core::ast::{
    BinOp, CmpOp, Expr, FunctionDef, Literal, LogicalOp, Module, Stmt, UnaryOp,
};
use carbn_core::error::CompileError;
use log::warn;
use num_traits::ToPrimitive;
use rustpython_parser::ast as py;

pub(crate) fn lower_module(suite: &[py::Stmt]) -> Result<Module, CompileError> {
    Ok(Module {
        body: lower_stmts(suite)?,
    })
}

fn lower_stmts(stmts: &[py::Stmt]) -> Result<Vec<Stmt>, CompileError> {
    stmts.iter().map(lower_stmt).collect()
}

fn lower_stmt(stmt: &py::Stmt) -> Result<Stmt, CompileError> {
    match stmt {
        py::Stmt::Assign(assign) => {
            if let [py::Expr::Name(name)] = assign.targets.as_slice() {
                Ok(Stmt::Assign {
                    target: name.id.to_string(),
                    value: lower_expr(&assign.value)?,
                })
            } else {
                Ok(skip_stmt("assignment with a non-name or multiple targets"))
            }
        }
        py::Stmt::Expr(expr) => Ok(Stmt::Expr(lower_expr(&expr.value)?)),
        py::Stmt::If(if_stmt) => Ok(Stmt::If {
            test: lower_expr(&if_stmt.test)?,
            body: lower_stmts(&if_stmt.body)?,
            orelse: lower_stmts(&if_stmt.orelse)?,
        }),
        py::Stmt::While(while_stmt) => {
            if !while_stmt.orelse.is_empty() {
                warn!("dropping `else` clause on while loop");
            }
            Ok(Stmt::While {
                test: lower_expr(&while_stmt.test)?,
                body: lower_stmts(&while_stmt.body)?,
            })
        }
        py::Stmt::For(for_stmt) => {
            if !for_stmt.orelse.is_empty() {
                warn!("dropping `else` clause on for loop");
            }
            if let py::Expr::Name(name) = for_stmt.target.as_ref() {
                Ok(Stmt::For {
                    target: name.id.to_string(),
                    iter: lower_expr(&for_stmt.iter)?,
                    body: lower_stmts(&for_stmt.body)?,
                })
            } else {
                Ok(skip_stmt("for loop with a non-name target"))
            }
        }
        py::Stmt::FunctionDef(def) => {
            let args: Vec<String> = def
                .args
                .args
                .iter()
                .map(|arg| arg.def.arg.to_string())
                .collect();

            let mut seen = HashSet::new();
            for arg in &args {
                if !seen.insert(arg.as_str()) {
                    return Err(CompileError::parse(format!(
                        "duplicate parameter `{arg}` in function `{}`",
                        def.name
                    )));
                }
            }

            Ok(Stmt::FunctionDef(FunctionDef {
                name: def.name.to_string(),
                args,
                body: lower_stmts(&def.body)?,
            }))
        }
        py::Stmt::Return(ret) => Ok(Stmt::Return(
            ret.value.as_deref().map(lower_expr).transpose()?,
        )),
        _ => Ok(skip_stmt("statement outside the supported subset")),
    }
}

fn lower_expr(expr: &py::Expr) -> Result<Expr, CompileError> {
    match expr {
        py::Expr::BinOp(binop) => Ok(Expr::Binary {
            left: Box::new(lower_expr(&binop.left)?),
            op: lower_bin_op(&binop.op)?,
            right: Box::new(lower_expr(&binop.right)?),
        }),
        py::Expr::UnaryOp(unary) => Ok(Expr::Unary {
            op: lower_unary_op(&unary.op)?,
            operand: Box::new(lower_expr(&unary.operand)?),
        }),
        py::Expr::Compare(compare) => {
            let ops: Vec<CmpOp> = compare
                .ops
                .iter()
                .map(lower_cmp_op)
                .collect::<Result<_, _>>()?;
            let comparators: Vec<Expr> = compare
                .comparators
                .iter()
                .map(lower_expr)
                .collect::<Result<_, _>>()?;
            Ok(Expr::Compare {
                left: Box::new(lower_expr(&compare.left)?),
                ops,
                comparators,
            })
        }
        py::Expr::BoolOp(boolop) => {
            let op = match boolop.op {
                py::BoolOp::And => LogicalOp::And,
                py::BoolOp::Or => LogicalOp::Or,
            };
            let values: Vec<Expr> = boolop
                .values
                .iter()
                .map(lower_expr)
                .collect::<Result<_, _>>()?;
            Ok(Expr::Logical { op, values })
        }
        py::Expr::Call(call) => {
            let py::Expr::Name(func) = call.func.as_ref() else {
                return Ok(skip_expr("call through a non-name callee"));
            };
            if !call.keywords.is_empty() {
                return Ok(skip_expr("call with keyword arguments"));
            }
            let args: Vec<Expr> = call.args.iter().map(lower_expr).collect::<Result<_, _>>()?;
            Ok(Expr::Call {
                func: func.id.to_string(),
                args,
            })
        }
        py::Expr::Name(name) => Ok(Expr::Name(name.id.to_string())),
        py::Expr::Constant(constant) => lower_constant(&constant.value),
        py::Expr::List(list) => {
            let elts: Vec<Expr> = list.elts.iter().map(lower_expr).collect::<Result<_, _>>()?;
            Ok(Expr::List(elts))
        }
        _ => Ok(skip_expr("expression outside the supported subset")),
    }
}

fn lower_constant(value: &py::Constant) -> Result<Expr, CompileError> {
    match value {
        py::Constant::None => Ok(Expr::Constant(Literal::Null)),
        py::Constant::Bool(b) => Ok(Expr::Constant(Literal::Bool(*b))),
        py::Constant::Str(s) => Ok(Expr::Constant(Literal::Str(s.clone()))),
        py::Constant::Int(i) => i
            .to_i64()
            .map(|i| Expr::Constant(Literal::Int(i)))
            .ok_or_else(|| {
                CompileError::parse(format!("integer literal {i} does not fit in 64 bits"))
            }),
        py::Constant::Float(f) => Ok(Expr::Constant(Literal::Float(*f))),
        _ => Ok(skip_expr("literal outside the supported subset")),
    }
}

fn lower_bin_op(op: &py::Operator) -> Result<BinOp, CompileError> {
    match op {
        py::Operator::Add => Ok(BinOp::Add),
        py::Operator::Sub => Ok(BinOp::Sub),
        py::Operator::Mult => Ok(BinOp::Mul),
        py::Operator::Div => Ok(BinOp::Div),
        py::Operator::Mod => Ok(BinOp::Mod),
        other => Err(CompileError::parse(format!(
            "unsupported binary operator {other:?}"
        ))),
    }
}

fn lower_unary_op(op: &py::UnaryOp) -> Result<UnaryOp, CompileError> {
    match op {
        py::UnaryOp::Not => Ok(UnaryOp::Not),
        py::UnaryOp::USub => Ok(UnaryOp::Neg),
        other => Err(CompileError::parse(format!(
            "unsupported unary operator {other:?}"
        ))),
    }
}

fn lower_cmp_op(op: &py::CmpOp) -> Result<CmpOp, CompileError> {
    match op {
        py::CmpOp::Eq => Ok(CmpOp::Eq),
        py::CmpOp::NotEq => Ok(CmpOp::Ne),
        py::CmpOp::Lt => Ok(CmpOp::Lt),
        py::CmpOp::LtE => Ok(CmpOp::Le),
        py::CmpOp::Gt => Ok(CmpOp::Gt),
        py::CmpOp::GtE => Ok(CmpOp::Ge),
        other => Err(CompileError::parse(format!(
            "unsupported comparison operator {other:?}"
        ))),
    }
}

fn skip_stmt(what: &str) -> Stmt {
    warn!("skipping {what}");
    Stmt::null()
}

fn skip_expr(what: &str) -> Expr {
    warn!("skipping {what}");
    Expr::Constant(Literal::Null)
}
