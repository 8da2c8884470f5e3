//! AST → bytecode generation.
//!
//! A module compiles to: a `JMP` over the function bodies (patched to the
//! main start), every module-level function in order of appearance, then the
//! remaining statements. Each expression leaves exactly one value on the VM
//! stack; statements are stack-neutral except where the instruction set
//! dictates otherwise (see the expression-statement POP convention below).
//!
//! Calls to user functions emit their operand through the same patch
//! mechanism as jumps, so a function may be referenced before the emitter
//! reaches its definition.

use std::collections::HashSet;

use carbn_core::ast::{BinOp, CmpOp, Expr, FunctionDef, Literal, LogicalOp, Module, Stmt, UnaryOp};
use carbn_core::error::CompileError;
use carbn_core::pipeline::Backend;
use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::buffer::{BytecodeBuffer, OperandPatch};
use crate::opcode::OpCode;

/// Bytecode backend — emits the stack-machine byte stream.
pub struct BytecodeBackend;

impl Backend for BytecodeBackend {
    fn name(&self) -> &str {
        "bytecode"
    }

    fn generate(&self, module: &Module) -> Result<Vec<u8>, CompileError> {
        generate(module)
    }
}

/// Compile a module to its byte stream.
pub fn generate(module: &Module) -> Result<Vec<u8>, CompileError> {
    let mut generator = CodeGenerator::new(module);
    generator.module(module)?;
    debug!("functions: {:?}", generator.function_addresses);
    debug!("variables: {:?}", generator.variables);
    generator.buf.finish()
}

struct CodeGenerator {
    buf: BytecodeBuffer,
    /// Module-level function names, known before emission starts.
    known_functions: HashSet<String>,
    /// Function name → absolute offset of its prologue.
    function_addresses: IndexMap<String, usize>,
    /// Call sites awaiting a function address.
    call_fixups: Vec<(String, OperandPatch)>,
    /// Flat variable namespace, in first-store order.
    variables: IndexSet<String>,
}

impl CodeGenerator {
    fn new(module: &Module) -> Self {
        let known_functions = module
            .body
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::FunctionDef(def) => Some(def.name.clone()),
                _ => None,
            })
            .collect();
        Self {
            buf: BytecodeBuffer::new(),
            known_functions,
            function_addresses: IndexMap::new(),
            call_fixups: Vec::new(),
            variables: IndexSet::new(),
        }
    }

    fn module(&mut self, module: &Module) -> Result<(), CompileError> {
        let main_patch = self.buf.reserve_operand(OpCode::Jmp);

        for stmt in &module.body {
            if let Stmt::FunctionDef(def) = stmt {
                self.function(def)?;
            }
        }

        let main_start = self.buf.offset();
        self.buf.patch(main_patch, main_start);

        for stmt in &module.body {
            if !matches!(stmt, Stmt::FunctionDef(_)) {
                self.stmt(stmt)?;
            }
        }

        for (name, patch) in std::mem::take(&mut self.call_fixups) {
            let addr = *self.function_addresses.get(&name).ok_or_else(|| {
                CompileError::codegen(format!("call to undefined function `{name}`"))
            })?;
            self.buf.patch(patch, addr);
        }

        Ok(())
    }

    fn function(&mut self, def: &FunctionDef) -> Result<(), CompileError> {
        self.function_addresses
            .insert(def.name.clone(), self.buf.offset());

        // Arguments are pushed in order, so storing in reverse declaration
        // order binds them correctly.
        for param in def.args.iter().rev() {
            self.store(param)?;
        }

        for stmt in &def.body {
            self.stmt(stmt)?;
        }

        // Guarantee a return value even without an explicit return.
        self.buf.op(OpCode::LoadNull);
        self.buf.op(OpCode::Ret);
        Ok(())
    }

    fn store(&mut self, name: &str) -> Result<(), CompileError> {
        self.buf.op(OpCode::Store);
        self.buf.str_arg(name)?;
        self.variables.insert(name.to_string());
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Assign { target, value } => {
                self.expr(value)?;
                self.store(target)
            }
            Stmt::Expr(value) => {
                self.expr(value)?;
                // Fixed convention of the instruction set: calls are treated
                // as leaving no net value to pop.
                if !matches!(value, Expr::Call { .. }) {
                    self.buf.op(OpCode::Pop);
                }
                Ok(())
            }
            Stmt::If { test, body, orelse } => self.if_stmt(test, body, orelse),
            Stmt::While { test, body } => self.while_stmt(test, body),
            Stmt::For { target, iter, body } => self.for_stmt(target, iter, body),
            Stmt::FunctionDef(def) => Err(CompileError::codegen(format!(
                "function `{}` defined outside module level",
                def.name
            ))),
            Stmt::Return(value) => {
                match value {
                    Some(v) => self.expr(v)?,
                    None => self.buf.op(OpCode::LoadNull),
                }
                self.buf.op(OpCode::Ret);
                Ok(())
            }
        }
    }

    fn if_stmt(
        &mut self,
        test: &Expr,
        body: &[Stmt],
        orelse: &[Stmt],
    ) -> Result<(), CompileError> {
        self.expr(test)?;
        let skip_body = self.buf.reserve_operand(OpCode::JmpIfFalse);

        for stmt in body {
            self.stmt(stmt)?;
        }

        if orelse.is_empty() {
            let end = self.buf.offset();
            self.buf.patch(skip_body, end);
        } else {
            let skip_else = self.buf.reserve_operand(OpCode::Jmp);
            let else_start = self.buf.offset();
            self.buf.patch(skip_body, else_start);

            for stmt in orelse {
                self.stmt(stmt)?;
            }

            let end = self.buf.offset();
            self.buf.patch(skip_else, end);
        }
        Ok(())
    }

    fn while_stmt(&mut self, test: &Expr, body: &[Stmt]) -> Result<(), CompileError> {
        let loop_start = self.buf.offset();
        self.expr(test)?;
        let exit = self.buf.reserve_operand(OpCode::JmpIfFalse);

        for stmt in body {
            self.stmt(stmt)?;
        }

        self.buf.op(OpCode::Jmp);
        self.buf.u64_arg(loop_start as u64);

        let end = self.buf.offset();
        self.buf.patch(exit, end);
        Ok(())
    }

    /// The only supported shape is `for target in range(start, end[, ...])`.
    /// A hidden counter drives the loop; the end expression is re-evaluated
    /// each iteration.
    fn for_stmt(&mut self, target: &str, iter: &Expr, body: &[Stmt]) -> Result<(), CompileError> {
        let (start, end) = match iter {
            Expr::Call { func, args } if func == "range" && args.len() >= 2 => {
                (&args[0], &args[1])
            }
            _ => {
                return Err(CompileError::codegen(format!(
                    "for loop over `{target}` requires a `range(start, end)` iterator"
                )))
            }
        };

        let counter = format!("__{target}_counter");

        self.expr(start)?;
        self.store(&counter)?;

        let loop_start = self.buf.offset();

        self.buf.op(OpCode::LoadVar);
        self.buf.str_arg(&counter)?;
        self.expr(end)?;
        self.buf.op(OpCode::Ge);

        let exit = self.buf.reserve_operand(OpCode::JmpIfTrue);

        self.buf.op(OpCode::LoadVar);
        self.buf.str_arg(&counter)?;
        self.store(target)?;

        for stmt in body {
            self.stmt(stmt)?;
        }

        self.buf.op(OpCode::LoadVar);
        self.buf.str_arg(&counter)?;
        self.buf.op(OpCode::LoadInt);
        self.buf.i64_arg(1);
        self.buf.op(OpCode::Add);
        self.store(&counter)?;
        self.buf.op(OpCode::Jmp);
        self.buf.u64_arg(loop_start as u64);

        let end_offset = self.buf.offset();
        self.buf.patch(exit, end_offset);
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Binary { left, op, right } => {
                self.expr(left)?;
                self.expr(right)?;
                self.buf.op(bin_opcode(*op));
                Ok(())
            }
            Expr::Unary { op, operand } => {
                self.expr(operand)?;
                match op {
                    UnaryOp::Not => self.buf.op(OpCode::Not),
                    UnaryOp::Neg => {
                        self.buf.op(OpCode::LoadInt);
                        self.buf.i64_arg(-1);
                        self.buf.op(OpCode::Mul);
                    }
                }
                Ok(())
            }
            Expr::Compare {
                left,
                ops,
                comparators,
            } => {
                // Chained comparisons emit back to back; the result is the
                // outcome of the last comparison. Documented deviation from
                // the surface language.
                self.expr(left)?;
                for (op, comparator) in ops.iter().zip(comparators) {
                    self.expr(comparator)?;
                    self.buf.op(cmp_opcode(*op));
                }
                Ok(())
            }
            Expr::Logical { op, values } => {
                // Both sides always evaluate; no short-circuiting at
                // emission time.
                let opcode = match op {
                    LogicalOp::And => OpCode::And,
                    LogicalOp::Or => OpCode::Or,
                };
                self.expr(&values[0])?;
                for value in &values[1..] {
                    self.expr(value)?;
                    self.buf.op(opcode);
                }
                Ok(())
            }
            Expr::Call { func, args } => self.call(func, args),
            Expr::Name(id) => {
                self.buf.op(OpCode::LoadVar);
                self.buf.str_arg(id)
            }
            Expr::Constant(lit) => self.constant(lit),
            Expr::List(elts) => {
                for elt in elts {
                    self.expr(elt)?;
                }
                self.buf.op(OpCode::BuildList);
                self.buf.u64_arg(elts.len() as u64);
                Ok(())
            }
        }
    }

    fn constant(&mut self, lit: &Literal) -> Result<(), CompileError> {
        match lit {
            Literal::Int(i) => {
                self.buf.op(OpCode::LoadInt);
                self.buf.i64_arg(*i);
            }
            Literal::Float(f) => {
                self.buf.op(OpCode::LoadFloat);
                self.buf.f64_arg(*f);
            }
            Literal::Bool(b) => {
                self.buf.op(OpCode::LoadBool);
                self.buf.u8_arg(*b as u8);
            }
            Literal::Str(s) => {
                self.buf.op(OpCode::LoadConst);
                self.buf.str_arg(s)?;
            }
            Literal::Null => self.buf.op(OpCode::LoadNull),
        }
        Ok(())
    }

    fn call(&mut self, func: &str, args: &[Expr]) -> Result<(), CompileError> {
        match func {
            // Builtins shadow user definitions.
            "print" => {
                if args.is_empty() {
                    self.buf.op(OpCode::LoadConst);
                    self.buf.str_arg("")?;
                } else {
                    for arg in args {
                        self.expr(arg)?;
                    }
                }
                self.buf.op(OpCode::Print);
                Ok(())
            }
            "input" => {
                if !args.is_empty() {
                    return Err(CompileError::codegen("input() takes no arguments"));
                }
                self.buf.op(OpCode::Stdin);
                Ok(())
            }
            "len" => {
                let [arg] = args else {
                    return Err(CompileError::codegen("len() takes exactly one argument"));
                };
                self.expr(arg)?;
                self.buf.op(OpCode::ArrayLen);
                Ok(())
            }
            "int" | "float" => {
                let [arg] = args else {
                    return Err(CompileError::codegen(format!(
                        "{func}() takes exactly one argument"
                    )));
                };
                self.expr(arg)?;
                self.buf.op(if func == "int" {
                    OpCode::CastInt
                } else {
                    OpCode::CastFloat
                });
                Ok(())
            }
            "range" => self.range_list(args),
            _ if self.known_functions.contains(func) => {
                for arg in args {
                    self.expr(arg)?;
                }
                let patch = self.buf.reserve_operand(OpCode::Call);
                self.call_fixups.push((func.to_string(), patch));
                Ok(())
            }
            _ => Err(CompileError::codegen(format!(
                "call to unknown function `{func}`"
            ))),
        }
    }

    /// `range` outside a `for` loop materializes as a list, which requires
    /// compile-time integer bounds.
    fn range_list(&mut self, args: &[Expr]) -> Result<(), CompileError> {
        let bounds = match args {
            [Expr::Constant(Literal::Int(start)), Expr::Constant(Literal::Int(end)), ..] => {
                Some((*start, *end))
            }
            _ => None,
        };
        let Some((start, end)) = bounds else {
            return Err(CompileError::codegen(
                "range() outside a for loop requires integer literal bounds",
            ));
        };

        let mut count: u64 = 0;
        for value in start..end {
            self.buf.op(OpCode::LoadInt);
            self.buf.i64_arg(value);
            count += 1;
        }
        self.buf.op(OpCode::BuildList);
        self.buf.u64_arg(count);
        Ok(())
    }
}

fn bin_opcode(op: BinOp) -> OpCode {
    match op {
        BinOp::Add => OpCode::Add,
        BinOp::Sub => OpCode::Sub,
        BinOp::Mul => OpCode::Mul,
        BinOp::Div => OpCode::Div,
        BinOp::Mod => OpCode::Mod,
    }
}

fn cmp_opcode(op: CmpOp) -> OpCode {
    match op {
        CmpOp::Eq => OpCode::Eq,
        CmpOp::Ne => OpCode::Ne,
        CmpOp::Lt => OpCode::Lt,
        CmpOp::Le => OpCode::Le,
        CmpOp::Gt => OpCode::Gt,
        CmpOp::Ge => OpCode::Ge,
    }
}
