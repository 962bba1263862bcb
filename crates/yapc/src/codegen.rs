use std::collections::HashMap;

use yap_bytecode::{FuncSig, Op, Program, Type, Value};

use crate::ast::{self, BinOp, Expr, FnDef, Stmt, UnOp};
use crate::error::CompileError;

pub fn emit(program: &ast::Program) -> Result<Program, CompileError> {
    let mut emitter = Emitter::new();
    emitter.emit_program(program)?;
    Ok(emitter.finish())
}

struct Emitter {
    program: Program,
    label_counter: u32,
    /// Slot table for the scope being compiled; swapped out wholesale
    /// for the duration of a function body.
    slots: HashMap<String, u32>,
    /// Monotonic within a scope — slots are never reused.
    next_slot: u32,
    /// Innermost loop targets for `break` / `continue`, parallel stacks.
    break_labels: Vec<String>,
    continue_labels: Vec<String>,
}

impl Emitter {
    fn new() -> Self {
        Emitter {
            program: Program::new(),
            label_counter: 0,
            slots: HashMap::new(),
            next_slot: 0,
            break_labels: Vec::new(),
            continue_labels: Vec::new(),
        }
    }

    fn finish(self) -> Program {
        self.program
    }

    fn fresh_label(&mut self) -> String {
        let label = format!("L{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    fn push(&mut self, op: Op) {
        self.program.code.push(op);
    }

    fn alloc_slot(&mut self, name: &str) -> u32 {
        let slot = self.next_slot;
        self.slots.insert(name.to_string(), slot);
        self.next_slot += 1;
        slot
    }

    fn lookup_slot(&self, name: &str) -> Result<u32, CompileError> {
        self.slots
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::Codegen(format!("undefined variable: {name}")))
    }

    fn emit_program(&mut self, program: &ast::Program) -> Result<(), CompileError> {
        for stmt in &program.stmts {
            self.emit_stmt(stmt)?;
        }
        self.push(Op::Exit);
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Declaration { ty, name, value } => {
                match value {
                    Some(e) => self.emit_expr(e)?,
                    // Bare container declarations start empty
                    None => match ty {
                        Type::Stack(_) => self.push(Op::NewStack),
                        Type::Queue(_) => self.push(Op::NewQueue),
                        Type::Map(_, _) => self.push(Op::NewMap),
                        other => {
                            return Err(CompileError::Codegen(format!(
                                "declaration of '{name}: {other}' has no initializer"
                            )));
                        }
                    },
                }
                let slot = self.alloc_slot(name);
                self.push(Op::Store(slot));
            }
            Stmt::Assignment { name, value } => {
                self.emit_expr(value)?;
                let slot = self.lookup_slot(name)?;
                self.push(Op::Store(slot));
            }
            Stmt::IndexAssign { target, index, value } => {
                self.emit_expr(target)?;
                self.emit_expr(index)?;
                self.emit_expr(value)?;
                self.push(Op::IdxSet);
            }
            Stmt::Cond { arms, otherwise } => {
                let end = self.fresh_label();
                for (condition, body) in arms {
                    let next = self.fresh_label();
                    self.emit_expr(condition)?;
                    self.push(Op::Jz(next.clone()));
                    for stmt in body {
                        self.emit_stmt(stmt)?;
                    }
                    self.push(Op::Jmp(end.clone()));
                    self.push(Op::Label(next));
                }
                if let Some(body) = otherwise {
                    for stmt in body {
                        self.emit_stmt(stmt)?;
                    }
                }
                self.push(Op::Label(end));
            }
            Stmt::While { condition, body } => {
                let start = self.fresh_label();
                let end = self.fresh_label();
                self.push(Op::Label(start.clone()));
                self.emit_expr(condition)?;
                self.push(Op::Jz(end.clone()));

                self.break_labels.push(end.clone());
                self.continue_labels.push(start.clone());
                for stmt in body {
                    self.emit_stmt(stmt)?;
                }
                self.break_labels.pop();
                self.continue_labels.pop();

                self.push(Op::Jmp(start));
                self.push(Op::Label(end));
            }
            Stmt::For { init, condition, step, body } => {
                self.emit_stmt(init)?;
                let start = self.fresh_label();
                let step_label = self.fresh_label();
                let end = self.fresh_label();

                self.push(Op::Label(start.clone()));
                self.emit_expr(condition)?;
                self.push(Op::Jz(end.clone()));

                // `continue` re-runs the step, not the condition
                self.break_labels.push(end.clone());
                self.continue_labels.push(step_label.clone());
                for stmt in body {
                    self.emit_stmt(stmt)?;
                }
                self.break_labels.pop();
                self.continue_labels.pop();

                self.push(Op::Label(step_label));
                self.emit_stmt(step)?;
                self.push(Op::Jmp(start));
                self.push(Op::Label(end));
            }
            Stmt::Break => {
                let target = self
                    .break_labels
                    .last()
                    .cloned()
                    .ok_or_else(|| CompileError::Codegen("'break' outside of a loop".into()))?;
                self.push(Op::Jmp(target));
            }
            Stmt::Continue => {
                let target = self.continue_labels.last().cloned().ok_or_else(|| {
                    CompileError::Codegen("'continue' outside of a loop".into())
                })?;
                self.push(Op::Jmp(target));
            }
            Stmt::Function(f) => self.emit_function(f)?,
            Stmt::Return(value) => {
                match value {
                    Some(e) => self.emit_expr(e)?,
                    None => self.push(Op::Push(Value::Void)),
                }
                self.push(Op::Ret);
            }
            Stmt::Print(values) => {
                for value in values {
                    self.emit_expr(value)?;
                    self.push(Op::Print);
                }
                self.push(Op::Flush);
            }
            Stmt::StructDef { .. } => {}
            Stmt::Expr(e) => {
                self.emit_expr(e)?;
                self.push(Op::Pop);
            }
        }
        Ok(())
    }

    /// Function bodies are guarded by a jump so top-to-bottom control
    /// flow never falls into them; they only run via CALL.
    fn emit_function(&mut self, f: &FnDef) -> Result<(), CompileError> {
        let skip = self.fresh_label();
        self.push(Op::Jmp(skip.clone()));
        self.push(Op::Label(f.name.clone()));

        // Fresh slot table, parameters pre-allocated at 0..k-1
        let saved_slots = std::mem::take(&mut self.slots);
        let saved_next = std::mem::replace(&mut self.next_slot, 0);
        let saved_breaks = std::mem::take(&mut self.break_labels);
        let saved_continues = std::mem::take(&mut self.continue_labels);
        for (_, name) in &f.params {
            self.alloc_slot(name);
        }

        for stmt in &f.body {
            self.emit_stmt(stmt)?;
        }
        // Implicit `yeet void` for bodies without a trailing return
        if self.program.code.last() != Some(&Op::Ret) {
            self.push(Op::Push(Value::Void));
            self.push(Op::Ret);
        }

        self.slots = saved_slots;
        self.next_slot = saved_next;
        self.break_labels = saved_breaks;
        self.continue_labels = saved_continues;

        self.push(Op::Label(skip));
        self.program.functions.insert(
            f.name.clone(),
            FuncSig {
                entry: f.name.clone(),
                params: f.params.iter().map(|(ty, _)| ty.clone()).collect(),
                ret: f.ret.clone(),
            },
        );
        Ok(())
    }

    fn emit_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Int(n) => self.push(Op::Push(Value::Int(*n))),
            Expr::Float(x) => self.push(Op::Push(Value::Float(*x))),
            Expr::Str(s) => self.push(Op::Push(Value::Str(s.clone()))),
            Expr::Bool(t) => self.push(Op::Push(Value::Bool(*t))),
            Expr::Var(name) => {
                let slot = self.lookup_slot(name)?;
                self.push(Op::Load(slot));
            }
            Expr::Binary { op: BinOp::And, left, right } => {
                // Short-circuit: skip the right operand when the left is
                // already cap
                let end = self.fresh_label();
                self.emit_expr(left)?;
                self.push(Op::Dup);
                self.push(Op::Jz(end.clone()));
                self.push(Op::Pop);
                self.emit_expr(right)?;
                self.push(Op::Label(end));
            }
            Expr::Binary { op: BinOp::Or, left, right } => {
                let end = self.fresh_label();
                self.emit_expr(left)?;
                self.push(Op::Dup);
                self.push(Op::Jnz(end.clone()));
                self.push(Op::Pop);
                self.emit_expr(right)?;
                self.push(Op::Label(end));
            }
            Expr::Binary { op, left, right } => {
                self.emit_expr(left)?;
                self.emit_expr(right)?;
                self.push(match op {
                    BinOp::Lt => Op::CmpLt,
                    BinOp::Gt => Op::CmpGt,
                    BinOp::Le => Op::CmpLe,
                    BinOp::Ge => Op::CmpGe,
                    BinOp::Eq => Op::CmpEq,
                    BinOp::Ne => Op::CmpNe,
                    BinOp::BitAnd => Op::BitAnd,
                    BinOp::BitOr => Op::BitOr,
                    BinOp::Add => Op::Add,
                    BinOp::Sub => Op::Sub,
                    BinOp::Mod => Op::Mod,
                    BinOp::Mul => Op::Mul,
                    BinOp::Div => Op::Div,
                    BinOp::FloorDiv => Op::FloorDiv,
                    BinOp::Pow => Op::Pow,
                    BinOp::And | BinOp::Or => unreachable!("handled above"),
                });
            }
            Expr::Unary { op, expr } => {
                self.emit_expr(expr)?;
                self.push(match op {
                    UnOp::Not => Op::LNot,
                    UnOp::BitNot => Op::BitNot,
                });
            }
            Expr::Paren(inner) => self.emit_expr(inner)?,
            Expr::ArrayLit(items) => {
                for item in items {
                    self.emit_expr(item)?;
                }
                self.push(Op::MakeArray(items.len() as u32));
            }
            Expr::Index { target, index } => {
                self.emit_expr(target)?;
                self.emit_expr(index)?;
                self.push(Op::IdxGet);
            }
            Expr::Call { name, args } => {
                for arg in args {
                    self.emit_expr(arg)?;
                }
                self.push(Op::Call(name.clone()));
            }
            Expr::Append { target, value } => {
                self.emit_expr(target)?;
                self.emit_expr(value)?;
                self.push(Op::Append);
            }
            Expr::Delete { target, index } => {
                self.emit_expr(target)?;
                self.emit_expr(index)?;
                self.push(Op::Delete);
            }
            Expr::Len(target) => {
                self.emit_expr(target)?;
                self.push(Op::Len);
            }
            Expr::SeqPush { target, value } => {
                self.emit_expr(target)?;
                self.emit_expr(value)?;
                self.push(Op::SeqPush);
            }
            Expr::SeqPop(target) => {
                self.emit_expr(target)?;
                self.push(Op::SeqPop);
            }
            Expr::Input(ty) => self.push(Op::Input(ty.clone())),
        }
        Ok(())
    }
}
