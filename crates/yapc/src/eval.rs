//! Tree-walking evaluator: the reference execution path, kept as a
//! cross-check against the bytecode pipeline. For any input-free
//! program, its printed output must match the VM's exactly.

use std::collections::HashMap;
use std::io::BufRead;

use thiserror::Error;
use yap_bytecode::{coerce_input, ops, Truth, Value};

use crate::ast::{BinOp, Expr, FnDef, Program, Stmt, UnOp};

const RECURSION_LIMIT: usize = 1000;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("name error: {0}")]
    Name(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("index {index} out of range for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("pop from an empty {0}")]
    ContainerUnderflow(&'static str),

    #[error("recursion limit of {0} exceeded")]
    RecursionLimit(usize),

    #[error("input error: {0}")]
    Input(String),
}

impl From<ops::OpError> for EvalError {
    fn from(e: ops::OpError) -> Self {
        match e {
            ops::OpError::DivisionByZero => EvalError::DivisionByZero,
            other => EvalError::Type(other.to_string()),
        }
    }
}

/// Statement outcome threaded up through blocks.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Evaluator {
    /// Variables of the active call frame (or top level). Flat, like
    /// the compiler's per-function slot table: a declaration inside a
    /// block persists for the rest of the frame. Swapped wholesale at
    /// call boundaries.
    frame: HashMap<String, Value>,
    functions: HashMap<String, FnDef>,
    line_buf: Vec<String>,
    output: Vec<String>,
    depth: usize,
    echo: bool,
    input: Box<dyn BufRead>,
}

/// Run a program against stdin, echoing output lines as they flush.
pub fn run(program: &Program) -> Result<Vec<String>, EvalError> {
    let mut evaluator = Evaluator::new();
    evaluator.run(program)?;
    Ok(evaluator.into_output())
}

impl Evaluator {
    pub fn new() -> Self {
        let mut ev = Self::with_input(Box::new(std::io::BufReader::new(std::io::stdin())));
        ev.echo = true;
        ev
    }

    /// Silent evaluator reading from the given source, used by tests.
    pub fn with_input(input: Box<dyn BufRead>) -> Self {
        Evaluator {
            frame: HashMap::new(),
            functions: HashMap::new(),
            line_buf: Vec::new(),
            output: Vec::new(),
            depth: 0,
            echo: false,
            input,
        }
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn into_output(self) -> Vec<String> {
        self.output
    }

    pub fn run(&mut self, program: &Program) -> Result<(), EvalError> {
        // Collect functions first so forward calls resolve
        for stmt in &program.stmts {
            if let Stmt::Function(f) = stmt {
                self.functions.insert(f.name.clone(), f.clone());
            }
        }
        for stmt in &program.stmts {
            self.eval_stmt(stmt)?;
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        self.frame
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::Name(format!("undefined variable: {name}")))
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        match self.frame.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(EvalError::Name(format!("undefined variable: {name}"))),
        }
    }

    fn flush_line(&mut self) {
        let line = self.line_buf.concat();
        if self.echo {
            println!("{line}");
        }
        self.output.push(line);
        self.line_buf.clear();
    }

    fn eval_block(&mut self, body: &[Stmt]) -> Result<Flow, EvalError> {
        for stmt in body {
            let flow = self.eval_stmt(stmt)?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn eval_stmt(&mut self, stmt: &Stmt) -> Result<Flow, EvalError> {
        match stmt {
            Stmt::Declaration { ty, name, value } => {
                let value = match value {
                    Some(e) => self.eval_expr(e)?,
                    None => match ty {
                        yap_bytecode::Type::Stack(_) => Value::new_stack(),
                        yap_bytecode::Type::Queue(_) => Value::new_queue(),
                        yap_bytecode::Type::Map(_, _) => Value::new_map(),
                        other => {
                            return Err(EvalError::Type(format!(
                                "declaration of '{name}: {other}' has no initializer"
                            )));
                        }
                    },
                };
                self.frame.insert(name.clone(), value);
            }
            Stmt::Assignment { name, value } => {
                let value = self.eval_expr(value)?;
                self.assign(name, value)?;
            }
            Stmt::IndexAssign { target, index, value } => {
                let coll = self.eval_expr(target)?;
                let index = self.eval_expr(index)?;
                let value = self.eval_expr(value)?;
                self.index_set(&coll, &index, value)?;
            }
            Stmt::Cond { arms, otherwise } => {
                for (condition, body) in arms {
                    if self.truthy(condition)? {
                        return self.eval_block(body);
                    }
                }
                if let Some(body) = otherwise {
                    return self.eval_block(body);
                }
            }
            Stmt::While { condition, body } => {
                while self.truthy(condition)? {
                    match self.eval_block(body)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
            }
            Stmt::For { init, condition, step, body } => {
                self.eval_stmt(init)?;
                while self.truthy(condition)? {
                    match self.eval_block(body)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                    self.eval_stmt(step)?;
                }
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Function(f) => {
                self.functions.insert(f.name.clone(), f.clone());
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(e) => self.eval_expr(e)?,
                    None => Value::Void,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Print(values) => {
                for value in values {
                    let v = self.eval_expr(value)?;
                    self.line_buf.push(v.to_string());
                }
                self.flush_line();
            }
            Stmt::StructDef { .. } => {}
            Stmt::Expr(e) => {
                self.eval_expr(e)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn truthy(&mut self, condition: &Expr) -> Result<bool, EvalError> {
        match self.eval_expr(condition)? {
            Value::Bool(t) => Ok(t.is_true()),
            other => Err(EvalError::Type(format!(
                "condition must be bool, got {}",
                other.type_name()
            ))),
        }
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Float(x) => Ok(Value::Float(*x)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(t) => Ok(Value::Bool(*t)),
            Expr::Var(name) => self.lookup(name),
            Expr::Binary { op: BinOp::And, left, right } => {
                let l = self.eval_expr(left)?;
                match l {
                    // Short-circuit: cap wins without touching the right
                    Value::Bool(Truth::Cap) => Ok(l),
                    Value::Bool(Truth::Nocap) => self.eval_expr(right),
                    other => Err(EvalError::Type(format!(
                        "cannot apply 'and' to {}",
                        other.type_name()
                    ))),
                }
            }
            Expr::Binary { op: BinOp::Or, left, right } => {
                let l = self.eval_expr(left)?;
                match l {
                    Value::Bool(Truth::Nocap) => Ok(l),
                    Value::Bool(Truth::Cap) => self.eval_expr(right),
                    other => Err(EvalError::Type(format!(
                        "cannot apply 'or' to {}",
                        other.type_name()
                    ))),
                }
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                let result = match op {
                    BinOp::Lt => ops::lt(&l, &r)?,
                    BinOp::Gt => ops::gt(&l, &r)?,
                    BinOp::Le => ops::le(&l, &r)?,
                    BinOp::Ge => ops::ge(&l, &r)?,
                    BinOp::Eq => ops::eq(&l, &r),
                    BinOp::Ne => ops::ne(&l, &r),
                    BinOp::BitAnd => ops::bit_and(&l, &r)?,
                    BinOp::BitOr => ops::bit_or(&l, &r)?,
                    BinOp::Add => ops::add(&l, &r)?,
                    BinOp::Sub => ops::sub(&l, &r)?,
                    BinOp::Mod => ops::modulo(&l, &r)?,
                    BinOp::Mul => ops::mul(&l, &r)?,
                    BinOp::Div => ops::div(&l, &r)?,
                    BinOp::FloorDiv => ops::floor_div(&l, &r)?,
                    BinOp::Pow => ops::pow(&l, &r)?,
                    BinOp::And | BinOp::Or => unreachable!("handled above"),
                };
                Ok(result)
            }
            Expr::Unary { op, expr } => {
                let v = self.eval_expr(expr)?;
                match op {
                    UnOp::Not => match v {
                        Value::Bool(t) => Ok(Value::Bool(t.negate())),
                        other => Err(EvalError::Type(format!(
                            "cannot apply 'not' to {}",
                            other.type_name()
                        ))),
                    },
                    UnOp::BitNot => Ok(ops::bit_not(&v)?),
                }
            }
            Expr::Paren(inner) => self.eval_expr(inner),
            Expr::ArrayLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item)?);
                }
                Ok(Value::array(values))
            }
            Expr::Index { target, index } => {
                let coll = self.eval_expr(target)?;
                let index = self.eval_expr(index)?;
                self.index_get(&coll, &index)
            }
            Expr::Call { name, args } => {
                let f = self
                    .functions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvalError::Name(format!("undefined function: {name}")))?;
                if f.params.len() != args.len() {
                    return Err(EvalError::Type(format!(
                        "function '{name}' takes {} argument(s), got {}",
                        f.params.len(),
                        args.len()
                    )));
                }
                if self.depth >= RECURSION_LIMIT {
                    return Err(EvalError::RecursionLimit(RECURSION_LIMIT));
                }

                let mut frame = HashMap::new();
                for ((_, pname), arg) in f.params.iter().zip(args) {
                    frame.insert(pname.clone(), self.eval_expr(arg)?);
                }

                // Isolated environment: the body sees only its parameters
                let saved = std::mem::replace(&mut self.frame, frame);
                self.depth += 1;
                let mut result = Value::Void;
                let mut error = None;
                for stmt in &f.body {
                    match self.eval_stmt(stmt) {
                        Ok(Flow::Return(v)) => {
                            result = v;
                            break;
                        }
                        Ok(Flow::Normal) => {}
                        Ok(Flow::Break | Flow::Continue) => {
                            error = Some(EvalError::Type(
                                "'break'/'continue' escaped a function body".into(),
                            ));
                            break;
                        }
                        Err(e) => {
                            error = Some(e);
                            break;
                        }
                    }
                }
                self.depth -= 1;
                self.frame = saved;
                match error {
                    Some(e) => Err(e),
                    None => Ok(result),
                }
            }
            Expr::Append { target, value } => {
                let coll = self.eval_expr(target)?;
                let value = self.eval_expr(value)?;
                match &coll {
                    Value::Array(items) => {
                        items.borrow_mut().push(value);
                        Ok(coll.clone())
                    }
                    other => Err(EvalError::Type(format!(
                        "'append' on {}",
                        other.type_name()
                    ))),
                }
            }
            Expr::Delete { target, index } => {
                let coll = self.eval_expr(target)?;
                let index = self.eval_expr(index)?;
                match (&coll, &index) {
                    (Value::Array(items), Value::Int(i)) => {
                        let len = items.borrow().len();
                        let idx = usize::try_from(*i)
                            .ok()
                            .filter(|&idx| idx < len)
                            .ok_or(EvalError::IndexOutOfBounds { index: *i, len })?;
                        items.borrow_mut().remove(idx);
                        Ok(coll.clone())
                    }
                    (Value::Map(entries), key) => {
                        let key = key.as_key().ok_or_else(|| {
                            EvalError::Type(format!(
                                "{} cannot key a hashmap",
                                key.type_name()
                            ))
                        })?;
                        entries
                            .borrow_mut()
                            .remove(&key)
                            .ok_or_else(|| EvalError::KeyNotFound(key.to_string()))?;
                        Ok(coll.clone())
                    }
                    (other, _) => Err(EvalError::Type(format!(
                        "'delete' on {}",
                        other.type_name()
                    ))),
                }
            }
            Expr::Len(target) => {
                let coll = self.eval_expr(target)?;
                let len = match &coll {
                    Value::Array(items) | Value::Stack(items) => items.borrow().len(),
                    Value::Queue(items) => items.borrow().len(),
                    Value::Map(entries) => entries.borrow().len(),
                    Value::Str(s) => s.chars().count(),
                    other => {
                        return Err(EvalError::Type(format!(
                            "'len' on {}",
                            other.type_name()
                        )));
                    }
                };
                Ok(Value::Int(len as i64))
            }
            Expr::SeqPush { target, value } => {
                let coll = self.eval_expr(target)?;
                let value = self.eval_expr(value)?;
                match &coll {
                    Value::Stack(items) => {
                        items.borrow_mut().push(value);
                        Ok(coll.clone())
                    }
                    Value::Queue(items) => {
                        items.borrow_mut().push_back(value);
                        Ok(coll.clone())
                    }
                    other => Err(EvalError::Type(format!(
                        "'push' on {}",
                        other.type_name()
                    ))),
                }
            }
            Expr::SeqPop(target) => {
                let coll = self.eval_expr(target)?;
                match &coll {
                    Value::Stack(items) => items
                        .borrow_mut()
                        .pop()
                        .ok_or(EvalError::ContainerUnderflow("stack")),
                    Value::Queue(items) => items
                        .borrow_mut()
                        .pop_front()
                        .ok_or(EvalError::ContainerUnderflow("queue")),
                    other => Err(EvalError::Type(format!(
                        "'pop' on {}",
                        other.type_name()
                    ))),
                }
            }
            Expr::Input(ty) => {
                let mut line = String::new();
                self.input
                    .read_line(&mut line)
                    .map_err(|e| EvalError::Input(e.to_string()))?;
                coerce_input(ty, &line).map_err(EvalError::Input)
            }
        }
    }

    fn index_get(&self, coll: &Value, index: &Value) -> Result<Value, EvalError> {
        match (coll, index) {
            (Value::Array(items), Value::Int(i)) => {
                let items = items.borrow();
                usize::try_from(*i)
                    .ok()
                    .and_then(|idx| items.get(idx).cloned())
                    .ok_or(EvalError::IndexOutOfBounds { index: *i, len: items.len() })
            }
            (Value::Str(s), Value::Int(i)) => {
                let len = s.chars().count();
                usize::try_from(*i)
                    .ok()
                    .and_then(|idx| s.chars().nth(idx))
                    .map(|c| Value::Str(c.to_string()))
                    .ok_or(EvalError::IndexOutOfBounds { index: *i, len })
            }
            (Value::Map(entries), key) => {
                let key = key
                    .as_key()
                    .ok_or_else(|| {
                        EvalError::Type(format!("{} cannot key a hashmap", key.type_name()))
                    })?;
                entries
                    .borrow()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| EvalError::KeyNotFound(key.to_string()))
            }
            (other, _) => Err(EvalError::Type(format!(
                "cannot index a {}",
                other.type_name()
            ))),
        }
    }

    fn index_set(&self, coll: &Value, index: &Value, value: Value) -> Result<(), EvalError> {
        match (coll, index) {
            (Value::Array(items), Value::Int(i)) => {
                let mut items = items.borrow_mut();
                let len = items.len();
                let slot = usize::try_from(*i)
                    .ok()
                    .and_then(|idx| items.get_mut(idx))
                    .ok_or(EvalError::IndexOutOfBounds { index: *i, len })?;
                *slot = value;
                Ok(())
            }
            (Value::Map(entries), key) => {
                let key = key
                    .as_key()
                    .ok_or_else(|| {
                        EvalError::Type(format!("{} cannot key a hashmap", key.type_name()))
                    })?;
                entries.borrow_mut().insert(key, value);
                Ok(())
            }
            (other, _) => Err(EvalError::Type(format!(
                "cannot index-assign a {}",
                other.type_name()
            ))),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}
