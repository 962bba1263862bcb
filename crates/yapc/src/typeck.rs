use std::collections::HashMap;

use yap_bytecode::Type;

use crate::ast::*;
use crate::error::CompileError;

/// Static checking pass: name resolution plus declared-type consistency.
/// Rejects invalid programs before any bytecode is emitted; never
/// transforms the AST.
pub fn check(program: &Program) -> Result<(), CompileError> {
    let mut checker = TypeChecker::new();
    checker.check_program(program)
}

struct TypeChecker {
    /// Lexical scopes, innermost last.
    scopes: Vec<HashMap<String, Type>>,
    /// Function name → (parameter types, return type).
    functions: HashMap<String, (Vec<Type>, Type)>,
    /// Registered struct definitions.
    structs: HashMap<String, Vec<(Type, String)>>,
    loop_depth: usize,
    /// Declared return type of the function body being checked.
    current_ret: Option<Type>,
}

/// `Unknown` acts as a wildcard: it arises from `spill()` before its
/// target type is known and from int arithmetic whose result numeric
/// kind is only known at run time.
fn compatible(a: &Type, b: &Type) -> bool {
    a == b || *a == Type::Unknown || *b == Type::Unknown
}

impl TypeChecker {
    fn new() -> Self {
        TypeChecker {
            scopes: vec![HashMap::new()],
            functions: HashMap::new(),
            structs: HashMap::new(),
            loop_depth: 0,
            current_ret: None,
        }
    }

    fn check_program(&mut self, program: &Program) -> Result<(), CompileError> {
        // First pass: collect function and struct names so forward
        // references resolve
        for stmt in &program.stmts {
            match stmt {
                Stmt::Function(f) => {
                    let params = f.params.iter().map(|(ty, _)| ty.clone()).collect();
                    self.functions.insert(f.name.clone(), (params, f.ret.clone()));
                }
                Stmt::StructDef { name, fields } => {
                    self.structs.insert(name.clone(), fields.clone());
                }
                _ => {}
            }
        }

        for stmt in &program.stmts {
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn declare(&mut self, name: &str, ty: Type) -> Result<(), CompileError> {
        let scope = self.scopes.last_mut().ok_or_else(|| {
            CompileError::Type("no active scope".into())
        })?;
        scope.insert(name.to_string(), ty);
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Declaration { ty, name, value } => {
                if let Some(value) = value {
                    let got = self.check_expr(value)?;
                    if !compatible(ty, &got) {
                        return Err(CompileError::Type(format!(
                            "variable '{name}' declared as {ty} but initialized with {got}"
                        )));
                    }
                }
                self.declare(name, ty.clone())?;
            }
            Stmt::Assignment { name, value } => {
                let declared = self
                    .lookup(name)
                    .cloned()
                    .ok_or_else(|| CompileError::Name(format!("undefined variable: {name}")))?;
                let got = self.check_expr(value)?;
                if !compatible(&declared, &got) {
                    return Err(CompileError::Type(format!(
                        "cannot assign {got} to '{name}' of type {declared}"
                    )));
                }
            }
            Stmt::IndexAssign { target, index, value } => {
                let coll = self.check_expr(target)?;
                let idx = self.check_expr(index)?;
                let got = self.check_expr(value)?;
                let elem = self.index_result(&coll, &idx, "indexed assignment")?;
                if !compatible(&elem, &got) {
                    return Err(CompileError::Type(format!(
                        "cannot store {got} into {coll} element of type {elem}"
                    )));
                }
                if matches!(coll, Type::Str) {
                    return Err(CompileError::Type(
                        "strings do not support indexed assignment".into(),
                    ));
                }
            }
            Stmt::Cond { arms, otherwise } => {
                for (condition, body) in arms {
                    self.check_condition(condition)?;
                    self.check_block(body)?;
                }
                if let Some(body) = otherwise {
                    self.check_block(body)?;
                }
            }
            Stmt::While { condition, body } => {
                self.check_condition(condition)?;
                self.loop_depth += 1;
                self.check_block(body)?;
                self.loop_depth -= 1;
            }
            Stmt::For { init, condition, step, body } => {
                self.scopes.push(HashMap::new());
                self.check_stmt(init)?;
                self.check_condition(condition)?;
                self.check_stmt(step)?;
                self.loop_depth += 1;
                self.check_block(body)?;
                self.loop_depth -= 1;
                self.scopes.pop();
            }
            Stmt::Break => {
                if self.loop_depth == 0 {
                    return Err(CompileError::Type("'break' outside of a loop".into()));
                }
            }
            Stmt::Continue => {
                if self.loop_depth == 0 {
                    return Err(CompileError::Type("'continue' outside of a loop".into()));
                }
            }
            Stmt::Function(f) => {
                // Nested defs register here; top-level ones were
                // pre-collected so forward calls resolve
                let params = f.params.iter().map(|(ty, _)| ty.clone()).collect();
                self.functions.insert(f.name.clone(), (params, f.ret.clone()));
                self.check_fn(f)?;
            }
            Stmt::Return(value) => {
                let declared = self.current_ret.clone().ok_or_else(|| {
                    CompileError::Type("'yeet' outside of a function".into())
                })?;
                let got = match value {
                    Some(e) => self.check_expr(e)?,
                    None => Type::Void,
                };
                if !compatible(&declared, &got) {
                    return Err(CompileError::Type(format!(
                        "function declared to return {declared} but yeets {got}"
                    )));
                }
            }
            Stmt::Print(values) => {
                for value in values {
                    self.check_expr(value)?;
                }
            }
            Stmt::StructDef { .. } => {}
            Stmt::Expr(e) => {
                self.check_expr(e)?;
            }
        }
        Ok(())
    }

    fn check_block(&mut self, body: &[Stmt]) -> Result<(), CompileError> {
        self.scopes.push(HashMap::new());
        for stmt in body {
            self.check_stmt(stmt)?;
        }
        self.scopes.pop();
        Ok(())
    }

    /// Function bodies see only their parameters, never enclosing
    /// variables — slots are per-frame.
    fn check_fn(&mut self, f: &FnDef) -> Result<(), CompileError> {
        let saved_scopes = std::mem::take(&mut self.scopes);
        let saved_ret = self.current_ret.take();
        let saved_depth = self.loop_depth;

        let mut params = HashMap::new();
        for (ty, name) in &f.params {
            params.insert(name.clone(), ty.clone());
        }
        self.scopes = vec![params];
        self.current_ret = Some(f.ret.clone());
        self.loop_depth = 0;

        let result: Result<(), CompileError> = f.body.iter().try_for_each(|s| self.check_stmt(s));

        self.scopes = saved_scopes;
        self.current_ret = saved_ret;
        self.loop_depth = saved_depth;
        result
    }

    fn check_condition(&mut self, condition: &Expr) -> Result<(), CompileError> {
        let ty = self.check_expr(condition)?;
        if !compatible(&ty, &Type::Bool) {
            return Err(CompileError::Type(format!(
                "condition must be bool, got {ty}"
            )));
        }
        Ok(())
    }

    fn index_result(&self, coll: &Type, idx: &Type, what: &str) -> Result<Type, CompileError> {
        match coll {
            Type::Array(elem) => {
                if !compatible(idx, &Type::Int) {
                    return Err(CompileError::Type(format!(
                        "array index must be int, got {idx}"
                    )));
                }
                Ok((**elem).clone())
            }
            Type::Map(key, val) => {
                if !compatible(idx, key) {
                    return Err(CompileError::Type(format!(
                        "hashmap key must be {key}, got {idx}"
                    )));
                }
                Ok((**val).clone())
            }
            Type::Str => {
                if !compatible(idx, &Type::Int) {
                    return Err(CompileError::Type(format!(
                        "string index must be int, got {idx}"
                    )));
                }
                Ok(Type::Str)
            }
            Type::Unknown => Ok(Type::Unknown),
            other => Err(CompileError::Type(format!("{what} on non-indexable {other}"))),
        }
    }

    fn check_expr(&mut self, expr: &Expr) -> Result<Type, CompileError> {
        match expr {
            Expr::Int(_) => Ok(Type::Int),
            Expr::Float(_) => Ok(Type::Float),
            Expr::Str(_) => Ok(Type::Str),
            Expr::Bool(_) => Ok(Type::Bool),
            Expr::Var(name) => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| CompileError::Name(format!("undefined variable: {name}"))),
            Expr::Binary { op, left, right } => {
                let l = self.check_expr(left)?;
                let r = self.check_expr(right)?;
                self.binary_result(*op, &l, &r)
            }
            Expr::Unary { op, expr } => {
                let t = self.check_expr(expr)?;
                match op {
                    UnOp::Not => {
                        if !compatible(&t, &Type::Bool) {
                            return Err(CompileError::Type(format!(
                                "cannot apply 'not' to {t}"
                            )));
                        }
                        Ok(Type::Bool)
                    }
                    UnOp::BitNot => {
                        if !compatible(&t, &Type::Int) {
                            return Err(CompileError::Type(format!(
                                "cannot apply '~~' to {t}"
                            )));
                        }
                        Ok(Type::Int)
                    }
                }
            }
            Expr::Paren(inner) => self.check_expr(inner),
            Expr::ArrayLit(items) => {
                let mut elem = Type::Unknown;
                for item in items {
                    let t = self.check_expr(item)?;
                    if !compatible(&elem, &t) {
                        return Err(CompileError::Type(format!(
                            "mixed element types in array literal: {elem} and {t}"
                        )));
                    }
                    if elem == Type::Unknown {
                        elem = t;
                    }
                }
                Ok(Type::Array(Box::new(elem)))
            }
            Expr::Index { target, index } => {
                let coll = self.check_expr(target)?;
                let idx = self.check_expr(index)?;
                self.index_result(&coll, &idx, "indexing")
            }
            Expr::Call { name, args } => {
                let (params, ret) = self
                    .functions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| CompileError::Name(format!("undefined function: {name}")))?;
                if params.len() != args.len() {
                    return Err(CompileError::Type(format!(
                        "function '{name}' takes {} argument(s), got {}",
                        params.len(),
                        args.len()
                    )));
                }
                for (param, arg) in params.iter().zip(args) {
                    let got = self.check_expr(arg)?;
                    if !compatible(param, &got) {
                        return Err(CompileError::Type(format!(
                            "argument to '{name}' expected {param}, got {got}"
                        )));
                    }
                }
                Ok(ret)
            }
            Expr::Append { target, value } => {
                let coll = self.check_expr(target)?;
                let got = self.check_expr(value)?;
                match &coll {
                    Type::Array(elem) => {
                        if !compatible(elem, &got) {
                            return Err(CompileError::Type(format!(
                                "cannot append {got} to {coll}"
                            )));
                        }
                        Ok(coll.clone())
                    }
                    Type::Unknown => Ok(Type::Unknown),
                    other => Err(CompileError::Type(format!("'append' on non-array {other}"))),
                }
            }
            Expr::Delete { target, index } => {
                let coll = self.check_expr(target)?;
                let idx = self.check_expr(index)?;
                match &coll {
                    Type::Array(_) => {
                        if !compatible(&idx, &Type::Int) {
                            return Err(CompileError::Type(format!(
                                "array delete index must be int, got {idx}"
                            )));
                        }
                        Ok(coll.clone())
                    }
                    Type::Map(key, _) => {
                        if !compatible(&idx, key) {
                            return Err(CompileError::Type(format!(
                                "hashmap delete key must be {key}, got {idx}"
                            )));
                        }
                        Ok(coll.clone())
                    }
                    Type::Unknown => Ok(Type::Unknown),
                    other => Err(CompileError::Type(format!("'delete' on {other}"))),
                }
            }
            Expr::Len(target) => {
                let coll = self.check_expr(target)?;
                match coll {
                    Type::Array(_)
                    | Type::Stack(_)
                    | Type::Queue(_)
                    | Type::Map(_, _)
                    | Type::Str
                    | Type::Unknown => Ok(Type::Int),
                    other => Err(CompileError::Type(format!("'len' on {other}"))),
                }
            }
            Expr::SeqPush { target, value } => {
                let coll = self.check_expr(target)?;
                let got = self.check_expr(value)?;
                match &coll {
                    Type::Stack(elem) | Type::Queue(elem) => {
                        if !compatible(elem, &got) {
                            return Err(CompileError::Type(format!(
                                "cannot push {got} onto {coll}"
                            )));
                        }
                        Ok(coll.clone())
                    }
                    Type::Unknown => Ok(Type::Unknown),
                    other => Err(CompileError::Type(format!("'push' on {other}"))),
                }
            }
            Expr::SeqPop(target) => {
                let coll = self.check_expr(target)?;
                match coll {
                    Type::Stack(elem) | Type::Queue(elem) => Ok(*elem),
                    Type::Unknown => Ok(Type::Unknown),
                    other => Err(CompileError::Type(format!("'pop' on {other}"))),
                }
            }
            Expr::Input(ty) => Ok(ty.clone()),
        }
    }

    fn binary_result(&self, op: BinOp, l: &Type, r: &Type) -> Result<Type, CompileError> {
        let numeric = |t: &Type| t.is_numeric() || *t == Type::Unknown;
        match op {
            BinOp::And | BinOp::Or => {
                if compatible(l, &Type::Bool) && compatible(r, &Type::Bool) {
                    Ok(Type::Bool)
                } else {
                    Err(CompileError::Type(format!(
                        "logical operator requires bool operands, got {l} and {r}"
                    )))
                }
            }
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                if (numeric(l) && numeric(r))
                    || (compatible(l, &Type::Str) && compatible(r, &Type::Str))
                {
                    Ok(Type::Bool)
                } else {
                    Err(CompileError::Type(format!(
                        "cannot compare {l} and {r}"
                    )))
                }
            }
            BinOp::Eq | BinOp::Ne => Ok(Type::Bool),
            BinOp::BitAnd | BinOp::BitOr => {
                if compatible(l, &Type::Int) && compatible(r, &Type::Int) {
                    Ok(Type::Int)
                } else {
                    Err(CompileError::Type(format!(
                        "bitwise operator requires int operands, got {l} and {r}"
                    )))
                }
            }
            BinOp::Add => {
                // `+` doubles as string concatenation
                if (*l == Type::Str || *r == Type::Str)
                    && compatible(l, &Type::Str)
                    && compatible(r, &Type::Str)
                {
                    return Ok(Type::Str);
                }
                self.numeric_result(op, l, r)
            }
            BinOp::Sub | BinOp::Mul | BinOp::Mod | BinOp::FloorDiv => {
                self.numeric_result(op, l, r)
            }
            // Int/int division and exponentiation can produce either
            // numeric kind at run time
            BinOp::Div | BinOp::Pow => {
                if numeric(l) && numeric(r) {
                    if *l == Type::Float || *r == Type::Float {
                        Ok(Type::Float)
                    } else {
                        Ok(Type::Unknown)
                    }
                } else {
                    Err(CompileError::Type(format!(
                        "arithmetic on non-numeric types {l} and {r}"
                    )))
                }
            }
        }
    }

    fn numeric_result(&self, op: BinOp, l: &Type, r: &Type) -> Result<Type, CompileError> {
        let numeric = |t: &Type| t.is_numeric() || *t == Type::Unknown;
        if !numeric(l) || !numeric(r) {
            return Err(CompileError::Type(format!(
                "arithmetic ({op:?}) on non-numeric types {l} and {r}"
            )));
        }
        if *l == Type::Float || *r == Type::Float {
            Ok(Type::Float)
        } else if *l == Type::Unknown || *r == Type::Unknown {
            Ok(Type::Unknown)
        } else {
            Ok(Type::Int)
        }
    }
}
