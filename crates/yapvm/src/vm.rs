use std::collections::HashMap;
use std::io::BufRead;

use yap_bytecode::{coerce_input, ops, Op, Program, Truth, Value};

use crate::error::VmError;

const RECURSION_LIMIT: usize = 1000;

/// The yap stack virtual machine.
///
/// Runtime state is an operand stack, a frame stack of growable slot
/// arrays (frame 0 is the global frame, created at load time and never
/// popped), and a return-address stack parallel to it: outside of a
/// call/return transition, `frames.len() == returns.len() + 1`.
pub struct Vm {
    program: Program,
    /// Label name → index of the instruction after its marker, built in
    /// one load-time pre-pass.
    labels: HashMap<String, usize>,
    pc: usize,
    stack: Vec<Value>,
    frames: Vec<Vec<Value>>,
    returns: Vec<usize>,
    line_buf: Vec<String>,
    output: Vec<String>,
    echo: bool,
    input: Box<dyn BufRead>,
}

fn map_labels(code: &[Op]) -> HashMap<String, usize> {
    let mut labels = HashMap::new();
    for (i, op) in code.iter().enumerate() {
        if let Op::Label(name) = op {
            labels.insert(name.clone(), i + 1);
        }
    }
    labels
}

impl Vm {
    /// VM reading stdin and echoing output lines as they flush.
    pub fn new(program: Program) -> Self {
        let mut vm = Self::with_input(program, Box::new(std::io::BufReader::new(std::io::stdin())));
        vm.echo = true;
        vm
    }

    /// Silent VM reading from the given source, used by tests.
    pub fn with_input(program: Program, input: Box<dyn BufRead>) -> Self {
        let labels = map_labels(&program.code);
        Vm {
            program,
            labels,
            pc: 0,
            stack: Vec::new(),
            frames: vec![Vec::new()],
            returns: Vec::new(),
            line_buf: Vec::new(),
            output: Vec::new(),
            echo: false,
            input,
        }
    }

    /// Output lines flushed so far.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn into_output(self) -> Vec<String> {
        self.output
    }

    fn pop(&mut self, ctx: &'static str) -> Result<Value, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow(ctx))
    }

    fn pop_bool(&mut self, ctx: &'static str) -> Result<Truth, VmError> {
        match self.pop(ctx)? {
            Value::Bool(t) => Ok(t),
            other => Err(VmError::Type(format!(
                "{ctx} expects bool, got {}",
                other.type_name()
            ))),
        }
    }

    fn jump(&mut self, label: &str) -> Result<(), VmError> {
        self.pc = *self
            .labels
            .get(label)
            .ok_or_else(|| VmError::UnresolvedLabel(label.to_string()))?;
        Ok(())
    }

    fn load(&self, slot: u32) -> Result<Value, VmError> {
        let frame = self.frames.last().ok_or(VmError::InvalidSlot(slot))?;
        frame
            .get(slot as usize)
            .cloned()
            .ok_or(VmError::InvalidSlot(slot))
    }

    fn store(&mut self, slot: u32, value: Value) -> Result<(), VmError> {
        let frame = self.frames.last_mut().ok_or(VmError::InvalidSlot(slot))?;
        let idx = slot as usize;
        if idx >= frame.len() {
            frame.resize(idx + 1, Value::Void);
        }
        frame[idx] = value;
        Ok(())
    }

    fn flush_line(&mut self) {
        let line = self.line_buf.concat();
        if self.echo {
            println!("{line}");
        }
        self.output.push(line);
        self.line_buf.clear();
    }

    /// Dispatch loop: fetch at PC, execute, advance by one unless the
    /// instruction set the PC itself. Faults are fatal and immediate.
    pub fn run(&mut self) -> Result<(), VmError> {
        while self.pc < self.program.code.len() {
            let op = self.program.code[self.pc].clone();
            match op {
                Op::Label(_) => {}
                Op::Push(v) => self.stack.push(v),
                Op::Load(slot) => {
                    let v = self.load(slot)?;
                    self.stack.push(v);
                }
                Op::Store(slot) => {
                    let v = self.pop("STORE")?;
                    self.store(slot, v)?;
                }
                Op::Pop => {
                    self.pop("POP")?;
                }
                Op::Dup => {
                    let v = self
                        .stack
                        .last()
                        .cloned()
                        .ok_or(VmError::StackUnderflow("DUP"))?;
                    self.stack.push(v);
                }
                Op::Add => self.binary("ADD", ops::add)?,
                Op::Sub => self.binary("SUB", ops::sub)?,
                Op::Mul => self.binary("MUL", ops::mul)?,
                Op::Div => self.binary("DIV", ops::div)?,
                Op::FloorDiv => self.binary("FLOORDIV", ops::floor_div)?,
                Op::Mod => self.binary("MOD", ops::modulo)?,
                Op::Pow => self.binary("POW", ops::pow)?,
                Op::CmpLt => self.binary("CMP_LT", ops::lt)?,
                Op::CmpGt => self.binary("CMP_GT", ops::gt)?,
                Op::CmpLe => self.binary("CMP_LE", ops::le)?,
                Op::CmpGe => self.binary("CMP_GE", ops::ge)?,
                Op::CmpEq => {
                    let b = self.pop("CMP_EQ")?;
                    let a = self.pop("CMP_EQ")?;
                    self.stack.push(ops::eq(&a, &b));
                }
                Op::CmpNe => {
                    let b = self.pop("CMP_NE")?;
                    let a = self.pop("CMP_NE")?;
                    self.stack.push(ops::ne(&a, &b));
                }
                Op::LNot => {
                    let t = self.pop_bool("LNOT")?;
                    self.stack.push(Value::Bool(t.negate()));
                }
                Op::BitAnd => self.binary("BITAND", ops::bit_and)?,
                Op::BitOr => self.binary("BITOR", ops::bit_or)?,
                Op::BitNot => {
                    let a = self.pop("BITNOT")?;
                    self.stack.push(ops::bit_not(&a)?);
                }
                Op::Jmp(label) => {
                    self.jump(&label)?;
                    continue;
                }
                Op::Jz(label) => {
                    if !self.pop_bool("JZ")?.is_true() {
                        self.jump(&label)?;
                        continue;
                    }
                }
                Op::Jnz(label) => {
                    if self.pop_bool("JNZ")?.is_true() {
                        self.jump(&label)?;
                        continue;
                    }
                }
                Op::Call(name) => {
                    self.call(&name)?;
                    continue;
                }
                Op::Ret => {
                    if self.frames.len() <= 1 {
                        return Err(VmError::ReturnWithoutCall);
                    }
                    self.frames.pop();
                    self.pc = self.returns.pop().ok_or(VmError::ReturnWithoutCall)?;
                    continue;
                }
                Op::Print => {
                    let v = self.pop("PRINT")?;
                    self.line_buf.push(v.to_string());
                }
                Op::Flush => self.flush_line(),
                Op::Input(ty) => {
                    let mut line = String::new();
                    self.input
                        .read_line(&mut line)
                        .map_err(|e| VmError::Input(e.to_string()))?;
                    let v = coerce_input(&ty, &line).map_err(VmError::Input)?;
                    self.stack.push(v);
                }
                Op::MakeArray(n) => {
                    let mut items = Vec::with_capacity(n as usize);
                    for _ in 0..n {
                        items.push(self.pop("MAKE_ARRAY")?);
                    }
                    items.reverse();
                    self.stack.push(Value::array(items));
                }
                Op::NewStack => self.stack.push(Value::new_stack()),
                Op::NewQueue => self.stack.push(Value::new_queue()),
                Op::NewMap => self.stack.push(Value::new_map()),
                Op::IdxGet => {
                    let index = self.pop("IDX_GET")?;
                    let coll = self.pop("IDX_GET")?;
                    let v = index_get(&coll, &index)?;
                    self.stack.push(v);
                }
                Op::IdxSet => {
                    let value = self.pop("IDX_SET")?;
                    let index = self.pop("IDX_SET")?;
                    let coll = self.pop("IDX_SET")?;
                    index_set(&coll, &index, value)?;
                }
                Op::Append => {
                    let value = self.pop("APPEND")?;
                    let coll = self.pop("APPEND")?;
                    match &coll {
                        Value::Array(items) => items.borrow_mut().push(value),
                        other => {
                            return Err(VmError::Type(format!(
                                "APPEND on {}",
                                other.type_name()
                            )));
                        }
                    }
                    self.stack.push(coll);
                }
                Op::Delete => {
                    let index = self.pop("DELETE")?;
                    let coll = self.pop("DELETE")?;
                    delete(&coll, &index)?;
                    self.stack.push(coll);
                }
                Op::Len => {
                    let coll = self.pop("LEN")?;
                    let len = match &coll {
                        Value::Array(items) | Value::Stack(items) => items.borrow().len(),
                        Value::Queue(items) => items.borrow().len(),
                        Value::Map(entries) => entries.borrow().len(),
                        Value::Str(s) => s.chars().count(),
                        other => {
                            return Err(VmError::Type(format!("LEN on {}", other.type_name())));
                        }
                    };
                    self.stack.push(Value::Int(len as i64));
                }
                Op::SeqPush => {
                    let value = self.pop("SEQ_PUSH")?;
                    let coll = self.pop("SEQ_PUSH")?;
                    match &coll {
                        Value::Stack(items) => items.borrow_mut().push(value),
                        Value::Queue(items) => items.borrow_mut().push_back(value),
                        other => {
                            return Err(VmError::Type(format!(
                                "SEQ_PUSH on {}",
                                other.type_name()
                            )));
                        }
                    }
                    self.stack.push(coll);
                }
                Op::SeqPop => {
                    let coll = self.pop("SEQ_POP")?;
                    let v = match &coll {
                        Value::Stack(items) => items
                            .borrow_mut()
                            .pop()
                            .ok_or(VmError::ContainerUnderflow("stack"))?,
                        Value::Queue(items) => items
                            .borrow_mut()
                            .pop_front()
                            .ok_or(VmError::ContainerUnderflow("queue"))?,
                        other => {
                            return Err(VmError::Type(format!(
                                "SEQ_POP on {}",
                                other.type_name()
                            )));
                        }
                    };
                    self.stack.push(v);
                }
                Op::Exit => break,
            }
            self.pc += 1;
        }
        Ok(())
    }

    fn binary(
        &mut self,
        ctx: &'static str,
        f: fn(&Value, &Value) -> Result<Value, ops::OpError>,
    ) -> Result<(), VmError> {
        let b = self.pop(ctx)?;
        let a = self.pop(ctx)?;
        self.stack.push(f(&a, &b)?);
        Ok(())
    }

    fn call(&mut self, name: &str) -> Result<(), VmError> {
        let sig = self
            .program
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| VmError::UndefinedFunction(name.to_string()))?;
        if self.returns.len() >= RECURSION_LIMIT {
            return Err(VmError::RecursionLimit(RECURSION_LIMIT));
        }

        // Arguments sit on the stack leftmost-first; popping reverses
        // them, so reverse again to bind slots 0..k-1 in order
        let mut frame = Vec::with_capacity(sig.params.len());
        for _ in 0..sig.params.len() {
            frame.push(self.pop("CALL")?);
        }
        frame.reverse();

        self.returns.push(self.pc + 1);
        self.frames.push(frame);
        self.jump(&sig.entry)
    }
}

fn index_get(coll: &Value, index: &Value) -> Result<Value, VmError> {
    match (coll, index) {
        (Value::Array(items), Value::Int(i)) => {
            let items = items.borrow();
            usize::try_from(*i)
                .ok()
                .and_then(|idx| items.get(idx).cloned())
                .ok_or(VmError::IndexOutOfBounds { index: *i, len: items.len() })
        }
        (Value::Str(s), Value::Int(i)) => {
            let len = s.chars().count();
            usize::try_from(*i)
                .ok()
                .and_then(|idx| s.chars().nth(idx))
                .map(|c| Value::Str(c.to_string()))
                .ok_or(VmError::IndexOutOfBounds { index: *i, len })
        }
        (Value::Map(entries), key) => {
            let key = key
                .as_key()
                .ok_or_else(|| VmError::Type(format!("{} cannot key a hashmap", key.type_name())))?;
            entries
                .borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| VmError::KeyNotFound(key.to_string()))
        }
        (other, _) => Err(VmError::Type(format!(
            "IDX_GET on {}",
            other.type_name()
        ))),
    }
}

fn index_set(coll: &Value, index: &Value, value: Value) -> Result<(), VmError> {
    match (coll, index) {
        (Value::Array(items), Value::Int(i)) => {
            let mut items = items.borrow_mut();
            let len = items.len();
            let slot = usize::try_from(*i)
                .ok()
                .and_then(|idx| items.get_mut(idx))
                .ok_or(VmError::IndexOutOfBounds { index: *i, len })?;
            *slot = value;
            Ok(())
        }
        (Value::Map(entries), key) => {
            let key = key
                .as_key()
                .ok_or_else(|| VmError::Type(format!("{} cannot key a hashmap", key.type_name())))?;
            entries.borrow_mut().insert(key, value);
            Ok(())
        }
        (other, _) => Err(VmError::Type(format!(
            "IDX_SET on {}",
            other.type_name()
        ))),
    }
}

fn delete(coll: &Value, index: &Value) -> Result<(), VmError> {
    match (coll, index) {
        (Value::Array(items), Value::Int(i)) => {
            let len = items.borrow().len();
            let idx = usize::try_from(*i)
                .ok()
                .filter(|&idx| idx < len)
                .ok_or(VmError::IndexOutOfBounds { index: *i, len })?;
            items.borrow_mut().remove(idx);
            Ok(())
        }
        (Value::Map(entries), key) => {
            let key = key
                .as_key()
                .ok_or_else(|| VmError::Type(format!("{} cannot key a hashmap", key.type_name())))?;
            entries
                .borrow_mut()
                .remove(&key)
                .ok_or_else(|| VmError::KeyNotFound(key.to_string()))?;
            Ok(())
        }
        (other, _) => Err(VmError::Type(format!(
            "DELETE on {}",
            other.type_name()
        ))),
    }
}
