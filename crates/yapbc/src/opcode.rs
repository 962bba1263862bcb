use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::{Type, Value};

/// Bytecode instructions for the yap stack VM.
///
/// Operands are pushed to and popped from the operand stack; every
/// instruction has a fixed net stack effect. Jump targets are symbolic
/// label names — the compiler never computes numeric addresses, the VM
/// resolves labels in a single load-time pre-pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Label marker pseudo-instruction. Executes as a no-op; exists only
    /// so the VM's pre-pass can record the address of the instruction
    /// that follows it.
    Label(String),

    /// Push a literal value.
    Push(Value),

    /// Load a slot from the current frame.
    Load(u32),

    /// Pop the top of stack into a slot of the current frame.
    Store(u32),

    /// Pop and discard the top of stack.
    Pop,

    /// Duplicate the top of stack without popping.
    Dup,

    // Arithmetic: pop two, push one.
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,

    // Comparison: pop two, push one Bool sentinel.
    CmpLt,
    CmpGt,
    CmpLe,
    CmpGe,
    CmpEq,
    CmpNe,

    /// Pop a Bool sentinel, push its negation.
    LNot,

    // Bitwise (int-only).
    BitAnd,
    BitOr,
    /// Pop one int, push its bitwise complement.
    BitNot,

    /// Unconditional jump to a label.
    Jmp(String),

    /// Pop a Bool; jump if it is `cap` (false).
    Jz(String),

    /// Pop a Bool; jump if it is `nocap` (true).
    Jnz(String),

    /// Call a function from the function table by name. Pops the
    /// arguments (rightmost on top), pushes a return address and a fresh
    /// frame, jumps to the entry label.
    Call(String),

    /// Return to the caller: pop the current frame and the saved return
    /// address. The result must already be on the operand stack.
    Ret,

    /// Pop a value, render it, and append it to the pending line buffer.
    Print,

    /// Emit the buffered line (values joined with no separator), clear
    /// the buffer.
    Flush,

    /// Blocking read of one input line, coerced to the given type.
    Input(Type),

    /// Pop N values and collapse them into one array value.
    MakeArray(u32),

    /// Push a fresh empty container.
    NewStack,
    NewQueue,
    NewMap,

    /// Pop index, pop collection, push the element. Bounds/key checked.
    IdxGet,

    /// Pop value, pop index, pop collection; write in place.
    IdxSet,

    /// Pop value, pop array; append in place, push the array back.
    Append,

    /// Pop index (or map key), pop collection; remove in place, push the
    /// collection back.
    Delete,

    /// Pop a collection or string, push its length as an int.
    Len,

    /// Pop value, pop stack/queue container; push in place, push the
    /// container back.
    SeqPush,

    /// Pop a stack/queue container, push the removed element (LIFO for
    /// stacks, FIFO for queues). Underflow on empty is a fatal fault.
    SeqPop,

    /// Halt execution.
    Exit,
}

impl Op {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Label(_) => "LABEL",
            Op::Push(_) => "PUSH",
            Op::Load(_) => "LOAD",
            Op::Store(_) => "STORE",
            Op::Pop => "POP",
            Op::Dup => "DUP",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::FloorDiv => "FLOORDIV",
            Op::Mod => "MOD",
            Op::Pow => "POW",
            Op::CmpLt => "CMP_LT",
            Op::CmpGt => "CMP_GT",
            Op::CmpLe => "CMP_LE",
            Op::CmpGe => "CMP_GE",
            Op::CmpEq => "CMP_EQ",
            Op::CmpNe => "CMP_NE",
            Op::LNot => "LNOT",
            Op::BitAnd => "BITAND",
            Op::BitOr => "BITOR",
            Op::BitNot => "BITNOT",
            Op::Jmp(_) => "JMP",
            Op::Jz(_) => "JZ",
            Op::Jnz(_) => "JNZ",
            Op::Call(_) => "CALL",
            Op::Ret => "RET",
            Op::Print => "PRINT",
            Op::Flush => "FLUSH",
            Op::Input(_) => "INPUT",
            Op::MakeArray(_) => "MAKE_ARRAY",
            Op::NewStack => "NEW_STACK",
            Op::NewQueue => "NEW_QUEUE",
            Op::NewMap => "NEW_MAP",
            Op::IdxGet => "IDX_GET",
            Op::IdxSet => "IDX_SET",
            Op::Append => "APPEND",
            Op::Delete => "DELETE",
            Op::Len => "LEN",
            Op::SeqPush => "SEQ_PUSH",
            Op::SeqPop => "SEQ_POP",
            Op::Exit => "EXIT",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Label(name) => write!(f, "{name}:"),
            Op::Push(v) => match v {
                Value::Str(s) => write!(f, "PUSH {s:?}"),
                other => write!(f, "PUSH {other}"),
            },
            Op::Load(slot) => write!(f, "LOAD {slot}"),
            Op::Store(slot) => write!(f, "STORE {slot}"),
            Op::Jmp(l) => write!(f, "JMP {l}"),
            Op::Jz(l) => write!(f, "JZ {l}"),
            Op::Jnz(l) => write!(f, "JNZ {l}"),
            Op::Call(name) => write!(f, "CALL {name}"),
            Op::Input(ty) => write!(f, "INPUT {ty}"),
            Op::MakeArray(n) => write!(f, "MAKE_ARRAY {n}"),
            other => write!(f, "{}", other.mnemonic()),
        }
    }
}
