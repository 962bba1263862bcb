use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use thiserror::Error;

use crate::opcode::Op;
use crate::value::Type;

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// One function table entry: where the body starts and what it takes and
/// returns. Created once when the compiler lowers a `def`, consulted at
/// every CALL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncSig {
    /// Entry label of the function body.
    pub entry: String,
    /// Parameter types, in declaration order (bound to slots 0..k-1).
    pub params: Vec<Type>,
    /// Declared return type (`void` if omitted).
    pub ret: Type,
}

/// A compiled program: a flat instruction list with interleaved label
/// markers, plus the function table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub code: Vec<Op>,
    pub functions: BTreeMap<String, FuncSig>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// Diagnostic textual dump: one line per instruction as
    /// `index: MNEMONIC operand…`, label markers as `name:`.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (i, op) in self.code.iter().enumerate() {
            match op {
                Op::Label(name) => {
                    let _ = writeln!(out, "{name}:");
                }
                other => {
                    let _ = writeln!(out, "{i}: {other}");
                }
            }
        }
        out
    }

    /// Serialize to JSON (diagnostic only; there is no persisted binary
    /// bytecode format).
    pub fn to_json(&self) -> Result<String, ProgramError> {
        serde_json::to_string_pretty(self).map_err(|e| ProgramError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, ProgramError> {
        serde_json::from_str(json).map_err(|e| ProgramError::Serialization(e.to_string()))
    }
}
