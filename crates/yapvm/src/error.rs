use thiserror::Error;
use yap_bytecode::ops::OpError;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("operand stack underflow during {0}")]
    StackUnderflow(&'static str),

    #[error("pop from an empty {0}")]
    ContainerUnderflow(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("index {index} out of range for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("recursion limit of {0} exceeded")]
    RecursionLimit(usize),

    #[error("undefined function: {0}")]
    UndefinedFunction(String),

    #[error("unresolved label: {0}")]
    UnresolvedLabel(String),

    #[error("invalid slot {0}")]
    InvalidSlot(u32),

    #[error("return outside of a call")]
    ReturnWithoutCall,

    #[error("input error: {0}")]
    Input(String),
}

impl From<OpError> for VmError {
    fn from(e: OpError) -> Self {
        match e {
            OpError::DivisionByZero => VmError::DivisionByZero,
            other => VmError::Type(other.to_string()),
        }
    }
}
