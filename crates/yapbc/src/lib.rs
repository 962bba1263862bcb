pub mod opcode;
pub mod ops;
pub mod program;
pub mod value;
#[cfg(test)]
mod tests;

pub use opcode::Op;
pub use program::{FuncSig, Program, ProgramError};
pub use value::{coerce_input, MapKey, Truth, Type, Value};
