pub mod error;
pub mod vm;

pub use error::VmError;
pub use vm::Vm;
