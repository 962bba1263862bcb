pub mod lexer;
pub mod ast;
pub mod parser;
pub mod typeck;
pub mod codegen;
pub mod eval;
pub mod error;
#[cfg(test)]
mod tests;

pub use error::CompileError;
pub use eval::EvalError;

use yap_bytecode::Program;

/// Compile source code to a bytecode program.
pub fn compile(source: &str) -> Result<Program, CompileError> {
    let program = parse(source)?;
    typeck::check(&program)?;
    codegen::emit(&program)
}

/// Lex and parse source code into an AST.
pub fn parse(source: &str) -> Result<ast::Program, CompileError> {
    let tokens = lexer::lex(source)?;
    parser::parse(tokens)
}
