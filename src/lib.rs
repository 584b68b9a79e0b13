//! fint: a small curried functional language compiled to an intcode machine.
//!
//! `lexer` and `parser` build the AST and its scope arena, `codegen` turns
//! it into a labelled instruction stream, `asm` links that to a flat image,
//! and `vm` runs the image.

pub mod asm;
pub mod ast;
pub mod codegen;
pub mod diagnostic;
pub mod image;
pub mod layout;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod vm;

use ast::Program;
use codegen::{CompileOptions, Compiled};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] lexer::LexError),
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
    #[error(transparent)]
    Compile(#[from] codegen::CompileError),
    #[error(transparent)]
    Vm(#[from] vm::VmError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub fn parse_source(source: &str) -> Result<Program, Error> {
    let tokens = lexer::lex(source)?;
    Ok(parser::parse(tokens)?)
}

pub fn compile_source(source: &str, options: &CompileOptions) -> Result<Compiled, Error> {
    let program = parse_source(source)?;
    Ok(codegen::compile(program, options)?)
}
