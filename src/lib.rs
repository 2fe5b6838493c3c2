//! An assembler for the WSA language and a virtual machine for the whitespace programs it
//! produces.
//!
//! [`wsa::compile`] turns assembly into whitespace; [`ws::parse`] and [`ws::Program::load`]
//! turn whitespace back into a runnable program, which [`ws::vm`] executes one step at a time
//! against an [`ws::Io`] port.

pub mod source;
pub mod wasm;
pub mod ws;
pub mod wsa;

use source::SourceError;
use thiserror::Error;
use ws::{ParseError, Program, VmError};
use wsa::CompileError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("runtime error: {0}")]
    Vm(#[from] VmError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parses whitespace text and loads it as a program
pub fn load_program(text: &str) -> Result<Program> {
    Ok(Program::load(ws::parse(text)?))
}
