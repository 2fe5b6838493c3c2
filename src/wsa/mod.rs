//! The assembler: WSA text in, whitespace out.
//!
//! Lines are tokenized and expanded with their includes by the [`loader`], unreachable blocks
//! are dropped by [`treeshake`](treeshake::treeshake) and the rest is lowered and encoded by
//! [`codegen`].

pub mod codegen;
pub mod context;
pub mod lexer;
pub mod libs;
pub mod loader;
pub mod resolve;
pub mod treeshake;

pub use context::{CompileOptions, Context, Value};
pub use lexer::{LexError, Token};
pub use resolve::{FileResolver, NoIncludes, ResolveError, SourceResolver};

use crate::ws::instruction::{FlowOp, Instruction};
use std::fmt::Display;
use thiserror::Error;
use tracing::debug;

/// Name under which the top-level source is reported
pub const MAIN_SOURCE: &str = "main";

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum CompileErrorKind {
    #[error(transparent)]
    Lex(#[from] LexError),
    /// Wrong arity or kind of argument, including unknown or mistyped variables
    #[error("{0}")]
    Argument(String),
    #[error("invalid opcode {0}")]
    UnknownOpcode(String),
    #[error("expected opcode, but got {0}")]
    ExpectedOpcode(&'static str),
    #[error("label {0} is never defined")]
    UndefinedLabel(String),
    #[error("cannot include {name}: {reason}")]
    Include { name: String, reason: String },
    #[error("can't use `{0}`: extensions not enabled")]
    Extension(String),
}

/// A compilation failure, located by source name and line number
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CompileError {
    pub source: String,
    pub line: usize,
    pub kind: CompileErrorKind,
}

impl CompileError {
    pub fn new(source: &str, line: usize, kind: CompileErrorKind) -> CompileError {
        CompileError {
            source: source.to_string(),
            line,
            kind,
        }
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.source, self.line, self.kind)
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Lists the kinds of the given tokens for error messages, e.g. `word, integer, and string`
pub(crate) fn describe_args(args: &[Token]) -> String {
    let kinds = args.iter().map(Token::kind).collect::<Vec<_>>();
    match kinds.as_slice() {
        [] => "nothing".to_string(),
        [only] => only.to_string(),
        [first, second] => format!("{} and {}", first, second),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}

/// Compiles a complete WSA program. Built-in libraries are included without consulting
/// `resolver`; every other include is resolved through it.
pub async fn compile(
    source: &str,
    resolver: &mut dyn SourceResolver,
    options: CompileOptions,
) -> Result<String, CompileError> {
    let mut ctx = Context::new(options);
    let lowered = lower(&mut ctx, resolver, source).await?;
    let text = lowered.render();
    debug!(bytes = text.len(), "compiled");

    Ok(text)
}

/// Like [`compile`], with a final `exit` appended so the program always terminates
pub async fn compile_and_exit(
    source: &str,
    resolver: &mut dyn SourceResolver,
    options: CompileOptions,
) -> Result<String, CompileError> {
    let mut text = compile(source, resolver, options).await?;
    Instruction::Flow(FlowOp::Exit).encode_into(&mut text);

    Ok(text)
}

/// Runs every stage but the final encoding, keeping the context for inspection
pub async fn lower(
    ctx: &mut Context,
    resolver: &mut dyn SourceResolver,
    source: &str,
) -> Result<codegen::Lowered, CompileError> {
    let lines = loader::load(ctx, resolver, source, MAIN_SOURCE).await?;
    let lines = treeshake::treeshake(lines);
    codegen::lower(ctx, &lines)
}
