#![allow(dead_code)]

use futures::executor::block_on;
use std::error::Error;
use wsa::ws::Session;
use wsa::wsa::{compile_and_exit, CompileError, CompileOptions, NoIncludes};

pub fn compile(source: &str, options: CompileOptions) -> Result<String, CompileError> {
    block_on(compile_and_exit(source, &mut NoIncludes, options))
}

/// Compiles and runs `source` to completion, returning everything it printed
pub fn run_with(
    source: &str,
    options: CompileOptions,
    input: &str,
) -> Result<String, Box<dyn Error>> {
    let mut session = Session::from_source(&compile(source, options)?)?;
    session.feeder().feed(input);
    session.feeder().close();
    block_on(session.run())?;
    assert!(session.state().halted);

    Ok(session.output())
}

pub fn run(source: &str) -> Result<String, Box<dyn Error>> {
    run_with(source, CompileOptions::default(), "")
}
