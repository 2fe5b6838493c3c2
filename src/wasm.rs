//! Bindings for driving the assembler and a debugging session from JavaScript

use crate::ws::Session;
use crate::wsa::{compile_and_exit, CompileOptions, NoIncludes};
use crate::Error;
use futures::FutureExt;
use std::future::Future;
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen::JsValue;

impl From<Error> for JsValue {
    fn from(err: Error) -> JsValue {
        JsValue::from(err.to_string())
    }
}

/// Compiles WSA source that includes nothing but built-in libraries
#[wasm_bindgen]
pub fn compile_wsa(source: &str, extensions: bool) -> Result<String, Error> {
    let options = CompileOptions { extensions };
    let mut resolver = NoIncludes;
    let compiled = compile_and_exit(source, &mut resolver, options)
        .now_or_never()
        .unwrap_or_else(still_pending);

    Ok(compiled?)
}

// built-in libraries and `NoIncludes` resolve without waiting
fn still_pending<T>() -> Result<T, crate::wsa::CompileError> {
    Err(crate::wsa::CompileError::new(
        crate::wsa::MAIN_SOURCE,
        0,
        crate::wsa::CompileErrorKind::Include {
            name: String::new(),
            reason: "include resolution did not complete".to_string(),
        },
    ))
}

/// A debugging session over a whitespace program. Run methods return `false` while the
/// program waits for input; feed it with [`Debugger::feed`] and call the method again.
#[wasm_bindgen]
pub struct Debugger {
    session: Session,
}

/// Polls a run once. A pending run has stopped at a read and left the machine as it was
/// before that instruction.
fn poll<F>(run: F) -> Result<bool, Error>
where
    F: Future<Output = Result<(), crate::ws::VmError>>,
{
    match run.now_or_never() {
        Some(result) => result.map(|()| true).map_err(Error::from),
        None => Ok(false),
    }
}

#[wasm_bindgen]
impl Debugger {
    #[wasm_bindgen(constructor)]
    pub fn new(source: &str) -> Result<Debugger, Error> {
        Ok(Debugger {
            session: Session::new(crate::load_program(source)?),
        })
    }

    pub fn step(&mut self) -> Result<bool, Error> {
        poll(self.session.step())
    }

    pub fn run(&mut self) -> Result<bool, Error> {
        poll(self.session.run())
    }

    pub fn run_until_pause(&mut self) -> Result<bool, Error> {
        poll(self.session.run_until_pause())
    }

    pub fn step_over(&mut self) -> Result<bool, Error> {
        poll(self.session.step_over())
    }

    pub fn step_out(&mut self) -> Result<bool, Error> {
        poll(self.session.step_out())
    }

    pub fn feed(&self, text: &str) {
        self.session.feeder().feed(text);
    }

    pub fn close_input(&self) {
        self.session.feeder().close();
    }

    pub fn restart(&mut self) {
        self.session.restart();
    }

    pub fn toggle_breakpoint(&mut self, index: usize) -> bool {
        self.session.toggle_breakpoint(index)
    }

    pub fn pc(&self) -> usize {
        self.session.state().pc
    }

    pub fn halted(&self) -> bool {
        self.session.state().halted
    }

    pub fn paused(&self) -> bool {
        self.session.state().paused
    }

    pub fn steps_taken(&self) -> f64 {
        self.session.state().steps_taken as f64
    }

    /// Stack values from bottom to top, separated by spaces
    pub fn stack(&self) -> String {
        self.session
            .state()
            .stack
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// One `address: value` line per written heap cell
    pub fn heap(&self) -> String {
        self.session
            .state()
            .heap
            .iter()
            .map(|(address, value)| format!("{}: {}\n", address, value))
            .collect()
    }

    /// Output produced since the previous call
    pub fn output(&mut self) -> String {
        self.session.take_output()
    }

    pub fn listing(&self) -> String {
        self.session.program().listing()
    }
}
