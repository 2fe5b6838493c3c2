use crate::ws::io::{BufferOutput, FeedInput, InputFeeder, Io};
use crate::ws::parser::{parse, ParseError};
use crate::ws::program::Program;
use crate::ws::vm::{self, Interrupt, MachineState, VmError};
use tracing::debug;

/// An interactive run of one program: the machine, input fed from the outside and buffered
/// output. Every run method resumes from wherever the machine currently is.
#[derive(Debug)]
pub struct Session {
    program: Program,
    state: MachineState,
    io: Io<FeedInput, BufferOutput>,
    feeder: InputFeeder,
    interrupt: Interrupt,
}

impl Session {
    pub fn new(program: Program) -> Session {
        let source = FeedInput::new();
        let feeder = source.feeder();
        Session {
            program,
            state: MachineState::new(),
            io: Io::new(source, BufferOutput::new()),
            feeder,
            interrupt: Interrupt::new(),
        }
    }

    pub fn from_source(source: &str) -> Result<Session, ParseError> {
        Ok(Session::new(Program::load(parse(source)?)))
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// A handle for supplying input, usable while a read is pending
    pub fn feeder(&self) -> InputFeeder {
        self.feeder.clone()
    }

    /// A handle for stopping a running loop from elsewhere
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn toggle_breakpoint(&mut self, index: usize) -> bool {
        self.program.toggle_breakpoint(index)
    }

    pub fn output(&self) -> String {
        self.io.output.all()
    }

    /// Output produced since the previous call
    pub fn take_output(&mut self) -> String {
        self.io.output.take_new()
    }

    /// Puts the machine back to its initial state. A pending read is cancelled and any
    /// buffered input or output is dropped; breakpoints are kept.
    pub fn restart(&mut self) {
        debug!(steps = self.state.steps_taken, "restarting session");
        self.feeder.cancel();
        self.interrupt.clear();
        self.io.input.clear();
        self.io.output.clear();
        self.state = MachineState::new();
    }

    pub async fn step(&mut self) -> Result<(), VmError> {
        vm::step(&self.program, &mut self.state, &mut self.io).await
    }

    pub async fn run(&mut self) -> Result<(), VmError> {
        vm::execute(&self.program, &mut self.state, &mut self.io, &self.interrupt).await
    }

    pub async fn run_until_pause(&mut self) -> Result<(), VmError> {
        vm::run_until_pause(&self.program, &mut self.state, &mut self.io, &self.interrupt).await
    }

    pub async fn step_over(&mut self) -> Result<(), VmError> {
        vm::step_over(&self.program, &mut self.state, &mut self.io, &self.interrupt).await
    }

    pub async fn step_out(&mut self) -> Result<(), VmError> {
        vm::step_out(&self.program, &mut self.state, &mut self.io, &self.interrupt).await
    }
}

#[cfg(test)]
mod tests {
    use super::Session;
    use crate::ws::instruction::decode_readable;
    use futures::executor::block_on;
    use futures::FutureExt;
    use num_bigint::BigInt;
    use std::error::Error;

    // push 1, readn, push 1, retrieve, outn, exit
    const ECHO_NUMBER: &str = "[Space][Space][Space][Tab][LF]\
                               [Tab][LF][Tab][Tab]\
                               [Space][Space][Space][Tab][LF]\
                               [Tab][Tab][Tab]\
                               [Tab][LF][Space][Tab]\
                               [LF][LF][LF]";

    #[test]
    fn input_fed_while_waiting() -> Result<(), Box<dyn Error>> {
        let mut session = Session::from_source(&decode_readable(ECHO_NUMBER))?;
        let feeder = session.feeder();

        // the first poll stops at the read and leaves the machine intact
        assert!(session.run().now_or_never().is_none());
        assert_eq!(session.state().pc, 1);
        assert_eq!(session.state().stack.len(), 1);

        feeder.feed("77\n");
        block_on(session.run())?;
        assert!(session.state().halted);
        assert_eq!(session.take_output(), "77");
        assert_eq!(session.state().heap.get(&1), Some(&BigInt::from(77)));

        Ok(())
    }

    #[test]
    fn restart_resets_everything_but_breakpoints() -> Result<(), Box<dyn Error>> {
        let mut session = Session::from_source(&decode_readable(ECHO_NUMBER))?;
        session.toggle_breakpoint(4);
        session.feeder().feed("5\n");
        block_on(session.run_until_pause())?;
        assert_eq!(session.state().pc, 4);
        assert!(session.state().paused);

        session.restart();
        assert_eq!(session.state().pc, 0);
        assert!(session.state().heap.is_empty());
        assert_eq!(session.output(), "");
        assert!(session.program().is_breakpoint(4));

        session.feeder().feed("6\n");
        block_on(session.run())?;
        assert_eq!(session.output(), "6");

        Ok(())
    }
}
