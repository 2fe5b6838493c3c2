use crate::ws::instruction::{ArithmeticOp, FlowOp, HeapOp, Instruction, IoOp, Label, StackOp};
use crate::ws::io::{InputError, InputSource, Io, OutputSink};
use crate::ws::program::Program;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// The largest heap address a program may use
pub const MAX_HEAP_ADDRESS: u64 = (1 << 53) - 1;

/// Everything that changes while a program runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineState {
    pub stack: Vec<BigInt>,
    pub heap: BTreeMap<u64, BigInt>,
    pub call_stack: Vec<usize>,
    pub pc: usize,
    pub halted: bool,
    pub paused: bool,
    pub steps_taken: u64,
}

impl MachineState {
    /// A fresh machine at the first instruction, paused until something runs it
    pub fn new() -> MachineState {
        MachineState {
            stack: Vec::new(),
            heap: BTreeMap::new(),
            call_stack: Vec::new(),
            pc: 0,
            halted: false,
            paused: true,
            steps_taken: 0,
        }
    }
}

impl Default for MachineState {
    fn default() -> Self {
        MachineState::new()
    }
}

/// A flag the run loops check between steps. Setting it stops the loop currently running (or
/// the next one to start) and is consumed by doing so.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Interrupt {
        Interrupt::default()
    }

    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum VmErrorKind {
    #[error("division by zero")]
    DivisionByZero,
    #[error("modulo by zero")]
    ModuloByZero,
    #[error("stack underflow: needs {needed} values, has {available}")]
    StackUnderflow { needed: usize, available: usize },
    #[error("invalid operand {0}")]
    InvalidOperand(BigInt),
    #[error("negative heap address {0}")]
    NegativeAddress(BigInt),
    #[error("heap address {0} is out of range")]
    AddressTooLarge(BigInt),
    #[error("heap address {0} was never written")]
    UninitializedAddress(u64),
    #[error("return without a call")]
    CallStack,
    #[error("undefined {0}")]
    UndefinedLabel(Label),
    #[error("program ended without exit")]
    NoTermination,
    #[error("{0} is not a valid character")]
    InvalidCharacter(BigInt),
    #[error("input failed: {0}")]
    Input(#[from] InputError),
}

impl VmErrorKind {
    fn throw<T>(self, pc: usize, instruction: Option<&Instruction>) -> Result<T, VmError> {
        Err(VmError {
            pc,
            instruction: instruction.cloned(),
            kind: self,
        })
    }
}

/// A runtime failure, carrying the faulting instruction and its address
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct VmError {
    pub pc: usize,
    pub instruction: Option<Instruction>,
    pub kind: VmErrorKind,
}

impl Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.instruction {
            Some(instr) => write!(f, "{} at {} failed: {}", instr, self.pc, self.kind),
            None => write!(f, "at {}: {}", self.pc, self.kind),
        }
    }
}

impl std::error::Error for VmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Where execution continues after an instruction
enum Advance {
    Next,
    Goto(usize),
    Halt,
}

fn need(state: &MachineState, needed: usize) -> Result<(), VmErrorKind> {
    let available = state.stack.len();
    if available < needed {
        return Err(VmErrorKind::StackUnderflow { needed, available });
    }

    Ok(())
}

/// The `n`-th value below the top, `top(state, 0)` being the top itself. Callers check the
/// depth first.
fn top(state: &MachineState, n: usize) -> &BigInt {
    &state.stack[state.stack.len() - 1 - n]
}

fn operand(value: &BigInt) -> Result<usize, VmErrorKind> {
    if value.is_negative() {
        return Err(VmErrorKind::InvalidOperand(value.clone()));
    }

    Ok(value.to_usize().unwrap_or(usize::MAX))
}

fn address(value: &BigInt) -> Result<u64, VmErrorKind> {
    if value.is_negative() {
        return Err(VmErrorKind::NegativeAddress(value.clone()));
    }
    match value.to_u64() {
        Some(address) if address <= MAX_HEAP_ADDRESS => Ok(address),
        _ => Err(VmErrorKind::AddressTooLarge(value.clone())),
    }
}

fn stack(state: &mut MachineState, op: &StackOp) -> Result<Advance, VmErrorKind> {
    match op {
        StackOp::Push(value) => state.stack.push(value.clone()),
        StackOp::Duplicate => {
            need(state, 1)?;
            state.stack.push(top(state, 0).clone());
        }
        StackOp::Copy(n) => {
            let n = operand(n)?;
            need(state, n.saturating_add(1))?;
            state.stack.push(top(state, n).clone());
        }
        StackOp::Swap => {
            need(state, 2)?;
            let len = state.stack.len();
            state.stack.swap(len - 1, len - 2);
        }
        StackOp::Discard => {
            need(state, 1)?;
            state.stack.pop();
        }
        StackOp::Slide(n) => {
            let n = operand(n)?;
            need(state, n.saturating_add(1))?;
            let len = state.stack.len();
            state.stack.drain(len - 1 - n..len - 1);
        }
    }

    Ok(Advance::Next)
}

fn arithmetic(state: &mut MachineState, op: ArithmeticOp) -> Result<Advance, VmErrorKind> {
    let arity = if op == ArithmeticOp::Not { 1 } else { 2 };
    need(state, arity)?;
    let (a, b) = (top(state, arity - 1), top(state, 0));
    let result = match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Subtract => a - b,
        ArithmeticOp::Multiply => a * b,
        ArithmeticOp::Divide if b.is_zero() => return Err(VmErrorKind::DivisionByZero),
        ArithmeticOp::Divide => a.div_floor(b),
        ArithmeticOp::Modulo if b.is_zero() => return Err(VmErrorKind::ModuloByZero),
        ArithmeticOp::Modulo => a.mod_floor(b),
        ArithmeticOp::And => a & b,
        ArithmeticOp::Or => a | b,
        ArithmeticOp::Not => !b,
    };
    state.stack.truncate(state.stack.len() - arity);
    state.stack.push(result);

    Ok(Advance::Next)
}

fn heap(state: &mut MachineState, op: HeapOp) -> Result<Advance, VmErrorKind> {
    match op {
        HeapOp::Store => {
            need(state, 2)?;
            let at = address(top(state, 1))?;
            let value = top(state, 0).clone();
            state.stack.truncate(state.stack.len() - 2);
            state.heap.insert(at, value);
        }
        HeapOp::Retrieve => {
            need(state, 1)?;
            let at = address(top(state, 0))?;
            let value = state
                .heap
                .get(&at)
                .cloned()
                .ok_or(VmErrorKind::UninitializedAddress(at))?;
            state.stack.pop();
            state.stack.push(value);
        }
    }

    Ok(Advance::Next)
}

fn flow(program: &Program, state: &mut MachineState, op: &FlowOp) -> Result<Advance, VmErrorKind> {
    let target = match op.label() {
        Some(label) => program
            .target(label)
            .ok_or_else(|| VmErrorKind::UndefinedLabel(label.clone()))?,
        None => 0,
    };

    match op {
        FlowOp::Mark(_) | FlowOp::Debug => Ok(Advance::Next),
        FlowOp::Call(_) => {
            state.call_stack.push(state.pc + 1);
            Ok(Advance::Goto(target))
        }
        FlowOp::Jump(_) => Ok(Advance::Goto(target)),
        FlowOp::JumpZero(_) | FlowOp::JumpNegative(_) => {
            need(state, 1)?;
            let value = top(state, 0).clone();
            state.stack.pop();
            let taken = match op {
                FlowOp::JumpZero(_) => value.is_zero(),
                _ => value.is_negative(),
            };
            Ok(if taken {
                Advance::Goto(target)
            } else {
                Advance::Next
            })
        }
        FlowOp::Return => state
            .call_stack
            .pop()
            .map(Advance::Goto)
            .ok_or(VmErrorKind::CallStack),
        FlowOp::Exit => Ok(Advance::Halt),
    }
}

async fn io<S, O>(state: &mut MachineState, op: IoOp, io: &mut Io<S, O>) -> Result<Advance, VmErrorKind>
where
    S: InputSource,
    O: OutputSink,
{
    need(state, 1)?;
    match op {
        IoOp::OutCharacter => {
            let value = top(state, 0);
            let c = value
                .to_u32()
                .and_then(char::from_u32)
                .ok_or_else(|| VmErrorKind::InvalidCharacter(value.clone()))?;
            state.stack.pop();
            io.output.char(c);
        }
        IoOp::OutNumber => {
            if let Some(value) = state.stack.pop() {
                io.output.number(&value);
            }
        }
        IoOp::ReadCharacter | IoOp::ReadNumber => {
            // the address is validated before waiting and popped only once input arrived
            let at = address(top(state, 0))?;
            let value = match op {
                IoOp::ReadCharacter => BigInt::from(io.input.read_char().await? as u32),
                _ => io.input.read_number().await?,
            };
            state.stack.pop();
            state.heap.insert(at, value);
        }
    }

    Ok(Advance::Next)
}

/// Executes exactly one instruction. A halted machine is left untouched. Afterwards the machine
/// pauses if it arrived at a breakpoint.
pub async fn step<S, O>(
    program: &Program,
    state: &mut MachineState,
    io_port: &mut Io<S, O>,
) -> Result<(), VmError>
where
    S: InputSource,
    O: OutputSink,
{
    if state.halted {
        return Ok(());
    }
    let pc = state.pc;
    let instr = match program.instruction(pc) {
        Some(instr) => instr,
        None => return VmErrorKind::NoTermination.throw(pc, None),
    };
    trace!(pc, instruction = %instr, depth = state.stack.len(), "step");

    let advance = match instr {
        Instruction::Stack(op) => stack(state, op),
        Instruction::Arithmetic(op) => arithmetic(state, *op),
        Instruction::Heap(op) => heap(state, *op),
        Instruction::Flow(op) => flow(program, state, op),
        Instruction::IO(op) => io(state, *op, io_port).await,
    };
    match advance {
        Ok(Advance::Next) => state.pc = pc + 1,
        Ok(Advance::Goto(target)) => state.pc = target,
        Ok(Advance::Halt) => state.halted = true,
        Err(kind) => return kind.throw(pc, Some(instr)),
    }
    state.steps_taken += 1;
    if program.is_breakpoint(state.pc) {
        state.paused = true;
    }

    Ok(())
}

/// Runs until the machine halts, ignoring breakpoints
pub async fn execute<S, O>(
    program: &Program,
    state: &mut MachineState,
    io_port: &mut Io<S, O>,
    interrupt: &Interrupt,
) -> Result<(), VmError>
where
    S: InputSource,
    O: OutputSink,
{
    while !state.halted && !interrupt.take() {
        step(program, state, io_port).await?;
    }

    Ok(())
}

/// Clears the pause flag, then runs until the machine halts or pauses again
pub async fn run_until_pause<S, O>(
    program: &Program,
    state: &mut MachineState,
    io_port: &mut Io<S, O>,
    interrupt: &Interrupt,
) -> Result<(), VmError>
where
    S: InputSource,
    O: OutputSink,
{
    state.paused = false;
    while !state.halted && !state.paused && !interrupt.take() {
        step(program, state, io_port).await?;
    }

    Ok(())
}

/// Runs until the current routine returns to its caller. Calls and returns on the way are
/// balanced against each other, so nested routines run to completion.
pub async fn step_out<S, O>(
    program: &Program,
    state: &mut MachineState,
    io_port: &mut Io<S, O>,
    interrupt: &Interrupt,
) -> Result<(), VmError>
where
    S: InputSource,
    O: OutputSink,
{
    state.paused = false;
    let mut depth = 1usize;
    while !state.halted && !state.paused && depth > 0 && !interrupt.take() {
        match program.instruction(state.pc) {
            Some(instr) if instr.is_call() => depth += 1,
            Some(instr) if instr.is_return() => depth -= 1,
            _ => {}
        }
        step(program, state, io_port).await?;
    }

    Ok(())
}

/// Steps over a call by running the callee to completion; any other instruction is a single
/// step. Stops early when entering the callee hits a breakpoint.
pub async fn step_over<S, O>(
    program: &Program,
    state: &mut MachineState,
    io_port: &mut Io<S, O>,
    interrupt: &Interrupt,
) -> Result<(), VmError>
where
    S: InputSource,
    O: OutputSink,
{
    let is_call = program
        .instruction(state.pc)
        .map_or(false, Instruction::is_call);
    if !is_call {
        return step(program, state, io_port).await;
    }

    state.paused = false;
    step(program, state, io_port).await?;
    if state.paused || state.halted {
        return Ok(());
    }

    step_out(program, state, io_port, interrupt).await
}
