use num_bigint::{BigInt, BigUint, Sign};
use std::fmt::Display;

pub const SPACE: u8 = b' ';
pub const TAB: u8 = b'\t';
pub const LINE_FEED: u8 = b'\n';

/// The instruction modification parameter, the leading bits of every instruction selecting its
/// category
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Imp {
    Stack,
    Arithmetic,
    Heap,
    Flow,
    IO,
}

impl Display for Imp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Imp::Stack => "stack",
            Imp::Arithmetic => "arithmetic",
            Imp::Heap => "heap",
            Imp::Flow => "flow",
            Imp::IO => "io",
        };
        write!(f, "{}", name)
    }
}

/// A label as it appears in the binary encoding: an unsigned number of arbitrary width
#[derive(Debug, PartialEq, Eq, Clone, Hash, PartialOrd, Ord)]
pub struct Label(pub BigUint);

impl From<u64> for Label {
    fn from(id: u64) -> Self {
        Label(BigUint::from(id))
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "label_{}", self.0)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum StackOp {
    Push(BigInt),
    Duplicate,
    Copy(BigInt),
    Swap,
    Discard,
    Slide(BigInt),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
    Not,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum HeapOp {
    Store,
    Retrieve,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum FlowOp {
    Mark(Label),
    Call(Label),
    Jump(Label),
    JumpZero(Label),
    JumpNegative(Label),
    Return,
    Exit,
    /// Extension: registers a breakpoint at its own index when the program is loaded
    Debug,
}

impl FlowOp {
    /// The label a flow instruction refers to, if any
    pub fn label(&self) -> Option<&Label> {
        match self {
            FlowOp::Mark(label)
            | FlowOp::Call(label)
            | FlowOp::Jump(label)
            | FlowOp::JumpZero(label)
            | FlowOp::JumpNegative(label) => Some(label),
            FlowOp::Return | FlowOp::Exit | FlowOp::Debug => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum IoOp {
    OutCharacter,
    OutNumber,
    ReadCharacter,
    ReadNumber,
}

/// A single target-language instruction. Immutable once parsed; the same type is produced by
/// the bytecode parser and by the assembler's code generator.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Instruction {
    Stack(StackOp),
    Arithmetic(ArithmeticOp),
    Heap(HeapOp),
    Flow(FlowOp),
    IO(IoOp),
}

impl Instruction {
    pub fn imp(&self) -> Imp {
        match self {
            Instruction::Stack(_) => Imp::Stack,
            Instruction::Arithmetic(_) => Imp::Arithmetic,
            Instruction::Heap(_) => Imp::Heap,
            Instruction::Flow(_) => Imp::Flow,
            Instruction::IO(_) => Imp::IO,
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Instruction::Flow(FlowOp::Call(_)))
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Instruction::Flow(FlowOp::Return))
    }

    /// Appends the binary encoding of this instruction to `out`
    pub fn encode_into(&self, out: &mut String) {
        let (imp, cmd) = self.opcode();
        out.push_str(imp);
        out.push_str(cmd);
        match self {
            Instruction::Stack(StackOp::Push(value))
            | Instruction::Stack(StackOp::Copy(value))
            | Instruction::Stack(StackOp::Slide(value)) => encode_number(value, out),
            Instruction::Flow(op) => {
                if let Some(label) = op.label() {
                    encode_label(label, out);
                }
            }
            _ => {}
        }
    }

    /// Returns the binary encoding of this instruction
    pub fn encode(&self) -> String {
        let mut out = String::new();
        self.encode_into(&mut out);
        out
    }

    fn opcode(&self) -> (&'static str, &'static str) {
        match self {
            Instruction::Stack(op) => (
                " ",
                match op {
                    StackOp::Push(_) => " ",
                    StackOp::Duplicate => "\n ",
                    StackOp::Copy(_) => "\t ",
                    StackOp::Swap => "\n\t",
                    StackOp::Discard => "\n\n",
                    StackOp::Slide(_) => "\t\n",
                },
            ),
            Instruction::Arithmetic(op) => (
                "\t ",
                match op {
                    ArithmeticOp::Add => "  ",
                    ArithmeticOp::Subtract => " \t",
                    ArithmeticOp::Multiply => " \n",
                    ArithmeticOp::Divide => "\t ",
                    ArithmeticOp::Modulo => "\t\t",
                    ArithmeticOp::And => "\n\n",
                    ArithmeticOp::Or => "\n ",
                    ArithmeticOp::Not => "\n\t",
                },
            ),
            Instruction::Heap(op) => (
                "\t\t",
                match op {
                    HeapOp::Store => " ",
                    HeapOp::Retrieve => "\t",
                },
            ),
            Instruction::Flow(op) => (
                "\n",
                match op {
                    FlowOp::Mark(_) => "  ",
                    FlowOp::Call(_) => " \t",
                    FlowOp::Jump(_) => " \n",
                    FlowOp::JumpZero(_) => "\t ",
                    FlowOp::JumpNegative(_) => "\t\t",
                    FlowOp::Return => "\t\n",
                    FlowOp::Exit => "\n\n",
                    FlowOp::Debug => "\n ",
                },
            ),
            Instruction::IO(op) => (
                "\t\n",
                match op {
                    IoOp::OutCharacter => "  ",
                    IoOp::OutNumber => " \t",
                    IoOp::ReadCharacter => "\t ",
                    IoOp::ReadNumber => "\t\t",
                },
            ),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Stack(op) => match op {
                StackOp::Push(value) => write!(f, "push {}", value),
                StackOp::Duplicate => write!(f, "dup"),
                StackOp::Copy(value) => write!(f, "copy {}", value),
                StackOp::Swap => write!(f, "swap"),
                StackOp::Discard => write!(f, "pop"),
                StackOp::Slide(value) => write!(f, "slide {}", value),
            },
            Instruction::Arithmetic(op) => write!(
                f,
                "{}",
                match op {
                    ArithmeticOp::Add => "add",
                    ArithmeticOp::Subtract => "sub",
                    ArithmeticOp::Multiply => "mul",
                    ArithmeticOp::Divide => "div",
                    ArithmeticOp::Modulo => "mod",
                    ArithmeticOp::And => "and",
                    ArithmeticOp::Or => "or",
                    ArithmeticOp::Not => "not",
                }
            ),
            Instruction::Heap(HeapOp::Store) => write!(f, "store"),
            Instruction::Heap(HeapOp::Retrieve) => write!(f, "retrieve"),
            Instruction::Flow(op) => match op {
                FlowOp::Mark(label) => write!(f, "mark {}", label),
                FlowOp::Call(label) => write!(f, "call {}", label),
                FlowOp::Jump(label) => write!(f, "jmp {}", label),
                FlowOp::JumpZero(label) => write!(f, "jmpz {}", label),
                FlowOp::JumpNegative(label) => write!(f, "jmpn {}", label),
                FlowOp::Return => write!(f, "ret"),
                FlowOp::Exit => write!(f, "exit"),
                FlowOp::Debug => write!(f, "dbg"),
            },
            Instruction::IO(op) => write!(
                f,
                "{}",
                match op {
                    IoOp::OutCharacter => "outc",
                    IoOp::OutNumber => "outn",
                    IoOp::ReadCharacter => "readc",
                    IoOp::ReadNumber => "readn",
                }
            ),
        }
    }
}

fn push_binary(digits: &str, out: &mut String) {
    out.extend(digits.chars().map(|d| if d == '0' { ' ' } else { '\t' }));
    out.push('\n');
}

/// Sign (space for non-negative, tab for negative), magnitude in binary, line feed
fn encode_number(value: &BigInt, out: &mut String) {
    out.push(if value.sign() == Sign::Minus { '\t' } else { ' ' });
    push_binary(&value.magnitude().to_str_radix(2), out);
}

fn encode_label(label: &Label, out: &mut String) {
    push_binary(&label.0.to_str_radix(2), out);
}

/// Renders whitespace compactly as `S`, `T` and `N`, dropping every other character. Used in
/// error messages where raw whitespace would be invisible.
pub fn readable(code: &str) -> String {
    code.chars()
        .filter_map(|c| match c {
            ' ' => Some('S'),
            '\t' => Some('T'),
            '\n' => Some('N'),
            _ => None,
        })
        .collect()
}

/// Prefixes every significant character with a visible marker while keeping the program
/// executable, since the markers themselves are ignored by the parser
pub fn annotate(code: &str) -> String {
    let mut out = String::with_capacity(code.len() * 2);
    for c in code.chars() {
        match c {
            ' ' => out.push_str("S "),
            '\t' => out.push_str("T\t"),
            '\n' => out.push_str("L\n"),
            other => out.push(other),
        }
    }
    out
}

/// Decodes the bracketed notation (`[Space]`, `[Tab]`, `[LF]`) into raw whitespace. Literal
/// whitespace in the input is layout only and is dropped first.
pub fn decode_readable(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '\n' | '\r'))
        .collect::<String>()
        .replace("[LF]", "\n")
        .replace("[Space]", " ")
        .replace("[Tab]", "\t")
}
