pub mod instruction;
pub mod io;
pub mod parser;
pub mod program;
pub mod session;
pub mod vm;

pub use instruction::{Imp, Instruction, Label};
pub use io::{BufferOutput, FeedInput, InputError, InputFeeder, Io, StaticInput};
pub use parser::{parse, ParseError, ParseErrorKind, Parser};
pub use program::Program;
pub use session::Session;
pub use vm::{Interrupt, MachineState, VmError, VmErrorKind, MAX_HEAP_ADDRESS};
