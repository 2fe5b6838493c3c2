use crate::ws::instruction::{
    readable, ArithmeticOp, FlowOp, HeapOp, Imp, Instruction, IoOp, Label, StackOp, LINE_FEED,
    SPACE, TAB,
};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unable to parse IMP: {0}")]
    UnknownImp(String),
    #[error("unknown {imp} command: {bits}")]
    UnknownCommand { imp: Imp, bits: String },
    #[error("program ended inside a {0} instruction")]
    UnexpectedEnd(Imp),
    #[error("expected a sign (space or tab) but got a line feed")]
    MissingSign,
    #[error("program ended without terminating number")]
    UnterminatedNumber,
}

impl ParseErrorKind {
    fn throw<T>(self, position: usize) -> Result<T, ParseError> {
        Err(ParseError {
            position,
            kind: self,
        })
    }
}

/// A parse failure together with the offset (in the raw source) of the offending bit
#[derive(Debug, PartialEq, Eq)]
pub struct ParseError {
    pub position: usize,
    pub kind: ParseErrorKind,
}

impl std::error::Error for ParseError {}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at position {})", self.kind, self.position)
    }
}

/// The component responsible for turning target-language text into instructions. Every
/// character other than space, tab and line feed is ignored.
#[derive(Debug)]
pub struct Parser<'s> {
    source: &'s [u8],
    token_index: usize,
    done: bool,
}

impl<'s> Parser<'s> {
    pub fn new(source: &'s str) -> Parser<'s> {
        Parser {
            source: source.as_bytes(),
            token_index: 0,
            done: false,
        }
    }

    fn next(&mut self) -> Option<u8> {
        while self.token_index < self.source.len() {
            let token = self.source[self.token_index];
            self.token_index += 1;
            if token == SPACE || token == TAB || token == LINE_FEED {
                return Some(token);
            }
        }

        None
    }

    fn expect(&mut self, imp: Imp) -> Result<u8, ParseError> {
        match self.next() {
            Some(token) => Ok(token),
            None => ParseErrorKind::UnexpectedEnd(imp).throw(self.token_index),
        }
    }

    fn unknown<T>(&self, imp: Imp, bits: &[u8]) -> Result<T, ParseError> {
        let bits = bits.iter().map(|b| *b as char).collect::<String>();
        ParseErrorKind::UnknownCommand {
            imp,
            bits: readable(&bits),
        }
        .throw(self.token_index)
    }

    fn imp(&mut self, first: u8) -> Result<Imp, ParseError> {
        match first {
            SPACE => Ok(Imp::Stack),
            LINE_FEED => Ok(Imp::Flow),
            _ => match self.next() {
                Some(SPACE) => Ok(Imp::Arithmetic),
                Some(TAB) => Ok(Imp::Heap),
                Some(LINE_FEED) => Ok(Imp::IO),
                _ => ParseErrorKind::UnknownImp("T".to_string()).throw(self.token_index),
            },
        }
    }

    fn stack(&mut self) -> Result<Instruction, ParseError> {
        let first = self.expect(Imp::Stack)?;
        if first == SPACE {
            return Ok(Instruction::Stack(StackOp::Push(self.number()?)));
        }
        let second = self.expect(Imp::Stack)?;
        let op = match (first, second) {
            (LINE_FEED, SPACE) => StackOp::Duplicate,
            (LINE_FEED, TAB) => StackOp::Swap,
            (LINE_FEED, LINE_FEED) => StackOp::Discard,
            (TAB, SPACE) => StackOp::Copy(self.number()?),
            (TAB, LINE_FEED) => StackOp::Slide(self.number()?),
            _ => return self.unknown(Imp::Stack, &[first, second]),
        };

        Ok(Instruction::Stack(op))
    }

    fn arithmetic(&mut self) -> Result<Instruction, ParseError> {
        let first = self.expect(Imp::Arithmetic)?;
        let second = self.expect(Imp::Arithmetic)?;
        let op = match (first, second) {
            (SPACE, SPACE) => ArithmeticOp::Add,
            (SPACE, TAB) => ArithmeticOp::Subtract,
            (SPACE, LINE_FEED) => ArithmeticOp::Multiply,
            (TAB, SPACE) => ArithmeticOp::Divide,
            (TAB, TAB) => ArithmeticOp::Modulo,
            (LINE_FEED, LINE_FEED) => ArithmeticOp::And,
            (LINE_FEED, SPACE) => ArithmeticOp::Or,
            (LINE_FEED, TAB) => ArithmeticOp::Not,
            _ => return self.unknown(Imp::Arithmetic, &[first, second]),
        };

        Ok(Instruction::Arithmetic(op))
    }

    fn heap(&mut self) -> Result<Instruction, ParseError> {
        match self.expect(Imp::Heap)? {
            SPACE => Ok(Instruction::Heap(HeapOp::Store)),
            TAB => Ok(Instruction::Heap(HeapOp::Retrieve)),
            other => self.unknown(Imp::Heap, &[other]),
        }
    }

    fn flow(&mut self) -> Result<Instruction, ParseError> {
        let first = self.expect(Imp::Flow)?;
        let second = self.expect(Imp::Flow)?;
        let op = match (first, second) {
            (SPACE, SPACE) => FlowOp::Mark(self.label()?),
            (SPACE, TAB) => FlowOp::Call(self.label()?),
            (SPACE, LINE_FEED) => FlowOp::Jump(self.label()?),
            (TAB, SPACE) => FlowOp::JumpZero(self.label()?),
            (TAB, TAB) => FlowOp::JumpNegative(self.label()?),
            (TAB, LINE_FEED) => FlowOp::Return,
            (LINE_FEED, LINE_FEED) => FlowOp::Exit,
            (LINE_FEED, SPACE) => FlowOp::Debug,
            _ => return self.unknown(Imp::Flow, &[first, second]),
        };

        Ok(Instruction::Flow(op))
    }

    fn io(&mut self) -> Result<Instruction, ParseError> {
        let first = self.expect(Imp::IO)?;
        let second = self.expect(Imp::IO)?;
        let op = match (first, second) {
            (SPACE, SPACE) => IoOp::OutCharacter,
            (SPACE, TAB) => IoOp::OutNumber,
            (TAB, SPACE) => IoOp::ReadCharacter,
            (TAB, TAB) => IoOp::ReadNumber,
            _ => return self.unknown(Imp::IO, &[first, second]),
        };

        Ok(Instruction::IO(op))
    }

    /// Binary digits (space = 0, tab = 1) up to the terminating line feed
    fn unsigned(&mut self) -> Result<BigUint, ParseError> {
        let mut value = BigUint::zero();
        loop {
            match self.next() {
                Some(LINE_FEED) => return Ok(value),
                Some(bit) => {
                    value <<= 1u32;
                    if bit == TAB {
                        value += 1u32;
                    }
                }
                None => return ParseErrorKind::UnterminatedNumber.throw(self.token_index),
            }
        }
    }

    fn number(&mut self) -> Result<BigInt, ParseError> {
        let sign = match self.next() {
            Some(SPACE) => Sign::Plus,
            Some(TAB) => Sign::Minus,
            Some(_) => return ParseErrorKind::MissingSign.throw(self.token_index),
            None => return ParseErrorKind::UnterminatedNumber.throw(self.token_index),
        };

        Ok(BigInt::from_biguint(sign, self.unsigned()?))
    }

    fn label(&mut self) -> Result<Label, ParseError> {
        Ok(Label(self.unsigned()?))
    }

    fn instruction(&mut self) -> Option<Result<Instruction, ParseError>> {
        let first = self.next()?;
        let instr = self.imp(first).and_then(|imp| match imp {
            Imp::Stack => self.stack(),
            Imp::Arithmetic => self.arithmetic(),
            Imp::Heap => self.heap(),
            Imp::Flow => self.flow(),
            Imp::IO => self.io(),
        });

        Some(instr)
    }
}

impl Iterator for Parser<'_> {
    type Item = Result<Instruction, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.instruction();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }

        item
    }
}

/// Parses a whole program, stopping at the first malformed instruction
pub fn parse(source: &str) -> Result<Vec<Instruction>, ParseError> {
    Parser::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::{parse, ParseError, ParseErrorKind};
    use crate::ws::instruction::{
        decode_readable, ArithmeticOp, FlowOp, HeapOp, Imp, Instruction, IoOp, Label, StackOp,
    };
    use num_bigint::BigInt;

    fn test_parse(source: &str, results: Vec<Instruction>) -> Result<(), ParseError> {
        let instructions = parse(&decode_readable(source))?;
        assert_eq!(instructions, results);

        Ok(())
    }

    #[test]
    fn parse_stack() -> Result<(), ParseError> {
        test_parse(
            "[Space][Space][Space][Tab][Space][Space][Space][Space][Space][Space][LF]
             [Space][LF][Space]
             [Space][Tab][Space][Space][Tab][LF]
             [Space][LF][Tab]
             [Space][LF][LF]
             [Space][Tab][LF][Space][Tab][Tab][LF]",
            vec![
                Instruction::Stack(StackOp::Push(BigInt::from(64))),
                Instruction::Stack(StackOp::Duplicate),
                Instruction::Stack(StackOp::Copy(BigInt::from(1))),
                Instruction::Stack(StackOp::Swap),
                Instruction::Stack(StackOp::Discard),
                Instruction::Stack(StackOp::Slide(BigInt::from(3))),
            ],
        )
    }

    #[test]
    fn parse_arithmetic() -> Result<(), ParseError> {
        test_parse(
            "[Tab][Space][Space][Space]
             [Tab][Space][Space][Tab]
             [Tab][Space][Space][LF]
             [Tab][Space][Tab][Space]
             [Tab][Space][Tab][Tab]
             [Tab][Space][LF][LF]
             [Tab][Space][LF][Space]
             [Tab][Space][LF][Tab]",
            vec![
                Instruction::Arithmetic(ArithmeticOp::Add),
                Instruction::Arithmetic(ArithmeticOp::Subtract),
                Instruction::Arithmetic(ArithmeticOp::Multiply),
                Instruction::Arithmetic(ArithmeticOp::Divide),
                Instruction::Arithmetic(ArithmeticOp::Modulo),
                Instruction::Arithmetic(ArithmeticOp::And),
                Instruction::Arithmetic(ArithmeticOp::Or),
                Instruction::Arithmetic(ArithmeticOp::Not),
            ],
        )
    }

    #[test]
    fn parse_heap() -> Result<(), ParseError> {
        test_parse(
            "[Tab][Tab][Space][Tab][Tab][Tab]",
            vec![
                Instruction::Heap(HeapOp::Store),
                Instruction::Heap(HeapOp::Retrieve),
            ],
        )
    }

    #[test]
    fn parse_flow() -> Result<(), ParseError> {
        test_parse(
            "[LF][Space][Space][Tab][Space][LF]
             [LF][Space][Tab][Tab][Space][LF]
             [LF][Space][LF][LF]
             [LF][Tab][Space][Tab][LF]
             [LF][Tab][Tab][Tab][LF]
             [LF][Tab][LF]
             [LF][LF][Space]
             [LF][LF][LF]",
            vec![
                Instruction::Flow(FlowOp::Mark(Label::from(2))),
                Instruction::Flow(FlowOp::Call(Label::from(2))),
                Instruction::Flow(FlowOp::Jump(Label::from(0))),
                Instruction::Flow(FlowOp::JumpZero(Label::from(1))),
                Instruction::Flow(FlowOp::JumpNegative(Label::from(1))),
                Instruction::Flow(FlowOp::Return),
                Instruction::Flow(FlowOp::Debug),
                Instruction::Flow(FlowOp::Exit),
            ],
        )
    }

    #[test]
    fn parse_io() -> Result<(), ParseError> {
        test_parse(
            "[Tab][LF][Space][Space]
             [Tab][LF][Space][Tab]
             [Tab][LF][Tab][Space]
             [Tab][LF][Tab][Tab]",
            vec![
                Instruction::IO(IoOp::OutCharacter),
                Instruction::IO(IoOp::OutNumber),
                Instruction::IO(IoOp::ReadCharacter),
                Instruction::IO(IoOp::ReadNumber),
            ],
        )
    }

    #[test]
    fn comments_are_ignored() -> Result<(), ParseError> {
        let instructions = parse("outn:\t\n \t;exit:\n\n\n")?;
        assert_eq!(
            instructions,
            vec![
                Instruction::IO(IoOp::OutNumber),
                Instruction::Flow(FlowOp::Exit),
            ]
        );

        Ok(())
    }

    #[test]
    fn negative_zero_is_zero() -> Result<(), ParseError> {
        let instructions = parse("  \t\n")?;
        assert_eq!(
            instructions,
            vec![Instruction::Stack(StackOp::Push(BigInt::from(0)))]
        );

        Ok(())
    }

    #[test]
    fn unknown_bit_patterns() {
        let err = parse(&decode_readable("[Tab][Space][Tab][LF]")).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UnknownCommand {
                imp: Imp::Arithmetic,
                bits: "TN".to_string()
            }
        );

        let err = parse(&decode_readable("[Space][Tab][Tab]")).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UnknownCommand {
                imp: Imp::Stack,
                bits: "TT".to_string()
            }
        );

        let err = parse(&decode_readable("[LF][LF][Tab]")).unwrap_err();
        assert!(matches!(
            err.kind,
            ParseErrorKind::UnknownCommand { imp: Imp::Flow, .. }
        ));
    }

    #[test]
    fn malformed_numbers() {
        let err = parse(&decode_readable("[Space][Space][Space][Tab]")).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedNumber);

        let err = parse(&decode_readable("[Space][Space][LF]")).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingSign);

        let err = parse(&decode_readable("[Tab][Tab]")).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEnd(Imp::Heap));
    }
}
