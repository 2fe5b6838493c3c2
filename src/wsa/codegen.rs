use crate::ws::instruction::{ArithmeticOp, FlowOp, HeapOp, Instruction, IoOp, Label, StackOp};
use crate::wsa::context::{Context, Value};
use crate::wsa::lexer::Token;
use crate::wsa::loader::Line;
use crate::wsa::{describe_args, CompileError, CompileErrorKind};
use num_bigint::BigInt;
use std::collections::HashSet;
use tracing::debug;

/// Argument shapes an opcode accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Params {
    None,
    Integer,
    OptionalInteger,
    /// An integer that must not be written as a char literal
    Index,
    Str,
    Label,
    VariableInteger,
    VariableString,
}

impl Params {
    fn describe(self) -> &'static str {
        match self {
            Params::None => "no arguments",
            Params::Integer => "an integer argument",
            Params::OptionalInteger => "an optional integer argument",
            Params::Index => "an index argument",
            Params::Str => "a string argument",
            Params::Label => "a label argument",
            Params::VariableInteger => "a variable and an integer argument",
            Params::VariableString => "a variable and a string argument",
        }
    }
}

fn signature(opcode: &str) -> Option<Params> {
    let params = match opcode {
        "push" => Params::Integer,
        "copy" | "slide" => Params::Index,
        "add" | "sub" | "mul" | "div" | "mod" | "and" | "or" => Params::OptionalInteger,
        "store" | "retrieve" => Params::OptionalInteger,
        "storestr" => Params::Str,
        "label" | "call" | "jump" | "jumpz" | "jumpn" | "jumpp" | "jumpnz" | "jumppz"
        | "jumppn" | "jumpnp" => Params::Label,
        "valueinteger" => Params::VariableInteger,
        "valuestring" => Params::VariableString,
        "dup" | "swap" | "pop" | "not" | "ret" | "exit" | "outn" | "outc" | "readn" | "readc"
        | "debugger" => Params::None,
        _ => return None,
    };

    Some(params)
}

fn requires_extensions(opcode: &str) -> bool {
    matches!(opcode, "and" | "or" | "not" | "debugger")
}

/// Arguments after validation against the opcode's [`Params`]
enum Args {
    None,
    Integer(BigInt),
    Optional(Option<BigInt>),
    Str(String),
    Label(String),
    Define(String, Value),
}

fn integer(ctx: &Context, token: &Token) -> Result<Option<BigInt>, CompileErrorKind> {
    match token {
        Token::Integer(value) | Token::Char(value) => Ok(Some(value.clone())),
        Token::Variable(name) => match ctx.variable(name) {
            Some(Value::Integer(value)) => Ok(Some(value.clone())),
            Some(other) => Err(CompileErrorKind::Argument(format!(
                "variable {} holds a {}, expected an integer",
                name,
                other.kind()
            ))),
            None => Err(CompileErrorKind::Argument(format!(
                "variable {} is not defined",
                name
            ))),
        },
        _ => Ok(None),
    }
}

fn string(ctx: &Context, token: &Token) -> Result<Option<String>, CompileErrorKind> {
    match token {
        Token::Str(value) | Token::Word(value) => Ok(Some(value.clone())),
        Token::Variable(name) => match ctx.variable(name) {
            Some(Value::Str(value)) => Ok(Some(value.clone())),
            Some(other) => Err(CompileErrorKind::Argument(format!(
                "variable {} holds an {}, expected a string",
                name,
                other.kind()
            ))),
            None => Err(CompileErrorKind::Argument(format!(
                "variable {} is not defined",
                name
            ))),
        },
        _ => Ok(None),
    }
}

fn parse_args(ctx: &Context, params: Params, args: &[Token]) -> Result<Args, CompileErrorKind> {
    let parsed = match (params, args) {
        (Params::None, []) => Some(Args::None),
        (Params::Integer, [value]) => integer(ctx, value)?.map(Args::Integer),
        (Params::OptionalInteger, []) => Some(Args::Optional(None)),
        (Params::OptionalInteger, [value]) => {
            integer(ctx, value)?.map(|value| Args::Optional(Some(value)))
        }
        (Params::Index, [Token::Char(_)]) => None,
        (Params::Index, [value]) => integer(ctx, value)?.map(Args::Integer),
        (Params::Str, [value]) => string(ctx, value)?.map(Args::Str),
        (Params::Label, [Token::Word(name)]) | (Params::Label, [Token::Variable(name)]) => {
            Some(Args::Label(name.clone()))
        }
        (Params::VariableInteger, [Token::Variable(name), value]) => integer(ctx, value)?
            .map(|value| Args::Define(name.clone(), Value::Integer(value))),
        (Params::VariableString, [Token::Variable(name), value]) => string(ctx, value)?
            .map(|value| Args::Define(name.clone(), Value::Str(value))),
        _ => None,
    };

    parsed.ok_or_else(|| {
        CompileErrorKind::Argument(format!(
            "expected {}, but got {}",
            params.describe(),
            describe_args(args)
        ))
    })
}

fn push(value: BigInt) -> Instruction {
    Instruction::Stack(StackOp::Push(value))
}

fn arithmetic(op: ArithmeticOp) -> Instruction {
    Instruction::Arithmetic(op)
}

fn flow(op: FlowOp) -> Instruction {
    Instruction::Flow(op)
}

/// Emits `op`, preceded by a push of the immediate if there is one. An immediate equal to
/// `identity` makes the whole operation a no-op and nothing is emitted.
fn immediate(out: &mut Vec<Instruction>, value: Option<BigInt>, identity: Option<u8>, op: Instruction) {
    match value {
        Some(value) if identity.map_or(false, |identity| value == BigInt::from(identity)) => {}
        Some(value) => {
            out.push(push(value));
            out.push(op);
        }
        None => out.push(op),
    }
}

/// Label definitions and first uses, checked once the whole program is generated
#[derive(Debug, Default)]
struct LabelUses {
    defined: HashSet<String>,
    seen: HashSet<String>,
    used: Vec<(String, Line)>,
}

impl LabelUses {
    fn define(&mut self, ctx: &mut Context, name: &str) -> Label {
        self.defined.insert(name.to_string());
        ctx.label(name)
    }

    fn use_label(&mut self, ctx: &mut Context, name: &str, line: &Line) -> Label {
        if self.seen.insert(name.to_string()) {
            self.used.push((name.to_string(), line.clone()));
        }
        ctx.label(name)
    }

    fn check(&self) -> Result<(), CompileError> {
        match self.used.iter().find(|(name, _)| !self.defined.contains(name)) {
            Some((name, line)) => line.fail(CompileErrorKind::UndefinedLabel(name.clone())),
            None => Ok(()),
        }
    }
}

fn expand(
    ctx: &mut Context,
    labels: &mut LabelUses,
    line: &Line,
    opcode: &str,
    args: Args,
    out: &mut Vec<Instruction>,
) {
    match (opcode, args) {
        ("push", Args::Integer(value)) => out.push(push(value)),
        ("dup", _) => out.push(Instruction::Stack(StackOp::Duplicate)),
        ("swap", _) => out.push(Instruction::Stack(StackOp::Swap)),
        ("pop", _) => out.push(Instruction::Stack(StackOp::Discard)),
        ("copy", Args::Integer(n)) => out.push(Instruction::Stack(StackOp::Copy(n))),
        ("slide", Args::Integer(n)) => out.push(Instruction::Stack(StackOp::Slide(n))),

        ("add", Args::Optional(value)) => {
            immediate(out, value, Some(0), arithmetic(ArithmeticOp::Add))
        }
        ("sub", Args::Optional(value)) => {
            immediate(out, value, Some(0), arithmetic(ArithmeticOp::Subtract))
        }
        ("mul", Args::Optional(value)) => {
            immediate(out, value, Some(1), arithmetic(ArithmeticOp::Multiply))
        }
        ("div", Args::Optional(value)) => {
            immediate(out, value, Some(1), arithmetic(ArithmeticOp::Divide))
        }
        ("mod", Args::Optional(value)) => {
            immediate(out, value, None, arithmetic(ArithmeticOp::Modulo))
        }
        ("and", Args::Optional(value)) => immediate(out, value, None, arithmetic(ArithmeticOp::And)),
        ("or", Args::Optional(value)) => immediate(out, value, None, arithmetic(ArithmeticOp::Or)),
        ("not", _) => out.push(arithmetic(ArithmeticOp::Not)),

        ("store", Args::Optional(value)) => {
            if let Some(value) = value {
                out.push(push(value));
                out.push(Instruction::Stack(StackOp::Swap));
            }
            out.push(Instruction::Heap(HeapOp::Store));
        }
        ("storestr", Args::Str(text)) => {
            for c in text.chars().chain(std::iter::once('\0')) {
                out.push(Instruction::Stack(StackOp::Duplicate));
                out.push(push(BigInt::from(c as u32)));
                out.push(Instruction::Heap(HeapOp::Store));
                out.push(push(BigInt::from(1)));
                out.push(arithmetic(ArithmeticOp::Add));
            }
            out.push(Instruction::Stack(StackOp::Discard));
        }
        ("retrieve", Args::Optional(value)) => {
            immediate(out, value, None, Instruction::Heap(HeapOp::Retrieve))
        }

        ("label", Args::Label(name)) => out.push(flow(FlowOp::Mark(labels.define(ctx, &name)))),
        (jump, Args::Label(name)) => {
            let target = labels.use_label(ctx, &name, line);
            match jump {
                "call" => out.push(flow(FlowOp::Call(target))),
                "jump" => out.push(flow(FlowOp::Jump(target))),
                "jumpz" => out.push(flow(FlowOp::JumpZero(target))),
                "jumpn" => out.push(flow(FlowOp::JumpNegative(target))),
                // 0 - n < 0
                "jumpp" => out.extend([
                    push(BigInt::from(0)),
                    Instruction::Stack(StackOp::Swap),
                    arithmetic(ArithmeticOp::Subtract),
                    flow(FlowOp::JumpNegative(target)),
                ]),
                // n - 1 < 0
                "jumpnz" => out.extend([
                    push(BigInt::from(1)),
                    arithmetic(ArithmeticOp::Subtract),
                    flow(FlowOp::JumpNegative(target)),
                ]),
                "jumppz" => {
                    let skip = ctx.internal_label();
                    out.extend([
                        flow(FlowOp::JumpNegative(skip.clone())),
                        flow(FlowOp::Jump(target)),
                        flow(FlowOp::Mark(skip)),
                    ]);
                }
                _ => {
                    let skip = ctx.internal_label();
                    out.extend([
                        flow(FlowOp::JumpZero(skip.clone())),
                        flow(FlowOp::Jump(target)),
                        flow(FlowOp::Mark(skip)),
                    ]);
                }
            }
        }
        ("ret", _) => out.push(flow(FlowOp::Return)),
        ("exit", _) => out.push(flow(FlowOp::Exit)),
        ("debugger", _) => out.push(flow(FlowOp::Debug)),

        ("outn", _) => out.push(Instruction::IO(IoOp::OutNumber)),
        ("outc", _) => out.push(Instruction::IO(IoOp::OutCharacter)),
        ("readn", _) => out.push(Instruction::IO(IoOp::ReadNumber)),
        ("readc", _) => out.push(Instruction::IO(IoOp::ReadCharacter)),

        (_, Args::Define(name, value)) => ctx.define(&name, value),
        _ => {}
    }
}

/// The generated program before encoding
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Lowered {
    pub instructions: Vec<Instruction>,
    /// Decoration texts in order of appearance, one per output line
    pub decorations: Vec<String>,
}

fn escape_decoration(text: &str) -> String {
    text.replace('\t', "  ")
        .replace(' ', "\u{a0}")
        .replace('\n', "")
}

impl Lowered {
    /// Encodes the instructions, then prefixes the i-th line of the encoding with the i-th
    /// decoration. Decorations beyond the last line are dropped.
    pub fn render(&self) -> String {
        let mut text = String::new();
        for instr in &self.instructions {
            instr.encode_into(&mut text);
        }
        if self.decorations.is_empty() {
            return text;
        }

        let mut lines = text.split('\n').map(str::to_string).collect::<Vec<_>>();
        for (line, decoration) in lines.iter_mut().zip(&self.decorations) {
            line.insert_str(0, &escape_decoration(decoration));
        }
        lines.join("\n")
    }
}

/// Validates every line against its opcode and lowers it into target instructions
pub fn lower(ctx: &mut Context, program: &[Line]) -> Result<Lowered, CompileError> {
    let mut lowered = Lowered::default();
    let mut labels = LabelUses::default();
    for line in program {
        match line.tokens.first() {
            None => continue,
            Some(Token::Decoration(text)) => {
                lowered.decorations.push(text.clone());
                continue;
            }
            Some(Token::Word(_)) => {}
            Some(other) => return line.fail(CompileErrorKind::ExpectedOpcode(other.kind())),
        }

        let opcode = line.opcode().unwrap_or_default();
        let params = match signature(&opcode) {
            Some(params) => params,
            None => return line.fail(CompileErrorKind::UnknownOpcode(opcode)),
        };
        if requires_extensions(&opcode) && !ctx.options().extensions {
            return line.fail(CompileErrorKind::Extension(opcode));
        }
        let args = match parse_args(ctx, params, line.args()) {
            Ok(args) => args,
            Err(kind) => return line.fail(kind),
        };
        expand(ctx, &mut labels, line, &opcode, args, &mut lowered.instructions);
    }
    labels.check()?;
    debug!(
        instructions = lowered.instructions.len(),
        labels = ctx.label_names().len(),
        "generated"
    );

    Ok(lowered)
}

#[cfg(test)]
mod tests {
    use super::{escape_decoration, lower, Lowered};
    use crate::ws::instruction::{
        ArithmeticOp, FlowOp, HeapOp, Instruction, IoOp, Label, StackOp,
    };
    use crate::wsa::context::{CompileOptions, Context};
    use crate::wsa::lexer::tokenize_line;
    use crate::wsa::loader::Line;
    use crate::wsa::{CompileError, CompileErrorKind};
    use num_bigint::BigInt;
    use std::rc::Rc;

    fn lower_with(text: &str, options: CompileOptions) -> Result<Lowered, CompileError> {
        let source: Rc<str> = Rc::from("main");
        let mut program = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let tokens = tokenize_line(raw)
                .map_err(|err| CompileError::new("main", i + 1, CompileErrorKind::Lex(err)))?;
            if !tokens.is_empty() {
                program.push(Line {
                    source: Rc::clone(&source),
                    line: i + 1,
                    tokens,
                });
            }
        }
        lower(&mut Context::new(options), &program)
    }

    fn instructions(text: &str) -> Result<Vec<Instruction>, CompileError> {
        Ok(lower_with(text, CompileOptions::default())?.instructions)
    }

    fn kind(result: Result<Lowered, CompileError>) -> Option<CompileErrorKind> {
        result.err().map(|err| err.kind)
    }

    fn push(n: i64) -> Instruction {
        Instruction::Stack(StackOp::Push(BigInt::from(n)))
    }

    const ADD: Instruction = Instruction::Arithmetic(ArithmeticOp::Add);
    const SUB: Instruction = Instruction::Arithmetic(ArithmeticOp::Subtract);
    const SWAP: Instruction = Instruction::Stack(StackOp::Swap);
    const STORE: Instruction = Instruction::Heap(HeapOp::Store);

    #[test]
    fn immediates_expand_to_a_push() -> Result<(), CompileError> {
        assert_eq!(instructions("add 3\nmul 'a'")?, vec![
            push(3),
            ADD,
            push(97),
            Instruction::Arithmetic(ArithmeticOp::Multiply),
        ]);
        assert_eq!(instructions("store 5")?, vec![push(5), SWAP, STORE]);
        assert_eq!(instructions("RETRIEVE")?, vec![Instruction::Heap(HeapOp::Retrieve)]);

        Ok(())
    }

    #[test]
    fn identity_immediates_are_elided() -> Result<(), CompileError> {
        assert_eq!(instructions("add 0\nsub 0\nmul 1\ndiv 1")?, vec![]);
        assert_eq!(instructions("mod 1")?, vec![push(1), Instruction::Arithmetic(ArithmeticOp::Modulo)]);

        Ok(())
    }

    #[test]
    fn storestr_writes_a_terminated_string() -> Result<(), CompileError> {
        let dup = Instruction::Stack(StackOp::Duplicate);
        assert_eq!(instructions("storestr \"A\"")?, vec![
            dup.clone(),
            push(65),
            STORE,
            push(1),
            ADD,
            dup,
            push(0),
            STORE,
            push(1),
            ADD,
            Instruction::Stack(StackOp::Discard),
        ]);

        Ok(())
    }

    #[test]
    fn labels_are_numbered_by_first_appearance() -> Result<(), CompileError> {
        let program = instructions("call later\nlabel first\nlabel later\njump first")?;
        assert_eq!(program, vec![
            Instruction::Flow(FlowOp::Call(Label::from(0))),
            Instruction::Flow(FlowOp::Mark(Label::from(1))),
            Instruction::Flow(FlowOp::Mark(Label::from(0))),
            Instruction::Flow(FlowOp::Jump(Label::from(1))),
        ]);

        Ok(())
    }

    #[test]
    fn composite_jumps() -> Result<(), CompileError> {
        assert_eq!(instructions("label l\njumpp l")?[1..], [
            push(0),
            SWAP,
            SUB,
            Instruction::Flow(FlowOp::JumpNegative(Label::from(0))),
        ]);
        assert_eq!(instructions("label l\njumpnz l")?[1..], [
            push(1),
            SUB,
            Instruction::Flow(FlowOp::JumpNegative(Label::from(0))),
        ]);
        assert_eq!(instructions("label l\njumppz l")?[1..], [
            Instruction::Flow(FlowOp::JumpNegative(Label::from(1))),
            Instruction::Flow(FlowOp::Jump(Label::from(0))),
            Instruction::Flow(FlowOp::Mark(Label::from(1))),
        ]);
        assert_eq!(
            instructions("label l\njumppn l")?,
            instructions("label l\njumpnp l")?
        );
        assert_eq!(instructions("label l\njumpnp l")?[1], Instruction::Flow(FlowOp::JumpZero(Label::from(1))));

        Ok(())
    }

    #[test]
    fn variables_are_substituted() -> Result<(), CompileError> {
        let text = "valueinteger _n 7\nvaluestring _s \"hi\"\nvalueinteger _n 8\npush _n\ncopy _n";
        let program = instructions(text)?;
        assert_eq!(program[0], push(7));
        assert_eq!(program[1], Instruction::Stack(StackOp::Copy(BigInt::from(7))));
        assert_eq!(instructions("valuestring _s \"\"\nstorestr _s")?.len(), 6);

        assert_eq!(
            kind(lower_with("push _missing", CompileOptions::default())),
            Some(CompileErrorKind::Argument("variable _missing is not defined".to_string()))
        );
        assert!(matches!(
            kind(lower_with("valuestring _s \"x\"\npush _s", CompileOptions::default())),
            Some(CompileErrorKind::Argument(_))
        ));

        Ok(())
    }

    #[test]
    fn argument_errors_name_the_expected_shape() {
        let check = |text: &str, message: &str| {
            assert_eq!(
                kind(lower_with(text, CompileOptions::default())),
                Some(CompileErrorKind::Argument(message.to_string()))
            );
        };
        check("push", "expected an integer argument, but got nothing");
        check("push \"x\"", "expected an integer argument, but got string");
        check("copy 'a'", "expected an index argument, but got char");
        check("dup 1 2", "expected no arguments, but got integer and integer");
        check(
            "label 1 x \"y\"",
            "expected a label argument, but got integer, word, and string",
        );
    }

    #[test]
    fn opcode_errors() {
        let options = CompileOptions::default();
        assert_eq!(
            kind(lower_with("frobnicate", options)),
            Some(CompileErrorKind::UnknownOpcode("frobnicate".to_string()))
        );
        assert_eq!(
            kind(lower_with("5 push", options)),
            Some(CompileErrorKind::ExpectedOpcode("integer"))
        );
    }

    #[test]
    fn undefined_labels_name_their_first_use() {
        let err = lower_with("label here\njump here\n\ncall nowhere\ncall nowhere", CompileOptions::default());
        let err = err.err();
        assert_eq!(err.as_ref().map(|err| err.line), Some(4));
        assert_eq!(
            err.map(|err| err.kind),
            Some(CompileErrorKind::UndefinedLabel("nowhere".to_string()))
        );
    }

    #[test]
    fn many_uses_of_few_labels() {
        let mut text = String::from("label top\n");
        for _ in 0..5000 {
            text.push_str("jumpz top\njumpn later\n");
        }
        text.push_str("call missing\njump missing");
        let err = lower_with(&text, CompileOptions::default()).err();
        assert_eq!(
            err.map(|err| (err.line, err.kind)),
            Some((3, CompileErrorKind::UndefinedLabel("later".to_string())))
        );
    }

    #[test]
    fn extensions_are_gated() -> Result<(), CompileError> {
        for opcode in ["and", "or 1", "not", "debugger"] {
            assert!(matches!(
                kind(lower_with(opcode, CompileOptions::default())),
                Some(CompileErrorKind::Extension(_))
            ));
        }
        let program = lower_with("and 1\nnot\ndebugger", CompileOptions::extensions())?.instructions;
        assert_eq!(program, vec![
            push(1),
            Instruction::Arithmetic(ArithmeticOp::And),
            Instruction::Arithmetic(ArithmeticOp::Not),
            Instruction::Flow(FlowOp::Debug),
        ]);

        Ok(())
    }

    #[test]
    fn decorations_prefix_output_lines() -> Result<(), CompileError> {
        let lowered = lower_with(";#; a\tb\noutn\n;#; c", CompileOptions::default())?;
        assert_eq!(lowered.decorations, vec!["a\tb".to_string(), "c".to_string()]);
        assert_eq!(
            lowered.render(),
            format!("a{}b\t\nc \t", "\u{a0}".repeat(2))
        );
        assert_eq!(
            Lowered {
                instructions: vec![Instruction::IO(IoOp::OutCharacter)],
                decorations: vec!["x".to_string(), "y".to_string(), "z".to_string()],
            }
            .render(),
            "x\t\ny  "
        );
        assert_eq!(escape_decoration("a b\n"), "a\u{a0}b");

        Ok(())
    }
}
