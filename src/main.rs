use clap::{App, Arg, ArgMatches};
use futures::executor::block_on;
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use wsa::source::read_source;
use wsa::ws::instruction::{annotate, decode_readable};
use wsa::ws::io::{CallbackOutput, FnInput, InputSource, Io, StaticInput};
use wsa::ws::vm::{self, Interrupt, MachineState};
use wsa::wsa::{compile_and_exit, CompileOptions, FileResolver};

fn args() -> ArgMatches {
    let extensions = Arg::new("extensions")
        .short('e')
        .long("extensions")
        .takes_value(false)
        .required(false)
        .help("enables the bitwise instructions and the debugger marker");

    App::new("wsa")
        .about("an assembler and virtual machine for whitespace")
        .version("0.1.0")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .takes_value(false)
                .required(false)
                .help("logs every compilation stage to stderr"),
        )
        .subcommand(
            App::new("compile")
                .about("assembles a WSA source file into whitespace")
                .arg(
                    Arg::new("main")
                        .index(1)
                        .required(true)
                        .help("the WSA source file to compile"),
                )
                .arg(
                    Arg::new("output")
                        .index(2)
                        .required(true)
                        .help("where to write the whitespace program"),
                )
                .arg(extensions.clone())
                .arg(
                    Arg::new("annotate")
                        .short('a')
                        .long("annotate")
                        .takes_value(false)
                        .required(false)
                        .help("prefixes every whitespace character with a visible S, T or L"),
                ),
        )
        .subcommand(
            App::new("run")
                .about("executes a whitespace program")
                .arg(
                    Arg::new("file")
                        .index(1)
                        .required(true)
                        .help("the program to run"),
                )
                .arg(
                    Arg::new("asm")
                        .short('s')
                        .long("asm")
                        .takes_value(false)
                        .required(false)
                        .help("treats the file as WSA source and compiles it first"),
                )
                .arg(extensions)
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .takes_value(true)
                        .required(false)
                        .help("program input; stdin is read line by line if omitted"),
                ),
        )
        .get_matches()
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("wsa=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wsa=warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn options(args: &ArgMatches) -> CompileOptions {
    CompileOptions {
        extensions: args.is_present("extensions"),
    }
}

fn assemble(path: &Path, options: CompileOptions) -> Result<String, Box<dyn Error>> {
    let source = read_source(path)?;
    let root = path.parent().unwrap_or_else(|| Path::new("."));
    let mut resolver = FileResolver::new(root);
    let start = Instant::now();
    let text = block_on(compile_and_exit(&source, &mut resolver, options))?;
    info!(
        bytes = text.len(),
        micros = start.elapsed().as_micros() as u64,
        "compiled {}",
        path.display()
    );

    Ok(text)
}

fn compile(args: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let main = Path::new(args.value_of("main").unwrap_or_default());
    let output = Path::new(args.value_of("output").unwrap_or_default());
    let mut text = assemble(main, options(args))?;
    if args.is_present("annotate") {
        text = annotate(&text);
    }
    std::fs::write(output, text)?;

    Ok(())
}

fn execute<S: InputSource>(text: &str, source: S) -> Result<(), Box<dyn Error>> {
    let program = wsa::load_program(text)?;
    let stdout = io::stdout();
    let mut io = Io::new(
        source,
        CallbackOutput(|out: &str| {
            let mut handle = stdout.lock();
            let _ = handle.write_all(out.as_bytes());
            let _ = handle.flush();
        }),
    );
    let mut state = MachineState::new();
    let start = Instant::now();
    block_on(vm::execute(&program, &mut state, &mut io, &Interrupt::new()))?;
    info!(
        steps = state.steps_taken,
        millis = start.elapsed().as_millis() as u64,
        "program halted"
    );

    Ok(())
}

fn run(args: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let file = Path::new(args.value_of("file").unwrap_or_default());
    let text = if args.is_present("asm") {
        assemble(file, options(args))?
    } else {
        let raw = read_source(file)?;
        if raw.contains("[LF]") {
            decode_readable(&raw)
        } else {
            raw
        }
    };

    match args.value_of("input") {
        Some(input) => execute(&text, StaticInput::new(input)),
        None => execute(
            &text,
            FnInput(|| {
                let mut line = String::new();
                match io::stdin().lock().read_line(&mut line) {
                    Ok(_) => line,
                    Err(_) => String::new(),
                }
            }),
        ),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = args();
    let (command, sub) = match args.subcommand() {
        Some(subcommand) => subcommand,
        None => return Ok(()),
    };
    init_logging(args.is_present("verbose") || sub.is_present("verbose"));

    match command {
        "compile" => compile(sub),
        _ => run(sub),
    }
}
