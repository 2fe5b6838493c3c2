use crate::wsa::context::Context;
use crate::wsa::lexer::{tokenize_line, Token};
use crate::wsa::libs;
use crate::wsa::resolve::SourceResolver;
use crate::wsa::{describe_args, CompileError, CompileErrorKind};
use futures::future::{FutureExt, LocalBoxFuture};
use std::rc::Rc;
use tracing::debug;

/// A tokenized source line that is not empty, a comment or an include
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub source: Rc<str>,
    pub line: usize,
    pub tokens: Vec<Token>,
}

impl Line {
    /// The opcode in lower case, if the line starts with a word
    pub fn opcode(&self) -> Option<String> {
        match self.tokens.first() {
            Some(Token::Word(word)) => Some(word.to_lowercase()),
            _ => None,
        }
    }

    pub fn args(&self) -> &[Token] {
        self.tokens.get(1..).unwrap_or(&[])
    }

    pub fn fail<T>(&self, kind: CompileErrorKind) -> Result<T, CompileError> {
        Err(CompileError::new(&self.source, self.line, kind))
    }
}

/// Tokenizes `text` and splices every included source in place of its `include` line
pub async fn load(
    ctx: &mut Context,
    resolver: &mut dyn SourceResolver,
    text: &str,
    source: &str,
) -> Result<Vec<Line>, CompileError> {
    load_source(ctx, resolver, text, Rc::from(source)).await
}

fn load_source<'a>(
    ctx: &'a mut Context,
    resolver: &'a mut dyn SourceResolver,
    text: &'a str,
    source: Rc<str>,
) -> LocalBoxFuture<'a, Result<Vec<Line>, CompileError>> {
    async move {
        let mut program = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let tokens = tokenize_line(raw)
                .map_err(|err| CompileError::new(&source, line, CompileErrorKind::Lex(err)))?;

            match tokens.first() {
                None => {}
                Some(Token::Word(word)) if word.eq_ignore_ascii_case("include") => {
                    let name = match &tokens[1..] {
                        [Token::Word(name)] | [Token::Str(name)] | [Token::Variable(name)] => name,
                        args => {
                            let kind = CompileErrorKind::Include {
                                name: args
                                    .iter()
                                    .map(Token::to_string)
                                    .collect::<Vec<_>>()
                                    .join(" "),
                                reason: format!(
                                    "expected filename argument, but got {}",
                                    describe_args(args)
                                ),
                            };
                            return Err(CompileError::new(&source, line, kind));
                        }
                    };
                    let included = include(ctx, &mut *resolver, name, &source, line).await?;
                    program.extend(included);
                }
                Some(_) => program.push(Line {
                    source: Rc::clone(&source),
                    line,
                    tokens,
                }),
            }
        }
        debug!(source = %source, lines = program.len(), "loaded source");

        Ok(program)
    }
    .boxed_local()
}

async fn include(
    ctx: &mut Context,
    resolver: &mut dyn SourceResolver,
    name: &str,
    from: &str,
    line: usize,
) -> Result<Vec<Line>, CompileError> {
    if !ctx.mark_included(name) {
        debug!(name, "skipping repeated include");
        return Ok(Vec::new());
    }

    let text = match libs::builtin(name, ctx.options().extensions) {
        Some(text) => text.to_string(),
        None => resolver.resolve(name).await.map_err(|err| {
            let kind = CompileErrorKind::Include {
                name: name.to_string(),
                reason: err.to_string(),
            };
            CompileError::new(from, line, kind)
        })?,
    };
    debug!(name, bytes = text.len(), "resolved include");

    load_source(ctx, resolver, &text, Rc::from(name)).await
}
