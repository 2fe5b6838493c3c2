use num_bigint::{BigInt, BigUint, Sign};
use std::fmt::Display;
use thiserror::Error;

const DECORATION_MARKER: &str = ";#;";
const VARIABLE_SIGIL: char = '_';

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum LexError {
    #[error("unterminated string")]
    UnterminatedString,
    #[error("unterminated char")]
    UnterminatedChar,
    #[error("empty char")]
    EmptyChar,
    #[error("more than one char")]
    OverlongChar,
    #[error("invalid escape \\{0}")]
    InvalidEscape(char),
    #[error("empty variable name")]
    EmptyVariable,
}

/// A single token of an assembly line
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Token {
    /// An opcode or a label name
    Word(String),
    Integer(BigInt),
    Str(String),
    /// A character literal, already converted to its code point
    Char(BigInt),
    /// A variable reference, including its leading sigil
    Variable(String),
    /// The text of a `;#;` line, kept for annotating the output
    Decoration(String),
}

impl Token {
    pub fn kind(&self) -> &'static str {
        match self {
            Token::Word(_) => "word",
            Token::Integer(_) => "integer",
            Token::Str(_) => "string",
            Token::Char(_) => "char",
            Token::Variable(_) => "variable",
            Token::Decoration(_) => "decoration",
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Word(word) | Token::Variable(word) => write!(f, "{}", word),
            Token::Integer(value) | Token::Char(value) => write!(f, "{}", value),
            Token::Str(value) => write!(f, "{:?}", value),
            Token::Decoration(text) => write!(f, "{} {}", DECORATION_MARKER, text),
        }
    }
}

fn is_bare(c: char) -> bool {
    !(c.is_whitespace() || c == ';' || c == '"' || c == '\'')
}

/// Finds the closing quote of a literal starting at `rest[0]`, returning the raw contents and
/// the byte length of the whole literal
fn quoted(rest: &str, quote: char) -> Option<(&str, usize)> {
    let mut chars = rest.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                None | Some((_, '\n')) => return None,
                Some(_) => {}
            },
            '\n' => return None,
            c if c == quote => return Some((&rest[1..i], i + 1)),
            _ => {}
        }
    }

    None
}

fn unescape(literal: &str, quote: char) -> Result<Vec<char>, LexError> {
    let mut unescaped = Vec::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        let escaped = match chars.next() {
            Some(c) if c == quote || c == '\\' => c,
            Some('b') => '\u{08}',
            Some('f') => '\u{0C}',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('v') => '\u{0B}',
            Some(other) => return Err(LexError::InvalidEscape(other)),
            None => return Err(LexError::InvalidEscape('\\')),
        };
        unescaped.push(escaped);
    }

    Ok(unescaped)
}

/// Parses a bare integer: decimal with an optional sign, or unsigned `0x`/`0o`/`0b` literals.
/// Underscores may be used to group digits.
pub fn parse_integer(text: &str) -> Option<BigInt> {
    let digits = text.replace('_', "");
    let (sign, unsigned) = match digits.strip_prefix('-') {
        Some(rest) => (Sign::Minus, rest),
        None => (Sign::Plus, digits.strip_prefix('+').unwrap_or(&digits)),
    };
    let signed = unsigned.len() != digits.len();
    let prefix = unsigned.get(..2).map(|p| p.to_ascii_lowercase());
    let (radix, body) = match prefix.as_deref() {
        Some("0x") if !signed => (16, &unsigned[2..]),
        Some("0o") if !signed => (8, &unsigned[2..]),
        Some("0b") if !signed => (2, &unsigned[2..]),
        _ => (10, unsigned),
    };
    if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = BigUint::parse_bytes(body.as_bytes(), radix)?;

    Some(BigInt::from_biguint(sign, magnitude))
}

/// Splits one line of assembly into tokens. Comment lines yield nothing; a decoration line
/// yields a single [`Token::Decoration`].
pub fn tokenize_line(line: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut rest = line;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        if let Some(text) = rest.strip_prefix(DECORATION_MARKER) {
            let text = text.strip_prefix(' ').unwrap_or(text);
            tokens.push(Token::Decoration(text.to_string()));
            break;
        }
        if rest.starts_with(';') {
            break;
        }

        let consumed = if rest.starts_with('"') {
            let (literal, len) = quoted(rest, '"').ok_or(LexError::UnterminatedString)?;
            tokens.push(Token::Str(unescape(literal, '"')?.into_iter().collect()));
            len
        } else if rest.starts_with('\'') {
            let (literal, len) = quoted(rest, '\'').ok_or(LexError::UnterminatedChar)?;
            let chars = unescape(literal, '\'')?;
            match chars.as_slice() {
                [] => return Err(LexError::EmptyChar),
                [c] => tokens.push(Token::Char(BigInt::from(*c as u32))),
                _ => return Err(LexError::OverlongChar),
            }
            len
        } else if rest.starts_with(VARIABLE_SIGIL) {
            let len = rest[1..].find(|c| !is_bare(c)).unwrap_or(rest.len() - 1) + 1;
            if len == 1 {
                return Err(LexError::EmptyVariable);
            }
            tokens.push(Token::Variable(rest[..len].to_string()));
            len
        } else {
            let len = rest.find(|c| !is_bare(c)).unwrap_or(rest.len());
            let bare = &rest[..len];
            tokens.push(match parse_integer(bare) {
                Some(value) => Token::Integer(value),
                None => Token::Word(bare.to_string()),
            });
            len
        };
        rest = &rest[consumed..];
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::{parse_integer, tokenize_line, LexError, Token};
    use num_bigint::BigInt;

    fn word(w: &str) -> Token {
        Token::Word(w.to_string())
    }

    #[test]
    fn opcode_with_arguments() -> Result<(), LexError> {
        assert_eq!(
            tokenize_line("  push 1_000 ; trailing comment")?,
            vec![word("push"), Token::Integer(BigInt::from(1000))]
        );
        assert_eq!(
            tokenize_line("valueinteger _count -0x10")?,
            vec![
                word("valueinteger"),
                Token::Variable("_count".to_string()),
                word("-0x10"),
            ]
        );
        assert_eq!(
            tokenize_line("jumpz loop_end")?,
            vec![word("jumpz"), word("loop_end")]
        );

        Ok(())
    }

    #[test]
    fn comments_and_decorations() -> Result<(), LexError> {
        assert_eq!(tokenize_line("; just a comment")?, vec![]);
        assert_eq!(tokenize_line("   ")?, vec![]);
        assert_eq!(
            tokenize_line(";#; Hello\tWorld")?,
            vec![Token::Decoration("Hello\tWorld".to_string())]
        );
        assert_eq!(
            tokenize_line(";#;tight")?,
            vec![Token::Decoration("tight".to_string())]
        );

        Ok(())
    }

    #[test]
    fn strings_and_chars() -> Result<(), LexError> {
        assert_eq!(
            tokenize_line(r#"storestr "a \"b\"\n;c""#)?,
            vec![word("storestr"), Token::Str("a \"b\"\n;c".to_string())]
        );
        assert_eq!(
            tokenize_line(r"push '\''")?,
            vec![word("push"), Token::Char(BigInt::from(39))]
        );
        assert_eq!(
            tokenize_line("push 'é'")?,
            vec![word("push"), Token::Char(BigInt::from(233))]
        );
        assert_eq!(
            tokenize_line(r"push '\v'")?,
            vec![word("push"), Token::Char(BigInt::from(11))]
        );

        Ok(())
    }

    #[test]
    fn malformed_literals() {
        assert_eq!(tokenize_line("storestr \"open"), Err(LexError::UnterminatedString));
        assert_eq!(tokenize_line("push 'a"), Err(LexError::UnterminatedChar));
        assert_eq!(tokenize_line("push ''"), Err(LexError::EmptyChar));
        assert_eq!(tokenize_line("push 'ab'"), Err(LexError::OverlongChar));
        assert_eq!(tokenize_line(r#"storestr "\q""#), Err(LexError::InvalidEscape('q')));
        assert_eq!(tokenize_line(r#"push '\"'"#), Err(LexError::InvalidEscape('"')));
        assert_eq!(tokenize_line("push _ 1"), Err(LexError::EmptyVariable));
    }

    #[test]
    fn integers() {
        assert_eq!(parse_integer("42"), Some(BigInt::from(42)));
        assert_eq!(parse_integer("-42"), Some(BigInt::from(-42)));
        assert_eq!(parse_integer("+7"), Some(BigInt::from(7)));
        assert_eq!(parse_integer("0xff"), Some(BigInt::from(255)));
        assert_eq!(parse_integer("0b1_0_1"), Some(BigInt::from(5)));
        assert_eq!(
            parse_integer("123456789012345678901234567890"),
            "123456789012345678901234567890".parse::<BigInt>().ok()
        );
        assert_eq!(parse_integer("12ab"), None);
        assert_eq!(parse_integer("-"), None);
        assert_eq!(parse_integer("0x"), None);
    }
}
