//! Pieces of the `eval` command that do not need a live session: source
//! preparation (`!<file` input, `>!`/`>>!` output redirection), result
//! composition and redirect output.

use std::fs::OpenOptions;
use std::io::{self, Write};

use thiserror::Error;

/// `expr >! target` or `expr >>! target` on the last input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Text before the redirect operator, trimmed.
    pub expression: String,
    pub target: String,
    pub append: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("EOF in multi-line string (line {line})")]
    UnterminatedString { line: usize },
    #[error("EOF in multi-line statement (line {line})")]
    UnclosedStatement { line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Last {
    None,
    /// Redirect operator candidate (`>` or `>>`) starting at this byte offset.
    Shift { start: usize, append: bool },
    Other,
}

const OPERATORS_3: &[&str] = &["**=", "//=", ">>=", "<<=", "..."];
const OPERATORS_2: &[&str] = &[
    "**", "//", ">>", "<<", "<=", ">=", "==", "!=", "->", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "@=", ":=",
];
const OPERATORS_1: &str = "+-*/%@&|^~<>()[]{},:.;=";

const STRING_PREFIXES: &[&str] = &["r", "u", "b", "f", "br", "rb", "fr", "rf"];

fn is_identifier_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_identifier_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

struct Scanner<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    line_start: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(offset)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.line_start = self.pos;
        }
        Some(c)
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn current_line(&self) -> &'a str {
        let rest = &self.source[self.line_start..];
        rest.split('\n').next().unwrap_or(rest)
    }

    /// Consumes a string literal whose opening quote is at the cursor.
    /// Unterminated single-quoted strings only consume their quote.
    fn string(&mut self, quote: char) -> Result<(), TokenizeError> {
        let triple: String = std::iter::repeat(quote).take(3).collect();
        if self.rest().starts_with(&triple) {
            let start_line = self.line;
            for _ in 0..3 {
                self.bump();
            }
            loop {
                if self.rest().starts_with(&triple) {
                    for _ in 0..3 {
                        self.bump();
                    }
                    return Ok(());
                }
                match self.bump() {
                    Some('\\') => {
                        self.bump();
                    }
                    Some(_) => {}
                    None => return Err(TokenizeError::UnterminatedString { line: start_line }),
                }
            }
        }

        let checkpoint = (self.pos, self.line, self.line_start);
        self.bump();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.bump();
                    return Ok(());
                }
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some('\n') | None => {
                    // Error token: only the quote itself.
                    (self.pos, self.line, self.line_start) = checkpoint;
                    self.bump();
                    return Ok(());
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }
}

/// Scans Python-like source for an output redirect on its last line.
///
/// A redirect is a `!` that the tokenizer cannot place (an error token)
/// directly after a `>` or `>>` operator on the same line. `a >> b` and
/// `a != b` are not redirects, nor is `>!` inside a string or comment.
pub fn tokenize_redirect(source: &str) -> Result<Option<Redirect>, TokenizeError> {
    let last_line_start = source.rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let mut scanner = Scanner {
        source,
        pos: 0,
        line: 1,
        line_start: 0,
    };
    let mut last = Last::None;
    let mut depth = 0usize;
    let mut found = None;

    while let Some(c) = scanner.peek() {
        match c {
            '\n' => {
                scanner.bump();
                last = Last::Other;
            }
            ' ' | '\t' | '\r' | '\x0c' => {
                scanner.bump();
            }
            '#' => {
                while !matches!(scanner.peek(), Some('\n') | None) {
                    scanner.bump();
                }
                last = Last::Other;
            }
            '\\' => {
                scanner.bump();
                if scanner.peek() == Some('\n') {
                    scanner.bump();
                    if scanner.peek().is_none() {
                        return Err(TokenizeError::UnclosedStatement { line: scanner.line });
                    }
                } else {
                    last = Last::Other;
                }
            }
            '\'' | '"' => {
                scanner.string(c)?;
                last = Last::Other;
            }
            c if is_identifier_start(c) => {
                let start = scanner.pos;
                while scanner.peek().is_some_and(is_identifier_char) {
                    scanner.bump();
                }
                let word = &source[start..scanner.pos];
                if let Some(quote @ ('\'' | '"')) = scanner.peek() {
                    if STRING_PREFIXES.contains(&word.to_ascii_lowercase().as_str()) {
                        scanner.string(quote)?;
                    }
                }
                last = Last::Other;
            }
            c if c.is_ascii_digit()
                || (c == '.' && scanner.peek_at(1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let mut prev = c;
                scanner.bump();
                while let Some(n) = scanner.peek() {
                    let exponent_sign = (n == '+' || n == '-') && matches!(prev, 'e' | 'E');
                    if !(n.is_ascii_alphanumeric() || n == '_' || n == '.' || exponent_sign) {
                        break;
                    }
                    prev = n;
                    scanner.bump();
                }
                last = Last::Other;
            }
            '!' if !scanner.rest().starts_with("!=") => {
                scanner.bump();
                if let Last::Shift { start, append } = last {
                    let line_start = scanner.line_start;
                    if start >= line_start && line_start == last_line_start && found.is_none() {
                        let line = scanner.current_line();
                        let expression = line[..start - line_start].trim().to_string();
                        let target = line[scanner.pos - line_start..].trim().to_string();
                        found = Some(Redirect {
                            expression,
                            target,
                            append,
                        });
                    }
                }
                last = Last::Other;
            }
            _ => {
                let rest = scanner.rest();
                let op = OPERATORS_3
                    .iter()
                    .chain(OPERATORS_2.iter())
                    .find(|op| rest.starts_with(**op))
                    .map(|op| op.len())
                    .or_else(|| OPERATORS_1.contains(c).then_some(c.len_utf8()));
                let start = scanner.pos;
                let len = op.unwrap_or(c.len_utf8());
                let text = &source[start..start + len];
                for _ in text.chars() {
                    scanner.bump();
                }
                match text {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
                last = match (op, text) {
                    (Some(_), ">") => Last::Shift { start, append: false },
                    (Some(_), ">>") => Last::Shift { start, append: true },
                    _ => Last::Other,
                };
            }
        }
    }

    if depth > 0 {
        return Err(TokenizeError::UnclosedStatement { line: scanner.line });
    }
    Ok(found)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalInputError {
    #[error("Unable to read from file {path}")]
    Unreadable { path: String, reason: String },
}

/// Source ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSource {
    pub code: String,
    pub redirect: Option<Redirect>,
}

/// Resolves `!<file` input and strips a trailing redirect from the last line.
pub fn prepare_source(payload: &str) -> Result<PreparedSource, EvalInputError> {
    let mut code = payload.trim().to_string();
    if let Some(path) = code.strip_prefix("!<") {
        let path = path.trim().to_string();
        code = std::fs::read_to_string(&path).map_err(|err| EvalInputError::Unreadable {
            reason: err.to_string(),
            path,
        })?;
    }

    let mut lines: Vec<String> = code.split('\n').map(str::to_owned).collect();
    let last_line = lines.last().cloned().unwrap_or_default();
    if !last_line.contains(">!") {
        return Ok(PreparedSource {
            code,
            redirect: None,
        });
    }

    let redirect = match tokenize_redirect(&code) {
        Ok(redirect) => redirect,
        Err(err) => {
            tracing::debug!(target: "wdb.ui", error = %err, "redirect scan failed; evaluating as is");
            None
        }
    };
    let Some(redirect) = redirect.filter(|r| !r.expression.is_empty() && !r.target.is_empty())
    else {
        return Ok(PreparedSource {
            code,
            redirect: None,
        });
    };

    let indent = last_line.len() - last_line.trim_start().len();
    if let Some(last) = lines.last_mut() {
        *last = format!("{}{}", " ".repeat(indent), redirect.expression);
    }
    Ok(PreparedSource {
        code: lines.join("\n"),
        redirect: Some(redirect),
    })
}

/// Picks the `Print` result from escaped captured output `rv` and the
/// displayed value text `hooked`.
pub fn compose_result(rv: &str, hooked: &str, has_last_value: bool) -> String {
    if (!rv.is_empty() && !has_last_value) || hooked.is_empty() {
        rv.to_string()
    } else if rv.is_empty() {
        hooked.to_string()
    } else {
        format!("{hooked}\n{rv}")
    }
}

/// Writes captured output to the redirect target.
pub fn write_redirect(redirect: &Redirect, out: &[String], err: &[String]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .append(redirect.append)
        .truncate(!redirect.append)
        .open(&redirect.target)?;
    let text = format!("{}{}\n", out.join("\n"), err.join("\n"));
    file.write_all(text.as_bytes())?;
    file.flush()
}
