// SPDX-License-Identifier: MIT

use crate::errors::ParseError;

use core::cmp;
use core::fmt::{self, Debug, Formatter};
use core::iter::Peekable;
use core::str::CharIndices;
use std::sync::Arc;

#[derive(Debug)]
struct SourceInternal {
    origin: String,
    contents: String,
    lines: Vec<(u32, u32)>,
}

/// A piece of rule text together with the name it was registered under.
///
/// Cheap to clone; spans and parse errors hold on to it so diagnostics can
/// always render the offending line.
#[derive(Clone)]
pub struct Source {
    src: Arc<SourceInternal>,
}

impl cmp::PartialEq for Source {
    fn eq(&self, other: &Source) -> bool {
        Arc::ptr_eq(&self.src, &other.src)
    }
}

impl cmp::Eq for Source {}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        self.src.origin.fmt(f)
    }
}

impl Source {
    pub fn from_contents(origin: String, contents: String) -> Result<Source, ParseError> {
        // Positions are u32; leave headroom for rows/cols starting at 1 and EOF.
        let max_size = u32::MAX as usize - 2;
        if contents.len() > max_size {
            let placeholder = Source {
                src: Arc::new(SourceInternal {
                    origin: origin.clone(),
                    contents: String::default(),
                    lines: vec![(0, 0)],
                }),
            };
            return Err(ParseError::new(
                &placeholder,
                1,
                1,
                format!("{origin} exceeds maximum allowed rule size {max_size}"),
            ));
        }
        let mut lines = vec![];
        let mut start = 0u32;
        for (i, ch) in contents.char_indices() {
            if ch == '\n' {
                lines.push((start, i as u32));
                start = i as u32 + 1;
            }
        }
        lines.push((start, contents.len() as u32));
        Ok(Self {
            src: Arc::new(SourceInternal {
                origin,
                contents,
                lines,
            }),
        })
    }

    pub fn origin(&self) -> &str {
        &self.src.origin
    }

    pub fn contents(&self) -> &str {
        &self.src.contents
    }

    fn line(&self, idx: u32) -> &str {
        let idx = idx as usize;
        if idx < self.src.lines.len() {
            let (start, end) = self.src.lines[idx];
            &self.src.contents[start as usize..end as usize]
        } else {
            ""
        }
    }

    pub fn message(&self, line: u32, col: u32, kind: &str, msg: &str) -> String {
        if line as usize > self.src.lines.len() {
            return format!("{}: invalid line {} specified", self.src.origin, line);
        }

        let line_str = format!("{line}");
        let line_num_width = line_str.len() + 1;
        let col_spaces = col.saturating_sub(1) as usize;

        format!(
            "\n--> {}:{}:{}\n{:<line_num_width$}|\n\
	{:<line_num_width$}| {}\n\
	{:<line_num_width$}| {:<col_spaces$}^\n\
	{}: {}",
            self.src.origin,
            line,
            col,
            "",
            line,
            self.line(line.saturating_sub(1)),
            "",
            "",
            kind,
            msg
        )
    }

    pub(crate) fn error(&self, line: u32, col: u32, msg: &str) -> ParseError {
        ParseError::new(self, line, col, msg)
    }
}

/// Location of a token (or an AST node) in the rule text.
#[derive(Clone)]
pub struct Span {
    pub source: Source,
    pub line: u32,
    pub col: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn text(&self) -> &str {
        &self.source.contents()[self.start as usize..self.end as usize]
    }

    pub fn message(&self, kind: &str, msg: &str) -> String {
        self.source.message(self.line, self.col, kind, msg)
    }

    pub(crate) fn error(&self, msg: &str) -> ParseError {
        self.source.error(self.line, self.col, msg)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let t = self.text().escape_debug().to_string();
        let max = 32;
        let (txt, trailer) = if t.len() > max {
            (&t[0..max], "...")
        } else {
            (t.as_str(), "")
        };

        f.write_fmt(format_args!(
            "{}:{}:{}:{}, \"{}{}\"",
            self.line, self.col, self.start, self.end, txt, trailer
        ))
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind {
    Symbol,
    String,
    Number,
    Ident,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token(pub TokenKind, pub Span);

#[derive(Clone)]
pub struct Lexer<'source> {
    source: Source,
    iter: Peekable<CharIndices<'source>>,
    line: u32,
    col: u32,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source Source) -> Self {
        Self {
            source: source.clone(),
            iter: source.contents().char_indices().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn peek(&mut self) -> (usize, char) {
        match self.iter.peek() {
            Some((index, chr)) => (*index, *chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn peekahead(&mut self, n: usize) -> (usize, char) {
        match self.iter.clone().nth(n) {
            Some((index, chr)) => (index, chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn span_from(&mut self, line: u32, col: u32, start: usize) -> Span {
        Span {
            source: self.source.clone(),
            line,
            col,
            start: start as u32,
            end: self.peek().0 as u32,
        }
    }

    fn read_ident(&mut self) -> Result<Token, ParseError> {
        let start = self.peek().0;
        let col = self.col;
        loop {
            let ch = self.peek().1;
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.iter.next();
            } else {
                break;
            }
        }
        let end = self.peek().0;
        self.col += (end - start) as u32;
        let span = self.span_from(self.line, col, start);
        Ok(Token(TokenKind::Ident, span))
    }

    fn read_digits(&mut self, pred: fn(char) -> bool) -> usize {
        let mut count = 0;
        while pred(self.peek().1) {
            self.iter.next();
            count += 1;
        }
        count
    }

    fn read_number(&mut self) -> Result<Token, ParseError> {
        let (start, chr) = self.peek();
        let line = self.line;
        let col = self.col;
        self.iter.next();

        if chr == '0' && matches!(self.peek().1, 'x' | 'X' | 'o' | 'O' | 'b' | 'B') {
            // Radix-prefixed integer literal.
            let (radix_pred, what): (fn(char) -> bool, &str) = match self.peek().1 {
                'x' | 'X' => (|c| c.is_ascii_hexdigit(), "hexadecimal"),
                'o' | 'O' => (|c| ('0'..='7').contains(&c), "octal"),
                _ => (|c| c == '0' || c == '1', "binary"),
            };
            self.iter.next();
            if self.read_digits(radix_pred) == 0 {
                return Err(self
                    .source
                    .error(line, col, &format!("{what} literal has no digits")));
            }
        } else {
            // Decimal integer or float. A leading '.' is accepted when
            // followed by a digit ('.5'); the caller guarantees that.
            if chr != '.' {
                self.read_digits(|c| c.is_ascii_digit());
                if self.peek().1 == '.' {
                    self.iter.next();
                }
            }
            self.read_digits(|c| c.is_ascii_digit());

            if matches!(self.peek().1, 'e' | 'E') {
                self.iter.next();
                if matches!(self.peek().1, '+' | '-') {
                    self.iter.next();
                }
                if self.read_digits(|c| c.is_ascii_digit()) == 0 {
                    return Err(self.source.error(line, col, "exponent has no digits"));
                }
            }
        }

        let end = self.peek().0;
        self.col += (end - start) as u32;

        // A valid number cannot run straight into an identifier.
        let ch = self.peek().1;
        if ch == '_' || ch.is_ascii_alphanumeric() {
            return Err(self.source.error(self.line, self.col, "invalid number"));
        }

        let span = self.span_from(line, col, start);
        Ok(Token(TokenKind::Number, span))
    }

    fn read_string(&mut self) -> Result<Token, ParseError> {
        let (line, col) = (self.line, self.col);
        let quote = self.peek().1;
        self.iter.next();
        self.col += 1;
        let (start, _) = self.peek();
        loop {
            let (offset, ch) = self.peek();
            match ch {
                c if c == quote => break,
                '\x00' | '\n' => {
                    return Err(self.source.error(line, col, "unterminated string"));
                }
                '\\' => {
                    self.iter.next();
                    let (_, esc) = self.peek();
                    self.iter.next();
                    match esc {
                        '\\' | '\'' | '"' | 'n' | 'r' | 't' | '0' | 'b' | 'f' | 'v' => (),
                        'x' => {
                            for _ in 0..2 {
                                let ch = self.peek().1;
                                if !ch.is_ascii_hexdigit() {
                                    let col = self.col + (offset - start) as u32 + 1;
                                    return Err(self.source.error(
                                        line,
                                        col,
                                        "invalid hex escape sequence",
                                    ));
                                }
                                self.iter.next();
                            }
                        }
                        'u' => {
                            for _ in 0..4 {
                                let ch = self.peek().1;
                                if !ch.is_ascii_hexdigit() {
                                    let col = self.col + (offset - start) as u32 + 1;
                                    return Err(self.source.error(
                                        line,
                                        col,
                                        "invalid unicode escape sequence",
                                    ));
                                }
                                self.iter.next();
                            }
                        }
                        _ => {
                            let col = self.col + (offset - start) as u32 + 1;
                            return Err(self.source.error(line, col, "invalid escape sequence"));
                        }
                    }
                }
                _ => {
                    self.iter.next();
                }
            }
        }

        self.iter.next();
        let end = self.peek().0;
        self.col += (end - start) as u32;

        Ok(Token(
            TokenKind::String,
            Span {
                source: self.source.clone(),
                line,
                col: col + 1,
                start: start as u32,
                end: end as u32 - 1,
            },
        ))
    }

    fn skip_ws(&mut self) {
        'outer: loop {
            match self.peek().1 {
                ' ' => self.col += 1,
                '\t' => self.col += 4,
                '\r' => (),
                '\n' => {
                    self.col = 1;
                    self.line += 1;
                }
                '#' => {
                    self.iter.next();
                    loop {
                        match self.peek().1 {
                            '\n' | '\x00' => continue 'outer,
                            _ => self.iter.next(),
                        };
                    }
                }
                _ => break,
            }
            self.iter.next();
        }
    }

    fn symbol(&mut self, line: u32, col: u32, start: usize, chars: u32) -> Token {
        for _ in 0..chars {
            self.iter.next();
        }
        self.col += chars;
        let span = self.span_from(line, col, start);
        Token(TokenKind::Symbol, span)
    }

    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_ws();

        let (start, chr) = self.peek();
        let (line, col) = (self.line, self.col);

        match chr {
            '\x00' => Ok(Token(
                TokenKind::Eof,
                Span {
                    source: self.source.clone(),
                    line,
                    col,
                    start: start as u32,
                    end: start as u32,
                },
            )),
            '"' | '\'' => self.read_string(),
            '.' if self.peekahead(1).1.is_ascii_digit() => self.read_number(),
            _ if chr.is_ascii_digit() => self.read_number(),
            _ if chr.is_ascii_alphabetic() || chr == '_' => self.read_ident(),
            // Two-character operators; maximal munch.
            '*' if self.peekahead(1).1 == '*' => Ok(self.symbol(line, col, start, 2)),
            '/' if self.peekahead(1).1 == '/' => Ok(self.symbol(line, col, start, 2)),
            '<' if matches!(self.peekahead(1).1, '<' | '=') => Ok(self.symbol(line, col, start, 2)),
            '>' if matches!(self.peekahead(1).1, '>' | '=') => Ok(self.symbol(line, col, start, 2)),
            '=' if self.peekahead(1).1 == '=' => Ok(self.symbol(line, col, start, 2)),
            '!' if self.peekahead(1).1 == '=' => Ok(self.symbol(line, col, start, 2)),
            '!' => Err(self.source.error(line, col, "expecting `!=`")),
            '+' | '-' | '*' | '/' | '%' | '~' | '&' | '|' | '^' | '<' | '>' | '=' | '(' | ')'
            | '[' | ']' | '{' | '}' | ',' | '.' => Ok(self.symbol(line, col, start, 1)),
            _ => Err(self.source.error(line, col, "invalid character")),
        }
    }
}

/// Decode the escape sequences of a quoted string literal.
///
/// The lexer has already validated the escapes; malformed input still
/// reports a [`ParseError`] rather than panicking.
pub(crate) fn unescape(span: &Span) -> Result<String, ParseError> {
    let raw = span.text();
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let invalid = || span.error("invalid escape sequence");
        let esc = chars.next().ok_or_else(invalid)?;
        match esc {
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            'x' | 'u' => {
                let digits = if esc == 'x' { 2 } else { 4 };
                let mut code = 0u32;
                for _ in 0..digits {
                    let d = chars.next().and_then(|c| c.to_digit(16));
                    code = code * 16 + d.ok_or_else(invalid)?;
                }
                out.push(char::from_u32(code).ok_or_else(invalid)?);
            }
            _ => return Err(invalid()),
        }
    }
    Ok(out)
}
