// SPDX-License-Identifier: MIT

#![cfg(test)]

use anyhow::Result;
use policyrus::{Lexer, Source, TokenKind};

fn tokens(text: &str) -> Result<Vec<(TokenKind, String)>> {
    let source = Source::from_contents("<test>".to_string(), text.to_string())?;
    let mut lexer = Lexer::new(&source);
    let mut out = vec![];
    loop {
        let tok = lexer.next_token()?;
        let done = tok.0 == TokenKind::Eof;
        out.push((tok.0, tok.1.text().to_string()));
        if done {
            break;
        }
    }
    Ok(out)
}

fn texts(text: &str) -> Result<Vec<String>> {
    Ok(tokens(text)?
        .into_iter()
        .map(|(_, t)| t)
        .collect())
}

fn lex_error(text: &str) -> policyrus::ParseError {
    let source = Source::from_contents("<test>".to_string(), text.to_string())
        .expect("source construction");
    let mut lexer = Lexer::new(&source);
    loop {
        match lexer.next_token() {
            Ok(tok) if tok.0 == TokenKind::Eof => panic!("expected a lex error for {text:?}"),
            Ok(_) => (),
            Err(err) => return err,
        }
    }
}

#[test]
fn idents_symbols_and_calls() -> Result<()> {
    let toks = tokens("user.is_admin() or x0 == 42")?;
    let expected = [
        (TokenKind::Ident, "user"),
        (TokenKind::Symbol, "."),
        (TokenKind::Ident, "is_admin"),
        (TokenKind::Symbol, "("),
        (TokenKind::Symbol, ")"),
        (TokenKind::Ident, "or"),
        (TokenKind::Ident, "x0"),
        (TokenKind::Symbol, "=="),
        (TokenKind::Number, "42"),
        (TokenKind::Eof, ""),
    ];
    assert_eq!(toks.len(), expected.len());
    for ((kind, text), (ekind, etext)) in toks.iter().zip(expected) {
        assert_eq!(*kind, ekind);
        assert_eq!(text, etext);
    }
    Ok(())
}

#[test]
fn number_forms() -> Result<()> {
    for t in ["0x1F", "0o17", "0b101", "3.5", ".5", "5.", "1e3", "1.5e-2", "2"] {
        let toks = tokens(t)?;
        assert_eq!(toks[0].0, TokenKind::Number, "{t}");
        assert_eq!(toks[0].1, t, "{t}");
        assert_eq!(toks.len(), 2, "{t}");
    }
    Ok(())
}

#[test]
fn two_character_operators() -> Result<()> {
    assert_eq!(
        texts("** // << >> <= >= == !=")?,
        ["**", "//", "<<", ">>", "<=", ">=", "==", "!=", ""]
    );
    Ok(())
}

#[test]
fn adjacent_braces_are_two_tokens() -> Result<()> {
    assert_eq!(texts("{{")?, ["{", "{", ""]);
    assert_eq!(texts("}}")?, ["}", "}", ""]);
    Ok(())
}

#[test]
fn strings_in_both_quote_styles() -> Result<()> {
    let toks = tokens(r#""double" 'single'"#)?;
    assert_eq!(toks[0], (TokenKind::String, "double".to_string()));
    assert_eq!(toks[1], (TokenKind::String, "single".to_string()));
    Ok(())
}

#[test]
fn string_span_keeps_raw_escapes() -> Result<()> {
    let toks = tokens(r#""a\nb""#)?;
    // The span covers the raw text; decoding happens in the parser.
    assert_eq!(toks[0], (TokenKind::String, "a\\nb".to_string()));
    Ok(())
}

#[test]
fn comments_and_whitespace_are_skipped() -> Result<()> {
    assert_eq!(texts("1 # ignore me\n\t+ 2")?, ["1", "+", "2", ""]);
    Ok(())
}

#[test]
fn line_and_column_tracking() -> Result<()> {
    let source = Source::from_contents("<test>".to_string(), "foo\n  bar".to_string())?;
    let mut lexer = Lexer::new(&source);
    let foo = lexer.next_token()?;
    assert_eq!((foo.1.line, foo.1.col), (1, 1));
    let bar = lexer.next_token()?;
    assert_eq!((bar.1.line, bar.1.col), (2, 3));
    Ok(())
}

#[test]
fn unterminated_string() {
    let err = lex_error("'abc");
    assert!(err.message.contains("unterminated string"), "{}", err.message);
    assert_eq!((err.line, err.col), (1, 1));
}

#[test]
fn invalid_escape_sequence() {
    let err = lex_error(r#""a\qb""#);
    assert!(err.message.contains("invalid escape"), "{}", err.message);
}

#[test]
fn number_running_into_ident() {
    let err = lex_error("1abc");
    assert!(err.message.contains("invalid number"), "{}", err.message);
}

#[test]
fn radix_literal_without_digits() {
    let err = lex_error("0x");
    assert!(err.message.contains("no digits"), "{}", err.message);
}

#[test]
fn bare_bang_is_rejected() {
    let err = lex_error("a ! b");
    assert!(err.message.contains("expecting `!=`"), "{}", err.message);
    assert_eq!((err.line, err.col), (1, 3));
}

#[test]
fn invalid_character() {
    let err = lex_error("@");
    assert!(err.message.contains("invalid character"), "{}", err.message);
    assert_eq!((err.line, err.col), (1, 1));
}
