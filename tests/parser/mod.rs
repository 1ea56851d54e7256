// SPDX-License-Identifier: MIT

#![cfg(test)]

use anyhow::Result;
use policyrus::{Compiler, Instruction, ParseError, Source, Value};

fn compile(text: &str) -> Result<Vec<Instruction>, ParseError> {
    let source = Source::from_contents("<test>".to_string(), text.to_string())?;
    Compiler::new().compile(&source)
}

fn compile_unfolded(text: &str) -> Result<Vec<Instruction>, ParseError> {
    let source = Source::from_contents("<test>".to_string(), text.to_string())?;
    Compiler::new().with_folding(false).compile(&source)
}

fn parse_error(text: &str) -> ParseError {
    match compile(text) {
        Ok(prog) => panic!("expected a parse error for {text:?}, got {prog:?}"),
        Err(err) => err,
    }
}

#[test]
fn empty_rule_denies() -> Result<()> {
    assert_eq!(
        compile("")?,
        vec![
            Instruction::PushConst(Value::Bool(false)),
            Instruction::SetAuthz(vec![]),
        ]
    );
    // Comment-only text is empty too.
    assert_eq!(compile("# nothing here")?.len(), 2);
    Ok(())
}

#[test]
fn attribute_block_without_verdict() -> Result<()> {
    assert_eq!(
        compile("{{ payment = True }}")?,
        vec![
            Instruction::PushConst(Value::Bool(false)),
            Instruction::PushConst(Value::Bool(true)),
            Instruction::SetAuthz(vec!["payment".into()]),
        ]
    );
    Ok(())
}

#[test]
fn attribute_block_with_trailing_comma() -> Result<()> {
    let prog = compile("True {{ a = 1, b = 2, }}")?;
    assert_eq!(
        prog.last(),
        Some(&Instruction::SetAuthz(vec!["a".into(), "b".into()]))
    );
    Ok(())
}

#[test]
fn set_of_sets_is_an_expression_not_a_block() -> Result<()> {
    let prog = compile("{{1}, {2}}")?;
    assert_eq!(prog.len(), 2);
    assert!(matches!(prog[0], Instruction::PushConst(Value::Set(_))));
    Ok(())
}

#[test]
fn precedence_mul_before_add() -> Result<()> {
    assert_eq!(
        compile_unfolded("1 + 2 * 3")?,
        vec![
            Instruction::PushConst(Value::Int(1)),
            Instruction::PushConst(Value::Int(2)),
            Instruction::PushConst(Value::Int(3)),
            Instruction::Mul,
            Instruction::Add,
            Instruction::SetAuthz(vec![]),
        ]
    );
    Ok(())
}

#[test]
fn pow_is_right_associative() -> Result<()> {
    assert_eq!(
        compile_unfolded("2 ** 3 ** 2")?,
        vec![
            Instruction::PushConst(Value::Int(2)),
            Instruction::PushConst(Value::Int(3)),
            Instruction::PushConst(Value::Int(2)),
            Instruction::Pow,
            Instruction::Pow,
            Instruction::SetAuthz(vec![]),
        ]
    );
    Ok(())
}

#[test]
fn unary_minus_binds_looser_than_pow() -> Result<()> {
    assert_eq!(
        compile_unfolded("-2 ** 2")?,
        vec![
            Instruction::PushConst(Value::Int(2)),
            Instruction::PushConst(Value::Int(2)),
            Instruction::Pow,
            Instruction::Neg,
            Instruction::SetAuthz(vec![]),
        ]
    );
    Ok(())
}

#[test]
fn and_compiles_to_value_preserving_jump() -> Result<()> {
    assert_eq!(
        compile("x and y")?,
        vec![
            Instruction::LoadName("x".into()),
            Instruction::JumpIfFalseElseKeep(3),
            Instruction::LoadName("y".into()),
            Instruction::SetAuthz(vec![]),
        ]
    );
    Ok(())
}

#[test]
fn ternary_compiles_to_jumps() -> Result<()> {
    assert_eq!(
        compile("1 if x else 2")?,
        vec![
            Instruction::LoadName("x".into()),
            Instruction::JumpIfFalsePop(4),
            Instruction::PushConst(Value::Int(1)),
            Instruction::Jump(5),
            Instruction::PushConst(Value::Int(2)),
            Instruction::SetAuthz(vec![]),
        ]
    );
    Ok(())
}

#[test]
fn comparisons_associate_left() -> Result<()> {
    assert_eq!(
        compile_unfolded("1 < 2 < 3")?,
        vec![
            Instruction::PushConst(Value::Int(1)),
            Instruction::PushConst(Value::Int(2)),
            Instruction::Lt,
            Instruction::PushConst(Value::Int(3)),
            Instruction::Lt,
            Instruction::SetAuthz(vec![]),
        ]
    );
    Ok(())
}

#[test]
fn trailers_chain() -> Result<()> {
    assert_eq!(
        compile("a.b[0](c)")?,
        vec![
            Instruction::LoadName("a".into()),
            Instruction::GetAttr("b".into()),
            Instruction::PushConst(Value::Int(0)),
            Instruction::GetItem,
            Instruction::LoadName("c".into()),
            Instruction::Call(1),
            Instruction::SetAuthz(vec![]),
        ]
    );
    Ok(())
}

#[test]
fn adjacent_strings_concatenate() -> Result<()> {
    assert_eq!(
        compile(r#"'a' "b" 'c'"#)?[0],
        Instruction::PushConst(Value::from("abc"))
    );
    Ok(())
}

#[test]
fn string_escapes_decode() -> Result<()> {
    assert_eq!(
        compile(r#""a\n\t\x41B'""#)?[0],
        Instruction::PushConst(Value::from("a\n\tAB'"))
    );
    Ok(())
}

#[test]
fn radix_literals() -> Result<()> {
    assert_eq!(
        compile("0x1F")?[0],
        Instruction::PushConst(Value::Int(31))
    );
    assert_eq!(compile("0o17")?[0], Instruction::PushConst(Value::Int(15)));
    assert_eq!(compile("0b101")?[0], Instruction::PushConst(Value::Int(5)));
    Ok(())
}

#[test]
fn underscore_attribute_rejected() {
    let err = parse_error("user.admin {{ _secret = 1 }}");
    assert!(
        err.message.contains("may not begin with `_`"),
        "{}",
        err.message
    );
    assert_eq!(err.line, 1);
}

#[test]
fn duplicate_attribute_rejected() {
    let err = parse_error("True {{ a = 1, a = 2 }}");
    assert!(err.message.contains("duplicate"), "{}", err.message);
}

#[test]
fn empty_set_literal_rejected() {
    let err = parse_error("{}");
    assert!(err.message.contains("empty set literal"), "{}", err.message);
}

#[test]
fn trailing_text_rejected() {
    let err = parse_error("True True");
    assert!(err.message.contains("trailing"), "{}", err.message);

    let err = parse_error("True {{ a = 1 }} x");
    assert!(err.message.contains("trailing"), "{}", err.message);
}

#[test]
fn unclosed_attribute_block_rejected() {
    let err = parse_error("True {{ a = 1");
    assert!(err.message.contains("`}}`"), "{}", err.message);
}

#[test]
fn keywords_are_not_identifiers() {
    let err = parse_error("else");
    assert!(err.message.contains("unexpected keyword"), "{}", err.message);

    let err = parse_error("x.if");
    assert!(err.message.contains("unexpected keyword"), "{}", err.message);
}

#[test]
fn integer_literal_out_of_range() {
    let err = parse_error("99999999999999999999999999");
    assert!(err.message.contains("out of range"), "{}", err.message);
}

#[test]
fn error_location_is_reported() {
    let err = parse_error("x ==");
    assert_eq!(err.line, 1);
    assert_eq!(err.col, 5);
}
