// SPDX-License-Identifier: MIT

use crate::arith;
use crate::errors::EvaluationError;
use crate::value::Value;

use std::collections::BTreeSet;

type Result<T> = core::result::Result<T, EvaluationError>;

pub(crate) fn ensure_args_count(builtin: &'static str, args: &[Value], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(EvaluationError::builtin(
            builtin,
            format!("expected {count} argument(s), got {}", args.len()),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_args_range(
    builtin: &'static str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(EvaluationError::builtin(
            builtin,
            format!("expected {min} to {max} arguments, got {}", args.len()),
        ));
    }
    Ok(())
}

/// Integer coercion: ints and bools qualify, as they do in Python.
pub(crate) fn ensure_int(builtin: &'static str, v: &Value) -> Result<i64> {
    arith::int_like(v).ok_or_else(|| {
        EvaluationError::builtin(builtin, format!("expected an int, got '{}'", v.type_name()))
    })
}

pub(crate) fn ensure_str<'v>(builtin: &'static str, v: &'v Value) -> Result<&'v str> {
    v.as_str().ok_or_else(|| {
        EvaluationError::builtin(builtin, format!("expected a str, got '{}'", v.type_name()))
    })
}

/// The elements of a value usable as an iterable: a set's members, a
/// string's characters, or a bytestring's byte values.
pub(crate) fn iterable_elements(builtin: &'static str, v: &Value) -> Result<BTreeSet<Value>> {
    match v {
        Value::Set(s) => Ok(s.as_ref().clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
        Value::Bytes(b) => Ok(b.iter().map(|x| Value::Int((*x).into())).collect()),
        _ => Err(EvaluationError::builtin(
            builtin,
            format!("'{}' is not iterable", v.type_name()),
        )),
    }
}
