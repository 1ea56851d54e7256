// SPDX-License-Identifier: MIT

use crate::arith;
use crate::builtins::utils::{
    ensure_args_count, ensure_args_range, ensure_int, ensure_str, iterable_elements,
};
use crate::builtins::BuiltinFcn;
use crate::errors::EvaluationError;
use crate::value::Value;

use std::collections::HashMap;

use tracing::debug;

type Result<T> = core::result::Result<T, EvaluationError>;

pub fn register(m: &mut HashMap<&'static str, BuiltinFcn>) {
    m.insert("bin", bin);
    m.insert("bool", to_bool);
    m.insert("bytes", to_bytes);
    m.insert("chr", chr);
    m.insert("complex", complex);
    m.insert("dict", dict);
    m.insert("float", to_float);
    m.insert("format", format_value);
    m.insert("frozenset", to_set);
    m.insert("hex", hex);
    m.insert("int", to_int);
    m.insert("list", to_list);
    m.insert("oct", oct);
    m.insert("ord", ord);
    m.insert("repr", repr);
    m.insert("set", to_set);
    m.insert("str", to_str);
    m.insert("tuple", to_list);
}

fn to_bool(args: &[Value]) -> Result<Value> {
    ensure_args_range("bool", args, 0, 1)?;
    Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
}

fn to_int(args: &[Value]) -> Result<Value> {
    ensure_args_range("int", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Int(0)),
        Some(Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
        Some(Value::Int(n)) => Ok(Value::Int(*n)),
        Some(Value::Float(x)) => {
            let t = x.trunc();
            if !t.is_finite() || t < i64::MIN as f64 || t > i64::MAX as f64 {
                return Err(EvaluationError::builtin("int", "float out of int range"));
            }
            Ok(Value::Int(t as i64))
        }
        Some(Value::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| EvaluationError::builtin("int", format!("invalid literal: {s:?}"))),
        Some(v) => Err(EvaluationError::builtin(
            "int",
            format!("cannot convert '{}'", v.type_name()),
        )),
    }
}

fn to_float(args: &[Value]) -> Result<Value> {
    ensure_args_range("float", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Float(0.0)),
        Some(Value::Bool(b)) => Ok(Value::Float(f64::from(u8::from(*b)))),
        Some(Value::Int(n)) => Ok(Value::Float(*n as f64)),
        Some(Value::Float(x)) => Ok(Value::Float(*x)),
        Some(Value::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| EvaluationError::builtin("float", format!("invalid literal: {s:?}"))),
        Some(v) => Err(EvaluationError::builtin(
            "float",
            format!("cannot convert '{}'", v.type_name()),
        )),
    }
}

fn to_str(args: &[Value]) -> Result<Value> {
    ensure_args_range("str", args, 0, 1)?;
    Ok(match args.first() {
        None => Value::from(""),
        Some(v) => Value::from(format!("{v}")),
    })
}

fn repr(args: &[Value]) -> Result<Value> {
    ensure_args_count("repr", args, 1)?;
    Ok(Value::from(args[0].repr()))
}

/// `format(value, spec)` for the common format specs: an empty spec is
/// `str`, `d`/`b`/`o`/`x`/`X` format integers, and `f` (optionally with a
/// `.N` precision) formats numbers as fixed-point.
fn format_value(args: &[Value]) -> Result<Value> {
    ensure_args_range("format", args, 1, 2)?;
    let spec = match args.get(1) {
        None => "",
        Some(v) => ensure_str("format", v)?,
    };
    let v = &args[0];
    let bad_spec = || EvaluationError::builtin("format", format!("unsupported format spec {spec:?}"));
    let out = match spec {
        "" => format!("{v}"),
        "d" => format!("{}", ensure_int("format", v)?),
        "b" | "o" | "x" | "X" => {
            let n = ensure_int("format", v)?;
            let sign = if n < 0 { "-" } else { "" };
            let m = n.unsigned_abs();
            let digits = match spec {
                "b" => format!("{m:b}"),
                "o" => format!("{m:o}"),
                "x" => format!("{m:x}"),
                _ => format!("{m:X}"),
            };
            format!("{sign}{digits}")
        }
        _ if spec.ends_with('f') => {
            let x = arith::float_like(v)
                .ok_or_else(|| EvaluationError::builtin("format", "expected a number"))?;
            let body = &spec[..spec.len() - 1];
            let precision = if body.is_empty() {
                6
            } else {
                body.strip_prefix('.')
                    .and_then(|digits| digits.parse::<usize>().ok())
                    .ok_or_else(bad_spec)?
            };
            format!("{x:.precision$}")
        }
        _ => return Err(bad_spec()),
    };
    Ok(Value::from(out))
}

/// `set` and `frozenset` are the same thing here: every set is frozen.
fn to_set(args: &[Value]) -> Result<Value> {
    ensure_args_range("set", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::new_set()),
        Some(v) => Ok(Value::from_set(iterable_elements("set", v)?)),
    }
}

/// The closest thing to a sequence in this value model is the frozen set.
fn to_list(args: &[Value]) -> Result<Value> {
    ensure_args_range("list", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::new_set()),
        Some(v) => Ok(Value::from_set(iterable_elements("list", v)?)),
    }
}

fn dict(args: &[Value]) -> Result<Value> {
    let _ = args;
    debug!("dict: result is not representable; yielding None");
    Ok(Value::Nothing)
}

fn complex(args: &[Value]) -> Result<Value> {
    // There is no complex number type in this value model.
    let _ = args;
    debug!("complex: result is not representable; yielding None");
    Ok(Value::Nothing)
}

fn to_bytes(args: &[Value]) -> Result<Value> {
    ensure_args_range("bytes", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::from(Vec::new())),
        Some(Value::Str(s)) => Ok(Value::from(s.as_bytes().to_vec())),
        Some(Value::Bytes(b)) => Ok(Value::Bytes(b.clone())),
        Some(v @ (Value::Int(_) | Value::Bool(_))) => {
            let n = ensure_int("bytes", v)?;
            let n = usize::try_from(n)
                .map_err(|_| EvaluationError::builtin("bytes", "negative count"))?;
            Ok(Value::from(vec![0u8; n]))
        }
        Some(Value::Set(s)) => {
            let mut out = Vec::with_capacity(s.len());
            for v in s.iter() {
                let n = ensure_int("bytes", v)?;
                let b = u8::try_from(n)
                    .map_err(|_| EvaluationError::builtin("bytes", "byte must be in range(256)"))?;
                out.push(b);
            }
            Ok(Value::from(out))
        }
        Some(v) => Err(EvaluationError::builtin(
            "bytes",
            format!("cannot convert '{}'", v.type_name()),
        )),
    }
}

fn chr(args: &[Value]) -> Result<Value> {
    ensure_args_count("chr", args, 1)?;
    let n = ensure_int("chr", &args[0])?;
    u32::try_from(n)
        .ok()
        .and_then(char::from_u32)
        .map(|c| Value::from(c.to_string()))
        .ok_or_else(|| EvaluationError::builtin("chr", "argument is not a valid code point"))
}

fn ord(args: &[Value]) -> Result<Value> {
    ensure_args_count("ord", args, 1)?;
    let s = ensure_str("ord", &args[0])?;
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
        _ => Err(EvaluationError::builtin(
            "ord",
            format!("expected a single character, got a string of length {}", s.chars().count()),
        )),
    }
}

fn radix(
    builtin: &'static str,
    args: &[Value],
    prefix: &str,
    fmt: fn(u64) -> String,
) -> Result<Value> {
    ensure_args_count(builtin, args, 1)?;
    let n = ensure_int(builtin, &args[0])?;
    let sign = if n < 0 { "-" } else { "" };
    Ok(Value::from(format!(
        "{sign}{prefix}{}",
        fmt(n.unsigned_abs())
    )))
}

fn hex(args: &[Value]) -> Result<Value> {
    radix("hex", args, "0x", |n| format!("{n:x}"))
}

fn oct(args: &[Value]) -> Result<Value> {
    radix("oct", args, "0o", |n| format!("{n:o}"))
}

fn bin(args: &[Value]) -> Result<Value> {
    radix("bin", args, "0b", |n| format!("{n:b}"))
}
