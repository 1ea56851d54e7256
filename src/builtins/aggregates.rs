// SPDX-License-Identifier: MIT

use crate::arith;
use crate::ast::{ArithOp, CmpOp};
use crate::builtins::utils::{ensure_args_count, ensure_args_range, ensure_int, iterable_elements};
use crate::builtins::BuiltinFcn;
use crate::errors::EvaluationError;
use crate::value::Value;

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

type Result<T> = core::result::Result<T, EvaluationError>;

// Results of `range` are materialized; this bounds the damage a rule like
// range(10**12) can do.
const MAX_RANGE_LEN: i64 = 1 << 20;

pub fn register(m: &mut HashMap<&'static str, BuiltinFcn>) {
    m.insert("enumerate", enumerate);
    m.insert("iter", iter);
    m.insert("len", len);
    m.insert("max", max);
    m.insert("min", min);
    m.insert("next", next);
    m.insert("range", range);
    m.insert("reversed", reversed);
    m.insert("sorted", sorted);
    m.insert("sum", sum);
    m.insert("zip", zip);
}

fn len(args: &[Value]) -> Result<Value> {
    ensure_args_count("len", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::Bytes(b) => Ok(Value::Int(b.len() as i64)),
        Value::Set(s) => Ok(Value::Int(s.len() as i64)),
        v => Err(EvaluationError::builtin(
            "len",
            format!("object of type '{}' has no length", v.type_name()),
        )),
    }
}

fn extremum(builtin: &'static str, args: &[Value], op: CmpOp) -> Result<Value> {
    if args.is_empty() {
        return Err(EvaluationError::builtin(builtin, "expected at least 1 argument"));
    }
    let candidates = if args.len() == 1 {
        iterable_elements(builtin, &args[0])?.into_iter().collect()
    } else {
        args.to_vec()
    };
    let mut best: Option<Value> = None;
    for v in candidates {
        best = Some(match best {
            None => v,
            Some(b) => {
                if arith::cmp_op(op, &v, &b)?.truthy() {
                    v
                } else {
                    b
                }
            }
        });
    }
    best.ok_or_else(|| EvaluationError::builtin(builtin, "argument is an empty sequence"))
}

fn min(args: &[Value]) -> Result<Value> {
    extremum("min", args, CmpOp::Lt)
}

fn max(args: &[Value]) -> Result<Value> {
    extremum("max", args, CmpOp::Gt)
}

fn sum(args: &[Value]) -> Result<Value> {
    ensure_args_range("sum", args, 1, 2)?;
    let mut acc = args.get(1).cloned().unwrap_or(Value::Int(0));
    for v in iterable_elements("sum", &args[0])? {
        acc = arith::arith_op(ArithOp::Add, &acc, &v)?;
    }
    Ok(acc)
}

/// Sorting an unordered collection into the only sequence type available
/// here produces a frozen set, which iterates in sorted order anyway.
fn sorted(args: &[Value]) -> Result<Value> {
    ensure_args_count("sorted", args, 1)?;
    Ok(Value::from_set(iterable_elements("sorted", &args[0])?))
}

/// Strings and bytestrings reverse; sets have no order to reverse and
/// pass through unchanged.
fn reversed(args: &[Value]) -> Result<Value> {
    ensure_args_count("reversed", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::from(s.chars().rev().collect::<String>())),
        Value::Bytes(b) => Ok(Value::from(b.iter().rev().copied().collect::<Vec<u8>>())),
        Value::Set(s) => Ok(Value::Set(s.clone())),
        v => Err(EvaluationError::builtin(
            "reversed",
            format!("'{}' is not reversible", v.type_name()),
        )),
    }
}

fn range(args: &[Value]) -> Result<Value> {
    ensure_args_range("range", args, 1, 3)?;
    let (start, stop, step) = match args.len() {
        1 => (0, ensure_int("range", &args[0])?, 1),
        2 => (
            ensure_int("range", &args[0])?,
            ensure_int("range", &args[1])?,
            1,
        ),
        _ => (
            ensure_int("range", &args[0])?,
            ensure_int("range", &args[1])?,
            ensure_int("range", &args[2])?,
        ),
    };
    if step == 0 {
        return Err(EvaluationError::builtin("range", "step argument must not be zero"));
    }
    let mut out = BTreeSet::new();
    let mut n = start;
    let mut count = 0i64;
    while (step > 0 && n < stop) || (step < 0 && n > stop) {
        count += 1;
        if count > MAX_RANGE_LEN {
            return Err(EvaluationError::builtin("range", "result is too large"));
        }
        out.insert(Value::Int(n));
        n = match n.checked_add(step) {
            Some(n) => n,
            None => break,
        };
    }
    Ok(Value::from_set(out))
}

// There is no pair type in this value model, so zip and enumerate have no
// representable result and resolve to Nothing. The same goes for iter and
// next: there is no iterator type to hand out or advance.

fn zip(args: &[Value]) -> Result<Value> {
    let _ = args;
    debug!("zip: result is not representable; yielding None");
    Ok(Value::Nothing)
}

fn enumerate(args: &[Value]) -> Result<Value> {
    let _ = args;
    debug!("enumerate: result is not representable; yielding None");
    Ok(Value::Nothing)
}

fn iter(args: &[Value]) -> Result<Value> {
    let _ = args;
    debug!("iter: result is not representable; yielding None");
    Ok(Value::Nothing)
}

fn next(args: &[Value]) -> Result<Value> {
    let _ = args;
    debug!("next: result is not representable; yielding None");
    Ok(Value::Nothing)
}
