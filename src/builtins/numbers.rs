// SPDX-License-Identifier: MIT

use crate::arith;
use crate::ast::ArithOp;
use crate::builtins::utils::{ensure_args_count, ensure_args_range, ensure_int};
use crate::builtins::BuiltinFcn;
use crate::errors::EvaluationError;
use crate::value::Value;

use std::collections::HashMap;

use tracing::debug;

type Result<T> = core::result::Result<T, EvaluationError>;

pub fn register(m: &mut HashMap<&'static str, BuiltinFcn>) {
    m.insert("abs", abs);
    m.insert("divmod", divmod);
    m.insert("pow", pow);
    m.insert("round", round);
}

fn abs(args: &[Value]) -> Result<Value> {
    ensure_args_count("abs", args, 1)?;
    match &args[0] {
        Value::Float(x) => Ok(Value::Float(x.abs())),
        v => {
            let n = ensure_int("abs", v)?;
            n.checked_abs()
                .map(Value::Int)
                .ok_or(EvaluationError::IntegerOverflow { op: "abs" })
        }
    }
}

/// Rounds half to even, like Python's `round`. Without `ndigits` the
/// result is an int; with it, a float.
fn round(args: &[Value]) -> Result<Value> {
    ensure_args_range("round", args, 1, 2)?;
    let x = match &args[0] {
        Value::Float(x) => *x,
        v => return Ok(Value::Int(ensure_int("round", v)?)),
    };
    match args.get(1) {
        None => {
            let r = x.round_ties_even();
            if !r.is_finite() || r < i64::MIN as f64 || r > i64::MAX as f64 {
                return Err(EvaluationError::builtin("round", "float out of int range"));
            }
            Ok(Value::Int(r as i64))
        }
        Some(nd) => {
            let nd = ensure_int("round", nd)?;
            let nd = i32::try_from(nd)
                .map_err(|_| EvaluationError::builtin("round", "ndigits out of range"))?;
            let scale = 10f64.powi(nd);
            Ok(Value::Float((x * scale).round_ties_even() / scale))
        }
    }
}

fn pow(args: &[Value]) -> Result<Value> {
    ensure_args_range("pow", args, 2, 3)?;
    if args.len() == 2 {
        return arith::arith_op(ArithOp::Pow, &args[0], &args[1]);
    }
    let base = ensure_int("pow", &args[0])?;
    let exp = ensure_int("pow", &args[1])?;
    let modulus = ensure_int("pow", &args[2])?;
    if exp < 0 {
        return Err(EvaluationError::builtin(
            "pow",
            "exponent must be non-negative when a modulus is given",
        ));
    }
    if modulus == 0 {
        return Err(EvaluationError::DivisionByZero);
    }
    // Square-and-multiply in i128 to keep intermediate products exact.
    let m = i128::from(modulus);
    let mut base = i128::from(base).rem_euclid(m);
    let mut exp = exp as u64;
    let mut acc: i128 = 1 % m;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc * base % m;
        }
        base = base * base % m;
        exp >>= 1;
    }
    // Match the sign-of-divisor convention.
    let acc = if acc != 0 && (acc < 0) != (m < 0) {
        acc + m
    } else {
        acc
    };
    Ok(Value::Int(acc as i64))
}

fn divmod(args: &[Value]) -> Result<Value> {
    // The quotient/remainder pair has no representable type here.
    let _ = args;
    debug!("divmod: result is not representable; yielding None");
    Ok(Value::Nothing)
}
