// SPDX-License-Identifier: MIT

//! Operator semantics shared by the evaluator and the constant folder.
//!
//! Booleans participate in arithmetic and comparisons as the integers 0
//! and 1, as they do in Python. Arithmetic on incompatible types is a
//! genuine [`EvaluationError`], unlike name resolution which degrades to
//! `Nothing`.

use crate::ast::{ArithOp, BitOp, CmpOp, UnaryOp};
use crate::errors::EvaluationError;
use crate::value::Value;

use core::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

type Result<T> = core::result::Result<T, EvaluationError>;

fn bin_err(op: &'static str, a: &Value, b: &Value) -> EvaluationError {
    EvaluationError::UnsupportedBinary {
        op,
        lhs: a.type_name(),
        rhs: b.type_name(),
    }
}

pub(crate) fn int_like(v: &Value) -> Option<i64> {
    match v {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Int(n) => Some(*n),
        _ => None,
    }
}

pub(crate) fn float_like(v: &Value) -> Option<f64> {
    match v {
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Int(n) => Some(*n as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

fn is_numeric(v: &Value) -> bool {
    matches!(v, Value::Bool(_) | Value::Int(_) | Value::Float(_))
}

fn both_ints(a: &Value, b: &Value) -> Option<(i64, i64)> {
    Some((int_like(a)?, int_like(b)?))
}

fn both_floats(a: &Value, b: &Value) -> Option<(f64, f64)> {
    if is_numeric(a) && is_numeric(b) {
        Some((float_like(a)?, float_like(b)?))
    } else {
        None
    }
}

fn repeat_str(s: &str, n: i64) -> Value {
    let n = usize::try_from(n).unwrap_or(0);
    Value::from(s.repeat(n))
}

fn repeat_bytes(b: &[u8], n: i64) -> Value {
    let n = usize::try_from(n).unwrap_or(0);
    Value::from(b.repeat(n))
}

pub(crate) fn arith_op(op: ArithOp, a: &Value, b: &Value) -> Result<Value> {
    match op {
        ArithOp::Add => add(a, b),
        ArithOp::Sub => sub(a, b),
        ArithOp::Mul => mul(a, b),
        ArithOp::Div => div(a, b),
        ArithOp::FloorDiv => floor_div(a, b),
        ArithOp::Mod => modulo(a, b),
        ArithOp::Pow => pow(a, b),
    }
}

fn add(a: &Value, b: &Value) -> Result<Value> {
    if let Some((x, y)) = both_ints(a, b) {
        return x
            .checked_add(y)
            .map(Value::Int)
            .ok_or(EvaluationError::IntegerOverflow { op: "+" });
    }
    if let Some((x, y)) = both_floats(a, b) {
        return Ok(Value::Float(x + y));
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => {
            let mut s = String::with_capacity(x.len() + y.len());
            s.push_str(x);
            s.push_str(y);
            Ok(Value::from(s))
        }
        (Value::Bytes(x), Value::Bytes(y)) => {
            let mut v = Vec::with_capacity(x.len() + y.len());
            v.extend_from_slice(x);
            v.extend_from_slice(y);
            Ok(Value::from(v))
        }
        _ => Err(bin_err("+", a, b)),
    }
}

fn sub(a: &Value, b: &Value) -> Result<Value> {
    if let Some((x, y)) = both_ints(a, b) {
        return x
            .checked_sub(y)
            .map(Value::Int)
            .ok_or(EvaluationError::IntegerOverflow { op: "-" });
    }
    if let Some((x, y)) = both_floats(a, b) {
        return Ok(Value::Float(x - y));
    }
    match (a, b) {
        (Value::Set(x), Value::Set(y)) => Ok(Value::from_set(
            x.difference(y).cloned().collect::<BTreeSet<Value>>(),
        )),
        _ => Err(bin_err("-", a, b)),
    }
}

fn mul(a: &Value, b: &Value) -> Result<Value> {
    if let Some((x, y)) = both_ints(a, b) {
        return x
            .checked_mul(y)
            .map(Value::Int)
            .ok_or(EvaluationError::IntegerOverflow { op: "*" });
    }
    if let Some((x, y)) = both_floats(a, b) {
        return Ok(Value::Float(x * y));
    }
    match (a, b) {
        (Value::Str(s), _) => int_like(b)
            .map(|n| repeat_str(s, n))
            .ok_or_else(|| bin_err("*", a, b)),
        (_, Value::Str(s)) => int_like(a)
            .map(|n| repeat_str(s, n))
            .ok_or_else(|| bin_err("*", a, b)),
        (Value::Bytes(x), _) => int_like(b)
            .map(|n| repeat_bytes(x, n))
            .ok_or_else(|| bin_err("*", a, b)),
        (_, Value::Bytes(x)) => int_like(a)
            .map(|n| repeat_bytes(x, n))
            .ok_or_else(|| bin_err("*", a, b)),
        _ => Err(bin_err("*", a, b)),
    }
}

/// True division always produces a float, as in Python 3.
fn div(a: &Value, b: &Value) -> Result<Value> {
    let (x, y) = both_floats(a, b).ok_or_else(|| bin_err("/", a, b))?;
    if y == 0.0 {
        return Err(EvaluationError::DivisionByZero);
    }
    Ok(Value::Float(x / y))
}

fn floor_div(a: &Value, b: &Value) -> Result<Value> {
    if let Some((x, y)) = both_ints(a, b) {
        if y == 0 {
            return Err(EvaluationError::DivisionByZero);
        }
        if x == i64::MIN && y == -1 {
            return Err(EvaluationError::IntegerOverflow { op: "//" });
        }
        // Floor division rounds toward negative infinity.
        let q = x / y;
        let r = x % y;
        let q = if r != 0 && (r < 0) != (y < 0) { q - 1 } else { q };
        return Ok(Value::Int(q));
    }
    let (x, y) = both_floats(a, b).ok_or_else(|| bin_err("//", a, b))?;
    if y == 0.0 {
        return Err(EvaluationError::DivisionByZero);
    }
    Ok(Value::Float((x / y).floor()))
}

/// Modulo takes the sign of the divisor.
fn modulo(a: &Value, b: &Value) -> Result<Value> {
    if let Some((x, y)) = both_ints(a, b) {
        if y == 0 {
            return Err(EvaluationError::DivisionByZero);
        }
        if x == i64::MIN && y == -1 {
            return Err(EvaluationError::IntegerOverflow { op: "%" });
        }
        let r = x % y;
        let r = if r != 0 && (r < 0) != (y < 0) { r + y } else { r };
        return Ok(Value::Int(r));
    }
    let (x, y) = both_floats(a, b).ok_or_else(|| bin_err("%", a, b))?;
    if y == 0.0 {
        return Err(EvaluationError::DivisionByZero);
    }
    let r = x % y;
    let r = if r != 0.0 && (r < 0.0) != (y < 0.0) {
        r + y
    } else {
        r
    };
    Ok(Value::Float(r))
}

fn pow(a: &Value, b: &Value) -> Result<Value> {
    if let Some((x, y)) = both_ints(a, b) {
        if y >= 0 {
            let exp =
                u32::try_from(y).map_err(|_| EvaluationError::IntegerOverflow { op: "**" })?;
            return x
                .checked_pow(exp)
                .map(Value::Int)
                .ok_or(EvaluationError::IntegerOverflow { op: "**" });
        }
        // A negative exponent produces a float.
        return Ok(Value::Float((x as f64).powf(y as f64)));
    }
    let (x, y) = both_floats(a, b).ok_or_else(|| bin_err("**", a, b))?;
    Ok(Value::Float(x.powf(y)))
}

pub(crate) fn bit_op(op: BitOp, a: &Value, b: &Value) -> Result<Value> {
    if let (Value::Set(x), Value::Set(y)) = (a, b) {
        let set: Option<BTreeSet<Value>> = match op {
            BitOp::And => Some(x.intersection(y).cloned().collect()),
            BitOp::Or => Some(x.union(y).cloned().collect()),
            BitOp::Xor => Some(x.symmetric_difference(y).cloned().collect()),
            BitOp::Shl | BitOp::Shr => None,
        };
        if let Some(set) = set {
            return Ok(Value::from_set(set));
        }
    }

    let op_name = match op {
        BitOp::And => "&",
        BitOp::Or => "|",
        BitOp::Xor => "^",
        BitOp::Shl => "<<",
        BitOp::Shr => ">>",
    };
    let (x, y) = both_ints(a, b).ok_or_else(|| bin_err(op_name, a, b))?;
    match op {
        BitOp::And => Ok(Value::Int(x & y)),
        BitOp::Or => Ok(Value::Int(x | y)),
        BitOp::Xor => Ok(Value::Int(x ^ y)),
        BitOp::Shl => {
            if y < 0 {
                return Err(EvaluationError::NegativeShiftCount);
            }
            let shift =
                u32::try_from(y).map_err(|_| EvaluationError::IntegerOverflow { op: "<<" })?;
            x.checked_shl(shift)
                .filter(|r| (r >> shift) == x)
                .map(Value::Int)
                .ok_or(EvaluationError::IntegerOverflow { op: "<<" })
        }
        BitOp::Shr => {
            if y < 0 {
                return Err(EvaluationError::NegativeShiftCount);
            }
            // i64 shifts are arithmetic, matching floor semantics.
            let shift = u32::try_from(y).unwrap_or(63).min(63);
            Ok(Value::Int(x >> shift))
        }
    }
}

pub(crate) fn unary_op(op: UnaryOp, v: &Value) -> Result<Value> {
    let err = || EvaluationError::UnsupportedUnary {
        op: match op {
            UnaryOp::Not => "not",
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Invert => "~",
        },
        operand: v.type_name(),
    };
    match op {
        UnaryOp::Not => Ok(Value::Bool(!v.truthy())),
        UnaryOp::Neg => match v {
            Value::Float(x) => Ok(Value::Float(-x)),
            _ => int_like(v)
                .ok_or_else(err)?
                .checked_neg()
                .map(Value::Int)
                .ok_or(EvaluationError::IntegerOverflow { op: "-" }),
        },
        UnaryOp::Pos => match v {
            Value::Float(x) => Ok(Value::Float(*x)),
            _ => int_like(v).map(Value::Int).ok_or_else(err),
        },
        UnaryOp::Invert => int_like(v).map(|x| Value::Int(!x)).ok_or_else(err),
    }
}

/// Language-level equality: numeric across `bool`/`int`/`float`, structural
/// for containers, capability-backed for host objects, and `false` (not an
/// error) for mismatched types.
pub(crate) fn eq_values(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            Arc::ptr_eq(x, y) || x.equals(b) || y.equals(a)
        }
        (Value::Object(x), _) => x.equals(b),
        (_, Value::Object(y)) => y.equals(a),
        _ => a == b,
    }
}

fn ordering(a: &Value, b: &Value) -> Result<Option<Ordering>> {
    match (a, b) {
        (Value::Object(x), _) => Ok(x.compare(b)),
        (_, Value::Object(y)) => Ok(y.compare(a).map(Ordering::reverse)),
        (Value::Str(_), Value::Str(_)) | (Value::Bytes(_), Value::Bytes(_)) => Ok(Some(a.cmp(b))),
        _ if is_numeric(a) && is_numeric(b) => Ok(Some(a.cmp(b))),
        _ => Err(EvaluationError::NotOrderable {
            lhs: a.type_name(),
            rhs: b.type_name(),
        }),
    }
}

fn ordered(a: &Value, b: &Value) -> Result<Ordering> {
    ordering(a, b)?.ok_or(EvaluationError::NotOrderable {
        lhs: a.type_name(),
        rhs: b.type_name(),
    })
}

/// Ordering comparison. Sets compare by the subset relation, as Python
/// sets do; incomparable sets are simply not less/greater, which is why
/// they do not go through `ordering`.
pub(crate) fn cmp_op(op: CmpOp, a: &Value, b: &Value) -> Result<Value> {
    if let (Value::Set(x), Value::Set(y)) = (a, b) {
        let r = match op {
            CmpOp::Eq => x == y,
            CmpOp::Ne => x != y,
            CmpOp::Lt => x != y && x.is_subset(y),
            CmpOp::Le => x.is_subset(y),
            CmpOp::Gt => x != y && x.is_superset(y),
            CmpOp::Ge => x.is_superset(y),
            CmpOp::In => return contains(a, b).map(Value::Bool),
            CmpOp::NotIn => return contains(a, b).map(|r| Value::Bool(!r)),
        };
        return Ok(Value::Bool(r));
    }
    let r = match op {
        CmpOp::Eq => eq_values(a, b),
        CmpOp::Ne => !eq_values(a, b),
        CmpOp::Lt => ordered(a, b)? == Ordering::Less,
        CmpOp::Le => ordered(a, b)? != Ordering::Greater,
        CmpOp::Gt => ordered(a, b)? == Ordering::Greater,
        CmpOp::Ge => ordered(a, b)? != Ordering::Less,
        CmpOp::In => contains(a, b)?,
        CmpOp::NotIn => !contains(a, b)?,
    };
    Ok(Value::Bool(r))
}

/// Membership test `item in container`.
pub(crate) fn contains(item: &Value, container: &Value) -> Result<bool> {
    match container {
        Value::Set(s) => Ok(s.contains(item)),
        Value::Str(s) => match item {
            Value::Str(sub) => Ok(s.contains(sub.as_ref())),
            _ => Err(bin_err("in", item, container)),
        },
        Value::Bytes(b) => match item {
            Value::Int(n) if (0..=255).contains(n) => Ok(b.contains(&(*n as u8))),
            Value::Bytes(sub) if sub.is_empty() => Ok(true),
            Value::Bytes(sub) => Ok(b.windows(sub.len()).any(|w| w == sub.as_ref())),
            _ => Err(bin_err("in", item, container)),
        },
        Value::Object(o) => o
            .contains(item)
            .map_err(|_| EvaluationError::MissingCapability {
                capability: "contains",
            }),
        _ => Err(EvaluationError::NotAContainer {
            container: container.type_name(),
        }),
    }
}

/// Attribute access. Host objects go through the capability set;
/// authorizations expose their attributes; everything else tolerantly
/// yields `Nothing`.
pub(crate) fn get_attr(base: &Value, name: &str) -> Result<Value> {
    match base {
        Value::Object(o) => o
            .get_attr(name)
            .map_err(|_| EvaluationError::MissingCapability {
                capability: "get_attr",
            }),
        Value::Authorization(a) => Ok(a.attr(name)),
        _ => Ok(Value::Nothing),
    }
}

/// Subscription. Strings and bytes index by (possibly negative) position;
/// out-of-range and non-subscriptable cases yield `Nothing`.
pub(crate) fn get_item(base: &Value, key: &Value) -> Result<Value> {
    match base {
        Value::Object(o) => o
            .get_item(key)
            .map_err(|_| EvaluationError::MissingCapability {
                capability: "get_item",
            }),
        Value::Str(s) => Ok(index_chars(s, key)),
        Value::Bytes(b) => {
            let Some(idx) = normalize_index(key, b.len()) else {
                return Ok(Value::Nothing);
            };
            Ok(b.get(idx).map_or(Value::Nothing, |v| Value::Int((*v).into())))
        }
        Value::Authorization(a) => match key {
            Value::Str(name) => Ok(a.attr(name)),
            _ => Ok(Value::Nothing),
        },
        _ => Ok(Value::Nothing),
    }
}

fn normalize_index(key: &Value, len: usize) -> Option<usize> {
    let i = int_like(key)?;
    if i < 0 {
        usize::try_from(i.checked_add(i64::try_from(len).ok()?)?).ok()
    } else {
        usize::try_from(i).ok()
    }
}

fn index_chars(s: &str, key: &Value) -> Value {
    let count = s.chars().count();
    let Some(idx) = normalize_index(key, count) else {
        return Value::Nothing;
    };
    s.chars()
        .nth(idx)
        .map_or(Value::Nothing, |c| Value::from(c.to_string()))
}
