// SPDX-License-Identifier: MIT

use crate::arith;
use crate::builtins::utils::{ensure_args_count, ensure_args_range, ensure_str};
use crate::builtins::BuiltinFcn;
use crate::errors::EvaluationError;
use crate::value::{Function, Value};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

type Result<T> = core::result::Result<T, EvaluationError>;

pub fn register(m: &mut HashMap<&'static str, BuiltinFcn>) {
    m.insert("callable", callable);
    m.insert("getattr", getattr);
    m.insert("hasattr", hasattr);
    m.insert("hash", hash);
    m.insert("id", id);
    m.insert("isinstance", isinstance);
    m.insert("issubclass", issubclass);
    m.insert("object", object);
    m.insert("type", type_of);
}

/// Type name as reported by `type`. Host objects report through the
/// capability trait.
fn name_of(v: &Value) -> &'static str {
    match v {
        Value::Object(o) => o.type_name(),
        _ => v.type_name(),
    }
}

fn type_of(args: &[Value]) -> Result<Value> {
    ensure_args_count("type", args, 1)?;
    Ok(Value::from(name_of(&args[0])))
}

fn matches_type(v: &Value, name: &str) -> bool {
    match name {
        // Booleans are ints, and every set is a frozenset.
        "int" => matches!(v, Value::Int(_) | Value::Bool(_)),
        "set" | "frozenset" => matches!(v, Value::Set(_)),
        _ => name_of(v) == name,
    }
}

/// `isinstance(x, t)` where `t` is a type name as produced by `type`, or a
/// set of such names.
fn isinstance(args: &[Value]) -> Result<Value> {
    ensure_args_count("isinstance", args, 2)?;
    match &args[1] {
        Value::Str(name) => Ok(Value::Bool(matches_type(&args[0], name))),
        Value::Set(names) => {
            for name in names.iter() {
                let name = ensure_str("isinstance", name)?;
                if matches_type(&args[0], name) {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        v => Err(EvaluationError::builtin(
            "isinstance",
            format!(
                "expected a type name or set of type names, got '{}'",
                v.type_name()
            ),
        )),
    }
}

fn callable(args: &[Value]) -> Result<Value> {
    ensure_args_count("callable", args, 1)?;
    Ok(Value::Bool(matches!(&args[0], Value::Function(_))))
}

fn getattr(args: &[Value]) -> Result<Value> {
    ensure_args_range("getattr", args, 2, 3)?;
    let name = ensure_str("getattr", &args[1])?;
    let value = arith::get_attr(&args[0], name)?;
    match (value, args.get(2)) {
        (Value::Nothing, Some(default)) => Ok(default.clone()),
        (value, _) => Ok(value),
    }
}

fn hasattr(args: &[Value]) -> Result<Value> {
    ensure_args_count("hasattr", args, 2)?;
    let name = ensure_str("hasattr", &args[1])?;
    // An object that cannot do attribute lookup has no attributes.
    Ok(Value::Bool(matches!(
        arith::get_attr(&args[0], name),
        Ok(v) if !v.is_nothing()
    )))
}

fn hash(args: &[Value]) -> Result<Value> {
    ensure_args_count("hash", args, 1)?;
    // Wrapping into i64 keeps the value usable in arithmetic.
    Ok(Value::Int(args[0].hash_value()? as i64))
}

/// Identity of a value: the allocation address for reference-backed
/// values, so two clones of the same object agree and distinct objects
/// differ. Scalars act like interned values and derive their identity
/// from their contents.
fn id(args: &[Value]) -> Result<Value> {
    ensure_args_count("id", args, 1)?;
    let identity = match &args[0] {
        Value::Str(s) => Arc::as_ptr(s) as *const () as usize as u64,
        Value::Bytes(b) => Arc::as_ptr(b) as *const () as usize as u64,
        Value::Set(s) => Arc::as_ptr(s) as usize as u64,
        Value::Object(o) => Arc::as_ptr(o) as *const () as usize as u64,
        Value::Authorization(a) => Arc::as_ptr(a) as usize as u64,
        Value::Function(Function::Normal(f)) => Arc::as_ptr(f) as *const () as usize as u64,
        Value::Function(Function::ContextWanting(f)) => {
            Arc::as_ptr(f) as *const () as usize as u64
        }
        v => v.hash_value()?,
    };
    Ok(Value::Int(identity as i64))
}

fn subclass_of(child: &str, parent: &str) -> bool {
    match (child, parent) {
        _ if child == parent => true,
        ("bool", "int") => true,
        ("set", "frozenset") | ("frozenset", "set") => true,
        _ => false,
    }
}

/// `issubclass(a, b)` over type names as produced by `type`; the second
/// argument may be a set of names, mirroring `isinstance`.
fn issubclass(args: &[Value]) -> Result<Value> {
    ensure_args_count("issubclass", args, 2)?;
    let child = ensure_str("issubclass", &args[0])?;
    match &args[1] {
        Value::Str(parent) => Ok(Value::Bool(subclass_of(child, parent))),
        Value::Set(parents) => {
            for parent in parents.iter() {
                let parent = ensure_str("issubclass", parent)?;
                if subclass_of(child, parent) {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        v => Err(EvaluationError::builtin(
            "issubclass",
            format!(
                "expected a type name or set of type names, got '{}'",
                v.type_name()
            ),
        )),
    }
}

fn object(args: &[Value]) -> Result<Value> {
    // Host objects can only come from the embedder; a featureless instance
    // is not constructible from rule code.
    let _ = args;
    debug!("object: result is not representable; yielding None");
    Ok(Value::Nothing)
}
