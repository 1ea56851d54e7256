// SPDX-License-Identifier: MIT

use crate::value::Value;

use core::cmp::Ordering;
use core::fmt;

/// Marker returned by a capability an object does not provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsupported;

/// The capability contract for opaque host values.
///
/// The evaluator interacts with embedded application objects only through
/// these methods. Every capability has a default that declines it, so hosts
/// implement exactly what their rules need:
///
/// - `get_attr` backs `obj.name`. Return `Ok(Value::Nothing)` for an
///   attribute the object simply does not have; declining the capability
///   altogether fails the evaluation instead.
/// - `get_item` backs `obj[key]`, `call` backs `obj(args...)`, and
///   `contains` backs `x in obj`.
/// - `equals`, `compare` and `truthy` back `==`, the ordering operators and
///   boolean coercion. Objects default to truthy, to identity equality and
///   to being unordered.
pub trait HostObject: fmt::Debug + Send + Sync {
    fn get_attr(&self, name: &str) -> Result<Value, Unsupported> {
        let _ = name;
        Err(Unsupported)
    }

    fn get_item(&self, key: &Value) -> Result<Value, Unsupported> {
        let _ = key;
        Err(Unsupported)
    }

    fn call(&self, args: &[Value]) -> Result<Value, Unsupported> {
        let _ = args;
        Err(Unsupported)
    }

    fn contains(&self, elem: &Value) -> Result<bool, Unsupported> {
        let _ = elem;
        Err(Unsupported)
    }

    fn equals(&self, other: &Value) -> bool {
        let _ = other;
        false
    }

    fn compare(&self, other: &Value) -> Option<Ordering> {
        let _ = other;
        None
    }

    fn truthy(&self) -> bool {
        true
    }

    fn hash_value(&self) -> Result<u64, Unsupported> {
        Err(Unsupported)
    }

    /// Type name reported by the `type` builtin.
    fn type_name(&self) -> &'static str {
        "object"
    }

    /// Rendering used by `str`/`repr` and serialization.
    fn repr(&self) -> String {
        format!("<{}>", self.type_name())
    }
}
