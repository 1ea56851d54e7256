// SPDX-License-Identifier: MIT

use crate::authorization::Authorization;
use crate::errors::EvaluationError;
use crate::evaluator::PolicyContext;
use crate::object::HostObject;

use core::cmp::Ordering;
use core::fmt;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

/// A function value reachable from rule code.
///
/// `Normal` functions receive their arguments and return a value, which the
/// evaluator pushes. `ContextWanting` functions receive the evaluation
/// context as well and manage the stack themselves; the evaluator pushes
/// nothing on their behalf. The distinction is a type, not a runtime flag,
/// so the evaluator dispatches on the variant.
#[derive(Clone)]
pub enum Function {
    Normal(Arc<dyn Fn(&[Value]) -> Result<Value, EvaluationError> + Send + Sync>),
    ContextWanting(
        Arc<
            dyn for<'a, 'b> Fn(&'b mut PolicyContext<'a>, Vec<Value>) -> Result<(), EvaluationError>
                + Send
                + Sync,
        >,
    ),
}

impl Function {
    pub fn normal(
        f: impl Fn(&[Value]) -> Result<Value, EvaluationError> + Send + Sync + 'static,
    ) -> Self {
        Self::Normal(Arc::new(f))
    }

    pub fn context_wanting(
        f: impl for<'a, 'b> Fn(&'b mut PolicyContext<'a>, Vec<Value>) -> Result<(), EvaluationError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self::ContextWanting(Arc::new(f))
    }

    pub fn is_context_wanting(&self) -> bool {
        matches!(self, Self::ContextWanting(_))
    }

    /// Stable identity used for equality, ordering and hashing.
    fn id(&self) -> usize {
        match self {
            Self::Normal(f) => Arc::as_ptr(f) as *const () as usize,
            Self::ContextWanting(f) => Arc::as_ptr(f) as *const () as usize,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal(_) => f.write_str("<function>"),
            Self::ContextWanting(_) => f.write_str("<context function>"),
        }
    }
}

/// A runtime value flowing through the evaluation stack.
///
/// `Nothing` doubles as the "unresolved" sentinel: a name that cannot be
/// resolved, or an attribute a host object does not have, evaluates to it
/// rather than raising.
#[derive(Debug, Clone)]
pub enum Value {
    Nothing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    Set(Arc<BTreeSet<Value>>),
    Object(Arc<dyn HostObject>),
    Function(Function),
    Authorization(Arc<Authorization>),
}

/// Numeric view used for cross-type comparison. Booleans count as integers,
/// as they do in Python.
enum Num {
    Int(i64),
    Float(f64),
}

fn num_cmp(a: &Num, b: &Num) -> Ordering {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => x.cmp(y),
        (Num::Int(x), Num::Float(y)) => float_cmp(*x as f64, *y),
        (Num::Float(x), Num::Int(y)) => float_cmp(*x, *y as f64),
        (Num::Float(x), Num::Float(y)) => float_cmp(*x, *y),
    }
}

fn float_cmp(a: f64, b: f64) -> Ordering {
    // total_cmp alone would order -0.0 before 0.0; partial_cmp keeps the
    // usual numeric equality and total_cmp handles NaN.
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

impl Value {
    pub fn new_set() -> Value {
        Value::from(BTreeSet::new())
    }

    pub fn from_set(s: BTreeSet<Value>) -> Value {
        Value::from(s)
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Value::Nothing)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_ref()),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<Value>> {
        match self {
            Value::Set(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn HostObject>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_authorization(&self) -> Option<&Authorization> {
        match self {
            Value::Authorization(a) => Some(a.as_ref()),
            _ => None,
        }
    }

    /// Truth value in the sense of the policy language: the unit value,
    /// `False`, numeric zero and empty strings/bytes/sets are false;
    /// everything else is true unless a host object overrides `truthy`.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Nothing => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Set(s) => !s.is_empty(),
            Value::Object(o) => o.truthy(),
            Value::Function(_) => true,
            Value::Authorization(a) => a.verdict(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nothing => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Set(_) => "frozenset",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Authorization(_) => "Authorization",
        }
    }

    fn num(&self) -> Option<Num> {
        match self {
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Int(n) => Some(Num::Int(*n)),
            Value::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Nothing => 0,
            // Numeric variants share a rank so they can compare across types.
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => 1,
            Value::Str(_) => 2,
            Value::Bytes(_) => 3,
            Value::Set(_) => 4,
            Value::Object(_) => 5,
            Value::Function(_) => 6,
            Value::Authorization(_) => 7,
        }
    }

    /// The repr-style rendering: like `Display`, but strings keep their
    /// quotes. Set elements always render in this form.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => {
                let escaped = s
                    .replace('\\', "\\\\")
                    .replace('\'', "\\'")
                    .replace('\n', "\\n")
                    .replace('\r', "\\r")
                    .replace('\t', "\\t");
                format!("'{escaped}'")
            }
            _ => format!("{self}"),
        }
    }

    /// Hash in the sense of the `hash` builtin. Numerically equal values
    /// hash alike; host objects supply theirs through the capability set.
    pub fn hash_value(&self) -> Result<u64, EvaluationError> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.feed_hash(&mut hasher)?;
        Ok(hasher.finish())
    }

    fn feed_hash(&self, hasher: &mut impl Hasher) -> Result<(), EvaluationError> {
        match self {
            Value::Nothing => 0u8.hash(hasher),
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => {
                1u8.hash(hasher);
                match self.num() {
                    Some(Num::Int(n)) => n.hash(hasher),
                    Some(Num::Float(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        (f as i64).hash(hasher)
                    }
                    Some(Num::Float(f)) => f.to_bits().hash(hasher),
                    None => (),
                }
            }
            Value::Str(s) => {
                2u8.hash(hasher);
                s.hash(hasher);
            }
            Value::Bytes(b) => {
                3u8.hash(hasher);
                b.hash(hasher);
            }
            Value::Set(s) => {
                4u8.hash(hasher);
                for v in s.iter() {
                    v.feed_hash(hasher)?;
                }
            }
            Value::Object(o) => {
                let h = o
                    .hash_value()
                    .map_err(|_| EvaluationError::MissingCapability { capability: "hash" })?;
                5u8.hash(hasher);
                h.hash(hasher);
            }
            Value::Function(f) => {
                6u8.hash(hasher);
                f.id().hash(hasher);
            }
            Value::Authorization(a) => {
                7u8.hash(hasher);
                a.verdict().hash(hasher);
                for (k, v) in a.attrs() {
                    k.hash(hasher);
                    v.feed_hash(hasher)?;
                }
            }
        }
        Ok(())
    }
}

// The total order below exists so values can live in sets; it is internal
// bookkeeping. The policy language's own `<`/`==` operators are typed and
// live in the arith module.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        if let (Some(a), Some(b)) = (self.num(), other.num()) {
            return num_cmp(&a, &b);
        }
        self.rank().cmp(&other.rank()).then_with(|| {
            match (self, other) {
                (Value::Str(a), Value::Str(b)) => a.cmp(b),
                (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
                (Value::Set(a), Value::Set(b)) => a.cmp(b),
                (Value::Object(a), Value::Object(b)) => {
                    let pa = Arc::as_ptr(a) as *const () as usize;
                    let pb = Arc::as_ptr(b) as *const () as usize;
                    pa.cmp(&pb)
                }
                (Value::Function(a), Value::Function(b)) => a.id().cmp(&b.id()),
                (Value::Authorization(a), Value::Authorization(b)) => a.cmp(b),
                // Same rank implies same (or numeric) variant.
                _ => Ordering::Equal,
            }
        })
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nothing => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) if x.is_nan() => f.write_str("nan"),
            Value::Float(x) if x.is_infinite() => {
                f.write_str(if *x > 0.0 { "inf" } else { "-inf" })
            }
            Value::Float(x) if x.fract() == 0.0 && x.abs() < 1e16 => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Bytes(b) => {
                f.write_str("b'")?;
                for byte in b.iter() {
                    match byte {
                        b'\\' => f.write_str("\\\\")?,
                        b'\'' => f.write_str("\\'")?,
                        0x20..=0x7e => write!(f, "{}", *byte as char)?,
                        _ => write!(f, "\\x{byte:02x}")?,
                    }
                }
                f.write_str("'")
            }
            Value::Set(s) if s.is_empty() => f.write_str("set()"),
            Value::Set(s) => {
                f.write_str("{")?;
                for (i, v) in s.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&v.repr())?;
                }
                f.write_str("}")
            }
            Value::Object(o) => f.write_str(&o.repr()),
            Value::Function(_) => f.write_str("<function>"),
            Value::Authorization(a) => {
                write!(f, "authorization({})", if a.verdict() { "True" } else { "False" })
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Nothing => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s.as_ref()),
            Value::Bytes(b) => {
                let mut seq = serializer.serialize_seq(Some(b.len()))?;
                for byte in b.iter() {
                    seq.serialize_element(byte)?;
                }
                seq.end()
            }
            Value::Set(s) => {
                let mut seq = serializer.serialize_seq(Some(s.len()))?;
                for v in s.iter() {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            // Opaque values serialize as marker strings.
            Value::Object(o) => serializer.serialize_str(&o.repr()),
            Value::Function(_) => serializer.serialize_str("<function>"),
            Value::Authorization(a) => a.serialize(serializer),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b.into())
    }
}

impl From<BTreeSet<Value>> for Value {
    fn from(s: BTreeSet<Value>) -> Self {
        Value::Set(Arc::new(s))
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Authorization> for Value {
    fn from(a: Authorization) -> Self {
        Value::Authorization(Arc::new(a))
    }
}

impl From<Arc<dyn HostObject>> for Value {
    fn from(o: Arc<dyn HostObject>) -> Self {
        Value::Object(o)
    }
}
