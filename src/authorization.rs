// SPDX-License-Identifier: MIT

use crate::value::Value;

use std::collections::BTreeMap;

use serde::Serialize;

/// The result of evaluating a rule.
///
/// Truthy exactly when the verdict is; equality is structural. The
/// authorization attributes set by a rule's `{{ ... }}` block (or their
/// declared defaults) are carried alongside the verdict, and reading an
/// attribute that was never set yields [`Value::Nothing`] rather than an
/// error. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Authorization {
    verdict: bool,
    attrs: BTreeMap<String, Value>,
}

impl Authorization {
    pub fn new(verdict: bool, attrs: BTreeMap<String, Value>) -> Self {
        Self { verdict, attrs }
    }

    /// A denying authorization with no attributes.
    pub fn denied() -> Self {
        Self {
            verdict: false,
            attrs: BTreeMap::new(),
        }
    }

    pub fn verdict(&self) -> bool {
        self.verdict
    }

    /// Look up an authorization attribute, defaulting to `Nothing`.
    ///
    /// Names beginning with an underscore never resolve; attribute names
    /// cannot start with one.
    pub fn attr(&self, name: &str) -> Value {
        if name.starts_with('_') {
            return Value::Nothing;
        }
        self.attrs.get(name).cloned().unwrap_or(Value::Nothing)
    }

    pub fn attrs(&self) -> &BTreeMap<String, Value> {
        &self.attrs
    }
}

impl From<&Authorization> for bool {
    fn from(a: &Authorization) -> bool {
        a.verdict
    }
}
