// SPDX-License-Identifier: MIT

mod aggregates;
mod conversions;
mod numbers;
mod types;
pub(crate) mod utils;

use crate::errors::EvaluationError;
use crate::value::Value;

use std::collections::HashMap;

use lazy_static::lazy_static;

/// Signature of a default builtin. Builtins that need the evaluation
/// context (only `rule`, installed by the policy itself) use the
/// context-wanting calling convention instead.
pub type BuiltinFcn = fn(&[Value]) -> Result<Value, EvaluationError>;

lazy_static! {
    /// The default builtin roster, mirroring the usual interpreter
    /// builtins as far as this value model can express them.
    pub static ref BUILTINS: HashMap<&'static str, BuiltinFcn> = {
        let mut m: HashMap<&'static str, BuiltinFcn> = HashMap::new();
        aggregates::register(&mut m);
        conversions::register(&mut m);
        numbers::register(&mut m);
        types::register(&mut m);
        m
    };
}
