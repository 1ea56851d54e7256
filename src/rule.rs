// SPDX-License-Identifier: MIT

use crate::compiler::Compiler;
use crate::errors::ParseError;
use crate::instructions::Instruction;
use crate::lexer::Source;
use crate::value::Value;

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// One named policy rule: its text, its declared authorization-attribute
/// defaults, and a lazily compiled instruction stream.
///
/// Compilation happens on first use and is cached (including a failure,
/// which is deterministic); replacing the text invalidates the cache. The
/// lock makes concurrent readers safe while excluding concurrent first
/// compilations of the same rule.
#[derive(Debug)]
pub struct Rule {
    name: String,
    text: String,
    attrs: BTreeMap<String, Value>,
    doc: Option<String>,
    attr_docs: BTreeMap<String, String>,
    compiler: Compiler,
    compiled: RwLock<Option<Result<Arc<[Instruction]>, ParseError>>>,
}

impl Rule {
    /// Create a rule. Empty text compiles to a rule that always denies.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            attrs: BTreeMap::new(),
            doc: None,
            attr_docs: BTreeMap::new(),
            compiler: Compiler::new(),
            compiled: RwLock::new(None),
        }
    }

    /// Compile with a non-default [`Compiler`] configuration (e.g. with
    /// constant folding disabled, for differential testing).
    pub fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = compiler;
        *self.compiled.get_mut() = None;
        self
    }

    /// Declare default values for authorization attributes. Names starting
    /// with an underscore are never valid attribute names and are dropped.
    pub fn with_attrs(mut self, attrs: BTreeMap<String, Value>) -> Self {
        self.attrs = attrs
            .into_iter()
            .filter(|(name, _)| !name.starts_with('_'))
            .collect();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, default: Value) -> Self {
        let name = name.into();
        if !name.starts_with('_') {
            self.attrs.insert(name, default);
        }
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_attr_doc(mut self, name: impl Into<String>, doc: impl Into<String>) -> Self {
        self.attr_docs.insert(name.into(), doc.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attrs(&self) -> &BTreeMap<String, Value> {
        &self.attrs
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn attr_docs(&self) -> &BTreeMap<String, String> {
        &self.attr_docs
    }

    /// Replace the rule text, dropping any cached compilation.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        *self.compiled.get_mut() = None;
    }

    /// The compiled instruction stream, compiling on first use.
    pub fn instructions(&self) -> Result<Arc<[Instruction]>, ParseError> {
        if let Some(result) = &*self.compiled.read() {
            return result.clone();
        }
        let mut slot = self.compiled.write();
        if let Some(result) = &*slot {
            return result.clone();
        }
        let result = Source::from_contents(format!("<rule {}>", self.name), self.text.clone())
            .and_then(|source| self.compiler.compile(&source))
            .map(Arc::from);
        *slot = Some(result.clone());
        result
    }
}

impl Clone for Rule {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            text: self.text.clone(),
            attrs: self.attrs.clone(),
            doc: self.doc.clone(),
            attr_docs: self.attr_docs.clone(),
            compiler: self.compiler.clone(),
            compiled: RwLock::new(self.compiled.read().clone()),
        }
    }
}

/// Human-readable documentation for a declared rule and its attributes.
/// Opaque to the evaluation core.
#[derive(Debug, Clone)]
pub struct RuleDoc {
    name: String,
    doc: Option<String>,
    attr_docs: BTreeMap<String, String>,
}

impl RuleDoc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            attr_docs: BTreeMap::new(),
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_attr_doc(mut self, name: impl Into<String>, doc: impl Into<String>) -> Self {
        self.attr_docs.insert(name.into(), doc.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn attr_doc(&self, name: &str) -> Option<&str> {
        self.attr_docs.get(name).map(String::as_str)
    }

    pub fn attr_docs(&self) -> &BTreeMap<String, String> {
        &self.attr_docs
    }
}
