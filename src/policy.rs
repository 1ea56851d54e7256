// SPDX-License-Identifier: MIT

use crate::authorization::Authorization;
use crate::builtins;
use crate::errors::{Error, EvaluationError, ParseError};
use crate::evaluator::{self, PolicyContext, DEFAULT_INSTRUCTION_LIMIT};
use crate::rule::{Rule, RuleDoc};
use crate::value::{Function, Value};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

/// Resolves names against externally installed functions ("entrypoints").
///
/// The core never discovers plug-ins itself; embedders back this trait
/// with whatever mechanism their application uses and inject it via
/// [`Policy::with_resolver`]. Results are memoized per policy, including
/// misses, so a resolver is consulted at most once per name.
pub trait EntrypointResolver: Send + Sync {
    fn resolve(&self, group: &str, name: &str) -> Option<Function>;
}

/// A registry of named rules with their declared defaults, documentation,
/// builtin functions and entrypoint configuration.
///
/// The entry point is [`Policy::evaluate`]: look up (compiling if needed)
/// the named rule, run its instruction stream on a fresh per-call
/// [`PolicyContext`], and return the resulting [`Authorization`].
///
/// The rule table and builtin map are read-mostly after setup: evaluation
/// takes `&self`, and the interior caches (lazy rule compilation, memoized
/// entrypoint lookups) are individually locked, so a `Policy` can be shared
/// across threads.
#[derive(Debug)]
pub struct Policy {
    group: Option<String>,
    resolver: Option<Arc<dyn EntrypointResolver>>,
    builtins: HashMap<String, Value>,
    rules: HashMap<String, Rule>,
    defaults: HashMap<String, Rule>,
    docs: HashMap<String, RuleDoc>,
    entrypoint_cache: RwLock<HashMap<String, Value>>,
    instruction_limit: usize,
}

impl core::fmt::Debug for dyn EntrypointResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("<entrypoint resolver>")
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy {
    pub fn new() -> Self {
        let mut builtins: HashMap<String, Value> = builtins::BUILTINS
            .iter()
            .map(|(name, f)| ((*name).to_string(), Value::Function(Function::normal(*f))))
            .collect();
        builtins.insert(
            "rule".to_string(),
            Value::Function(Function::context_wanting(rule_builtin)),
        );
        Self {
            group: None,
            resolver: None,
            builtins,
            rules: HashMap::new(),
            defaults: HashMap::new(),
            docs: HashMap::new(),
            entrypoint_cache: RwLock::new(HashMap::new()),
            instruction_limit: DEFAULT_INSTRUCTION_LIMIT,
        }
    }

    /// Set the entrypoint group consulted (through the injected resolver)
    /// for names not found among variables or builtins.
    pub fn with_entrypoint_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn EntrypointResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replace the builtin map entirely. The `rule` builtin is re-added
    /// unless the override map provides its own.
    pub fn with_builtins(mut self, builtins: HashMap<String, Value>) -> Self {
        self.builtins = builtins;
        self.builtins
            .entry("rule".to_string())
            .or_insert_with(|| Value::Function(Function::context_wanting(rule_builtin)));
        self
    }

    /// Add or override a single builtin.
    pub fn with_builtin(mut self, name: impl Into<String>, value: Value) -> Self {
        self.builtins.insert(name.into(), value);
        self
    }

    /// Override the per-evaluation instruction budget.
    pub fn with_instruction_limit(mut self, limit: usize) -> Self {
        self.instruction_limit = limit;
        self
    }

    pub(crate) fn instruction_limit(&self) -> usize {
        self.instruction_limit
    }

    /// Install a rule, replacing any previous rule of the same name.
    /// Declared defaults for the name are untouched.
    pub fn set_rule(&mut self, rule: Rule) {
        self.rules.insert(rule.name().to_string(), rule);
    }

    /// Install a rule from bare text, surfacing parse errors immediately
    /// instead of at first evaluation.
    pub fn set_rule_text(&mut self, name: &str, text: &str) -> Result<(), ParseError> {
        let rule = Rule::new(name, text);
        rule.instructions()?;
        self.rules.insert(name.to_string(), rule);
        Ok(())
    }

    /// Look up a rule: installed rules first, then declared defaults.
    pub fn get_rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name).or_else(|| self.defaults.get(name))
    }

    /// Remove an installed rule, re-exposing a declared default if one
    /// exists. Returns the removed rule.
    pub fn del_rule(&mut self, name: &str) -> Option<Rule> {
        self.rules.remove(name)
    }

    /// Names of all known rules, installed or declared.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        let mut names: BTreeSet<&str> = self.rules.keys().map(String::as_str).collect();
        names.extend(self.defaults.keys().map(String::as_str));
        names.into_iter()
    }

    pub fn len(&self) -> usize {
        self.rule_names().count()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.defaults.is_empty()
    }

    /// Register a declaration: a default rule (possibly with empty text),
    /// attribute defaults, and documentation.
    pub fn declare(&mut self, declaration: Declaration) {
        let Declaration {
            name,
            text,
            attrs,
            doc,
            attr_docs,
        } = declaration;
        let mut rule = Rule::new(name.clone(), text).with_attrs(attrs);
        if let Some(doc) = &doc {
            rule = rule.with_doc(doc.clone());
        }
        let mut rule_doc = RuleDoc::new(name.clone());
        if let Some(doc) = doc {
            rule_doc = rule_doc.with_doc(doc);
        }
        for (attr, doc) in attr_docs {
            rule = rule.with_attr_doc(attr.clone(), doc.clone());
            rule_doc = rule_doc.with_attr_doc(attr, doc);
        }
        self.defaults.insert(name.clone(), rule);
        self.docs.insert(name, rule_doc);
    }

    /// True when `declare` has been called for `name`, regardless of any
    /// installed rule.
    pub fn declared(&self, name: &str) -> bool {
        self.defaults.contains_key(name)
    }

    pub fn get_default(&self, name: &str) -> Option<&Rule> {
        self.defaults.get(name)
    }

    pub fn get_doc(&self, name: &str) -> Option<&RuleDoc> {
        self.docs.get(name)
    }

    pub fn get_docs(&self) -> impl Iterator<Item = &RuleDoc> {
        self.docs.values()
    }

    /// Resolve a name against builtins, then memoized entrypoints.
    pub(crate) fn resolve_name(&self, name: &str) -> Value {
        if let Some(v) = self.builtins.get(name) {
            return v.clone();
        }
        let (Some(group), Some(resolver)) = (&self.group, &self.resolver) else {
            return Value::Nothing;
        };
        if let Some(v) = self.entrypoint_cache.read().get(name) {
            return v.clone();
        }
        // Misses are memoized as Nothing so the resolver runs once per name.
        let resolved = resolver
            .resolve(group, name)
            .map(Value::Function)
            .unwrap_or(Value::Nothing);
        self.entrypoint_cache
            .write()
            .insert(name.to_string(), resolved.clone());
        resolved
    }

    /// Merged authorization-attribute defaults for a rule: declared
    /// defaults first, overlaid by the installed rule's own.
    pub(crate) fn rule_defaults(&self, name: &str) -> BTreeMap<String, Value> {
        let mut attrs = BTreeMap::new();
        if let Some(default) = self.defaults.get(name) {
            attrs.extend(default.attrs().clone());
        }
        if let Some(rule) = self.rules.get(name) {
            attrs.extend(rule.attrs().clone());
        }
        attrs
    }

    /// Evaluate a named rule with the given variable bindings.
    ///
    /// A name with neither an installed rule nor a declaration yields a
    /// denying authorization, not an error. Parse and evaluation failures
    /// are errors, distinct from a rule that merely evaluates falsy.
    pub fn evaluate(
        &self,
        name: &str,
        variables: HashMap<String, Value>,
    ) -> Result<Authorization, Error> {
        let mut ctx = PolicyContext::new(self, variables);
        self.evaluate_in(&mut ctx, name)
    }

    /// Evaluate a named rule on a caller-supplied context. This is the
    /// injection seam for tests that need to observe or pre-load the
    /// context.
    pub fn evaluate_in(
        &self,
        ctx: &mut PolicyContext<'_>,
        name: &str,
    ) -> Result<Authorization, Error> {
        let Some(rule) = self.get_rule(name) else {
            return Ok(Authorization::denied());
        };
        let prog = rule.instructions()?;
        ctx.push_frame(name, self.rule_defaults(name))
            .map_err(Error::Eval)?;
        let outcome = evaluator::run(ctx, &prog);
        ctx.pop_frame();
        outcome.map_err(Error::Eval)?;
        match ctx.pop().map_err(Error::Eval)? {
            Value::Authorization(authz) => {
                let authz = authz.as_ref().clone();
                ctx.set_authorization(authz.clone());
                Ok(authz)
            }
            _ => Err(Error::Eval(EvaluationError::NoAuthorization)),
        }
    }
}

/// Arguments to [`Policy::declare`].
#[derive(Debug, Clone, Default)]
pub struct Declaration {
    name: String,
    text: String,
    attrs: BTreeMap<String, Value>,
    doc: Option<String>,
    attr_docs: BTreeMap<String, String>,
}

impl Declaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Default value for an authorization attribute.
    pub fn attr(mut self, name: impl Into<String>, default: Value) -> Self {
        let name = name.into();
        if !name.starts_with('_') {
            self.attrs.insert(name, default);
        }
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn attr_doc(mut self, name: impl Into<String>, doc: impl Into<String>) -> Self {
        self.attr_docs.insert(name.into(), doc.into());
        self
    }
}

/// The `rule` builtin: evaluate another rule by name on the same context.
///
/// Results are memoized in the context's rule cache, so a rule invoked N
/// times during one evaluation runs once. A missing, unparsable or failing
/// sub-rule denies instead of failing the outer evaluation. Re-entering a
/// rule already on the evaluation path terminates with a denial that is
/// deliberately not cached, so the rule can still succeed later on a
/// different path.
fn rule_builtin(ctx: &mut PolicyContext<'_>, args: Vec<Value>) -> Result<(), EvaluationError> {
    let Some(Value::Str(name)) = args.first() else {
        warn!(caller = ?ctx.current_rule(), "rule() requires a rule name string; denying");
        ctx.push(Value::from(Authorization::denied()));
        return Ok(());
    };
    let name = name.to_string();

    if let Some(cached) = ctx.cached_rule(&name) {
        ctx.push(cached);
        return Ok(());
    }

    if ctx.on_path(&name) {
        warn!(
            rule = %name,
            caller = ?ctx.current_rule(),
            "rule recursion detected; denying nested evaluation"
        );
        ctx.push(Value::from(Authorization::denied()));
        return Ok(());
    }

    let policy = ctx.policy();
    let Some(rule) = policy.get_rule(&name) else {
        warn!(
            rule = %name,
            caller = ?ctx.current_rule(),
            "evaluation of unknown rule requested; denying"
        );
        let denial = Value::from(Authorization::denied());
        ctx.cache_rule(&name, denial.clone());
        ctx.push(denial);
        return Ok(());
    };

    let prog = match rule.instructions() {
        Ok(prog) => prog,
        Err(err) => {
            warn!(rule = %name, error = %err, "nested rule failed to parse; denying");
            let denial = Value::from(Authorization::denied());
            ctx.cache_rule(&name, denial.clone());
            ctx.push(denial);
            return Ok(());
        }
    };

    if let Err(err) = ctx.push_frame(&name, policy.rule_defaults(&name)) {
        warn!(rule = %name, error = %err, "rule nesting too deep; denying");
        ctx.push(Value::from(Authorization::denied()));
        return Ok(());
    }
    let stack_len = ctx.stack_len();
    let outcome = evaluator::run(ctx, &prog);
    ctx.pop_frame();

    match outcome {
        Ok(()) => {
            // The sub-rule left its authorization on the stack; that is our
            // result. Remember it for this evaluation.
            if let Ok(result) = ctx.top() {
                let result = result.clone();
                ctx.cache_rule(&name, result);
            }
        }
        Err(err) => {
            warn!(rule = %name, error = %err, "nested rule evaluation failed; denying");
            ctx.truncate_stack(stack_len);
            let denial = Value::from(Authorization::denied());
            ctx.cache_rule(&name, denial.clone());
            ctx.push(denial);
        }
    }
    Ok(())
}
