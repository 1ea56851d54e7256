// SPDX-License-Identifier: MIT

#![cfg(test)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use policyrus::{
    Declaration, EntrypointResolver, Error, Function, Policy, PolicyContext, Rule, Value,
};

fn no_vars() -> HashMap<String, Value> {
    HashMap::new()
}

#[test]
fn evaluate_unknown_rule_denies() -> Result<()> {
    let policy = Policy::new();
    let authz = policy.evaluate("nope", no_vars())?;
    assert!(!authz.verdict());
    assert!(authz.attrs().is_empty());
    Ok(())
}

#[test]
fn set_get_del_rule() -> Result<()> {
    let mut policy = Policy::new();
    policy.declare(Declaration::new("r").text("True"));
    policy.set_rule(Rule::new("r", "False"));

    // The installed rule wins over the declared default...
    assert!(!policy.evaluate("r", no_vars())?.verdict());
    assert_eq!(policy.get_rule("r").unwrap().text(), "False");

    // ...and deleting it re-exposes the default.
    let removed = policy.del_rule("r").unwrap();
    assert_eq!(removed.text(), "False");
    assert!(policy.evaluate("r", no_vars())?.verdict());
    assert!(policy.declared("r"));
    assert_eq!(policy.get_default("r").unwrap().text(), "True");
    Ok(())
}

#[test]
fn rule_names_cover_installed_and_declared() {
    let mut policy = Policy::new();
    policy.declare(Declaration::new("a"));
    policy.set_rule(Rule::new("b", "True"));
    policy.set_rule(Rule::new("a", "True"));
    let names: Vec<&str> = policy.rule_names().collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(policy.len(), 2);
    assert!(!policy.is_empty());
}

#[test]
fn set_rule_text_surfaces_parse_errors_eagerly() {
    let mut policy = Policy::new();
    let err = policy.set_rule_text("bad", "user.admin {{").unwrap_err();
    assert!(err.message.contains("attribute name"), "{}", err.message);
    assert!(policy.get_rule("bad").is_none());

    assert!(policy.set_rule_text("good", "True").is_ok());
    assert!(policy.get_rule("good").is_some());
}

#[test]
fn rule_recompiles_after_text_change() -> Result<()> {
    let mut rule = Rule::new("r", "True");
    assert_eq!(rule.instructions()?.len(), 2);
    rule.set_text("x and y");
    assert_eq!(rule.instructions()?.len(), 4);
    Ok(())
}

#[test]
fn docs_registry() {
    let mut policy = Policy::new();
    policy.declare(
        Declaration::new("upd")
            .text("user == target")
            .doc("Who may update a record.")
            .attr("payment", Value::Bool(false))
            .attr_doc("payment", "Whether payment fields may change."),
    );
    let doc = policy.get_doc("upd").unwrap();
    assert_eq!(doc.name(), "upd");
    assert_eq!(doc.doc(), Some("Who may update a record."));
    assert_eq!(
        doc.attr_doc("payment"),
        Some("Whether payment fields may change.")
    );
    assert_eq!(policy.get_docs().count(), 1);
    assert!(policy.get_doc("other").is_none());
}

#[derive(Debug, Default)]
struct Registry {
    calls: AtomicUsize,
}

impl EntrypointResolver for Registry {
    fn resolve(&self, group: &str, name: &str) -> Option<Function> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (group == "acme.policies" && name == "greet")
            .then(|| Function::normal(|_args: &[Value]| Ok(Value::from("hi"))))
    }
}

#[test]
fn entrypoint_resolution_is_memoized() -> Result<()> {
    let registry = Arc::new(Registry::default());
    let mut policy = Policy::new()
        .with_entrypoint_group("acme.policies")
        .with_resolver(registry.clone());
    policy.set_rule(Rule::new("r", "greet() == 'hi'"));

    assert!(policy.evaluate("r", no_vars())?.verdict());
    assert!(policy.evaluate("r", no_vars())?.verdict());
    // Resolved once, then served from the cache.
    assert_eq!(registry.calls.load(Ordering::SeqCst), 1);

    // Negative results are memoized too.
    policy.set_rule(Rule::new("m", "missing_fn == None"));
    assert!(policy.evaluate("m", no_vars())?.verdict());
    assert!(policy.evaluate("m", no_vars())?.verdict());
    assert_eq!(registry.calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn entrypoints_skipped_without_group() -> Result<()> {
    let registry = Arc::new(Registry::default());
    let mut policy = Policy::new().with_resolver(registry.clone());
    policy.set_rule(Rule::new("r", "greet == None"));
    assert!(policy.evaluate("r", no_vars())?.verdict());
    assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn builtin_override_map_replaces_defaults() -> Result<()> {
    let mut builtins = HashMap::new();
    builtins.insert(
        "truth".to_string(),
        Value::Function(Function::normal(|_args: &[Value]| Ok(Value::Bool(true)))),
    );
    let mut policy = Policy::new().with_builtins(builtins);

    policy.set_rule(Rule::new("a", "truth()"));
    assert!(policy.evaluate("a", no_vars())?.verdict());

    // The stock builtins are gone...
    policy.set_rule(Rule::new("b", "len == None"));
    assert!(policy.evaluate("b", no_vars())?.verdict());

    // ...but `rule` is always present.
    policy.set_rule(Rule::new("c", r#"not rule("nope")"#));
    assert!(policy.evaluate("c", no_vars())?.verdict());
    Ok(())
}

#[test]
fn caller_supplied_context_is_usable() -> Result<()> {
    let mut policy = Policy::new();
    policy.set_rule(Rule::new("r", "x == 1"));
    let policy = policy;

    let mut ctx = PolicyContext::new(&policy, no_vars());
    assert!(ctx.authorization().is_none());
    let mut vars = no_vars();
    vars.insert("x".to_string(), Value::Int(1));
    let mut ctx2 = PolicyContext::new(&policy, vars);
    let authz = policy.evaluate_in(&mut ctx2, "r")?;
    assert!(authz.verdict());
    assert_eq!(ctx2.authorization(), Some(&authz));
    assert_eq!(ctx2.stack_len(), 0);

    let authz = policy.evaluate_in(&mut ctx, "r")?;
    assert!(!authz.verdict());
    Ok(())
}

#[test]
fn evaluation_is_deterministic() -> Result<()> {
    let mut policy = Policy::new();
    policy.set_rule(Rule::new(
        "r",
        "x > 2 and x in {3, 4, 5} {{ spare = x - 3 }}",
    ));
    let mut vars = no_vars();
    vars.insert("x".to_string(), Value::Int(4));
    let first = policy.evaluate("r", vars.clone())?;
    let second = policy.evaluate("r", vars)?;
    assert_eq!(first, second);
    assert_eq!(first.attr("spare"), Value::Int(1));
    Ok(())
}

#[test]
fn policies_are_shareable_across_threads() -> Result<()> {
    let mut policy = Policy::new();
    policy.set_rule(Rule::new("r", "x * 2 == 10"));
    let policy = Arc::new(policy);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let policy = policy.clone();
            scope.spawn(move || {
                for _ in 0..50 {
                    let mut vars = HashMap::new();
                    vars.insert("x".to_string(), Value::Int(5));
                    let authz = policy.evaluate("r", vars).unwrap();
                    assert!(authz.verdict());
                }
            });
        }
    });
    Ok(())
}

#[test]
fn parse_and_eval_errors_are_distinct() {
    let mut policy = Policy::new();
    policy.set_rule(Rule::new("parse", "1 +"));
    policy.set_rule(Rule::new("eval", "1 % 0"));
    assert!(matches!(
        policy.evaluate("parse", no_vars()),
        Err(Error::Parse(_))
    ));
    assert!(matches!(
        policy.evaluate("eval", no_vars()),
        Err(Error::Eval(_))
    ));
}

#[test]
fn rule_attr_defaults_filter_underscores() {
    let rule = Rule::new("r", "True")
        .with_attr("ok", Value::Int(1))
        .with_attr("_hidden", Value::Int(2));
    assert_eq!(rule.attrs().len(), 1);
    assert!(rule.attrs().contains_key("ok"));
}
