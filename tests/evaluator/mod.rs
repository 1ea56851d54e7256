// SPDX-License-Identifier: MIT

#![cfg(test)]

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use policyrus::{
    Authorization, Declaration, Error, EvaluationError, Function, HostObject, Policy,
    PolicyContext, Rule, Unsupported, Value,
};

/// A host object standing in for an application user record.
#[derive(Debug)]
struct User {
    name: &'static str,
    admin: bool,
    groups: Vec<&'static str>,
}

impl HostObject for User {
    fn get_attr(&self, name: &str) -> Result<Value, Unsupported> {
        Ok(match name {
            "name" => Value::from(self.name),
            "admin" => Value::Bool(self.admin),
            "spam" => Value::Int(10),
            "is_admin" => {
                let admin = self.admin;
                Value::Function(Function::normal(move |_args: &[Value]| {
                    Ok(Value::Bool(admin))
                }))
            }
            "in_group" => {
                let groups = self.groups.clone();
                Value::Function(Function::normal(move |args: &[Value]| {
                    let name = args.first().and_then(|v| v.as_str());
                    Ok(Value::Bool(
                        name.is_some_and(|n| groups.iter().any(|g| *g == n)),
                    ))
                }))
            }
            _ => Value::Nothing,
        })
    }

    fn equals(&self, other: &Value) -> bool {
        match other {
            Value::Object(o) => o.get_attr("name") == Ok(Value::from(self.name)),
            _ => false,
        }
    }

    fn type_name(&self) -> &'static str {
        "User"
    }
}

fn user(name: &'static str, admin: bool, groups: &[&'static str]) -> Value {
    Value::Object(Arc::new(User {
        name,
        admin,
        groups: groups.to_vec(),
    }))
}

/// An object whose every capability is declined: touching it during
/// evaluation is an error, which is what the short-circuit tests rely on.
#[derive(Debug)]
struct Untouchable;

impl HostObject for Untouchable {}

fn untouchable() -> Value {
    Value::Object(Arc::new(Untouchable))
}

fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn eval_rule(text: &str, bindings: &[(&str, Value)]) -> Result<Authorization, Error> {
    let mut policy = Policy::new();
    policy.set_rule(Rule::new("r", text));
    policy.evaluate("r", vars(bindings))
}

fn verdict(text: &str, bindings: &[(&str, Value)]) -> bool {
    eval_rule(text, bindings)
        .unwrap_or_else(|err| panic!("rule {text:?} failed: {err}"))
        .verdict()
}

/// Evaluate `expr` as an authorization attribute so the raw value (not
/// just its truthiness) can be observed.
fn eval_expr(expr: &str, bindings: &[(&str, Value)]) -> Value {
    let text = format!("{{{{ v = {expr} }}}}");
    eval_rule(&text, bindings)
        .unwrap_or_else(|err| panic!("expression {expr:?} failed: {err}"))
        .attr("v")
}

fn set_of(items: &[Value]) -> Value {
    Value::from_set(items.iter().cloned().collect::<BTreeSet<Value>>())
}

#[test]
fn admin_or_owner_is_authorized() {
    // user.is_admin() returns True; target bound but irrelevant.
    let authz = eval_rule(
        "user.is_admin() or user == target",
        &[
            ("user", user("kevin", true, &[])),
            ("target", user("alice", false, &[])),
        ],
    )
    .unwrap();
    assert!(authz.verdict());
    assert!(authz.attrs().is_empty());
}

#[test]
fn attribute_carries_sub_decision() {
    // Owner but not admin: authorized, but payment stays False.
    let u = user("kevin", false, &[]);
    let authz = eval_rule(
        "user.is_admin() or user == target {{ payment = user.is_admin() }}",
        &[("user", u.clone()), ("target", u)],
    )
    .unwrap();
    assert!(authz.verdict());
    assert_eq!(authz.attr("payment"), Value::Bool(false));
}

#[test]
fn nested_rule_grants_update() {
    let mut policy = Policy::new();
    policy.set_rule(Rule::new(
        "adm",
        r#"user.in_group("admins") and user.admin"#,
    ));
    policy.set_rule(Rule::new("upd", r#"user == target or rule("adm")"#));
    let authz = policy
        .evaluate(
            "upd",
            vars(&[
                ("user", user("kevin", true, &["admins"])),
                ("target", user("alice", false, &[])),
            ]),
        )
        .unwrap();
    assert!(authz.verdict());
}

#[test]
fn nested_rule_is_memoized() {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = counter.clone();
    let mut policy = Policy::new().with_builtin(
        "tick",
        Value::Function(Function::context_wanting(
            move |ctx: &mut PolicyContext<'_>, _args: Vec<Value>| {
                seen.fetch_add(1, Ordering::SeqCst);
                ctx.push(Value::Bool(true));
                Ok(())
            },
        )),
    );
    policy.set_rule(Rule::new("b", "tick()"));
    policy.set_rule(Rule::new(
        "a",
        r#"rule("b") and rule("b") and rule("b")"#,
    ));
    assert!(policy.evaluate("a", HashMap::new()).unwrap().verdict());
    // b's body ran exactly once; the other invocations hit the cache.
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn rule_cache_is_per_evaluation() {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = counter.clone();
    let mut policy = Policy::new().with_builtin(
        "tick",
        Value::Function(Function::context_wanting(
            move |ctx: &mut PolicyContext<'_>, _args: Vec<Value>| {
                seen.fetch_add(1, Ordering::SeqCst);
                ctx.push(Value::Bool(true));
                Ok(())
            },
        )),
    );
    policy.set_rule(Rule::new("b", "tick()"));
    policy.set_rule(Rule::new("a", r#"rule("b")"#));
    policy.evaluate("a", HashMap::new()).unwrap();
    policy.evaluate("a", HashMap::new()).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn self_recursion_terminates_falsy() {
    let mut policy = Policy::new();
    policy.set_rule(Rule::new("r", r#"rule("r")"#));
    let authz = policy.evaluate("r", HashMap::new()).unwrap();
    assert!(!authz.verdict());
}

#[test]
fn transitive_recursion_terminates_falsy() {
    let mut policy = Policy::new();
    policy.set_rule(Rule::new("a", r#"rule("b")"#));
    policy.set_rule(Rule::new("b", r#"rule("a")"#));
    assert!(!policy.evaluate("a", HashMap::new()).unwrap().verdict());
}

#[test]
fn missing_nested_rule_denies_and_continues() {
    let mut policy = Policy::new();
    policy.set_rule(Rule::new("r", r#"rule("nope") or True"#));
    assert!(policy.evaluate("r", HashMap::new()).unwrap().verdict());
}

#[test]
fn failing_nested_rule_denies_and_continues() {
    let mut policy = Policy::new();
    policy.set_rule(Rule::new("boom", "x / 0"));
    policy.set_rule(Rule::new("r", r#"rule("boom") or True"#));
    let authz = policy
        .evaluate("r", vars(&[("x", Value::Int(1))]))
        .unwrap();
    assert!(authz.verdict());
}

#[test]
fn folded_constant_condition_short_circuits() {
    // 5 + 23 folds to 28 at compile time; see the compiler tests for the
    // instruction-level assertion.
    assert!(verdict(
        "5 + 23 > user.spam",
        &[("user", user("kevin", false, &[]))]
    ));
}

#[test]
fn missing_names_resolve_to_nothing() {
    let authz = eval_rule("foo.bar.baz", &[]).unwrap();
    assert!(!authz.verdict());
}

#[test]
fn short_circuit_never_touches_skipped_operand() {
    assert!(!verdict(
        "flag and bomb.anything",
        &[("flag", Value::Bool(false)), ("bomb", untouchable())]
    ));
    assert!(verdict(
        "flag or bomb.anything",
        &[("flag", Value::Bool(true)), ("bomb", untouchable())]
    ));
    assert!(verdict(
        "1 if flag else bomb.anything",
        &[("flag", Value::Bool(true)), ("bomb", untouchable())]
    ));
    // The same operand is an error when the path is taken.
    let result = eval_rule(
        "flag and bomb.anything",
        &[("flag", Value::Bool(true)), ("bomb", untouchable())],
    );
    assert!(matches!(
        result,
        Err(Error::Eval(EvaluationError::MissingCapability { .. }))
    ));
}

#[test]
fn and_or_preserve_values() {
    assert_eq!(
        eval_expr("x or y", &[("x", Value::Nothing), ("y", Value::Int(5))]),
        Value::Int(5)
    );
    assert_eq!(
        eval_expr("x and y", &[("x", Value::Int(0)), ("y", Value::Int(5))]),
        Value::Int(0)
    );
    assert_eq!(
        eval_expr("x and y", &[("x", Value::Int(1)), ("y", Value::from("ok"))]),
        Value::from("ok")
    );
}

#[test]
fn set_literals_and_membership() {
    assert!(verdict("{1, 2, 3}", &[]));
    assert!(verdict("1 in {1, 2, 3} and 4 not in {1, 2, 3}", &[]));
    assert!(verdict("{1, 2, 3} == {3, 2, 1}", &[]));
    assert!(verdict("{1} == {1.0}", &[]));
}

#[test]
fn set_operators() {
    assert_eq!(
        eval_expr("{1, 2} | {3}", &[]),
        set_of(&[Value::Int(1), Value::Int(2), Value::Int(3)])
    );
    assert_eq!(
        eval_expr("{1, 2, 3} & {2, 3, 4}", &[]),
        set_of(&[Value::Int(2), Value::Int(3)])
    );
    assert_eq!(
        eval_expr("{1, 2} ^ {2, 3}", &[]),
        set_of(&[Value::Int(1), Value::Int(3)])
    );
    assert_eq!(eval_expr("{1, 2} - {2}", &[]), set_of(&[Value::Int(1)]));
    assert!(verdict("{1} < {1, 2}", &[]));
    assert!(verdict("{1, 2} <= {1, 2}", &[]));
    assert!(!verdict("{1} > {1, 2}", &[]));
    assert!(verdict("{3} not in {{1}, {2}}", &[]));
}

#[test]
fn arithmetic_semantics() {
    let x7 = [("x", Value::Int(7))];
    assert_eq!(eval_expr("x / 2", &x7), Value::Float(3.5));
    assert_eq!(eval_expr("x // 2", &x7), Value::Int(3));
    assert_eq!(eval_expr("-x // 2", &x7), Value::Int(-4));
    assert_eq!(eval_expr("x % -3", &x7), Value::Int(-2));
    assert_eq!(eval_expr("-x % 3", &x7), Value::Int(2));
    assert_eq!(eval_expr("2 ** x", &x7), Value::Int(128));
    assert_eq!(eval_expr("2 ** -1", &[]), Value::Float(0.5));
    assert_eq!(eval_expr("x + True", &x7), Value::Int(8));
    assert_eq!(eval_expr("'ab' * 2", &[]), Value::from("abab"));
    assert_eq!(eval_expr("'a' + 'b'", &[]), Value::from("ab"));
    assert_eq!(eval_expr("x << 2", &x7), Value::Int(28));
    assert_eq!(eval_expr("-x >> 1", &x7), Value::Int(-4));
    assert_eq!(eval_expr("~x", &x7), Value::Int(-8));
}

#[test]
fn comparison_chains_associate_left() {
    // (1 < 2) < 3 is True < 3, i.e. 1 < 3.
    assert!(verdict("1 < 2 < 3", &[]));
    // (3 > 2) > 1 is True > 1, i.e. 1 > 1.
    assert!(!verdict("3 > 2 > 1", &[]));
}

#[test]
fn division_by_zero_is_an_error() {
    let result = eval_rule("x / 0", &[("x", Value::Int(1))]);
    assert!(matches!(
        result,
        Err(Error::Eval(EvaluationError::DivisionByZero))
    ));
}

#[test]
fn arithmetic_type_mismatch_is_an_error() {
    let result = eval_rule("x + 1", &[("x", Value::from("s"))]);
    assert!(matches!(
        result,
        Err(Error::Eval(EvaluationError::UnsupportedBinary { .. }))
    ));
}

#[test]
fn membership_on_non_container_is_an_error() {
    let result = eval_rule("1 in nope", &[]);
    assert!(matches!(
        result,
        Err(Error::Eval(EvaluationError::NotAContainer { .. }))
    ));
}

#[test]
fn subscription() {
    let s = [("s", Value::from("abc"))];
    assert_eq!(eval_expr("s[0]", &s), Value::from("a"));
    assert_eq!(eval_expr("s[-1]", &s), Value::from("c"));
    assert_eq!(eval_expr("s[10]", &s), Value::Nothing);
    // Subscribing a non-subscriptable degrades to Nothing.
    assert_eq!(eval_expr("x[0]", &[("x", Value::Int(3))]), Value::Nothing);

    let b = [("b", Value::from(vec![7u8, 8, 9]))];
    assert_eq!(eval_expr("b[1]", &b), Value::Int(8));
    assert!(verdict("8 in b", &b));
}

#[test]
fn calling_a_non_callable_yields_nothing() {
    assert_eq!(eval_expr("x(1, 2)", &[("x", Value::Int(3))]), Value::Nothing);
    assert_eq!(eval_expr("missing()", &[]), Value::Nothing);
}

#[test]
fn conditional_expression() {
    assert_eq!(
        eval_expr("'hi' if x else 'lo'", &[("x", Value::Bool(true))]),
        Value::from("hi")
    );
    assert_eq!(
        eval_expr("'hi' if x else 'lo'", &[("x", Value::Bool(false))]),
        Value::from("lo")
    );
}

#[test]
fn truthiness_of_values() {
    assert!(!verdict("x", &[("x", Value::Nothing)]));
    assert!(!verdict("x", &[("x", Value::Int(0))]));
    assert!(!verdict("x", &[("x", Value::Float(0.0))]));
    assert!(!verdict("x", &[("x", Value::from(""))]));
    assert!(!verdict("x", &[("x", Value::from(Vec::new()))]));
    assert!(verdict("x", &[("x", Value::Int(-1))]));
    assert!(verdict("x", &[("x", Value::from("no"))]));
    assert!(verdict("x", &[("x", user("kevin", false, &[]))]));
}

#[test]
fn declared_defaults_apply_without_block() {
    let mut policy = Policy::new();
    policy.declare(
        Declaration::new("r")
            .text("user == user")
            .attr("payment", Value::Bool(false)),
    );
    let authz = policy
        .evaluate("r", vars(&[("user", Value::Int(1))]))
        .unwrap();
    assert!(authz.verdict());
    assert_eq!(authz.attr("payment"), Value::Bool(false));
}

#[test]
fn block_assignment_overrides_declared_default() {
    let mut policy = Policy::new();
    policy.declare(Declaration::new("r").attr("payment", Value::Bool(false)));
    policy.set_rule(Rule::new("r", "True {{ payment = True }}"));
    let authz = policy.evaluate("r", HashMap::new()).unwrap();
    assert_eq!(authz.attr("payment"), Value::Bool(true));
}

#[test]
fn attribute_values_stay_raw() {
    // Attribute values are not coerced to booleans.
    assert_eq!(eval_expr("5", &[]), Value::Int(5));
    assert_eq!(
        eval_expr("x", &[("x", Value::from("value"))]),
        Value::from("value")
    );
}

#[test]
fn unknown_authorization_attribute_is_nothing() {
    let authz = eval_rule("True", &[]).unwrap();
    assert_eq!(authz.attr("anything"), Value::Nothing);
}

#[test]
fn instruction_budget_is_enforced() {
    let mut policy = Policy::new().with_instruction_limit(3);
    policy.set_rule(Rule::new("r", "x + y + z"));
    let result = policy.evaluate(
        "r",
        vars(&[
            ("x", Value::Int(1)),
            ("y", Value::Int(2)),
            ("z", Value::Int(3)),
        ]),
    );
    assert!(matches!(
        result,
        Err(Error::Eval(EvaluationError::InstructionLimitExceeded { limit: 3 }))
    ));
}

#[test]
fn parse_failure_surfaces_from_evaluate() {
    let mut policy = Policy::new();
    policy.set_rule(Rule::new("bad", "user.admin {{ _secret = 1 }}"));
    assert!(matches!(
        policy.evaluate("bad", HashMap::new()),
        Err(Error::Parse(_))
    ));
}

#[test]
fn comments_in_rules() {
    assert!(verdict("# allow everyone\nTrue", &[]));
}

#[test]
fn nested_authorization_truthiness() {
    // A nested rule() result is an Authorization; its truth value drives
    // the boolean operators and the final verdict.
    let mut policy = Policy::new();
    policy.set_rule(Rule::new("inner", "True {{ tag = 7 }}"));
    policy.set_rule(Rule::new("outer", r#"rule("inner")"#));
    let authz = policy.evaluate("outer", HashMap::new()).unwrap();
    assert!(authz.verdict());
    // Outer has no attribute block, so inner's attributes do not leak.
    assert_eq!(authz.attr("tag"), Value::Nothing);
}

#[test]
fn builtin_functions() {
    assert_eq!(eval_expr("len('abc')", &[]), Value::Int(3));
    assert_eq!(eval_expr("len({1, 2})", &[]), Value::Int(2));
    assert_eq!(eval_expr("min({3, 1, 2})", &[]), Value::Int(1));
    assert_eq!(eval_expr("max(1, 5, 3)", &[]), Value::Int(5));
    assert_eq!(eval_expr("sum({1, 2, 3})", &[]), Value::Int(6));
    assert_eq!(eval_expr("sum({1, 2}, 10)", &[]), Value::Int(13));
    assert_eq!(eval_expr("abs(-5)", &[]), Value::Int(5));
    assert_eq!(eval_expr("abs(-5.5)", &[]), Value::Float(5.5));
    assert_eq!(eval_expr("int('42')", &[]), Value::Int(42));
    assert_eq!(eval_expr("int(3.9)", &[]), Value::Int(3));
    assert_eq!(eval_expr("float(3)", &[]), Value::Float(3.0));
    assert_eq!(eval_expr("str(42)", &[]), Value::from("42"));
    assert_eq!(eval_expr("str(None)", &[]), Value::from("None"));
    assert_eq!(eval_expr("repr('a')", &[]), Value::from("'a'"));
    assert_eq!(eval_expr("bool(0)", &[]), Value::Bool(false));
    assert_eq!(eval_expr("chr(65)", &[]), Value::from("A"));
    assert_eq!(eval_expr("ord('A')", &[]), Value::Int(65));
    assert_eq!(eval_expr("hex(255)", &[]), Value::from("0xff"));
    assert_eq!(eval_expr("hex(-255)", &[]), Value::from("-0xff"));
    assert_eq!(eval_expr("oct(8)", &[]), Value::from("0o10"));
    assert_eq!(eval_expr("bin(5)", &[]), Value::from("0b101"));
    assert_eq!(eval_expr("round(2.5)", &[]), Value::Int(2));
    assert_eq!(eval_expr("round(3.5)", &[]), Value::Int(4));
    assert_eq!(eval_expr("round(2.675, 2)", &[]), Value::Float(2.67));
    assert_eq!(eval_expr("pow(2, 10)", &[]), Value::Int(1024));
    assert_eq!(eval_expr("pow(2, 10, 1000)", &[]), Value::Int(24));
}

#[test]
fn builtin_set_constructors() {
    assert_eq!(eval_expr("set()", &[]), Value::new_set());
    assert_eq!(eval_expr("len(set('aba'))", &[]), Value::Int(2));
    assert!(verdict("frozenset({1, 2}) == {1, 2}", &[]));
    assert_eq!(
        eval_expr("range(3)", &[]),
        set_of(&[Value::Int(0), Value::Int(1), Value::Int(2)])
    );
    assert!(verdict("2 in range(3)", &[]));
    assert_eq!(
        eval_expr("range(5, 1, -2)", &[]),
        set_of(&[Value::Int(5), Value::Int(3)])
    );
    assert_eq!(eval_expr("sorted({2, 1})", &[]), set_of(&[Value::Int(1), Value::Int(2)]));
}

#[test]
fn builtin_type_inspection() {
    assert!(verdict("isinstance(3, 'int')", &[]));
    assert!(verdict("isinstance(True, 'int')", &[]));
    assert!(verdict("isinstance({1}, 'set')", &[]));
    assert!(verdict("isinstance(3.5, {'int', 'float'})", &[]));
    assert!(!verdict("isinstance('a', 'int')", &[]));
    assert!(verdict("type(3.5) == 'float'", &[]));
    assert!(verdict("type(None) == 'NoneType'", &[]));
    assert!(verdict(
        "type(user) == 'User'",
        &[("user", user("kevin", false, &[]))]
    ));
    assert!(verdict("callable(len) and not callable(3)", &[]));
    assert!(verdict("hash(1) == hash(1.0)", &[]));
}

#[test]
fn builtin_identity() {
    let u = user("kevin", false, &[]);
    // Two references to the same object agree; a structurally equal but
    // distinct object does not.
    assert!(verdict(
        "id(a) == id(b)",
        &[("a", u.clone()), ("b", u.clone())]
    ));
    assert!(verdict(
        "a == b and id(a) != id(b)",
        &[("a", u), ("b", user("kevin", false, &[]))]
    ));
    // Scalars behave as interned values.
    assert!(verdict("id(3) == id(3)", &[]));
}

#[test]
fn builtin_subclass_checks() {
    assert!(verdict("issubclass('bool', 'int')", &[]));
    assert!(verdict("issubclass(type(True), 'int')", &[]));
    assert!(verdict("issubclass('frozenset', 'set')", &[]));
    assert!(verdict("issubclass('int', {'int', 'float'})", &[]));
    assert!(!verdict("issubclass('str', 'int')", &[]));
}

#[test]
fn builtin_reversed() {
    assert_eq!(eval_expr("reversed('abc')", &[]), Value::from("cba"));
    assert_eq!(
        eval_expr("reversed(b)", &[("b", Value::from(vec![1u8, 2, 3]))]),
        Value::from(vec![3u8, 2, 1])
    );
    assert!(verdict("reversed({1, 2}) == {1, 2}", &[]));
    let result = eval_rule("reversed(3)", &[]);
    assert!(matches!(
        result,
        Err(Error::Eval(EvaluationError::Builtin { builtin: "reversed", .. }))
    ));
}

#[test]
fn builtin_format() {
    assert_eq!(eval_expr("format('x')", &[]), Value::from("x"));
    assert_eq!(eval_expr("format(3.5)", &[]), Value::from("3.5"));
    assert_eq!(eval_expr("format(42, 'd')", &[]), Value::from("42"));
    assert_eq!(eval_expr("format(255, 'x')", &[]), Value::from("ff"));
    assert_eq!(eval_expr("format(-255, 'X')", &[]), Value::from("-FF"));
    assert_eq!(eval_expr("format(5, 'b')", &[]), Value::from("101"));
    assert_eq!(eval_expr("format(8, 'o')", &[]), Value::from("10"));
    assert_eq!(eval_expr("format(2.0, '.3f')", &[]), Value::from("2.000"));
    let result = eval_rule("format(1, 'weird')", &[]);
    assert!(matches!(
        result,
        Err(Error::Eval(EvaluationError::Builtin { builtin: "format", .. }))
    ));
}

#[test]
fn builtin_attr_helpers() {
    let u = [("user", user("kevin", true, &[]))];
    assert!(verdict("getattr(user, 'admin')", &u));
    assert_eq!(
        eval_expr("getattr(user, 'missing', 'fallback')", &u),
        Value::from("fallback")
    );
    assert!(verdict("hasattr(user, 'admin')", &u));
    assert!(!verdict("hasattr(user, 'missing')", &u));
}

#[test]
fn unrepresentable_builtins_yield_nothing() {
    assert!(verdict("zip({1}, {2}) == None", &[]));
    assert!(verdict("enumerate({1}) == None", &[]));
    assert!(verdict("dict() == None", &[]));
    assert!(verdict("divmod(7, 2) == None", &[]));
    assert!(verdict("iter({1}) == None", &[]));
    assert!(verdict("next(None) == None", &[]));
    assert!(verdict("object() == None", &[]));
    assert!(verdict("complex(1, 2) == None", &[]));
}

#[test]
fn builtin_errors_are_evaluation_errors() {
    let result = eval_rule("len(3)", &[]);
    assert!(matches!(
        result,
        Err(Error::Eval(EvaluationError::Builtin { builtin: "len", .. }))
    ));
}

#[test]
fn variables_shadow_builtins() {
    assert_eq!(
        eval_expr("len", &[("len", Value::Int(3))]),
        Value::Int(3)
    );
}

#[test]
fn object_comparison_via_capabilities() {
    let kevin = user("kevin", false, &[]);
    let also_kevin = user("kevin", true, &[]);
    let alice = user("alice", false, &[]);
    assert!(verdict(
        "a == b",
        &[("a", kevin.clone()), ("b", also_kevin)]
    ));
    assert!(!verdict("a == b", &[("a", kevin.clone()), ("b", alice)]));
    assert!(verdict("a != 3", &[("a", kevin)]));
}

#[test]
fn ordering_mismatch_is_an_error() {
    let result = eval_rule("x < 'a'", &[("x", Value::Int(1))]);
    assert!(matches!(
        result,
        Err(Error::Eval(EvaluationError::NotOrderable { .. }))
    ));
}
