// SPDX-License-Identifier: MIT

use crate::arith;
use crate::ast::{ArithOp, BitOp, CmpOp, UnaryOp};
use crate::authorization::Authorization;
use crate::errors::EvaluationError;
use crate::instructions::Instruction;
use crate::policy::Policy;
use crate::value::{Function, Value};

use std::collections::{BTreeMap, HashMap};

type Result<T> = core::result::Result<T, EvaluationError>;

/// Default ceiling on instructions executed per `evaluate` call.
pub const DEFAULT_INSTRUCTION_LIMIT: usize = 100_000;

/// Ceiling on nested `rule()` evaluations. The recursion guard catches
/// cycles; this bounds non-cyclic chains.
pub(crate) const MAX_RULE_DEPTH: usize = 64;

#[derive(Debug)]
struct Frame {
    name: String,
    defaults: BTreeMap<String, Value>,
}

/// Per-evaluation mutable state: the value stack, the caller's variable
/// bindings, the per-evaluation rule-result cache and the rule frames of
/// nested `rule()` calls.
///
/// A context is owned by exactly one `evaluate` call and discarded when it
/// returns; only the resulting [`Authorization`] survives. Context-wanting
/// functions receive `&mut PolicyContext` and may push and pop the stack
/// directly.
#[derive(Debug)]
pub struct PolicyContext<'a> {
    policy: &'a Policy,
    variables: HashMap<String, Value>,
    stack: Vec<Value>,
    rule_cache: HashMap<String, Value>,
    frames: Vec<Frame>,
    authz: Option<Authorization>,
    executed: usize,
    limit: usize,
}

impl<'a> PolicyContext<'a> {
    pub fn new(policy: &'a Policy, variables: HashMap<String, Value>) -> Self {
        Self {
            policy,
            variables,
            stack: vec![],
            rule_cache: HashMap::new(),
            frames: vec![],
            authz: None,
            executed: 0,
            limit: policy.instruction_limit(),
        }
    }

    pub fn policy(&self) -> &'a Policy {
        self.policy
    }

    /// Resolve a name: caller variables first, then the policy (builtins,
    /// then memoized entrypoints). Unresolved names yield `Nothing`.
    pub fn resolve(&self, name: &str) -> Value {
        if let Some(v) = self.variables.get(name) {
            return v.clone();
        }
        self.policy.resolve_name(name)
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(EvaluationError::StackUnderflow)
    }

    pub(crate) fn top(&self) -> Result<&Value> {
        self.stack.last().ok_or(EvaluationError::StackUnderflow)
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn truncate_stack(&mut self, len: usize) {
        self.stack.truncate(len);
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        if self.stack.len() < n {
            return Err(EvaluationError::StackUnderflow);
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    /// Name of the rule currently being evaluated, if any.
    pub fn current_rule(&self) -> Option<&str> {
        self.frames.last().map(|f| f.name.as_str())
    }

    /// True when `name` is already on the evaluation path; used to stop
    /// direct and transitive rule recursion.
    pub(crate) fn on_path(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.name == name)
    }

    pub(crate) fn push_frame(
        &mut self,
        name: &str,
        defaults: BTreeMap<String, Value>,
    ) -> Result<()> {
        if self.frames.len() >= MAX_RULE_DEPTH {
            return Err(EvaluationError::DepthLimitExceeded {
                limit: MAX_RULE_DEPTH,
            });
        }
        self.frames.push(Frame {
            name: name.to_string(),
            defaults,
        });
        Ok(())
    }

    pub(crate) fn pop_frame(&mut self) {
        self.frames.pop();
    }

    fn current_defaults_cloned(&self) -> BTreeMap<String, Value> {
        self.frames
            .last()
            .map(|f| f.defaults.clone())
            .unwrap_or_default()
    }

    pub(crate) fn cached_rule(&self, name: &str) -> Option<Value> {
        self.rule_cache.get(name).cloned()
    }

    pub(crate) fn cache_rule(&mut self, name: &str, result: Value) {
        self.rule_cache.insert(name.to_string(), result);
    }

    /// The authorization most recently produced by a top-level evaluation
    /// on this context.
    pub fn authorization(&self) -> Option<&Authorization> {
        self.authz.as_ref()
    }

    pub(crate) fn set_authorization(&mut self, authz: Authorization) {
        self.authz = Some(authz);
    }

    fn charge(&mut self) -> Result<()> {
        self.executed += 1;
        if self.executed > self.limit {
            return Err(EvaluationError::InstructionLimitExceeded { limit: self.limit });
        }
        Ok(())
    }
}

fn unary(ctx: &mut PolicyContext<'_>, op: UnaryOp) -> Result<()> {
    let v = ctx.pop()?;
    let r = arith::unary_op(op, &v)?;
    ctx.push(r);
    Ok(())
}

fn binary_arith(ctx: &mut PolicyContext<'_>, op: ArithOp) -> Result<()> {
    let rhs = ctx.pop()?;
    let lhs = ctx.pop()?;
    let r = arith::arith_op(op, &lhs, &rhs)?;
    ctx.push(r);
    Ok(())
}

fn binary_bit(ctx: &mut PolicyContext<'_>, op: BitOp) -> Result<()> {
    let rhs = ctx.pop()?;
    let lhs = ctx.pop()?;
    let r = arith::bit_op(op, &lhs, &rhs)?;
    ctx.push(r);
    Ok(())
}

fn binary_cmp(ctx: &mut PolicyContext<'_>, op: CmpOp) -> Result<()> {
    let rhs = ctx.pop()?;
    let lhs = ctx.pop()?;
    let r = arith::cmp_op(op, &lhs, &rhs)?;
    ctx.push(r);
    Ok(())
}

/// Execute an instruction sequence against the context's stack.
///
/// The compiler guarantees stack balance, so underflow is reported as a
/// fatal error rather than tolerated. Execution ends when the instruction
/// pointer passes the final instruction.
pub(crate) fn run(ctx: &mut PolicyContext<'_>, prog: &[Instruction]) -> Result<()> {
    let mut pc = 0usize;
    while let Some(ins) = prog.get(pc) {
        ctx.charge()?;
        pc += 1;
        match ins {
            Instruction::PushConst(v) => ctx.push(v.clone()),
            Instruction::LoadName(name) => {
                let v = ctx.resolve(name);
                ctx.push(v);
            }
            Instruction::GetAttr(name) => {
                let base = ctx.pop()?;
                let v = arith::get_attr(&base, name)?;
                ctx.push(v);
            }
            Instruction::GetItem => {
                let key = ctx.pop()?;
                let base = ctx.pop()?;
                let v = arith::get_item(&base, &key)?;
                ctx.push(v);
            }
            Instruction::Call(argc) => {
                let args = ctx.pop_n(*argc)?;
                let callee = ctx.pop()?;
                match callee {
                    Value::Function(Function::Normal(f)) => {
                        let v = f(&args)?;
                        ctx.push(v);
                    }
                    // Context-wanting functions manage the stack themselves.
                    Value::Function(Function::ContextWanting(f)) => f(ctx, args)?,
                    Value::Object(o) => match o.call(&args) {
                        Ok(v) => ctx.push(v),
                        // An object without the call capability is simply
                        // not callable.
                        Err(_) => ctx.push(Value::Nothing),
                    },
                    _ => ctx.push(Value::Nothing),
                }
            }
            Instruction::BuildSet(n) => {
                let items = ctx.pop_n(*n)?;
                ctx.push(Value::from_set(items.into_iter().collect()));
            }
            Instruction::Pos => unary(ctx, UnaryOp::Pos)?,
            Instruction::Neg => unary(ctx, UnaryOp::Neg)?,
            Instruction::Not => unary(ctx, UnaryOp::Not)?,
            Instruction::Invert => unary(ctx, UnaryOp::Invert)?,
            Instruction::Add => binary_arith(ctx, ArithOp::Add)?,
            Instruction::Sub => binary_arith(ctx, ArithOp::Sub)?,
            Instruction::Mul => binary_arith(ctx, ArithOp::Mul)?,
            Instruction::Div => binary_arith(ctx, ArithOp::Div)?,
            Instruction::FloorDiv => binary_arith(ctx, ArithOp::FloorDiv)?,
            Instruction::Mod => binary_arith(ctx, ArithOp::Mod)?,
            Instruction::Pow => binary_arith(ctx, ArithOp::Pow)?,
            Instruction::BitAnd => binary_bit(ctx, BitOp::And)?,
            Instruction::BitOr => binary_bit(ctx, BitOp::Or)?,
            Instruction::BitXor => binary_bit(ctx, BitOp::Xor)?,
            Instruction::Shl => binary_bit(ctx, BitOp::Shl)?,
            Instruction::Shr => binary_bit(ctx, BitOp::Shr)?,
            Instruction::Eq => binary_cmp(ctx, CmpOp::Eq)?,
            Instruction::Ne => binary_cmp(ctx, CmpOp::Ne)?,
            Instruction::Lt => binary_cmp(ctx, CmpOp::Lt)?,
            Instruction::Le => binary_cmp(ctx, CmpOp::Le)?,
            Instruction::Gt => binary_cmp(ctx, CmpOp::Gt)?,
            Instruction::Ge => binary_cmp(ctx, CmpOp::Ge)?,
            Instruction::In => binary_cmp(ctx, CmpOp::In)?,
            Instruction::NotIn => binary_cmp(ctx, CmpOp::NotIn)?,
            Instruction::JumpIfFalseElseKeep(target) => {
                if ctx.top()?.truthy() {
                    ctx.pop()?;
                } else {
                    pc = *target;
                }
            }
            Instruction::JumpIfTrueElseKeep(target) => {
                if ctx.top()?.truthy() {
                    pc = *target;
                } else {
                    ctx.pop()?;
                }
            }
            Instruction::JumpIfFalsePop(target) => {
                if !ctx.pop()?.truthy() {
                    pc = *target;
                }
            }
            Instruction::Jump(target) => pc = *target,
            Instruction::SetAuthz(names) => {
                let values = ctx.pop_n(names.len())?;
                let verdict = ctx.pop()?.truthy();
                let mut attrs = ctx.current_defaults_cloned();
                for (name, value) in names.iter().zip(values) {
                    attrs.insert(name.to_string(), value);
                }
                ctx.push(Value::from(Authorization::new(verdict, attrs)));
            }
        }
    }
    Ok(())
}
