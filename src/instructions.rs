// SPDX-License-Identifier: MIT

use crate::value::Value;

use core::fmt;
use std::sync::Arc;

/// One opcode of the stack machine rules compile to.
///
/// Jump targets are absolute indices into the instruction sequence; a
/// target equal to the sequence length means "fall off the end".
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Push a literal value.
    PushConst(Value),

    /// Resolve a name (variables, then builtins, then entrypoints) and push
    /// the result; unresolved names push `Nothing`.
    LoadName(Arc<str>),

    /// Replace the top of the stack with one of its attributes.
    GetAttr(Arc<str>),

    /// Pop key and container, push `container[key]`.
    GetItem,

    /// Pop `argc` arguments and a callable, invoke it. Context-wanting
    /// functions manage the stack themselves; everything else has its
    /// return value pushed. Non-callables produce `Nothing`.
    Call(usize),

    /// Pop `n` values, push the frozen set of them.
    BuildSet(usize),

    Pos,
    Neg,
    Not,
    Invert,

    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,

    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,

    /// If the top of the stack is falsy, jump without popping it; otherwise
    /// pop and continue. Lowers `and`.
    JumpIfFalseElseKeep(usize),

    /// If the top of the stack is truthy, jump without popping it;
    /// otherwise pop and continue. Lowers `or`.
    JumpIfTrueElseKeep(usize),

    /// Pop the top of the stack; jump if it was falsy. Lowers the ternary.
    JumpIfFalsePop(usize),

    Jump(usize),

    /// Pop one value per named attribute (in reverse declaration order),
    /// then the verdict; push the resulting Authorization.
    SetAuthz(Vec<Arc<str>>),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::PushConst(v) => write!(f, "push_const {}", v.repr()),
            Instruction::LoadName(n) => write!(f, "load_name {n}"),
            Instruction::GetAttr(n) => write!(f, "get_attr {n}"),
            Instruction::GetItem => f.write_str("get_item"),
            Instruction::Call(argc) => write!(f, "call {argc}"),
            Instruction::BuildSet(n) => write!(f, "build_set {n}"),
            Instruction::Pos => f.write_str("pos"),
            Instruction::Neg => f.write_str("neg"),
            Instruction::Not => f.write_str("not"),
            Instruction::Invert => f.write_str("invert"),
            Instruction::Add => f.write_str("add"),
            Instruction::Sub => f.write_str("sub"),
            Instruction::Mul => f.write_str("mul"),
            Instruction::Div => f.write_str("div"),
            Instruction::FloorDiv => f.write_str("floor_div"),
            Instruction::Mod => f.write_str("mod"),
            Instruction::Pow => f.write_str("pow"),
            Instruction::BitAnd => f.write_str("bit_and"),
            Instruction::BitOr => f.write_str("bit_or"),
            Instruction::BitXor => f.write_str("bit_xor"),
            Instruction::Shl => f.write_str("shl"),
            Instruction::Shr => f.write_str("shr"),
            Instruction::Eq => f.write_str("eq"),
            Instruction::Ne => f.write_str("ne"),
            Instruction::Lt => f.write_str("lt"),
            Instruction::Le => f.write_str("le"),
            Instruction::Gt => f.write_str("gt"),
            Instruction::Ge => f.write_str("ge"),
            Instruction::In => f.write_str("in"),
            Instruction::NotIn => f.write_str("not_in"),
            Instruction::JumpIfFalseElseKeep(t) => write!(f, "jump_if_false_else_keep {t}"),
            Instruction::JumpIfTrueElseKeep(t) => write!(f, "jump_if_true_else_keep {t}"),
            Instruction::JumpIfFalsePop(t) => write!(f, "jump_if_false_pop {t}"),
            Instruction::Jump(t) => write!(f, "jump {t}"),
            Instruction::SetAuthz(names) => {
                f.write_str("set_authz")?;
                for n in names {
                    write!(f, " {n}")?;
                }
                Ok(())
            }
        }
    }
}
