// SPDX-License-Identifier: MIT

use crate::arith;
use crate::ast::*;
use crate::errors::ParseError;
use crate::instructions::Instruction;
use crate::lexer::Source;
use crate::parser::Parser;
use crate::value::Value;

use std::collections::BTreeSet;
use std::sync::Arc;

/// Lowers a parsed rule into a postfix instruction sequence.
///
/// Literal-only subtrees are evaluated at compile time. A fold that would
/// fail (division by zero, overflow, a type error) is abandoned rather than
/// reported: the runtime instruction is emitted instead, so the error
/// surfaces only if that code path actually executes. Calls never fold, as
/// they may have side effects.
#[derive(Debug, Clone)]
pub struct Compiler {
    fold: bool,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self { fold: true }
    }

    /// Disable (or re-enable) constant folding. Folding never changes the
    /// meaning of a rule; turning it off exists for differential testing.
    pub fn with_folding(mut self, fold: bool) -> Self {
        self.fold = fold;
        self
    }

    pub fn compile(&self, source: &Source) -> Result<Vec<Instruction>, ParseError> {
        let ast = Parser::new(source)?.parse_rule()?;
        Ok(self.lower(&ast))
    }

    fn lower(&self, ast: &RuleAst) -> Vec<Instruction> {
        let mut prog = vec![];
        match &ast.verdict {
            Some(expr) => {
                self.emit(expr, &mut prog);
            }
            // Empty rule text always denies.
            None => prog.push(Instruction::PushConst(Value::Bool(false))),
        }
        let mut names: Vec<Arc<str>> = Vec::with_capacity(ast.attrs.len());
        for attr in &ast.attrs {
            self.emit(&attr.expr, &mut prog);
            names.push(attr.name.text().into());
        }
        prog.push(Instruction::SetAuthz(names));
        prog
    }

    /// Emit instructions for `expr`, returning true when the emission is a
    /// single `PushConst` (i.e. the subtree folded to a constant).
    fn emit(&self, expr: &Expr, prog: &mut Vec<Instruction>) -> bool {
        match expr {
            Expr::Const { value, .. } => {
                prog.push(Instruction::PushConst(value.clone()));
                true
            }
            Expr::Var { span } => {
                prog.push(Instruction::LoadName(span.text().into()));
                false
            }
            Expr::Set { items, .. } => {
                let start = prog.len();
                let mut all_const = true;
                for item in items {
                    all_const &= self.emit(item, prog);
                }
                if self.fold && all_const {
                    let mut set = BTreeSet::new();
                    for ins in prog.drain(start..) {
                        if let Instruction::PushConst(v) = ins {
                            set.insert(v);
                        }
                    }
                    prog.push(Instruction::PushConst(Value::from_set(set)));
                    return true;
                }
                prog.push(Instruction::BuildSet(items.len()));
                false
            }
            Expr::Unary { op, expr, .. } => {
                let constant = self.emit(expr, prog);
                if self.fold && constant {
                    let folded = match prog.last() {
                        Some(Instruction::PushConst(v)) => arith::unary_op(*op, v).ok(),
                        _ => None,
                    };
                    if let Some(v) = folded {
                        prog.pop();
                        prog.push(Instruction::PushConst(v));
                        return true;
                    }
                }
                prog.push(match op {
                    UnaryOp::Not => Instruction::Not,
                    UnaryOp::Neg => Instruction::Neg,
                    UnaryOp::Pos => Instruction::Pos,
                    UnaryOp::Invert => Instruction::Invert,
                });
                false
            }
            Expr::Arith { op, lhs, rhs, .. } => {
                let ins = match op {
                    ArithOp::Add => Instruction::Add,
                    ArithOp::Sub => Instruction::Sub,
                    ArithOp::Mul => Instruction::Mul,
                    ArithOp::Div => Instruction::Div,
                    ArithOp::FloorDiv => Instruction::FloorDiv,
                    ArithOp::Mod => Instruction::Mod,
                    ArithOp::Pow => Instruction::Pow,
                };
                self.emit_binary(lhs, rhs, ins, |a, b| arith::arith_op(*op, a, b).ok(), prog)
            }
            Expr::Bit { op, lhs, rhs, .. } => {
                let ins = match op {
                    BitOp::And => Instruction::BitAnd,
                    BitOp::Or => Instruction::BitOr,
                    BitOp::Xor => Instruction::BitXor,
                    BitOp::Shl => Instruction::Shl,
                    BitOp::Shr => Instruction::Shr,
                };
                self.emit_binary(lhs, rhs, ins, |a, b| arith::bit_op(*op, a, b).ok(), prog)
            }
            Expr::Cmp { op, lhs, rhs, .. } => {
                let ins = match op {
                    CmpOp::Eq => Instruction::Eq,
                    CmpOp::Ne => Instruction::Ne,
                    CmpOp::Lt => Instruction::Lt,
                    CmpOp::Le => Instruction::Le,
                    CmpOp::Gt => Instruction::Gt,
                    CmpOp::Ge => Instruction::Ge,
                    CmpOp::In => Instruction::In,
                    CmpOp::NotIn => Instruction::NotIn,
                };
                self.emit_binary(lhs, rhs, ins, |a, b| arith::cmp_op(*op, a, b).ok(), prog)
            }
            Expr::And { lhs, rhs, .. } => {
                let constant = self.emit(lhs, prog);
                if self.fold && constant {
                    if let Some(Instruction::PushConst(v)) = prog.last() {
                        if !v.truthy() {
                            // The left side is the result; the right side
                            // would never run.
                            return true;
                        }
                    }
                    prog.pop();
                    return self.emit(rhs, prog);
                }
                let jump = prog.len();
                prog.push(Instruction::JumpIfFalseElseKeep(usize::MAX));
                self.emit(rhs, prog);
                prog[jump] = Instruction::JumpIfFalseElseKeep(prog.len());
                false
            }
            Expr::Or { lhs, rhs, .. } => {
                let constant = self.emit(lhs, prog);
                if self.fold && constant {
                    if let Some(Instruction::PushConst(v)) = prog.last() {
                        if v.truthy() {
                            return true;
                        }
                    }
                    prog.pop();
                    return self.emit(rhs, prog);
                }
                let jump = prog.len();
                prog.push(Instruction::JumpIfTrueElseKeep(usize::MAX));
                self.emit(rhs, prog);
                prog[jump] = Instruction::JumpIfTrueElseKeep(prog.len());
                false
            }
            Expr::If {
                cond, then, els, ..
            } => {
                let constant = self.emit(cond, prog);
                if self.fold && constant {
                    let truthy = match prog.last() {
                        Some(Instruction::PushConst(v)) => v.truthy(),
                        _ => false,
                    };
                    prog.pop();
                    return self.emit(if truthy { then } else { els }, prog);
                }
                let jump_false = prog.len();
                prog.push(Instruction::JumpIfFalsePop(usize::MAX));
                self.emit(then, prog);
                let jump_end = prog.len();
                prog.push(Instruction::Jump(usize::MAX));
                prog[jump_false] = Instruction::JumpIfFalsePop(prog.len());
                self.emit(els, prog);
                prog[jump_end] = Instruction::Jump(prog.len());
                false
            }
            Expr::RefDot { refr, field, .. } => {
                self.emit(refr, prog);
                prog.push(Instruction::GetAttr(field.text().into()));
                false
            }
            Expr::RefBrack { refr, index, .. } => {
                self.emit_binary(refr, index, Instruction::GetItem, |a, b| {
                    arith::get_item(a, b).ok()
                }, prog)
            }
            Expr::Call { fcn, args, .. } => {
                self.emit(fcn, prog);
                for arg in args {
                    self.emit(arg, prog);
                }
                prog.push(Instruction::Call(args.len()));
                false
            }
        }
    }

    /// Emit both operands, then either fold them into a constant or append
    /// the runtime instruction.
    fn emit_binary(
        &self,
        lhs: &Expr,
        rhs: &Expr,
        ins: Instruction,
        fold: impl Fn(&Value, &Value) -> Option<Value>,
        prog: &mut Vec<Instruction>,
    ) -> bool {
        let lc = self.emit(lhs, prog);
        let rc = self.emit(rhs, prog);
        if self.fold && lc && rc {
            let folded = match prog.as_slice() {
                [.., Instruction::PushConst(a), Instruction::PushConst(b)] => fold(a, b),
                _ => None,
            };
            if let Some(v) = folded {
                prog.truncate(prog.len() - 2);
                prog.push(Instruction::PushConst(v));
                return true;
            }
        }
        prog.push(ins);
        false
    }
}
