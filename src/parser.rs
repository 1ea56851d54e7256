// SPDX-License-Identifier: MIT

use crate::ast::*;
use crate::errors::ParseError;
use crate::lexer::*;
use crate::value::Value;

type Result<T> = core::result::Result<T, ParseError>;

const KEYWORDS: [&str; 9] = [
    "and", "or", "not", "in", "if", "else", "True", "False", "None",
];

#[derive(Clone)]
pub struct Parser<'source> {
    source: Source,
    lexer: Lexer<'source>,
    tok: Token,
    end: u32,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source Source) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let tok = lexer.next_token()?;
        Ok(Self {
            source: source.clone(),
            lexer,
            tok,
            end: 0,
        })
    }

    fn token_text(&self) -> &str {
        match self.tok.0 {
            TokenKind::Symbol | TokenKind::Number | TokenKind::Ident | TokenKind::Eof => {
                self.tok.1.text()
            }
            TokenKind::String => "",
        }
    }

    fn next_token(&mut self) -> Result<()> {
        self.end = self.tok.1.end;
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, text: &str, context: &str) -> Result<()> {
        if self.token_text() == text {
            self.next_token()
        } else {
            let msg = format!("expecting `{text}` {context}");
            Err(self.tok.1.error(&msg))
        }
    }

    fn is_keyword(ident: &str) -> bool {
        KEYWORDS.contains(&ident)
    }

    /// Extend `span` to the end of the most recently consumed token.
    fn span_to_end(&self, span: &Span) -> Span {
        let mut span = span.clone();
        span.end = self.end;
        span
    }

    /// True when the current token is the `{` of an adjacent `{{` pair.
    fn at_block_open(&self) -> bool {
        self.tok.0 == TokenKind::Symbol
            && self.tok.1.text() == "{"
            && self.source.contents().as_bytes().get(self.tok.1.end as usize) == Some(&b'{')
    }

    fn at_block_close(&self) -> bool {
        self.tok.0 == TokenKind::Symbol
            && self.tok.1.text() == "}"
            && self.source.contents().as_bytes().get(self.tok.1.end as usize) == Some(&b'}')
    }

    fn parse_number(&mut self) -> Result<Expr> {
        let span = self.tok.1.clone();
        let text = span.text();
        let value = if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
        {
            Value::Int(
                i64::from_str_radix(digits, 16)
                    .map_err(|_| span.error("integer literal out of range"))?,
            )
        } else if let Some(digits) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
            Value::Int(
                i64::from_str_radix(digits, 8)
                    .map_err(|_| span.error("integer literal out of range"))?,
            )
        } else if let Some(digits) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
            Value::Int(
                i64::from_str_radix(digits, 2)
                    .map_err(|_| span.error("integer literal out of range"))?,
            )
        } else if text.contains(['.', 'e', 'E']) {
            Value::Float(
                text.parse::<f64>()
                    .map_err(|_| span.error("invalid float literal"))?,
            )
        } else {
            Value::Int(
                text.parse::<i64>()
                    .map_err(|_| span.error("integer literal out of range"))?,
            )
        };
        self.next_token()?;
        Ok(Expr::Const { span, value })
    }

    fn parse_string(&mut self) -> Result<Expr> {
        let mut span = self.tok.1.clone();
        let mut s = unescape(&self.tok.1)?;
        self.next_token()?;
        // Adjacent string literals concatenate.
        while self.tok.0 == TokenKind::String {
            s.push_str(&unescape(&self.tok.1)?);
            span.end = self.tok.1.end;
            self.next_token()?;
        }
        Ok(Expr::Const {
            span,
            value: Value::from(s),
        })
    }

    fn parse_set_literal(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        self.next_token()?;
        let mut items = vec![];
        loop {
            if self.token_text() == "}" {
                break;
            }
            items.push(self.parse_expr()?);
            if self.token_text() == "," {
                self.next_token()?;
                continue;
            }
            break;
        }
        if items.is_empty() {
            return Err(start.error("empty set literal is not allowed; use set()"));
        }
        self.expect("}", "while parsing set literal")?;
        Ok(Expr::Set {
            span: self.span_to_end(&start),
            items,
        })
    }

    fn parse_parens_expr(&mut self) -> Result<Expr> {
        self.next_token()?;
        let expr = self.parse_expr()?;
        self.expect(")", "while parsing parenthesized expression")?;
        Ok(expr)
    }

    fn parse_scalar_or_var(&mut self) -> Result<Expr> {
        let span = self.tok.1.clone();
        match self.tok.0 {
            TokenKind::Number => self.parse_number(),
            TokenKind::String => self.parse_string(),
            TokenKind::Ident => match span.text() {
                "True" => {
                    self.next_token()?;
                    Ok(Expr::Const {
                        span,
                        value: Value::Bool(true),
                    })
                }
                "False" => {
                    self.next_token()?;
                    Ok(Expr::Const {
                        span,
                        value: Value::Bool(false),
                    })
                }
                "None" => {
                    self.next_token()?;
                    Ok(Expr::Const {
                        span,
                        value: Value::Nothing,
                    })
                }
                t if Self::is_keyword(t) => {
                    Err(span.error(&format!("unexpected keyword `{t}`")))
                }
                _ => {
                    self.next_token()?;
                    Ok(Expr::Var { span })
                }
            },
            TokenKind::Symbol => match span.text() {
                "(" => self.parse_parens_expr(),
                "{" => self.parse_set_literal(),
                _ => Err(span.error("expecting expression")),
            },
            TokenKind::Eof => Err(span.error("unexpected end of rule")),
        }
    }

    fn parse_ref(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut term = self.parse_scalar_or_var()?;

        loop {
            match self.token_text() {
                "." => {
                    self.next_token()?;
                    let field = self.tok.1.clone();
                    if self.tok.0 != TokenKind::Ident {
                        return Err(field.error("expecting attribute name after `.`"));
                    }
                    if Self::is_keyword(field.text()) {
                        return Err(
                            field.error(&format!("unexpected keyword `{}`", field.text()))
                        );
                    }
                    self.next_token()?;
                    term = Expr::RefDot {
                        span: self.span_to_end(&start),
                        refr: Box::new(term),
                        field,
                    };
                }
                "[" => {
                    self.next_token()?;
                    let index = self.parse_expr()?;
                    self.expect("]", "while parsing subscription")?;
                    term = Expr::RefBrack {
                        span: self.span_to_end(&start),
                        refr: Box::new(term),
                        index: Box::new(index),
                    };
                }
                "(" => {
                    self.next_token()?;
                    let mut args = vec![];
                    loop {
                        if self.token_text() == ")" {
                            break;
                        }
                        args.push(self.parse_expr()?);
                        if self.token_text() == "," {
                            self.next_token()?;
                            continue;
                        }
                        break;
                    }
                    self.expect(")", "while parsing call arguments")?;
                    term = Expr::Call {
                        span: self.span_to_end(&start),
                        fcn: Box::new(term),
                        args,
                    };
                }
                _ => break,
            }
        }

        Ok(term)
    }

    fn parse_pow_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let expr = self.parse_ref()?;
        if self.token_text() == "**" {
            self.next_token()?;
            // The exponent may itself be signed: 2 ** -1.
            let rhs = self.parse_unary_expr()?;
            return Ok(Expr::Arith {
                span: self.span_to_end(&start),
                op: ArithOp::Pow,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            });
        }
        Ok(expr)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let op = match self.token_text() {
            "+" => UnaryOp::Pos,
            "-" => UnaryOp::Neg,
            "~" => UnaryOp::Invert,
            _ => return self.parse_pow_expr(),
        };
        self.next_token()?;
        let expr = self.parse_unary_expr()?;
        Ok(Expr::Unary {
            span: self.span_to_end(&start),
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_mul_div_mod_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = self.parse_unary_expr()?;
        loop {
            let op = match self.token_text() {
                "*" => ArithOp::Mul,
                "/" => ArithOp::Div,
                "//" => ArithOp::FloorDiv,
                "%" => ArithOp::Mod,
                _ => return Ok(expr),
            };
            self.next_token()?;
            let rhs = self.parse_unary_expr()?;
            expr = Expr::Arith {
                span: self.span_to_end(&start),
                op,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_arith_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = self.parse_mul_div_mod_expr()?;
        loop {
            let op = match self.token_text() {
                "+" => ArithOp::Add,
                "-" => ArithOp::Sub,
                _ => return Ok(expr),
            };
            self.next_token()?;
            let rhs = self.parse_mul_div_mod_expr()?;
            expr = Expr::Arith {
                span: self.span_to_end(&start),
                op,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_shift_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = self.parse_arith_expr()?;
        loop {
            let op = match self.token_text() {
                "<<" => BitOp::Shl,
                ">>" => BitOp::Shr,
                _ => return Ok(expr),
            };
            self.next_token()?;
            let rhs = self.parse_arith_expr()?;
            expr = Expr::Bit {
                span: self.span_to_end(&start),
                op,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_bit_and_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = self.parse_shift_expr()?;
        while self.token_text() == "&" {
            self.next_token()?;
            let rhs = self.parse_shift_expr()?;
            expr = Expr::Bit {
                span: self.span_to_end(&start),
                op: BitOp::And,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_bit_xor_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = self.parse_bit_and_expr()?;
        while self.token_text() == "^" {
            self.next_token()?;
            let rhs = self.parse_bit_and_expr()?;
            expr = Expr::Bit {
                span: self.span_to_end(&start),
                op: BitOp::Xor,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_bit_or_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = self.parse_bit_xor_expr()?;
        while self.token_text() == "|" {
            self.next_token()?;
            let rhs = self.parse_bit_xor_expr()?;
            expr = Expr::Bit {
                span: self.span_to_end(&start),
                op: BitOp::Or,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_cmp_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = self.parse_bit_or_expr()?;
        loop {
            let op = match self.token_text() {
                "==" => CmpOp::Eq,
                "!=" => CmpOp::Ne,
                "<" => CmpOp::Lt,
                "<=" => CmpOp::Le,
                ">" => CmpOp::Gt,
                ">=" => CmpOp::Ge,
                "in" => CmpOp::In,
                "not" => {
                    self.next_token()?;
                    self.expect("in", "after `not` in comparison")?;
                    let rhs = self.parse_bit_or_expr()?;
                    expr = Expr::Cmp {
                        span: self.span_to_end(&start),
                        op: CmpOp::NotIn,
                        lhs: Box::new(expr),
                        rhs: Box::new(rhs),
                    };
                    continue;
                }
                _ => return Ok(expr),
            };
            self.next_token()?;
            let rhs = self.parse_bit_or_expr()?;
            expr = Expr::Cmp {
                span: self.span_to_end(&start),
                op,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_not_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        if self.token_text() == "not" {
            self.next_token()?;
            let expr = self.parse_not_expr()?;
            return Ok(Expr::Unary {
                span: self.span_to_end(&start),
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        self.parse_cmp_expr()
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = self.parse_not_expr()?;
        while self.token_text() == "and" {
            self.next_token()?;
            let rhs = self.parse_not_expr()?;
            expr = Expr::And {
                span: self.span_to_end(&start),
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = self.parse_and_expr()?;
        while self.token_text() == "or" {
            self.next_token()?;
            let rhs = self.parse_and_expr()?;
            expr = Expr::Or {
                span: self.span_to_end(&start),
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
        Ok(expr)
    }

    /// Full expression: `a if cond else b`, with the else branch binding
    /// right-associatively.
    pub fn parse_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let then = self.parse_or_expr()?;
        if self.token_text() != "if" {
            return Ok(then);
        }
        self.next_token()?;
        let cond = self.parse_or_expr()?;
        self.expect("else", "while parsing conditional expression")?;
        let els = self.parse_expr()?;
        Ok(Expr::If {
            span: self.span_to_end(&start),
            cond: Box::new(cond),
            then: Box::new(then),
            els: Box::new(els),
        })
    }

    fn parse_attr_name(&mut self) -> Result<Span> {
        let span = self.tok.1.clone();
        if self.tok.0 != TokenKind::Ident {
            return Err(span.error("expecting authorization attribute name"));
        }
        let text = span.text();
        if Self::is_keyword(text) {
            return Err(span.error(&format!("unexpected keyword `{text}`")));
        }
        if text.starts_with('_') {
            return Err(span.error("authorization attribute names may not begin with `_`"));
        }
        self.next_token()?;
        Ok(span)
    }

    fn parse_attr_block(&mut self, attrs: &mut Vec<AttrAssign>) -> Result<()> {
        // Consume the adjacent `{` `{` pair.
        self.next_token()?;
        self.next_token()?;
        loop {
            if self.at_block_close() {
                break;
            }
            let name = self.parse_attr_name()?;
            self.expect("=", "while parsing authorization attribute assignment")?;
            let expr = self.parse_expr()?;
            if attrs.iter().any(|a| a.name.text() == name.text()) {
                return Err(name.error(&format!(
                    "duplicate authorization attribute `{}`",
                    name.text()
                )));
            }
            attrs.push(AttrAssign { name, expr });
            if self.token_text() == "," {
                self.next_token()?;
                continue;
            }
            break;
        }
        if !self.at_block_close() {
            return Err(self.tok.1.error("expecting `}}` to close attribute block"));
        }
        self.next_token()?;
        self.next_token()?;
        Ok(())
    }

    /// Parse a whole rule: an optional verdict expression followed by an
    /// optional `{{ name = expr, ... }}` block, then end of input.
    pub fn parse_rule(&mut self) -> Result<RuleAst> {
        let verdict = if self.tok.0 == TokenKind::Eof {
            None
        } else if self.at_block_open() {
            // `{{` could open a set-of-sets expression or an attribute
            // block on an empty verdict; try the expression first.
            let saved = self.clone();
            match self.parse_expr() {
                Ok(e) => Some(e),
                Err(_) => {
                    *self = saved;
                    None
                }
            }
        } else {
            Some(self.parse_expr()?)
        };

        let mut attrs = vec![];
        if self.at_block_open() {
            self.parse_attr_block(&mut attrs)?;
        }

        if self.tok.0 != TokenKind::Eof {
            return Err(self.tok.1.error("unexpected trailing text after rule"));
        }

        Ok(RuleAst { verdict, attrs })
    }
}
