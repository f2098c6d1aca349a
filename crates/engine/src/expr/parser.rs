//! Recursive-descent parser: tokenizer output → [`Expr`] AST.
//!
//! Precedence, loosest to tightest: ternary/or, and, not, comparison,
//! additive, multiplicative, unary/atom — matching spec.md's grammar.

use serde_json::Value;

use super::ast::{ArithOp, CmpOp, Expr, PathSeg, TermOp};
use super::lexer::{tokenize, PosToken, Token};
use super::{ExpressionError, MAX_EXPR_DEPTH};

struct Parser<'a> {
    expr: &'a str,
    tokens: Vec<PosToken>,
    pos: usize,
}

pub fn parse(expr: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { expr, tokens, pos: 0 };
    let ast = parser.parse_expr(0)?;
    parser.expect_eof()?;
    Ok(ast)
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn position(&self) -> usize {
        self.tokens[self.pos].position
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check_depth(&self, depth: usize) -> Result<(), ExpressionError> {
        if depth > MAX_EXPR_DEPTH {
            return Err(ExpressionError::TooDeep { expr: self.expr.to_string() });
        }
        Ok(())
    }

    fn fail(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Parse { expr: self.expr.to_string(), position: self.position(), message: message.into() }
    }

    fn expect_eof(&mut self) -> Result<(), ExpressionError> {
        if *self.peek() != Token::Eof {
            return Err(self.fail(format!("unexpected trailing token {:?}", self.peek())));
        }
        Ok(())
    }

    fn expect(&mut self, token: Token) -> Result<(), ExpressionError> {
        if *self.peek() == token {
            self.advance();
            Ok(())
        } else {
            Err(self.fail(format!("expected {token:?}, found {:?}", self.peek())))
        }
    }

    // expr := ternary | or
    fn parse_expr(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        self.check_depth(depth)?;
        let condition = self.parse_or(depth + 1)?;
        if *self.peek() == Token::Question {
            self.advance();
            let when_true = self.parse_or(depth + 1)?;
            self.expect(Token::Colon)?;
            let when_false = self.parse_or(depth + 1)?;
            return Ok(Expr::Ternary(Box::new(condition), Box::new(when_true), Box::new(when_false)));
        }
        Ok(condition)
    }

    fn parse_or(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        self.check_depth(depth)?;
        let mut left = self.parse_and(depth + 1)?;
        while *self.peek() == Token::OrOr {
            self.advance();
            let right = self.parse_and(depth + 1)?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        self.check_depth(depth)?;
        let mut left = self.parse_not(depth + 1)?;
        while *self.peek() == Token::AndAnd {
            self.advance();
            let right = self.parse_not(depth + 1)?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        self.check_depth(depth)?;
        if *self.peek() == Token::Bang {
            self.advance();
            let inner = self.parse_not(depth + 1)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_cmp(depth + 1)
    }

    fn parse_cmp(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        self.check_depth(depth)?;
        // Short-form comparisons: the expression starts with a comparison
        // operator and its implied left operand is the bound item, e.g.
        // ">18" means "item > 18".
        if let Some(op) = cmp_op(self.peek()) {
            self.advance();
            let right = self.parse_arith(depth + 1)?;
            let implied_left = Expr::Path { root: "item".to_string(), segs: Vec::new() };
            return Ok(Expr::Cmp(op, Box::new(implied_left), Box::new(right)));
        }

        let left = self.parse_arith(depth + 1)?;
        if let Some(op) = cmp_op(self.peek()) {
            self.advance();
            let right = self.parse_arith(depth + 1)?;
            return Ok(Expr::Cmp(op, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_arith(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        self.check_depth(depth)?;
        let mut left = self.parse_term(depth + 1)?;
        loop {
            let op = match self.peek() {
                Token::Plus => ArithOp::Add,
                Token::Minus => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term(depth + 1)?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        self.check_depth(depth)?;
        let mut left = self.parse_unary(depth + 1)?;
        loop {
            let op = match self.peek() {
                Token::Star => TermOp::Mul,
                Token::Slash => TermOp::Div,
                Token::Percent => TermOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary(depth + 1)?;
            left = Expr::Term(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        self.check_depth(depth)?;
        if *self.peek() == Token::Minus {
            self.advance();
            let inner = self.parse_unary(depth + 1)?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_factor(depth + 1)
    }

    fn parse_factor(&mut self, depth: usize) -> Result<Expr, ExpressionError> {
        self.check_depth(depth)?;
        match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr(depth + 1)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Value::from(n)))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            Token::Null => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            Token::Ident(name) => {
                self.advance();
                if *self.peek() == Token::LParen {
                    return self.parse_call(name, depth + 1);
                }
                self.parse_path(name, depth + 1)
            }
            other => Err(self.fail(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_call(&mut self, name: String, depth: usize) -> Result<Expr, ExpressionError> {
        self.check_depth(depth)?;
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if *self.peek() != Token::RParen {
            args.push(self.parse_expr(depth + 1)?);
            while *self.peek() == Token::Comma {
                self.advance();
                args.push(self.parse_expr(depth + 1)?);
            }
        }
        self.expect(Token::RParen)?;
        Ok(Expr::Call(name, args))
    }

    fn parse_path(&mut self, root: String, depth: usize) -> Result<Expr, ExpressionError> {
        self.check_depth(depth)?;
        let mut segs = Vec::new();
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    match self.advance() {
                        Token::Ident(field) => segs.push(PathSeg::Field(field)),
                        other => return Err(self.fail(format!("expected field name after '.', found {other:?}"))),
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let index_expr = self.parse_expr(depth + 1)?;
                    self.expect(Token::RBracket)?;
                    segs.push(PathSeg::Index(Box::new(index_expr)));
                }
                _ => break,
            }
        }
        Ok(Expr::Path { root, segs })
    }
}

fn cmp_op(token: &Token) -> Option<CmpOp> {
    match token {
        Token::EqEq => Some(CmpOp::Eq),
        Token::NotEq => Some(CmpOp::Ne),
        Token::Lt => Some(CmpOp::Lt),
        Token::Lte => Some(CmpOp::Lte),
        Token::Gt => Some(CmpOp::Gt),
        Token::Gte => Some(CmpOp::Gte),
        _ => None,
    }
}
