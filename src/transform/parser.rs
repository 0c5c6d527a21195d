//! Recursive-descent parser from [`Token`]s to a [`Program`].
//!
//! The grammar is documented in `SPEC_FULL.md` §4.1. A task body is either
//! `function(param) { ...stmts... }` or a bare `{ ...stmts... }` /
//! top-level statement sequence with no parameter — the latter is what a
//! body with no kernel-facing receiver looks like.

use std::sync::Arc;

use super::ast::{BinOp, Block, Expr, Program, Stmt, UnOp};
use super::lexer::Token;
use crate::error::{ParseSnafu, TransformError};

pub fn parse(tokens: &[Token]) -> Result<Program, TransformError> {
    let mut p = Parser { tokens, pos: 0 };
    p.parse_program()
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, message: impl Into<String>) -> TransformError {
        ParseSnafu {
            index: self.pos,
            message: message.into(),
        }
        .build()
    }

    fn expect(&mut self, tok: &Token) -> Result<(), TransformError> {
        if self.peek() == tok {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {tok:?}, found {:?}", self.peek())))
        }
    }

    fn parse_program(&mut self) -> Result<Program, TransformError> {
        // Accept either `function(param) { body }` or a bare statement list.
        if matches!(self.peek(), Token::Ident(name) if name == "function") {
            self.advance();
            self.expect(&Token::LParen)?;
            let param = match self.peek().clone() {
                Token::Ident(name) => {
                    self.advance();
                    Some(name)
                }
                Token::RParen => None,
                other => return Err(self.err(format!("expected parameter name, found {other:?}"))),
            };
            self.expect(&Token::RParen)?;
            let body = self.parse_block()?;
            Ok(Program { param, body })
        } else {
            let mut stmts = Vec::new();
            while *self.peek() != Token::Eof {
                stmts.push(self.parse_stmt()?);
            }
            Ok(Program {
                param: None,
                body: Arc::from(stmts),
            })
        }
    }

    fn parse_block(&mut self) -> Result<Block, TransformError> {
        self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while *self.peek() != Token::RBrace {
            if *self.peek() == Token::Eof {
                return Err(self.err("unterminated block"));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&Token::RBrace)?;
        Ok(Arc::from(stmts))
    }

    fn parse_stmt(&mut self) -> Result<Stmt, TransformError> {
        match self.peek().clone() {
            Token::Let | Token::Var => {
                self.advance();
                let name = self.expect_ident()?;
                let init = if *self.peek() == Token::Eq {
                    self.advance();
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.expect(&Token::Semi)?;
                Ok(Stmt::Let(name, init))
            }
            Token::If => {
                self.advance();
                self.expect(&Token::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                let then_block = self.parse_block()?;
                let else_block = if *self.peek() == Token::Else {
                    self.advance();
                    if *self.peek() == Token::If {
                        let inner = self.parse_stmt()?;
                        Some(Arc::from(vec![inner]))
                    } else {
                        Some(self.parse_block()?)
                    }
                } else {
                    None
                };
                Ok(Stmt::If(cond, then_block, else_block))
            }
            Token::While => {
                self.advance();
                self.expect(&Token::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                let body = self.parse_block()?;
                Ok(Stmt::While(cond, body))
            }
            Token::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            Token::Return => {
                self.advance();
                let value = if *self.peek() == Token::Semi {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&Token::Semi)?;
                Ok(Stmt::Return(value))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&Token::Semi)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn expect_ident(&mut self) -> Result<String, TransformError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(self.err(format!("expected identifier, found {other:?}"))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, TransformError> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> Result<Expr, TransformError> {
        let lhs = self.parse_or()?;
        if *self.peek() == Token::Eq {
            self.advance();
            let rhs = self.parse_assign()?;
            if let Expr::Ident(name) = lhs {
                return Ok(Expr::Assign(name, Arc::new(rhs)));
            }
            return Err(self.err("left-hand side of assignment must be an identifier"));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, TransformError> {
        let mut lhs = self.parse_and()?;
        while *self.peek() == Token::OrOr {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Arc::new(lhs), Arc::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, TransformError> {
        let mut lhs = self.parse_equality()?;
        while *self.peek() == Token::AndAnd {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinOp::And, Arc::new(lhs), Arc::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, TransformError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(op, Arc::new(lhs), Arc::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, TransformError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinOp::Lt,
                Token::LtEq => BinOp::LtEq,
                Token::Gt => BinOp::Gt,
                Token::GtEq => BinOp::GtEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expr::Binary(op, Arc::new(lhs), Arc::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, TransformError> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_factor()?;
            lhs = Expr::Binary(op, Arc::new(lhs), Arc::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr, TransformError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Arc::new(lhs), Arc::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, TransformError> {
        match self.peek() {
            Token::Bang => {
                self.advance();
                Ok(Expr::Unary(UnOp::Not, Arc::new(self.parse_unary()?)))
            }
            Token::Minus => {
                self.advance();
                Ok(Expr::Unary(UnOp::Neg, Arc::new(self.parse_unary()?)))
            }
            _ => self.parse_call(),
        }
    }

    fn parse_call(&mut self) -> Result<Expr, TransformError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let name = self.expect_ident()?;
                    if *self.peek() == Token::LParen {
                        self.advance();
                        let args = self.parse_args()?;
                        expr = Expr::Call(Arc::new(Expr::Member(Arc::new(expr), name)), args);
                    } else {
                        expr = Expr::Member(Arc::new(expr), name);
                    }
                }
                Token::LParen => {
                    self.advance();
                    let args = self.parse_args()?;
                    expr = Expr::Call(Arc::new(expr), args);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, TransformError> {
        let mut args = Vec::new();
        if *self.peek() != Token::RParen {
            args.push(self.parse_expr()?);
            while *self.peek() == Token::Comma {
                self.advance();
                args.push(self.parse_expr()?);
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, TransformError> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Null => Ok(Expr::Null),
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::LParen => {
                let e = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            other => Err(self.err(format!("unexpected token {other:?}"))),
        }
    }
}
