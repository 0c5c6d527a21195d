//! The statement/expression AST the [`super::parser`] produces and the
//! [`super::unit::ScriptUnit`] interpreter walks.

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    Unary(UnOp, Arc<Expr>),
    Binary(BinOp, Arc<Expr>, Arc<Expr>),
    Assign(String, Arc<Expr>),
    /// `receiver.property` — only ever produced for `<param>.delay`, which
    /// the rewrite pass immediately folds into [`Expr::Call`] of
    /// [`CANONICAL_DELAY`](super::rewrite::CANONICAL_DELAY).
    Member(Arc<Expr>, String),
    Call(Arc<Expr>, Vec<Expr>),
}

pub type Block = Arc<[Stmt]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Let(String, Option<Expr>),
    If(Expr, Block, Option<Block>),
    While(Expr, Block),
    Block(Block),
    Return(Option<Expr>),
}

/// A parsed task body: its statements and the name of the parameter (if
/// any) that represents the kernel-facing context, e.g. `rtos` in
/// `function(rtos) { ... }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub param: Option<String>,
    pub body: Block,
}
