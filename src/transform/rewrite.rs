//! Implements `spec.md` §4.1 steps 2, 3 and 5: detect `delay(...)` call
//! sites, decide whether a real rewrite is safe, and canonicalize the
//! receiver parameter and delay call sites so the interpreter only ever
//! needs to recognize one call shape.

use std::sync::Arc;

use super::ast::{Block, Expr, Program, Stmt};
use crate::error::TransformError;

/// The name every `delay(...)` call site is rewritten to reference, once a
/// rewrite is known to be safe.
pub const CANONICAL_DELAY: &str = "__delay";

/// Outcome of analyzing a program for delay usage, per §4.1 steps 2-3.
pub enum DelayAnalysis {
    /// No `delay`-shaped call anywhere in the body.
    None,
    /// At least one call was receiver-qualified by the body's parameter
    /// (`param.delay(...)`); rewriting is safe.
    Qualified,
    /// Only bare `delay(...)` calls were found, with no parameter
    /// qualification; rewriting is unsafe per step 3's reasoning (a bare
    /// `delay` could shadow an outer-scope function of unknown semantics).
    BareOnly,
}

pub fn analyze(program: &Program) -> DelayAnalysis {
    let mut qualified = false;
    let mut bare = false;
    walk_block(&program.body, &mut |expr| {
        if let Expr::Call(callee, _) = expr {
            match callee.as_ref() {
                Expr::Member(receiver, prop) if prop == "delay" => {
                    if let Expr::Ident(name) = receiver.as_ref() {
                        if Some(name.as_str()) == program.param.as_deref() {
                            qualified = true;
                        }
                    }
                }
                Expr::Ident(name) if name == "delay" => bare = true,
                _ => {}
            }
        }
    });
    if qualified {
        DelayAnalysis::Qualified
    } else if bare {
        DelayAnalysis::BareOnly
    } else {
        DelayAnalysis::None
    }
}

/// Rewrites `param.delay(...)` / bare `delay(...)` call sites to
/// `__delay(...)`, and every other reference to `param` to `__kernel`, per
/// step 5 ("Replace references to the original receiver-parameter with a
/// canonical name the runtime binds to the kernel").
///
/// Returns an error if any `delay(...)` call is found nested inside a
/// larger expression rather than being the whole of an expression
/// statement — see `SPEC_FULL.md` §4.1 for why this is out of scope.
pub fn canonicalize(program: &Program) -> Result<Block, TransformError> {
    canonicalize_block(&program.body, program.param.as_deref(), true)
}

fn canonicalize_block(
    block: &Block,
    param: Option<&str>,
    check_statement_position: bool,
) -> Result<Block, TransformError> {
    let mut out = Vec::with_capacity(block.len());
    for stmt in block.iter() {
        out.push(canonicalize_stmt(stmt, param, check_statement_position)?);
    }
    Ok(Arc::from(out))
}

fn canonicalize_stmt(
    stmt: &Stmt,
    param: Option<&str>,
    check_statement_position: bool,
) -> Result<Stmt, TransformError> {
    Ok(match stmt {
        Stmt::Expr(e) => {
            let top_level_delay = is_delay_call(e, param);
            Stmt::Expr(canonicalize_expr(e, param, check_statement_position && !top_level_delay)?)
        }
        Stmt::Let(name, init) => Stmt::Let(
            name.clone(),
            init.as_ref()
                .map(|e| canonicalize_expr(e, param, true))
                .transpose()?,
        ),
        Stmt::If(cond, then_b, else_b) => Stmt::If(
            canonicalize_expr(cond, param, true)?,
            canonicalize_block(then_b, param, true)?,
            else_b
                .as_ref()
                .map(|b| canonicalize_block(b, param, true))
                .transpose()?,
        ),
        Stmt::While(cond, body) => Stmt::While(
            canonicalize_expr(cond, param, true)?,
            canonicalize_block(body, param, true)?,
        ),
        Stmt::Block(inner) => Stmt::Block(canonicalize_block(inner, param, true)?),
        Stmt::Return(value) => Stmt::Return(
            value
                .as_ref()
                .map(|e| canonicalize_expr(e, param, true))
                .transpose()?,
        ),
    })
}

fn is_delay_call(expr: &Expr, param: Option<&str>) -> bool {
    match expr {
        Expr::Call(callee, _) => match callee.as_ref() {
            Expr::Member(receiver, prop) if prop == "delay" => {
                matches!(receiver.as_ref(), Expr::Ident(name) if Some(name.as_str()) == param)
            }
            Expr::Ident(name) => name == "delay",
            _ => false,
        },
        _ => false,
    }
}

/// Walks `expr`, rewriting canonical delay call sites and kernel parameter
/// references. `reject_delay` is true whenever `expr` is not itself
/// permitted to *be* a delay call (i.e. everywhere except the direct
/// top-level expression of an `exprStmt`), used to reject nested delay
/// calls per `TransformError::NestedDelay`.
fn canonicalize_expr(
    expr: &Expr,
    param: Option<&str>,
    reject_delay: bool,
) -> Result<Expr, TransformError> {
    if is_delay_call(expr, param) {
        if reject_delay {
            return Err(TransformError::NestedDelay);
        }
        let Expr::Call(_, args) = expr else { unreachable!() };
        let new_args = args
            .iter()
            .map(|a| canonicalize_expr(a, param, true))
            .collect::<Result<_, _>>()?;
        return Ok(Expr::Call(Arc::new(Expr::Ident(CANONICAL_DELAY.to_string())), new_args));
    }

    Ok(match expr {
        Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) | Expr::Null => expr.clone(),
        Expr::Ident(name) => {
            if Some(name.as_str()) == param {
                Expr::Ident("__kernel".to_string())
            } else {
                Expr::Ident(name.clone())
            }
        }
        Expr::Unary(op, inner) => Expr::Unary(*op, Arc::new(canonicalize_expr(inner, param, true)?)),
        Expr::Binary(op, l, r) => Expr::Binary(
            *op,
            Arc::new(canonicalize_expr(l, param, true)?),
            Arc::new(canonicalize_expr(r, param, true)?),
        ),
        Expr::Assign(name, value) => {
            Expr::Assign(name.clone(), Arc::new(canonicalize_expr(value, param, true)?))
        }
        Expr::Member(receiver, prop) => {
            Expr::Member(Arc::new(canonicalize_expr(receiver, param, true)?), prop.clone())
        }
        Expr::Call(callee, args) => Expr::Call(
            Arc::new(canonicalize_expr(callee, param, true)?),
            args.iter()
                .map(|a| canonicalize_expr(a, param, true))
                .collect::<Result<_, _>>()?,
        ),
    })
}

fn walk_block(block: &Block, visit: &mut impl FnMut(&Expr)) {
    for stmt in block.iter() {
        walk_stmt(stmt, visit);
    }
}

fn walk_stmt(stmt: &Stmt, visit: &mut impl FnMut(&Expr)) {
    match stmt {
        Stmt::Expr(e) => walk_expr(e, visit),
        Stmt::Let(_, init) => {
            if let Some(e) = init {
                walk_expr(e, visit);
            }
        }
        Stmt::If(cond, then_b, else_b) => {
            walk_expr(cond, visit);
            walk_block(then_b, visit);
            if let Some(b) = else_b {
                walk_block(b, visit);
            }
        }
        Stmt::While(cond, body) => {
            walk_expr(cond, visit);
            walk_block(body, visit);
        }
        Stmt::Block(inner) => walk_block(inner, visit),
        Stmt::Return(value) => {
            if let Some(e) = value {
                walk_expr(e, visit);
            }
        }
    }
}

fn walk_expr(expr: &Expr, visit: &mut impl FnMut(&Expr)) {
    visit(expr);
    match expr {
        Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) | Expr::Null | Expr::Ident(_) => {}
        Expr::Unary(_, inner) => walk_expr(inner, visit),
        Expr::Binary(_, l, r) => {
            walk_expr(l, visit);
            walk_expr(r, visit);
        }
        Expr::Assign(_, value) => walk_expr(value, visit),
        Expr::Member(receiver, _) => walk_expr(receiver, visit),
        Expr::Call(callee, args) => {
            walk_expr(callee, visit);
            for a in args {
                walk_expr(a, visit);
            }
        }
    }
}
