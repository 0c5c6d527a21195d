//! Crate-wide error domains.
//!
//! Operational errors (invalid handle, illegal state transition) are never
//! represented here; they are reported as `bool` by [`crate::task_table::TaskTable`]
//! exactly as `spec.md` mandates. These three enums cover the three cases the
//! spec calls out as *synchronous failures*: a task body that fails to
//! transform, a scripted task body that raises while running, and a kernel
//! that is misconfigured at construction time.

use snafu::Snafu;

/// Failure to turn a source-text task body into a restartable unit.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub))]
pub enum TransformError {
    #[snafu(display("unexpected character '{ch}' at byte offset {offset}"))]
    Lex { ch: char, offset: usize },

    #[snafu(display("parse error at token {index}: {message}"))]
    Parse { index: usize, message: String },

    #[snafu(display(
        "delay(...) used inside a larger expression; it must be its own statement"
    ))]
    NestedDelay,
}

/// Raised while a restartable unit advances. Caught at the scheduler
/// boundary; the offending task is logged and deleted.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("undefined variable '{name}'"))]
    UndefinedVariable { name: String },

    #[snafu(display("undefined function '{name}'"))]
    UndefinedFunction { name: String },

    #[snafu(display("type mismatch evaluating '{op}'"))]
    TypeMismatch { op: String },

    #[snafu(display("division by zero"))]
    DivisionByZero,

    #[snafu(display("'{name}' expects {expected} argument(s), got {got}"))]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
}

/// Raised synchronously from [`crate::kernel::Kernel::new`] when a
/// [`crate::kernel::SchedulerConfig`] is invalid.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub))]
pub enum KernelError {
    #[snafu(display("tickRate must be > 0, got {tick_rate}"))]
    InvalidTickRate { tick_rate: u32 },
}

/// Error surfaced synchronously from `Kernel::create_task` when a body
/// cannot be turned into a task at all (wraps [`TransformError`]).
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub))]
pub enum CreateTaskError {
    #[snafu(display("failed to transform task body: {source}"))]
    Transform { source: TransformError },
}
