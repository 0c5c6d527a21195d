//! A cooperative, tick-driven task scheduler modeled after a pared-down
//! FreeRTOS: priority- and round-robin-ordered ready queue, a four-state
//! task lifecycle, tick-based delay/yield primitives, and a source-level
//! transformer that rewrites task bodies written as ordinary synchronous
//! code into restartable, suspension-capable units.
//!
//! The [`Kernel`] is the entry point: construct one with a
//! [`SchedulerConfig`], register task bodies with `create_task`, and drive
//! the scheduler with `start`/`stop` or, for deterministic tests,
//! `tick_once`.

pub mod error;
pub mod kernel;
pub mod ready_queue;
pub mod scheduler;
pub mod task;
pub mod task_table;
pub mod transform;
pub mod value;

pub use error::{CreateTaskError, KernelError, RuntimeError, TransformError};
pub use kernel::{Kernel, KernelOptions, SchedulerConfig, SystemStatus};
pub use task::{BlockReason, Priority, TaskHandle, TaskSnapshot, TaskState};
pub use transform::YieldMode;
pub use value::Value;
