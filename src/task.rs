//! Task identity, state, and the task control block. See `spec.md` §3.

use std::time::Instant;

use crate::transform::unit::RestartableUnit;
use crate::value::Value;

/// An opaque, stable, never-reused task identifier. See `spec.md` §3's
/// `handle` field and invariant 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(pub(crate) u64);

impl TaskHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// `spec.md` §3's four task states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
    Blocked,
    Suspended,
}

/// Why a task is `Blocked`. Only `Delay` exists today; the variant is kept
/// open per `spec.md` §3's "(delay or, in future extensions, other wait
/// reasons)".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Delay,
}

/// Priority is a plain integer; higher is more urgent. `0` is reserved for
/// the idle task (`spec.md` §3 invariant 6).
pub type Priority = i32;

/// The task control block. Holds everything `spec.md` §3's table lists;
/// `created_at`/`last_ran_at`/`run_count` are the telemetry fields
/// concretized in `SPEC_FULL.md` §3.
pub struct Tcb {
    pub handle: TaskHandle,
    pub name: String,
    pub priority: Priority,
    pub state: TaskState,
    pub unit: Box<dyn RestartableUnit>,
    pub delay_ticks: u64,
    pub blocked_on: Option<BlockReason>,
    pub params: Value,
    pub created_at: Instant,
    pub last_ran_at: Option<Instant>,
    pub run_count: u64,
}

/// An owned, point-in-time copy of a [`Tcb`], safe to hand back to callers
/// without holding the kernel's lock. See `SPEC_FULL.md` §4.6.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub handle: TaskHandle,
    pub name: String,
    pub priority: Priority,
    pub state: TaskState,
    pub delay_ticks: u64,
    pub blocked_on: Option<BlockReason>,
    pub run_count: u64,
    pub created_at: Instant,
    pub last_ran_at: Option<Instant>,
}

impl From<&Tcb> for TaskSnapshot {
    fn from(tcb: &Tcb) -> Self {
        Self {
            handle: tcb.handle,
            name: tcb.name.clone(),
            priority: tcb.priority,
            state: tcb.state,
            delay_ticks: tcb.delay_ticks,
            blocked_on: tcb.blocked_on,
            run_count: tcb.run_count,
            created_at: tcb.created_at,
            last_ran_at: tcb.last_ran_at,
        }
    }
}
