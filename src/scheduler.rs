//! `spec.md` §4.4: the tick loop. Decrements delays, selects the next task
//! per the ready queue, and advances it by exactly one `step()`.

use std::time::Instant;

use crate::task::{BlockReason, TaskHandle};
use crate::task_table::TaskTable;
use crate::transform::unit::{IdleUnit, StepOutcome, SuspendValue};
use crate::value::Value;

/// Drives the tick loop over a single [`TaskTable`]. Owns the idle task's
/// handle so it can recreate it if the idle body ever errors, per `spec.md`
/// §7's "Idle task behavior".
pub struct Scheduler {
    pub table: TaskTable,
    idle_handle: TaskHandle,
    tick_count: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        let mut table = TaskTable::new();
        let idle_handle = table.create("idle".to_string(), Box::new(IdleUnit), 0, Value::Undefined);
        Self {
            table,
            idle_handle,
            tick_count: 0,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn idle_handle(&self) -> TaskHandle {
        self.idle_handle
    }

    /// Runs one full tick per `spec.md` §4.4 steps 1-6.
    pub fn tick(&mut self) {
        self.tick_count += 1;

        for handle in self.table.blocked_handles() {
            let expired = match self.table.get_mut(handle) {
                Some(tcb) if tcb.delay_ticks > 0 => {
                    tcb.delay_ticks -= 1;
                    tcb.delay_ticks == 0
                }
                _ => false,
            };
            if expired {
                self.table.unblock(handle);
            }
        }

        // The idle task sits in the ready queue at priority 0 whenever it
        // isn't running, so `next_ready()` only falls through to the
        // explicit idle handle when idle itself is the current running
        // task and nothing else is ready.
        let picked = self.table.next_ready().unwrap_or(self.idle_handle);
        self.table.promote_to_running(picked);
        self.advance(picked);
    }

    fn advance(&mut self, handle: TaskHandle) {
        let outcome = {
            let Some(tcb) = self.table.get_mut(handle) else { return };
            tcb.last_ran_at = Some(Instant::now());
            tcb.run_count += 1;
            tcb.unit.step()
        };

        match outcome {
            Ok(StepOutcome::Done) => {
                if handle == self.idle_handle {
                    self.respawn_idle();
                } else {
                    self.table.delete(handle);
                }
            }
            Ok(StepOutcome::Suspended(SuspendValue::Delay(n))) if n > 0 => {
                self.table.block(handle, BlockReason::Delay, n);
            }
            // A plain yield (delay(0) or a non-delay suspension point):
            // per the Round-Robin Ordering rule, the task goes straight to
            // the tail of its own priority band rather than lingering in
            // the running slot, so same-priority peers and idle compete on
            // equal footing at the very next tick.
            Ok(StepOutcome::Suspended(_)) => {
                self.table.yield_current();
            }
            Err(err) => {
                let name = self.table.get(handle).map(|t| t.name.clone()).unwrap_or_default();
                log::error!(
                    target: "rtos_core::scheduler",
                    "task {} ({name}) raised and was deleted: {err}",
                    handle.raw()
                );
                if handle == self.idle_handle {
                    self.respawn_idle();
                } else {
                    self.table.delete(handle);
                }
            }
        }
    }

    fn respawn_idle(&mut self) {
        log::warn!(target: "rtos_core::scheduler", "idle task exited; recreating to preserve invariant 6");
        self.table.delete(self.idle_handle);
        self.idle_handle = self.table.create("idle".to_string(), Box::new(IdleUnit), 0, Value::Undefined);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
