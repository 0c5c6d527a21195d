//! `spec.md` §4.2: owns every [`Tcb`], the state-transition rules, and the
//! [`ReadyQueue`] membership that goes along with `READY`.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::ready_queue::ReadyQueue;
use crate::task::{BlockReason, Priority, TaskHandle, TaskState, Tcb};
use crate::transform::unit::RestartableUnit;
use crate::value::Value;

/// Owns every live task. Mirrors `spec.md` §4.2's operation table exactly:
/// every mutator returns `bool` success/failure rather than an error type,
/// per §7's "routine errors are booleans, not exceptions" propagation
/// policy.
#[derive(Default)]
pub struct TaskTable {
    tasks: HashMap<u64, Tcb>,
    ready: ReadyQueue,
    blocked: HashSet<TaskHandle>,
    suspended: HashSet<TaskHandle>,
    running: Option<TaskHandle>,
    next_handle: u64,
}

impl TaskTable {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            ..Default::default()
        }
    }

    pub fn create(
        &mut self,
        name: String,
        unit: Box<dyn RestartableUnit>,
        priority: Priority,
        params: Value,
    ) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.tasks.insert(
            handle.raw(),
            Tcb {
                handle,
                name,
                priority,
                state: TaskState::Ready,
                unit,
                delay_ticks: 0,
                blocked_on: None,
                params,
                created_at: Instant::now(),
                last_ran_at: None,
                run_count: 0,
            },
        );
        self.ready.insert(handle, priority);
        handle
    }

    pub fn delete(&mut self, handle: TaskHandle) -> bool {
        if self.tasks.remove(&handle.raw()).is_none() {
            return false;
        }
        self.ready.remove(handle);
        self.blocked.remove(&handle);
        self.suspended.remove(&handle);
        if self.running == Some(handle) {
            self.running = None;
        }
        true
    }

    pub fn suspend(&mut self, handle: TaskHandle) -> bool {
        let Some(tcb) = self.tasks.get_mut(&handle.raw()) else { return false };
        if tcb.state == TaskState::Suspended {
            return false;
        }
        match tcb.state {
            TaskState::Ready => {
                self.ready.remove(handle);
            }
            TaskState::Blocked => {
                self.blocked.remove(&handle);
            }
            TaskState::Running => {
                if self.running == Some(handle) {
                    self.running = None;
                }
            }
            TaskState::Suspended => unreachable!(),
        }
        tcb.state = TaskState::Suspended;
        self.suspended.insert(handle);
        true
    }

    pub fn resume(&mut self, handle: TaskHandle) -> bool {
        let Some(tcb) = self.tasks.get_mut(&handle.raw()) else { return false };
        if tcb.state != TaskState::Suspended {
            return false;
        }
        tcb.state = TaskState::Ready;
        tcb.blocked_on = None;
        tcb.delay_ticks = 0;
        self.suspended.remove(&handle);
        self.ready.insert(handle, tcb.priority);
        true
    }

    pub fn block(&mut self, handle: TaskHandle, reason: BlockReason, delay_ticks: u64) -> bool {
        let Some(tcb) = self.tasks.get_mut(&handle.raw()) else { return false };
        if !matches!(tcb.state, TaskState::Ready | TaskState::Running) {
            return false;
        }
        if tcb.state == TaskState::Ready {
            self.ready.remove(handle);
        }
        if self.running == Some(handle) {
            self.running = None;
        }
        tcb.state = TaskState::Blocked;
        tcb.blocked_on = Some(reason);
        tcb.delay_ticks = delay_ticks;
        self.blocked.insert(handle);
        true
    }

    pub fn unblock(&mut self, handle: TaskHandle) -> bool {
        let Some(tcb) = self.tasks.get_mut(&handle.raw()) else { return false };
        if tcb.state != TaskState::Blocked {
            return false;
        }
        tcb.state = TaskState::Ready;
        tcb.blocked_on = None;
        tcb.delay_ticks = 0;
        self.blocked.remove(&handle);
        self.ready.insert(handle, tcb.priority);
        true
    }

    pub fn set_priority(&mut self, handle: TaskHandle, priority: Priority) -> bool {
        let Some(tcb) = self.tasks.get_mut(&handle.raw()) else { return false };
        tcb.priority = priority;
        if tcb.state == TaskState::Ready {
            self.ready.remove(handle);
            self.ready.insert(handle, priority);
        }
        true
    }

    pub fn next_ready(&self) -> Option<TaskHandle> {
        self.ready.peek_head()
    }

    /// Removes the running task (if any) from the running slot and returns
    /// it to the tail of its priority band. See `spec.md` §4.2.
    pub fn yield_current(&mut self) {
        let Some(handle) = self.running.take() else { return };
        if let Some(tcb) = self.tasks.get_mut(&handle.raw()) {
            tcb.state = TaskState::Ready;
            self.ready.insert(handle, tcb.priority);
        }
    }

    /// Pops the head of the ready queue and marks it `RUNNING`. Used by the
    /// scheduler's tick loop step 4.
    pub fn promote_to_running(&mut self, handle: TaskHandle) {
        self.ready.remove(handle);
        if let Some(tcb) = self.tasks.get_mut(&handle.raw()) {
            tcb.state = TaskState::Running;
        }
        self.running = Some(handle);
    }

    pub fn running(&self) -> Option<TaskHandle> {
        self.running
    }

    pub fn get(&self, handle: TaskHandle) -> Option<&Tcb> {
        self.tasks.get(&handle.raw())
    }

    pub fn get_mut(&mut self, handle: TaskHandle) -> Option<&mut Tcb> {
        self.tasks.get_mut(&handle.raw())
    }

    pub fn all(&self) -> impl Iterator<Item = &Tcb> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    pub fn suspended_count(&self) -> usize {
        self.suspended.len()
    }

    /// Every `BLOCKED` handle whose `delayTicks` should be decremented this
    /// tick, per `spec.md` §4.4 step 2.
    pub fn blocked_handles(&self) -> Vec<TaskHandle> {
        self.blocked.iter().copied().collect()
    }
}
