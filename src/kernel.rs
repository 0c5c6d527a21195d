//! `spec.md` §4.5 / §6: the public facade. Wraps a [`Scheduler`] behind one
//! [`std::sync::Mutex`], mirroring `vexide-async`'s
//! `lazy_static! { static ref EXECUTOR: Mutex<Executor> }` pattern so
//! `start`'s background tick thread and caller-thread operations
//! (`create_task`, `suspend_task`, ...) serialize against each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use snafu::ResultExt;

use crate::error::{CreateTaskError, KernelError, TransformSnafu};
use crate::scheduler::Scheduler;
use crate::task::{Priority, TaskHandle, TaskSnapshot, TaskState};
use crate::transform::unit::{NativeUnit, RestartableUnit};
use crate::transform::{self, YieldMode};
use crate::value::Value;

/// `spec.md` §6's `SchedulerConfig`.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_tasks: Option<usize>,
    pub tick_rate: u32,
    pub stack_size: usize,
    pub idle_task_stack_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_tasks: None,
            tick_rate: 100,
            stack_size: 4096,
            idle_task_stack_size: 512,
        }
    }
}

/// `spec.md` §6's Kernel options (second constructor argument).
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelOptions {
    pub yield_all_statements: bool,
}

/// `spec.md` §6's `getSystemStatus()` return shape.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatus {
    pub is_running: bool,
    pub tick_count: u64,
    pub current_task: Option<TaskHandle>,
    pub ready_tasks: usize,
    pub blocked_tasks: usize,
    pub suspended_tasks: usize,
    pub total_tasks: usize,
}

struct State {
    scheduler: Scheduler,
    yield_mode: YieldMode,
    next_name: u64,
}

/// The public surface user code and the embedder call. See `spec.md` §4.5.
pub struct Kernel {
    state: Arc<Mutex<State>>,
    tick_rate: u32,
    running: Arc<AtomicBool>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Kernel {
    pub fn new(config: SchedulerConfig, options: KernelOptions) -> Result<Self, KernelError> {
        if config.tick_rate == 0 {
            return crate::error::InvalidTickRateSnafu {
                tick_rate: config.tick_rate,
            }
            .fail();
        }
        let yield_mode = if options.yield_all_statements {
            YieldMode::StatementLevel
        } else {
            YieldMode::DelayOnly
        };
        Ok(Self {
            state: Arc::new(Mutex::new(State {
                scheduler: Scheduler::new(),
                yield_mode,
                next_name: 1,
            })),
            tick_rate: config.tick_rate,
            running: Arc::new(AtomicBool::new(false)),
            driver: Mutex::new(None),
        })
    }

    /// Starts a background thread that calls [`Kernel::tick_once`] at
    /// `tickRate` Hz. A no-op if already running, per `spec.md` §5.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let period = Duration::from_secs_f64(1.0 / f64::from(self.tick_rate));
        let handle = thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                state.lock().unwrap().scheduler.tick();
                thread::sleep(period);
            }
        });
        *self.driver.lock().unwrap() = Some(handle);
    }

    /// Halts the background tick thread. A no-op if already stopped.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.driver.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    /// Advances the tick loop by exactly one tick. Exposed directly (not
    /// just as the internal detail of `start`'s background thread) so
    /// `spec.md` §8's deterministic "run N ticks" scenarios are testable.
    pub fn tick_once(&self) {
        self.state.lock().unwrap().scheduler.tick();
    }

    /// Parses and registers `source` as a new task body. `name` defaults to
    /// `Task_<n>` using a per-Kernel counter, per `spec.md` §4.5.
    pub fn create_task(
        &self,
        source: &str,
        priority: Priority,
        params: Option<Value>,
        name: Option<String>,
    ) -> Result<TaskHandle, CreateTaskError> {
        let mut state = self.state.lock().unwrap();
        let unit = transform::transform(source, state.yield_mode).context(TransformSnafu)?;
        let name = name.unwrap_or_else(|| {
            let n = state.next_name;
            state.next_name += 1;
            format!("Task_{n}")
        });
        let handle = state
            .scheduler
            .table
            .create(name, unit, priority, params.unwrap_or(Value::Undefined));
        Ok(handle)
    }

    /// Registers a plain Rust closure as a task body, bypassing the
    /// Transformer entirely. Used by embedders who are not handing in
    /// string-valued source, and by tests that want deterministic native
    /// tasks.
    pub fn create_native_task(
        &self,
        body: impl FnMut() + Send + 'static,
        priority: Priority,
        params: Option<Value>,
        name: Option<String>,
    ) -> TaskHandle {
        let mut state = self.state.lock().unwrap();
        let name = name.unwrap_or_else(|| {
            let n = state.next_name;
            state.next_name += 1;
            format!("Task_{n}")
        });
        let unit: Box<dyn RestartableUnit> = Box::new(NativeUnit::new(body));
        state
            .scheduler
            .table
            .create(name, unit, priority, params.unwrap_or(Value::Undefined))
    }

    pub fn delete_task(&self, handle: TaskHandle) -> bool {
        self.state.lock().unwrap().scheduler.table.delete(handle)
    }

    pub fn suspend_task(&self, handle: TaskHandle) -> bool {
        self.state.lock().unwrap().scheduler.table.suspend(handle)
    }

    pub fn resume_task(&self, handle: TaskHandle) -> bool {
        self.state.lock().unwrap().scheduler.table.resume(handle)
    }

    pub fn set_task_priority(&self, handle: TaskHandle, priority: Priority) -> bool {
        self.state.lock().unwrap().scheduler.table.set_priority(handle, priority)
    }

    pub fn get_tick_count(&self) -> u64 {
        self.state.lock().unwrap().scheduler.tick_count()
    }

    pub fn get_system_status(&self) -> SystemStatus {
        let state = self.state.lock().unwrap();
        let table = &state.scheduler.table;
        SystemStatus {
            is_running: self.running.load(Ordering::SeqCst),
            tick_count: state.scheduler.tick_count(),
            current_task: table.running(),
            ready_tasks: table.ready_count(),
            blocked_tasks: table.blocked_count(),
            suspended_tasks: table.suspended_count(),
            total_tasks: table.len(),
        }
    }

    pub fn get_task_info(&self, handle: TaskHandle) -> Option<TaskSnapshot> {
        self.state.lock().unwrap().scheduler.table.get(handle).map(TaskSnapshot::from)
    }

    pub fn get_all_tasks(&self) -> Vec<TaskSnapshot> {
        self.state
            .lock()
            .unwrap()
            .scheduler
            .table
            .all()
            .map(TaskSnapshot::from)
            .collect()
    }

    /// `spec.md` §4.4's `delay(n)` marker computation: `n` clamped to
    /// `>= 0`. This is the pure calculation the interpreter's canonical
    /// `__delay` call site and this facade method both perform; the "no-op
    /// outside a task context" boundary rule in §4.4 is enforced one layer
    /// down, by `TaskTable::block` refusing to block a task that isn't
    /// `READY`/`RUNNING`.
    pub fn delay(&self, n: i64) -> u64 {
        n.max(0) as u64
    }

    /// `spec.md` §8's round-trip law: `delayMs(ms) = delay(ceil(ms *
    /// tickRate / 1000))`.
    pub fn delay_ms(&self, ms: u64) -> u64 {
        let ticks = ((ms as f64) * f64::from(self.tick_rate) / 1000.0).ceil() as i64;
        self.delay(ticks)
    }

    /// Yields the currently running task back to ready, if any.
    pub fn yield_now(&self) {
        self.state.lock().unwrap().scheduler.table.yield_current();
    }

    pub fn set_yield_mode(&self, yield_all_statements: bool) {
        self.state.lock().unwrap().yield_mode = if yield_all_statements {
            YieldMode::StatementLevel
        } else {
            YieldMode::DelayOnly
        };
    }

    pub fn get_yield_mode(&self) -> bool {
        matches!(self.state.lock().unwrap().yield_mode, YieldMode::StatementLevel)
    }

    pub fn task_state(&self, handle: TaskHandle) -> Option<TaskState> {
        self.state.lock().unwrap().scheduler.table.get(handle).map(|t| t.state)
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        self.stop();
    }
}
