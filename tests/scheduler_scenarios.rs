//! End-to-end scenarios from `spec.md` §8, driven through the public
//! [`rtos_core::Kernel`] facade with `tick_once` for determinism.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rtos_core::{Kernel, KernelOptions, SchedulerConfig, TaskHandle, TaskState};

fn kernel(tick_rate: u32) -> Kernel {
    Kernel::new(
        SchedulerConfig {
            tick_rate,
            ..Default::default()
        },
        KernelOptions::default(),
    )
    .unwrap()
}

/// Returns the handle whose `run_count` increased since `before`, i.e. the
/// task the scheduler advanced during the tick that produced `after`.
fn ran_this_tick(before: &HashMap<TaskHandle, u64>, k: &Kernel) -> Option<String> {
    for snap in k.get_all_tasks() {
        if snap.run_count > *before.get(&snap.handle).unwrap_or(&0) {
            return Some(snap.name);
        }
    }
    None
}

fn run_counts(k: &Kernel) -> HashMap<TaskHandle, u64> {
    k.get_all_tasks().into_iter().map(|s| (s.handle, s.run_count)).collect()
}

#[test]
fn priority_preemption() {
    let k = kernel(100);

    let a = k
        .create_task(
            "function(rtos) { while (true) { rtos.delay(5); } }",
            10,
            None,
            Some("A".into()),
        )
        .unwrap();
    k.create_task(
        "function(rtos) { while (true) { rtos.delay(0); } }",
        3,
        None,
        Some("B".into()),
    )
    .unwrap();

    let mut order = Vec::new();
    for _ in 0..6 {
        let before = run_counts(&k);
        k.tick_once();
        order.push(ran_this_tick(&before, &k));
    }

    // A runs tick 1 then blocks for 5 ticks; B fills ticks 2-5; A's delay
    // expires and it runs again at tick 6.
    assert_eq!(
        order,
        vec![
            Some("A".to_string()),
            Some("B".to_string()),
            Some("B".to_string()),
            Some("B".to_string()),
            Some("B".to_string()),
            Some("A".to_string()),
        ]
    );
    assert_eq!(k.task_state(a), Some(TaskState::Blocked));
}

#[test]
fn round_robin_among_equals() {
    let k = kernel(100);
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for name in ["A", "B", "C"] {
        let order = Arc::clone(&order);
        handles.push(k.create_native_task(
            move || order.lock().unwrap().push(name),
            5,
            None,
            Some(name.into()),
        ));
    }

    for _ in 0..6 {
        k.tick_once();
    }

    // Each native task completes (and is deleted) on its first step, so the
    // recorded order is simply FIFO creation order; fair rotation among
    // equals that actually persist across ticks is covered below.
    assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C"]);
    for h in handles {
        assert!(k.get_task_info(h).is_none());
    }
}

#[test]
fn round_robin_among_persistent_equals() {
    let k = kernel(100);
    for name in ["A", "B", "C"] {
        k.create_task(
            "function(rtos) { while (true) { rtos.delay(0); } }",
            5,
            None,
            Some(name.into()),
        )
        .unwrap();
    }

    let mut run_order = Vec::new();
    for _ in 0..6 {
        let before = run_counts(&k);
        k.tick_once();
        run_order.push(ran_this_tick(&before, &k).unwrap());
    }

    assert_eq!(run_order, vec!["A", "B", "C", "A", "B", "C"]);
}

#[test]
fn suspend_resume_round_trip() {
    let k = kernel(100);

    let a = k
        .create_task(
            "function(rtos) { \
                let i = 0; \
                while (i < 10) { \
                    i = i + 1; \
                    rtos.delay(1); \
                } \
            }",
            5,
            None,
            Some("A".into()),
        )
        .unwrap();

    for _ in 0..3 {
        k.tick_once();
    }
    assert!(k.suspend_task(a));
    assert_eq!(k.task_state(a), Some(TaskState::Suspended));

    let frozen_run_count = k.get_task_info(a).unwrap().run_count;
    for _ in 0..5 {
        k.tick_once();
    }
    // Still suspended; nothing observable changed.
    assert_eq!(k.task_state(a), Some(TaskState::Suspended));
    assert_eq!(k.get_task_info(a).unwrap().run_count, frozen_run_count);

    assert!(k.resume_task(a));
    assert_eq!(k.task_state(a), Some(TaskState::Ready));

    for _ in 0..40 {
        k.tick_once();
        if k.get_task_info(a).is_none() {
            break;
        }
    }
    assert!(k.get_task_info(a).is_none(), "task should have completed and been deleted");
}

#[test]
fn statement_level_transform_yields_once_per_statement() {
    let k = Kernel::new(
        SchedulerConfig {
            tick_rate: 100,
            ..Default::default()
        },
        KernelOptions {
            yield_all_statements: true,
        },
    )
    .unwrap();

    k.create_task(
        "function(rtos) { let x = 1; x = x + 1; rtos.delay(2); x = x + 1; }",
        5,
        None,
        Some("A".into()),
    )
    .unwrap();

    // 4 suspensions (3 statements + the delay) before the task completes:
    // ticks 1-2 run the two plain statements, tick 3 hits the delay and
    // blocks for 2 ticks, tick 6 runs the final statement and completes.
    for _ in 0..6 {
        k.tick_once();
    }
    assert_eq!(k.get_system_status().total_tasks, 1, "only the idle task should remain");
}

#[test]
fn delay_ms_conversion() {
    let k = kernel(10);
    assert_eq!(k.delay_ms(250), 3);
}

#[test]
fn task_error_isolation() {
    let k = kernel(100);
    let b_ran = Arc::new(AtomicU32::new(0));
    let b_ran_clone = Arc::clone(&b_ran);

    let a = k
        .create_task(
            "function(rtos) { rtos.delay(1); let x = y + 1; }",
            5,
            None,
            Some("A".into()),
        )
        .unwrap();
    k.create_native_task(
        move || {
            b_ran_clone.fetch_add(1, Ordering::SeqCst);
        },
        5,
        None,
        Some("B".into()),
    );

    for _ in 0..5 {
        k.tick_once();
    }

    assert!(k.get_task_info(a).is_none(), "A should have been deleted after raising");
    assert!(b_ran.load(Ordering::SeqCst) >= 1, "B should be unaffected by A's failure");
}

#[test]
fn delay_zero_is_a_plain_yield_not_a_block() {
    let k = kernel(100);
    let a = k
        .create_task("function(rtos) { rtos.delay(0); }", 5, None, Some("A".into()))
        .unwrap();
    k.tick_once();
    // delay(0) never blocks; the task is requeued to READY instead.
    assert_eq!(k.task_state(a), Some(TaskState::Ready));
    k.tick_once();
    // Its single statement was already consumed, so the second step
    // completes the body and it is deleted.
    assert!(k.get_task_info(a).is_none());
}

#[test]
fn idle_alone_keeps_ticking() {
    let k = kernel(100);
    for _ in 0..50 {
        k.tick_once();
    }
    assert_eq!(k.get_tick_count(), 50);
    assert_eq!(k.get_system_status().total_tasks, 1);
}

#[test]
fn delay_only_mode_is_a_no_op_on_a_body_with_no_delay_calls() {
    let k = kernel(100);
    let a = k
        .create_task("{ let x = 1; x = x + 1; }", 5, None, Some("A".into()))
        .unwrap();
    k.tick_once();
    assert!(k.get_task_info(a).is_none(), "a body with no delay calls completes in one step");
}
