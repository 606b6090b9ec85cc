//! Task scheduling: the main-tick queue, delayed tasks, and worker lanes.
//!
//! This is a cooperative fan-in, not a thread pool. Producers are many (any
//! thread may queue work), consumers are exactly one per queue: the single
//! main tick, or the one thread owning a named lane. That gives every
//! consumer a data-race-free execution context without requiring handlers
//! to be written thread-safely.
//!
//! Every queue follows the swap-and-release pattern: the lock is held only
//! long enough to swap the queue's contents into a local batch, never while
//! a task executes. Tasks may therefore enqueue new work freely; it runs on
//! the next tick or wake, never in the current batch.

pub mod lane;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::console::log::MessageLog;
pub use lane::WorkerLane;

/// Default lane wake interval. Short enough that new work is picked up
/// promptly without a wake signal from every producer.
pub const DEFAULT_LANE_POLL: Duration = Duration::from_millis(50);

/// Bound on how long shutdown waits for a lane thread to observe its flag.
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("no worker lane named {0:?}")]
    LaneNotFound(String),
}

/// An opaque unit of work plus an optional error handler.
///
/// A task is owned by whichever queue currently holds it; ownership moves
/// into the executing context on dequeue. A panicking task is caught at the
/// queue boundary: its error handler (if any) receives the panic message,
/// otherwise the message goes to the log. Either way the rest of the batch
/// still runs.
pub struct Task {
    work: Box<dyn FnOnce() + Send + 'static>,
    on_error: Option<Box<dyn FnOnce(String) + Send + 'static>>,
}

impl Task {
    pub fn new(work: impl FnOnce() + Send + 'static) -> Self {
        Self {
            work: Box::new(work),
            on_error: None,
        }
    }

    pub fn with_error_handler(
        work: impl FnOnce() + Send + 'static,
        on_error: impl FnOnce(String) + Send + 'static,
    ) -> Self {
        Self {
            work: Box::new(work),
            on_error: Some(Box::new(on_error)),
        }
    }

    pub(crate) fn run(self, log: &MessageLog, source: &str) {
        let Task { work, on_error } = self;
        if let Err(payload) = catch_unwind(AssertUnwindSafe(work)) {
            let message = panic_text(payload.as_ref());
            match on_error {
                Some(handler) => {
                    if catch_unwind(AssertUnwindSafe(|| handler(message.clone()))).is_err() {
                        log.error(format!("task error handler panicked on {source}: {message}"));
                    }
                }
                None => log.error(format!("task panicked on {source}: {message}")),
            }
        }
    }
}

pub(crate) fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct DelayedTask {
    fire_at: Instant,
    task: Task,
}

/// Marshals work from arbitrary threads onto serialized execution points.
pub struct Scheduler {
    main: Mutex<Vec<Task>>,
    delayed: Mutex<Vec<DelayedTask>>,
    lanes: Mutex<HashMap<String, WorkerLane>>,
    lane_poll: Duration,
    log: Arc<MessageLog>,
}

impl Scheduler {
    #[must_use]
    pub fn new(log: Arc<MessageLog>) -> Self {
        Self::with_lane_poll(log, DEFAULT_LANE_POLL)
    }

    #[must_use]
    pub fn with_lane_poll(log: Arc<MessageLog>, lane_poll: Duration) -> Self {
        Self {
            main: Mutex::new(Vec::new()),
            delayed: Mutex::new(Vec::new()),
            lanes: Mutex::new(HashMap::new()),
            lane_poll,
            log,
        }
    }

    /// Append a task to the main queue. Thread-safe. The task executes on
    /// the next tick, FIFO relative to other calls from the same producer.
    pub fn queue_on_main(&self, task: Task) {
        self.main.lock().expect("main queue poisoned").push(task);
    }

    /// Queue a task to run once `delay` has elapsed. A zero delay behaves
    /// exactly like [`Scheduler::queue_on_main`].
    pub fn queue_on_main_delayed(&self, task: Task, delay: Duration) {
        if delay.is_zero() {
            self.queue_on_main(task);
            return;
        }
        self.delayed
            .lock()
            .expect("delayed queue poisoned")
            .push(DelayedTask {
                fire_at: Instant::now() + delay,
                task,
            });
    }

    /// Drain and execute the main queue, then any delayed tasks that became
    /// due. Must be called from the single main execution context, once per
    /// host frame/step.
    ///
    /// The queue contents are swapped out before execution, so tasks
    /// enqueued *during* draining run on the next tick, never the current
    /// one. A panicking task is caught and does not stop the batch.
    pub fn tick(&self) {
        let batch: Vec<Task> = {
            let mut main = self.main.lock().expect("main queue poisoned");
            std::mem::take(&mut *main)
        };
        for task in batch {
            task.run(&self.log, "main");
        }

        let now = Instant::now();
        let due: Vec<Task> = {
            let mut delayed = self.delayed.lock().expect("delayed queue poisoned");
            let mut due = Vec::new();
            let mut i = 0;
            while i < delayed.len() {
                if delayed[i].fire_at <= now {
                    due.push(delayed.remove(i).task);
                } else {
                    i += 1;
                }
            }
            due
        };
        for task in due {
            task.run(&self.log, "main");
        }
    }

    /// Create a worker lane under `name` if absent. Idempotent: a second
    /// call for the same name is a no-op, not an error.
    pub fn create_lane(&self, name: &str) {
        let mut lanes = self.lanes.lock().expect("lane registry poisoned");
        if !lanes.contains_key(name) {
            debug!("creating lane {name}");
            lanes.insert(
                name.to_string(),
                WorkerLane::spawn(name, self.lane_poll, Arc::clone(&self.log)),
            );
        }
    }

    /// Append a task to the named lane's queue. The lane-not-found case is
    /// logged and returned; the task is dropped, never executed.
    pub fn queue_async(&self, name: &str, task: Task) -> Result<(), ScheduleError> {
        let lanes = self.lanes.lock().expect("lane registry poisoned");
        match lanes.get(name) {
            Some(lane) => {
                lane.enqueue(task);
                Ok(())
            }
            None => {
                self.log.error(format!("failed to locate lane {name}"));
                Err(ScheduleError::LaneNotFound(name.to_string()))
            }
        }
    }

    #[must_use]
    pub fn has_lane(&self, name: &str) -> bool {
        self.lanes
            .lock()
            .expect("lane registry poisoned")
            .contains_key(name)
    }

    /// Lane names with their queued task counts, sorted by name.
    #[must_use]
    pub fn lane_depths(&self) -> Vec<(String, usize)> {
        let lanes = self.lanes.lock().expect("lane registry poisoned");
        let mut depths: Vec<(String, usize)> = lanes
            .values()
            .map(|lane| (lane.name().to_string(), lane.pending()))
            .collect();
        depths.sort();
        depths
    }

    /// Tasks currently waiting on the main queue.
    #[must_use]
    pub fn main_pending(&self) -> usize {
        self.main.lock().expect("main queue poisoned").len()
    }

    /// Stop all lane threads cooperatively and discard unexecuted work in
    /// every queue. Lanes exit at their next wake; a task mid-execution is
    /// never interrupted, only waited on (bounded).
    pub fn shutdown(&self) {
        let lanes: Vec<WorkerLane> = {
            let mut map = self.lanes.lock().expect("lane registry poisoned");
            map.drain().map(|(_, lane)| lane).collect()
        };
        for lane in lanes {
            lane.stop(SHUTDOWN_JOIN_TIMEOUT);
        }
        self.main.lock().expect("main queue poisoned").clear();
        self.delayed.lock().expect("delayed queue poisoned").clear();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn scheduler() -> (Arc<MessageLog>, Scheduler) {
        let log = Arc::new(MessageLog::new());
        let scheduler = Scheduler::with_lane_poll(Arc::clone(&log), Duration::from_millis(10));
        (log, scheduler)
    }

    #[test]
    fn test_main_queue_runs_in_submission_order() {
        let (_log, scheduler) = scheduler();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = Arc::clone(&seen);
            scheduler.queue_on_main(Task::new(move || seen.lock().unwrap().push(i)));
        }
        scheduler.tick();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_tasks_enqueued_during_tick_run_next_tick() {
        let (_log, scheduler) = scheduler();
        let scheduler = Arc::new(scheduler);
        let count = Arc::new(AtomicUsize::new(0));

        let inner_count = Arc::clone(&count);
        let inner_scheduler = Arc::clone(&scheduler);
        scheduler.queue_on_main(Task::new(move || {
            let count = Arc::clone(&inner_count);
            inner_scheduler.queue_on_main(Task::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        scheduler.tick();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        scheduler.tick();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_task_runs_exactly_once() {
        let (_log, scheduler) = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = Arc::clone(&count);
        scheduler.queue_on_main(Task::new(move || {
            task_count.fetch_add(1, Ordering::SeqCst);
        }));
        scheduler.tick();
        scheduler.tick();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delayed_task_waits_for_fire_time() {
        let (_log, scheduler) = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));
        let task_fired = Arc::clone(&fired);
        scheduler.queue_on_main_delayed(
            Task::new(move || {
                task_fired.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::from_millis(40),
        );

        scheduler.tick();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        thread::sleep(Duration::from_millis(60));
        scheduler.tick();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_delay_behaves_like_queue_on_main() {
        let (_log, scheduler) = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));
        let task_fired = Arc::clone(&fired);
        scheduler.queue_on_main_delayed(
            Task::new(move || {
                task_fired.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::ZERO,
        );
        scheduler.tick();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_task_does_not_stop_batch() {
        let (log, scheduler) = scheduler();
        let after = Arc::new(AtomicUsize::new(0));
        scheduler.queue_on_main(Task::new(|| panic!("deliberate")));
        let task_after = Arc::clone(&after);
        scheduler.queue_on_main(Task::new(move || {
            task_after.fetch_add(1, Ordering::SeqCst);
        }));

        scheduler.tick();
        assert_eq!(after.load(Ordering::SeqCst), 1);
        assert!(log
            .snapshot()
            .iter()
            .any(|entry| entry.text.contains("deliberate")));
    }

    #[test]
    fn test_error_handler_receives_panic_message() {
        let (_log, scheduler) = scheduler();
        let captured = Arc::new(Mutex::new(String::new()));
        let handler_captured = Arc::clone(&captured);
        scheduler.queue_on_main(Task::with_error_handler(
            || panic!("boom in task"),
            move |message| {
                *handler_captured.lock().unwrap() = message;
            },
        ));
        scheduler.tick();
        assert_eq!(*captured.lock().unwrap(), "boom in task");
    }

    #[test]
    fn test_create_lane_is_idempotent() {
        let (_log, scheduler) = scheduler();
        scheduler.create_lane("io");
        scheduler.create_lane("io");
        assert_eq!(scheduler.lane_depths().len(), 1);
        scheduler.shutdown();
    }

    #[test]
    fn test_lane_executes_queued_tasks() {
        let (_log, scheduler) = scheduler();
        scheduler.create_lane("work");
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            scheduler
                .queue_async(
                    "work",
                    Task::new(move || {
                        count.fetch_add(1, Ordering::SeqCst);
                    }),
                )
                .unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while count.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
        scheduler.shutdown();
    }

    #[test]
    fn test_queue_async_missing_lane_never_executes() {
        let (log, scheduler) = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));
        let task_fired = Arc::clone(&fired);
        let result = scheduler.queue_async(
            "missing",
            Task::new(move || {
                task_fired.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(
            result,
            Err(ScheduleError::LaneNotFound("missing".to_string()))
        );

        thread::sleep(Duration::from_millis(50));
        scheduler.tick();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(log
            .snapshot()
            .iter()
            .any(|entry| entry.text.contains("missing")));
    }

    #[test]
    fn test_shutdown_discards_pending_work() {
        let (_log, scheduler) = scheduler();
        scheduler.create_lane("slow");
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = Arc::clone(&count);
        scheduler.queue_on_main(Task::new(move || {
            task_count.fetch_add(1, Ordering::SeqCst);
        }));
        scheduler.shutdown();
        scheduler.tick();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!scheduler.has_lane("slow"));
    }
}
