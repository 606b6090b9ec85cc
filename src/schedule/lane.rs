//! Named background worker lanes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::console::log::MessageLog;
use crate::schedule::Task;

/// A dedicated background thread draining its own task queue.
///
/// The thread wakes on a fixed short poll interval, swaps the queue into a
/// local batch under the lock, releases the lock, then executes each task
/// with per-task panic isolation. Tasks enqueued while a batch is running
/// land in the real queue and run on a later wake.
pub struct WorkerLane {
    name: String,
    queue: Arc<Mutex<Vec<Task>>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerLane {
    pub(crate) fn spawn(name: &str, poll: Duration, log: Arc<MessageLog>) -> Self {
        let queue = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));

        let thread_queue = Arc::clone(&queue);
        let thread_running = Arc::clone(&running);
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(format!("lane-{name}"))
            .spawn(move || {
                debug!("lane {thread_name} started");
                while thread_running.load(Ordering::SeqCst) {
                    let batch: Vec<Task> = {
                        let mut queue = thread_queue.lock().expect("lane queue poisoned");
                        std::mem::take(&mut *queue)
                    };
                    for task in batch {
                        task.run(&log, &thread_name);
                    }
                    thread::sleep(poll);
                }
                debug!("lane {thread_name} stopped");
            })
            .expect("failed to spawn lane thread");

        Self {
            name: name.to_string(),
            queue,
            running,
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn enqueue(&self, task: Task) {
        self.queue.lock().expect("lane queue poisoned").push(task);
    }

    /// Number of tasks waiting for the next wake.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.lock().expect("lane queue poisoned").len()
    }

    /// Cooperative stop: flip the running flag, discard queued work, then
    /// wait up to `timeout` for the thread to observe the flag at its next
    /// wake. A task already executing is never interrupted.
    pub(crate) fn stop(mut self, timeout: Duration) {
        self.running.store(false, Ordering::SeqCst);
        self.queue.lock().expect("lane queue poisoned").clear();

        if let Some(handle) = self.handle.take() {
            let deadline = Instant::now() + timeout;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                warn!("lane {} did not stop within {:?}", self.name, timeout);
            }
        }
    }
}
