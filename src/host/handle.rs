//! The handle plugins use to talk back to the host.

use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::console::registry::CommandDescriptor;
use crate::host::HostCore;
use crate::schedule::{ScheduleError, Task};

/// Cloneable capability handle passed to every plugin at `init` time.
///
/// Holds only a weak reference to the host core, so a handle squirrelled
/// away inside a plugin cannot keep a torn-down host alive. After the host
/// is gone every method degrades to a no-op; queued tasks are dropped, the
/// same way shutdown drops pending work.
#[derive(Clone)]
pub struct HostHandle {
    core: Weak<HostCore>,
}

impl HostHandle {
    pub(crate) fn new(core: &Arc<HostCore>) -> Self {
        Self {
            core: Arc::downgrade(core),
        }
    }

    fn core(&self) -> Option<Arc<HostCore>> {
        self.core.upgrade()
    }

    /// Register a command in the global registry. See
    /// [`crate::console::CommandRegistry::register`] for the duplicate-name
    /// rules.
    pub fn register_command(&self, descriptor: CommandDescriptor) {
        if let Some(core) = self.core() {
            core.console().registry().register(descriptor);
        }
    }

    pub fn unregister_command(&self, name: &str) {
        if let Some(core) = self.core() {
            core.console().registry().unregister(name);
        }
    }

    /// Queue a task for the next main tick. Safe from any thread.
    pub fn queue_on_main(&self, task: Task) {
        if let Some(core) = self.core() {
            core.scheduler().queue_on_main(task);
        }
    }

    /// Queue a task to run on the main tick once `delay` has elapsed.
    pub fn queue_on_main_delayed(&self, task: Task, delay: Duration) {
        if let Some(core) = self.core() {
            core.scheduler().queue_on_main_delayed(task, delay);
        }
    }

    /// Idempotently create a named worker lane.
    pub fn create_lane(&self, name: &str) {
        if let Some(core) = self.core() {
            core.scheduler().create_lane(name);
        }
    }

    /// Queue a task onto a named worker lane.
    pub fn queue_async(&self, lane: &str, task: Task) -> Result<(), ScheduleError> {
        match self.core() {
            Some(core) => core.scheduler().queue_async(lane, task),
            None => Ok(()),
        }
    }

    /// Execute a command line through the console.
    pub fn dispatch(&self, line: &str) -> String {
        self.core()
            .map(|core| core.dispatch(line))
            .unwrap_or_default()
    }

    /// Submit free text: `/`-prefixed lines dispatch as commands, anything
    /// else is broadcast to every loaded plugin.
    pub fn submit(&self, message: &str) {
        if let Some(core) = self.core() {
            core.submit(message);
        }
    }

    /// Write a plain line to the console.
    pub fn print(&self, text: impl Into<String>) {
        if let Some(core) = self.core() {
            core.log().log(text);
        }
    }

    pub fn log(&self, text: impl Into<String>) {
        if let Some(core) = self.core() {
            core.log().log(text);
        }
    }

    pub fn log_warning(&self, text: impl Into<String>) {
        if let Some(core) = self.core() {
            core.log().warning(text);
        }
    }

    pub fn log_error(&self, text: impl Into<String>) {
        if let Some(core) = self.core() {
            core.log().error(text);
        }
    }

    pub fn log_system(&self, text: impl Into<String>) {
        if let Some(core) = self.core() {
            core.log().system(text);
        }
    }

    pub fn log_debug(&self, text: impl Into<String>) {
        if let Some(core) = self.core() {
            core.log().debug(text);
        }
    }

    /// Names of every loaded plugin, in load order.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<String> {
        self.core()
            .map(|core| {
                core.plugins()
                    .names()
                    .into_iter()
                    .map(|(name, _version)| name)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ask the embedding application to stop driving the host.
    pub fn request_exit(&self) {
        if let Some(core) = self.core() {
            core.request_exit();
        }
    }
}
