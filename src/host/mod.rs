//! The host aggregate.
//!
//! One explicitly constructed [`Host`] owns the scheduler, console, plugin
//! set and alias store; plugins receive a [`HostHandle`] at init time. This
//! replaces the hidden-global-singleton shape such systems usually grow:
//! single-instance-per-process stays a convention of the embedder, not a
//! property baked into statics.

mod builtins;
pub mod handle;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use libloading::Library;
use tracing::debug;

use crate::alias::AliasStore;
use crate::config::Config;
use crate::console::log::{FileMirror, MessageLog};
use crate::console::Console;
use crate::plugins::{loader, Plugin, PluginError, PluginSet};
use crate::schedule::{panic_text, Scheduler};
pub use handle::HostHandle;

/// Shared interior of the host. Everything a handle or built-in command can
/// reach lives here, behind one `Arc`.
pub struct HostCore {
    config: Config,
    log: Arc<MessageLog>,
    scheduler: Scheduler,
    console: Console,
    aliases: AliasStore,
    plugins: PluginSet,
    running: AtomicBool,
}

impl HostCore {
    pub(crate) fn log(&self) -> &Arc<MessageLog> {
        &self.log
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub(crate) fn console(&self) -> &Console {
        &self.console
    }

    pub(crate) fn aliases(&self) -> &AliasStore {
        &self.aliases
    }

    pub(crate) fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    pub(crate) fn dispatch(&self, line: &str) -> String {
        self.console.dispatch(line, &self.aliases)
    }

    pub(crate) fn submit(&self, message: &str) {
        let trimmed = message.trim();
        if trimmed.starts_with('/') {
            self.dispatch(trimmed);
        } else if !trimmed.is_empty() {
            self.plugins.broadcast(trimmed);
        }
    }

    pub(crate) fn request_exit(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub(crate) fn should_exit(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }

    /// Initialize a plugin and add it to the set. One misbehaving plugin —
    /// an `Err` from init, a panic, a duplicate name — is logged and
    /// dropped without disturbing the rest.
    fn attach(self: &Arc<Self>, plugin: Box<dyn Plugin>, library: Option<Arc<Library>>) {
        let name = plugin.name().to_string();
        if self.plugins.contains(&name) {
            self.log.error(format!(
                "a plugin named {name:?} is already loaded; dropping the later one"
            ));
            return;
        }

        let handle = HostHandle::new(self);
        let mut plugin = plugin;
        let outcome = catch_unwind(AssertUnwindSafe(move || {
            let result = plugin.init(&handle);
            (plugin, result)
        }));
        match outcome {
            Ok((plugin, Ok(()))) => {
                let version = plugin.version().to_string();
                match self.plugins.insert(plugin, library) {
                    Ok(()) => self.log.system(format!("loaded plugin {name} v{version}")),
                    Err(e) => self.log.error(e.to_string()),
                }
            }
            Ok((_, Err(e))) => self
                .log
                .error(format!("plugin {name} failed to initialize: {e:#}")),
            Err(payload) => self.log.error(format!(
                "plugin {name} panicked during init: {}",
                panic_text(payload.as_ref())
            )),
        }
    }

    pub(crate) fn load_plugins(self: &Arc<Self>) {
        let dir = self.config.plugins.dir.clone();
        self.log
            .system(format!("searching {} for plugins", dir.display()));
        match loader::load_directory(&dir, &self.log) {
            Ok(discovered) => {
                for found in discovered {
                    self.attach(found.plugin, Some(found.library));
                }
                self.log
                    .system(format!("Loaded {} plugins.", self.plugins.len()));
            }
            Err(e) => self.log.error(e.to_string()),
        }
    }

    /// Full stop-the-world plugin replace: the previous plugin set and
    /// every registered command are discarded, built-ins are re-seeded,
    /// aliases re-read, and discovery runs again from scratch.
    pub(crate) fn reload(self: &Arc<Self>) {
        self.log.system("reloading plugins.");
        self.plugins.clear();
        self.console.registry().clear();
        builtins::seed(self);
        if let Err(e) = self.aliases.reload() {
            debug!("alias reload skipped: {e}");
        }
        self.load_plugins();
    }
}

/// An embeddable extension host.
///
/// The embedding application owns the `Host`, drives [`Host::tick`] from
/// its main loop, feeds input to [`Host::dispatch`]/[`Host::submit`], and
/// renders [`MessageLog`] snapshots however it likes. Omitting the tick
/// starves all main-queued and delayed work; there is no internal driver.
pub struct Host {
    core: Arc<HostCore>,
}

impl Host {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let mut log = MessageLog::with_capacity(
            config.console.log_capacity,
            config.console.log_evict_block,
        );
        if config.log_file.enabled {
            log = log.with_mirror(FileMirror::new(
                &config.log_file.dir,
                config.log_file.stem.clone(),
                config.log_file.level,
            ));
        }
        let log = Arc::new(log);

        let scheduler = Scheduler::with_lane_poll(
            Arc::clone(&log),
            Duration::from_millis(config.schedule.lane_poll_ms),
        );
        let console = Console::with_history_limit(Arc::clone(&log), config.console.history_limit);
        let aliases = AliasStore::open(&config.aliases.file);
        let plugins = PluginSet::new(Arc::clone(&log));

        let core = Arc::new(HostCore {
            config,
            log,
            scheduler,
            console,
            aliases,
            plugins,
            running: AtomicBool::new(true),
        });
        builtins::seed(&core);
        core.log
            .system(format!("emberhost v{} started.", env!("CARGO_PKG_VERSION")));

        Self { core }
    }

    /// A handle suitable for passing to plugins or background producers.
    #[must_use]
    pub fn handle(&self) -> HostHandle {
        HostHandle::new(&self.core)
    }

    #[must_use]
    pub fn log(&self) -> &Arc<MessageLog> {
        self.core.log()
    }

    #[must_use]
    pub fn console(&self) -> &Console {
        self.core.console()
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        self.core.scheduler()
    }

    #[must_use]
    pub fn aliases(&self) -> &AliasStore {
        self.core.aliases()
    }

    /// `(name, version)` of every loaded plugin, in load order.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<(String, String)> {
        self.core.plugins().names()
    }

    /// Discover and initialize plugins from the configured directory.
    pub fn load_plugins(&self) {
        self.core.load_plugins();
    }

    /// Register a statically linked plugin through the same contract the
    /// dynamic loader uses. Returns the duplicate-name rejection, which is
    /// also logged.
    pub fn install_plugin(&self, plugin: Box<dyn Plugin>) -> Result<(), PluginError> {
        let name = plugin.name().to_string();
        if self.core.plugins().contains(&name) {
            let err = PluginError::DuplicateName(name);
            self.core.log().error(err.to_string());
            return Err(err);
        }
        self.core.attach(plugin, None);
        Ok(())
    }

    /// Discard and re-discover the whole plugin set.
    pub fn reload(&self) {
        self.core.reload();
    }

    /// Execute one console input line, returning the user-visible result.
    pub fn dispatch(&self, line: &str) -> String {
        self.core.dispatch(line)
    }

    /// Route free text: commands dispatch, everything else broadcasts to
    /// plugins.
    pub fn submit(&self, message: &str) {
        self.core.submit(message);
    }

    /// Drain the scheduler once. Call from the single main execution
    /// context, once per frame/step.
    pub fn tick(&self) {
        self.core.scheduler.tick();
    }

    /// Whether an `exit` command (or `HostHandle::request_exit`) asked the
    /// embedder to stop.
    #[must_use]
    pub fn should_exit(&self) -> bool {
        self.core.should_exit()
    }

    pub fn request_exit(&self) {
        self.core.request_exit();
    }

    /// Stop lane threads and discard pending work. Called once at
    /// teardown; the scheduler also shuts itself down on drop.
    pub fn shutdown(&self) {
        self.core.request_exit();
        self.core.scheduler.shutdown();
        self.core.log.system("host stopped.");
    }
}
