//! Plugin loading and the live plugin set.

pub mod api;
pub mod loader;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use libloading::Library;
use thiserror::Error;

use crate::console::log::MessageLog;
use crate::schedule::panic_text;
pub use api::{Plugin, PluginEntry, PluginRegistrar, PLUGIN_ENTRY_SYMBOL};
pub use loader::DiscoveredPlugin;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("a plugin named {0:?} is already loaded")]
    DuplicateName(String),
}

/// One live plugin.
///
/// Field order matters: the boxed instance must drop before the library
/// whose code it points into.
struct PluginInstance {
    instance: Box<dyn Plugin>,
    _library: Option<Arc<Library>>,
    name: String,
    version: String,
}

/// The loaded plugin set, in load order.
///
/// Plugin names are unique; a later plugin arriving under an existing name
/// is rejected and the first instance kept. The whole set is discarded and
/// rebuilt on reload, never diffed.
pub struct PluginSet {
    log: Arc<MessageLog>,
    plugins: Mutex<Vec<PluginInstance>>,
}

impl PluginSet {
    #[must_use]
    pub fn new(log: Arc<MessageLog>) -> Self {
        Self {
            log,
            plugins: Mutex::new(Vec::new()),
        }
    }

    /// Add an initialized plugin to the set. Rejects duplicate names,
    /// keeping the pre-existing instance unchanged.
    pub(crate) fn insert(
        &self,
        instance: Box<dyn Plugin>,
        library: Option<Arc<Library>>,
    ) -> Result<(), PluginError> {
        let name = instance.name().to_string();
        let version = instance.version().to_string();

        let mut plugins = self.plugins.lock().expect("plugin set poisoned");
        if plugins.iter().any(|plugin| plugin.name == name) {
            return Err(PluginError::DuplicateName(name));
        }
        plugins.push(PluginInstance {
            instance,
            _library: library,
            name,
            version,
        });
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.plugins
            .lock()
            .expect("plugin set poisoned")
            .iter()
            .any(|plugin| plugin.name == name)
    }

    /// `(name, version)` pairs in load order.
    #[must_use]
    pub fn names(&self) -> Vec<(String, String)> {
        self.plugins
            .lock()
            .expect("plugin set poisoned")
            .iter()
            .map(|plugin| (plugin.name.clone(), plugin.version.clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.lock().expect("plugin set poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route a free-text message to every plugin's `submit`, in load order.
    ///
    /// Broadcast, not first-wins: a plugin reporting the message as handled
    /// does not stop later plugins from receiving it. A panicking plugin is
    /// logged and skipped for this message only.
    pub fn broadcast(&self, message: &str) {
        let mut plugins = self.plugins.lock().expect("plugin set poisoned");
        for plugin in plugins.iter_mut() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                plugin.instance.submit(message);
            }));
            if let Err(payload) = outcome {
                self.log.error(format!(
                    "plugin {} panicked in submit: {}",
                    plugin.name,
                    panic_text(payload.as_ref())
                ));
            }
        }
    }

    /// Drop every plugin (instances first, then their libraries).
    pub(crate) fn clear(&self) {
        self.plugins.lock().expect("plugin set poisoned").clear();
    }
}
