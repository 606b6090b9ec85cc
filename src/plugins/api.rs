//! The plugin contract.
//!
//! Plugins are compiled against this stable interface and register
//! themselves explicitly through a [`PluginRegistrar`], either from a
//! dynamic library's exported entry point or statically via
//! `Host::install_plugin`. There is no runtime type scanning.

use anyhow::Result;

use crate::host::HostHandle;

/// Interface every plugin implements.
///
/// `init` runs synchronously on the main context during instantiation and
/// receives the handle the plugin uses to register commands, queue work and
/// log. `submit` receives free-text (non-command) messages broadcast by the
/// host; the return value reports whether the plugin handled the message.
pub trait Plugin: Send {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn init(&mut self, host: &HostHandle) -> Result<()>;

    fn submit(&mut self, message: &str) -> bool;
}

/// Collects plugin registrations from a library's entry point. One library
/// may register any number of plugins.
pub struct PluginRegistrar {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistrar {
    pub(crate) fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub(crate) fn into_plugins(self) -> Vec<Box<dyn Plugin>> {
        self.plugins
    }
}

/// Function signature for the entry point a plugin library exports.
pub type PluginEntry = unsafe fn(&mut PluginRegistrar);

/// Symbol name the loader looks up in each plugin library.
pub const PLUGIN_ENTRY_SYMBOL: &[u8] = b"_plugin_entry";
