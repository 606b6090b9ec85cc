//! Command registry: name → handler + metadata, grouped by owning plugin.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Handler invoked with the full argument vector, command token included at
/// index 0. The returned text is logged as command output; an `Err` becomes
/// a user-visible error entry.
pub type CommandFn = Arc<dyn Fn(&[String]) -> anyhow::Result<String> + Send + Sync>;

/// Metadata record describing a registered command.
#[derive(Clone)]
pub struct CommandDescriptor {
    /// Owning plugin name ("core" for built-ins).
    pub plugin: String,
    /// Command name; lower-cased at construction, globally unique.
    pub name: String,
    /// Argument usage string, `<>` = required, `[]` = optional.
    pub usage: String,
    pub summary: String,
    pub long_help: String,
    pub handler: CommandFn,
}

impl CommandDescriptor {
    pub fn new(
        plugin: impl Into<String>,
        name: impl Into<String>,
        usage: impl Into<String>,
        summary: impl Into<String>,
        handler: CommandFn,
    ) -> Self {
        Self {
            plugin: plugin.into(),
            name: name.into().to_lowercase(),
            usage: usage.into(),
            summary: summary.into(),
            long_help: String::new(),
            handler,
        }
    }

    #[must_use]
    pub fn with_long_help(mut self, long_help: impl Into<String>) -> Self {
        self.long_help = long_help.into();
        self
    }
}

struct RegistryState {
    handlers: HashMap<String, CommandFn>,
    descriptors: HashMap<String, CommandDescriptor>,
    /// plugin name (lower-cased) → command names in registration order.
    by_plugin: HashMap<String, Vec<String>>,
}

/// Global name → descriptor map.
///
/// Command names are globally unique. Re-registering an existing name
/// overwrites the handler, but the descriptor metadata (and plugin
/// ownership) set by the first registration is retained.
///
/// Mutation happens on the main execution context in practice (plugin init
/// and command handlers both run there); the interior lock exists so the
/// registry can still be shared across the host without aliasing rules
/// getting in the way, and it is never held across a handler invocation.
pub struct CommandRegistry {
    state: Mutex<RegistryState>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                handlers: HashMap::new(),
                descriptors: HashMap::new(),
                by_plugin: HashMap::new(),
            }),
        }
    }

    pub fn register(&self, descriptor: CommandDescriptor) {
        let mut state = self.state.lock().expect("command registry poisoned");
        let name = descriptor.name.clone();
        state.handlers.insert(name.clone(), Arc::clone(&descriptor.handler));
        if !state.descriptors.contains_key(&name) {
            let owner = descriptor.plugin.to_lowercase();
            state.by_plugin.entry(owner).or_default().push(name.clone());
            state.descriptors.insert(name, descriptor);
        }
    }

    /// Remove a command from the global map and its owner's list. No-op
    /// when the name is not registered.
    pub fn unregister(&self, name: &str) {
        let name = name.to_lowercase();
        let mut state = self.state.lock().expect("command registry poisoned");
        state.handlers.remove(&name);
        if let Some(descriptor) = state.descriptors.remove(&name) {
            let owner = descriptor.plugin.to_lowercase();
            if let Some(commands) = state.by_plugin.get_mut(&owner) {
                commands.retain(|command| command != &name);
                if commands.is_empty() {
                    state.by_plugin.remove(&owner);
                }
            }
        }
    }

    /// Latest handler for `name`, if registered. The handler is cloned out
    /// so the registry lock is not held while it runs.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<CommandFn> {
        self.state
            .lock()
            .expect("command registry poisoned")
            .handlers
            .get(&name.to_lowercase())
            .cloned()
    }

    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<CommandDescriptor> {
        self.state
            .lock()
            .expect("command registry poisoned")
            .descriptors
            .get(&name.to_lowercase())
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.state
            .lock()
            .expect("command registry poisoned")
            .handlers
            .contains_key(&name.to_lowercase())
    }

    /// All descriptors, sorted by command name.
    #[must_use]
    pub fn descriptors(&self) -> Vec<CommandDescriptor> {
        let state = self.state.lock().expect("command registry poisoned");
        let mut all: Vec<CommandDescriptor> = state.descriptors.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Plugin names that own at least one command, sorted.
    #[must_use]
    pub fn owners(&self) -> Vec<String> {
        let state = self.state.lock().expect("command registry poisoned");
        let mut owners: Vec<String> = state.by_plugin.keys().cloned().collect();
        owners.sort();
        owners
    }

    /// Descriptors owned by one plugin, in registration order. `None` when
    /// the plugin has registered nothing.
    #[must_use]
    pub fn plugin_commands(&self, plugin: &str) -> Option<Vec<CommandDescriptor>> {
        let state = self.state.lock().expect("command registry poisoned");
        let names = state.by_plugin.get(&plugin.to_lowercase())?;
        Some(
            names
                .iter()
                .filter_map(|name| state.descriptors.get(name).cloned())
                .collect(),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .expect("command registry poisoned")
            .handlers
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registered command. Used by the wholesale plugin reload.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("command registry poisoned");
        state.handlers.clear();
        state.descriptors.clear();
        state.by_plugin.clear();
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
