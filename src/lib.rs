//! Emberhost - an embeddable extension host
//!
//! This library provides the core of an extension host for a larger
//! application: it discovers and runs third-party plugins, exposes a
//! text-command console those plugins (and the host) extend, and ships a
//! scheduler that lets background work safely reach a single logical main
//! execution context.
//!
//! # Modules
//!
//! - [`host`]: The [`host::Host`] aggregate and the [`host::HostHandle`]
//!   given to plugins
//! - [`schedule`]: Main-tick queue, delayed tasks, named worker lanes
//! - [`console`]: Command registry, dispatch, input history, message log
//! - [`plugins`]: The plugin contract and dynamic-library loading
//! - [`alias`]: Persisted alias → command mappings
//! - [`config`]: Configuration management and serialization
//!
//! The embedding application constructs a [`host::Host`], drives
//! [`host::Host::tick`] from its main loop, and feeds input lines to
//! [`host::Host::dispatch`]. Plugins implement [`plugins::Plugin`] and talk
//! back through the [`host::HostHandle`] they receive at init.

pub mod alias;
pub mod config;
pub mod console;
pub mod host;
pub mod plugins;
pub mod schedule;

pub use alias::{AliasError, AliasStore};
pub use config::Config;
pub use console::{
    CommandDescriptor, CommandFn, CommandRegistry, Console, FileMirror, InputHistory, LogEntry,
    MessageLog, Severity,
};
pub use host::{Host, HostHandle};
pub use plugins::{Plugin, PluginError, PluginRegistrar, PLUGIN_ENTRY_SYMBOL};
pub use schedule::{ScheduleError, Scheduler, Task};
