//! Discovery and loading of plugin dynamic libraries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};
use tracing::{debug, info};

use crate::console::log::MessageLog;
use crate::plugins::api::{Plugin, PluginEntry, PluginRegistrar, PLUGIN_ENTRY_SYMBOL};
use crate::plugins::PluginError;

/// A plugin pulled out of a library, still tied to the library that holds
/// its code.
pub struct DiscoveredPlugin {
    pub plugin: Box<dyn Plugin>,
    /// Keeps the backing library mapped for as long as the plugin lives.
    pub library: Arc<Library>,
    pub source: PathBuf,
}

/// Enumerate loadable libraries in `dir` and run each one's registration
/// entry point.
///
/// A missing directory aborts the whole call with
/// [`PluginError::DirectoryNotFound`]. A library that fails to load or
/// exports no entry point is logged and skipped; it never aborts the scan.
pub fn load_directory(
    dir: &Path,
    log: &MessageLog,
) -> Result<Vec<DiscoveredPlugin>, PluginError> {
    if !dir.is_dir() {
        return Err(PluginError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|_| PluginError::DirectoryNotFound(dir.to_path_buf()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION)
        })
        .collect();
    paths.sort();

    info!("scanning {} for plugin libraries", dir.display());

    let mut discovered = Vec::new();
    for path in paths {
        match load_library(&path) {
            Ok(mut plugins) => {
                debug!(
                    "{} registered {} plugin(s)",
                    path.display(),
                    plugins.len()
                );
                discovered.append(&mut plugins);
            }
            Err(e) => {
                log.error(format!("failed to load {}: {e}", path.display()));
            }
        }
    }

    Ok(discovered)
}

fn load_library(path: &Path) -> anyhow::Result<Vec<DiscoveredPlugin>> {
    // Safety: the library is expected to be a plugin compiled against this
    // crate's contract; the entry point takes a registrar reference and
    // must not unwind across the boundary in a well-formed plugin.
    unsafe {
        let library = Arc::new(Library::new(path)?);
        let entry: Symbol<PluginEntry> = library.get(PLUGIN_ENTRY_SYMBOL)?;

        let mut registrar = PluginRegistrar::new();
        entry(&mut registrar);

        Ok(registrar
            .into_plugins()
            .into_iter()
            .map(|plugin| DiscoveredPlugin {
                plugin,
                library: Arc::clone(&library),
                source: path.to_path_buf(),
            })
            .collect())
    }
}
