//! Persisted alias → command mappings.
//!
//! Aliases live in a flat text file of `alias,command;` records, read on
//! startup (and on `alias -reload`) and rewritten wholesale on every
//! mutation. Keys are unique and so are targets: an alias may not shadow
//! another alias's target command.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AliasError {
    #[error("Alias {0:?} already exists.")]
    DuplicateAlias(String),
    #[error("There is already an alias for {0:?}.")]
    DuplicateTarget(String),
    #[error("alias file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key-value store backing the `alias` command.
pub struct AliasStore {
    path: PathBuf,
    map: Mutex<HashMap<String, String>>,
}

impl AliasStore {
    /// Open a store backed by `path`, loading existing records. A missing
    /// file is a recoverable condition: the store starts empty and the file
    /// is created on the first mutation.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            map: Mutex::new(HashMap::new()),
        };
        if store.path.exists() {
            if let Err(e) = store.reload() {
                debug!("alias load failed: {e}");
            }
        } else {
            debug!("alias file {} not found, starting empty", store.path.display());
        }
        store
    }

    /// Re-read the backing file, replacing the in-memory map.
    pub fn reload(&self) -> Result<(), AliasError> {
        let text = fs::read_to_string(&self.path)?;
        let mut map = HashMap::new();
        for record in text.split(';') {
            let record = record.trim();
            if record.is_empty() {
                continue;
            }
            let mut parts = record.splitn(2, ',');
            if let (Some(alias), Some(command)) = (parts.next(), parts.next()) {
                map.insert(alias.trim().to_string(), command.trim().to_string());
            }
        }
        *self.map.lock().expect("alias store poisoned") = map;
        Ok(())
    }

    /// Add a mapping. Both the alias key and the target command must be
    /// unused; on error the pre-existing state is kept unchanged.
    pub fn add(&self, alias: &str, command: &str) -> Result<(), AliasError> {
        {
            let mut map = self.map.lock().expect("alias store poisoned");
            if map.contains_key(alias) {
                return Err(AliasError::DuplicateAlias(alias.to_string()));
            }
            if map.values().any(|target| target == command) {
                return Err(AliasError::DuplicateTarget(command.to_string()));
            }
            map.insert(alias.to_string(), command.to_string());
        }
        self.save()
    }

    /// Remove a mapping. Returns whether anything was removed; absent keys
    /// are a no-op.
    pub fn remove(&self, alias: &str) -> Result<bool, AliasError> {
        let removed = {
            let mut map = self.map.lock().expect("alias store poisoned");
            map.remove(alias).is_some()
        };
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Target command for `alias`, if mapped.
    #[must_use]
    pub fn resolve(&self, alias: &str) -> Option<String> {
        self.map
            .lock()
            .expect("alias store poisoned")
            .get(alias)
            .cloned()
    }

    /// All mappings, sorted by alias.
    #[must_use]
    pub fn list(&self) -> Vec<(String, String)> {
        let map = self.map.lock().expect("alias store poisoned");
        let mut pairs: Vec<(String, String)> =
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        pairs.sort();
        pairs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.lock().expect("alias store poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite the backing file wholesale from the in-memory map.
    fn save(&self) -> Result<(), AliasError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut text = String::new();
        for (alias, command) in self.list() {
            text.push_str(&alias);
            text.push(',');
            text.push_str(&command);
            text.push_str(";\n");
        }
        fs::write(&self.path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.txt");

        let store = AliasStore::open(&path);
        store.add("h", "help").unwrap();
        store.add("v", "version").unwrap();

        let reopened = AliasStore::open(&path);
        assert_eq!(reopened.resolve("h").unwrap(), "help");
        assert_eq!(reopened.resolve("v").unwrap(), "version");
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = AliasStore::open(dir.path().join("aliases.txt"));
        store.add("h", "help").unwrap();
        let err = store.add("h", "history").unwrap_err();
        assert!(matches!(err, AliasError::DuplicateAlias(_)));
        // State unchanged.
        assert_eq!(store.resolve("h").unwrap(), "help");
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = AliasStore::open(dir.path().join("aliases.txt"));
        store.add("h", "help").unwrap();
        let err = store.add("?", "help").unwrap_err();
        assert!(matches!(err, AliasError::DuplicateTarget(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = AliasStore::open(dir.path().join("aliases.txt"));
        store.add("h", "help").unwrap();
        assert!(store.remove("h").unwrap());
        assert!(!store.remove("h").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AliasStore::open(dir.path().join("nope").join("aliases.txt"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_reload_replaces_in_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.txt");
        fs::write(&path, "pl,plugins;\n").unwrap();

        let store = AliasStore::open(&path);
        assert_eq!(store.resolve("pl").unwrap(), "plugins");

        fs::write(&path, "x,exit;\n").unwrap();
        store.reload().unwrap();
        assert!(store.resolve("pl").is_none());
        assert_eq!(store.resolve("x").unwrap(), "exit");
    }
}
