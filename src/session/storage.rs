//! Persisted client state.
//!
//! SYSTEM CONTEXT
//! ==============
//! Mirrors browser `localStorage`: string values under string keys, reads
//! that may miss, writes that never fail the caller. The session store keeps
//! exactly one entry, the bearer token under [`TOKEN_STORAGE_KEY`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Fixed key the bearer token is persisted under.
pub const TOKEN_STORAGE_KEY: &str = "token";

pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

// =============================================================================
// MEMORY
// =============================================================================

/// Process-local storage; contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a persisted token.
    #[must_use]
    pub fn with_token(token: &str) -> Self {
        let storage = Self::new();
        storage.set_item(TOKEN_STORAGE_KEY, token);
        storage
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        let items = self.items.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        items.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        let mut items = self.items.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        items.insert(key.to_owned(), value.to_owned());
    }

    fn remove_item(&self, key: &str) {
        let mut items = self.items.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        items.remove(key);
    }
}

// =============================================================================
// FILE
// =============================================================================

/// JSON-object file on disk, rewritten on every mutation.
///
/// A missing or unreadable file reads as empty. Write failures are logged
/// and swallowed, matching `localStorage` semantics where quota errors do
/// not abort the caller.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> HashMap<String, String> {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return HashMap::new();
        };
        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring corrupt storage file");
                HashMap::new()
            }
        }
    }

    fn write_all(&self, items: &HashMap<String, String>) {
        let raw = match serde_json::to_string_pretty(items) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "storage serialize failed");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, raw) {
            tracing::warn!(path = %self.path.display(), error = %e, "storage write failed");
        }
    }

    fn update(&self, f: impl FnOnce(&mut HashMap<String, String>)) {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut items = self.read_all();
        f(&mut items);
        self.write_all(&items);
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.read_all().remove(key)
    }

    fn set_item(&self, key: &str, value: &str) {
        self.update(|items| {
            items.insert(key.to_owned(), value.to_owned());
        });
    }

    fn remove_item(&self, key: &str) {
        self.update(|items| {
            items.remove(key);
        });
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
