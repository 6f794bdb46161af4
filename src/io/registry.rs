// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Registry of storage backends keyed by storage identifier.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::formats::mcap::McapStorage;
use super::traits::StorageBackend;

/// Storage identifier used when an output does not name one.
pub const DEFAULT_STORAGE_ID: &str = "mcap";

/// Registry of storage backends.
///
/// Cloning is cheap; backends are shared behind `Arc`.
#[derive(Clone)]
pub struct StorageRegistry {
    backends: HashMap<String, Arc<dyn StorageBackend>>,
}

impl StorageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Create a registry with the built-in backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(McapStorage));
        registry
    }

    /// Register a backend, replacing any backend with the same identifier.
    pub fn register(&mut self, backend: Arc<dyn StorageBackend>) {
        self.backends.insert(backend.storage_id().to_string(), backend);
    }

    /// Look up a backend by storage identifier.
    ///
    /// An empty identifier resolves to [`DEFAULT_STORAGE_ID`].
    pub fn get(&self, storage_id: &str) -> Option<Arc<dyn StorageBackend>> {
        let id = if storage_id.is_empty() {
            DEFAULT_STORAGE_ID
        } else {
            storage_id
        };
        self.backends.get(id).cloned()
    }

    /// Look up a backend by data file extension (without the dot).
    pub fn by_extension(&self, extension: &str) -> Option<Arc<dyn StorageBackend>> {
        let extension = extension.to_ascii_lowercase();
        self.backends
            .values()
            .find(|b| b.file_extension() == extension)
            .cloned()
    }

    /// Find the backend whose magic matches the file header.
    pub fn detect(&self, header: &[u8]) -> Option<Arc<dyn StorageBackend>> {
        self.backends.values().find(|b| b.matches_header(header)).cloned()
    }

    /// Registered storage identifiers, sorted.
    pub fn storage_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.backends.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for StorageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageRegistry")
            .field("backends", &self.storage_ids())
            .finish()
    }
}
