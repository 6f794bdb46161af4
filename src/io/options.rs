// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Storage options identifying one archive.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Options that identify one archive and tune its storage.
///
/// Used for inputs (read-only) and outputs. For inputs an empty
/// `storage_id` means the backend is detected from the archive contents;
/// for outputs it means the default backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// Archive location (directory path, or a single data file for inputs)
    pub uri: String,
    /// Storage backend identifier (e.g., "mcap")
    pub storage_id: String,
    /// Roll over to a new data file past this many bytes (0 = unlimited)
    pub max_bagfile_size: u64,
    /// Roll over to a new data file past this many seconds (0 = unlimited)
    pub max_bagfile_duration: u64,
    /// Backend write cache size in bytes (0 = backend default)
    pub max_cache_size: u64,
    /// Backend-specific storage profile
    pub storage_preset_profile: String,
    /// Backend-specific configuration file, passed through untouched
    pub storage_config_uri: String,
}

impl StorageOptions {
    /// Create options for the archive at `uri`.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Set the storage backend identifier.
    pub fn with_storage_id(mut self, storage_id: impl Into<String>) -> Self {
        self.storage_id = storage_id.into();
        self
    }

    /// Set the maximum data file size in bytes.
    pub fn with_max_bagfile_size(mut self, bytes: u64) -> Self {
        self.max_bagfile_size = bytes;
        self
    }

    /// Set the maximum data file duration in seconds.
    pub fn with_max_bagfile_duration(mut self, seconds: u64) -> Self {
        self.max_bagfile_duration = seconds;
        self
    }

    /// Set the backend write cache size in bytes.
    pub fn with_max_cache_size(mut self, bytes: u64) -> Self {
        self.max_cache_size = bytes;
        self
    }

    /// Set the backend storage profile.
    pub fn with_storage_preset_profile(mut self, profile: impl Into<String>) -> Self {
        self.storage_preset_profile = profile.into();
        self
    }

    /// The archive location as a path.
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.uri)
    }

    /// Maximum data file duration in nanoseconds (0 = unlimited).
    pub fn max_bagfile_duration_ns(&self) -> u64 {
        self.max_bagfile_duration.saturating_mul(1_000_000_000)
    }

    /// Check whether any capacity limit triggers file rollover.
    pub fn has_split_limits(&self) -> bool {
        self.max_bagfile_size > 0 || self.max_bagfile_duration > 0
    }

    /// Base name used for the data files of this archive.
    ///
    /// Matches the last path component of the archive directory.
    pub fn base_name(&self) -> String {
        Path::new(&self.uri)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "bag".to_string())
    }
}
