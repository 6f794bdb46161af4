// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Archive layout and storage backend detection.
//!
//! An input URI may point to:
//!
//! - **An archive directory with `metadata.yaml`**: the backend and the data
//!   files come from the metadata.
//! - **A directory without metadata**: data files are found by extension,
//!   sorted by their split index.
//! - **A single data file**: the backend is detected from its magic bytes,
//!   falling back to the file extension.
//!
//! A non-empty `storage_id` in the options always wins over detection.
//!
//! # Example
//!
//! ```rust,no_run
//! use robobag::io::detection::detect_archive;
//! use robobag::io::options::StorageOptions;
//! use robobag::io::registry::StorageRegistry;
//!
//! let source = detect_archive(&StorageOptions::new("recording"), &StorageRegistry::default())?;
//! println!("{} data files", source.files.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{BagError, Result};

use super::formats::mcap::reader::is_file_compressed;
use super::metadata::{ArchiveMetadata, METADATA_FILENAME};
use super::options::StorageOptions;
use super::registry::StorageRegistry;
use super::traits::StorageBackend;

/// Number of header bytes handed to backends for magic detection.
const PROBE_LEN: u64 = 16;

/// Where the data of one input archive lives and how to read it.
#[derive(Clone)]
pub struct ArchiveSource {
    /// Archive URI as given in the options
    pub uri: String,
    /// Backend that reads the data files
    pub backend: Arc<dyn StorageBackend>,
    /// Data files in read order
    pub files: Vec<PathBuf>,
    /// Archive metadata, when the archive carries a `metadata.yaml`
    pub metadata: Option<ArchiveMetadata>,
}

impl std::fmt::Debug for ArchiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveSource")
            .field("uri", &self.uri)
            .field("storage_id", &self.backend.storage_id())
            .field("files", &self.files)
            .field("has_metadata", &self.metadata.is_some())
            .finish()
    }
}

/// Resolve the backend and data files of an input archive.
pub fn detect_archive(
    options: &StorageOptions,
    registry: &StorageRegistry,
) -> Result<ArchiveSource> {
    let root = options.path();
    if root.is_dir() {
        if ArchiveMetadata::exists_in(&root) {
            from_metadata(options, &root, registry)
        } else {
            from_directory_scan(options, &root, registry)
        }
    } else if root.is_file() {
        let backend = match requested_backend(options, registry)? {
            Some(backend) => backend,
            None => detect_file_backend(&root, registry)?,
        };
        Ok(ArchiveSource {
            uri: options.uri.clone(),
            backend,
            files: vec![root],
            metadata: None,
        })
    } else {
        Err(BagError::io(&options.uri, "Archive does not exist"))
    }
}

/// Detect the backend of a single data file: magic first, then extension.
pub fn detect_file_backend(
    path: &Path,
    registry: &StorageRegistry,
) -> Result<Arc<dyn StorageBackend>> {
    let uri = path.display().to_string();

    if !is_file_compressed(path) {
        if let Ok(header) = read_header(path) {
            if let Some(backend) = registry.detect(&header) {
                return Ok(backend);
            }
        }
    }

    data_extension(path)
        .and_then(|ext| registry.by_extension(&ext))
        .ok_or_else(|| BagError::io(uri, "Unable to detect storage backend"))
}

/// Extension of a data file, looking through a `.zstd` compression suffix.
pub fn data_extension(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let name = name.strip_suffix(".zstd").unwrap_or(name);
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn requested_backend(
    options: &StorageOptions,
    registry: &StorageRegistry,
) -> Result<Option<Arc<dyn StorageBackend>>> {
    if options.storage_id.is_empty() {
        return Ok(None);
    }
    registry.get(&options.storage_id).map(Some).ok_or_else(|| {
        BagError::io(
            &options.uri,
            format!("Unknown storage identifier '{}'", options.storage_id),
        )
    })
}

fn from_metadata(
    options: &StorageOptions,
    root: &Path,
    registry: &StorageRegistry,
) -> Result<ArchiveSource> {
    let metadata = ArchiveMetadata::read_from_dir(root)?;

    let backend = match requested_backend(options, registry)? {
        Some(backend) => backend,
        None => registry.get(&metadata.storage_identifier).ok_or_else(|| {
            BagError::io(
                &options.uri,
                format!(
                    "Unknown storage identifier '{}'",
                    metadata.storage_identifier
                ),
            )
        })?,
    };

    if metadata.relative_file_paths.is_empty() {
        let mut source = from_directory_scan(options, root, registry)?;
        source.metadata = Some(metadata);
        return Ok(source);
    }

    let files = metadata
        .relative_file_paths
        .iter()
        .map(|rel| root.join(rel))
        .collect();

    Ok(ArchiveSource {
        uri: options.uri.clone(),
        backend,
        files,
        metadata: Some(metadata),
    })
}

fn from_directory_scan(
    options: &StorageOptions,
    root: &Path,
    registry: &StorageRegistry,
) -> Result<ArchiveSource> {
    let entries = fs::read_dir(root)
        .map_err(|e| BagError::io(&options.uri, format!("Failed to list directory: {e}")))?;

    let requested = requested_backend(options, registry)?;
    let mut backend: Option<Arc<dyn StorageBackend>> = requested.clone();
    let mut files = Vec::new();

    for entry in entries {
        let path = entry
            .map_err(|e| BagError::io(&options.uri, format!("Failed to list directory: {e}")))?
            .path();
        if !path.is_file() || path.file_name().is_some_and(|n| n == METADATA_FILENAME) {
            continue;
        }
        let Some(ext) = data_extension(&path) else {
            continue;
        };

        match &backend {
            Some(b) if b.file_extension() == ext => files.push(path),
            Some(_) => {}
            None => {
                if let Some(b) = registry.by_extension(&ext) {
                    backend = Some(b);
                    files.push(path);
                }
            }
        }
    }

    let backend =
        backend.ok_or_else(|| BagError::io(&options.uri, "No data files found in directory"))?;
    if files.is_empty() {
        return Err(BagError::io(&options.uri, "No data files found in directory"));
    }
    files.sort_by_key(|p| split_sort_key(p));

    Ok(ArchiveSource {
        uri: options.uri.clone(),
        backend,
        files,
        metadata: None,
    })
}

/// Sort key placing `bag_2.mcap` before `bag_10.mcap`.
fn split_sort_key(path: &Path) -> (String, u64, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    match stem.rsplit_once('_') {
        Some((prefix, index)) => match index.parse::<u64>() {
            Ok(n) => (prefix.to_string(), n, name.clone()),
            Err(_) => (stem.to_string(), 0, name.clone()),
        },
        None => (stem.to_string(), 0, name.clone()),
    }
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(PROBE_LEN as usize);
    File::open(path)?.take(PROBE_LEN).read_to_end(&mut header)?;
    Ok(header)
}
