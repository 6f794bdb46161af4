// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! I/O layer for bag archives.
//!
//! Storage backends read and write single data files; the archive reader
//! and writer assemble data files and `metadata.yaml` into archives.

pub mod detection;
pub mod filter;
pub mod formats;
pub mod metadata;
pub mod options;
pub mod reader;
pub mod registry;
pub mod traits;
pub mod writer;

// Re-exports
pub use detection::{detect_archive, ArchiveSource};
pub use filter::{CompiledSelector, TopicSelector};
pub use metadata::{ArchiveMetadata, FileInformation, Record, TopicInformation, TopicMetadata};
pub use options::StorageOptions;
pub use reader::{ArchiveReader, TopicCatalog};
pub use registry::StorageRegistry;
pub use traits::{StorageBackend, StorageReader, StorageWriter, WriteSettings};
pub use writer::ArchiveWriter;
