// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Storage capability traits.
//!
//! A storage backend knows how to read and write one kind of data file
//! (MCAP, ...). The archive layer ([`crate::io::reader`],
//! [`crate::io::writer`]) chains data files into archives; the backends
//! never see directories or `metadata.yaml`.

use std::path::Path;

use crate::core::CompressionMode;
use crate::Result;

use super::metadata::{Record, TopicMetadata};
use super::options::StorageOptions;

/// Sequential reader over one data file.
///
/// Records are yielded in file order. The iterator owns its data and is
/// `Send`, allowing it to be moved across threads.
pub trait StorageReader: Iterator<Item = Result<Record>> + Send {
    /// Topics declared in the data file.
    fn topics(&self) -> &[TopicMetadata];

    /// Path of the data file.
    fn path(&self) -> &str;
}

/// Sequential writer for one data file.
///
/// # Example
///
/// ```no_run
/// use robobag::io::traits::StorageWriter;
/// use robobag::io::metadata::{Record, TopicMetadata};
///
/// fn write_all<W>(writer: &mut W, records: &[Record]) -> robobag::Result<()>
/// where
///     W: StorageWriter + ?Sized,
/// {
///     writer.create_topic(&TopicMetadata::new("/chatter", "std_msgs/msg/String", "cdr"))?;
///     for record in records {
///         writer.write(record)?;
///     }
///     writer.finish()
/// }
/// ```
pub trait StorageWriter: Send {
    /// Get the data file path.
    fn path(&self) -> &str;

    /// Register a topic.
    ///
    /// Must be called before the first record on that topic is written.
    /// Registering the same topic twice is a no-op.
    fn create_topic(&mut self, topic: &TopicMetadata) -> Result<()>;

    /// Append a record to the file.
    fn write(&mut self, record: &Record) -> Result<()>;

    /// Approximate number of bytes written to disk so far.
    fn bytes_written(&self) -> u64;

    /// Flush and close the file.
    ///
    /// Calling `finish` more than once is a no-op.
    fn finish(&mut self) -> Result<()>;
}

/// Settings handed to a backend when opening a data file for writing.
#[derive(Debug, Clone, Default)]
pub struct WriteSettings {
    /// Storage options of the archive the file belongs to
    pub storage: StorageOptions,
    /// Compression mode of the archive
    pub compression_mode: CompressionMode,
    /// Compression format (e.g., "zstd")
    pub compression_format: String,
}

/// A pluggable storage backend.
pub trait StorageBackend: Send + Sync {
    /// Backend identifier written to `metadata.yaml` (e.g., "mcap").
    fn storage_id(&self) -> &str;

    /// Extension of the data files this backend writes, without the dot.
    fn file_extension(&self) -> &str;

    /// Check whether a file looks like one of this backend's data files.
    ///
    /// `header` holds the first bytes of the file (possibly fewer than the
    /// backend's magic when the file is tiny).
    fn matches_header(&self, header: &[u8]) -> bool;

    /// Open a data file for sequential reading.
    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>>;

    /// Create a data file for sequential writing.
    fn open_write(&self, path: &Path, settings: &WriteSettings) -> Result<Box<dyn StorageWriter>>;
}
