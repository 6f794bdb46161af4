// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Sequential reader over one archive.
//!
//! An archive is a directory of data files (or a single data file). The
//! [`ArchiveReader`] chains its data files in order and exposes one topic
//! catalog for the whole archive.
//!
//! # Example
//!
//! ```rust,no_run
//! use robobag::io::reader::ArchiveReader;
//! use robobag::io::options::StorageOptions;
//! use robobag::io::registry::StorageRegistry;
//!
//! let options = StorageOptions::new("recording");
//! let reader = ArchiveReader::open(&options, &StorageRegistry::default())?;
//! for topic in reader.topics() {
//!     println!("{}: {}", topic.name, topic.type_name);
//! }
//! for record in reader {
//!     let record = record?;
//!     println!("{} @ {}", record.topic, record.send_timestamp);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::io::detection::{detect_archive, ArchiveSource};
use crate::io::metadata::{Record, TopicMetadata, METADATA_FILENAME};
use crate::io::options::StorageOptions;
use crate::io::registry::StorageRegistry;
use crate::io::traits::{StorageBackend, StorageReader};
use crate::{BagError, Result};

/// Sequential reader over all data files of one archive.
///
/// When the archive carries a `metadata.yaml`, only the first data file is
/// opened up front and the rest are opened as reading reaches them. A lazily
/// opened file may only carry topics already in the catalog. Without
/// metadata every data file is opened up front so that the topic catalog
/// covers the whole archive.
pub struct ArchiveReader {
    uri: String,
    backend: Arc<dyn StorageBackend>,
    catalog: TopicCatalog,
    current: Option<Box<dyn StorageReader>>,
    opened: VecDeque<Box<dyn StorageReader>>,
    remaining: VecDeque<PathBuf>,
    failed: bool,
}

impl ArchiveReader {
    /// Open an archive, detecting its layout and backend.
    pub fn open(options: &StorageOptions, registry: &StorageRegistry) -> Result<Self> {
        let source = detect_archive(options, registry)?;
        Self::from_source(source)
    }

    /// Open an archive whose layout has already been detected.
    pub fn from_source(source: ArchiveSource) -> Result<Self> {
        let ArchiveSource {
            uri,
            backend,
            files,
            metadata,
        } = source;

        let mut catalog = TopicCatalog::default();
        let mut remaining: VecDeque<PathBuf> = files.into();

        // Topics listed in metadata come first so their order is kept.
        let eager_count = match &metadata {
            Some(metadata) => {
                for info in &metadata.topics_with_message_count {
                    catalog.merge(info.topic_metadata.clone())?;
                }
                remaining.len().min(1)
            }
            None => remaining.len(),
        };

        let mut opened = VecDeque::with_capacity(eager_count);
        for _ in 0..eager_count {
            if let Some(path) = remaining.pop_front() {
                let reader = backend.open_read(&path)?;
                for topic in reader.topics() {
                    catalog.merge(topic.clone())?;
                }
                opened.push_back(reader);
            }
        }

        debug!(
            context = "ArchiveReader",
            uri = %uri,
            storage_id = backend.storage_id(),
            topics = catalog.len(),
            files = opened.len() + remaining.len(),
            "Opened archive"
        );

        Ok(Self {
            uri,
            backend,
            catalog,
            current: None,
            opened,
            remaining,
            failed: false,
        })
    }

    /// Get the archive URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Get the storage identifier of the archive's backend.
    pub fn storage_id(&self) -> &str {
        self.backend.storage_id()
    }

    /// Topics of the archive, in declaration order.
    pub fn topics(&self) -> &[TopicMetadata] {
        self.catalog.topics()
    }

    /// Advance to the next data file. Returns `false` once all are read.
    fn advance(&mut self) -> Result<bool> {
        if let Some(reader) = self.opened.pop_front() {
            self.current = Some(reader);
            return Ok(true);
        }
        match self.remaining.pop_front() {
            Some(path) => {
                debug!(
                    context = "ArchiveReader",
                    uri = %self.uri,
                    file = %path.display(),
                    "Opening next data file"
                );
                let reader = self.backend.open_read(&path)?;
                self.check_declared(&path, reader.topics())?;
                self.current = Some(reader);
                Ok(true)
            }
            None => {
                self.current = None;
                Ok(false)
            }
        }
    }

    /// Reject topics of a lazily opened file that the catalog does not list.
    fn check_declared(&self, path: &Path, topics: &[TopicMetadata]) -> Result<()> {
        for topic in topics {
            match self.catalog.get(&topic.name) {
                Some(known) if known.is_compatible(topic) => {}
                Some(known) => {
                    return Err(BagError::domain_conflict(
                        &topic.name,
                        known.declaration(),
                        topic.declaration(),
                    ))
                }
                None => {
                    return Err(BagError::io(
                        &self.uri,
                        format!(
                            "Topic '{}' in {} is not listed in {METADATA_FILENAME}",
                            topic.name,
                            path.display()
                        ),
                    ))
                }
            }
        }
        Ok(())
    }
}

impl Iterator for ArchiveReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(reader) = self.current.as_mut() {
                match reader.next() {
                    Some(Ok(record)) => return Some(Ok(record)),
                    Some(Err(e)) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                    None => {}
                }
            }
            match self.advance() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Topic catalog keyed by name, preserving first-declaration order.
#[derive(Debug, Clone, Default)]
pub struct TopicCatalog {
    topics: Vec<TopicMetadata>,
    index: HashMap<String, usize>,
}

impl TopicCatalog {
    /// Merge one declaration into the catalog.
    ///
    /// A known topic keeps its first declaration and the earliest first-seen
    /// timestamp. A declaration with another type or serialization format is
    /// a conflict.
    pub fn merge(&mut self, topic: TopicMetadata) -> Result<()> {
        match self.index.get(&topic.name) {
            Some(&i) => {
                let existing = &mut self.topics[i];
                if !existing.is_compatible(&topic) {
                    return Err(BagError::domain_conflict(
                        &topic.name,
                        existing.declaration(),
                        topic.declaration(),
                    ));
                }
                if let Some(ts) = topic.first_seen {
                    existing.observe(ts);
                }
                if existing.offered_qos_profiles.is_empty() {
                    existing.offered_qos_profiles = topic.offered_qos_profiles;
                }
            }
            None => {
                self.index.insert(topic.name.clone(), self.topics.len());
                self.topics.push(topic);
            }
        }
        Ok(())
    }

    /// Look up a topic by name.
    pub fn get(&self, name: &str) -> Option<&TopicMetadata> {
        self.index.get(name).map(|&i| &self.topics[i])
    }

    /// All topics, in first-declaration order.
    pub fn topics(&self) -> &[TopicMetadata] {
        &self.topics
    }

    /// Number of topics.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Consume the catalog, returning its topics.
    pub fn into_topics(self) -> Vec<TopicMetadata> {
        self.topics
    }
}
