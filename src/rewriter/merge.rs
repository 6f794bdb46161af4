// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Time-ordered merge of several input archives.
//!
//! The [`MergeReader`] keeps one pending record per input in a min-heap
//! keyed by `(send_timestamp, input_index)`. Because each input holds at
//! most one slot, records of one input come out in their original order,
//! and equal timestamps across inputs come out in input order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use tracing::debug;

use crate::io::metadata::{Record, TopicMetadata};
use crate::io::options::StorageOptions;
use crate::io::reader::{ArchiveReader, TopicCatalog};
use crate::io::registry::StorageRegistry;
use crate::{BagError, Result};

/// Single-pass, globally time-ordered reader over all inputs.
pub struct MergeReader {
    readers: Vec<ArchiveReader>,
    catalog: Arc<TopicCatalog>,
    slots: Vec<Option<Record>>,
    frontier: BinaryHeap<Reverse<(u64, usize)>>,
    primed: bool,
    pending_error: Option<BagError>,
    failed: bool,
    records_read: u64,
}

impl MergeReader {
    /// Open every input and merge their topic catalogs.
    ///
    /// Fails on the first input that cannot be opened, or with
    /// [`BagError::DomainConflict`] when two inputs declare one topic with a
    /// different type or serialization format.
    pub fn open(inputs: &[StorageOptions], registry: &StorageRegistry) -> Result<Self> {
        let mut readers = Vec::with_capacity(inputs.len());
        for input in inputs {
            readers.push(ArchiveReader::open(input, registry)?);
        }
        Self::from_readers(readers)
    }

    /// Merge already opened archives.
    pub fn from_readers(readers: Vec<ArchiveReader>) -> Result<Self> {
        let mut catalog = TopicCatalog::default();
        for reader in &readers {
            for topic in reader.topics() {
                catalog.merge(topic.clone())?;
            }
        }

        debug!(
            context = "MergeReader",
            inputs = readers.len(),
            topics = catalog.len(),
            "Merged input catalogs"
        );

        let slots = readers.iter().map(|_| None).collect();
        Ok(Self {
            frontier: BinaryHeap::with_capacity(readers.len()),
            readers,
            catalog: Arc::new(catalog),
            slots,
            primed: false,
            pending_error: None,
            failed: false,
            records_read: 0,
        })
    }

    /// The merged topic catalog.
    pub fn catalog(&self) -> &Arc<TopicCatalog> {
        &self.catalog
    }

    /// Look up a topic of the merged catalog.
    pub fn topic(&self, name: &str) -> Option<&TopicMetadata> {
        self.catalog.get(name)
    }

    /// Number of inputs.
    pub fn input_count(&self) -> usize {
        self.readers.len()
    }

    /// Number of records yielded so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Pull the next record of input `index` into its slot.
    fn refill(&mut self, index: usize) -> Result<()> {
        match self.readers[index].next() {
            Some(Ok(record)) => {
                self.frontier
                    .push(Reverse((record.send_timestamp, index)));
                self.slots[index] = Some(record);
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => Ok(()),
        }
    }

    fn fail(&mut self, error: BagError) -> Option<Result<Record>> {
        self.failed = true;
        Some(Err(error))
    }
}

impl Iterator for MergeReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(e) = self.pending_error.take() {
            return self.fail(e);
        }
        if !self.primed {
            self.primed = true;
            for index in 0..self.readers.len() {
                if let Err(e) = self.refill(index) {
                    return self.fail(e);
                }
            }
        }

        let Reverse((_, index)) = self.frontier.pop()?;
        let record = self.slots[index].take()?;
        if let Err(e) = self.refill(index) {
            self.pending_error = Some(e);
        }
        self.records_read += 1;
        Some(Ok(record))
    }
}
