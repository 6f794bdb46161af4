// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Per-output writers and job reports.
//!
//! Every output target is driven by one [`OutputWriter`], which walks the
//! state machine `Pending → Opened → Writing → Finalized | Failed`. An error
//! on one output moves only that output to `Failed`; the others keep going.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::io::filter::CompiledSelector;
use crate::io::metadata::{ArchiveMetadata, Record};
use crate::io::reader::TopicCatalog;
use crate::io::registry::{StorageRegistry, DEFAULT_STORAGE_ID};
use crate::io::traits::WriteSettings;
use crate::io::writer::ArchiveWriter;
use crate::{BagError, Result};

use super::job::OutputTarget;

/// Lifecycle state of one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputState {
    /// Not opened yet
    Pending,
    /// Archive created, nothing written
    Opened,
    /// At least one record written
    Writing,
    /// Archive closed and its metadata written
    Finalized,
    /// The output hit an error and receives no more records
    Failed {
        /// Error message
        error: String,
    },
}

impl OutputState {
    /// Check whether the output can still receive records.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OutputState::Pending | OutputState::Opened | OutputState::Writing
        )
    }
}

/// Final status of one output, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputStatus {
    /// The archive was written and finalized
    Finalized,
    /// The output received no records and was never opened
    Skipped,
    /// The output failed; other outputs are unaffected
    Failed {
        /// Error message
        error: String,
    },
}

/// Report of one output.
#[derive(Debug, Clone)]
pub struct OutputReport {
    /// Position of the output in the job
    pub index: usize,
    /// Output archive URI
    pub uri: String,
    /// Storage backend identifier
    pub storage_id: String,
    /// Final status
    pub status: OutputStatus,
    /// Messages written to the output
    pub message_count: u64,
    /// Metadata written for the output, when it was finalized
    pub metadata: Option<ArchiveMetadata>,
}

impl OutputReport {
    /// Create an empty report of an output that was never opened.
    pub fn new(index: usize, uri: impl Into<String>, storage_id: impl Into<String>) -> Self {
        Self {
            index,
            uri: uri.into(),
            storage_id: storage_id.into(),
            status: OutputStatus::Skipped,
            message_count: 0,
            metadata: None,
        }
    }

    /// Check whether the output failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutputStatus::Failed { .. })
    }
}

/// Report of a whole conversion job.
#[derive(Debug, Clone, Default)]
pub struct JobSummary {
    /// One report per output, in job order
    pub outputs: Vec<OutputReport>,
    /// Records read from the inputs
    pub messages_read: u64,
    /// Whether the job was stopped through its abort handle
    pub aborted: bool,
}

impl JobSummary {
    /// Number of failed outputs.
    pub fn failed_count(&self) -> usize {
        self.outputs.iter().filter(|o| o.is_failed()).count()
    }

    /// Check whether every output finished without error.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get the report of an output by position.
    pub fn output(&self, index: usize) -> Option<&OutputReport> {
        self.outputs.get(index)
    }
}

/// Drives one output archive through its lifecycle.
pub struct OutputWriter {
    index: usize,
    settings: WriteSettings,
    selector: CompiledSelector,
    registry: StorageRegistry,
    catalog: Arc<TopicCatalog>,
    state: OutputState,
    writer: Option<ArchiveWriter>,
    metadata: Option<ArchiveMetadata>,
    message_count: u64,
}

impl OutputWriter {
    /// Create a pending writer for an output target.
    pub fn new(
        index: usize,
        target: &OutputTarget,
        selector: CompiledSelector,
        registry: StorageRegistry,
        catalog: Arc<TopicCatalog>,
    ) -> Self {
        let settings = WriteSettings {
            storage: target.storage.clone(),
            compression_mode: target.compression.mode,
            compression_format: target.compression.format.clone(),
        };
        Self {
            index,
            settings,
            selector,
            registry,
            catalog,
            state: OutputState::Pending,
            writer: None,
            metadata: None,
            message_count: 0,
        }
    }

    /// Position of the output in the job.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Output archive URI.
    pub fn uri(&self) -> &str {
        &self.settings.storage.uri
    }

    /// Compiled topic selector of the output.
    pub fn selector(&self) -> &CompiledSelector {
        &self.selector
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &OutputState {
        &self.state
    }

    /// Messages written so far.
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Check whether a record on `topic` is routed to this output.
    pub fn accepts(&self, topic: &str) -> bool {
        self.state.is_active() && self.selector.matches(topic)
    }

    /// Create the output archive. Does nothing unless the output is pending.
    ///
    /// On error the output moves to `Failed`.
    pub fn open(&mut self) -> Result<()> {
        if self.state != OutputState::Pending {
            return Ok(());
        }
        match ArchiveWriter::create(&self.registry, self.settings.clone()) {
            Ok(writer) => {
                debug!(
                    context = "OutputWriter",
                    output = self.index,
                    uri = %self.uri(),
                    "Opened output"
                );
                self.writer = Some(writer);
                self.state = OutputState::Opened;
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Route one record to this output.
    ///
    /// Records that do not match the selector are ignored. Returns `false`
    /// once the output no longer accepts records.
    pub fn route(&mut self, record: &Record) -> bool {
        if !self.state.is_active() {
            return false;
        }
        if !self.selector.matches(&record.topic) {
            return true;
        }
        if let Err(e) = self.append(record) {
            if self.state.is_active() {
                self.fail(&e);
            }
            return false;
        }
        true
    }

    fn append(&mut self, record: &Record) -> Result<()> {
        if self.state == OutputState::Pending {
            self.open()?;
        }
        let uri = self.settings.storage.uri.clone();
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| BagError::io(&uri, "Output is not open"))?;

        if !writer.has_topic(&record.topic) {
            let topic = self.catalog.get(&record.topic).ok_or_else(|| {
                BagError::io(
                    &uri,
                    format!("Topic '{}' is not declared by any input", record.topic),
                )
            })?;
            writer.create_topic(topic)?;
        }

        writer.write(record)?;
        self.message_count += 1;
        self.state = OutputState::Writing;
        Ok(())
    }

    /// Finalize the output, writing its metadata.
    ///
    /// Outputs that were never opened stay pending. A failed output is closed
    /// on a best-effort basis, gets no `metadata.yaml` and stays failed.
    pub fn finalize(&mut self) {
        let Some(mut writer) = self.writer.take() else {
            return;
        };
        if !self.state.is_active() {
            writer.abandon();
            return;
        }
        match writer.finish() {
            Ok(metadata) => {
                info!(
                    context = "OutputWriter",
                    output = self.index,
                    uri = %self.uri(),
                    messages = metadata.message_count,
                    files = metadata.relative_file_paths.len(),
                    "Finalized output"
                );
                self.metadata = Some(metadata);
                self.state = OutputState::Finalized;
            }
            Err(e) => {
                writer.abandon();
                self.fail(&e);
            }
        }
    }

    fn fail(&mut self, error: &BagError) {
        warn!(
            context = "OutputWriter",
            output = self.index,
            uri = %self.uri(),
            error = %error,
            "Output failed"
        );
        if let Some(mut writer) = self.writer.take() {
            writer.abandon();
        }
        self.state = OutputState::Failed {
            error: error.to_string(),
        };
    }

    /// Build the final report of this output.
    pub fn into_report(mut self) -> OutputReport {
        self.finalize();

        let storage_id = match self.settings.storage.storage_id.as_str() {
            "" => DEFAULT_STORAGE_ID.to_string(),
            id => id.to_string(),
        };
        let status = match &self.state {
            OutputState::Finalized => OutputStatus::Finalized,
            OutputState::Failed { error } => OutputStatus::Failed {
                error: error.clone(),
            },
            _ => OutputStatus::Skipped,
        };

        OutputReport {
            index: self.index,
            uri: self.settings.storage.uri.clone(),
            storage_id,
            status,
            message_count: self.message_count,
            metadata: self.metadata.take(),
        }
    }
}
