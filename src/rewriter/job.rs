// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Conversion job description and run options.
//!
//! A [`ConversionJob`] lists the input archives and the output targets. It
//! can be built in code or loaded from YAML:
//!
//! ```yaml
//! inputs:
//!   - uri: recordings/a
//!   - uri: recordings/b
//! outputs:
//!   - storage: { uri: out/only_a_empty }
//!     selector: { topics: [a_empty] }
//!   - storage: { uri: out/full, max_bagfile_duration: 60 }
//!     selector: { exclude: ".*empty.*" }
//!     compression: { mode: file }
//! ```

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::CompressionMode;
use crate::io::filter::TopicSelector;
use crate::io::options::StorageOptions;
use crate::io::registry::StorageRegistry;
use crate::{BagError, Result};

/// Default capacity of each per-output queue in threaded mode.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Compression settings of one output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputCompression {
    /// Compression mode
    pub mode: CompressionMode,
    /// Compression format; empty selects "zstd" when a mode is set
    pub format: String,
}

impl OutputCompression {
    /// Compress whole data files with zstd.
    pub fn file() -> Self {
        Self {
            mode: CompressionMode::File,
            format: String::new(),
        }
    }

    /// Compress message chunks inside data files with zstd.
    pub fn message() -> Self {
        Self {
            mode: CompressionMode::Message,
            format: String::new(),
        }
    }
}

/// One output archive and the rules selecting what goes into it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputTarget {
    /// Where and how to store the archive
    pub storage: StorageOptions,
    /// Which topics are routed to it
    #[serde(default)]
    pub selector: TopicSelector,
    /// How its data files are compressed
    #[serde(default)]
    pub compression: OutputCompression,
}

impl OutputTarget {
    /// Create a target receiving every topic.
    pub fn new(storage: StorageOptions) -> Self {
        Self {
            storage,
            selector: TopicSelector::all(),
            compression: OutputCompression::default(),
        }
    }

    /// Set the topic selector.
    pub fn with_selector(mut self, selector: TopicSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Set the compression settings.
    pub fn with_compression(mut self, compression: OutputCompression) -> Self {
        self.compression = compression;
        self
    }
}

/// A complete conversion request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionJob {
    /// Input archives, read-only, in tie-break order
    pub inputs: Vec<StorageOptions>,
    /// Output targets
    pub outputs: Vec<OutputTarget>,
}

impl ConversionJob {
    /// Create a job from inputs and outputs.
    pub fn new(inputs: Vec<StorageOptions>, outputs: Vec<OutputTarget>) -> Self {
        Self { inputs, outputs }
    }

    /// Add an input archive.
    pub fn with_input(mut self, input: StorageOptions) -> Self {
        self.inputs.push(input);
        self
    }

    /// Add an output target.
    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.outputs.push(output);
        self
    }

    /// Parse a job from YAML.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| BagError::validation(format!("failed to parse job: {e}")))
    }

    /// Load a job from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| BagError::io(path.display().to_string(), e))?;
        Self::from_yaml_str(&text)
    }
}

/// How records are handed to the outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// One record at a time across all outputs, on the calling thread
    #[default]
    Sequential,
    /// One thread per output, each fed by a bounded queue
    Threaded {
        /// Capacity of each output's queue
        queue_capacity: usize,
    },
}

impl Execution {
    /// Threaded execution with the default queue capacity.
    pub fn threaded() -> Self {
        Execution::Threaded {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Cooperative abort signal for a running job.
///
/// Clones share one flag. Once aborted, the job stops reading input and
/// finalizes every output it opened.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Create a handle that is not aborted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the job to stop.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check whether an abort was requested.
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Options controlling how a job runs.
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Execution mode
    pub execution: Execution,
    /// Open every output before reading (empty outputs still produce an
    /// archive). When false, an output is opened on its first record.
    pub eager_outputs: bool,
    /// Abort signal
    pub abort: AbortHandle,
    /// Storage backends available to the job
    pub registry: StorageRegistry,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            execution: Execution::Sequential,
            eager_outputs: true,
            abort: AbortHandle::new(),
            registry: StorageRegistry::with_defaults(),
        }
    }
}

impl ConversionOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the execution mode.
    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Set whether outputs are opened before reading.
    pub fn with_eager_outputs(mut self, eager: bool) -> Self {
        self.eager_outputs = eager;
        self
    }

    /// Use the given abort handle.
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Use the given storage registry.
    pub fn with_registry(mut self, registry: StorageRegistry) -> Self {
        self.registry = registry;
        self
    }
}
