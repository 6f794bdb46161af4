// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Robobag
//!
//! Bag conversion engine for recorded robotics archives.
//!
//! Reads one or more archives ("bags"), merges their records into one
//! time-ordered stream and writes that stream into one or more output
//! archives, each with its own topic selection, capacity limits and
//! compression.
//!
//! ## Architecture
//!
//! - `io/` - Archive metadata, topic selection, storage backends and the
//!   archive reader/writer
//! - `io/formats/mcap/` - The built-in MCAP storage backend
//! - `rewriter/` - Job description, validation, merge, per-output writers
//!   and the engine
//!
//! ## Example
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use robobag::{bag_rewrite, OutputTarget, StorageOptions, TopicSelector};
//!
//! let summary = bag_rewrite(
//!     vec![StorageOptions::new("in/a"), StorageOptions::new("in/b")],
//!     vec![OutputTarget::new(StorageOptions::new("out/no_empty"))
//!         .with_selector(TopicSelector::exclude(".*empty.*"))],
//! )?;
//! for output in &summary.outputs {
//!     println!("{}: {} messages", output.uri, output.message_count);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Loading a job from YAML
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use robobag::{convert_with, ConversionJob, ConversionOptions, Execution};
//!
//! let job = ConversionJob::from_yaml_file("job.yaml")?;
//! let options = ConversionOptions::new().with_execution(Execution::threaded());
//! convert_with(&job, &options)?;
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

pub use core::{BagError, CompressionMode, Result};

// I/O types (metadata, filters, backends, archive reader/writer)
pub mod io;

pub use io::{ArchiveMetadata, Record, StorageOptions, TopicMetadata, TopicSelector};

// Conversion engine
pub mod rewriter;

pub use rewriter::{
    bag_rewrite, convert, convert_with, AbortHandle, ConversionJob, ConversionOptions, Execution,
    JobSummary, OutputCompression, OutputReport, OutputStatus, OutputTarget,
};
