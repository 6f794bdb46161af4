// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Bag conversion: merge input archives and re-partition them into outputs.
//!
//! - [`job`] - Job description and run options
//! - [`validate`] - Request validation and selector compilation
//! - [`merge`] - Time-ordered merge of the inputs
//! - [`outputs`] - Per-output writers and reports
//! - [`engine`] - Runs a job end to end

pub mod engine;
pub mod job;
pub mod merge;
pub mod outputs;
pub mod validate;

pub use engine::{bag_rewrite, convert, convert_with};
pub use job::{
    AbortHandle, ConversionJob, ConversionOptions, Execution, OutputCompression, OutputTarget,
};
pub use merge::MergeReader;
pub use outputs::{JobSummary, OutputReport, OutputState, OutputStatus, OutputWriter};
pub use validate::validate;
