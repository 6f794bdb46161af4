// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for robobag.
//!
//! Errors fall into four classes:
//! - Validation of the conversion request (raised before any I/O)
//! - I/O on a specific input or output archive
//! - Incompatible topic declarations across inputs
//! - Partial failure, when some outputs finalized and others did not

use thiserror::Error;

use crate::rewriter::JobSummary;

/// Errors that can occur while converting bags.
#[derive(Debug, Clone, Error)]
pub enum BagError {
    /// The conversion request is malformed.
    #[error("Invalid conversion request: {reason}")]
    Validation {
        /// What is wrong with the request
        reason: String,
    },

    /// An archive could not be opened, read or written.
    #[error("I/O error on '{uri}': {message}")]
    Io {
        /// Archive or data file the error concerns
        uri: String,
        /// Error message
        message: String,
    },

    /// Two inputs declare one topic name with incompatible metadata.
    #[error("Conflicting declarations for topic '{topic}': {first} vs {second}")]
    DomainConflict {
        /// Topic name
        topic: String,
        /// Declaration seen first (type and serialization format)
        first: String,
        /// Conflicting declaration
        second: String,
    },

    /// At least one output failed while others were finalized.
    #[error("{failed} of {total} outputs failed")]
    PartialFailure {
        /// Number of failed outputs
        failed: usize,
        /// Number of requested outputs
        total: usize,
        /// Per-output report of the whole job
        summary: Box<JobSummary>,
    },
}

impl BagError {
    /// Create a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        BagError::Validation {
            reason: reason.into(),
        }
    }

    /// Create an I/O error for the given archive or file.
    pub fn io(uri: impl Into<String>, message: impl std::fmt::Display) -> Self {
        BagError::Io {
            uri: uri.into(),
            message: message.to_string(),
        }
    }

    /// Create a topic conflict error.
    pub fn domain_conflict(
        topic: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        BagError::DomainConflict {
            topic: topic.into(),
            first: first.into(),
            second: second.into(),
        }
    }

    /// Wrap a job summary that contains failed outputs.
    pub fn partial_failure(summary: JobSummary) -> Self {
        BagError::PartialFailure {
            failed: summary.failed_count(),
            total: summary.outputs.len(),
            summary: Box::new(summary),
        }
    }

    /// Short name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            BagError::Validation { .. } => "validation",
            BagError::Io { .. } => "io",
            BagError::DomainConflict { .. } => "domain_conflict",
            BagError::PartialFailure { .. } => "partial_failure",
        }
    }

    /// The job summary, if this is a partial failure.
    pub fn summary(&self) -> Option<&JobSummary> {
        match self {
            BagError::PartialFailure { summary, .. } => Some(summary),
            _ => None,
        }
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            BagError::Validation { reason } => vec![("reason", reason.clone())],
            BagError::Io { uri, message } => {
                vec![("uri", uri.clone()), ("message", message.clone())]
            }
            BagError::DomainConflict {
                topic,
                first,
                second,
            } => vec![
                ("topic", topic.clone()),
                ("first", first.clone()),
                ("second", second.clone()),
            ],
            BagError::PartialFailure { failed, total, .. } => vec![
                ("failed", failed.to_string()),
                ("total", total.to_string()),
            ],
        }
    }
}

impl From<serde_yaml::Error> for BagError {
    fn from(err: serde_yaml::Error) -> Self {
        BagError::Io {
            uri: "metadata.yaml".to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type for robobag operations.
pub type Result<T> = std::result::Result<T, BagError>;
