// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout robobag.
//!
//! - [`BagError`] - Error taxonomy of a conversion job
//! - [`CompressionMode`] - How an output archive is compressed

pub mod error;

pub use error::{BagError, Result};

use serde::{Deserialize, Serialize};

/// Compression applied to an output archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// Data files are written uncompressed
    #[default]
    None,
    /// Each finished data file is compressed as a whole
    File,
    /// Each message chunk is compressed inside the data file
    Message,
}

/// Error returned when parsing a `CompressionMode` from string fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseCompressionModeError {
    _private: (),
}

impl std::fmt::Display for ParseCompressionModeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid compression mode, expected 'none', 'file', or 'message'"
        )
    }
}

impl std::error::Error for ParseCompressionModeError {}

impl std::str::FromStr for CompressionMode {
    type Err = ParseCompressionModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "none" => Ok(CompressionMode::None),
            "file" => Ok(CompressionMode::File),
            "message" => Ok(CompressionMode::Message),
            _ => Err(ParseCompressionModeError { _private: () }),
        }
    }
}

impl CompressionMode {
    /// Check if any compression is applied.
    pub fn is_compressed(&self) -> bool {
        !matches!(self, CompressionMode::None)
    }

    /// Name written to `metadata.yaml`.
    pub fn as_metadata_str(&self) -> &'static str {
        match self {
            CompressionMode::None => "",
            CompressionMode::File => "FILE",
            CompressionMode::Message => "MESSAGE",
        }
    }
}
