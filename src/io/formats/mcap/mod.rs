// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! MCAP storage backend.
//!
//! Reading and writing go through the mcap crate. Each archive data file is
//! one MCAP file; topics map to channels and records map to messages.

pub use constants::{FILE_EXTENSION, MCAP_MAGIC, STORAGE_ID};

pub mod constants;
pub mod reader;
pub mod writer;

use std::path::Path;

use crate::io::traits::{StorageBackend, StorageReader, StorageWriter, WriteSettings};
use crate::Result;

pub use reader::McapDataReader;
pub use writer::McapDataWriter;

/// The MCAP storage backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct McapStorage;

impl StorageBackend for McapStorage {
    fn storage_id(&self) -> &str {
        STORAGE_ID
    }

    fn file_extension(&self) -> &str {
        FILE_EXTENSION
    }

    fn matches_header(&self, header: &[u8]) -> bool {
        is_mcap_magic(header)
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
        Ok(Box::new(McapDataReader::open(path)?))
    }

    fn open_write(&self, path: &Path, settings: &WriteSettings) -> Result<Box<dyn StorageWriter>> {
        Ok(Box::new(McapDataWriter::create(path, settings)?))
    }
}

/// Check if the header starts with the MCAP magic.
///
/// Only the `MCAP` letters are compared so that files written with a
/// different major version byte are still recognized.
pub fn is_mcap_magic(header: &[u8]) -> bool {
    header.len() >= 5 && &header[1..5] == b"MCAP"
}
