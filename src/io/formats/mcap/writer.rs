// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Sequential MCAP data file writer using the mcap crate.
//!
//! Every topic becomes one MCAP channel. The type name is stored as a
//! schema with empty data (payloads stay opaque), and the offered QoS
//! profile travels in the channel metadata.
//!
//! In message compression mode the MCAP chunks are compressed; file
//! compression is applied afterwards by the archive layer.
//!
//! The size reported by [`StorageWriter::bytes_written`] counts every byte
//! handed to the file (buffered or not) plus an estimate of the chunk still
//! being compressed in memory, so size limits hold even for small files.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::core::CompressionMode;
use crate::io::metadata::{Record, TopicMetadata};
use crate::io::traits::{StorageWriter, WriteSettings};
use crate::{BagError, Result};

use super::constants::{LIBRARY, PROFILE, QOS_METADATA_KEY, SCHEMA_ENCODING};

/// Default write buffer capacity (1MB).
const DEFAULT_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Default MCAP chunk size, as used by the mcap crate.
const DEFAULT_CHUNK_SIZE: u64 = 768 * 1024;

/// Bytes of a message record besides its payload: opcode, record length,
/// channel ID, sequence and both timestamps.
const MESSAGE_RECORD_OVERHEAD: u64 = 1 + 8 + 2 + 4 + 8 + 8;

/// Pass-through writer tracking the furthest byte position written.
///
/// The mcap writer seeks back to patch chunk headers, so the high-water
/// mark rather than the current position is the file length.
struct CountingWriter<W> {
    inner: W,
    position: u64,
    written: Arc<AtomicU64>,
}

impl<W> CountingWriter<W> {
    fn new(inner: W, written: Arc<AtomicU64>) -> Self {
        Self {
            inner,
            position: 0,
            written,
        }
    }

    fn advance(&mut self, position: u64) {
        self.position = position;
        self.written.fetch_max(position, Ordering::Relaxed);
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.advance(self.position + n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Seek> Seek for CountingWriter<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let position = self.inner.seek(pos)?;
        self.position = position;
        Ok(position)
    }
}

type FileWriter = mcap::Writer<CountingWriter<BufWriter<File>>>;

/// Writer for one MCAP data file.
pub struct McapDataWriter {
    /// File path
    path: String,
    /// Underlying mcap writer, `None` once finished
    inner: Option<FileWriter>,
    /// Bytes handed to the file so far
    flushed: Arc<AtomicU64>,
    /// Estimated bytes held in the open chunk
    unflushed: u64,
    /// Channel IDs by topic name
    channel_ids: HashMap<String, u16>,
    /// Sequence numbers per channel
    sequences: HashMap<u16, u32>,
    /// Messages written
    message_count: u64,
}

impl McapDataWriter {
    /// Create a new MCAP data file.
    pub fn create<P: AsRef<Path>>(path: P, settings: &WriteSettings) -> Result<Self> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().to_string();

        let file = File::create(path_ref)
            .map_err(|e| BagError::io(&path_str, format!("Failed to create file: {e}")))?;

        let capacity = match settings.storage.max_cache_size {
            0 => DEFAULT_BUFFER_CAPACITY,
            n => usize::try_from(n).unwrap_or(DEFAULT_BUFFER_CAPACITY),
        };

        let mut chunk_size = match settings.storage.max_cache_size {
            0 => DEFAULT_CHUNK_SIZE,
            n => n,
        };
        if settings.storage.max_bagfile_size > 0 {
            chunk_size = chunk_size.min(settings.storage.max_bagfile_size);
        }

        let flushed = Arc::new(AtomicU64::new(0));
        let sink = CountingWriter::new(
            BufWriter::with_capacity(capacity, file),
            Arc::clone(&flushed),
        );
        let inner = mcap::WriteOptions::new()
            .profile(PROFILE)
            .library(LIBRARY)
            .compression(chunk_compression(settings))
            .chunk_size(Some(chunk_size))
            .create(sink)
            .map_err(|e| BagError::io(&path_str, format!("Failed to start MCAP file: {e}")))?;

        debug!(
            context = "McapDataWriter",
            path = %path_str,
            compression = ?settings.compression_mode,
            "Created MCAP data file"
        );

        Ok(Self {
            path: path_str,
            inner: Some(inner),
            flushed,
            unflushed: 0,
            channel_ids: HashMap::new(),
            sequences: HashMap::new(),
            message_count: 0,
        })
    }

    /// Get the number of messages written so far.
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    fn writer(&mut self) -> Result<&mut FileWriter> {
        let path = &self.path;
        self.inner
            .as_mut()
            .ok_or_else(|| BagError::io(path, "MCAP file already finished"))
    }
}

/// Map the archive compression settings to MCAP chunk compression.
fn chunk_compression(settings: &WriteSettings) -> Option<mcap::Compression> {
    if settings.compression_mode != CompressionMode::Message {
        return None;
    }
    match settings.compression_format.as_str() {
        "lz4" => Some(mcap::Compression::Lz4),
        _ => Some(mcap::Compression::Zstd),
    }
}

impl StorageWriter for McapDataWriter {
    fn path(&self) -> &str {
        &self.path
    }

    fn create_topic(&mut self, topic: &TopicMetadata) -> Result<()> {
        if self.channel_ids.contains_key(&topic.name) {
            return Ok(());
        }

        let path = self.path.clone();
        let writer = self.writer()?;

        let schema_id = if topic.type_name.is_empty() {
            0
        } else {
            writer
                .add_schema(&topic.type_name, SCHEMA_ENCODING, &[])
                .map_err(|e| BagError::io(&path, format!("Failed to add schema: {e}")))?
        };

        let mut metadata = BTreeMap::new();
        if !topic.offered_qos_profiles.is_empty() {
            metadata.insert(
                QOS_METADATA_KEY.to_string(),
                topic.offered_qos_profiles.clone(),
            );
        }

        let channel_id = writer
            .add_channel(
                schema_id,
                &topic.name,
                &topic.serialization_format,
                &metadata,
            )
            .map_err(|e| BagError::io(&path, format!("Failed to add channel: {e}")))?;

        self.channel_ids.insert(topic.name.clone(), channel_id);
        Ok(())
    }

    fn write(&mut self, record: &Record) -> Result<()> {
        let channel_id = *self.channel_ids.get(&record.topic).ok_or_else(|| {
            BagError::io(
                &self.path,
                format!("Topic '{}' was not registered before writing", record.topic),
            )
        })?;

        let sequence = self.sequences.entry(channel_id).or_insert(0);
        *sequence = sequence.wrapping_add(1);
        let header = mcap::records::MessageHeader {
            channel_id,
            sequence: *sequence,
            log_time: record.recv_timestamp.unwrap_or(record.send_timestamp),
            publish_time: record.send_timestamp,
        };

        let path = self.path.clone();
        let before = self.flushed.load(Ordering::Relaxed);
        self.writer()?
            .write_to_known_channel(&header, &record.data)
            .map_err(|e| BagError::io(&path, format!("Failed to write message: {e}")))?;

        // Bytes reaching the file mean the open chunk was written out.
        if self.flushed.load(Ordering::Relaxed) > before {
            self.unflushed = 0;
        } else {
            self.unflushed += record.data.len() as u64 + MESSAGE_RECORD_OVERHEAD;
        }
        self.message_count += 1;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.flushed.load(Ordering::Relaxed) + self.unflushed
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.inner.take() {
            writer
                .finish()
                .map_err(|e| BagError::io(&self.path, format!("Failed to finish MCAP file: {e}")))?;
            debug!(
                context = "McapDataWriter",
                path = %self.path,
                messages = self.message_count,
                "Finished MCAP data file"
            );
        }
        Ok(())
    }
}
