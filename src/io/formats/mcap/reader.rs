// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Streaming MCAP data file reader.
//!
//! Topics come from the summary section when the file has one. Without a
//! summary (or with one that lists no channels), a first pass over the file
//! collects the schema and channel records and skips every message.
//!
//! Records are decoded one at a time as the reader advances, through the
//! mcap crate's sans-io [`LinearReader`] fed from a memory map (or from a
//! streaming zstd decoder for file-compressed data files).

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use mcap::records::{op, Record as McapRecord};
use mcap::sans_io::{LinearReadEvent, LinearReader};
use tracing::warn;

use crate::io::metadata::{Record, TopicMetadata};
use crate::io::traits::StorageReader;
use crate::{BagError, Result};

use super::constants::QOS_METADATA_KEY;

/// Bytes feeding the linear reader.
type Source = Box<dyn Read + Send>;

/// Streaming reader over one MCAP data file.
pub struct McapDataReader {
    /// File path
    path: String,
    /// Topics in channel ID order
    topics: Vec<TopicMetadata>,
    /// Remaining file bytes
    source: Source,
    /// Record framing and chunk decompression
    reader: LinearReader,
    /// Topic names of the channels seen so far
    channel_topics: HashMap<u16, String>,
    /// Records handed out
    records_read: u64,
    /// Set at end of file or after an error
    done: bool,
}

impl McapDataReader {
    /// Open an MCAP data file.
    ///
    /// Only the summary (or the schema and channel records) is read here.
    /// Files ending in `.zstd` are decompressed while streaming.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().to_string();

        let (source, topics): (Source, Vec<TopicMetadata>) = if is_file_compressed(path_ref) {
            let topics = scan_topics(&path_str, zstd_source(path_ref, &path_str)?)?;
            let source: Source = Box::new(zstd_source(path_ref, &path_str)?);
            (source, topics)
        } else {
            let file = File::open(path_ref)
                .map_err(|e| BagError::io(&path_str, format!("Failed to open file: {e}")))?;
            // SAFETY: the file is opened read-only and only read through this map.
            let mmap = unsafe { memmap2::Mmap::map(&file) }
                .map_err(|e| BagError::io(&path_str, format!("Failed to mmap file: {e}")))?;
            let topics = match summary_topics(&path_str, &mmap) {
                Some(topics) => topics,
                None => scan_topics(&path_str, Cursor::new(&mmap[..]))?,
            };
            let source: Source = Box::new(Cursor::new(mmap));
            (source, topics)
        };

        Ok(Self {
            path: path_str,
            topics,
            source,
            reader: LinearReader::new(),
            channel_topics: HashMap::new(),
            records_read: 0,
            done: false,
        })
    }

    /// Number of records read so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        while let Some(event) = self.reader.next_event() {
            match event.map_err(|e| BagError::io(&self.path, format!("Read error: {e}")))? {
                LinearReadEvent::ReadRequest(need) => {
                    let read = self
                        .source
                        .read(self.reader.insert(need))
                        .map_err(|e| BagError::io(&self.path, format!("Failed to read: {e}")))?;
                    self.reader.notify_read(read);
                }
                LinearReadEvent::Record { opcode, data } => {
                    if opcode != op::CHANNEL && opcode != op::MESSAGE {
                        continue;
                    }
                    let record = mcap::parse_record(opcode, data)
                        .map_err(|e| BagError::io(&self.path, format!("Bad record: {e}")))?;
                    match record {
                        McapRecord::Channel(channel) => {
                            self.channel_topics.insert(channel.id, channel.topic);
                        }
                        McapRecord::Message { header, data } => {
                            let topic = self
                                .channel_topics
                                .get(&header.channel_id)
                                .cloned()
                                .ok_or_else(|| {
                                    BagError::io(
                                        &self.path,
                                        format!("Message on unknown channel {}", header.channel_id),
                                    )
                                })?;
                            self.records_read += 1;
                            return Ok(Some(Record {
                                topic,
                                data: data.into_owned(),
                                send_timestamp: header.publish_time,
                                recv_timestamp: Some(header.log_time),
                            }));
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(None)
    }
}

impl Iterator for McapDataReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl StorageReader for McapDataReader {
    fn topics(&self) -> &[TopicMetadata] {
        &self.topics
    }

    fn path(&self) -> &str {
        &self.path
    }
}

/// Check whether a data file carries the file-compression suffix.
pub fn is_file_compressed(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("zstd")
}

fn zstd_source(
    path: &Path,
    path_str: &str,
) -> Result<zstd::stream::read::Decoder<'static, BufReader<File>>> {
    let file = File::open(path)
        .map_err(|e| BagError::io(path_str, format!("Failed to open file: {e}")))?;
    zstd::stream::read::Decoder::new(file)
        .map_err(|e| BagError::io(path_str, format!("Failed to start decompression: {e}")))
}

/// Topics listed in the summary section, if it lists any.
fn summary_topics(path: &str, buf: &[u8]) -> Option<Vec<TopicMetadata>> {
    match mcap::Summary::read(buf) {
        Ok(Some(summary)) if !summary.channels.is_empty() => {
            let channels: BTreeMap<_, _> = summary.channels.iter().collect();
            Some(
                channels
                    .into_values()
                    .map(|channel| topic_from_channel(channel))
                    .collect(),
            )
        }
        Ok(Some(_)) => None,
        Ok(None) => {
            warn!(
                context = "McapDataReader",
                path = %path,
                "MCAP file has no summary section, scanning for channels"
            );
            None
        }
        Err(e) => {
            warn!(
                context = "McapDataReader",
                path = %path,
                error = %e,
                "Failed to read summary, scanning for channels"
            );
            None
        }
    }
}

/// Collect topics from the schema and channel records of a whole file.
///
/// Message payloads are skipped without being copied.
fn scan_topics<R: Read>(path: &str, mut source: R) -> Result<Vec<TopicMetadata>> {
    let mut reader = LinearReader::new();
    let mut schemas: HashMap<u16, String> = HashMap::new();
    let mut channels: BTreeMap<u16, TopicMetadata> = BTreeMap::new();

    while let Some(event) = reader.next_event() {
        match event.map_err(|e| BagError::io(path, format!("Read error: {e}")))? {
            LinearReadEvent::ReadRequest(need) => {
                let read = source
                    .read(reader.insert(need))
                    .map_err(|e| BagError::io(path, format!("Failed to read: {e}")))?;
                reader.notify_read(read);
            }
            LinearReadEvent::Record { opcode, data } => {
                if opcode != op::SCHEMA && opcode != op::CHANNEL {
                    continue;
                }
                match mcap::parse_record(opcode, data)
                    .map_err(|e| BagError::io(path, format!("Bad record: {e}")))?
                {
                    McapRecord::Schema { header, .. } => {
                        schemas.insert(header.id, header.name);
                    }
                    McapRecord::Channel(channel) => {
                        channels
                            .entry(channel.id)
                            .or_insert_with(|| topic_from_record(&channel, &schemas));
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(channels.into_values().collect())
}

fn topic_from_channel(channel: &mcap::Channel<'_>) -> TopicMetadata {
    TopicMetadata {
        name: channel.topic.clone(),
        type_name: channel
            .schema
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_default(),
        serialization_format: channel.message_encoding.clone(),
        offered_qos_profiles: qos_of(&channel.metadata),
        first_seen: None,
    }
}

fn topic_from_record(
    channel: &mcap::records::Channel,
    schemas: &HashMap<u16, String>,
) -> TopicMetadata {
    TopicMetadata {
        name: channel.topic.clone(),
        type_name: schemas
            .get(&channel.schema_id)
            .cloned()
            .unwrap_or_default(),
        serialization_format: channel.message_encoding.clone(),
        offered_qos_profiles: qos_of(&channel.metadata),
        first_seen: None,
    }
}

fn qos_of(metadata: &BTreeMap<String, String>) -> String {
    metadata.get(QOS_METADATA_KEY).cloned().unwrap_or_default()
}
