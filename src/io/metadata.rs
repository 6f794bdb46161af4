// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Shared metadata types for bag archives.
//!
//! This module provides the types that describe what is inside an archive
//! (topics, records) and the summary file written next to the data files
//! of every archive (`metadata.yaml`).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{BagError, Result};

/// Canonical name of the summary metadata file of an archive.
pub const METADATA_FILENAME: &str = "metadata.yaml";

/// Version tag written to every `metadata.yaml`.
pub const METADATA_VERSION: u32 = 5;

/// Information about a topic in an archive.
///
/// A topic is a named, typed channel of messages. The payloads stay opaque:
/// only the type name and serialization format are carried along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMetadata {
    /// Topic name (e.g., "/joint_states")
    pub name: String,
    /// Serialized type name (e.g., "sensor_msgs/msg/JointState")
    #[serde(rename = "type")]
    pub type_name: String,
    /// Serialization format identifier (e.g., "cdr")
    pub serialization_format: String,
    /// Offered quality-of-service profile, kept as an opaque string
    #[serde(default)]
    pub offered_qos_profiles: String,
    /// Earliest send timestamp seen for this topic (nanoseconds)
    #[serde(skip)]
    pub first_seen: Option<u64>,
}

impl TopicMetadata {
    /// Create a new TopicMetadata.
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        serialization_format: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            serialization_format: serialization_format.into(),
            offered_qos_profiles: String::new(),
            first_seen: None,
        }
    }

    /// Set the offered QoS profile.
    pub fn with_qos(mut self, qos: impl Into<String>) -> Self {
        self.offered_qos_profiles = qos.into();
        self
    }

    /// Set the first-seen timestamp.
    pub fn with_first_seen(mut self, timestamp: u64) -> Self {
        self.first_seen = Some(timestamp);
        self
    }

    /// Check whether two declarations of the same topic can share an archive.
    ///
    /// Only the type name and the serialization format matter; QoS profiles
    /// may differ between recordings.
    pub fn is_compatible(&self, other: &TopicMetadata) -> bool {
        self.type_name == other.type_name
            && self.serialization_format == other.serialization_format
    }

    /// Human-readable form of the declaration, used in conflict reports.
    pub fn declaration(&self) -> String {
        format!("{} [{}]", self.type_name, self.serialization_format)
    }

    /// Lower the first-seen timestamp if `timestamp` is earlier.
    pub fn observe(&mut self, timestamp: u64) {
        self.first_seen = Some(match self.first_seen {
            Some(current) => current.min(timestamp),
            None => timestamp,
        });
    }
}

/// One recorded message.
///
/// The payload is kept as serialized bytes and never decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Topic the message belongs to
    pub topic: String,
    /// Serialized payload
    pub data: Vec<u8>,
    /// Send timestamp (nanoseconds)
    pub send_timestamp: u64,
    /// Receive timestamp (nanoseconds), if the storage keeps it
    pub recv_timestamp: Option<u64>,
}

impl Record {
    /// Create a new Record.
    pub fn new(topic: impl Into<String>, send_timestamp: u64, data: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            data,
            send_timestamp,
            recv_timestamp: None,
        }
    }

    /// Set the receive timestamp.
    pub fn with_recv_timestamp(mut self, timestamp: u64) -> Self {
        self.recv_timestamp = Some(timestamp);
        self
    }

    /// Get the payload length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Per-topic entry of the archive summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInformation {
    /// Topic declaration
    pub topic_metadata: TopicMetadata,
    /// Number of messages on this topic
    pub message_count: u64,
}

/// Per-data-file entry of the archive summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInformation {
    /// File name relative to the archive directory
    pub path: String,
    /// Earliest send timestamp in the file
    #[serde(with = "time_point")]
    pub starting_time: u64,
    /// Span between earliest and latest send timestamp
    #[serde(with = "duration")]
    pub duration: u64,
    /// Number of messages in the file
    pub message_count: u64,
}

/// Summary metadata of one archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    /// Metadata schema version
    pub version: u32,
    /// Storage backend identifier (e.g., "mcap")
    pub storage_identifier: String,
    /// Span between earliest and latest message (nanoseconds)
    #[serde(with = "duration")]
    pub duration: u64,
    /// Earliest message timestamp (nanoseconds)
    #[serde(with = "time_point")]
    pub starting_time: u64,
    /// Total message count
    pub message_count: u64,
    /// Topics with their message counts
    pub topics_with_message_count: Vec<TopicInformation>,
    /// Compression format (e.g., "zstd"), empty when uncompressed
    #[serde(default)]
    pub compression_format: String,
    /// Compression mode ("FILE", "MESSAGE"), empty when uncompressed
    #[serde(default)]
    pub compression_mode: String,
    /// Data file names relative to the archive directory, in write order
    pub relative_file_paths: Vec<String>,
    /// Per-file details, in write order
    #[serde(default)]
    pub files: Vec<FileInformation>,
}

#[derive(Serialize, Deserialize)]
struct MetadataDocument {
    rosbag2_bagfile_information: ArchiveMetadata,
}

impl ArchiveMetadata {
    /// Create an empty summary for the given storage backend.
    pub fn new(storage_identifier: impl Into<String>) -> Self {
        Self {
            version: METADATA_VERSION,
            storage_identifier: storage_identifier.into(),
            duration: 0,
            starting_time: 0,
            message_count: 0,
            topics_with_message_count: Vec::new(),
            compression_format: String::new(),
            compression_mode: String::new(),
            relative_file_paths: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Get the message count of a topic, if the topic is present.
    pub fn topic_message_count(&self, topic: &str) -> Option<u64> {
        self.topics_with_message_count
            .iter()
            .find(|t| t.topic_metadata.name == topic)
            .map(|t| t.message_count)
    }

    /// Sum of the per-topic message counts.
    pub fn sum_of_topic_counts(&self) -> u64 {
        self.topics_with_message_count
            .iter()
            .map(|t| t.message_count)
            .sum()
    }

    /// Serialize to the `metadata.yaml` document format.
    pub fn to_yaml_string(&self) -> Result<String> {
        let doc = MetadataDocument {
            rosbag2_bagfile_information: self.clone(),
        };
        Ok(serde_yaml::to_string(&doc)?)
    }

    /// Parse a `metadata.yaml` document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let doc: MetadataDocument = serde_yaml::from_str(text)?;
        Ok(doc.rosbag2_bagfile_information)
    }

    /// Check whether an archive directory carries a metadata file.
    pub fn exists_in(dir: &Path) -> bool {
        dir.join(METADATA_FILENAME).is_file()
    }

    /// Read the metadata file of an archive directory.
    pub fn read_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(METADATA_FILENAME);
        let text = fs::read_to_string(&path)
            .map_err(|e| BagError::io(path.display().to_string(), e))?;
        Self::from_yaml_str(&text).map_err(|e| match e {
            BagError::Io { message, .. } => BagError::io(path.display().to_string(), message),
            other => other,
        })
    }

    /// Write the metadata file into an archive directory.
    pub fn write_to_dir(&self, dir: &Path) -> Result<()> {
        let path = dir.join(METADATA_FILENAME);
        let text = self.to_yaml_string()?;
        fs::write(&path, text).map_err(|e| BagError::io(path.display().to_string(), e))
    }
}

mod duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Nanoseconds {
        nanoseconds: u64,
    }

    pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
        Nanoseconds {
            nanoseconds: *value,
        }
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        Ok(Nanoseconds::deserialize(d)?.nanoseconds)
    }
}

mod time_point {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct SinceEpoch {
        nanoseconds_since_epoch: u64,
    }

    pub fn serialize<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
        SinceEpoch {
            nanoseconds_since_epoch: *value,
        }
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        Ok(SinceEpoch::deserialize(d)?.nanoseconds_since_epoch)
    }
}
