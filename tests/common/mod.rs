// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use robobag::io::reader::ArchiveReader;
use robobag::io::registry::StorageRegistry;
use robobag::io::traits::WriteSettings;
use robobag::io::writer::ArchiveWriter;
use robobag::{ArchiveMetadata, Record, StorageOptions, TopicMetadata};

// ============================================================================
// Temporary directories
// ============================================================================

/// Removes a directory tree when dropped.
#[derive(Debug)]
pub struct CleanupGuard(pub PathBuf);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

/// Create a fresh, unique temporary directory.
pub fn temp_root(name: &str) -> (PathBuf, CleanupGuard) {
    let random = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let thread_id = format!("{:?}", std::thread::current().id())
        .replace(|c: char| !c.is_ascii_alphanumeric(), "");
    let dir = std::env::temp_dir().join(format!(
        "robobag_{}_{}_{}_{}",
        name,
        std::process::id(),
        thread_id,
        random
    ));
    fs::create_dir_all(&dir).unwrap();
    (dir.clone(), CleanupGuard(dir))
}

/// Options for an archive path.
pub fn options(path: &Path) -> StorageOptions {
    StorageOptions::new(path.to_string_lossy())
}

// ============================================================================
// Fixtures
// ============================================================================

/// Payload encoding the topic and timestamp, so records can be traced back.
pub fn payload(topic: &str, timestamp: u64) -> Vec<u8> {
    format!("{topic}@{timestamp}").into_bytes()
}

/// Write an input archive.
///
/// Every topic is registered, even those without records.
pub fn write_archive(path: &Path, topics: &[TopicMetadata], records: &[(&str, u64)]) {
    let settings = WriteSettings {
        storage: options(path),
        ..WriteSettings::default()
    };
    let mut writer = ArchiveWriter::create(&StorageRegistry::default(), settings).unwrap();
    for topic in topics {
        writer.create_topic(topic).unwrap();
    }
    for &(topic, timestamp) in records {
        writer
            .write(&Record::new(topic, timestamp, payload(topic, timestamp)))
            .unwrap();
    }
    writer.finish().unwrap();
}

/// Topic with the string type and CDR serialization.
pub fn string_topic(name: &str) -> TopicMetadata {
    TopicMetadata::new(name, "std_msgs/msg/String", "cdr")
}

/// The two-input scenario archives.
///
/// Archive A has topics `a_empty` (no records) and `a_full`; archive B has
/// `b_full` and `b_empty` (no records). Returns the paths of A and B.
pub fn scenario_inputs(root: &Path) -> (PathBuf, PathBuf) {
    let a = root.join("convert_a");
    let b = root.join("convert_b");
    write_archive(
        &a,
        &[string_topic("a_empty"), string_topic("a_full")],
        &[("a_full", 100), ("a_full", 300), ("a_full", 500)],
    );
    write_archive(
        &b,
        &[string_topic("b_full"), string_topic("b_empty")],
        &[("b_full", 200), ("b_full", 300), ("b_full", 600)],
    );
    (a, b)
}

// ============================================================================
// Readback
// ============================================================================

/// Read an archive back: its topics and records in stored order.
pub fn read_archive(path: &Path) -> (Vec<TopicMetadata>, Vec<Record>) {
    let reader = ArchiveReader::open(&options(path), &StorageRegistry::default()).unwrap();
    let topics = reader.topics().to_vec();
    let records = reader.map(|r| r.unwrap()).collect();
    (topics, records)
}

/// Read the metadata of an archive.
pub fn read_metadata(path: &Path) -> ArchiveMetadata {
    ArchiveMetadata::read_from_dir(path).unwrap()
}

/// (topic, timestamp) pairs of records.
pub fn stamps(records: &[Record]) -> Vec<(String, u64)> {
    records
        .iter()
        .map(|r| (r.topic.clone(), r.send_timestamp))
        .collect()
}
