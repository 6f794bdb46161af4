// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Writer for one output archive.
//!
//! An [`ArchiveWriter`] owns one logical archive: a fresh directory, its
//! data files and its `metadata.yaml`. When a capacity limit of the storage
//! options is reached it rolls over to a new data file; callers keep
//! writing to the same archive and receive a single metadata summary.
//!
//! Data files are named `<base>_<n>.<ext>`, where `<base>` is the last
//! component of the archive path.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::CompressionMode;
use crate::io::metadata::{
    ArchiveMetadata, FileInformation, Record, TopicInformation, TopicMetadata,
};
use crate::io::registry::StorageRegistry;
use crate::io::traits::{StorageBackend, StorageWriter, WriteSettings};
use crate::{BagError, Result};

/// Default compression format when a compression mode is set without one.
pub const DEFAULT_COMPRESSION_FORMAT: &str = "zstd";

/// Suffix of data files compressed in file mode.
pub const FILE_COMPRESSION_SUFFIX: &str = ".zstd";

/// Statistics of the data file currently being written.
#[derive(Debug)]
struct OpenFile {
    name: String,
    path: PathBuf,
    starting_time: Option<u64>,
    last_time: u64,
    message_count: u64,
}

impl OpenFile {
    fn new(name: String, path: PathBuf) -> Self {
        Self {
            name,
            path,
            starting_time: None,
            last_time: 0,
            message_count: 0,
        }
    }

    fn observe(&mut self, timestamp: u64) {
        self.starting_time = Some(self.starting_time.map_or(timestamp, |t| t.min(timestamp)));
        self.last_time = self.last_time.max(timestamp);
        self.message_count += 1;
    }

    fn duration(&self) -> u64 {
        self.starting_time
            .map_or(0, |start| self.last_time.saturating_sub(start))
    }
}

/// Writer for one logical output archive.
pub struct ArchiveWriter {
    uri: String,
    dir: PathBuf,
    base_name: String,
    backend: Arc<dyn StorageBackend>,
    settings: WriteSettings,

    current: Option<Box<dyn StorageWriter>>,
    current_file: Option<OpenFile>,
    next_index: usize,

    topics: Vec<TopicMetadata>,
    topic_index: HashMap<String, usize>,
    topic_counts: Vec<u64>,

    files: Vec<FileInformation>,
    message_count: u64,
    min_timestamp: Option<u64>,
    max_timestamp: u64,

    finished: Option<ArchiveMetadata>,
    abandoned: bool,
}

impl ArchiveWriter {
    /// Create a new archive.
    ///
    /// Fails if the archive directory already exists or the storage
    /// identifier is unknown. The first data file is created immediately.
    pub fn create(registry: &StorageRegistry, mut settings: WriteSettings) -> Result<Self> {
        let uri = settings.storage.uri.clone();
        let backend = registry.get(&settings.storage.storage_id).ok_or_else(|| {
            BagError::io(
                &uri,
                format!(
                    "Unknown storage identifier '{}'",
                    settings.storage.storage_id
                ),
            )
        })?;

        if settings.compression_mode.is_compressed() && settings.compression_format.is_empty() {
            settings.compression_format = DEFAULT_COMPRESSION_FORMAT.to_string();
        }

        let dir = settings.storage.path();
        if dir.exists() {
            return Err(BagError::io(&uri, "Output directory already exists"));
        }
        fs::create_dir_all(&dir)
            .map_err(|e| BagError::io(&uri, format!("Failed to create directory: {e}")))?;

        let mut writer = Self {
            base_name: settings.storage.base_name(),
            uri,
            dir,
            backend,
            settings,
            current: None,
            current_file: None,
            next_index: 0,
            topics: Vec::new(),
            topic_index: HashMap::new(),
            topic_counts: Vec::new(),
            files: Vec::new(),
            message_count: 0,
            min_timestamp: None,
            max_timestamp: 0,
            finished: None,
            abandoned: false,
        };
        if let Err(e) = writer.open_next_file() {
            writer.abandoned = true;
            let _ = fs::remove_dir_all(&writer.dir);
            return Err(e);
        }

        debug!(
            context = "ArchiveWriter",
            uri = %writer.uri,
            storage_id = writer.backend.storage_id(),
            compression = ?writer.settings.compression_mode,
            "Created archive"
        );

        Ok(writer)
    }

    /// Get the archive URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Get the archive directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Total number of messages written.
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Number of messages written on a topic.
    pub fn topic_message_count(&self, topic: &str) -> u64 {
        self.topic_index.get(topic).map_or(0, |&i| self.topic_counts[i])
    }

    /// Check whether a topic has been registered.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topic_index.contains_key(topic)
    }

    /// Number of data files started so far.
    pub fn file_count(&self) -> usize {
        self.next_index
    }

    /// Check whether the archive has been finalized.
    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Check whether the archive was given up without metadata.
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// Register a topic. Registering a known topic is a no-op.
    pub fn create_topic(&mut self, topic: &TopicMetadata) -> Result<()> {
        self.ensure_writable()?;
        if self.topic_index.contains_key(&topic.name) {
            return Ok(());
        }
        if let Some(writer) = self.current.as_mut() {
            writer.create_topic(topic)?;
        }
        debug!(
            context = "ArchiveWriter",
            uri = %self.uri,
            topic = %topic.name,
            type_name = %topic.type_name,
            "Registered topic"
        );
        self.topic_index.insert(topic.name.clone(), self.topics.len());
        self.topics.push(topic.clone());
        self.topic_counts.push(0);
        Ok(())
    }

    /// Append a record, rolling over to a new data file when a limit is hit.
    ///
    /// The record's topic must have been registered.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        self.ensure_writable()?;
        let topic = *self.topic_index.get(&record.topic).ok_or_else(|| {
            BagError::io(
                &self.uri,
                format!("Topic '{}' was not registered before writing", record.topic),
            )
        })?;

        if self.should_roll_over(record.send_timestamp) {
            self.roll_over()?;
        }

        let writer = self
            .current
            .as_mut()
            .ok_or_else(|| BagError::io(&self.uri, "No open data file"))?;
        writer.write(record)?;

        if let Some(file) = self.current_file.as_mut() {
            file.observe(record.send_timestamp);
        }
        self.topic_counts[topic] += 1;
        self.message_count += 1;
        self.min_timestamp = Some(
            self.min_timestamp
                .map_or(record.send_timestamp, |t| t.min(record.send_timestamp)),
        );
        self.max_timestamp = self.max_timestamp.max(record.send_timestamp);
        Ok(())
    }

    /// Close the current data file and write `metadata.yaml`.
    ///
    /// Returns the archive metadata. Calling `finish` again returns the same
    /// metadata without touching the disk.
    pub fn finish(&mut self) -> Result<ArchiveMetadata> {
        if let Some(metadata) = &self.finished {
            return Ok(metadata.clone());
        }
        if self.abandoned {
            return Err(BagError::io(&self.uri, "Archive was abandoned"));
        }

        self.close_current_file()?;

        let mut metadata = ArchiveMetadata::new(self.backend.storage_id());
        metadata.starting_time = self.min_timestamp.unwrap_or(0);
        metadata.duration = self
            .min_timestamp
            .map_or(0, |min| self.max_timestamp.saturating_sub(min));
        metadata.message_count = self.message_count;
        metadata.topics_with_message_count = self
            .topics
            .iter()
            .zip(&self.topic_counts)
            .map(|(topic, &count)| TopicInformation {
                topic_metadata: topic.clone(),
                message_count: count,
            })
            .collect();
        if self.settings.compression_mode.is_compressed() {
            metadata.compression_format = self.settings.compression_format.clone();
            metadata.compression_mode =
                self.settings.compression_mode.as_metadata_str().to_string();
        }
        metadata.relative_file_paths = self.files.iter().map(|f| f.path.clone()).collect();
        metadata.files = self.files.clone();

        metadata.write_to_dir(&self.dir)?;

        debug!(
            context = "ArchiveWriter",
            uri = %self.uri,
            messages = metadata.message_count,
            files = metadata.relative_file_paths.len(),
            "Finalized archive"
        );

        self.finished = Some(metadata.clone());
        Ok(metadata)
    }

    /// Close the current data file without writing `metadata.yaml`.
    ///
    /// Data files already written stay on disk. Errors while closing are
    /// logged and otherwise ignored; the archive accepts no further writes.
    pub fn abandon(&mut self) {
        if self.finished.is_some() || self.abandoned {
            return;
        }
        self.abandoned = true;
        self.current_file = None;
        if let Some(mut writer) = self.current.take() {
            if let Err(e) = writer.finish() {
                warn!(
                    context = "ArchiveWriter",
                    uri = %self.uri,
                    error = %e,
                    "Failed to close data file of abandoned archive"
                );
            }
        }
        debug!(
            context = "ArchiveWriter",
            uri = %self.uri,
            messages = self.message_count,
            "Abandoned archive"
        );
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.finished.is_some() {
            return Err(BagError::io(&self.uri, "Archive already finalized"));
        }
        if self.abandoned {
            return Err(BagError::io(&self.uri, "Archive was abandoned"));
        }
        Ok(())
    }

    fn should_roll_over(&self, timestamp: u64) -> bool {
        let Some(file) = &self.current_file else {
            return false;
        };
        if file.message_count == 0 {
            return false;
        }

        let storage = &self.settings.storage;
        if storage.max_bagfile_size > 0 {
            let written = self.current.as_ref().map_or(0, |w| w.bytes_written());
            if written >= storage.max_bagfile_size {
                return true;
            }
        }
        if storage.max_bagfile_duration > 0 {
            if let Some(start) = file.starting_time {
                if timestamp.saturating_sub(start) >= storage.max_bagfile_duration_ns() {
                    return true;
                }
            }
        }
        false
    }

    fn roll_over(&mut self) -> Result<()> {
        self.close_current_file()?;
        self.open_next_file()?;
        let topics = self.topics.clone();
        if let Some(writer) = self.current.as_mut() {
            for topic in &topics {
                writer.create_topic(topic)?;
            }
        }
        debug!(
            context = "ArchiveWriter",
            uri = %self.uri,
            file_index = self.next_index - 1,
            "Rolled over to new data file"
        );
        Ok(())
    }

    fn open_next_file(&mut self) -> Result<()> {
        let name = format!(
            "{}_{}.{}",
            self.base_name,
            self.next_index,
            self.backend.file_extension()
        );
        let path = self.dir.join(&name);
        let writer = self.backend.open_write(&path, &self.settings)?;
        self.current = Some(writer);
        self.current_file = Some(OpenFile::new(name, path));
        self.next_index += 1;
        Ok(())
    }

    fn close_current_file(&mut self) -> Result<()> {
        let Some(mut writer) = self.current.take() else {
            return Ok(());
        };
        writer.finish()?;

        let Some(file) = self.current_file.take() else {
            return Ok(());
        };
        let mut relative = file.name.clone();
        if self.settings.compression_mode == CompressionMode::File {
            compress_file(&file.path)?;
            relative.push_str(FILE_COMPRESSION_SUFFIX);
        }

        self.files.push(FileInformation {
            path: relative,
            starting_time: file.starting_time.unwrap_or(0),
            duration: file.duration(),
            message_count: file.message_count,
        });
        Ok(())
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if self.finished.is_none() && !self.abandoned {
            if let Err(e) = self.finish() {
                warn!(
                    context = "ArchiveWriter",
                    uri = %self.uri,
                    error = %e,
                    "Failed to finalize archive on drop"
                );
            }
        }
    }
}

/// Compress a finished data file to `<path>.zstd` and remove the original.
fn compress_file(path: &Path) -> Result<()> {
    let uri = path.display().to_string();
    let mut target = path.as_os_str().to_owned();
    target.push(FILE_COMPRESSION_SUFFIX);

    let source = File::open(path)
        .map_err(|e| BagError::io(&uri, format!("Failed to open for compression: {e}")))?;
    let dest = File::create(&target)
        .map_err(|e| BagError::io(&uri, format!("Failed to create compressed file: {e}")))?;
    zstd::stream::copy_encode(source, dest, zstd::DEFAULT_COMPRESSION_LEVEL)
        .map_err(|e| BagError::io(&uri, format!("Failed to compress: {e}")))?;
    fs::remove_file(path)
        .map_err(|e| BagError::io(&uri, format!("Failed to remove uncompressed file: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::formats::mcap::McapStorage;
    use crate::io::options::StorageOptions;
    use crate::io::reader::ArchiveReader;
    use crate::io::traits::StorageReader;

    /// MCAP backend whose data files can never be created.
    struct FullDisk;

    impl StorageBackend for FullDisk {
        fn storage_id(&self) -> &str {
            "full_disk"
        }

        fn file_extension(&self) -> &str {
            "mcap"
        }

        fn matches_header(&self, _header: &[u8]) -> bool {
            false
        }

        fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
            McapStorage.open_read(path)
        }

        fn open_write(
            &self,
            path: &Path,
            _settings: &WriteSettings,
        ) -> Result<Box<dyn StorageWriter>> {
            Err(BagError::io(path.display().to_string(), "disk full"))
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "robobag_archive_writer_{}_{}",
            std::process::id(),
            name
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn settings(dir: &Path) -> WriteSettings {
        WriteSettings {
            storage: StorageOptions::new(dir.to_string_lossy()),
            ..WriteSettings::default()
        }
    }

    #[test]
    fn test_empty_archive_has_metadata() {
        let dir = temp_dir("empty");
        let mut writer =
            ArchiveWriter::create(&StorageRegistry::default(), settings(&dir)).unwrap();
        let metadata = writer.finish().unwrap();

        assert_eq!(metadata.message_count, 0);
        assert_eq!(metadata.storage_identifier, "mcap");
        assert!(metadata.topics_with_message_count.is_empty());
        assert_eq!(metadata.relative_file_paths.len(), 1);
        assert!(ArchiveMetadata::exists_in(&dir));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_counts_and_times() {
        let dir = temp_dir("counts");
        let mut writer =
            ArchiveWriter::create(&StorageRegistry::default(), settings(&dir)).unwrap();
        writer
            .create_topic(&TopicMetadata::new("/a", "T", "cdr"))
            .unwrap();
        writer
            .create_topic(&TopicMetadata::new("/b", "T", "cdr"))
            .unwrap();
        writer.write(&Record::new("/a", 1_000, vec![1])).unwrap();
        writer.write(&Record::new("/b", 1_500, vec![2])).unwrap();
        writer.write(&Record::new("/a", 3_000, vec![3])).unwrap();

        assert_eq!(writer.topic_message_count("/a"), 2);
        assert_eq!(writer.topic_message_count("/c"), 0);

        let metadata = writer.finish().unwrap();
        assert_eq!(metadata.message_count, 3);
        assert_eq!(metadata.sum_of_topic_counts(), 3);
        assert_eq!(metadata.starting_time, 1_000);
        assert_eq!(metadata.duration, 2_000);
        assert_eq!(metadata.topic_message_count("/b"), Some(1));

        let on_disk = ArchiveMetadata::read_from_dir(&dir).unwrap();
        assert_eq!(on_disk, metadata);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_existing_directory_is_rejected() {
        let dir = temp_dir("exists");
        fs::create_dir_all(&dir).unwrap();
        let result = ArchiveWriter::create(&StorageRegistry::default(), settings(&dir));
        assert!(result.err().unwrap().to_string().contains("already exists"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unknown_storage_id_creates_nothing() {
        let dir = temp_dir("sqlite");
        let mut s = settings(&dir);
        s.storage.storage_id = "sqlite3".to_string();
        let result = ArchiveWriter::create(&StorageRegistry::default(), s);
        assert!(result.is_err());
        assert!(!dir.exists());
    }

    #[test]
    fn test_unregistered_topic_write_fails() {
        let dir = temp_dir("unregistered");
        let mut writer =
            ArchiveWriter::create(&StorageRegistry::default(), settings(&dir)).unwrap();
        assert!(writer.write(&Record::new("/x", 1, vec![])).is_err());
        writer.finish().unwrap();
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_finish_is_idempotent_and_blocks_writes() {
        let dir = temp_dir("idempotent");
        let mut writer =
            ArchiveWriter::create(&StorageRegistry::default(), settings(&dir)).unwrap();
        writer
            .create_topic(&TopicMetadata::new("/a", "T", "cdr"))
            .unwrap();
        writer.write(&Record::new("/a", 5, vec![0])).unwrap();
        let first = writer.finish().unwrap();
        let second = writer.finish().unwrap();
        assert_eq!(first, second);
        assert!(writer.is_finished());
        assert!(writer.write(&Record::new("/a", 6, vec![0])).is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_duration_rollover() {
        let dir = temp_dir("rollover");
        let mut s = settings(&dir);
        s.storage.max_bagfile_duration = 1;
        let mut writer = ArchiveWriter::create(&StorageRegistry::default(), s).unwrap();
        writer
            .create_topic(&TopicMetadata::new("/a", "T", "cdr"))
            .unwrap();

        // 0s, 0.5s, 1.2s, 1.4s, 2.5s
        for ts in [0, 500_000_000, 1_200_000_000, 1_400_000_000, 2_500_000_000u64] {
            writer.write(&Record::new("/a", ts, vec![1, 2])).unwrap();
        }
        let metadata = writer.finish().unwrap();

        let base = dir.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(
            metadata.relative_file_paths,
            vec![
                format!("{base}_0.mcap"),
                format!("{base}_1.mcap"),
                format!("{base}_2.mcap"),
            ]
        );
        let per_file: Vec<u64> = metadata.files.iter().map(|f| f.message_count).collect();
        assert_eq!(per_file, vec![2, 2, 1]);
        assert_eq!(metadata.message_count, 5);

        let reader = ArchiveReader::open(
            &StorageOptions::new(dir.to_string_lossy()),
            &StorageRegistry::default(),
        )
        .unwrap();
        assert_eq!(reader.topics().len(), 1);
        let stamps: Vec<u64> = reader.map(|r| r.unwrap().send_timestamp).collect();
        assert_eq!(
            stamps,
            vec![0, 500_000_000, 1_200_000_000, 1_400_000_000, 2_500_000_000]
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_size_rollover_tracks_buffered_bytes() {
        let dir = temp_dir("size_rollover");
        let limit = 64 * 1024;
        let mut s = settings(&dir);
        s.storage.max_bagfile_size = limit;
        let mut writer = ArchiveWriter::create(&StorageRegistry::default(), s).unwrap();
        writer
            .create_topic(&TopicMetadata::new("/a", "T", "cdr"))
            .unwrap();
        for ts in 0..200u64 {
            writer.write(&Record::new("/a", ts, vec![0u8; 4096])).unwrap();
        }
        let metadata = writer.finish().unwrap();

        // 200 x 4 KiB is 800 KiB, so roughly one file per 64 KiB.
        assert!(metadata.files.len() >= 10, "files = {}", metadata.files.len());
        assert_eq!(metadata.message_count, 200);
        for file in &metadata.relative_file_paths {
            let size = fs::metadata(dir.join(file)).unwrap().len();
            assert!(size < 2 * limit, "{file} is {size} bytes");
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failed_first_file_leaves_nothing() {
        let dir = temp_dir("full_disk");
        let mut registry = StorageRegistry::default();
        registry.register(Arc::new(FullDisk));
        let mut s = settings(&dir);
        s.storage.storage_id = "full_disk".to_string();

        let err = ArchiveWriter::create(&registry, s).err().unwrap();
        assert!(err.to_string().contains("disk full"));
        assert!(!dir.exists());
        assert!(!ArchiveMetadata::exists_in(&dir));
    }

    #[test]
    fn test_abandon_skips_metadata() {
        let dir = temp_dir("abandon");
        {
            let mut writer =
                ArchiveWriter::create(&StorageRegistry::default(), settings(&dir)).unwrap();
            writer
                .create_topic(&TopicMetadata::new("/a", "T", "cdr"))
                .unwrap();
            writer.write(&Record::new("/a", 1, vec![1])).unwrap();
            writer.abandon();

            assert!(writer.is_abandoned());
            assert!(writer.write(&Record::new("/a", 2, vec![2])).is_err());
            assert!(writer.finish().is_err());
        }
        assert!(dir.is_dir());
        assert!(!ArchiveMetadata::exists_in(&dir));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_compression() {
        let dir = temp_dir("file_compression");
        let mut s = settings(&dir);
        s.compression_mode = CompressionMode::File;
        let mut writer = ArchiveWriter::create(&StorageRegistry::default(), s).unwrap();
        writer
            .create_topic(&TopicMetadata::new("/a", "T", "cdr"))
            .unwrap();
        writer.write(&Record::new("/a", 1, vec![7; 32])).unwrap();
        let metadata = writer.finish().unwrap();

        assert_eq!(metadata.compression_format, "zstd");
        assert_eq!(metadata.compression_mode, "FILE");
        assert!(metadata.relative_file_paths[0].ends_with(".mcap.zstd"));
        assert!(dir.join(&metadata.relative_file_paths[0]).is_file());

        let reader = ArchiveReader::open(
            &StorageOptions::new(dir.to_string_lossy()),
            &StorageRegistry::default(),
        )
        .unwrap();
        let records: Vec<Record> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, vec![7; 32]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_drop_finalizes() {
        let dir = temp_dir("drop");
        {
            let mut writer =
                ArchiveWriter::create(&StorageRegistry::default(), settings(&dir)).unwrap();
            writer
                .create_topic(&TopicMetadata::new("/a", "T", "cdr"))
                .unwrap();
        }
        let metadata = ArchiveMetadata::read_from_dir(&dir).unwrap();
        assert_eq!(metadata.topics_with_message_count.len(), 1);
        let _ = fs::remove_dir_all(&dir);
    }
}
