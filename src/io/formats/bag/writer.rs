// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! ROS1 bag file writer implementation.
//!
//! # ROS1 Bag Format Overview
//!
//! A ROS1 bag file has the following structure:
//! 1. Version line: `#ROSBAG V2.0\n`
//! 2. File header record (4096 bytes, padded)
//! 3. Chunks, each followed by its index records:
//!    - Chunk record (optionally bz2-compressed) holding connection and
//!      message data records
//!    - Index data records (one per connection in the chunk)
//! 4. Connection records (summary at end)
//! 5. Chunk info records (summary at end)
//!
//! Messages are stored in the order they are written. The bag is built in
//! `<path>.partial` and renamed to `<path>` by [`BagWriter::finish`]; a
//! writer dropped before finishing removes its partial file.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use vidimu::io::formats::bag::{messages, BagMessage, BagWriter};
//!
//! let mut writer = BagWriter::create("output.bag")?;
//! let conn = writer.add_connection("/imu0", &messages::IMU)?;
//!
//! let data = messages::Imu::new(1_000, [0.0; 3], [0.0, 0.0, 9.8]).serialize();
//! writer.write_message(&BagMessage::new(conn, 1_000, data))?;
//!
//! writer.finish()?;
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::messages::MessageType;
use crate::core::{split_time_ns, Result, VidimuError};

/// ROS bag version string
const VERSION: &str = "2.0";

/// Operation codes for different record types
pub(crate) const OP_MSG_DATA: u8 = 0x02;
pub(crate) const OP_BAG_HEADER: u8 = 0x03;
pub(crate) const OP_INDEX_DATA: u8 = 0x04;
pub(crate) const OP_CHUNK: u8 = 0x05;
pub(crate) const OP_CHUNK_INFO: u8 = 0x06;
pub(crate) const OP_CONNECTION: u8 = 0x07;

/// Index data version
const INDEX_VERSION: u32 = 1;

/// Chunk info version
const CHUNK_INFO_VERSION: u32 = 1;

/// Default chunk threshold (768KB)
const DEFAULT_CHUNK_THRESHOLD: usize = 768 * 1024;

const SINK: &str = "BagWriter";

/// Chunk compression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BagCompression {
    #[default]
    None,
    Bz2,
}

impl BagCompression {
    fn as_str(&self) -> &'static str {
        match self {
            BagCompression::None => "none",
            BagCompression::Bz2 => "bz2",
        }
    }
}

/// Options for [`BagWriter::create_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BagWriterOptions {
    pub compression: BagCompression,
    /// Uncompressed chunk size that triggers a flush
    pub chunk_threshold: usize,
}

impl Default for BagWriterOptions {
    fn default() -> Self {
        Self {
            compression: BagCompression::None,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
        }
    }
}

/// A message to be written to a bag file.
#[derive(Debug, Clone)]
pub struct BagMessage {
    /// Connection ID returned by [`BagWriter::add_connection`]
    pub conn_id: u32,
    /// Timestamp in nanoseconds
    pub time_ns: u64,
    /// ROS1 serialized message bytes
    pub data: Vec<u8>,
}

impl BagMessage {
    pub fn new(conn_id: u32, time_ns: u64, data: Vec<u8>) -> Self {
        Self {
            conn_id,
            time_ns,
            data,
        }
    }
}

/// Connection info for a topic
#[derive(Debug, Clone)]
struct ConnectionInfo {
    id: u32,
    topic: String,
    message: MessageType,
}

/// Index entry for message lookup
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    /// Timestamp (sec, nsec)
    time: (u32, u32),
    /// Offset within the uncompressed chunk data
    offset: u32,
}

/// Chunk info for the bag summary
#[derive(Debug, Clone)]
struct ChunkInfo {
    /// Position of the chunk record in the file
    pos: u64,
    start_time: (u32, u32),
    end_time: (u32, u32),
    /// Message count per connection ID
    connection_counts: BTreeMap<u32, u32>,
}

/// ROS1 bag file writer.
///
/// # Important
///
/// You must call [`finish()`](BagWriter::finish) to produce the bag. A
/// writer dropped without finishing deletes its partial output.
pub struct BagWriter {
    writer: BufWriter<File>,
    /// Final bag path
    path: PathBuf,
    /// Path being written until `finish`
    partial_path: PathBuf,
    is_open: bool,
    options: BagWriterOptions,

    /// Mapping from topic to connection ID
    topic_connection_ids: HashMap<String, u32>,
    /// All connections, by ID
    connections: BTreeMap<u32, ConnectionInfo>,
    chunk_infos: Vec<ChunkInfo>,

    /// Uncompressed data of the chunk being built
    chunk_data: Vec<u8>,
    current_chunk_info: Option<ChunkInfo>,
    /// Index entries of the current chunk, per connection
    current_chunk_indexes: BTreeMap<u32, Vec<IndexEntry>>,
    /// Connections written to the current chunk
    connections_written_to_chunk: HashSet<u32>,

    /// Total bytes written to file
    file_pos: u64,
    message_count: u64,
}

impl BagWriter {
    /// Create a new bag file with default options.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with(path, BagWriterOptions::default())
    }

    /// Create a new bag file.
    pub fn create_with<P: AsRef<Path>>(path: P, options: BagWriterOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let partial_path = partial_path_for(&path);
        let file = File::create(&partial_path).map_err(|e| {
            VidimuError::sink(
                SINK,
                format!("Failed to create {}: {e}", partial_path.display()),
            )
        })?;

        let mut writer = BufWriter::new(file);

        // Placeholder header, rewritten by `finish`
        let mut start_buffer = Vec::new();
        Self::write_file_header_record(&mut start_buffer, 0, 0, 0);
        writer
            .write_all(&start_buffer)
            .map_err(|e| VidimuError::sink(SINK, format!("Failed to write header: {e}")))?;

        Ok(Self {
            writer,
            path,
            partial_path,
            is_open: true,
            options,
            topic_connection_ids: HashMap::new(),
            connections: BTreeMap::new(),
            chunk_infos: Vec::new(),
            chunk_data: Vec::new(),
            current_chunk_info: None,
            current_chunk_indexes: BTreeMap::new(),
            connections_written_to_chunk: HashSet::new(),
            file_pos: start_buffer.len() as u64,
            message_count: 0,
        })
    }

    /// Final path of the bag.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of messages written so far.
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Register a topic and return its connection ID.
    ///
    /// Registering a topic again with the same type returns the existing ID.
    pub fn add_connection(&mut self, topic: &str, message: &MessageType) -> Result<u32> {
        if !self.is_open {
            return Err(VidimuError::sink(
                SINK,
                "Cannot add connection to closed bag",
            ));
        }

        if let Some(&existing) = self.topic_connection_ids.get(topic) {
            if let Some(conn) = self.connections.get(&existing) {
                if conn.message.datatype == message.datatype {
                    return Ok(existing);
                }
                return Err(VidimuError::sink(
                    SINK,
                    format!(
                        "Topic {topic} already registered as {}, not {}",
                        conn.message.datatype, message.datatype
                    ),
                ));
            }
        }

        let conn_id = self.connections.len() as u32;
        self.topic_connection_ids.insert(topic.to_string(), conn_id);
        self.connections.insert(
            conn_id,
            ConnectionInfo {
                id: conn_id,
                topic: topic.to_string(),
                message: *message,
            },
        );
        Ok(conn_id)
    }

    /// Append a message to the bag.
    pub fn write_message(&mut self, msg: &BagMessage) -> Result<()> {
        if !self.is_open {
            return Err(VidimuError::sink(SINK, "Cannot write to closed bag"));
        }
        if !self.connections.contains_key(&msg.conn_id) {
            return Err(VidimuError::sink(
                SINK,
                format!(
                    "No connection found for conn_id {} (only {} connections added)",
                    msg.conn_id,
                    self.connections.len()
                ),
            ));
        }

        let time = split_time_ns(msg.time_ns)?;

        if self.current_chunk_info.is_none() {
            self.start_chunk(time);
        }

        if let Some(ref mut chunk_info) = self.current_chunk_info {
            if time < chunk_info.start_time {
                chunk_info.start_time = time;
            }
            if chunk_info.end_time < time {
                chunk_info.end_time = time;
            }
            *chunk_info.connection_counts.entry(msg.conn_id).or_default() += 1;
        }

        // Connection record precedes the first message of its topic in a chunk
        if self.connections_written_to_chunk.insert(msg.conn_id) {
            if let Some(conn) = self.connections.get(&msg.conn_id) {
                Self::write_connection_record(&mut self.chunk_data, conn);
            }
        }

        let offset = self.chunk_data.len() as u32;
        Self::write_message_data_record(&mut self.chunk_data, msg.conn_id, time, &msg.data);

        self.current_chunk_indexes
            .entry(msg.conn_id)
            .or_default()
            .push(IndexEntry { time, offset });
        self.message_count += 1;

        if self.chunk_data.len() >= self.options.chunk_threshold {
            self.finish_chunk()?;
        }

        Ok(())
    }

    fn start_chunk(&mut self, time: (u32, u32)) {
        self.current_chunk_info = Some(ChunkInfo {
            pos: self.file_pos,
            start_time: time,
            end_time: time,
            connection_counts: BTreeMap::new(),
        });
        self.connections_written_to_chunk.clear();
    }

    /// Write the current chunk and its index records to the file.
    fn finish_chunk(&mut self) -> Result<()> {
        let Some(chunk_info) = self.current_chunk_info.take() else {
            return Ok(());
        };

        let uncompressed_size = self.chunk_data.len() as u32;
        let payload = match self.options.compression {
            BagCompression::None => std::mem::take(&mut self.chunk_data),
            BagCompression::Bz2 => {
                let compressed = compress_bz2(&self.chunk_data)?;
                self.chunk_data.clear();
                compressed
            }
        };

        let mut buffer = Vec::with_capacity(payload.len() + 256);
        Self::write_chunk_header(
            &mut buffer,
            self.options.compression,
            uncompressed_size,
            payload.len() as u32,
        );
        buffer.extend_from_slice(&payload);
        Self::write_index_records(&mut buffer, &self.current_chunk_indexes);

        self.writer
            .write_all(&buffer)
            .map_err(|e| VidimuError::sink(SINK, format!("Failed to write chunk: {e}")))?;
        self.file_pos += buffer.len() as u64;

        tracing::trace!(
            chunk = self.chunk_infos.len(),
            bytes = buffer.len(),
            uncompressed = uncompressed_size,
            "Wrote bag chunk"
        );

        self.chunk_infos.push(chunk_info);
        self.current_chunk_indexes.clear();
        Ok(())
    }

    /// Flush the last chunk, write the summary and move the bag into place.
    ///
    /// The writer is consumed; it can be finished at most once.
    pub fn finish(mut self) -> Result<()> {
        self.finish_internal()
    }

    fn finish_internal(&mut self) -> Result<()> {
        if !self.is_open {
            return Err(VidimuError::sink(SINK, "Bag already closed"));
        }

        self.finish_chunk()?;

        let index_data_position = self.file_pos;

        let mut stop_buffer = Vec::new();
        for conn in self.connections.values() {
            Self::write_connection_record(&mut stop_buffer, conn);
        }
        Self::write_chunk_info_records(&mut stop_buffer, &self.chunk_infos);

        self.writer
            .write_all(&stop_buffer)
            .map_err(|e| VidimuError::sink(SINK, format!("Failed to write index: {e}")))?;

        let mut file_header_buffer = Vec::new();
        Self::write_file_header_record(
            &mut file_header_buffer,
            self.connections.len() as u32,
            self.chunk_infos.len() as u32,
            index_data_position,
        );

        self.writer
            .seek(SeekFrom::Start(0))
            .map_err(|e| VidimuError::sink(SINK, format!("Failed to seek: {e}")))?;
        self.writer
            .write_all(&file_header_buffer)
            .map_err(|e| VidimuError::sink(SINK, format!("Failed to update header: {e}")))?;
        self.writer
            .flush()
            .map_err(|e| VidimuError::sink(SINK, format!("Failed to flush: {e}")))?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| VidimuError::sink(SINK, format!("Failed to sync: {e}")))?;

        std::fs::rename(&self.partial_path, &self.path).map_err(|e| {
            VidimuError::sink(
                SINK,
                format!("Failed to move bag into {}: {e}", self.path.display()),
            )
        })?;
        self.is_open = false;

        tracing::debug!(
            path = %self.path.display(),
            messages = self.message_count,
            chunks = self.chunk_infos.len(),
            "Finished bag"
        );
        Ok(())
    }

    // =========================================================================
    // Helper functions for writing records
    // =========================================================================

    fn write_version(buffer: &mut Vec<u8>) {
        let version_line = format!("#ROSBAG V{VERSION}\n");
        buffer.extend_from_slice(version_line.as_bytes());
    }

    /// Write a header as key=value pairs.
    fn write_header(buffer: &mut Vec<u8>, fields: &BTreeMap<&str, Vec<u8>>) -> u32 {
        let mut header_data = Vec::new();

        for (key, value) in fields {
            // field_len (4 bytes) + key + '=' + value
            let field_len = key.len() + 1 + value.len();
            write_u32(&mut header_data, field_len as u32);
            header_data.extend_from_slice(key.as_bytes());
            header_data.push(b'=');
            header_data.extend_from_slice(value);
        }

        let header_len = header_data.len() as u32;
        write_u32(buffer, header_len);
        buffer.extend(header_data);

        header_len
    }

    /// Write file header record (padded to 4096 bytes).
    fn write_file_header_record(
        buffer: &mut Vec<u8>,
        connection_count: u32,
        chunk_count: u32,
        index_data_position: u64,
    ) {
        Self::write_version(buffer);
        let version_len = buffer.len();

        let mut fields = BTreeMap::new();
        fields.insert("op", vec![OP_BAG_HEADER]);
        fields.insert("index_pos", index_data_position.to_le_bytes().to_vec());
        fields.insert("conn_count", connection_count.to_le_bytes().to_vec());
        fields.insert("chunk_count", chunk_count.to_le_bytes().to_vec());

        let header_len = Self::write_header(buffer, &fields);

        // 4096 - version_len - 4 (header_len) - header_len - 4 (data_len) = data_len
        let used = version_len + 4 + header_len as usize;
        let data_len = 4096 - used - 4;

        write_u32(buffer, data_len as u32);
        buffer.resize(buffer.len() + data_len, b' ');
    }

    fn write_chunk_header(
        buffer: &mut Vec<u8>,
        compression: BagCompression,
        uncompressed_size: u32,
        stored_size: u32,
    ) {
        let mut fields = BTreeMap::new();
        fields.insert("op", vec![OP_CHUNK]);
        fields.insert("compression", compression.as_str().as_bytes().to_vec());
        fields.insert("size", uncompressed_size.to_le_bytes().to_vec());

        Self::write_header(buffer, &fields);
        write_u32(buffer, stored_size);
    }

    fn write_connection_record(buffer: &mut Vec<u8>, conn: &ConnectionInfo) {
        let mut fields = BTreeMap::new();
        fields.insert("op", vec![OP_CONNECTION]);
        fields.insert("conn", conn.id.to_le_bytes().to_vec());
        fields.insert("topic", conn.topic.as_bytes().to_vec());
        Self::write_header(buffer, &fields);

        // Connection data is itself a header
        let mut data_fields = BTreeMap::new();
        data_fields.insert("topic", conn.topic.as_bytes().to_vec());
        data_fields.insert("type", conn.message.datatype.as_bytes().to_vec());
        data_fields.insert("md5sum", conn.message.md5sum.as_bytes().to_vec());
        data_fields.insert(
            "message_definition",
            conn.message.definition.as_bytes().to_vec(),
        );
        data_fields.insert("callerid", b"/vidimu".to_vec());
        data_fields.insert("latching", b"0".to_vec());
        Self::write_header(buffer, &data_fields);
    }

    fn write_message_data_record(buffer: &mut Vec<u8>, conn_id: u32, time: (u32, u32), data: &[u8]) {
        let mut fields = BTreeMap::new();
        fields.insert("op", vec![OP_MSG_DATA]);
        fields.insert("conn", conn_id.to_le_bytes().to_vec());
        fields.insert("time", time_to_bytes(time));
        Self::write_header(buffer, &fields);

        write_u32(buffer, data.len() as u32);
        buffer.extend_from_slice(data);
    }

    fn write_index_records(buffer: &mut Vec<u8>, indexes: &BTreeMap<u32, Vec<IndexEntry>>) {
        for (conn_id, entries) in indexes {
            let mut fields = BTreeMap::new();
            fields.insert("op", vec![OP_INDEX_DATA]);
            fields.insert("conn", conn_id.to_le_bytes().to_vec());
            fields.insert("ver", INDEX_VERSION.to_le_bytes().to_vec());
            fields.insert("count", (entries.len() as u32).to_le_bytes().to_vec());
            Self::write_header(buffer, &fields);

            // 8 bytes time + 4 bytes offset per entry
            write_u32(buffer, (entries.len() * 12) as u32);
            for entry in entries {
                write_u32(buffer, entry.time.0);
                write_u32(buffer, entry.time.1);
                write_u32(buffer, entry.offset);
            }
        }
    }

    fn write_chunk_info_records(buffer: &mut Vec<u8>, chunk_infos: &[ChunkInfo]) {
        for chunk_info in chunk_infos {
            let mut fields = BTreeMap::new();
            fields.insert("op", vec![OP_CHUNK_INFO]);
            fields.insert("ver", CHUNK_INFO_VERSION.to_le_bytes().to_vec());
            fields.insert("chunk_pos", chunk_info.pos.to_le_bytes().to_vec());
            fields.insert("start_time", time_to_bytes(chunk_info.start_time));
            fields.insert("end_time", time_to_bytes(chunk_info.end_time));
            fields.insert(
                "count",
                (chunk_info.connection_counts.len() as u32)
                    .to_le_bytes()
                    .to_vec(),
            );
            Self::write_header(buffer, &fields);

            write_u32(buffer, (chunk_info.connection_counts.len() * 8) as u32);
            for (conn_id, count) in &chunk_info.connection_counts {
                write_u32(buffer, *conn_id);
                write_u32(buffer, *count);
            }
        }
    }
}

impl Drop for BagWriter {
    fn drop(&mut self) {
        if self.is_open {
            tracing::warn!(
                context = "BagWriter",
                path = %self.path.display(),
                "Bag dropped without finish(), removing partial output"
            );
            if let Err(e) = std::fs::remove_file(&self.partial_path) {
                tracing::warn!(
                    context = "BagWriter",
                    error = %e,
                    path = %self.partial_path.display(),
                    "Failed to remove partial bag"
                );
            }
        }
    }
}

// =============================================================================
// Helper functions
// =============================================================================

/// `<path>.partial`
pub fn partial_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

fn compress_bz2(data: &[u8]) -> Result<Vec<u8>> {
    use bzip2::write::BzEncoder;
    use bzip2::Compression;

    let mut encoder = BzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| VidimuError::sink(SINK, format!("BZ2 compression failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| VidimuError::sink(SINK, format!("BZ2 compression failed: {e}")))
}

/// Write u32 in little-endian format.
fn write_u32(buffer: &mut Vec<u8>, value: u32) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

/// Convert (sec, nsec) time to little-endian bytes.
fn time_to_bytes(time: (u32, u32)) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8);
    bytes.extend_from_slice(&time.0.to_le_bytes());
    bytes.extend_from_slice(&time.1.to_le_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::formats::bag::messages;

    #[test]
    fn test_write_u32() {
        let mut buffer = Vec::new();
        write_u32(&mut buffer, 0x12345678);
        assert_eq!(buffer, vec![0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_file_header_is_4096_bytes() {
        let mut buffer = Vec::new();
        BagWriter::write_file_header_record(&mut buffer, 0, 0, 0);
        assert_eq!(buffer.len(), 4096);
        assert!(buffer.starts_with(b"#ROSBAG V2.0\n"));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path_for(Path::new("/tmp/out/recording.bag")),
            PathBuf::from("/tmp/out/recording.bag.partial")
        );
    }

    #[test]
    fn test_finish_renames_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.bag");
        let mut writer = BagWriter::create(&path).unwrap();
        assert!(partial_path_for(&path).exists());
        let conn = writer.add_connection("/imu0", &messages::IMU).unwrap();
        writer
            .write_message(&BagMessage::new(conn, 5, vec![1, 2, 3]))
            .unwrap();
        writer.finish().unwrap();
        assert!(path.exists());
        assert!(!partial_path_for(&path).exists());
    }

    #[test]
    fn test_drop_removes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aborted.bag");
        {
            let mut writer = BagWriter::create(&path).unwrap();
            writer.add_connection("/imu0", &messages::IMU).unwrap();
        }
        assert!(!path.exists());
        assert!(!partial_path_for(&path).exists());
    }

    #[test]
    fn test_add_connection_is_idempotent_per_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = BagWriter::create(dir.path().join("c.bag")).unwrap();
        let a = writer.add_connection("/imu0", &messages::IMU).unwrap();
        let b = writer.add_connection("/imu0", &messages::IMU).unwrap();
        assert_eq!(a, b);
        assert!(writer.add_connection("/imu0", &messages::IMAGE).is_err());
        let c = writer
            .add_connection("/cam0/image_raw", &messages::IMAGE)
            .unwrap();
        assert_eq!(c, 1);
        assert!(writer
            .write_message(&BagMessage::new(7, 0, Vec::new()))
            .is_err());
        writer.finish().unwrap();
    }
}
