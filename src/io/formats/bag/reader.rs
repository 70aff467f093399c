// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Sequential ROS1 bag reader.
//!
//! Walks the file front to back and yields message records in the order
//! they were written, which is the order a bag preserves for replay. Chunk
//! indexes are not consulted.
//!
//! ## Record Format
//! All records follow: `<header_len: u32><header><data_len: u32><data>`
//! where header contains `<field_len: u32><field_name>=<field_value>` pairs

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use super::writer::{OP_BAG_HEADER, OP_CHUNK, OP_CONNECTION, OP_MSG_DATA};
use crate::core::{Result, VidimuError, NSECS_IN_SEC};

/// BAG magic string
const MAGIC: &[u8] = b"#ROSBAG V";

/// BAG file header information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagHeader {
    /// Version string (e.g., "2.0")
    pub version: String,
    pub index_pos: u64,
    pub conn_count: u32,
    pub chunk_count: u32,
}

/// A connection (topic registration) found in the bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagConnection {
    pub conn_id: u32,
    pub topic: String,
    pub message_type: String,
    pub md5sum: String,
    pub message_definition: String,
}

/// One message record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagRecord {
    pub conn_id: u32,
    pub topic: String,
    pub time_ns: u64,
    pub data: Vec<u8>,
}

/// Parsed fields from a BAG record header
#[derive(Debug, Default)]
struct RecordHeader {
    op: Option<u8>,
    conn: Option<u32>,
    time: Option<u64>,
    topic: Option<String>,
    md5sum: Option<String>,
    message_type: Option<String>,
    message_definition: Option<String>,
    index_pos: Option<u64>,
    conn_count: Option<u32>,
    chunk_count: Option<u32>,
    compression: Option<String>,
    size: Option<u32>,
}

/// Memory-mapped bag opened for sequential reading.
pub struct BagReader {
    header: BagHeader,
    connections: BTreeMap<u32, BagConnection>,
    compressions: Vec<String>,
    mmap: memmap2::Mmap,
    /// Offset of the first record after the file header
    body_start: u64,
}

impl BagReader {
    /// Open a bag and collect its connections.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            VidimuError::io(
                "BagReader::open",
                format!("Failed to open {}: {e}", path.display()),
            )
        })?;

        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| {
            VidimuError::io("BagReader::open", format!("Failed to mmap file: {e}"))
        })?;

        let mut cursor = Cursor::new(&mmap[..]);
        let version = parse_magic(&mut cursor)?;
        let (fields, _) = read_record(&mut cursor)?;
        if fields.op != Some(OP_BAG_HEADER) {
            return Err(VidimuError::decode(
                "BagReader::open",
                format!("Expected bag header record (op=0x03), got op={:?}", fields.op),
            ));
        }
        let header = BagHeader {
            version,
            index_pos: fields.index_pos.unwrap_or(0),
            conn_count: fields.conn_count.unwrap_or(0),
            chunk_count: fields.chunk_count.unwrap_or(0),
        };
        let body_start = cursor.position();

        // Connection records appear both inside chunks and in the summary;
        // the summary copies are enough when present.
        let mut connections = BTreeMap::new();
        let mut compressions = Vec::new();
        while (cursor.position() as usize) < mmap.len() {
            let (fields, data) = read_record(&mut cursor)?;
            match fields.op {
                Some(OP_CONNECTION) => {
                    let data_fields = parse_record_header(&data)?;
                    if let Some(conn) = connection_from_fields(&fields, &data_fields) {
                        connections.entry(conn.conn_id).or_insert(conn);
                    }
                }
                Some(OP_CHUNK) => {
                    let compression = fields.compression.unwrap_or_else(|| "none".to_string());
                    let chunk = decompress_chunk(&compression, &data, fields.size)?;
                    compressions.push(compression);
                    let mut inner = Cursor::new(&chunk[..]);
                    while (inner.position() as usize) < chunk.len() {
                        let (fields, data) = read_record(&mut inner)?;
                        if fields.op == Some(OP_CONNECTION) {
                            let data_fields = parse_record_header(&data)?;
                            if let Some(conn) = connection_from_fields(&fields, &data_fields) {
                                connections.entry(conn.conn_id).or_insert(conn);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            header,
            connections,
            compressions,
            mmap,
            body_start,
        })
    }

    pub fn header(&self) -> &BagHeader {
        &self.header
    }

    pub fn connections(&self) -> &BTreeMap<u32, BagConnection> {
        &self.connections
    }

    pub fn connection_by_topic(&self, topic: &str) -> Option<&BagConnection> {
        self.connections.values().find(|c| c.topic == topic)
    }

    /// Compression of each chunk, in file order.
    pub fn chunk_compressions(&self) -> &[String] {
        &self.compressions
    }

    /// Iterate message records in file order.
    pub fn messages(&self) -> BagRecordIter<'_> {
        BagRecordIter {
            reader: self,
            position: self.body_start,
            chunk: Vec::new(),
            chunk_position: 0,
            failed: false,
        }
    }

    /// Read all message records in file order.
    pub fn read_all(&self) -> Result<Vec<BagRecord>> {
        self.messages().collect()
    }
}

/// Iterator over the message records of a [`BagReader`].
pub struct BagRecordIter<'a> {
    reader: &'a BagReader,
    position: u64,
    chunk: Vec<u8>,
    chunk_position: u64,
    failed: bool,
}

impl BagRecordIter<'_> {
    fn next_in_chunk(&mut self) -> Result<Option<BagRecord>> {
        while (self.chunk_position as usize) < self.chunk.len() {
            let mut cursor = Cursor::new(&self.chunk[..]);
            cursor.set_position(self.chunk_position);
            let (fields, data) = read_record(&mut cursor)?;
            self.chunk_position = cursor.position();

            if fields.op == Some(OP_MSG_DATA) {
                let conn_id = fields.conn.ok_or_else(|| {
                    VidimuError::decode("BagReader", "Message record without conn field")
                })?;
                let topic = self
                    .reader
                    .connections
                    .get(&conn_id)
                    .map(|c| c.topic.clone())
                    .ok_or_else(|| {
                        VidimuError::decode(
                            "BagReader",
                            format!("Message references unknown connection {conn_id}"),
                        )
                    })?;
                return Ok(Some(BagRecord {
                    conn_id,
                    topic,
                    time_ns: fields.time.unwrap_or(0),
                    data,
                }));
            }
        }
        Ok(None)
    }

    fn advance(&mut self) -> Result<Option<BagRecord>> {
        loop {
            if let Some(record) = self.next_in_chunk()? {
                return Ok(Some(record));
            }

            let reader = self.reader;
            let mmap = &reader.mmap[..];
            if self.position as usize >= mmap.len() {
                return Ok(None);
            }
            let mut cursor = Cursor::new(mmap);
            cursor.set_position(self.position);
            let (fields, data) = read_record(&mut cursor)?;
            self.position = cursor.position();

            if fields.op == Some(OP_CHUNK) {
                let compression = fields.compression.as_deref().unwrap_or("none");
                self.chunk = decompress_chunk(compression, &data, fields.size)?;
                self.chunk_position = 0;
            }
        }
    }
}

impl Iterator for BagRecordIter<'_> {
    type Item = Result<BagRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.advance() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Parse the BAG magic string and return version.
fn parse_magic<R: Read>(reader: &mut R) -> Result<String> {
    let mut magic = [0u8; 9];
    reader.read_exact(&mut magic).map_err(|e| {
        VidimuError::decode("BagReader::parse_magic", format!("Failed to read magic: {e}"))
    })?;

    if magic != MAGIC {
        return Err(VidimuError::decode(
            "BagReader::parse_magic",
            format!("Invalid BAG magic: {:?}", String::from_utf8_lossy(&magic)),
        ));
    }

    // Version line, e.g. "2.0\n"
    let mut version_buf = [0u8; 4];
    reader.read_exact(&mut version_buf).map_err(|e| {
        VidimuError::decode(
            "BagReader::parse_magic",
            format!("Failed to read version: {e}"),
        )
    })?;

    Ok(String::from_utf8_lossy(&version_buf).trim().to_string())
}

/// Read a single BAG record: `<header_len: u32><header><data_len: u32><data>`
fn read_record<R: Read>(reader: &mut R) -> Result<(RecordHeader, Vec<u8>)> {
    let header_len = reader.read_u32::<LittleEndian>().map_err(|e| {
        VidimuError::decode("BagReader::read_record", format!("Failed to read header_len: {e}"))
    })?;

    let mut header_bytes = vec![0u8; header_len as usize];
    reader.read_exact(&mut header_bytes).map_err(|e| {
        VidimuError::decode("BagReader::read_record", format!("Failed to read header: {e}"))
    })?;
    let fields = parse_record_header(&header_bytes)?;

    let data_len = reader.read_u32::<LittleEndian>().map_err(|e| {
        VidimuError::decode("BagReader::read_record", format!("Failed to read data_len: {e}"))
    })?;

    let mut data = vec![0u8; data_len as usize];
    reader.read_exact(&mut data).map_err(|e| {
        VidimuError::decode("BagReader::read_record", format!("Failed to read data: {e}"))
    })?;

    Ok((fields, data))
}

/// Parse header bytes into named fields.
/// Format: sequence of `<field_len: u32><field_name>=<field_value>`
fn parse_record_header(header_bytes: &[u8]) -> Result<RecordHeader> {
    let mut cursor = Cursor::new(header_bytes);
    let mut fields = RecordHeader::default();

    while (cursor.position() as usize) < header_bytes.len() {
        let field_len = cursor.read_u32::<LittleEndian>().map_err(|e| {
            VidimuError::decode("BagReader::parse_header", format!("Truncated field length: {e}"))
        })? as usize;

        let mut field_bytes = vec![0u8; field_len];
        cursor.read_exact(&mut field_bytes).map_err(|e| {
            VidimuError::decode("BagReader::parse_header", format!("Truncated field: {e}"))
        })?;

        if let Some(eq_pos) = field_bytes.iter().position(|&b| b == b'=') {
            parse_field(&mut fields, &field_bytes[..eq_pos], &field_bytes[eq_pos + 1..]);
        }
    }

    Ok(fields)
}

fn le_u32(value: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(value.get(..4)?.try_into().ok()?))
}

fn le_u64(value: &[u8]) -> Option<u64> {
    Some(u64::from_le_bytes(value.get(..8)?.try_into().ok()?))
}

fn ros_time(value: &[u8]) -> Option<u64> {
    let sec = u64::from(le_u32(value)?);
    let nsec = u64::from(le_u32(value.get(4..)?)?);
    Some(sec * NSECS_IN_SEC + nsec)
}

/// Parse a single field from name and value bytes.
fn parse_field(fields: &mut RecordHeader, name: &[u8], value: &[u8]) {
    let text = || String::from_utf8_lossy(value).to_string();
    match name {
        b"op" if value.len() == 1 => fields.op = Some(value[0]),
        b"conn" => fields.conn = le_u32(value),
        b"time" => fields.time = ros_time(value),
        b"topic" => fields.topic = Some(text()),
        b"md5sum" => fields.md5sum = Some(text()),
        b"type" => fields.message_type = Some(text()),
        b"message_definition" => fields.message_definition = Some(text()),
        b"index_pos" => fields.index_pos = le_u64(value),
        b"conn_count" => fields.conn_count = le_u32(value),
        b"chunk_count" => fields.chunk_count = le_u32(value),
        b"compression" => fields.compression = Some(text()),
        b"size" => fields.size = le_u32(value),
        _ => {}
    }
}

fn connection_from_fields(header: &RecordHeader, data: &RecordHeader) -> Option<BagConnection> {
    Some(BagConnection {
        conn_id: header.conn?,
        topic: header.topic.clone()?,
        message_type: data.message_type.clone()?,
        md5sum: data.md5sum.clone().unwrap_or_default(),
        message_definition: data.message_definition.clone().unwrap_or_default(),
    })
}

fn decompress_chunk(compression: &str, data: &[u8], size: Option<u32>) -> Result<Vec<u8>> {
    match compression {
        "none" => Ok(data.to_vec()),
        "bz2" => {
            use bzip2::read::BzDecoder;
            let mut decoder = BzDecoder::new(data);
            let mut decompressed = Vec::with_capacity(size.unwrap_or(0) as usize);
            decoder.read_to_end(&mut decompressed).map_err(|e| {
                VidimuError::decode("BagReader::read_chunk", format!("BZ2 decompression failed: {e}"))
            })?;
            Ok(decompressed)
        }
        other => Err(VidimuError::decode(
            "BagReader::read_chunk",
            format!("Unsupported compression format: {other}"),
        )),
    }
}
