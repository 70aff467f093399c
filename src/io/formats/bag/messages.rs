// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! ROS1 message types written to bags.
//!
//! ROS1 serialization is little-endian with `u32` length prefixes for
//! strings and variable-length arrays; fixed-size arrays have no prefix.
//! Only the three message types a capture needs are supported:
//! `sensor_msgs/Image`, `sensor_msgs/CompressedImage` and `sensor_msgs/Imu`.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::core::{Result, VidimuError, MAX_ROS_TIME_NS, NSECS_IN_SEC};

/// Datatype, md5sum and full definition of a ROS1 message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageType {
    pub datatype: &'static str,
    pub md5sum: &'static str,
    pub definition: &'static str,
}

/// `sensor_msgs/Image`
pub const IMAGE: MessageType = MessageType {
    datatype: "sensor_msgs/Image",
    md5sum: "060021388200f6f0f447d0fcd9c64743",
    definition: concat!(
        "# This message contains an uncompressed image\n",
        "std_msgs/Header header\n",
        "uint32 height\n",
        "uint32 width\n",
        "string encoding\n",
        "uint8 is_bigendian\n",
        "uint32 step\n",
        "uint8[] data\n",
        "\n",
        "================================================================================\n",
        "MSG: std_msgs/Header\n",
        "# Standard metadata for higher-level stamped data types.\n",
        "uint32 seq\n",
        "time stamp\n",
        "string frame_id\n",
    ),
};

/// `sensor_msgs/CompressedImage`
pub const COMPRESSED_IMAGE: MessageType = MessageType {
    datatype: "sensor_msgs/CompressedImage",
    md5sum: "8f7a12909da2c9d3332d540a0977563f",
    definition: concat!(
        "# This message contains a compressed image\n",
        "std_msgs/Header header\n",
        "string format\n",
        "uint8[] data\n",
        "\n",
        "================================================================================\n",
        "MSG: std_msgs/Header\n",
        "# Standard metadata for higher-level stamped data types.\n",
        "uint32 seq\n",
        "time stamp\n",
        "string frame_id\n",
    ),
};

/// `sensor_msgs/Imu`
pub const IMU: MessageType = MessageType {
    datatype: "sensor_msgs/Imu",
    md5sum: "6a62c6daae103f4ff57a132d6f95cec2",
    definition: concat!(
        "# Measurements from an inertial measurement unit\n",
        "std_msgs/Header header\n",
        "geometry_msgs/Quaternion orientation\n",
        "float64[9] orientation_covariance\n",
        "geometry_msgs/Vector3 angular_velocity\n",
        "float64[9] angular_velocity_covariance\n",
        "geometry_msgs/Vector3 linear_acceleration\n",
        "float64[9] linear_acceleration_covariance\n",
        "\n",
        "================================================================================\n",
        "MSG: std_msgs/Header\n",
        "# Standard metadata for higher-level stamped data types.\n",
        "uint32 seq\n",
        "time stamp\n",
        "string frame_id\n",
        "\n",
        "================================================================================\n",
        "MSG: geometry_msgs/Quaternion\n",
        "float64 x\n",
        "float64 y\n",
        "float64 z\n",
        "float64 w\n",
        "\n",
        "================================================================================\n",
        "MSG: geometry_msgs/Vector3\n",
        "float64 x\n",
        "float64 y\n",
        "float64 z\n",
    ),
};

/// `std_msgs/Header`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub seq: u32,
    pub stamp_ns: u64,
    pub frame_id: String,
}

impl Header {
    pub fn stamped(stamp_ns: u64) -> Self {
        Self {
            stamp_ns,
            ..Default::default()
        }
    }

    /// Stamps past the ROS1 range saturate here; [`BagWriter`] rejects the
    /// message carrying them.
    ///
    /// [`BagWriter`]: super::BagWriter
    fn write(&self, buf: &mut Vec<u8>) {
        let stamp = self.stamp_ns.min(MAX_ROS_TIME_NS);
        write_u32(buf, self.seq);
        write_u32(buf, (stamp / NSECS_IN_SEC) as u32);
        write_u32(buf, (stamp % NSECS_IN_SEC) as u32);
        write_string(buf, &self.frame_id);
    }

    fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let seq = read_u32(cursor)?;
        let sec = read_u32(cursor)?;
        let nsec = read_u32(cursor)?;
        let frame_id = read_string(cursor)?;
        Ok(Self {
            seq,
            stamp_ns: u64::from(sec) * NSECS_IN_SEC + u64::from(nsec),
            frame_id,
        })
    }
}

/// `sensor_msgs/Image`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub encoding: String,
    pub is_bigendian: u8,
    pub step: u32,
    pub data: Vec<u8>,
}

impl Image {
    /// 8-bit single-channel image.
    pub fn mono8(stamp_ns: u64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            header: Header::stamped(stamp_ns),
            height,
            width,
            encoding: "mono8".to_string(),
            is_bigendian: 0,
            step: width,
            data,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.data.len() + 64);
        self.header.write(&mut buf);
        write_u32(&mut buf, self.height);
        write_u32(&mut buf, self.width);
        write_string(&mut buf, &self.encoding);
        buf.push(self.is_bigendian);
        write_u32(&mut buf, self.step);
        write_bytes(&mut buf, &self.data);
        buf
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let header = Header::read(&mut cursor)?;
        let height = read_u32(&mut cursor)?;
        let width = read_u32(&mut cursor)?;
        let encoding = read_string(&mut cursor)?;
        let is_bigendian = cursor.read_u8().map_err(truncated)?;
        let step = read_u32(&mut cursor)?;
        let data = read_bytes(&mut cursor)?;
        Ok(Self {
            header,
            height,
            width,
            encoding,
            is_bigendian,
            step,
            data,
        })
    }
}

/// `sensor_msgs/CompressedImage`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub header: Header,
    /// Compression format, e.g. `png`
    pub format: String,
    pub data: Vec<u8>,
}

impl CompressedImage {
    pub fn png(stamp_ns: u64, data: Vec<u8>) -> Self {
        Self {
            header: Header::stamped(stamp_ns),
            format: "png".to_string(),
            data,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.data.len() + 32);
        self.header.write(&mut buf);
        write_string(&mut buf, &self.format);
        write_bytes(&mut buf, &self.data);
        buf
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let header = Header::read(&mut cursor)?;
        let format = read_string(&mut cursor)?;
        let data = read_bytes(&mut cursor)?;
        Ok(Self {
            header,
            format,
            data,
        })
    }
}

/// `sensor_msgs/Imu`
///
/// Orientation is not estimated: it and all covariances are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Imu {
    pub header: Header,
    pub orientation: [f64; 4],
    pub orientation_covariance: [f64; 9],
    pub angular_velocity: [f64; 3],
    pub angular_velocity_covariance: [f64; 9],
    pub linear_acceleration: [f64; 3],
    pub linear_acceleration_covariance: [f64; 9],
}

impl Imu {
    pub fn new(stamp_ns: u64, angular_velocity: [f64; 3], linear_acceleration: [f64; 3]) -> Self {
        Self {
            header: Header::stamped(stamp_ns),
            orientation: [0.0; 4],
            orientation_covariance: [0.0; 9],
            angular_velocity,
            angular_velocity_covariance: [0.0; 9],
            linear_acceleration,
            linear_acceleration_covariance: [0.0; 9],
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12 + 4 + 41 * 8);
        self.header.write(&mut buf);
        write_f64s(&mut buf, &self.orientation);
        write_f64s(&mut buf, &self.orientation_covariance);
        write_f64s(&mut buf, &self.angular_velocity);
        write_f64s(&mut buf, &self.angular_velocity_covariance);
        write_f64s(&mut buf, &self.linear_acceleration);
        write_f64s(&mut buf, &self.linear_acceleration_covariance);
        buf
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        Ok(Self {
            header: Header::read(&mut cursor)?,
            orientation: read_f64s(&mut cursor)?,
            orientation_covariance: read_f64s(&mut cursor)?,
            angular_velocity: read_f64s(&mut cursor)?,
            angular_velocity_covariance: read_f64s(&mut cursor)?,
            linear_acceleration: read_f64s(&mut cursor)?,
            linear_acceleration_covariance: read_f64s(&mut cursor)?,
        })
    }
}

// =============================================================================
// Helper functions
// =============================================================================

fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_bytes(buf, value.as_bytes());
}

fn write_bytes(buf: &mut Vec<u8>, value: &[u8]) {
    write_u32(buf, value.len() as u32);
    buf.extend_from_slice(value);
}

fn write_f64s(buf: &mut Vec<u8>, values: &[f64]) {
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

fn truncated(e: std::io::Error) -> VidimuError {
    VidimuError::decode("ROS1 message", format!("Truncated message: {e}"))
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32> {
    cursor.read_u32::<LittleEndian>().map_err(truncated)
}

fn read_bytes(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len = read_u32(cursor)? as usize;
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    if len > remaining {
        return Err(VidimuError::decode(
            "ROS1 message",
            format!("Array of {len} bytes exceeds remaining {remaining}"),
        ));
    }
    let mut out = vec![0u8; len];
    cursor.read_exact(&mut out).map_err(truncated)?;
    Ok(out)
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let bytes = read_bytes(cursor)?;
    String::from_utf8(bytes)
        .map_err(|e| VidimuError::decode("ROS1 message", format!("Invalid UTF-8 string: {e}")))
}

fn read_f64s<const N: usize>(cursor: &mut Cursor<&[u8]>) -> Result<[f64; N]> {
    let mut out = [0.0; N];
    cursor
        .read_f64_into::<LittleEndian>(&mut out)
        .map_err(truncated)?;
    Ok(out)
}
