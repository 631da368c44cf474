//! 文件前导块与描述头
//!
//! ```text
//! ┌────────────────────────────────────┐ 0
//! │  PREAMBLE (64 bytes, LE)           │
//! │    magic       8  "METAARR\0"      │
//! │    version     u32                 │
//! │    flags       u32 (保留)           │
//! │    data_offset u64                 │
//! │    data_len    u64                 │
//! │    header_off  u64                 │
//! │    header_len  u64                 │
//! │    header_crc  u32                 │
//! │    padding                         │
//! ├────────────────────────────────────┤ 64
//! │  DATA BLOCK (frames, row-major)    │
//! ├────────────────────────────────────┤ header_off
//! │  HEADER (JSON)                     │
//! └────────────────────────────────────┘
//! ```
//!
//! 前导块定长且最后写入：它指向的描述头一旦与磁盘内容不符（CRC、越界），
//! 读取即报 `CorruptFile`。

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::axis::{AxisDescriptor, Extra};
use crate::common::{MetaError, Result};
use crate::dtype::{Compression, DType, Endian};

pub const MAGIC: &[u8; 8]      = b"METAARR\0";
pub const FORMAT_VERSION: u32  = 1;
pub const PREAMBLE_LEN: u64    = 64;

// ── Preamble ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    pub version:     u32,
    pub flags:       u32,
    pub data_offset: u64,
    pub data_len:    u64,
    pub header_off:  u64,
    pub header_len:  u64,
    pub header_crc:  u32,
}

impl Preamble {
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        let mut buf = Vec::with_capacity(PREAMBLE_LEN as usize);
        buf.extend_from_slice(MAGIC);
        buf.write_u32::<LittleEndian>(self.version)?;
        buf.write_u32::<LittleEndian>(self.flags)?;
        buf.write_u64::<LittleEndian>(self.data_offset)?;
        buf.write_u64::<LittleEndian>(self.data_len)?;
        buf.write_u64::<LittleEndian>(self.header_off)?;
        buf.write_u64::<LittleEndian>(self.header_len)?;
        buf.write_u32::<LittleEndian>(self.header_crc)?;
        buf.resize(PREAMBLE_LEN as usize, 0);
        w.write_all(&buf)?;
        Ok(())
    }

    /// 解析并校验前导块；`file_len` 用于越界检查
    pub fn read_from<R: Read>(mut r: R, file_len: u64) -> Result<Self> {
        if file_len < PREAMBLE_LEN {
            return Err(MetaError::CorruptFile(format!("file is only {file_len} bytes")));
        }
        let mut buf = [0u8; PREAMBLE_LEN as usize];
        r.read_exact(&mut buf)?;
        if &buf[..8] != MAGIC {
            return Err(MetaError::CorruptFile("bad magic (incomplete write?)".into()));
        }

        let mut cur = &buf[8..];
        let p = Self {
            version:     cur.read_u32::<LittleEndian>()?,
            flags:       cur.read_u32::<LittleEndian>()?,
            data_offset: cur.read_u64::<LittleEndian>()?,
            data_len:    cur.read_u64::<LittleEndian>()?,
            header_off:  cur.read_u64::<LittleEndian>()?,
            header_len:  cur.read_u64::<LittleEndian>()?,
            header_crc:  cur.read_u32::<LittleEndian>()?,
        };

        if p.version > FORMAT_VERSION {
            return Err(MetaError::UnsupportedVersion { found: p.version, supported: FORMAT_VERSION });
        }
        let data_end = p.data_offset.checked_add(p.data_len);
        let hdr_end  = p.header_off.checked_add(p.header_len);
        match (data_end, hdr_end) {
            (Some(d), Some(h)) if p.data_offset >= PREAMBLE_LEN && d <= p.header_off && h <= file_len => {}
            _ => return Err(MetaError::CorruptFile(format!(
                "inconsistent offsets: data {}+{}, header {}+{}, file {} bytes",
                p.data_offset, p.data_len, p.header_off, p.header_len, file_len))),
        }
        Ok(p)
    }
}

// ── Header ────────────────────────────────────────────────────────────────────

/// 数据区中的一帧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub offset:      u64,
    /// 磁盘上的字节数（压缩后）
    pub len:         u64,
    pub raw_len:     u64,
    /// 沿帧轴的长度
    pub extent:      usize,
    #[serde(default)]
    pub compression: Compression,
    /// 压缩后字节的 CRC32；未压缩帧可经映射原地修改，不记录
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crc:         Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    pub dtype:       DType,
    pub byte_order:  Endian,
    pub shape:       Vec<usize>,
    pub axes:        Vec<AxisDescriptor>,
    #[serde(default)]
    pub info:        Extra,
    /// 追加轴；未追加过的文件为 None，帧沿 0 轴排列
    #[serde(default)]
    pub append_axis: Option<usize>,
    pub frames:      Vec<Frame>,
}

impl FileHeader {
    pub fn frame_axis(&self) -> usize { self.append_axis.unwrap_or(0) }

    /// 第 `i` 帧的形状：帧轴长度替换为该帧的 extent
    pub fn frame_shape(&self, i: usize) -> Vec<usize> {
        let mut shape = self.shape.clone();
        if !shape.is_empty() {
            shape[self.frame_axis()] = self.frames[i].extent;
        }
        shape
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        // JSON 没有 NaN / inf，写成 null 后将无法读回
        for (i, ax) in self.axes.iter().enumerate() {
            if ax.values.iter().flatten().any(|v| !v.is_finite()) {
                return Err(MetaError::NonFiniteValues { axis: i });
            }
        }
        serde_json::to_vec(self).map_err(|e| MetaError::CorruptFile(e.to_string()))
    }

    pub fn decode(bytes: &[u8], expect_crc: u32) -> Result<Self> {
        if crc32fast::hash(bytes) != expect_crc {
            return Err(MetaError::CorruptFile("header checksum mismatch".into()));
        }
        let header: Self = serde_json::from_slice(bytes)
            .map_err(|e| MetaError::CorruptFile(format!("malformed header: {e}")))?;
        header.check_frames()?;
        Ok(header)
    }

    /// 帧的 extent 之和等于帧轴长度，且每帧的字节数与形状一致；
    /// 所有来自文件的尺寸都按可能溢出处理
    fn check_frames(&self) -> Result<()> {
        if self.axes.len() != self.shape.len() {
            return Err(MetaError::CorruptFile(format!(
                "{} axis descriptors for rank {}", self.axes.len(), self.shape.len())));
        }
        if self.shape.is_empty() {
            if self.frames.len() != 1 {
                return Err(MetaError::CorruptFile("scalar array must have exactly one frame".into()));
            }
        } else {
            let axis = self.frame_axis();
            if axis >= self.shape.len() {
                return Err(MetaError::CorruptFile(format!("append axis {axis} out of range")));
            }
            let total = self.frames.iter()
                .try_fold(0usize, |acc, f| acc.checked_add(f.extent))
                .ok_or_else(|| MetaError::CorruptFile("frame extents overflow".into()))?;
            if total != self.shape[axis] {
                return Err(MetaError::CorruptFile(format!(
                    "frames cover {total} along axis {axis}, shape says {}", self.shape[axis])));
            }
        }

        let size = self.dtype.size() as u64;
        for (i, f) in self.frames.iter().enumerate() {
            let expected = self.frame_shape(i).iter()
                .try_fold(size, |acc, &d| acc.checked_mul(d as u64))
                .ok_or_else(|| MetaError::CorruptFile(format!("frame {i} size overflows")))?;
            if f.raw_len != expected {
                return Err(MetaError::CorruptFile(format!(
                    "frame {i} decodes to {} bytes, expected {expected}", f.raw_len)));
            }
            if f.compression == Compression::None && f.len != f.raw_len {
                return Err(MetaError::CorruptFile(format!("frame {i} length mismatch")));
            }
            if f.offset.checked_add(f.len).is_none() {
                return Err(MetaError::CorruptFile(format!("frame {i} extends past u64 range")));
            }
        }
        Ok(())
    }

    /// 数据区能否整体映射为一个数组视图
    pub fn mappable_reason(&self) -> Option<String> {
        if !self.byte_order.is_native() {
            return Some(format!("data is stored {:?}-endian", self.byte_order));
        }
        if self.frames.iter().any(|f| f.compression != Compression::None) {
            return Some("data frames are compressed".into());
        }
        if self.frames.len() > 1 && self.frame_axis() != 0 {
            return Some(format!("frames are appended along axis {}", self.frame_axis()));
        }
        let contiguous = self.frames.windows(2).all(|w| w[0].offset + w[0].len == w[1].offset);
        if !contiguous {
            return Some("data frames are not contiguous".into());
        }
        None
    }

    pub fn data_range(&self) -> (u64, u64) {
        let start = self.frames.first().map(|f| f.offset).unwrap_or(PREAMBLE_LEN);
        let end   = self.frames.last().map(|f| f.offset + f.len).unwrap_or(start);
        (start, end)
    }
}
