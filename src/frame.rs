//! 数据帧编解码
//!
//! 一帧是数组沿帧轴的一段，按行主序、本机字节序平铺：
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │ elements (row-major, native)     │  ← 可选 LZ4
//! └──────────────────────────────────┘
//! ```
//!
//! 帧的位置、长度记录在文件头里，帧本身不带任何元数据，未压缩帧因此可以
//! 直接映射为数组视图。只有压缩帧记录 CRC32：未压缩帧可能经可写映射原地
//! 修改，它的字节就是数组本身，没有固定的校验值。

use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::common::{MetaError, Result};
use crate::compression;
use crate::dtype::{Compression, Element, Endian};

pub struct EncodedFrame {
    pub bytes:       Vec<u8>,
    pub raw_len:     u64,
    pub crc:         Option<u32>,
    pub compression: Compression,
}

/// 按逻辑行主序编码（非连续视图也按逻辑顺序输出）
pub fn encode<T: Element>(view: &ArrayViewD<'_, T>, codec: Compression) -> Result<EncodedFrame> {
    let size = std::mem::size_of::<T>();
    let mut raw = vec![0u8; view.len() * size];
    for (chunk, &v) in raw.chunks_exact_mut(size).zip(view.iter()) {
        v.write_native(chunk);
    }

    let bytes = compression::compress(&raw, codec)?;
    let crc   = match codec {
        Compression::None => None,
        Compression::Lz4  => Some(crc32fast::hash(&bytes)),
    };
    Ok(EncodedFrame { raw_len: raw.len() as u64, bytes, crc, compression: codec })
}

/// 校验 CRC（若有）→ 解压 → 按文件字节序解码为 `shape` 形状的数组
pub fn decode<T: Element>(
    stored:      &[u8],
    expect_crc:  Option<u32>,
    codec:       Compression,
    raw_len:     usize,
    order:       Endian,
    shape:       &[usize],
) -> Result<ArrayD<T>> {
    if let Some(crc) = expect_crc {
        if crc32fast::hash(stored) != crc {
            return Err(MetaError::CorruptFile("data frame checksum mismatch".into()));
        }
    }
    let raw  = compression::decompress(stored, codec, raw_len)?;
    let size = std::mem::size_of::<T>();
    let n: usize = shape.iter().product();
    if raw.len() != n * size {
        return Err(MetaError::CorruptFile(format!(
            "data frame holds {} bytes, shape {:?} needs {}", raw.len(), shape, n * size)));
    }

    let values: Vec<T> = raw.chunks_exact(size).map(|c| T::read_from(c, order)).collect();
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map_err(|e| MetaError::CorruptFile(e.to_string()))
}
