//! 数据帧压缩/解压（LZ4 / None）
//!
//! 压缩帧不能被内存映射；`mappable` 写入会强制使用 `None`。

use crate::common::{MetaError, Result};
use crate::dtype::Compression;

pub fn compress(data: &[u8], codec: Compression) -> Result<Vec<u8>> {
    match codec {
        Compression::None => Ok(data.to_vec()),
        Compression::Lz4  =>
            lz4::block::compress(data, None, false)
                .map_err(|e| MetaError::Compression(e.to_string())),
    }
}

pub fn decompress(data: &[u8], codec: Compression, raw_len: usize) -> Result<Vec<u8>> {
    match codec {
        Compression::None => Ok(data.to_vec()),
        Compression::Lz4  => {
            let len = i32::try_from(raw_len)
                .map_err(|_| MetaError::Compression(format!("frame too large for lz4: {raw_len} bytes")))?;
            lz4::block::decompress(data, Some(len))
                .map_err(|e| MetaError::Compression(e.to_string()))
        }
    }
}
