//! MetaArray 文件读写
//!
//! - **write**  — 新建文件：占位前导块 → 数据帧 → 描述头 → 提交前导块
//! - **append** — 新帧写在旧描述头的位置（紧接已有数据），随后写新描述头，
//!   最后重写前导块；已有数据字节既不读也不写
//! - **read**   — 校验前导块与描述头后，整块拷贝进内存，或直接映射数据区
//!
//! 任何阶段中断都会留下前导块与磁盘内容不一致的文件，下次读取时报
//! `CorruptFile`，不会被静默接受。

pub mod header;

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use memmap2::MmapOptions;
use ndarray::{ArrayD, Axis, IxDyn};
use tracing::{debug, warn};

use crate::array::MetaArray;
use crate::buffer::{Buffer, MappedRegion, MappedView};
use crate::common::{MetaError, Result};
use crate::dtype::{Compression, Element, Endian};
use crate::frame::{self, EncodedFrame};
use crate::index::axis_by_name;
use header::{FileHeader, Frame, Preamble, FORMAT_VERSION, PREAMBLE_LEN};

// ── 选项 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// 沿该名称的轴追加到已有文件；文件不存在时新建并记录追加轴
    pub append_axis: Option<String>,
    /// 保证数据区可被内存映射（不压缩；追加只允许沿 0 轴）
    pub mappable:    bool,
    pub compression: Compression,
}

impl WriteOptions {
    pub fn new() -> Self { Self::default() }

    pub fn append_axis(mut self, axis: &str) -> Self {
        self.append_axis = Some(axis.into()); self
    }
    pub fn mappable(mut self, mappable: bool) -> Self {
        self.mappable = mappable; self
    }
    pub fn compression(mut self, codec: Compression) -> Self {
        self.compression = codec; self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// 允许通过 `data_mut` 修改；与 `mmap` 同用时修改直接落到文件
    pub writable: bool,
    pub mmap:     bool,
}

impl ReadOptions {
    pub fn new() -> Self { Self::default() }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable; self
    }
    pub fn mmap(mut self, mmap: bool) -> Self {
        self.mmap = mmap; self
    }
}

// ── 写入 ──────────────────────────────────────────────────────────────────────

pub fn write<T: Element>(array: &MetaArray<T>, path: &Path, opts: &WriteOptions) -> Result<()> {
    let codec = if opts.mappable && opts.compression != Compression::None {
        warn!(path = %path.display(), compression = ?opts.compression, "mappable write: compression disabled");
        Compression::None
    } else {
        opts.compression
    };

    match &opts.append_axis {
        Some(name) if path.exists() => append(array, path, name, opts.mappable, codec),
        Some(name) => {
            let axis = array.axis_index(name)?;
            if opts.mappable && axis != 0 {
                return Err(MetaError::AppendMismatch(format!(
                    "mappable files can only grow along axis 0, not {axis}")));
            }
            write_new(array, path, Some(axis), codec)
        }
        None => write_new(array, path, None, codec),
    }
}

fn write_new<T: Element>(
    array:       &MetaArray<T>,
    path:        &Path,
    append_axis: Option<usize>,
    codec:       Compression,
) -> Result<()> {
    let shape  = array.shape();
    let frame  = frame::encode(&array.view(), codec)?;
    let extent = if shape.is_empty() { 1 } else { shape[append_axis.unwrap_or(0)] };

    let header = FileHeader {
        dtype:       T::DTYPE,
        byte_order:  Endian::native(),
        shape,
        axes:        array.axes().to_vec(),
        info:        array.info().clone(),
        append_axis,
        frames:      vec![frame_record(&frame, PREAMBLE_LEN, extent)],
    };
    let hdr = header.encode()?;

    let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    let mut w = BufWriter::new(file);
    // 前导块先写全零：提交前 magic 无效
    w.write_all(&[0u8; PREAMBLE_LEN as usize])?;
    w.write_all(&frame.bytes)?;
    w.write_all(&hdr)?;
    let mut file = w.into_inner().map_err(|e| e.into_error())?;
    file.sync_data()?;

    let data_len = frame.bytes.len() as u64;
    commit(&mut file, PREAMBLE_LEN, data_len, &hdr)?;

    debug!(
        path = %path.display(), dtype = %T::DTYPE, shape = ?header.shape,
        bytes = data_len, ?codec, "wrote metaarray file",
    );
    Ok(())
}

fn append<T: Element>(
    array:    &MetaArray<T>,
    path:     &Path,
    name:     &str,
    mappable: bool,
    codec:    Compression,
) -> Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let (pre, old) = load_header(&mut file)?;
    let axis = check_append(&old, array, name, mappable)?;

    let mut header = old.clone();
    if header.append_axis.is_none() {
        // 单帧文件第一次追加：帧轴改为追加轴
        header.frames[0].extent = old.shape[axis];
    }
    header.append_axis = Some(axis);
    header.shape[axis] = old.shape[axis].checked_add(array.shape()[axis])
        .ok_or_else(|| MetaError::AppendMismatch(format!("axis `{name}` length overflows")))?;
    header.axes[axis] = old.axes[axis].concat(&array.axes()[axis])
        .map_err(|e| MetaError::AppendMismatch(format!("append axis `{name}`: {e}")))?;

    let frame  = frame::encode(&array.view(), codec)?;
    let offset = pre.data_offset + pre.data_len;
    header.frames.push(frame_record(&frame, offset, array.shape()[axis]));
    let hdr = header.encode()?;

    // 新帧覆盖旧描述头；前导块提交之前旧描述头 CRC 已失效
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&frame.bytes)?;
    file.write_all(&hdr)?;
    file.set_len(offset + frame.bytes.len() as u64 + hdr.len() as u64)?;
    file.sync_data()?;

    let data_len = pre.data_len + frame.bytes.len() as u64;
    commit(&mut file, pre.data_offset, data_len, &hdr)?;

    debug!(
        path = %path.display(), axis = name, offset, frames = header.frames.len(),
        shape = ?header.shape, "appended frame",
    );
    Ok(())
}

/// 校验新数据能否沿 `name` 轴追加，返回轴号；失败时文件未被改动
fn check_append<T: Element>(
    old:      &FileHeader,
    array:    &MetaArray<T>,
    name:     &str,
    mappable: bool,
) -> Result<usize> {
    let mismatch = |msg: String| Err(MetaError::AppendMismatch(msg));

    let axis = array.axis_index(name)?;
    if old.dtype != T::DTYPE {
        return mismatch(format!("file dtype {} vs array dtype {}", old.dtype, T::DTYPE));
    }
    if !old.byte_order.is_native() {
        return mismatch(format!("file is stored {:?}-endian", old.byte_order));
    }
    let shape = array.shape();
    if old.shape.len() != shape.len() {
        return mismatch(format!("file rank {} vs array rank {}", old.shape.len(), shape.len()));
    }
    match axis_by_name(&old.axes, name) {
        Ok(a) if a == axis => {}
        Ok(a) => return mismatch(format!("axis `{name}` is axis {a} in the file, {axis} in the array")),
        Err(_) => return mismatch(format!("file has no axis named `{name}`")),
    }
    if let Some(prev) = old.append_axis {
        if prev != axis {
            return mismatch(format!("file is appended along axis {prev}, not {axis}"));
        }
    }
    if mappable && axis != 0 {
        return mismatch(format!("mappable files can only grow along axis 0, not {axis}"));
    }
    if mappable && old.frames.iter().any(|f| f.compression != Compression::None) {
        return mismatch("file holds compressed frames; a mappable append needs an uncompressed file".into());
    }

    for (i, (ax, &len)) in array.axes().iter().zip(&shape).enumerate() {
        if i == axis {
            continue;
        }
        if old.shape[i] != len {
            return mismatch(format!("axis {i}: file size {} vs array size {len}", old.shape[i]));
        }
        if !old.axes[i].same_schema(ax) {
            return mismatch(format!("axis {i}: descriptors differ"));
        }
    }
    Ok(axis)
}

fn frame_record(frame: &EncodedFrame, offset: u64, extent: usize) -> Frame {
    Frame {
        offset,
        len:         frame.bytes.len() as u64,
        raw_len:     frame.raw_len,
        extent,
        compression: frame.compression,
        crc:         frame.crc,
    }
}

/// 写入（或重写）前导块并落盘；这是写入 / 追加的提交点
fn commit(file: &mut File, data_offset: u64, data_len: u64, hdr: &[u8]) -> Result<()> {
    let pre = Preamble {
        version:    FORMAT_VERSION,
        flags:      0,
        data_offset,
        data_len,
        header_off: data_offset + data_len,
        header_len: hdr.len() as u64,
        header_crc: crc32fast::hash(hdr),
    };
    file.seek(SeekFrom::Start(0))?;
    pre.write_to(&mut *file)?;
    file.sync_all()?;
    Ok(())
}

// ── 读取 ──────────────────────────────────────────────────────────────────────

/// 只读取并校验描述头（用于查看 dtype / 形状）
pub fn inspect(path: impl AsRef<Path>) -> Result<FileHeader> {
    let mut file = File::open(path.as_ref())?;
    Ok(load_header(&mut file)?.1)
}

pub fn read<T: Element>(path: &Path, opts: &ReadOptions) -> Result<MetaArray<T>> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(opts.writable && opts.mmap)
        .open(path)?;
    let (_, header) = load_header(&mut file)?;

    if header.dtype != T::DTYPE {
        return Err(MetaError::DTypeMismatch { file: header.dtype.name(), requested: T::DTYPE.name() });
    }

    let buffer = if opts.mmap {
        map_data::<T>(&file, &header, opts.writable)?
    } else {
        Buffer::owned(read_frames::<T>(&mut file, &header)?)
    };

    debug!(
        path = %path.display(), dtype = %header.dtype, shape = ?header.shape,
        frames = header.frames.len(), mmap = opts.mmap, writable = opts.writable,
        "opened metaarray file",
    );

    MetaArray::from_parts(buffer, header.axes, header.info, opts.writable)
        .map_err(|e| match e {
            e if e.is_validation() => MetaError::CorruptFile(format!("invalid axis descriptors: {e}")),
            e => e,
        })
}

fn load_header(file: &mut File) -> Result<(Preamble, FileHeader)> {
    let file_len = file.metadata()?.len();
    file.seek(SeekFrom::Start(0))?;
    let pre = Preamble::read_from(&mut *file, file_len)?;

    let mut bytes = vec![0u8; pre.header_len as usize];
    file.seek(SeekFrom::Start(pre.header_off))?;
    file.read_exact(&mut bytes)?;
    let header = FileHeader::decode(&bytes, pre.header_crc)?;

    let data_end = pre.data_offset + pre.data_len;
    for (i, f) in header.frames.iter().enumerate() {
        let end = f.offset.checked_add(f.len);
        if f.offset < pre.data_offset || end.map_or(true, |e| e > data_end) {
            return Err(MetaError::CorruptFile(format!(
                "frame {i} at {}+{} lies outside the data block", f.offset, f.len)));
        }
    }
    Ok((pre, header))
}

fn read_frames<T: Element>(file: &mut File, header: &FileHeader) -> Result<ArrayD<T>> {
    if !header.byte_order.is_native() {
        debug!(order = ?header.byte_order, "byte-swapping file data");
    }

    let mut parts = Vec::with_capacity(header.frames.len());
    for (i, f) in header.frames.iter().enumerate() {
        let mut stored = vec![0u8; f.len as usize];
        file.seek(SeekFrom::Start(f.offset))?;
        file.read_exact(&mut stored)?;
        parts.push(frame::decode::<T>(
            &stored, f.crc, f.compression, f.raw_len as usize,
            header.byte_order, &header.frame_shape(i),
        )?);
    }

    if parts.len() == 1 {
        return Ok(parts.remove(0));
    }
    let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
    ndarray::concatenate(Axis(header.frame_axis()), &views)
        .map_err(|e| MetaError::CorruptFile(format!("cannot assemble frames: {e}")))
}

fn map_data<T: Element>(file: &File, header: &FileHeader, writable: bool) -> Result<Buffer<T>> {
    if let Some(reason) = header.mappable_reason() {
        return Err(MetaError::NotMappable(reason));
    }

    let (start, end) = header.data_range();
    if start == end {
        // 空数组无需映射
        let empty = ArrayD::from_shape_vec(IxDyn(&header.shape), Vec::new())
            .map_err(|e| MetaError::CorruptFile(e.to_string()))?;
        return Ok(Buffer::owned(empty));
    }

    let mut opts = MmapOptions::new();
    opts.offset(start).len((end - start) as usize);
    // SAFETY: 映射期间文件不得被其他进程截断或改写（单写者约定）。
    let region = if writable {
        MappedRegion::Writable(unsafe { opts.map_mut(file)? })
    } else {
        MappedRegion::ReadOnly(unsafe { opts.map(file)? })
    };
    Ok(Buffer::Mapped(MappedView::new(region, header.shape.clone())?))
}
