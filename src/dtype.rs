//! 元素类型、字节序与压缩方式
//!
//! 文件头里的 `dtype` 标签与 Rust 元素类型一一对应；[`Element`] 是封闭
//! trait，只对定长数值类型实现，因此内存映射时可以把字节区直接视作 `&[T]`。

use std::fmt::Debug;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

// ── DType ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    I8, I16, I32, I64,
    U8, U16, U32, U64,
    F32, F64,
}

impl DType {
    /// 每个元素的字节宽度
    pub fn size(self) -> usize {
        match self {
            Self::I8  | Self::U8  => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::I8  => "i8",  Self::I16 => "i16", Self::I32 => "i32", Self::I64 => "i64",
            Self::U8  => "u8",  Self::U16 => "u16", Self::U32 => "u32", Self::U64 => "u64",
            Self::F32 => "f32", Self::F64 => "f64",
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── 字节序 ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn native() -> Self {
        if cfg!(target_endian = "little") { Self::Little } else { Self::Big }
    }
    pub fn is_native(self) -> bool { self == Self::native() }
}

// ── 压缩方式 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Lz4,
}

// ── Element ───────────────────────────────────────────────────────────────────

mod sealed {
    pub trait Sealed {}
}

/// 可存入 [`MetaArray`](crate::array::MetaArray) 的元素类型。
///
/// 所有实现都是无填充、任意位模式均合法的定长数值类型。
pub trait Element:
    Copy + Default + PartialEq + PartialOrd + Debug + Send + Sync + 'static + sealed::Sealed
{
    const DTYPE: DType;

    /// 按给定字节序从 `buf[..size]` 解码
    fn read_from(buf: &[u8], order: Endian) -> Self;

    /// 按本机字节序写入 `buf[..size]`
    fn write_native(self, buf: &mut [u8]);
}

impl sealed::Sealed for i8 {}
impl Element for i8 {
    const DTYPE: DType = DType::I8;
    fn read_from(buf: &[u8], _: Endian) -> Self { buf[0] as i8 }
    fn write_native(self, buf: &mut [u8]) { buf[0] = self as u8; }
}

impl sealed::Sealed for u8 {}
impl Element for u8 {
    const DTYPE: DType = DType::U8;
    fn read_from(buf: &[u8], _: Endian) -> Self { buf[0] }
    fn write_native(self, buf: &mut [u8]) { buf[0] = self; }
}

macro_rules! impl_element {
    ($ty:ty, $dtype:ident, $read:ident, $write:ident) => {
        impl sealed::Sealed for $ty {}
        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;
            fn read_from(buf: &[u8], order: Endian) -> Self {
                match order {
                    Endian::Little => LittleEndian::$read(buf),
                    Endian::Big    => BigEndian::$read(buf),
                }
            }
            fn write_native(self, buf: &mut [u8]) {
                byteorder::NativeEndian::$write(buf, self)
            }
        }
    };
}

impl_element!(i16, I16, read_i16, write_i16);
impl_element!(i32, I32, read_i32, write_i32);
impl_element!(i64, I64, read_i64, write_i64);
impl_element!(u16, U16, read_u16, write_u16);
impl_element!(u32, U32, read_u32, write_u32);
impl_element!(u64, U64, read_u64, write_u64);
impl_element!(f32, F32, read_f32, write_f32);
impl_element!(f64, F64, read_f64, write_f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_round_trip_and_swap() {
        let mut buf = [0u8; 4];
        0x0102_0304u32.write_native(&mut buf);
        assert_eq!(u32::read_from(&buf, Endian::native()), 0x0102_0304);

        let swapped = match Endian::native() {
            Endian::Little => Endian::Big,
            Endian::Big    => Endian::Little,
        };
        assert_eq!(u32::read_from(&buf, swapped), 0x0403_0201);
    }

    #[test]
    fn dtype_tags_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&DType::F64).unwrap(), "\"f64\"");
        assert_eq!(serde_json::from_str::<DType>("\"u16\"").unwrap(), DType::U16);
        assert_eq!(DType::I32.size(), 4);
        assert_eq!(<i16 as Element>::DTYPE, DType::I16);
    }
}
