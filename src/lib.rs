//! # metaarray
//!
//! 带逐轴元数据的 N 维数组，以及可追加、可内存映射的单文件格式。
//!
//! - 每个轴可以有名称、单位、标题、坐标值（`values`）或具名列（`cols`）
//! - 一个索引表达式里可以混用位置、切片、坐标值、列名、列表、掩码，
//!   并可按轴名定位
//! - 基本切片的结果与源数组共享存储；列表 / 掩码选择的结果是拷贝
//! - 文件可沿某个轴分帧追加，已有数据不被重写；未压缩的文件可直接映射
//!
//! ## 整体架构
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      MetaArray<T>                         │
//! │   ┌──────────────┐  ┌───────────────────┐  ┌──────────┐  │
//! │   │ Buffer<T>    │  │ AxisDescriptor × N│  │ info     │  │
//! │   │  Shared(Arc) │  │  name / values /  │  │ (Extra)  │  │
//! │   │  Mapped(mmap)│  │  cols / units     │  └──────────┘  │
//! │   └──────┬───────┘  └─────────┬─────────┘                │
//! │          │      select()      │                          │
//! │          │  ┌─────────────────┴──────┐                   │
//! │          └──┤ index::resolve         │ Selector × M      │
//! │             │   → AxisPlan × N       │                   │
//! │             └────────────────────────┘                   │
//! │                                                          │
//! │   codec  (write / append / read / inspect)               │
//! │   ┌────────────────────────────────────────────────┐     │
//! │   │  Preamble (64B) │ frames … │ FileHeader (JSON) │     │
//! │   │   ├─ frame: row-major, native, LZ4 可选, CRC32   │     │
//! │   │   └─ 前导块最后提交                              │     │
//! │   └────────────────────────────────────────────────┘     │
//! └──────────────────────────────────────────────────────────┘
//! ```

// ── 数据模型 ──────────────────────────────────────────────────────────────────
pub mod common;
pub mod dtype;
pub mod axis;
pub mod index;
pub mod array;
pub mod ops;

pub(crate) mod buffer;

// ── 文件格式 ──────────────────────────────────────────────────────────────────
pub mod compression;
pub mod frame;
pub mod codec;

pub use array::MetaArray;
pub use axis::{AxisDescriptor, ColumnDescriptor, ColumnName, Extra, KeyKind};
pub use codec::{inspect, ReadOptions, WriteOptions};
pub use common::{MetaError, Result};
pub use dtype::{Compression, DType, Element, Endian};
pub use index::{ListItem, Selector, SliceSpec};
