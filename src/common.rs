//! 全局错误定义

use thiserror::Error;

// ── 错误 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MetaError {
    // 构造校验
    #[error("axis count mismatch: {axes} descriptors for an array of rank {rank}")]
    AxisCount { axes: usize, rank: usize },
    #[error("axis {axis}: `{field}` has length {actual}, dimension size is {expected}")]
    AxisLength { axis: usize, field: &'static str, expected: usize, actual: usize },
    #[error("axis {axis}: `values` and `cols` are mutually exclusive")]
    ValuesAndCols { axis: usize },
    #[error("duplicate axis name: {0}")]
    DuplicateAxisName(String),
    #[error("axis {axis}: duplicate column name {name}")]
    DuplicateColumn { axis: usize, name: String },
    #[error("axis {axis}: coordinate values must be finite to be stored")]
    NonFiniteValues { axis: usize },

    // 查找
    #[error("axis name not found: {0}")]
    NameNotFound(String),
    #[error("axis {axis}: column not found: {key}")]
    ColumnNotFound { axis: usize, key: String },
    #[error("axis {axis}: coordinate value not found: {value}")]
    ValueNotFound { axis: usize, value: f64 },

    // 索引表达式
    #[error("axis {axis}: index {index} out of bounds for length {len}")]
    IndexOutOfBounds { axis: usize, index: isize, len: usize },
    #[error("too many indices: {given} positional selectors for {free} free axes")]
    TooManyIndices { given: usize, free: usize },
    #[error("axis {axis}: boolean mask has length {actual}, dimension size is {expected}")]
    MaskLength { axis: usize, expected: usize, actual: usize },
    #[error("invalid index: {0}")]
    InvalidIndex(String),

    // 文件格式
    #[error("corrupt file: {0}")]
    CorruptFile(String),
    #[error("unsupported file version {found} (newest supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("append mismatch: {0}")]
    AppendMismatch(String),
    #[error("dtype mismatch: file holds {file}, requested {requested}")]
    DTypeMismatch { file: &'static str, requested: &'static str },
    #[error("file cannot be memory-mapped: {0}")]
    NotMappable(String),
    #[error("compression error: {0}")]
    Compression(String),

    // 其他
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },
    #[error("array is read-only: {0}")]
    ReadOnly(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MetaError {
    /// 构造时的描述符校验失败
    pub fn is_validation(&self) -> bool {
        matches!(self,
            Self::AxisCount { .. } | Self::AxisLength { .. } | Self::ValuesAndCols { .. }
            | Self::DuplicateAxisName(_) | Self::DuplicateColumn { .. }
            | Self::NonFiniteValues { .. })
    }

    /// 按名称 / 列 / 坐标值查找失败
    pub fn is_lookup(&self) -> bool {
        matches!(self,
            Self::NameNotFound(_) | Self::ColumnNotFound { .. } | Self::ValueNotFound { .. })
    }

    pub fn is_index(&self) -> bool {
        matches!(self,
            Self::IndexOutOfBounds { .. } | Self::TooManyIndices { .. }
            | Self::MaskLength { .. } | Self::InvalidIndex(_))
    }

    /// 文件读写 / 追加阶段的格式错误
    pub fn is_format(&self) -> bool {
        matches!(self,
            Self::CorruptFile(_) | Self::UnsupportedVersion { .. } | Self::AppendMismatch(_)
            | Self::DTypeMismatch { .. } | Self::NotMappable(_) | Self::Compression(_))
    }
}

pub type Result<T> = std::result::Result<T, MetaError>;
