//! MetaArray 容器
//!
//! 持有一个数据缓冲区、与秩等长的轴描述符列表以及整个数组的附加信息。
//! 构造时立即校验；索引经 [`crate::index`] 解析后一次性作用到缓冲区和
//! 描述符上；读写委托给 [`crate::codec`]。

use std::fmt;
use std::path::Path;

use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Axis};

use crate::axis::{validate_axes, AxisDescriptor, ColumnName, Extra};
use crate::buffer::Buffer;
use crate::codec::{self, ReadOptions, WriteOptions};
use crate::common::{MetaError, Result};
use crate::dtype::{DType, Element};
use crate::index::{self, AxisPlan, Selector};

#[derive(Clone)]
pub struct MetaArray<T: Element> {
    data:     Buffer<T>,
    axes:     Vec<AxisDescriptor>,
    info:     Extra,
    writable: bool,
}

impl<T: Element> MetaArray<T> {
    // ── 构造 ──────────────────────────────────────────────────────────────────

    /// 由数据和逐轴描述符构造；描述符数量或 `values` / `cols` 长度不符时失败
    pub fn new(data: ArrayD<T>, axes: Vec<AxisDescriptor>) -> Result<Self> {
        Self::from_parts(Buffer::owned(data), axes, Extra::new(), true)
    }

    /// 每个轴都只有位置索引
    pub fn from_array(data: ArrayD<T>) -> Self {
        let axes = vec![AxisDescriptor::new(); data.ndim()];
        Self { data: Buffer::owned(data), axes, info: Extra::new(), writable: true }
    }

    pub fn with_info(mut self, info: Extra) -> Self {
        self.info = info; self
    }

    pub(crate) fn from_parts(
        data:     Buffer<T>,
        axes:     Vec<AxisDescriptor>,
        info:     Extra,
        writable: bool,
    ) -> Result<Self> {
        validate_axes(&axes, &data.shape())?;
        Ok(Self { data, axes, info, writable })
    }

    // ── 访问 ──────────────────────────────────────────────────────────────────

    pub fn shape(&self) -> Vec<usize> { self.data.shape() }
    pub fn ndim(&self)  -> usize      { self.axes.len() }
    pub fn dtype(&self) -> DType      { T::DTYPE }

    pub fn axes(&self) -> &[AxisDescriptor] { &self.axes }

    /// 描述符列表的深拷贝，与本数组此后的变化无关
    pub fn axes_snapshot(&self) -> Vec<AxisDescriptor> { self.axes.clone() }

    pub fn info(&self) -> &Extra { &self.info }
    pub fn info_mut(&mut self) -> &mut Extra { &mut self.info }

    pub fn view(&self) -> ArrayViewD<'_, T> { self.data.view() }

    /// 可变视图。
    ///
    /// 进程内数组与索引结果共享存储时先拷贝；映射数组的修改直接写入文件，
    /// 要求以 `writable` 打开且映射没有被其他索引结果共享。
    pub fn data_mut(&mut self) -> Result<ArrayViewMutD<'_, T>> {
        if !self.writable {
            return Err(MetaError::ReadOnly("array was opened without `writable`".into()));
        }
        self.data.view_mut()
    }

    pub fn to_array(&self) -> ArrayD<T> { self.view().to_owned() }

    pub fn is_mapped(&self)   -> bool { self.data.is_mapped() }
    pub fn is_writable(&self) -> bool { self.writable }

    /// 两个数组是否共享同一块底层存储（基本切片的结果与源数组共享，
    /// 列表 / 掩码选择的结果是独立拷贝）
    pub fn shares_buffer_with(&self, other: &Self) -> bool {
        self.data.shares_with(&other.data)
    }

    /// 把映射数组的脏页写回磁盘；修改本身无需此调用即对文件可见
    pub fn flush(&self) -> Result<()> { self.data.flush() }

    // ── 轴查询 ────────────────────────────────────────────────────────────────

    pub fn axis_index(&self, name: &str) -> Result<usize> {
        index::axis_by_name(&self.axes, name)
    }

    fn axis(&self, axis: usize) -> Result<&AxisDescriptor> {
        self.axes.get(axis).ok_or(MetaError::IndexOutOfBounds {
            axis, index: axis as isize, len: self.axes.len(),
        })
    }

    pub fn axis_has_values(&self, axis: usize) -> Result<bool> {
        Ok(self.axis(axis)?.has_values())
    }

    pub fn axis_has_columns(&self, axis: usize) -> Result<bool> {
        Ok(self.axis(axis)?.has_cols())
    }

    pub fn axis_values(&self, axis: usize) -> Result<Option<&[f64]>> {
        Ok(self.axis(axis)?.values.as_deref())
    }

    pub fn axis_units(&self, axis: usize) -> Result<Option<&str>> {
        Ok(self.axis(axis)?.units.as_deref())
    }

    pub fn column_names(&self, axis: usize) -> Result<Vec<ColumnName>> {
        Ok(self.axis(axis)?.cols.iter().flatten().map(|c| c.name.clone()).collect())
    }

    pub fn column_index(&self, axis: usize, key: &ColumnName) -> Result<usize> {
        self.axis(axis)?.column_position(key)
            .ok_or_else(|| MetaError::ColumnNotFound { axis, key: key.to_string() })
    }

    pub fn column_units(&self, axis: usize, key: &ColumnName) -> Result<Option<&str>> {
        let pos = self.column_index(axis, key)?;
        Ok(self.axes[axis].cols.as_ref().and_then(|c| c[pos].units.as_deref()))
    }

    // ── 索引 ──────────────────────────────────────────────────────────────────

    /// 按混合索引表达式选取。
    ///
    /// 只含位置 / 切片 / 坐标 / 单列选择时结果与 `self` 共享存储；含列表或
    /// 掩码时结果为拷贝，总是可写。被单值选择的轴从结果中去掉。
    pub fn select(&self, expr: &[Selector]) -> Result<Self> {
        let shape = self.shape();
        let plans = index::resolve(&self.axes, &shape, expr)?;
        let aliases = plans.iter().all(AxisPlan::is_view);
        Ok(Self {
            data:     self.data.apply(&plans),
            axes:     index::reduce_axes(&self.axes, &shape, &plans),
            info:     self.info.clone(),
            writable: self.writable || !aliases,
        })
    }

    // ── 形状操作 ──────────────────────────────────────────────────────────────

    /// 沿指定名称的轴拼接；其余轴的尺寸与描述符必须一致
    pub fn concatenate(&self, other: &Self, axis_name: &str) -> Result<Self> {
        let axis = self.axis_index(axis_name)?;
        if other.axis_index(axis_name)? != axis || other.ndim() != self.ndim() {
            return Err(MetaError::ShapeMismatch { expected: self.shape(), actual: other.shape() });
        }
        let (a, b) = (self.shape(), other.shape());
        for i in (0..self.ndim()).filter(|&i| i != axis) {
            if a[i] != b[i] || !self.axes[i].same_schema(&other.axes[i]) {
                return Err(MetaError::ShapeMismatch { expected: a, actual: b });
            }
        }

        let mut axes = self.axes.clone();
        axes[axis] = self.axes[axis].concat(&other.axes[axis])
            .map_err(|e| MetaError::InvalidIndex(format!("cannot concatenate `{axis_name}`: {e}")))?;
        let data = ndarray::concatenate(Axis(axis), &[self.view(), other.view()])
            .map_err(|_| MetaError::ShapeMismatch { expected: a.clone(), actual: b.clone() })?;
        Self::from_parts(Buffer::owned(data), axes, self.info.clone(), true)
    }

    /// 按 `order` 重排轴，描述符随之重排（结果为视图拷贝到新缓冲区）
    pub fn transpose(&self, order: &[usize]) -> Result<Self> {
        let mut seen = vec![false; self.ndim()];
        let valid = order.len() == self.ndim()
            && order.iter().all(|&i| i < seen.len() && !std::mem::replace(&mut seen[i], true));
        if !valid {
            return Err(MetaError::InvalidIndex(format!("invalid axis order {order:?}")));
        }
        let data = self.view().permuted_axes(order.to_vec()).to_owned();
        let axes = order.iter().map(|&i| self.axes[i].clone()).collect();
        Self::from_parts(Buffer::owned(data), axes, self.info.clone(), true)
    }

    // ── 文件 ──────────────────────────────────────────────────────────────────

    pub fn write(&self, path: impl AsRef<Path>, opts: &WriteOptions) -> Result<()> {
        codec::write(self, path.as_ref(), opts)
    }

    pub fn read(path: impl AsRef<Path>, opts: &ReadOptions) -> Result<Self> {
        codec::read(path.as_ref(), opts)
    }

    /// 形状不变的逐元素结果沿用本数组的元数据
    pub(crate) fn with_data<U: Element>(&self, data: ArrayD<U>) -> MetaArray<U> {
        debug_assert_eq!(data.shape(), self.shape().as_slice());
        MetaArray { data: Buffer::owned(data), axes: self.axes.clone(), info: self.info.clone(), writable: true }
    }
}

/// 数据与全部元数据都相同
impl<T: Element> PartialEq for MetaArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.axes == other.axes && self.info == other.info && self.view() == other.view()
    }
}

impl<T: Element> fmt::Debug for MetaArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaArray")
            .field("dtype", &T::DTYPE)
            .field("shape", &self.shape())
            .field("mapped", &self.is_mapped())
            .field("axes", &self.axes)
            .field("info", &self.info)
            .finish()
    }
}

impl<T: Element + fmt::Display> fmt::Display for MetaArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = self.shape();
        writeln!(f, "MetaArray<{}> {:?}", T::DTYPE, shape)?;
        for (i, ax) in self.axes.iter().enumerate() {
            write!(f, "  axis {i}")?;
            if let Some(name) = &ax.name  { write!(f, " {name:?}")?; }
            write!(f, " [{}]", shape[i])?;
            if let Some(title) = &ax.title { write!(f, " {title:?}")?; }
            if let Some(units) = &ax.units { write!(f, " ({units})")?; }
            if let Some(values) = &ax.values {
                match (values.first(), values.last()) {
                    (Some(a), Some(b)) => write!(f, " values: {a} .. {b}")?,
                    _ => write!(f, " values: []")?,
                }
            }
            writeln!(f)?;
            for (j, col) in ax.cols.iter().flatten().enumerate() {
                write!(f, "    {j}: {}", col.name)?;
                if let Some(units) = &col.units { write!(f, " ({units})")?; }
                writeln!(f)?;
            }
        }
        if !self.info.is_empty() {
            writeln!(f, "  info: {}", serde_json::Value::Object(
                self.info.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))?;
        }
        write!(f, "{}", self.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::ColumnDescriptor;
    use ndarray::IxDyn;

    fn sample() -> MetaArray<f64> {
        let data = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        MetaArray::new(data, vec![
            AxisDescriptor::named("trial").with_values(vec![0.0, 1.0]).with_units("s"),
            AxisDescriptor::named("signal").with_cols(vec![
                ColumnDescriptor::new("V").with_units("mV"),
                ColumnDescriptor::new("I").with_units("pA"),
                ColumnDescriptor::new(("stim", "on")),
            ]),
        ]).unwrap()
    }

    #[test]
    fn construction_validates_eagerly() {
        let data = ArrayD::<f64>::zeros(IxDyn(&[2, 3]));
        let err = MetaArray::new(data.clone(), vec![AxisDescriptor::new()]).unwrap_err();
        assert!(err.is_validation());
        let err = MetaArray::new(data, vec![
            AxisDescriptor::new().with_values(vec![1.0]),
            AxisDescriptor::new(),
        ]).unwrap_err();
        assert!(matches!(err, MetaError::AxisLength { axis: 0, .. }));
    }

    #[test]
    fn axis_queries() {
        let ma = sample();
        assert_eq!(ma.axis_index("signal").unwrap(), 1);
        assert!(ma.axis_index("nope").unwrap_err().is_lookup());
        assert_eq!(ma.axis_values(0).unwrap(), Some(&[0.0, 1.0][..]));
        assert_eq!(ma.axis_units(0).unwrap(), Some("s"));
        assert!(ma.axis_has_columns(1).unwrap());
        assert_eq!(ma.column_names(1).unwrap()[1], ColumnName::from("I"));
        assert_eq!(ma.column_units(1, &"V".into()).unwrap(), Some("mV"));
        assert!(ma.column_index(1, &"W".into()).unwrap_err().is_lookup());
    }

    #[test]
    fn snapshot_is_independent() {
        let mut ma = sample();
        let snap = ma.axes_snapshot();
        ma.info_mut().insert("k".into(), 1.into());
        let sel = ma.select(&[Selector::Index(0)]).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(sel.axes()[0], snap[1]);
        assert_eq!(sel.info().get("k"), Some(&serde_json::Value::from(1)));
    }

    #[test]
    fn concatenate_and_transpose() {
        let ma = sample();
        let tail = ma.select(&[Selector::slice(1isize..)]).unwrap();
        let joined = ma.concatenate(&tail, "trial").unwrap();
        assert_eq!(joined.shape(), vec![3, 3]);
        assert_eq!(joined.axis_values(0).unwrap(), Some(&[0.0, 1.0, 1.0][..]));

        let t = ma.transpose(&[1, 0]).unwrap();
        assert_eq!(t.shape(), vec![3, 2]);
        assert_eq!(t.axes()[0].name.as_deref(), Some("signal"));
        assert_eq!(t.view()[[2, 1]], 6.0);
        assert!(ma.transpose(&[0, 0]).is_err());
    }

    #[test]
    fn read_only_arrays_refuse_mutation() {
        let mut ma = sample();
        ma.writable = false;
        assert!(matches!(ma.data_mut(), Err(MetaError::ReadOnly(_))));

        let mut row = ma.select(&[Selector::Index(0)]).unwrap();
        assert!(!row.is_writable());
        assert!(row.data_mut().is_err());
    }

    #[test]
    fn copied_selections_are_writable() {
        let mut ma = sample();
        ma.writable = false;
        let mut picked = ma.select(&[Selector::list([1isize, 0])]).unwrap();
        assert!(picked.is_writable());
        picked.data_mut().unwrap()[[0, 0]] = -4.0;
        assert_eq!(picked.view()[[0, 0]], -4.0);
        assert_eq!(ma.view()[[1, 0]], 4.0);

        let masked = ma.select(&[Selector::all(), Selector::Mask(vec![true, false, true])]).unwrap();
        assert!(masked.is_writable());
    }

    #[test]
    fn display_lists_axes_and_columns() {
        let text = sample().to_string();
        assert!(text.contains("axis 0 \"trial\" [2] (s)"));
        assert!(text.contains("0: \"V\" (mV)"));
        assert!(text.contains("(\"stim\", \"on\")"));
    }
}
