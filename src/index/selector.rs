//! 索引表达式的封闭变体类型
//!
//! 调用方用 `&[Selector]` 描述一次索引；每个元素要么按位置作用于下一个
//! 尚未被占用的轴，要么通过 [`Selector::Named`] 直接指定目标轴。

use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use crate::axis::ColumnName;
use crate::common::{MetaError, Result};

// ── 位置切片 ──────────────────────────────────────────────────────────────────

/// `start:stop:step` 形式的位置切片，负数从末尾计数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceSpec {
    pub start: Option<isize>,
    pub stop:  Option<isize>,
    pub step:  isize,
}

impl SliceSpec {
    pub fn new(start: Option<isize>, stop: Option<isize>, step: isize) -> Self {
        Self { start, stop, step }
    }

    pub fn full() -> Self { Self::new(None, None, 1) }

    pub fn with_step(mut self, step: isize) -> Self {
        self.step = step; self
    }

    /// 归一化为 `[start, end)` + 步长；负步长时从区间末端向前取
    pub(crate) fn resolve(&self, len: usize) -> Result<(usize, usize, isize)> {
        if self.step == 0 {
            return Err(MetaError::InvalidIndex("slice step cannot be zero".into()));
        }
        let n = len as isize;
        let norm = |i: isize| if i < 0 { i + n } else { i };

        if self.step > 0 {
            let start = self.start.map(norm).unwrap_or(0).clamp(0, n);
            let stop  = self.stop.map(norm).unwrap_or(n).clamp(0, n);
            Ok((start as usize, stop.max(start) as usize, self.step))
        } else {
            // 取到的位置为 start, start+step, ... 且严格大于 stop
            let first = self.start.map(norm).unwrap_or(n - 1).clamp(-1, n - 1);
            let stop  = self.stop.map(norm).unwrap_or(-1).clamp(-1, n - 1);
            let lo    = stop + 1;
            let end   = (first + 1).max(lo);
            Ok((lo as usize, end as usize, self.step))
        }
    }
}

impl From<Range<isize>> for SliceSpec {
    fn from(r: Range<isize>) -> Self { Self::new(Some(r.start), Some(r.end), 1) }
}

impl From<RangeFrom<isize>> for SliceSpec {
    fn from(r: RangeFrom<isize>) -> Self { Self::new(Some(r.start), None, 1) }
}

impl From<RangeTo<isize>> for SliceSpec {
    fn from(r: RangeTo<isize>) -> Self { Self::new(None, Some(r.end), 1) }
}

impl From<RangeFull> for SliceSpec {
    fn from(_: RangeFull) -> Self { Self::full() }
}

// ── Selector ──────────────────────────────────────────────────────────────────

/// 列表索引中的单项：位置或列名
#[derive(Debug, Clone, PartialEq)]
pub enum ListItem {
    Index(isize),
    Column(ColumnName),
}

impl From<isize> for ListItem {
    fn from(i: isize) -> Self { Self::Index(i) }
}

impl From<&str> for ListItem {
    fn from(s: &str) -> Self { Self::Column(s.into()) }
}

impl From<ColumnName> for ListItem {
    fn from(c: ColumnName) -> Self { Self::Column(c) }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// 单个位置，结果中去掉该轴
    Index(isize),
    /// 位置区间
    Slice(SliceSpec),
    /// 在 `values` 轴上精确查找坐标值，结果中去掉该轴
    Value(f64),
    /// 在 `values` 轴上按坐标取半开区间 `[start, stop)`
    ValueRange { start: Option<f64>, stop: Option<f64> },
    /// 在 `cols` 轴上按列名（或复合键）查找，结果中去掉该轴
    Column(ColumnName),
    /// 按列表挑选，结果顺序与列表一致
    List(Vec<ListItem>),
    /// 布尔掩码，长度必须等于轴长
    Mask(Vec<bool>),
    /// 按轴名定位，内部选择器作用于该轴
    Named(String, Box<Selector>),
}

impl Selector {
    pub fn all() -> Self { Self::Slice(SliceSpec::full()) }

    pub fn slice(spec: impl Into<SliceSpec>) -> Self { Self::Slice(spec.into()) }

    pub fn value_range(start: f64, stop: f64) -> Self {
        Self::ValueRange { start: Some(start), stop: Some(stop) }
    }

    pub fn column(name: impl Into<ColumnName>) -> Self { Self::Column(name.into()) }

    pub fn list<I: Into<ListItem>>(items: impl IntoIterator<Item = I>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    pub fn named(axis: &str, inner: impl Into<Selector>) -> Self {
        Self::Named(axis.into(), Box::new(inner.into()))
    }
}

impl From<isize> for Selector {
    fn from(i: isize) -> Self { Self::Index(i) }
}

impl From<f64> for Selector {
    fn from(v: f64) -> Self { Self::Value(v) }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self { Self::Column(s.into()) }
}

impl From<ColumnName> for Selector {
    fn from(c: ColumnName) -> Self { Self::Column(c) }
}

impl From<SliceSpec> for Selector {
    fn from(s: SliceSpec) -> Self { Self::Slice(s) }
}

impl From<Range<isize>> for Selector {
    fn from(r: Range<isize>) -> Self { Self::Slice(r.into()) }
}

impl From<RangeFull> for Selector {
    fn from(_: RangeFull) -> Self { Self::all() }
}

impl From<Vec<bool>> for Selector {
    fn from(mask: Vec<bool>) -> Self { Self::Mask(mask) }
}

impl From<Vec<ListItem>> for Selector {
    fn from(items: Vec<ListItem>) -> Self { Self::List(items) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_slices_clamp() {
        assert_eq!(SliceSpec::from(1..3).resolve(5).unwrap(), (1, 3, 1));
        assert_eq!(SliceSpec::from(1..10).resolve(5).unwrap(), (1, 5, 1));
        assert_eq!(SliceSpec::from(-2..).resolve(5).unwrap(), (3, 5, 1));
        assert_eq!(SliceSpec::from(4..2).resolve(5).unwrap(), (4, 4, 1));
        assert_eq!(SliceSpec::from(1..5).with_step(2).resolve(5).unwrap(), (1, 5, 2));
    }

    #[test]
    fn negative_steps_walk_backwards() {
        // [::-1] 覆盖整个轴
        assert_eq!(SliceSpec::full().with_step(-1).resolve(5).unwrap(), (0, 5, -1));
        // [3:0:-1] -> 3, 2, 1
        assert_eq!(SliceSpec::new(Some(3), Some(0), -1).resolve(5).unwrap(), (1, 4, -1));
        // [0:3:-1] 为空
        let (lo, end, _) = SliceSpec::new(Some(0), Some(3), -1).resolve(5).unwrap();
        assert_eq!(lo, end);
    }

    #[test]
    fn zero_step_is_rejected() {
        assert!(SliceSpec::full().with_step(0).resolve(3).unwrap_err().is_index());
    }
}
