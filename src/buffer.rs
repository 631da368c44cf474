//! 数据缓冲区
//!
//! 两种存储：
//! - **Shared** — 进程内 `ArcArray`；基本切片共享同一块内存，写入时写时复制
//! - **Mapped** — 文件映射区；基本切片记录为视图操作序列，与根映射共享同一
//!   个 `Arc<MappedRegion>`，每次取视图时在根视图上重放
//!
//! 带 `Take` 的选择计划（列表 / 掩码）总是拷贝为新的 Shared 缓冲区。

use std::marker::PhantomData;
use std::sync::Arc;

use memmap2::{Mmap, MmapMut};
use ndarray::{ArcArray, ArrayD, ArrayViewD, ArrayViewMutD, Axis, IxDyn, Slice};

use crate::common::{MetaError, Result};
use crate::dtype::Element;
use crate::index::AxisPlan;

// ── 映射区 ────────────────────────────────────────────────────────────────────

/// 文件数据区的内存映射；随最后一个持有者 drop 而解除映射
pub enum MappedRegion {
    ReadOnly(Mmap),
    Writable(MmapMut),
}

impl MappedRegion {
    fn bytes(&self) -> &[u8] {
        match self {
            Self::ReadOnly(m) => m,
            Self::Writable(m) => m,
        }
    }

    fn flush(&self) -> std::io::Result<()> {
        match self {
            Self::ReadOnly(_) => Ok(()),
            Self::Writable(m) => m.flush(),
        }
    }
}

/// 作用在映射根视图上的基本切片（只移动指针和步长，不拷贝）
#[derive(Debug, Clone)]
enum ViewOp {
    Collapse(usize, usize),
    Slice(usize, Slice),
}

pub struct MappedView<T> {
    region:     Arc<MappedRegion>,
    root_shape: Vec<usize>,
    ops:        Vec<ViewOp>,
    _elem:      PhantomData<T>,
}

impl<T: Element> MappedView<T> {
    /// 校验映射区长度与对齐后包装为根视图
    pub fn new(region: MappedRegion, shape: Vec<usize>) -> Result<Self> {
        let bytes = region.bytes();
        let want  = shape.iter()
            .try_fold(std::mem::size_of::<T>(), |acc, &d| acc.checked_mul(d));
        if want != Some(bytes.len()) {
            return Err(MetaError::CorruptFile(format!(
                "mapped data block is {} bytes, shape {:?} needs {:?}", bytes.len(), shape, want)));
        }
        if bytes.as_ptr() as usize % std::mem::align_of::<T>() != 0 {
            return Err(MetaError::NotMappable(format!(
                "data block is not aligned for {}", T::DTYPE)));
        }
        Ok(Self { region: Arc::new(region), root_shape: shape, ops: Vec::new(), _elem: PhantomData })
    }

    fn view(&self) -> ArrayViewD<'_, T> {
        // SAFETY: `new` 已校验长度与对齐；T 为封闭的定长数值类型，任意位模式均合法；
        // 映射区由 self.region 持有，生命周期覆盖返回的视图。
        let root = unsafe {
            ArrayViewD::from_shape_ptr(IxDyn(&self.root_shape), self.region.bytes().as_ptr() as *const T)
        };
        replay(root, &self.ops)
    }

    fn view_mut(&mut self) -> Result<ArrayViewMutD<'_, T>> {
        let region = Arc::get_mut(&mut self.region).ok_or_else(|| MetaError::ReadOnly(
            "mapping is shared with live index results".into()))?;
        let ptr = match region {
            MappedRegion::Writable(m) => m.as_mut_ptr() as *mut T,
            MappedRegion::ReadOnly(_) =>
                return Err(MetaError::ReadOnly("file was mapped without `writable`".into())),
        };
        // SAFETY: 同 `view`；Arc::get_mut 保证没有其他持有者。
        let mut root = unsafe { ArrayViewMutD::from_shape_ptr(IxDyn(&self.root_shape), ptr) };
        for op in &self.ops {
            match op {
                ViewOp::Collapse(axis, i) => root.index_axis_inplace(Axis(*axis), *i),
                ViewOp::Slice(axis, s)    => root.slice_axis_inplace(Axis(*axis), *s),
            }
        }
        Ok(root)
    }

    fn shares_region(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.region, &other.region)
    }
}

impl<T> Clone for MappedView<T> {
    fn clone(&self) -> Self {
        Self {
            region:     Arc::clone(&self.region),
            root_shape: self.root_shape.clone(),
            ops:        self.ops.clone(),
            _elem:      PhantomData,
        }
    }
}

fn replay<'a, T>(mut view: ArrayViewD<'a, T>, ops: &[ViewOp]) -> ArrayViewD<'a, T> {
    for op in ops {
        match op {
            ViewOp::Collapse(axis, i) => view.index_axis_inplace(Axis(*axis), *i),
            ViewOp::Slice(axis, s)    => view.slice_axis_inplace(Axis(*axis), *s),
        }
    }
    view
}

// ── Buffer ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum Buffer<T> {
    Shared(ArcArray<T, IxDyn>),
    Mapped(MappedView<T>),
}

impl<T: Element> Buffer<T> {
    pub fn owned(data: ArrayD<T>) -> Self { Self::Shared(data.into_shared()) }

    pub fn view(&self) -> ArrayViewD<'_, T> {
        match self {
            Self::Shared(a) => a.view(),
            Self::Mapped(m) => m.view(),
        }
    }

    /// 可变视图；Shared 在与其他数组共享时先拷贝（写时复制）
    pub fn view_mut(&mut self) -> Result<ArrayViewMutD<'_, T>> {
        match self {
            Self::Shared(a) => Ok(a.view_mut()),
            Self::Mapped(m) => m.view_mut(),
        }
    }

    pub fn shape(&self) -> Vec<usize> { self.view().shape().to_vec() }

    pub fn is_mapped(&self) -> bool { matches!(self, Self::Mapped(_)) }

    pub fn flush(&self) -> Result<()> {
        if let Self::Mapped(m) = self {
            m.region.flush()?;
        }
        Ok(())
    }

    /// 一次性应用整组逐轴计划。
    ///
    /// 先按轴号从大到小做 `Collapse` / `Range`（前面的轴号不受影响），
    /// 再对保留下来的轴做 `Take`。只有视图计划时结果与 `self` 共享存储。
    pub fn apply(&self, plans: &[AxisPlan]) -> Self {
        let mut out = self.clone();
        for (axis, plan) in plans.iter().enumerate().rev() {
            match plan {
                AxisPlan::Collapse(i) => out.push_view_op(ViewOp::Collapse(axis, *i)),
                AxisPlan::Range { start, end, step } => {
                    let s = Slice::new(*start as isize, Some(*end as isize), *step);
                    out.push_view_op(ViewOp::Slice(axis, s));
                }
                AxisPlan::Take(_) => {}
            }
        }

        let takes: Vec<(usize, &[usize])> = plans.iter()
            .filter(|p| p.keeps_axis())
            .enumerate()
            .filter_map(|(axis, p)| match p {
                AxisPlan::Take(idx) => Some((axis, idx.as_slice())),
                _ => None,
            })
            .collect();
        if takes.is_empty() {
            return out;
        }

        let mut data: ArrayD<T> = out.view().select(Axis(takes[0].0), takes[0].1);
        for &(axis, idx) in &takes[1..] {
            data = data.select(Axis(axis), idx);
        }
        Self::owned(data)
    }

    fn push_view_op(&mut self, op: ViewOp) {
        match self {
            Self::Shared(a) => match op {
                ViewOp::Collapse(axis, i) => a.index_axis_inplace(Axis(axis), i),
                ViewOp::Slice(axis, s)    => a.slice_axis_inplace(Axis(axis), s),
            },
            Self::Mapped(m) => m.ops.push(op),
        }
    }

    /// 两个缓冲区是否指向同一块底层存储
    pub fn shares_with(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Mapped(a), Self::Mapped(b)) => a.shares_region(b),
            (Self::Shared(a), Self::Shared(b)) => match (span(&a.view()), span(&b.view())) {
                (Some((a0, a1)), Some((b0, b1))) => a0 < b1 && b0 < a1,
                _ => false,
            },
            _ => false,
        }
    }
}

/// 视图覆盖的地址区间 `[lo, hi)`；空数组返回 None
fn span<T>(view: &ArrayViewD<'_, T>) -> Option<(usize, usize)> {
    if view.is_empty() {
        return None;
    }
    let size = std::mem::size_of::<T>() as isize;
    let base = view.as_ptr() as isize;
    let (mut lo, mut hi) = (base, base);
    for (&len, &stride) in view.shape().iter().zip(view.strides()) {
        let reach = (len as isize - 1) * stride * size;
        if reach < 0 { lo += reach } else { hi += reach }
    }
    Some((lo as usize, (hi + size) as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    fn grid() -> Buffer<i32> {
        let data = ArrayD::from_shape_vec(IxDyn(&[3, 4]), (0..12).collect()).unwrap();
        Buffer::owned(data)
    }

    #[test]
    fn view_plans_share_storage() {
        let buf = grid();
        let out = buf.apply(&[AxisPlan::Collapse(1), AxisPlan::Range { start: 1, end: 4, step: 2 }]);
        assert_eq!(out.view().iter().copied().collect::<Vec<_>>(), vec![5, 7]);
        assert!(out.shares_with(&buf));
    }

    #[test]
    fn take_plans_copy() {
        let buf = grid();
        let out = buf.apply(&[AxisPlan::Take(vec![2, 0]), AxisPlan::Collapse(3)]);
        assert_eq!(out.shape(), vec![2]);
        assert_eq!(out.view().iter().copied().collect::<Vec<_>>(), vec![11, 3]);
        assert!(!out.shares_with(&buf));
    }

    #[test]
    fn negative_step_reverses() {
        let buf = grid();
        let out = buf.apply(&[AxisPlan::Collapse(0), AxisPlan::Range { start: 0, end: 4, step: -1 }]);
        assert_eq!(out.view().iter().copied().collect::<Vec<_>>(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn mutation_after_slicing_is_copy_on_write() {
        let buf = grid();
        let mut out = buf.apply(&[AxisPlan::Collapse(0), AxisPlan::full(4)]);
        out.view_mut().unwrap()[[0]] = 100;
        assert_eq!(buf.view()[[0, 0]], 0);
        assert_eq!(out.view()[[0]], 100);
    }
}
