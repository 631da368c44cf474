//! 轴索引解析
//!
//! 把一次混合索引表达式转换为逐轴的 [`AxisPlan`]：
//! - **Named**    — 先按轴名定位目标轴，该轴不再参与位置匹配
//! - **位置选择器** — 依次作用于剩余未占用的轴（保持原顺序）
//! - **未提及的轴** — 整轴保留
//!
//! 所有逐轴决策在访问数据之前一次算完；同一份计划既交给数据引擎切片，
//! 也用于裁剪各轴的 `values` / `cols`，两者因此始终一致。

mod selector;

pub use selector::{ListItem, SliceSpec, Selector};

use crate::axis::{AxisDescriptor, ColumnName};
use crate::common::{MetaError, Result};

// ── AxisPlan ──────────────────────────────────────────────────────────────────

/// 单个轴的具体选择
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisPlan {
    /// 取单个位置并去掉该轴（视图）
    Collapse(usize),
    /// `[start, end)` 按步长取，负步长从 `end - 1` 开始（视图）
    Range { start: usize, end: usize, step: isize },
    /// 按位置列表收集（拷贝）
    Take(Vec<usize>),
}

impl AxisPlan {
    pub fn full(len: usize) -> Self { Self::Range { start: 0, end: len, step: 1 } }

    pub fn keeps_axis(&self) -> bool { !matches!(self, Self::Collapse(_)) }

    /// 数据引擎能否以视图方式实现（不拷贝）
    pub fn is_view(&self) -> bool { !matches!(self, Self::Take(_)) }

    pub fn positions(&self) -> Vec<usize> {
        match self {
            Self::Collapse(i) => vec![*i],
            Self::Range { start, end, step } if *step > 0 =>
                (*start..*end).step_by(*step as usize).collect(),
            Self::Range { start, end, step } =>
                (*start..*end).rev().step_by(step.unsigned_abs()).collect(),
            Self::Take(idx) => idx.clone(),
        }
    }

    fn is_full(&self, len: usize) -> bool {
        matches!(self, Self::Range { start: 0, end, step: 1 } if *end == len)
    }
}

// ── 解析 ──────────────────────────────────────────────────────────────────────

/// 解析索引表达式，返回与 `axes` 等长的逐轴计划
pub fn resolve(
    axes:  &[AxisDescriptor],
    shape: &[usize],
    expr:  &[Selector],
) -> Result<Vec<AxisPlan>> {
    let rank = shape.len();
    let mut targets: Vec<Option<&Selector>> = vec![None; rank];

    // 1. 按名称定位的选择器
    for sel in expr {
        if let Selector::Named(name, inner) = sel {
            if matches!(**inner, Selector::Named(..)) {
                return Err(MetaError::InvalidIndex(format!("nested axis name `{name}`")));
            }
            let axis = axis_by_name(axes, name)?;
            if targets[axis].is_some() {
                return Err(MetaError::InvalidIndex(format!("axis `{name}` selected twice")));
            }
            targets[axis] = Some(inner.as_ref());
        }
    }

    // 2. 位置选择器依次填入剩余的轴
    let free: Vec<usize> = (0..rank).filter(|&i| targets[i].is_none()).collect();
    let positional: Vec<&Selector> = expr.iter()
        .filter(|s| !matches!(s, Selector::Named(..)))
        .collect();
    if positional.len() > free.len() {
        return Err(MetaError::TooManyIndices { given: positional.len(), free: free.len() });
    }
    for (&axis, sel) in free.iter().zip(positional) {
        targets[axis] = Some(sel);
    }

    // 3. 逐轴计算计划
    targets.iter().enumerate()
        .map(|(i, sel)| match sel {
            None      => Ok(AxisPlan::full(shape[i])),
            Some(sel) => plan_axis(i, &axes[i], shape[i], sel),
        })
        .collect()
}

/// 按计划裁剪描述符；被 `Collapse` 的轴从结果中去掉
pub fn reduce_axes(
    axes:  &[AxisDescriptor],
    shape: &[usize],
    plans: &[AxisPlan],
) -> Vec<AxisDescriptor> {
    axes.iter().zip(shape).zip(plans)
        .filter(|(_, plan)| plan.keeps_axis())
        .map(|((ax, &len), plan)| {
            if plan.is_full(len) { ax.clone() } else { ax.gather(&plan.positions()) }
        })
        .collect()
}

pub(crate) fn axis_by_name(axes: &[AxisDescriptor], name: &str) -> Result<usize> {
    axes.iter()
        .position(|a| a.name.as_deref() == Some(name))
        .ok_or_else(|| MetaError::NameNotFound(name.to_string()))
}

fn plan_axis(axis: usize, desc: &AxisDescriptor, len: usize, sel: &Selector) -> Result<AxisPlan> {
    match sel {
        Selector::Index(i) => Ok(AxisPlan::Collapse(position(axis, *i, len)?)),

        Selector::Slice(spec) => {
            let (start, end, step) = spec.resolve(len)?;
            Ok(AxisPlan::Range { start, end, step })
        }

        Selector::Value(v) => {
            let (values, order) = ordered_values(axis, desc)?;
            let pos = match order {
                Order::Ascending  => values.partition_point(|x| x < v),
                Order::Descending => values.partition_point(|x| x > v),
            };
            if pos < values.len() && values[pos] == *v {
                Ok(AxisPlan::Collapse(pos))
            } else {
                Err(MetaError::ValueNotFound { axis, value: *v })
            }
        }

        Selector::ValueRange { start, stop } => {
            // 选中 start <= x < stop 的连续一段
            let (values, order) = ordered_values(axis, desc)?;
            let (lo, hi) = match order {
                Order::Ascending => (
                    start.map_or(0, |s| values.partition_point(|x| *x < s)),
                    stop.map_or(values.len(), |s| values.partition_point(|x| *x < s)),
                ),
                Order::Descending => (
                    stop.map_or(0, |s| values.partition_point(|x| *x >= s)),
                    start.map_or(values.len(), |s| values.partition_point(|x| *x >= s)),
                ),
            };
            Ok(AxisPlan::Range { start: lo, end: hi.max(lo), step: 1 })
        }

        Selector::Column(key) => Ok(AxisPlan::Collapse(column(axis, desc, key)?)),

        Selector::List(items) => items.iter()
            .map(|item| match item {
                ListItem::Index(i)    => position(axis, *i, len),
                ListItem::Column(key) => column(axis, desc, key),
            })
            .collect::<Result<Vec<_>>>()
            .map(AxisPlan::Take),

        Selector::Mask(mask) => {
            if mask.len() != len {
                return Err(MetaError::MaskLength { axis, expected: len, actual: mask.len() });
            }
            Ok(AxisPlan::Take(
                mask.iter().enumerate().filter(|&(_, &m)| m).map(|(i, _)| i).collect()))
        }

        Selector::Named(name, _) =>
            Err(MetaError::InvalidIndex(format!("axis name `{name}` in positional context"))),
    }
}

fn position(axis: usize, index: isize, len: usize) -> Result<usize> {
    let n = len as isize;
    let i = if index < 0 { index + n } else { index };
    if i < 0 || i >= n {
        return Err(MetaError::IndexOutOfBounds { axis, index, len });
    }
    Ok(i as usize)
}

fn column(axis: usize, desc: &AxisDescriptor, key: &ColumnName) -> Result<usize> {
    if !desc.has_cols() {
        return Err(MetaError::InvalidIndex(format!("axis {axis} has no named columns")));
    }
    desc.column_position(key)
        .ok_or_else(|| MetaError::ColumnNotFound { axis, key: key.to_string() })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Ascending,
    Descending,
}

/// 坐标值查找的前提：轴带 `values` 且单调（不增或不减）
fn ordered_values(axis: usize, desc: &AxisDescriptor) -> Result<(&[f64], Order)> {
    let values = desc.values.as_deref()
        .ok_or_else(|| MetaError::InvalidIndex(format!("axis {axis} has no coordinate values")))?;
    if values.windows(2).all(|w| w[0] <= w[1]) {
        Ok((values, Order::Ascending))
    } else if values.windows(2).all(|w| w[0] >= w[1]) {
        Ok((values, Order::Descending))
    } else {
        Err(MetaError::InvalidIndex(format!("axis {axis} values are not monotonic")))
    }
}
