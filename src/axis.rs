//! 轴描述符与列描述符
//!
//! 每个维度对应一个 [`AxisDescriptor`]；一个轴最多携带 `values`（坐标值）
//! 或 `cols`（具名列）之一作为索引键，二者都缺省时只能按位置索引。
//! `extra` 是对核心不透明的键值表，构造、索引、序列化全程原样传递。

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::common::{MetaError, Result};

/// 附加在轴或整个数组上的自由元数据
pub type Extra = BTreeMap<String, serde_json::Value>;

// ── 列描述符 ──────────────────────────────────────────────────────────────────

/// 列名：单个字符串，或由多个字符串组成的复合键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnName {
    Simple(String),
    Compound(Vec<String>),
}

impl ColumnName {
    pub fn compound<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Compound(parts.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for ColumnName {
    fn from(s: &str) -> Self { Self::Simple(s.to_string()) }
}

impl From<String> for ColumnName {
    fn from(s: String) -> Self { Self::Simple(s) }
}

impl From<(&str, &str)> for ColumnName {
    fn from((a, b): (&str, &str)) -> Self { Self::compound([a, b]) }
}

impl std::fmt::Display for ColumnName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple(s)   => write!(f, "{s:?}"),
            Self::Compound(p) => write!(f, "({})", p.iter()
                .map(|s| format!("{s:?}"))
                .collect::<Vec<_>>()
                .join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name:  ColumnName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<ColumnName>) -> Self {
        Self { name: name.into(), units: None, title: None }
    }
    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.into()); self
    }
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.into()); self
    }
}

// ── 轴描述符 ──────────────────────────────────────────────────────────────────

/// 轴的索引键类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Positional,
    Values,
    Cols,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name:   Option<String>,
    /// 坐标值，要求单调（递增或递减）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols:   Option<Vec<ColumnDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units:  Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title:  Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra:  Extra,
}

impl AxisDescriptor {
    pub fn new() -> Self { Self::default() }

    pub fn named(name: &str) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn with_values(mut self, values: Vec<f64>) -> Self {
        self.values = Some(values); self
    }
    pub fn with_cols(mut self, cols: Vec<ColumnDescriptor>) -> Self {
        self.cols = Some(cols); self
    }
    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.into()); self
    }
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.into()); self
    }
    pub fn with_extra(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into()); self
    }

    pub fn has_values(&self) -> bool { self.values.is_some() }
    pub fn has_cols(&self)   -> bool { self.cols.is_some() }

    pub fn key_kind(&self) -> KeyKind {
        if self.values.is_some() {
            KeyKind::Values
        } else if self.cols.is_some() {
            KeyKind::Cols
        } else {
            KeyKind::Positional
        }
    }

    /// 精确匹配列名，返回列位置
    pub fn column_position(&self, key: &ColumnName) -> Option<usize> {
        self.cols.as_ref()?.iter().position(|c| &c.name == key)
    }

    /// 按位置列表收集 `values` / `cols`，其余字段不变
    pub(crate) fn gather(&self, positions: &[usize]) -> Self {
        Self {
            values: self.values.as_ref()
                .map(|v| positions.iter().map(|&i| v[i]).collect()),
            cols:   self.cols.as_ref()
                .map(|c| positions.iter().map(|&i| c[i].clone()).collect()),
            ..self.clone()
        }
    }

    /// 沿本轴拼接另一段：要求键类型和单位一致，`values` / `cols` 首尾相接
    pub(crate) fn concat(&self, other: &Self) -> std::result::Result<Self, String> {
        if self.key_kind() != other.key_kind() {
            return Err(format!(
                "key kind differs ({:?} vs {:?})", self.key_kind(), other.key_kind()));
        }
        if self.units != other.units {
            return Err(format!("units differ ({:?} vs {:?})", self.units, other.units));
        }
        let mut out = self.clone();
        if let (Some(a), Some(b)) = (out.values.as_mut(), other.values.as_ref()) {
            a.extend_from_slice(b);
        }
        if let (Some(a), Some(b)) = (out.cols.as_mut(), other.cols.as_ref()) {
            a.extend(b.iter().cloned());
        }
        Ok(out)
    }

    /// 除追加轴以外的轴在拼接 / 追加时必须一致的部分（`title`、`extra` 不参与比较）
    pub(crate) fn same_schema(&self, other: &Self) -> bool {
        self.name == other.name
            && self.values == other.values
            && self.cols == other.cols
            && self.units == other.units
    }
}

// ── 校验 ──────────────────────────────────────────────────────────────────────

/// 校验描述符列表与数组形状是否一致，任何违例立即返回
pub fn validate_axes(axes: &[AxisDescriptor], shape: &[usize]) -> Result<()> {
    if axes.len() != shape.len() {
        return Err(MetaError::AxisCount { axes: axes.len(), rank: shape.len() });
    }

    let mut names = HashSet::new();
    for (i, (ax, &size)) in axes.iter().zip(shape).enumerate() {
        if let Some(name) = &ax.name {
            if !names.insert(name.as_str()) {
                return Err(MetaError::DuplicateAxisName(name.clone()));
            }
        }
        if ax.values.is_some() && ax.cols.is_some() {
            return Err(MetaError::ValuesAndCols { axis: i });
        }
        if let Some(values) = &ax.values {
            if values.len() != size {
                return Err(MetaError::AxisLength {
                    axis: i, field: "values", expected: size, actual: values.len(),
                });
            }
        }
        if let Some(cols) = &ax.cols {
            if cols.len() != size {
                return Err(MetaError::AxisLength {
                    axis: i, field: "cols", expected: size, actual: cols.len(),
                });
            }
            let mut seen = HashSet::new();
            for c in cols {
                if !seen.insert(&c.name) {
                    return Err(MetaError::DuplicateColumn { axis: i, name: c.name.to_string() });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols3() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("a"),
            ColumnDescriptor::new("b").with_units("mV"),
            ColumnDescriptor::new(("c", "d")).with_units("A").with_title("compound"),
        ]
    }

    #[test]
    fn accepts_consistent_descriptors() {
        let axes = vec![
            AxisDescriptor::named("time").with_values(vec![0.0, 0.5]).with_units("s"),
            AxisDescriptor::named("signal").with_cols(cols3()),
            AxisDescriptor::new(),
        ];
        assert!(validate_axes(&axes, &[2, 3, 4]).is_ok());
    }

    #[test]
    fn rejects_rank_and_length_mismatches() {
        let err = validate_axes(&[AxisDescriptor::new()], &[2, 3]).unwrap_err();
        assert!(matches!(err, MetaError::AxisCount { axes: 1, rank: 2 }));

        let axes = vec![AxisDescriptor::new().with_values(vec![1.0, 2.0, 3.0])];
        let err = validate_axes(&axes, &[2]).unwrap_err();
        assert!(matches!(err, MetaError::AxisLength { axis: 0, field: "values", expected: 2, actual: 3 }));

        let axes = vec![AxisDescriptor::new().with_cols(cols3())];
        assert!(validate_axes(&axes, &[4]).unwrap_err().is_validation());
    }

    #[test]
    fn rejects_values_with_cols_and_duplicates() {
        let axes = vec![AxisDescriptor::new().with_values(vec![1.0]).with_cols(vec![ColumnDescriptor::new("x")])];
        assert!(matches!(validate_axes(&axes, &[1]), Err(MetaError::ValuesAndCols { axis: 0 })));

        let axes = vec![AxisDescriptor::named("x"), AxisDescriptor::named("x")];
        assert!(matches!(validate_axes(&axes, &[1, 1]), Err(MetaError::DuplicateAxisName(_))));

        let axes = vec![AxisDescriptor::new().with_cols(vec![ColumnDescriptor::new("x"), ColumnDescriptor::new("x")])];
        assert!(matches!(validate_axes(&axes, &[2]), Err(MetaError::DuplicateColumn { axis: 0, .. })));
    }

    #[test]
    fn column_names_serialize_as_string_or_list() {
        let json = serde_json::to_string(&cols3()).unwrap();
        assert!(json.contains(r#""name":"a""#));
        assert!(json.contains(r#""name":["c","d"]"#));
        let back: Vec<ColumnDescriptor> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cols3());
    }

    #[test]
    fn concat_requires_matching_kind() {
        let a = AxisDescriptor::named("t").with_values(vec![1.0, 2.0]);
        let b = AxisDescriptor::named("t").with_values(vec![3.0]);
        assert_eq!(a.concat(&b).unwrap().values, Some(vec![1.0, 2.0, 3.0]));

        let c = AxisDescriptor::named("t").with_cols(vec![ColumnDescriptor::new("x")]);
        assert!(a.concat(&c).is_err());
    }
}
