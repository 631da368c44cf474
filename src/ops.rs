//! 逐元素运算转发
//!
//! 固定的一组运算直接转发给数据引擎：
//! - `+ - * /` 与标量或同形状数组，结果沿用左操作数的元数据
//! - 一元 `-`
//! - 与标量比较、数组间逐元素相等：返回普通布尔数组，不带元数据

use std::ops::{Add, Div, Mul, Neg, Sub};

use ndarray::{ArrayD, Zip};

use crate::array::MetaArray;
use crate::common::{MetaError, Result};
use crate::dtype::Element;

impl<T: Element> MetaArray<T> {
    pub fn map<U: Element>(&self, f: impl Fn(T) -> U) -> MetaArray<U> {
        self.with_data(self.view().mapv(f))
    }

    /// 与同形状数组逐元素组合；形状不同时返回 `ShapeMismatch`
    pub fn zip_with(&self, other: &Self, f: impl Fn(T, T) -> T) -> Result<Self> {
        let (a, b) = (self.view(), other.view());
        if a.shape() != b.shape() {
            return Err(MetaError::ShapeMismatch {
                expected: a.shape().to_vec(),
                actual:   b.shape().to_vec(),
            });
        }
        let data = Zip::from(&a).and(&b).map_collect(|&x, &y| f(x, y));
        Ok(self.with_data(data))
    }

    /// 逐元素相等，忽略元数据
    pub fn eq_elements(&self, other: &Self) -> Result<ArrayD<bool>> {
        let (a, b) = (self.view(), other.view());
        if a.shape() != b.shape() {
            return Err(MetaError::ShapeMismatch {
                expected: a.shape().to_vec(),
                actual:   b.shape().to_vec(),
            });
        }
        Ok(Zip::from(&a).and(&b).map_collect(|x, y| x == y))
    }

    /// 形状相同且所有元素相等（忽略元数据）
    pub fn all_equal(&self, other: &Self) -> bool {
        self.view() == other.view()
    }

    pub fn gt(&self, v: T) -> ArrayD<bool> { self.view().mapv(|x| x > v) }
    pub fn ge(&self, v: T) -> ArrayD<bool> { self.view().mapv(|x| x >= v) }
    pub fn lt(&self, v: T) -> ArrayD<bool> { self.view().mapv(|x| x < v) }
    pub fn le(&self, v: T) -> ArrayD<bool> { self.view().mapv(|x| x <= v) }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl<T> $trait<T> for &MetaArray<T>
        where
            T: Element + $trait<Output = T>,
        {
            type Output = MetaArray<T>;

            fn $method(self, rhs: T) -> MetaArray<T> {
                self.map(|x| x $op rhs)
            }
        }

        /// # Panics
        ///
        /// 两个数组形状不同时 panic（与数据引擎的行为一致）；需要错误返回时用
        /// [`MetaArray::zip_with`]。
        impl<T> $trait<&MetaArray<T>> for &MetaArray<T>
        where
            T: Element + $trait<Output = T>,
        {
            type Output = MetaArray<T>;

            fn $method(self, rhs: &MetaArray<T>) -> MetaArray<T> {
                match self.zip_with(rhs, |a, b| a $op b) {
                    Ok(out) => out,
                    Err(e)  => panic!("{}: {e}", stringify!($method)),
                }
            }
        }
    };
}

impl_binary_op!(Add, add, +);
impl_binary_op!(Sub, sub, -);
impl_binary_op!(Mul, mul, *);
impl_binary_op!(Div, div, /);

impl<T> Neg for &MetaArray<T>
where
    T: Element + Neg<Output = T>,
{
    type Output = MetaArray<T>;

    fn neg(self) -> MetaArray<T> { self.map(|x| -x) }
}
