//! Tensor shapes over symbolic dimensions.

use crate::sym::SymInt;
use std::fmt;
use std::ops::{Index, IndexMut};

/// A tensor shape: a fixed 4-tuple of symbolic dimensions.
///
/// Rank is capped at 4; unused trailing dimensions are 1. All dimension
/// values denote non-negative quantities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(pub [SymInt; 4]);

impl Shape {
    /// The scalar shape `[1, 1, 1, 1]`.
    pub fn scalar() -> Self {
        Self([SymInt::one(), SymInt::one(), SymInt::one(), SymInt::one()])
    }

    /// A column-vector shape `[d, 1, 1, 1]`.
    pub fn vector(d: impl Into<SymInt>) -> Self {
        let mut shape = Self::scalar();
        shape.0[0] = d.into();
        shape
    }

    /// A matrix shape `[rows, cols, 1, 1]`.
    pub fn matrix(rows: impl Into<SymInt>, cols: impl Into<SymInt>) -> Self {
        let mut shape = Self::scalar();
        shape.0[0] = rows.into();
        shape.0[1] = cols.into();
        shape
    }

    /// A rank-3 shape `[a, b, c, 1]`.
    pub fn tensor3(a: impl Into<SymInt>, b: impl Into<SymInt>, c: impl Into<SymInt>) -> Self {
        let mut shape = Self::scalar();
        shape.0[0] = a.into();
        shape.0[1] = b.into();
        shape.0[2] = c.into();
        shape
    }

    /// The tensor order: index of the last dimension that is not
    /// statically 1, plus one. A scalar has order 0.
    pub fn order(&self) -> usize {
        for i in (0..4).rev() {
            if !self.0[i].is_one() {
                return i + 1;
            }
        }
        0
    }

    /// Returns `true` for the all-ones shape.
    pub fn is_scalar(&self) -> bool {
        self.order() == 0
    }

    /// The symbolic number of elements.
    pub fn elements(&self) -> SymInt {
        self.0
            .iter()
            .fold(SymInt::one(), |acc, d| acc * d.clone())
    }

    /// Merges two shapes under broadcasting: dimensions must be equal, or
    /// one side statically 1 (which takes the other side's value).
    /// Returns `None` when any dimension pair is incompatible.
    pub fn broadcast_merge(&self, other: &Self) -> Option<Self> {
        let mut merged = self.clone();
        for i in 0..4 {
            if self.0[i] == other.0[i] {
                continue;
            }
            if self.0[i].is_one() {
                merged.0[i] = other.0[i].clone();
            } else if !other.0[i].is_one() {
                return None;
            }
        }
        Some(merged)
    }
}

impl Index<usize> for Shape {
    type Output = SymInt;

    fn index(&self, index: usize) -> &SymInt {
        &self.0[index]
    }
}

impl IndexMut<usize> for Shape {
    fn index_mut(&mut self, index: usize) -> &mut SymInt {
        &mut self.0[index]
    }
}

impl From<[i64; 4]> for Shape {
    fn from(dims: [i64; 4]) -> Self {
        Self(dims.map(SymInt::from))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}
