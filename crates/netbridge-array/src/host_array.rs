//! Host-Side Dense Arrays
//!
//! A [`HostArray`] is the host environment's dense numeric array: a list
//! of dimensions and a flat element vector stored first-axis-fastest
//! (column-major). Single-precision arrays carry tensor payloads;
//! double-precision arrays carry scalars, shapes and index vectors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArrayError, ArrayResult};

/// Trait for types that can be host array elements
pub trait HostElement: Copy + Default + PartialEq + fmt::Debug {
    /// Host class name for this element type
    fn class_name() -> &'static str;
}

impl HostElement for f32 {
    fn class_name() -> &'static str {
        "single"
    }
}

impl HostElement for f64 {
    fn class_name() -> &'static str {
        "double"
    }
}

/// Dense column-major host array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostArray<T> {
    dims: Vec<usize>,
    data: Vec<T>,
}

/// Single-precision host array
pub type SingleArray = HostArray<f32>;

/// Double-precision host array
pub type DoubleArray = HostArray<f64>;

impl<T: HostElement> HostArray<T> {
    /// Create an array from dims and column-major data
    pub fn new(dims: Vec<usize>, data: Vec<T>) -> ArrayResult<Self> {
        let expected: usize = dims.iter().product();
        if expected != data.len() {
            return Err(ArrayError::DataLength {
                dims,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    /// Create a zero-filled array
    pub fn zeros(dims: Vec<usize>) -> Self {
        let len = dims.iter().product();
        Self {
            dims,
            data: vec![T::default(); len],
        }
    }

    /// Create a 1×1 array
    pub fn scalar(value: T) -> Self {
        Self {
            dims: vec![1, 1],
            data: vec![value],
        }
    }

    /// Create a 1×n row vector
    pub fn row(values: Vec<T>) -> Self {
        Self {
            dims: vec![1, values.len()],
            data: values,
        }
    }

    /// Create an n×1 column vector
    pub fn column(values: Vec<T>) -> Self {
        Self {
            dims: vec![values.len(), 1],
            data: values,
        }
    }

    /// Dimensions in host axis order
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of dimensions
    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Dimensions with trailing singleton axes removed.
    ///
    /// The host treats `[4, 3]` and `[4, 3, 1, 1]` as the same array.
    pub fn effective_dims(&self) -> &[usize] {
        let keep = self
            .dims
            .iter()
            .rposition(|&d| d != 1)
            .map_or(0, |idx| idx + 1);
        &self.dims[..keep]
    }

    /// Check if this array holds exactly one element
    pub fn is_scalar(&self) -> bool {
        self.data.len() == 1
    }

    /// Flat element view
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Flat mutable element view
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consume into the flat element vector
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Element at a multi-dimensional host index
    pub fn get(&self, index: &[usize]) -> Option<T> {
        if index.len() != self.dims.len() {
            return None;
        }
        let mut flat = 0;
        let mut stride = 1;
        for (&idx, &dim) in index.iter().zip(self.dims.iter()) {
            if idx >= dim {
                return None;
            }
            flat += idx * stride;
            stride *= dim;
        }
        self.data.get(flat).copied()
    }

    /// Host class name of the element type
    pub fn class_name(&self) -> &'static str {
        T::class_name()
    }
}

impl<T: HostElement> fmt::Display for HostArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        write!(f, "{} [{}]", T::class_name(), dims.join("x"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_checks_length() {
        assert!(SingleArray::new(vec![2, 3], vec![0.0; 6]).is_ok());
        let err = SingleArray::new(vec![2, 3], vec![0.0; 5]).unwrap_err();
        assert!(matches!(err, ArrayError::DataLength { expected: 6, actual: 5, .. }));
    }

    #[test]
    fn test_column_major_indexing() {
        let arr = DoubleArray::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(arr.get(&[0, 0]), Some(1.0));
        assert_eq!(arr.get(&[1, 0]), Some(2.0));
        assert_eq!(arr.get(&[0, 1]), Some(3.0));
        assert_eq!(arr.get(&[1, 2]), Some(6.0));
        assert_eq!(arr.get(&[2, 0]), None);
    }

    #[test]
    fn test_effective_dims() {
        let arr = SingleArray::zeros(vec![4, 3, 1, 1]);
        assert_eq!(arr.effective_dims(), &[4, 3]);
        let scalar = SingleArray::scalar(1.0);
        assert_eq!(scalar.effective_dims(), &[] as &[usize]);
    }

    #[test]
    fn test_vectors() {
        let row = DoubleArray::row(vec![1.0, 2.0]);
        assert_eq!(row.dims(), &[1, 2]);
        let col = DoubleArray::column(vec![1.0, 2.0]);
        assert_eq!(col.dims(), &[2, 1]);
        assert_eq!(col.to_string(), "double [2x1]");
    }
}
