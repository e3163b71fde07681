//! Native Tensor Descriptor
//!
//! A [`Blob`] is the native runtime's tensor: a shape in native axis
//! order (row-major, last axis fastest) and two [`SyncedBuffer`]s, one
//! for the primary data and one for the gradient.
//!
//! ## Reshape rule
//!
//! Any shape is accepted as long as it has at most [`MAX_BLOB_AXES`] axes
//! and its element count fits in an `i32`. Shrinking keeps the existing
//! allocation; growing past the current capacity reallocates and the old
//! contents are lost.

use std::fmt;

use crate::error::{ArrayError, ArrayResult};
use crate::synced::SyncedBuffer;

/// Maximum number of axes a blob may have
pub const MAX_BLOB_AXES: usize = 32;

/// Native tensor with data and gradient buffers.
#[derive(Debug, Clone)]
pub struct Blob {
    shape: Vec<usize>,
    count: usize,
    capacity: usize,
    data: SyncedBuffer,
    diff: SyncedBuffer,
}

impl Blob {
    /// Create a blob of the given native shape
    pub fn new(shape: &[usize]) -> ArrayResult<Self> {
        let mut blob = Self::empty();
        blob.reshape(shape)?;
        Ok(blob)
    }

    /// Create a blob with a single zero-length axis and no allocation
    pub fn empty() -> Self {
        Self {
            shape: vec![0],
            count: 0,
            capacity: 0,
            data: SyncedBuffer::new(0),
            diff: SyncedBuffer::new(0),
        }
    }

    /// Create a blob and fill its data buffer from `values`
    pub fn from_data(shape: &[usize], values: &[f32]) -> ArrayResult<Self> {
        let mut blob = Self::new(shape)?;
        if values.len() != blob.count {
            return Err(ArrayError::DataLength {
                dims: shape.to_vec(),
                expected: blob.count,
                actual: values.len(),
            });
        }
        blob.mutable_host_data().copy_from_slice(values);
        Ok(blob)
    }

    /// Reshape following the native reshape rule
    pub fn reshape(&mut self, shape: &[usize]) -> ArrayResult<()> {
        if shape.len() > MAX_BLOB_AXES {
            return Err(ArrayError::incompatible_reshape(
                shape,
                format!("blobs support at most {} axes", MAX_BLOB_AXES),
            ));
        }

        let mut count: usize = 1;
        for &dim in shape {
            count = count
                .checked_mul(dim)
                .filter(|&c| c <= i32::MAX as usize)
                .ok_or_else(|| {
                    ArrayError::incompatible_reshape(shape, "element count exceeds i32::MAX")
                })?;
        }

        self.shape = shape.to_vec();
        self.count = count;
        if count > self.capacity {
            self.capacity = count;
            self.data = SyncedBuffer::new(count);
            self.diff = SyncedBuffer::new(count);
        }
        Ok(())
    }

    /// Reshape to match another blob's shape
    pub fn reshape_like(&mut self, other: &Blob) -> ArrayResult<()> {
        self.reshape(other.shape())
    }

    /// Native shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Size of one axis; negative indices count from the end
    pub fn dim(&self, axis: isize) -> Option<usize> {
        let idx = if axis < 0 {
            self.shape.len().checked_sub(axis.unsigned_abs())?
        } else {
            axis as usize
        };
        self.shape.get(idx).copied()
    }

    /// Number of axes
    pub fn num_axes(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements
    pub fn count(&self) -> usize {
        self.count
    }

    /// Product of the dimensions from `axis` onward
    pub fn count_from(&self, axis: usize) -> usize {
        self.shape.iter().skip(axis).product()
    }

    /// Size of the leading axis (1 for zero-axis blobs)
    pub fn num(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    /// Row-major strides in elements
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.shape.len()];
        for axis in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.shape[axis + 1];
        }
        strides
    }

    /// Primary buffer
    pub fn data(&self) -> &SyncedBuffer {
        &self.data
    }

    /// Gradient buffer
    pub fn diff(&self) -> &SyncedBuffer {
        &self.diff
    }

    /// Primary buffer, host side
    pub fn host_data(&mut self) -> &[f32] {
        let count = self.count;
        &self.data.host_data()[..count]
    }

    /// Primary buffer, host side, mutable
    pub fn mutable_host_data(&mut self) -> &mut [f32] {
        let count = self.count;
        &mut self.data.mutable_host_data()[..count]
    }

    /// Gradient buffer, host side
    pub fn host_diff(&mut self) -> &[f32] {
        let count = self.count;
        &self.diff.host_data()[..count]
    }

    /// Gradient buffer, host side, mutable
    pub fn mutable_host_diff(&mut self) -> &mut [f32] {
        let count = self.count;
        &mut self.diff.mutable_host_data()[..count]
    }

    /// Both buffers, host side, mutable at once
    pub fn mutable_host_buffers(&mut self) -> (&mut [f32], &mut [f32]) {
        let count = self.count;
        let data = &mut self.data.mutable_host_data()[..count];
        let diff = &mut self.diff.mutable_host_data()[..count];
        (data, diff)
    }

    /// Primary buffer, device side
    pub fn device_data(&mut self) -> &[f32] {
        let count = self.count;
        &self.data.device_data()[..count]
    }

    /// Primary buffer, device side, mutable
    pub fn mutable_device_data(&mut self) -> &mut [f32] {
        let count = self.count;
        &mut self.data.mutable_device_data()[..count]
    }

    /// Gradient buffer, device side
    pub fn device_diff(&mut self) -> &[f32] {
        let count = self.count;
        &self.diff.device_data()[..count]
    }

    /// Gradient buffer, device side, mutable
    pub fn mutable_device_diff(&mut self) -> &mut [f32] {
        let count = self.count;
        &mut self.diff.mutable_device_data()[..count]
    }

    /// Copy data (and optionally the gradient) from another blob of equal count
    pub fn copy_from(&mut self, other: &mut Blob, copy_diff: bool) -> ArrayResult<()> {
        if other.count != self.count {
            return Err(ArrayError::shape_mismatch(format!(
                "cannot copy {} elements into a blob of {}",
                other.count, self.count
            )));
        }
        let src = other.host_data().to_vec();
        self.mutable_host_data().copy_from_slice(&src);
        if copy_diff {
            let src = other.host_diff().to_vec();
            self.mutable_host_diff().copy_from_slice(&src);
        }
        Ok(())
    }

    /// Human-readable shape, e.g. `2 3 4 (24)`
    pub fn shape_string(&self) -> String {
        let dims: Vec<String> = self.shape.iter().map(|d| d.to_string()).collect();
        format!("{} ({})", dims.join(" "), self.count)
    }
}

impl Default for Blob {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob[{}]", self.shape_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_blob_shape_and_count() {
        let blob = Blob::new(&[2, 3, 4]).unwrap();
        assert_eq!(blob.num_axes(), 3);
        assert_eq!(blob.count(), 24);
        assert_eq!(blob.count_from(1), 12);
        assert_eq!(blob.num(), 2);
        assert_eq!(blob.dim(-1), Some(4));
        assert_eq!(blob.dim(5), None);
        assert_eq!(blob.strides(), vec![12, 4, 1]);
    }

    #[test]
    fn test_zero_axis_blob_is_scalar() {
        let mut blob = Blob::new(&[]).unwrap();
        assert_eq!(blob.num_axes(), 0);
        assert_eq!(blob.count(), 1);
        assert_eq!(blob.host_data(), &[0.0]);
    }

    #[test]
    fn test_shrinking_reshape_keeps_contents() {
        let mut blob = Blob::from_data(&[4], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        blob.reshape(&[2]).unwrap();
        assert_eq!(blob.host_data(), &[1.0, 2.0]);
        blob.reshape(&[2, 2]).unwrap();
        assert_eq!(blob.host_data(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_growing_reshape_reallocates() {
        let mut blob = Blob::from_data(&[2], &[1.0, 2.0]).unwrap();
        blob.reshape(&[3]).unwrap();
        assert_eq!(blob.host_data(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_reshape_rejects_too_many_axes() {
        let mut blob = Blob::empty();
        let shape = vec![1; MAX_BLOB_AXES + 1];
        let err = blob.reshape(&shape).unwrap_err();
        assert!(matches!(err, ArrayError::IncompatibleReshape { .. }));
        assert_eq!(blob.shape(), &[0]);
    }

    #[test]
    fn test_reshape_rejects_overflowing_count() {
        let mut blob = Blob::empty();
        let err = blob.reshape(&[1 << 20, 1 << 20]).unwrap_err();
        assert!(matches!(err, ArrayError::IncompatibleReshape { .. }));
    }

    #[test]
    fn test_from_data_length_check() {
        let err = Blob::from_data(&[2, 2], &[1.0]).unwrap_err();
        assert!(matches!(err, ArrayError::DataLength { expected: 4, actual: 1, .. }));
    }

    #[test]
    fn test_mutable_host_buffers() {
        let mut blob = Blob::from_data(&[2], &[1.0, 2.0]).unwrap();
        let (data, diff) = blob.mutable_host_buffers();
        diff.copy_from_slice(data);
        data[0] = 5.0;
        assert_eq!(blob.host_data(), &[5.0, 2.0]);
        assert_eq!(blob.host_diff(), &[1.0, 2.0]);
    }

    #[test]
    fn test_copy_from() {
        let mut src = Blob::from_data(&[3], &[1.0, 2.0, 3.0]).unwrap();
        src.mutable_host_diff().copy_from_slice(&[0.5, 0.5, 0.5]);
        let mut dst = Blob::new(&[3]).unwrap();
        dst.copy_from(&mut src, true).unwrap();
        assert_eq!(dst.host_data(), &[1.0, 2.0, 3.0]);
        assert_eq!(dst.host_diff(), &[0.5, 0.5, 0.5]);
    }
}
