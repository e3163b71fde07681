//! Tensor ⇄ Host Array Marshaling
//!
//! A blob of native shape `[a, b, c]` is stored row-major, so its last
//! axis varies fastest. The host array with dims `[c, b, a]` is stored
//! column-major, so its first axis varies fastest. Both describe the same
//! linear sequence of elements; conversion relabels axes and copies the
//! buffer as-is, never permuting data.
//!
//! ## Memory routing
//!
//! The [`Marshaler`] reads the execution mode on every call and goes
//! through the host-side buffer in CPU mode and the device-side buffer in
//! GPU mode, for both data and gradient.

use crate::blob::Blob;
use crate::error::{ArrayError, ArrayResult};
use crate::host_array::SingleArray;
use crate::mode::{ExecutionMode, ModeState};

/// Which tensor buffer a transfer touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Which {
    /// Primary data buffer
    Data,
    /// Gradient buffer
    Diff,
}

impl Which {
    /// Buffer name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Which::Data => "data",
            Which::Diff => "diff",
        }
    }
}

/// Host dims for a native shape: the axes reversed.
///
/// A zero-axis shape maps to `[1]`; the host has no zero-dimensional arrays.
pub fn host_dims(native: &[usize]) -> Vec<usize> {
    if native.is_empty() {
        return vec![1];
    }
    native.iter().rev().copied().collect()
}

/// Native shape for host dims: the axes reversed.
pub fn native_shape(host: &[usize]) -> Vec<usize> {
    host.iter().rev().copied().collect()
}

fn trim_trailing_ones(dims: &[usize]) -> &[usize] {
    let keep = dims.iter().rposition(|&d| d != 1).map_or(0, |idx| idx + 1);
    &dims[..keep]
}

/// Copies blob buffers to and from host arrays through the memory space
/// selected by the execution mode.
#[derive(Debug, Clone, Copy)]
pub struct Marshaler<'a> {
    mode: &'a ModeState,
    strict_shapes: bool,
}

impl<'a> Marshaler<'a> {
    /// Create a marshaler reading the given mode state
    pub fn new(mode: &'a ModeState) -> Self {
        Self {
            mode,
            strict_shapes: false,
        }
    }

    /// Also require host dims to match the reversed blob shape on writes
    pub fn with_strict_shapes(mut self, strict: bool) -> Self {
        self.strict_shapes = strict;
        self
    }

    /// Copy a blob buffer into a new host array
    pub fn to_host(&self, blob: &mut Blob, which: Which) -> ArrayResult<SingleArray> {
        let mode = self.mode.current()?;
        let dims = host_dims(blob.shape());
        let data = match (mode, which) {
            (ExecutionMode::Cpu, Which::Data) => blob.host_data().to_vec(),
            (ExecutionMode::Cpu, Which::Diff) => blob.host_diff().to_vec(),
            (ExecutionMode::Gpu, Which::Data) => blob.device_data().to_vec(),
            (ExecutionMode::Gpu, Which::Diff) => blob.device_diff().to_vec(),
        };
        SingleArray::new(dims, data)
    }

    /// Copy a host array into a blob buffer.
    ///
    /// Nothing is written unless every check passes.
    pub fn from_host(&self, array: &SingleArray, blob: &mut Blob, which: Which) -> ArrayResult<()> {
        let mode = self.mode.current()?;

        if array.numel() != blob.count() {
            return Err(ArrayError::shape_mismatch(format!(
                "number of elements in target blob ({}) doesn't match that in input array ({})",
                blob.count(),
                array.numel()
            )));
        }

        if self.strict_shapes {
            let expected = host_dims(blob.shape());
            if trim_trailing_ones(&expected) != array.effective_dims() {
                return Err(ArrayError::shape_mismatch(format!(
                    "input array dims {:?} do not match blob {} in host order {:?}",
                    array.dims(),
                    which.name(),
                    expected
                )));
            }
        }

        let dst = match (mode, which) {
            (ExecutionMode::Cpu, Which::Data) => blob.mutable_host_data(),
            (ExecutionMode::Cpu, Which::Diff) => blob.mutable_host_diff(),
            (ExecutionMode::Gpu, Which::Data) => blob.mutable_device_data(),
            (ExecutionMode::Gpu, Which::Diff) => blob.mutable_device_diff(),
        };
        dst.copy_from_slice(array.as_slice());
        Ok(())
    }
}
