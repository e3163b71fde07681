//! Error Types for the Array Layer
//!
//! ## Error Categories
//!
//! - Element-count and shape mismatches between host arrays and tensors
//! - Reshapes the native reshape rule rejects
//! - Unrecognized execution-mode values

use thiserror::Error;

/// Result type for array operations
pub type ArrayResult<T> = Result<T, ArrayError>;

/// Array layer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArrayError {
    /// Host array and tensor disagree on element count or axis layout
    #[error("shape mismatch: {reason}")]
    ShapeMismatch {
        /// Description of the mismatch
        reason: String,
    },

    /// The native reshape rule rejected the requested shape
    #[error("incompatible reshape to {shape:?}: {reason}")]
    IncompatibleReshape {
        /// Requested shape in native axis order
        shape: Vec<usize>,
        /// Reason for rejection
        reason: String,
    },

    /// Execution mode holds a value that is neither CPU nor GPU
    #[error("unknown execution mode (raw value {raw})")]
    InvalidMode {
        /// The raw stored value
        raw: u8,
    },

    /// Data vector does not fill the declared dimensions
    #[error("array data has {actual} elements but dims {dims:?} need {expected}")]
    DataLength {
        /// Declared dimensions
        dims: Vec<usize>,
        /// Element count implied by dims
        expected: usize,
        /// Element count supplied
        actual: usize,
    },
}

impl ArrayError {
    /// Create a shape mismatch error
    pub fn shape_mismatch(reason: impl Into<String>) -> Self {
        ArrayError::ShapeMismatch {
            reason: reason.into(),
        }
    }

    /// Create an incompatible reshape error
    pub fn incompatible_reshape(shape: &[usize], reason: impl Into<String>) -> Self {
        ArrayError::IncompatibleReshape {
            shape: shape.to_vec(),
            reason: reason.into(),
        }
    }

    /// Check if this is a shape-related error
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            ArrayError::ShapeMismatch { .. }
                | ArrayError::IncompatibleReshape { .. }
                | ArrayError::DataLength { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message() {
        let err = ArrayError::shape_mismatch("12 elements vs 10");
        assert!(err.is_shape_error());
        assert!(err.to_string().contains("12 elements vs 10"));
    }

    #[test]
    fn test_invalid_mode_is_not_shape_error() {
        let err = ArrayError::InvalidMode { raw: 9 };
        assert!(!err.is_shape_error());
        assert!(err.to_string().contains('9'));
    }
}
