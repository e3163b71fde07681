//! Error Types for the Engine
//!
//! ## Error Categories
//!
//! - Missing or unreadable definition, weight and snapshot files
//! - Malformed solver or network definitions
//! - Shape failures raised by the tensor layer
//! - Runtime misuse (empty memory-data layers, bad layer ranges, devices)

use std::path::{Path, PathBuf};

use netbridge_array::ArrayError;
use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A path argument does not name a readable file
    #[error("could not find file {}", path.display())]
    FileNotFound {
        /// The missing path
        path: PathBuf,
    },

    /// Reading or writing a file failed
    #[error("i/o error on {}: {message}", path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error text
        message: String,
    },

    /// A file was read but its contents could not be decoded
    #[error("failed to parse {}: {message}", path.display())]
    Parse {
        /// File being decoded
        path: PathBuf,
        /// Decoder error text
        message: String,
    },

    /// A solver or network definition is inconsistent
    #[error("invalid definition: {message}")]
    InvalidConfig {
        /// What is wrong with the definition
        message: String,
    },

    /// Tensor shape failure
    #[error(transparent)]
    Array(#[from] ArrayError),

    /// Requested layer range lies outside the network
    #[error("layer range {from}..={to} is outside a network of {len} layers")]
    LayerRange {
        /// First layer (0-based)
        from: usize,
        /// Last layer (0-based, inclusive)
        to: usize,
        /// Number of layers
        len: usize,
    },

    /// A memory-data layer was run before any arrays were supplied
    #[error("memory data layer '{layer}' has no input arrays")]
    MissingInput {
        /// Layer name
        layer: String,
    },

    /// Device id outside the available range
    #[error("device {id} is not available ({count} device(s) present)")]
    InvalidDevice {
        /// Requested device
        id: usize,
        /// Number of devices
        count: usize,
    },
}

impl EngineError {
    /// Create a file not found error
    pub fn file_not_found(path: impl AsRef<Path>) -> Self {
        EngineError::FileNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create an i/o error
    pub fn io(path: impl AsRef<Path>, err: impl ToString) -> Self {
        EngineError::Io {
            path: path.as_ref().to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Create a parse error
    pub fn parse(path: impl AsRef<Path>, err: impl ToString) -> Self {
        EngineError::Parse {
            path: path.as_ref().to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Create an invalid definition error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        EngineError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Check if this error came from reading or decoding a file
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            EngineError::FileNotFound { .. } | EngineError::Io { .. } | EngineError::Parse { .. }
        )
    }
}

/// Fail with [`EngineError::FileNotFound`] unless `path` is an existing file
pub fn require_file(path: &Path) -> EngineResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(EngineError::file_not_found(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_errors() {
        assert!(EngineError::file_not_found("a.toml").is_file_error());
        assert!(EngineError::parse("a.toml", "bad").is_file_error());
        assert!(!EngineError::invalid_config("no layers").is_file_error());
    }

    #[test]
    fn test_array_errors_convert() {
        let err: EngineError = ArrayError::shape_mismatch("3 vs 4").into();
        assert!(matches!(err, EngineError::Array(ArrayError::ShapeMismatch { .. })));
        assert!(err.to_string().contains("3 vs 4"));
    }

    #[test]
    fn test_require_file() {
        let err = require_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("here.toml"));
    }
}
