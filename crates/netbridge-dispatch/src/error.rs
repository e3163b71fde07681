//! Error Types for the Bridge
//!
//! Every command either succeeds completely or fails with one
//! [`BridgeError`] and leaves the registry, the execution mode and all
//! tensor buffers as they were.
//!
//! ## Error Categories
//!
//! - Host-side misuse: wrong arity or argument types, unknown commands
//! - Handles that no longer resolve, or resolve to the wrong object kind
//! - Tensor shape failures
//! - Layer-kind gated commands called on other layers
//! - Unreadable bridge configuration
//! - Failures reported by the native engine

use std::path::{Path, PathBuf};

use netbridge_array::ArrayError;
use netbridge_engine::EngineError;
use netbridge_handle::{HandleError, Token};
use thiserror::Error;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Wrong argument count, types or values for a command
    #[error("{reason}. Usage: {usage}")]
    BadUsage {
        /// The command's usage line
        usage: String,
        /// What was wrong with the call
        reason: String,
    },

    /// No command with this name is registered
    #[error("unknown command '{name}'")]
    UnknownCommand {
        /// The requested name
        name: String,
    },

    /// The token was minted before the last reset, or its object is gone
    #[error("stale handle {token}: it was invalidated by a reset or its object was released")]
    StaleHandle {
        /// The rejected token
        token: Token,
    },

    /// The token names a different kind of object than the command needs
    #[error("handle {token} refers to a {actual}, expected a {expected}")]
    WrongObjectKind {
        /// The rejected token
        token: Token,
        /// Kind the command needs
        expected: String,
        /// Kind the token refers to
        actual: String,
    },

    /// A path argument does not name a readable file
    #[error("could not find file {}", path.display())]
    FileNotFound {
        /// The missing path
        path: PathBuf,
    },

    /// Host array and tensor disagree on element count or axis layout
    #[error("shape mismatch: {reason}")]
    ShapeMismatch {
        /// Description of the mismatch
        reason: String,
    },

    /// The engine's reshape rule rejected the shape
    #[error("incompatible reshape to {shape:?}: {reason}")]
    IncompatibleReshape {
        /// Requested shape in native axis order
        shape: Vec<usize>,
        /// Reason for rejection
        reason: String,
    },

    /// The execution-mode cell holds an unrecognized value
    #[error("unknown execution mode (raw value {raw})")]
    InvalidMode {
        /// The raw stored value
        raw: u8,
    },

    /// A layer-kind gated command was called on another kind of layer
    #[error("{command} requires a {expected} layer, but layer '{layer}' is {actual}")]
    WrongLayerKind {
        /// Command name
        command: String,
        /// Name of the indexed layer
        layer: String,
        /// Required layer type
        expected: String,
        /// Actual layer type
        actual: String,
    },

    /// Two commands share a name
    #[error("command '{name}' is registered more than once")]
    DuplicateCommand {
        /// The duplicated name
        name: String,
    },

    /// Bridge configuration could not be read or applied
    #[error("invalid bridge configuration: {message}")]
    Config {
        /// What is wrong with the configuration
        message: String,
    },

    /// The native engine reported a failure
    #[error("engine error: {0}")]
    Engine(EngineError),
}

impl BridgeError {
    /// Create a bad usage error
    pub fn bad_usage(usage: impl Into<String>, reason: impl Into<String>) -> Self {
        BridgeError::BadUsage {
            usage: usage.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown command error
    pub fn unknown_command(name: impl Into<String>) -> Self {
        BridgeError::UnknownCommand { name: name.into() }
    }

    /// Create a file not found error
    pub fn file_not_found(path: impl AsRef<Path>) -> Self {
        BridgeError::FileNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(reason: impl Into<String>) -> Self {
        BridgeError::ShapeMismatch {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        BridgeError::Config {
            message: message.into(),
        }
    }

    /// Create a wrong layer kind error
    pub fn wrong_layer_kind(
        command: impl Into<String>,
        layer: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        BridgeError::WrongLayerKind {
            command: command.into(),
            layer: layer.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Check if this error was caused by how the command was called
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            BridgeError::BadUsage { .. } | BridgeError::UnknownCommand { .. }
        )
    }

    /// Check if this error rejected a handle
    pub fn is_handle_error(&self) -> bool {
        matches!(
            self,
            BridgeError::StaleHandle { .. } | BridgeError::WrongObjectKind { .. }
        )
    }

    /// Check if this is a shape-related error
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            BridgeError::ShapeMismatch { .. } | BridgeError::IncompatibleReshape { .. }
        )
    }

    /// Short identifier of the error kind, stable across messages
    pub fn identifier(&self) -> &'static str {
        match self {
            BridgeError::BadUsage { .. } => "BadUsage",
            BridgeError::UnknownCommand { .. } => "UnknownCommand",
            BridgeError::StaleHandle { .. } => "StaleHandle",
            BridgeError::WrongObjectKind { .. } => "WrongObjectKind",
            BridgeError::FileNotFound { .. } => "FileNotFound",
            BridgeError::ShapeMismatch { .. } => "ShapeMismatch",
            BridgeError::IncompatibleReshape { .. } => "IncompatibleReshape",
            BridgeError::InvalidMode { .. } => "InvalidMode",
            BridgeError::WrongLayerKind { .. } => "WrongLayerKind",
            BridgeError::DuplicateCommand { .. } => "DuplicateCommand",
            BridgeError::Config { .. } => "Config",
            BridgeError::Engine(_) => "Engine",
        }
    }
}

impl From<HandleError> for BridgeError {
    fn from(err: HandleError) -> Self {
        match err {
            HandleError::EpochMismatch { token, .. } | HandleError::Dangling { token } => {
                BridgeError::StaleHandle { token }
            }
            HandleError::WrongKind {
                token,
                expected,
                actual,
            } => BridgeError::WrongObjectKind {
                token,
                expected,
                actual,
            },
        }
    }
}

impl From<ArrayError> for BridgeError {
    fn from(err: ArrayError) -> Self {
        match err {
            ArrayError::ShapeMismatch { reason } => BridgeError::ShapeMismatch { reason },
            ArrayError::IncompatibleReshape { shape, reason } => {
                BridgeError::IncompatibleReshape { shape, reason }
            }
            ArrayError::InvalidMode { raw } => BridgeError::InvalidMode { raw },
            err @ ArrayError::DataLength { .. } => BridgeError::ShapeMismatch {
                reason: err.to_string(),
            },
        }
    }
}

impl From<EngineError> for BridgeError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::FileNotFound { path } => BridgeError::FileNotFound { path },
            EngineError::Array(err) => err.into(),
            other => BridgeError::Engine(other),
        }
    }
}
