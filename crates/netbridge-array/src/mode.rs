//! Execution-Mode State
//!
//! Selects whether tensor buffers are accessed through their host-resident
//! or device-resident side. The mode is stored as an `AtomicU8` so it can
//! be read through a shared reference from anywhere the context is
//! visible; only the two mode commands write it.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{ArrayError, ArrayResult};

/// Memory space the bridge reads and writes tensor buffers through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ExecutionMode {
    /// Host-memory access path (default).
    #[default]
    Cpu = 0,
    /// Device-memory access path.
    Gpu = 1,
}

impl ExecutionMode {
    /// Lowercase name as accepted on the host side
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionMode::Cpu => "cpu",
            ExecutionMode::Gpu => "gpu",
        }
    }
}

impl TryFrom<u8> for ExecutionMode {
    type Error = ArrayError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(ExecutionMode::Cpu),
            1 => Ok(ExecutionMode::Gpu),
            _ => Err(ArrayError::InvalidMode { raw }),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(ExecutionMode::Cpu),
            "gpu" => Ok(ExecutionMode::Gpu),
            other => Err(format!("unknown execution mode '{}'", other)),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Shared execution-mode cell.
#[derive(Debug)]
pub struct ModeState {
    raw: AtomicU8,
}

impl ModeState {
    /// Create a state holding `mode`
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            raw: AtomicU8::new(mode as u8),
        }
    }

    /// Store a new mode
    pub fn set(&self, mode: ExecutionMode) {
        self.raw.store(mode as u8, Ordering::Release);
    }

    /// Read the current mode.
    ///
    /// Fails with [`ArrayError::InvalidMode`] if the cell holds a value
    /// outside the recognized set.
    pub fn current(&self) -> ArrayResult<ExecutionMode> {
        ExecutionMode::try_from(self.raw.load(Ordering::Acquire))
    }

    /// Raw stored value
    pub fn raw(&self) -> u8 {
        self.raw.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn store_raw(&self, raw: u8) {
        self.raw.store(raw, Ordering::Release);
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new(ExecutionMode::default())
    }
}
