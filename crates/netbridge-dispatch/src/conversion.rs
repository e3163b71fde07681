//! Host Value Conversions
//!
//! - [`ToHost`]: turn bridge results into [`HostValue`]s
//! - [`FromHost`]: check and extract typed arguments from [`HostValue`]s
//! - [`Args`]: a command's argument list together with its usage line
//!
//! Extraction never touches the registry or any tensor. Handlers pull
//! every argument out first, so a malformed call fails before anything
//! is resolved or mutated.

use std::path::PathBuf;

use netbridge_array::{DoubleArray, SingleArray};
use netbridge_engine::Phase;
use netbridge_handle::Token;
use smol_str::SmolStr;

use crate::error::{BridgeError, BridgeResult};
use crate::value::HostValue;

// ============================================================================
// ToHost
// ============================================================================

/// Trait for values that can be returned to the host.
pub trait ToHost {
    /// Convert this value to a host value
    fn to_host(&self) -> HostValue;
}

impl ToHost for () {
    fn to_host(&self) -> HostValue {
        HostValue::Empty
    }
}

impl ToHost for f64 {
    fn to_host(&self) -> HostValue {
        HostValue::scalar(*self)
    }
}

impl ToHost for f32 {
    fn to_host(&self) -> HostValue {
        HostValue::scalar(f64::from(*self))
    }
}

impl ToHost for usize {
    fn to_host(&self) -> HostValue {
        HostValue::scalar(*self as f64)
    }
}

impl ToHost for str {
    fn to_host(&self) -> HostValue {
        HostValue::Str(SmolStr::new(self))
    }
}

impl ToHost for String {
    fn to_host(&self) -> HostValue {
        HostValue::Str(SmolStr::new(self))
    }
}

impl ToHost for Token {
    fn to_host(&self) -> HostValue {
        HostValue::Handle(*self)
    }
}

impl ToHost for Vec<Token> {
    fn to_host(&self) -> HostValue {
        HostValue::Handles(self.clone())
    }
}

impl ToHost for SingleArray {
    fn to_host(&self) -> HostValue {
        HostValue::Single(self.clone())
    }
}

impl ToHost for DoubleArray {
    fn to_host(&self) -> HostValue {
        HostValue::Double(self.clone())
    }
}

impl ToHost for [String] {
    fn to_host(&self) -> HostValue {
        HostValue::Cell(self.iter().map(|s| s.to_host()).collect())
    }
}

impl ToHost for [f32] {
    fn to_host(&self) -> HostValue {
        HostValue::double_row(self.iter().map(|&v| f64::from(v)).collect())
    }
}

/// Index vectors are returned as double column vectors.
impl ToHost for [usize] {
    fn to_host(&self) -> HostValue {
        HostValue::Double(DoubleArray::column(
            self.iter().map(|&v| v as f64).collect(),
        ))
    }
}

// ============================================================================
// FromHost
// ============================================================================

/// Trait for typed extraction of command arguments.
///
/// The error is a short description of what was expected; [`Args`]
/// wraps it into [`BridgeError::BadUsage`] with the command's usage line.
pub trait FromHost: Sized {
    /// Try to extract a value of this type
    fn from_host(value: &HostValue) -> Result<Self, String>;
}

fn expected(what: &str, value: &HostValue) -> String {
    format!("expected {}, got {}", what, value.type_name())
}

impl FromHost for Token {
    fn from_host(value: &HostValue) -> Result<Self, String> {
        value.as_token().ok_or_else(|| expected("a handle", value))
    }
}

impl FromHost for SmolStr {
    fn from_host(value: &HostValue) -> Result<Self, String> {
        match value {
            HostValue::Str(s) => Ok(s.clone()),
            other => Err(expected("a string", other)),
        }
    }
}

impl FromHost for String {
    fn from_host(value: &HostValue) -> Result<Self, String> {
        SmolStr::from_host(value).map(|s| s.to_string())
    }
}

impl FromHost for PathBuf {
    fn from_host(value: &HostValue) -> Result<Self, String> {
        SmolStr::from_host(value).map(|s| PathBuf::from(s.as_str()))
    }
}

impl FromHost for Phase {
    fn from_host(value: &HostValue) -> Result<Self, String> {
        let name = SmolStr::from_host(value)?;
        name.parse()
            .map_err(|_| format!("unknown phase '{}', expected 'train' or 'test'", name))
    }
}

impl FromHost for f64 {
    fn from_host(value: &HostValue) -> Result<Self, String> {
        value.as_f64().ok_or_else(|| expected("a numeric scalar", value))
    }
}

/// Counts and indices: a scalar holding a non-negative integer.
impl FromHost for usize {
    fn from_host(value: &HostValue) -> Result<Self, String> {
        let n = f64::from_host(value)?;
        if n.fract() != 0.0 || n < 0.0 || n > u32::MAX as f64 {
            return Err(format!("expected a non-negative integer, got {}", n));
        }
        Ok(n as usize)
    }
}

impl FromHost for SingleArray {
    fn from_host(value: &HostValue) -> Result<Self, String> {
        value
            .as_single()
            .cloned()
            .ok_or_else(|| expected("a single array", value))
    }
}

impl FromHost for DoubleArray {
    fn from_host(value: &HostValue) -> Result<Self, String> {
        value
            .as_double()
            .cloned()
            .ok_or_else(|| expected("a double array", value))
    }
}

/// Flat numeric vectors accept either precision.
impl FromHost for Vec<f32> {
    fn from_host(value: &HostValue) -> Result<Self, String> {
        match value {
            HostValue::Single(arr) => Ok(arr.as_slice().to_vec()),
            HostValue::Double(arr) => Ok(arr.as_slice().iter().map(|&v| v as f32).collect()),
            other => Err(expected("a numeric vector", other)),
        }
    }
}

// ============================================================================
// Args
// ============================================================================

/// Arguments of one command call.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    usage: &'static str,
    values: &'a [HostValue],
}

impl<'a> Args<'a> {
    /// Wrap a call's arguments
    pub fn new(usage: &'static str, values: &'a [HostValue]) -> Self {
        Self { usage, values }
    }

    /// The command's usage line
    pub fn usage(&self) -> &'static str {
        self.usage
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no arguments were passed
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Require exactly `count` arguments
    pub fn expect_len(&self, count: usize) -> BridgeResult<()> {
        if self.values.len() != count {
            return Err(self.usage_error(format!(
                "expected {} argument{}, got {}",
                count,
                if count == 1 { "" } else { "s" },
                self.values.len()
            )));
        }
        Ok(())
    }

    /// Extract argument `idx` (0-based)
    pub fn get<T: FromHost>(&self, idx: usize) -> BridgeResult<T> {
        let value = self
            .values
            .get(idx)
            .ok_or_else(|| self.usage_error(format!("missing argument {}", idx + 1)))?;
        T::from_host(value).map_err(|reason| self.usage_error(format!("argument {}: {}", idx + 1, reason)))
    }

    /// Build a bad usage error for this command
    pub fn usage_error(&self, reason: impl Into<String>) -> BridgeError {
        BridgeError::bad_usage(self.usage, reason)
    }
}
