//! Host Value Model
//!
//! [`HostValue`] mirrors the dynamic values a host environment passes to
//! and receives from the bridge. Numeric scalars travel as 1×1 double
//! arrays, the way array-oriented hosts represent them.

use std::fmt;

use indexmap::IndexMap;
use netbridge_array::{DoubleArray, SingleArray};
use netbridge_handle::Token;
use smol_str::SmolStr;

/// Field map of a host struct, in insertion order
pub type HostStruct = IndexMap<SmolStr, HostValue>;

/// Any value crossing the host boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// No value
    Empty,

    /// Double-precision array; scalars are 1×1
    Double(DoubleArray),

    /// Single-precision array, the tensor payload type
    Single(SingleArray),

    /// Integer scalar
    Int(i64),

    /// Character string
    Str(SmolStr),

    /// One native object handle
    Handle(Token),

    /// Row of native object handles
    Handles(Vec<Token>),

    /// Ordered heterogeneous list
    Cell(Vec<HostValue>),

    /// Named fields in insertion order
    Struct(HostStruct),
}

impl HostValue {
    /// Double scalar
    pub fn scalar(value: f64) -> Self {
        HostValue::Double(DoubleArray::scalar(value))
    }

    /// String value
    pub fn string(value: impl Into<SmolStr>) -> Self {
        HostValue::Str(value.into())
    }

    /// Double row vector
    pub fn double_row(values: Vec<f64>) -> Self {
        HostValue::Double(DoubleArray::row(values))
    }

    /// Host class name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Empty => "empty",
            HostValue::Double(_) => "double",
            HostValue::Single(_) => "single",
            HostValue::Int(_) => "int64",
            HostValue::Str(_) => "char",
            HostValue::Handle(_) => "handle",
            HostValue::Handles(_) => "handle vector",
            HostValue::Cell(_) => "cell",
            HostValue::Struct(_) => "struct",
        }
    }

    /// Check if this is the empty value
    pub fn is_empty(&self) -> bool {
        matches!(self, HostValue::Empty)
    }

    /// Try to extract a numeric scalar
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Double(arr) if arr.is_scalar() => Some(arr.as_slice()[0]),
            HostValue::Single(arr) if arr.is_scalar() => Some(f64::from(arr.as_slice()[0])),
            HostValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Try to extract a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Try to extract a single token
    pub fn as_token(&self) -> Option<Token> {
        match self {
            HostValue::Handle(token) => Some(*token),
            _ => None,
        }
    }

    /// Try to extract a token vector
    pub fn as_tokens(&self) -> Option<&[Token]> {
        match self {
            HostValue::Handles(tokens) => Some(tokens),
            _ => None,
        }
    }

    /// Try to extract a single-precision array
    pub fn as_single(&self) -> Option<&SingleArray> {
        match self {
            HostValue::Single(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to extract a double-precision array
    pub fn as_double(&self) -> Option<&DoubleArray> {
        match self {
            HostValue::Double(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to extract cell contents
    pub fn as_cell(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::Cell(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a struct field
    pub fn field(&self, name: &str) -> Option<&HostValue> {
        match self {
            HostValue::Struct(fields) => fields.get(name),
            _ => None,
        }
    }
}

impl Default for HostValue {
    fn default() -> Self {
        HostValue::Empty
    }
}

impl From<Token> for HostValue {
    fn from(token: Token) -> Self {
        HostValue::Handle(token)
    }
}

impl From<SingleArray> for HostValue {
    fn from(array: SingleArray) -> Self {
        HostValue::Single(array)
    }
}

impl From<DoubleArray> for HostValue {
    fn from(array: DoubleArray) -> Self {
        HostValue::Double(array)
    }
}

fn write_numbers<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", v)?;
    }
    write!(f, "]")
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Empty => write!(f, "[]"),
            HostValue::Double(arr) if arr.is_scalar() => write!(f, "{}", arr.as_slice()[0]),
            HostValue::Double(arr) => {
                write!(f, "{} ", arr)?;
                write_numbers(f, arr.as_slice())
            }
            HostValue::Single(arr) => {
                write!(f, "{} ", arr)?;
                write_numbers(f, arr.as_slice())
            }
            HostValue::Int(n) => write!(f, "{}", n),
            HostValue::Str(s) => write!(f, "'{}'", s),
            HostValue::Handle(token) => write!(f, "{}", token),
            HostValue::Handles(tokens) => {
                write!(f, "[")?;
                for (i, token) in tokens.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", token)?;
                }
                write!(f, "]")
            }
            HostValue::Cell(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            HostValue::Struct(fields) => {
                write!(f, "struct {{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", name, value)?;
                }
                write!(f, " }}")
            }
        }
    }
}
