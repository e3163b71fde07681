//! # netbridge array layer
//!
//! Native tensors and the host-side dense arrays they are exchanged as.
//!
//! ## Overview
//!
//! The native runtime stores tensors row-major: the last axis varies
//! fastest. The host stores arrays column-major: the first axis varies
//! fastest. Reversing the axis order therefore maps one layout onto the
//! other without moving a single element, and that is the only conversion
//! this crate performs.
//!
//! Every tensor carries two buffers (primary data and gradient). Each
//! buffer has a host-resident and a device-resident side; which one is
//! read or written depends on the active [`ExecutionMode`].
//!
//! ## Module Structure
//!
//! - [`blob`]: the native tensor descriptor
//! - [`synced`]: host/device synchronised buffer
//! - [`host_array`]: host-side dense array
//! - [`marshal`]: tensor ⇄ host array conversion
//! - [`mode`]: execution-mode state
//! - [`error`]: error types

pub mod blob;
pub mod error;
pub mod host_array;
pub mod marshal;
pub mod mode;
pub mod synced;

// Re-export main types for convenience
pub use blob::{Blob, MAX_BLOB_AXES};
pub use error::{ArrayError, ArrayResult};
pub use host_array::{DoubleArray, HostArray, HostElement, SingleArray};
pub use marshal::{host_dims, native_shape, Marshaler, Which};
pub use mode::{ExecutionMode, ModeState};
pub use synced::{SyncHead, SyncedBuffer};
