//! # netbridge engine
//!
//! The native side of the bridge: the [`Engine`], [`Network`] and
//! [`Solver`] traits the dispatcher programs against, and [`CpuEngine`],
//! a small reference implementation that trains fully connected networks
//! on the host CPU.
//!
//! ## Overview
//!
//! Engine objects are shared as `Arc<parking_lot::Mutex<_>>`. The bridge
//! keeps strong references to the solvers and networks it hands out and
//! registers only weak references for everything else, so a layer or blob
//! lives exactly as long as the network that owns it.
//!
//! Network and solver definitions are TOML files. Weights, solver
//! snapshots and mean files are JSON (see [`record`]).
//!
//! ## Module Structure
//!
//! - [`engine`]: engine entry point
//! - [`net`]: network trait and the CPU network
//! - [`solver`]: solver trait and SGD
//! - [`layers`]: the closed set of layer kinds
//! - [`math`]: dense kernels
//! - [`record`]: on-disk records
//! - [`phase`]: train / test phase
//! - [`error`]: error types

pub mod engine;
pub mod error;
pub mod layers;
pub mod math;
pub mod net;
pub mod phase;
pub mod record;
pub mod solver;

use std::sync::Arc;

use netbridge_array::Blob;
use parking_lot::Mutex;

// Re-export main types for convenience
pub use engine::{CpuEngine, Engine, ENGINE_VERSION};
pub use error::{EngineError, EngineResult};
pub use layers::{Layer, LayerKind, LayerParams, LayerSpec};
pub use net::{CpuNet, InputSpec, NetSpec, Network};
pub use phase::Phase;
pub use record::{BlobRecord, NetWeights};
pub use solver::{LrPolicy, SgdSolver, Solver, SolverSpec};

/// Shared, lockable engine object
pub type Shared<T> = Arc<Mutex<T>>;

/// Shared tensor
pub type SharedBlob = Shared<Blob>;

/// Shared layer
pub type SharedLayer = Shared<Layer>;

/// Shared network behind the [`Network`] trait
pub type SharedNet = Arc<Mutex<dyn Network>>;

/// Shared solver behind the [`Solver`] trait
pub type SharedSolver = Arc<Mutex<dyn Solver>>;

/// Wrap a value for sharing
pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}
