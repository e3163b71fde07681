//! Registry Entries
//!
//! The registry stores a weak reference per token. The identity key is
//! the address of the shared allocation, which stays reserved for as long
//! as any weak reference to it exists, so two live objects never share a
//! key.

use std::fmt;
use std::sync::{Arc, Weak};

use netbridge_array::Blob;
use netbridge_engine::{Layer, Network, SharedBlob, SharedLayer, SharedNet, SharedSolver, Solver};
use netbridge_handle::Slotted;
use parking_lot::Mutex;

/// Kind of native object behind a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Solver
    Solver,
    /// Network
    Net,
    /// Layer
    Layer,
    /// Tensor
    Blob,
}

impl ObjectKind {
    /// Lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Solver => "solver",
            ObjectKind::Net => "net",
            ObjectKind::Layer => "layer",
            ObjectKind::Blob => "blob",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Weak reference to a native object.
#[derive(Debug, Clone)]
pub enum NativeObject {
    /// Solver
    Solver(Weak<Mutex<dyn Solver>>),
    /// Network
    Net(Weak<Mutex<dyn Network>>),
    /// Layer
    Layer(Weak<Mutex<Layer>>),
    /// Tensor
    Blob(Weak<Mutex<Blob>>),
}

fn identity<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as *const () as usize
}

impl NativeObject {
    /// Identity key and entry for a solver
    pub fn solver(solver: &SharedSolver) -> (usize, Self) {
        (identity(solver), NativeObject::Solver(Arc::downgrade(solver)))
    }

    /// Identity key and entry for a network
    pub fn net(net: &SharedNet) -> (usize, Self) {
        (identity(net), NativeObject::Net(Arc::downgrade(net)))
    }

    /// Identity key and entry for a layer
    pub fn layer(layer: &SharedLayer) -> (usize, Self) {
        (identity(layer), NativeObject::Layer(Arc::downgrade(layer)))
    }

    /// Identity key and entry for a tensor
    pub fn blob(blob: &SharedBlob) -> (usize, Self) {
        (identity(blob), NativeObject::Blob(Arc::downgrade(blob)))
    }

    /// Upgrade to a solver
    pub fn upgrade_solver(&self) -> Option<SharedSolver> {
        match self {
            NativeObject::Solver(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// Upgrade to a network
    pub fn upgrade_net(&self) -> Option<SharedNet> {
        match self {
            NativeObject::Net(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// Upgrade to a layer
    pub fn upgrade_layer(&self) -> Option<SharedLayer> {
        match self {
            NativeObject::Layer(weak) => weak.upgrade(),
            _ => None,
        }
    }

    /// Upgrade to a tensor
    pub fn upgrade_blob(&self) -> Option<SharedBlob> {
        match self {
            NativeObject::Blob(weak) => weak.upgrade(),
            _ => None,
        }
    }
}

impl Slotted for NativeObject {
    type Kind = ObjectKind;

    fn kind(&self) -> ObjectKind {
        match self {
            NativeObject::Solver(_) => ObjectKind::Solver,
            NativeObject::Net(_) => ObjectKind::Net,
            NativeObject::Layer(_) => ObjectKind::Layer,
            NativeObject::Blob(_) => ObjectKind::Blob,
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            NativeObject::Solver(weak) => weak.strong_count() > 0,
            NativeObject::Net(weak) => weak.strong_count() > 0,
            NativeObject::Layer(weak) => weak.strong_count() > 0,
            NativeObject::Blob(weak) => weak.strong_count() > 0,
        }
    }
}
