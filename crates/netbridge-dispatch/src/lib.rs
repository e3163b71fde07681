//! # netbridge dispatch
//!
//! The host-facing half of the bridge. A host runtime calls one entry
//! point with a command name and a list of [`HostValue`]s; the
//! [`Dispatcher`] routes the call to a handler, which resolves handles
//! through the [`BridgeContext`], marshals arrays and drives the engine.
//!
//! ## Overview
//!
//! ```text
//! host call ──▶ Dispatcher ──▶ handler ──▶ BridgeContext ──▶ Engine
//!                                │            │
//!                                │            ├── HandleRegistry (tokens)
//!                                │            └── ModeState (cpu / gpu)
//!                                └── Args / FromHost / ToHost
//! ```
//!
//! Tokens handed to the host stay valid until the next `reset`, which
//! releases every solver and network the bridge owns and changes the
//! epoch.
//!
//! ## Module Structure
//!
//! - [`dispatcher`]: command table and routing
//! - [`commands`]: the built-in handlers
//! - [`context`]: per-instance state
//! - [`shared`]: thread-safe wrapper for multi-threaded hosts
//! - [`conversion`]: argument extraction and result conversion
//! - [`value`]: host value model
//! - [`object`]: registered object kinds
//! - [`config`]: bridge configuration
//! - [`error`]: error types

pub mod commands;
pub mod config;
pub mod context;
pub mod conversion;
pub mod dispatcher;
pub mod error;
pub mod object;
pub mod shared;
pub mod value;

// Re-export main types for convenience
pub use config::BridgeConfig;
pub use context::BridgeContext;
pub use conversion::{Args, FromHost, ToHost};
pub use dispatcher::{Command, Dispatcher, Handler};
pub use error::{BridgeError, BridgeResult};
pub use object::{NativeObject, ObjectKind};
pub use shared::SharedBridge;
pub use value::{HostStruct, HostValue};

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
