//! # netbridge handle registry
//!
//! Opaque tokens that let a host runtime hold references to native
//! objects without owning them.
//!
//! ## Overview
//!
//! A [`Token`] is an `(address, epoch)` pair. The address names a slot in
//! the registry's arena together with that slot's generation; the epoch
//! is a random value shared by every token minted since the last
//! [`HandleRegistry::reset`]. A token resolves only while both still
//! match, so resetting the registry invalidates everything the host holds
//! in one step, and a slot reused after its object died never answers to
//! an older token.
//!
//! The registry stores whatever entry type the caller chooses through the
//! [`Slotted`] trait. Entries are expected to be weak references: the
//! registry never keeps an object alive.
//!
//! ## Module Structure
//!
//! - [`token`]: the host-visible token
//! - [`registry`]: slot arena, epoch and identity index
//! - [`error`]: error types

pub mod error;
pub mod registry;
pub mod token;

// Re-export main types for convenience
pub use error::{HandleError, HandleResult};
pub use registry::{HandleRegistry, Slotted, MAX_EPOCH};
pub use token::Token;
