//! Slot Arena and Epoch
//!
//! ## Lifetime rules
//!
//! - Minting a live object that already has a slot returns the same token.
//! - A slot whose entry reports itself dead is released: its generation
//!   is bumped and it goes back on the free list.
//! - [`HandleRegistry::reset`] empties every slot and draws a fresh epoch
//!   in `[1, 2^53)` that this registry has never used before.
//!
//! Epochs come from a counter pushed through a seeded permutation of the
//! 53-bit range, so they never repeat and no history is kept.
//!
//! Dead slots are collected lazily, when the free list runs dry and the
//! arena holds at least twice as many slots as were live at the last sweep.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{HandleError, HandleResult};
use crate::token::Token;

/// Exclusive upper bound for epochs; every epoch is exact as an `f64`
pub const MAX_EPOCH: u64 = 1 << 53;

const MIN_SWEEP: usize = 64;

const EPOCH_MASK: u64 = MAX_EPOCH - 1;

/// Entries a [`HandleRegistry`] can hold.
pub trait Slotted {
    /// Object kind tag
    type Kind: Copy + Eq + fmt::Display;

    /// Kind of the referenced object
    fn kind(&self) -> Self::Kind;

    /// Check if the referenced object still exists
    fn is_alive(&self) -> bool;
}

#[derive(Debug)]
struct Occupant<T> {
    key: usize,
    entry: T,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    occupant: Option<Occupant<T>>,
}

/// Seeded bijection over `[0, 2^53)` applied to a counter.
///
/// Each step (add, odd multiply, xor-shift) is invertible modulo `2^53`.
#[derive(Debug)]
struct EpochSequence {
    next: u64,
    offset: u64,
    mul_a: u64,
    mul_b: u64,
}

impl EpochSequence {
    fn new(rng: &mut StdRng) -> Self {
        Self {
            next: 0,
            offset: rng.gen::<u64>() & EPOCH_MASK,
            mul_a: (rng.gen::<u64>() & EPOCH_MASK) | 1,
            mul_b: (rng.gen::<u64>() & EPOCH_MASK) | 1,
        }
    }

    fn permute(&self, n: u64) -> u64 {
        let mut x = n.wrapping_add(self.offset) & EPOCH_MASK;
        x = x.wrapping_mul(self.mul_a) & EPOCH_MASK;
        x ^= x >> 29;
        x = x.wrapping_mul(self.mul_b) & EPOCH_MASK;
        x ^= x >> 32;
        x
    }

    /// Next epoch; distinct from all earlier ones for `2^53 - 1` draws
    fn draw(&mut self) -> u64 {
        loop {
            let epoch = self.permute(self.next);
            self.next = (self.next + 1) & EPOCH_MASK;
            if epoch != 0 {
                return epoch;
            }
        }
    }
}

/// Maps tokens to entries for the current epoch.
#[derive(Debug)]
pub struct HandleRegistry<T> {
    epoch: u64,
    epochs: EpochSequence,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    by_identity: FxHashMap<usize, u32>,
    sweep_at: usize,
}

impl<T: Slotted> HandleRegistry<T> {
    /// Create a registry with an entropy-seeded epoch source
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a registry with a deterministic epoch sequence
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut rng: StdRng) -> Self {
        let mut epochs = EpochSequence::new(&mut rng);
        Self {
            epoch: epochs.draw(),
            epochs,
            slots: Vec::new(),
            free: Vec::new(),
            by_identity: FxHashMap::default(),
            sweep_at: MIN_SWEEP,
        }
    }

    /// Current epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of occupied slots whose objects are still alive
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter_map(|slot| slot.occupant.as_ref())
            .filter(|occ| occ.entry.is_alive())
            .count()
    }

    /// Check if no live object is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots allocated in the arena
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Register an object and return its token.
    ///
    /// `key` identifies the object (typically its allocation address);
    /// minting the same live key again yields the same token.
    pub fn mint(&mut self, key: usize, entry: T) -> Token {
        if let Some(&idx) = self.by_identity.get(&key) {
            let slot = &self.slots[idx as usize];
            if slot.occupant.as_ref().is_some_and(|occ| occ.entry.is_alive()) {
                return Token::from_slot(idx + 1, slot.generation, self.epoch);
            }
            self.release(idx);
        }

        if self.free.is_empty() && self.slots.len() >= self.sweep_at {
            self.collect_dead();
        }

        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    occupant: None,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[idx as usize];
        slot.occupant = Some(Occupant { key, entry });
        self.by_identity.insert(key, idx);
        Token::from_slot(idx + 1, slot.generation, self.epoch)
    }

    /// Look up the entry a token refers to
    pub fn resolve(&self, token: Token) -> HandleResult<&T> {
        if token.epoch() != self.epoch {
            debug!(%token, current = self.epoch, "rejected token from another epoch");
            return Err(HandleError::EpochMismatch {
                token,
                current: self.epoch,
            });
        }

        token
            .slot()
            .checked_sub(1)
            .and_then(|idx| self.slots.get(idx as usize))
            .filter(|slot| slot.generation == token.generation())
            .and_then(|slot| slot.occupant.as_ref())
            .filter(|occ| occ.entry.is_alive())
            .map(|occ| &occ.entry)
            .ok_or_else(|| {
                debug!(%token, "rejected dangling token");
                HandleError::Dangling { token }
            })
    }

    /// Look up a token and require a specific object kind
    pub fn resolve_as(&self, token: Token, kind: T::Kind) -> HandleResult<&T> {
        let entry = self.resolve(token)?;
        let actual = entry.kind();
        if actual != kind {
            debug!(%token, expected = %kind, actual = %actual, "rejected token of wrong kind");
            return Err(HandleError::wrong_kind(token, kind, actual));
        }
        Ok(entry)
    }

    /// Check if a token currently resolves
    pub fn contains(&self, token: Token) -> bool {
        self.resolve(token).is_ok()
    }

    /// Release every slot whose object has died. Returns how many were freed.
    pub fn collect_dead(&mut self) -> usize {
        let dead: Vec<u32> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                slot.occupant
                    .as_ref()
                    .is_some_and(|occ| !occ.entry.is_alive())
            })
            .map(|(idx, _)| idx as u32)
            .collect();
        for &idx in &dead {
            self.release(idx);
        }
        let live = self.slots.len() - self.free.len();
        self.sweep_at = (live * 2).max(MIN_SWEEP);
        dead.len()
    }

    /// Drop every entry and move to a fresh epoch.
    ///
    /// Returns the number of live entries that were registered.
    pub fn reset(&mut self) -> usize {
        let live = self.len();
        self.slots.clear();
        self.free.clear();
        self.by_identity.clear();
        self.sweep_at = MIN_SWEEP;
        self.epoch = self.epochs.draw();
        live
    }

    fn release(&mut self, idx: u32) {
        let slot = &mut self.slots[idx as usize];
        if let Some(occ) = slot.occupant.take() {
            if self.by_identity.get(&occ.key) == Some(&idx) {
                self.by_identity.remove(&occ.key);
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(idx);
        }
    }
}

impl<T: Slotted> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
