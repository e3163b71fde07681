//! Host-Visible Handle Token
//!
//! The address half packs a slot number in its low 32 bits and the slot's
//! generation in its high 32 bits. Slot numbers start at 1, so a zeroed
//! token never names a slot.

use std::fmt;

/// Opaque `(address, epoch)` pair handed to the host.
///
/// Tokens carry no ownership. Comparing two tokens for equality is the
/// host's way of asking whether they name the same native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Token {
    address: u64,
    epoch: u64,
}

impl Token {
    /// Rebuild a token from the two values the host stored
    pub fn new(address: u64, epoch: u64) -> Self {
        Self { address, epoch }
    }

    pub(crate) fn from_slot(slot: u32, generation: u32, epoch: u64) -> Self {
        Self {
            address: (u64::from(generation) << 32) | u64::from(slot),
            epoch,
        }
    }

    /// Opaque address half
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Epoch the token was minted in
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Check if this is the all-zero token
    pub fn is_null(&self) -> bool {
        self.address == 0
    }

    pub(crate) fn slot(&self) -> u32 {
        (self.address & 0xFFFF_FFFF) as u32
    }

    pub(crate) fn generation(&self) -> u32 {
        (self.address >> 32) as u32
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:#x}@{}>", self.address, self.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_packing() {
        let token = Token::from_slot(5, 3, 99);
        assert_eq!(token.slot(), 5);
        assert_eq!(token.generation(), 3);
        assert_eq!(token.epoch(), 99);
        assert_eq!(token.address(), (3u64 << 32) | 5);
    }

    #[test]
    fn test_null_token() {
        assert!(Token::default().is_null());
        assert!(!Token::from_slot(1, 0, 1).is_null());
    }

    #[test]
    fn test_display() {
        assert_eq!(Token::new(0x10, 4).to_string(), "<0x10@4>");
    }
}
