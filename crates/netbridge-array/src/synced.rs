//! Host/Device Synchronised Buffer
//!
//! Each tensor buffer has a host-resident copy and a device-resident copy.
//! Only one of them is authoritative at a time; the [`SyncHead`] records
//! which. Reading a side that is behind copies the other side over first,
//! and taking a mutable view of a side makes it the only current one.
//!
//! The device side is an in-process allocation; a real accelerator
//! backend would put a device pointer behind the same state machine.

use std::fmt;

/// Which side of a [`SyncedBuffer`] currently holds valid data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncHead {
    /// Nothing allocated yet; first access zero-fills
    Uninitialized,
    /// Host side is current, device side is stale
    AtHost,
    /// Device side is current, host side is stale
    AtDevice,
    /// Both sides hold identical data
    Synced,
}

impl fmt::Display for SyncHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncHead::Uninitialized => write!(f, "uninitialized"),
            SyncHead::AtHost => write!(f, "host"),
            SyncHead::AtDevice => write!(f, "device"),
            SyncHead::Synced => write!(f, "synced"),
        }
    }
}

/// Buffer of `f32` elements mirrored between host and device memory.
#[derive(Debug, Clone)]
pub struct SyncedBuffer {
    len: usize,
    host: Vec<f32>,
    device: Vec<f32>,
    head: SyncHead,
    transfers: u64,
}

impl SyncedBuffer {
    /// Create an unallocated buffer of `len` elements
    pub fn new(len: usize) -> Self {
        Self {
            len,
            host: Vec::new(),
            device: Vec::new(),
            head: SyncHead::Uninitialized,
            transfers: 0,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current head state
    pub fn head(&self) -> SyncHead {
        self.head
    }

    /// Number of host⇄device copies performed so far
    pub fn transfers(&self) -> u64 {
        self.transfers
    }

    /// Host-side view, syncing from the device if it is ahead
    pub fn host_data(&mut self) -> &[f32] {
        self.sync_to_host();
        &self.host
    }

    /// Mutable host-side view; the device side becomes stale
    pub fn mutable_host_data(&mut self) -> &mut [f32] {
        self.sync_to_host();
        self.head = SyncHead::AtHost;
        &mut self.host
    }

    /// Device-side view, syncing from the host if it is ahead
    pub fn device_data(&mut self) -> &[f32] {
        self.sync_to_device();
        &self.device
    }

    /// Mutable device-side view; the host side becomes stale
    pub fn mutable_device_data(&mut self) -> &mut [f32] {
        self.sync_to_device();
        self.head = SyncHead::AtDevice;
        &mut self.device
    }

    fn sync_to_host(&mut self) {
        match self.head {
            SyncHead::Uninitialized => {
                self.host = vec![0.0; self.len];
                self.head = SyncHead::AtHost;
            }
            SyncHead::AtDevice => {
                if self.host.len() != self.len {
                    self.host = vec![0.0; self.len];
                }
                self.host.copy_from_slice(&self.device);
                self.transfers += 1;
                self.head = SyncHead::Synced;
            }
            SyncHead::AtHost | SyncHead::Synced => {}
        }
    }

    fn sync_to_device(&mut self) {
        match self.head {
            SyncHead::Uninitialized => {
                self.device = vec![0.0; self.len];
                self.head = SyncHead::AtDevice;
            }
            SyncHead::AtHost => {
                if self.device.len() != self.len {
                    self.device = vec![0.0; self.len];
                }
                self.device.copy_from_slice(&self.host);
                self.transfers += 1;
                self.head = SyncHead::Synced;
            }
            SyncHead::AtDevice | SyncHead::Synced => {}
        }
    }
}
