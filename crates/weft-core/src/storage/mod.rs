//! Settings storage abstraction
//!
//! The key manager defines the persisted-state invariants; an external
//! store performs the I/O. The layout is fixed slots: one per persistent
//! key (network key, PSKc), one per frame-counter high-water mark, one
//! for the security policy. The trait is synchronous: storage writes
//! happen inline on the single logical thread, before the triggering
//! operation returns.

mod error;
mod memory;

pub use error::StorageError;
pub use memory::MemoryStore;
use serde::{Deserialize, Serialize};

use crate::counters::CounterLayer;
use crate::policy::SecurityPolicy;

/// Fixed key slots in the settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySlot {
    /// The network root key.
    NetworkKey,
    /// The pre-shared commissioning key.
    Pskc,
}

/// A persisted key record: literal bytes, or the reference identifier of
/// a secret held in the backend secure store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredKey {
    /// Literal key bytes.
    Literal([u8; 16]),
    /// Backend key-reference identifier.
    Reference(u32),
}

/// Non-volatile settings store for security material.
///
/// Implementations are `Clone`-shared: clones access the same underlying
/// storage, which lets a test hand the "same flash" to a second manager
/// instance to simulate a restart.
pub trait SettingsStore: Clone + Send + Sync + 'static {
    /// Writes a key record into its slot, replacing any previous record.
    fn store_key_slot(&self, slot: KeySlot, record: &StoredKey) -> Result<(), StorageError>;

    /// Reads a key slot. `None` when the slot has never been written.
    fn load_key_slot(&self, slot: KeySlot) -> Result<Option<StoredKey>, StorageError>;

    /// Writes a frame-counter high-water mark.
    fn store_frame_counter(&self, layer: CounterLayer, value: u32) -> Result<(), StorageError>;

    /// Reads a frame-counter high-water mark. `None` when never written.
    fn load_frame_counter(&self, layer: CounterLayer) -> Result<Option<u32>, StorageError>;

    /// Writes the security policy.
    fn store_security_policy(&self, policy: &SecurityPolicy) -> Result<(), StorageError>;

    /// Reads the security policy. `None` when never written.
    fn load_security_policy(&self) -> Result<Option<SecurityPolicy>, StorageError>;
}
