//! In-memory settings store
//!
//! Backs the [`SettingsStore`] contract with CBOR-encoded records in a
//! shared slot map. Used by tests and simulation; a real device would
//! implement the same trait over flash.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{KeySlot, SettingsStore, StorageError, StoredKey};
use crate::counters::CounterLayer;
use crate::policy::SecurityPolicy;

/// In-memory settings store for testing and simulation.
///
/// Records are CBOR-encoded into per-slot byte vectors, mirroring the
/// fixed-slot layout a flash-backed store would use. All state is behind
/// `Arc<Mutex<_>>` so clones share the same "flash": construct a second
/// manager over a clone to simulate a crash-and-restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    slots: Arc<Mutex<HashMap<u16, Vec<u8>>>>,
}

const SLOT_NETWORK_KEY: u16 = 0x01;
const SLOT_PSKC: u16 = 0x02;
const SLOT_COUNTER_BASE: u16 = 0x10;
const SLOT_POLICY: u16 = 0x20;

fn key_slot_id(slot: KeySlot) -> u16 {
    match slot {
        KeySlot::NetworkKey => SLOT_NETWORK_KEY,
        KeySlot::Pskc => SLOT_PSKC,
    }
}

fn counter_slot_id(layer: CounterLayer) -> u16 {
    let offset = match layer {
        CounterLayer::Link => 0,
        CounterLayer::Routing => 1,
        CounterLayer::Transport => 2,
    };
    SLOT_COUNTER_BASE + offset
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of written slots. Diagnostic accessor for tests.
    #[allow(clippy::expect_used)]
    pub fn slot_count(&self) -> usize {
        self.slots.lock().expect("settings mutex poisoned").len()
    }

    #[allow(clippy::expect_used)]
    fn write<T: serde::Serialize>(&self, slot: u16, value: &T) -> Result<(), StorageError> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(value, &mut bytes)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.slots.lock().expect("settings mutex poisoned").insert(slot, bytes);
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn read<T: serde::de::DeserializeOwned>(&self, slot: u16) -> Result<Option<T>, StorageError> {
        let slots = self.slots.lock().expect("settings mutex poisoned");
        let Some(bytes) = slots.get(&slot) else {
            return Ok(None);
        };
        ciborium::de::from_reader(bytes.as_slice())
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }
}

impl SettingsStore for MemoryStore {
    fn store_key_slot(&self, slot: KeySlot, record: &StoredKey) -> Result<(), StorageError> {
        self.write(key_slot_id(slot), record)
    }

    fn load_key_slot(&self, slot: KeySlot) -> Result<Option<StoredKey>, StorageError> {
        self.read(key_slot_id(slot))
    }

    fn store_frame_counter(&self, layer: CounterLayer, value: u32) -> Result<(), StorageError> {
        self.write(counter_slot_id(layer), &value)
    }

    fn load_frame_counter(&self, layer: CounterLayer) -> Result<Option<u32>, StorageError> {
        self.read(counter_slot_id(layer))
    }

    fn store_security_policy(&self, policy: &SecurityPolicy) -> Result<(), StorageError> {
        self.write(SLOT_POLICY, policy)
    }

    fn load_security_policy(&self) -> Result<Option<SecurityPolicy>, StorageError> {
        self.read(SLOT_POLICY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slots_read_as_none() {
        let store = MemoryStore::new();
        assert_eq!(store.load_key_slot(KeySlot::NetworkKey).unwrap(), None);
        assert_eq!(store.load_frame_counter(CounterLayer::Link).unwrap(), None);
        assert!(store.load_security_policy().unwrap().is_none());
    }

    #[test]
    fn key_records_round_trip() {
        let store = MemoryStore::new();

        store.store_key_slot(KeySlot::NetworkKey, &StoredKey::Literal([9u8; 16])).unwrap();
        store.store_key_slot(KeySlot::Pskc, &StoredKey::Reference(2)).unwrap();

        assert_eq!(
            store.load_key_slot(KeySlot::NetworkKey).unwrap(),
            Some(StoredKey::Literal([9u8; 16])),
        );
        assert_eq!(store.load_key_slot(KeySlot::Pskc).unwrap(), Some(StoredKey::Reference(2)));
    }

    #[test]
    fn counter_slots_are_per_layer() {
        let store = MemoryStore::new();

        store.store_frame_counter(CounterLayer::Link, 1000).unwrap();
        store.store_frame_counter(CounterLayer::Routing, 2000).unwrap();

        assert_eq!(store.load_frame_counter(CounterLayer::Link).unwrap(), Some(1000));
        assert_eq!(store.load_frame_counter(CounterLayer::Routing).unwrap(), Some(2000));
        assert_eq!(store.load_frame_counter(CounterLayer::Transport).unwrap(), None);
    }

    #[test]
    fn clones_share_storage() {
        let store = MemoryStore::new();
        let shared = store.clone();

        store.store_frame_counter(CounterLayer::Link, 42).unwrap();

        assert_eq!(shared.load_frame_counter(CounterLayer::Link).unwrap(), Some(42));
    }

    #[test]
    fn policy_round_trips() {
        let store = MemoryStore::new();
        let policy = SecurityPolicy { rotation_time_hours: 100, ..SecurityPolicy::default() };

        store.store_security_policy(&policy).unwrap();

        assert_eq!(store.load_security_policy().unwrap(), Some(policy));
    }
}
