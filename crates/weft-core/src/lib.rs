//! Security material lifecycle for a low-power mesh stack.
//!
//! This crate owns everything stateful about mesh security: the root
//! network key and the epoch sequence number, the derived per-epoch key
//! schedule, crash-safe frame counters, the packed security policy, and
//! the guarded rotation timer. The pure derivation and backend contract
//! live in `weft-crypto`; this crate drives them.
//!
//! The central type is [`KeyManager`], generic over three seams:
//!
//! - [`Environment`] supplies time, sleeping, and entropy, so rotation
//!   behavior is testable under virtual clocks.
//! - [`SettingsStore`] persists key records, counter high-water marks,
//!   and the security policy across reboots.
//! - [`Notifier`] broadcasts state-change events to the rest of the
//!   stack.
//!
//! # Crash-safe counters
//!
//! Outgoing frame counters must never repeat under a key. Persisting
//! every increment would wear out flash, so the store holds a high-water
//! mark some distance ahead of the live value, and a reboot resumes from
//! the mark. See [`FrameCounters`].

pub mod counters;
pub mod env;
pub mod error;
pub mod manager;
pub mod notifier;
pub mod policy;
pub mod rotation;
pub mod storage;

pub use counters::{COUNTER_STORE_AHEAD, CounterLayer, FrameCounters};
pub use env::{Environment, SystemEnv};
pub use error::KeyManagerError;
pub use manager::{KeyManager, LinkKeyTriple, NETWORK_KEY_REF, PSKC_REF};
pub use notifier::{Event, NeighborTable, Notifier, NullNotifier};
pub use policy::{
    DEFAULT_KEY_ROTATION_TIME, MIN_KEY_ROTATION_TIME, POLICY_FLAG_BYTES, PolicyError,
    SecurityPolicy,
};
pub use rotation::{DEFAULT_KEY_SWITCH_GUARD_TIME, GuardState, TICK_INTERVAL};
pub use storage::{KeySlot, MemoryStore, SettingsStore, StorageError, StoredKey};
