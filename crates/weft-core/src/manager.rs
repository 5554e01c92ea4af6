//! Security material lifecycle management
//!
//! [`KeyManager`] owns the root network key, the per-epoch key schedule
//! derived from it, the frame counters that ride alongside those keys,
//! and the rotation timer that advances the epoch on schedule. It is the
//! single writer for all of this state; readers go through accessors.
//!
//! In [`CryptoMode::KeyRefs`] the manager holds opaque backend
//! references instead of raw bytes. Fixed slots hold the long-lived
//! persistent material (root key, PSKc); everything derived is imported
//! as a volatile key and destroyed before its replacement lands.

use std::sync::Arc;

use weft_crypto::{
    CryptoBackend, CryptoError, CryptoMode, ImportRequest, Key, KeyAlgorithm, KeyBytes,
    KeyPersistence, KeyRef, KeyType, KeyUsage, Kek, NetworkKey, Pskc, KEY_SIZE,
    derive_epoch_keys, derive_transport_key,
};

use crate::counters::{CounterLayer, FrameCounters, COUNTER_STORE_AHEAD};
use crate::env::Environment;
use crate::error::KeyManagerError;
use crate::notifier::{Event, NeighborTable, Notifier};
use crate::policy::{SecurityPolicy, MIN_KEY_ROTATION_TIME};
use crate::rotation::{GuardState, RotationTimer};
use crate::storage::{KeySlot, SettingsStore, StoredKey};

/// Fixed persistent backend slot for the root network key.
pub const NETWORK_KEY_REF: KeyRef = KeyRef(1);

/// Fixed persistent backend slot for the PSKc.
pub const PSKC_REF: KeyRef = KeyRef(2);

/// The three-epoch link key window kept live for neighbor clock skew.
#[derive(Debug, Clone)]
pub struct LinkKeyTriple {
    /// Link key for the previous epoch.
    pub previous: Key,
    /// Link key for the current epoch.
    pub current: Key,
    /// Link key for the next epoch.
    pub next: Key,
}

/// Owner of the security material lifecycle.
///
/// Generic over the runtime environment (time and entropy), the settings
/// store (crash-safe persistence), and the notifier (change signals to
/// the rest of the stack).
pub struct KeyManager<E: Environment, S: SettingsStore, N: Notifier> {
    mode: CryptoMode,
    backend: Arc<dyn CryptoBackend>,
    store: S,
    notifier: N,
    env: E,
    neighbors: Option<Box<dyn NeighborTable>>,

    network_key: Key,
    key_sequence: u32,
    link_keys: LinkKeyTriple,
    routing_key: Key,
    transport_key: KeyBytes,
    temporary_routing_key: Option<Key>,
    kek: Option<Kek>,
    pskc: Option<Pskc>,

    counters: FrameCounters,
    security_policy: SecurityPolicy,
    rotation: RotationTimer<E::Instant>,
}

impl<E: Environment, S: SettingsStore, N: Notifier> KeyManager<E, S, N> {
    /// Brings up the security material state.
    ///
    /// Initializes the backend, then establishes the root network key:
    /// reloading persisted material when present, generating and
    /// persisting fresh random material otherwise. Derives the full key
    /// schedule for sequence 0 and restores frame counter high-water
    /// marks, so counters resume past any value that may have been used
    /// before a crash.
    pub fn new(
        mode: CryptoMode,
        backend: Arc<dyn CryptoBackend>,
        store: S,
        notifier: N,
        env: E,
    ) -> Result<Self, KeyManagerError> {
        backend.init()?;

        let network_key = Self::establish_network_key(mode, backend.as_ref(), &store, &env)?;
        let security_policy = store.load_security_policy()?.unwrap_or_default();
        let pskc = Self::reload_pskc(mode, backend.as_ref(), &store)?;

        let mut manager = Self {
            mode,
            backend,
            store,
            notifier,
            env,
            neighbors: None,
            network_key,
            key_sequence: 0,
            link_keys: LinkKeyTriple {
                previous: Key::Ref(KeyRef::NULL),
                current: Key::Ref(KeyRef::NULL),
                next: Key::Ref(KeyRef::NULL),
            },
            routing_key: Key::Ref(KeyRef::NULL),
            transport_key: KeyBytes::new([0; KEY_SIZE]),
            temporary_routing_key: None,
            kek: None,
            pskc,
            counters: FrameCounters::new(),
            security_policy,
            rotation: RotationTimer::new(),
        };

        manager.update_key_material()?;
        manager.restore_frame_counters()?;
        Ok(manager)
    }

    /// Registers the neighbor table whose per-neighbor security state is
    /// reset when the root key is replaced.
    pub fn set_neighbor_table(&mut self, neighbors: Box<dyn NeighborTable>) {
        self.neighbors = Some(neighbors);
    }

    fn establish_network_key(
        mode: CryptoMode,
        backend: &dyn CryptoBackend,
        store: &S,
        env: &E,
    ) -> Result<Key, KeyManagerError> {
        match mode {
            CryptoMode::LiteralKeys => match store.load_key_slot(KeySlot::NetworkKey)? {
                Some(StoredKey::Literal(bytes)) => Ok(Key::literal(bytes)),
                Some(StoredKey::Reference(_)) => Err(KeyManagerError::InvalidKeyMaterial {
                    reason: "reference key record found in literal-key mode",
                }),
                None => {
                    let mut bytes = [0u8; KEY_SIZE];
                    env.random_bytes(&mut bytes);
                    store.store_key_slot(KeySlot::NetworkKey, &StoredKey::Literal(bytes))?;
                    tracing::info!("generated fresh network key");
                    Ok(Key::literal(bytes))
                }
            },
            CryptoMode::KeyRefs => match backend.key_attributes(NETWORK_KEY_REF) {
                Ok(_) => Ok(Key::Ref(NETWORK_KEY_REF)),
                Err(CryptoError::NotFound { .. }) => {
                    let mut bytes = [0u8; KEY_SIZE];
                    env.random_bytes(&mut bytes);
                    let key_ref = backend.import_key(&ImportRequest {
                        key_type: KeyType::Hmac,
                        algorithm: KeyAlgorithm::HmacSha256,
                        usage: KeyUsage::SIGN_HASH | KeyUsage::EXPORT,
                        persistence: KeyPersistence::Persistent,
                        bytes: &bytes,
                        preferred_ref: Some(NETWORK_KEY_REF),
                    })?;
                    store.store_key_slot(KeySlot::NetworkKey, &StoredKey::Reference(key_ref.0))?;
                    tracing::info!("generated fresh network key in secure slot");
                    Ok(Key::Ref(key_ref))
                }
                Err(err) => Err(err.into()),
            },
        }
    }

    fn reload_pskc(
        mode: CryptoMode,
        backend: &dyn CryptoBackend,
        store: &S,
    ) -> Result<Option<Pskc>, KeyManagerError> {
        match mode {
            CryptoMode::LiteralKeys => match store.load_key_slot(KeySlot::Pskc)? {
                Some(StoredKey::Literal(bytes)) => Ok(Some(Pskc(Key::literal(bytes)))),
                Some(StoredKey::Reference(_)) => Err(KeyManagerError::InvalidKeyMaterial {
                    reason: "reference PSKc record found in literal-key mode",
                }),
                None => Ok(None),
            },
            CryptoMode::KeyRefs => match backend.key_attributes(PSKC_REF) {
                Ok(_) => Ok(Some(Pskc(Key::Ref(PSKC_REF)))),
                Err(CryptoError::NotFound { .. }) => Ok(None),
                Err(err) => Err(err.into()),
            },
        }
    }

    // -- key schedule ----------------------------------------------------

    /// Current epoch sequence number.
    pub fn current_key_sequence(&self) -> u32 {
        self.key_sequence
    }

    /// 7-bit on-air key index for the current epoch, in the 1..=128 range.
    pub fn key_index(&self) -> u8 {
        ((self.key_sequence & 0x7f) + 1) as u8
    }

    /// Link keys for the previous, current, and next epoch.
    pub fn link_key_triple(&self) -> &LinkKeyTriple {
        &self.link_keys
    }

    /// Routing key for the current epoch.
    pub fn routing_key(&self) -> &Key {
        &self.routing_key
    }

    /// Transport key for the current epoch, always literal bytes.
    pub fn transport_key(&self) -> &KeyBytes {
        &self.transport_key
    }

    /// Moves to a new epoch sequence.
    ///
    /// Setting the current value is a no-op. An adjacent move (one step
    /// forward or backward) while the rotation timer runs goes through
    /// the guard state machine: inside the guard window it is rejected,
    /// past the window it restarts the timer and stays guarded. Any other
    /// jump (out-of-window resync, or any change while the timer is
    /// stopped) is applied unconditionally.
    ///
    /// The backward step is guarded for the same reason the forward one
    /// is: applying it zeroes the frame counters under keys that were
    /// already in use one epoch ago.
    pub fn set_current_key_sequence(&mut self, sequence: u32) -> Result<(), KeyManagerError> {
        if sequence == self.key_sequence {
            return Ok(());
        }

        let adjacent = sequence == self.key_sequence.wrapping_add(1)
            || sequence == self.key_sequence.wrapping_sub(1);
        if adjacent && self.rotation.is_running() {
            if self.rotation.guard_state() == GuardState::Guarded {
                let elapsed_hours = self.rotation.elapsed_hours();
                let guard_hours = self.rotation.guard_time_hours();
                if elapsed_hours < guard_hours {
                    tracing::debug!(
                        sequence,
                        elapsed_hours,
                        guard_hours,
                        "sequence advance rejected inside guard window"
                    );
                    return Err(KeyManagerError::GuardTimeNotElapsed {
                        elapsed_hours,
                        guard_hours,
                    });
                }
                // Guard time has passed: restart the hour count before the
                // new epoch takes effect.
                self.rotation.start(self.env.now());
            }
            self.rotation.set_guarded();
        }

        self.key_sequence = sequence;
        self.update_key_material()?;
        self.reset_frame_counters()?;
        self.notifier.signal(Event::KeySequenceChanged);
        tracing::debug!(sequence, "key sequence updated");
        Ok(())
    }

    /// Re-derives the full key schedule for the current sequence.
    ///
    /// In key-reference mode the previous epoch's volatile references are
    /// destroyed before the replacements are imported, so the backend
    /// never accumulates stale derived keys.
    fn update_key_material(&mut self) -> Result<(), KeyManagerError> {
        let seq = self.key_sequence;
        let previous =
            derive_epoch_keys(self.backend.as_ref(), &self.network_key, seq.wrapping_sub(1))?;
        let current = derive_epoch_keys(self.backend.as_ref(), &self.network_key, seq)?;
        let next =
            derive_epoch_keys(self.backend.as_ref(), &self.network_key, seq.wrapping_add(1))?;

        self.destroy_schedule_refs();

        self.link_keys = LinkKeyTriple {
            previous: self.install_derived_key(previous.link_key)?,
            current: self.install_derived_key(current.link_key)?,
            next: self.install_derived_key(next.link_key)?,
        };
        self.routing_key = self.install_derived_key(current.routing_key)?;
        self.transport_key = derive_transport_key(self.backend.as_ref(), &self.network_key, seq)?;
        Ok(())
    }

    /// Wraps freshly derived bytes in the representation the active mode
    /// calls for.
    fn install_derived_key(&self, bytes: KeyBytes) -> Result<Key, KeyManagerError> {
        match self.mode {
            CryptoMode::LiteralKeys => Ok(Key::Literal(bytes)),
            CryptoMode::KeyRefs => {
                let key_ref = self.import_volatile_aes(&bytes, KeyUsage::ENCRYPT | KeyUsage::DECRYPT)?;
                Ok(Key::Ref(key_ref))
            }
        }
    }

    fn import_volatile_aes(
        &self,
        bytes: &KeyBytes,
        usage: KeyUsage,
    ) -> Result<KeyRef, KeyManagerError> {
        let key_ref = self.backend.import_key(&ImportRequest {
            key_type: KeyType::Aes,
            algorithm: KeyAlgorithm::AesEcb,
            usage,
            persistence: KeyPersistence::Volatile,
            bytes: bytes.as_bytes(),
            preferred_ref: None,
        })?;
        Ok(key_ref)
    }

    /// Destroys the volatile references of the derived schedule. No-op in
    /// literal mode, where every reference is null.
    fn destroy_schedule_refs(&self) {
        self.backend.destroy_key(self.link_keys.previous.key_ref());
        self.backend.destroy_key(self.link_keys.current.key_ref());
        self.backend.destroy_key(self.link_keys.next.key_ref());
        self.backend.destroy_key(self.routing_key.key_ref());
    }

    // -- root key and PSKc -----------------------------------------------

    /// Root network key, in the active mode's representation.
    pub fn network_key(&self) -> &Key {
        &self.network_key
    }

    /// Replaces the root network key.
    ///
    /// Supplying the bytes the manager already holds is a no-op. A real
    /// change resets the epoch sequence to zero, re-derives the schedule,
    /// zeroes the frame counters, and resets per-neighbor security state.
    pub fn set_network_key(&mut self, key: NetworkKey) -> Result<(), KeyManagerError> {
        let NetworkKey(Key::Literal(bytes)) = key else {
            return Err(KeyManagerError::InvalidKeyMaterial {
                reason: "network key must be supplied as literal bytes",
            });
        };

        if let Key::Literal(current) = &self.network_key {
            if *current == bytes {
                return Ok(());
            }
        }

        self.notifier.signal(Event::NetworkKeyChanged);
        self.notifier.signal(Event::KeySequenceChanged);

        match self.mode {
            CryptoMode::LiteralKeys => {
                self.store
                    .store_key_slot(KeySlot::NetworkKey, &StoredKey::Literal(*bytes.as_bytes()))?;
                self.network_key = Key::Literal(bytes);
            }
            CryptoMode::KeyRefs => {
                self.backend.destroy_key(NETWORK_KEY_REF);
                let key_ref = self.backend.import_key(&ImportRequest {
                    key_type: KeyType::Hmac,
                    algorithm: KeyAlgorithm::HmacSha256,
                    usage: KeyUsage::SIGN_HASH | KeyUsage::EXPORT,
                    persistence: KeyPersistence::Persistent,
                    bytes: bytes.as_bytes(),
                    preferred_ref: Some(NETWORK_KEY_REF),
                })?;
                self.store
                    .store_key_slot(KeySlot::NetworkKey, &StoredKey::Reference(key_ref.0))?;
                self.network_key = Key::Ref(key_ref);
            }
        }

        self.key_sequence = 0;
        self.update_key_material()?;
        self.reset_frame_counters()?;
        if let Some(neighbors) = &self.neighbors {
            neighbors.reset_security_state();
        }
        tracing::info!("network key replaced, epoch sequence reset");
        Ok(())
    }

    /// Copies the root network key out of the backend.
    pub fn export_network_key(&self) -> Result<KeyBytes, KeyManagerError> {
        self.export_key(&self.network_key)
    }

    /// Currently provisioned PSKc, if any.
    pub fn pskc(&self) -> Option<&Pskc> {
        self.pskc.as_ref()
    }

    /// Whether a PSKc has been provisioned.
    pub fn is_pskc_set(&self) -> bool {
        self.pskc.is_some()
    }

    /// Provisions the commissioning PSKc.
    ///
    /// Re-provisioning the bytes already held is a full no-op: no store
    /// write, no backend slot churn, no signal.
    pub fn set_pskc(&mut self, pskc: Pskc) -> Result<(), KeyManagerError> {
        let Pskc(Key::Literal(bytes)) = pskc else {
            return Err(KeyManagerError::InvalidKeyMaterial {
                reason: "PSKc must be supplied as literal bytes",
            });
        };

        // A stored PSKc that cannot be read back is treated as changed.
        let changed = match self.export_pskc() {
            Ok(Some(current)) => current != bytes,
            Ok(None) | Err(_) => true,
        };
        if !changed {
            return Ok(());
        }

        match self.mode {
            CryptoMode::LiteralKeys => {
                self.store
                    .store_key_slot(KeySlot::Pskc, &StoredKey::Literal(*bytes.as_bytes()))?;
                self.pskc = Some(Pskc(Key::Literal(bytes)));
            }
            CryptoMode::KeyRefs => {
                self.backend.destroy_key(PSKC_REF);
                let key_ref = self.backend.import_key(&ImportRequest {
                    key_type: KeyType::Raw,
                    algorithm: KeyAlgorithm::Vendor,
                    usage: KeyUsage::EXPORT,
                    persistence: KeyPersistence::Persistent,
                    bytes: bytes.as_bytes(),
                    preferred_ref: Some(PSKC_REF),
                })?;
                self.store
                    .store_key_slot(KeySlot::Pskc, &StoredKey::Reference(key_ref.0))?;
                self.pskc = Some(Pskc(Key::Ref(key_ref)));
            }
        }

        self.notifier.signal(Event::PskcChanged);
        Ok(())
    }

    /// Copies the PSKc out of the backend, if one is provisioned.
    pub fn export_pskc(&self) -> Result<Option<KeyBytes>, KeyManagerError> {
        match &self.pskc {
            Some(Pskc(key)) => Ok(Some(self.export_key(key)?)),
            None => Ok(None),
        }
    }

    fn export_key(&self, key: &Key) -> Result<KeyBytes, KeyManagerError> {
        match key {
            Key::Literal(bytes) => Ok(bytes.clone()),
            Key::Ref(key_ref) => {
                let mut out = [0u8; KEY_SIZE];
                let len = self.backend.export_key(*key_ref, &mut out)?;
                if len != KEY_SIZE {
                    return Err(CryptoError::Failed {
                        operation: "exported key has unexpected length",
                    }
                    .into());
                }
                Ok(KeyBytes::new(out))
            }
        }
    }

    // -- KEK --------------------------------------------------------------

    /// Key-establishment key from the most recent commissioning exchange.
    pub fn kek(&self) -> Option<&Kek> {
        self.kek.as_ref()
    }

    /// Installs a fresh KEK and zeroes its frame counter.
    pub fn set_kek(&mut self, kek: [u8; KEY_SIZE]) -> Result<(), KeyManagerError> {
        let key = match self.mode {
            CryptoMode::LiteralKeys => Key::literal(kek),
            CryptoMode::KeyRefs => {
                if let Some(Kek(old)) = self.kek.take() {
                    self.backend.destroy_key(old.key_ref());
                }
                let key_ref = self.import_volatile_aes(
                    &KeyBytes::new(kek),
                    KeyUsage::ENCRYPT | KeyUsage::DECRYPT | KeyUsage::EXPORT,
                )?;
                Key::Ref(key_ref)
            }
        };
        self.kek = Some(Kek(key));
        self.counters.reset_kek();
        Ok(())
    }

    /// Copies the KEK out of the backend, if one is installed.
    pub fn export_kek(&self) -> Result<Option<KeyBytes>, KeyManagerError> {
        match &self.kek {
            Some(Kek(key)) => Ok(Some(self.export_key(key)?)),
            None => Ok(None),
        }
    }

    /// Current KEK frame counter.
    pub fn kek_frame_counter(&self) -> u32 {
        self.counters.kek()
    }

    /// Consumes the next KEK frame counter value. The KEK is short-lived,
    /// so this counter is never persisted.
    pub fn increment_kek_frame_counter(&mut self) -> u32 {
        self.counters.increment_kek()
    }

    // -- temporary keys ---------------------------------------------------

    /// Derives the routing key for an arbitrary sequence without touching
    /// the current schedule. In key-reference mode the previous temporary
    /// reference is destroyed first; at most one lives at a time.
    pub fn temporary_routing_key(&mut self, sequence: u32) -> Result<Key, KeyManagerError> {
        let keys = derive_epoch_keys(self.backend.as_ref(), &self.network_key, sequence)?;
        let key = match self.mode {
            CryptoMode::LiteralKeys => Key::Literal(keys.routing_key),
            CryptoMode::KeyRefs => {
                if let Some(old) = self.temporary_routing_key.take() {
                    self.backend.destroy_key(old.key_ref());
                }
                Key::Ref(self.import_volatile_aes(
                    &keys.routing_key,
                    KeyUsage::ENCRYPT | KeyUsage::DECRYPT,
                )?)
            }
        };
        self.temporary_routing_key = Some(key.clone());
        Ok(key)
    }

    /// Derives the transport key for an arbitrary sequence. Always
    /// literal bytes, like the scheduled transport key.
    pub fn temporary_transport_key(&self, sequence: u32) -> Result<KeyBytes, KeyManagerError> {
        derive_transport_key(self.backend.as_ref(), &self.network_key, sequence).map_err(Into::into)
    }

    // -- frame counters ---------------------------------------------------

    /// Current live counter for a layer.
    pub fn frame_counter(&self, layer: CounterLayer) -> u32 {
        self.counters.live(layer)
    }

    /// Consumes the next outgoing counter value for a layer, persisting a
    /// new high-water mark whenever the live value catches up with the
    /// stored one.
    pub fn increment_frame_counter(&mut self, layer: CounterLayer) -> Result<u32, KeyManagerError> {
        let (value, due) = self.counters.increment(layer);
        if due {
            let mark = value.wrapping_add(COUNTER_STORE_AHEAD);
            self.store.store_frame_counter(layer, mark)?;
            self.counters.set_stored(layer, mark);
            tracing::debug!(?layer, mark, "frame counter high-water mark persisted");
        }
        Ok(value)
    }

    /// Bulk-sets the live link-layer counters (link and transport) to a
    /// value learned out of band.
    pub fn set_all_link_frame_counters(&mut self, value: u32) {
        self.counters.set_live(CounterLayer::Link, value);
        self.counters.set_live(CounterLayer::Transport, value);
    }

    fn restore_frame_counters(&mut self) -> Result<(), KeyManagerError> {
        for layer in CounterLayer::ALL {
            if let Some(mark) = self.store.load_frame_counter(layer)? {
                // Resume from the persisted mark: any value below it may
                // already have gone on air before a crash.
                self.counters.set_live(layer, mark);
                self.counters.set_stored(layer, mark);
            }
        }
        Ok(())
    }

    fn reset_frame_counters(&mut self) -> Result<(), KeyManagerError> {
        self.counters.reset();
        for layer in CounterLayer::ALL {
            self.store.store_frame_counter(layer, 0)?;
        }
        Ok(())
    }

    // -- security policy --------------------------------------------------

    /// Active security policy.
    pub fn security_policy(&self) -> &SecurityPolicy {
        &self.security_policy
    }

    /// Replaces the security policy, persisting it and signalling the
    /// change. Rejects rotation intervals below the minimum.
    pub fn set_security_policy(&mut self, policy: SecurityPolicy) -> Result<(), KeyManagerError> {
        if policy.rotation_time_hours < MIN_KEY_ROTATION_TIME {
            return Err(KeyManagerError::RotationTimeTooShort {
                hours: policy.rotation_time_hours,
                min: MIN_KEY_ROTATION_TIME,
            });
        }
        let changed = policy != self.security_policy;
        self.store.store_security_policy(&policy)?;
        self.security_policy = policy;
        if changed {
            self.notifier.signal(Event::SecurityPolicyChanged);
        }
        Ok(())
    }

    // -- rotation ----------------------------------------------------------

    /// Starts the hourly rotation timer with the guard window cleared.
    pub fn start_rotation(&mut self) {
        self.rotation.clear_guard();
        self.rotation.start(self.env.now());
        tracing::debug!("key rotation timer started");
    }

    /// Stops the rotation timer. Guard state is left as-is.
    pub fn stop_rotation(&mut self) {
        self.rotation.stop();
    }

    /// Whether the rotation timer is armed.
    pub fn rotation_running(&self) -> bool {
        self.rotation.is_running()
    }

    /// Deadline of the next rotation tick, if the timer is armed.
    pub fn rotation_fire_at(&self) -> Option<E::Instant> {
        self.rotation.fire_at()
    }

    /// Hours counted since the timer last (re)started.
    pub fn hours_since_rotation(&self) -> u32 {
        self.rotation.elapsed_hours()
    }

    /// Current guard window state.
    pub fn guard_state(&self) -> GuardState {
        self.rotation.guard_state()
    }

    /// Configured guard time in hours.
    pub fn key_switch_guard_time(&self) -> u32 {
        self.rotation.guard_time_hours()
    }

    /// Overrides the guard time. Mainly for commissioning and tests.
    pub fn set_key_switch_guard_time(&mut self, hours: u32) {
        self.rotation.set_guard_time_hours(hours);
    }

    /// Handles one rotation tick: counts the hour, re-arms the deadline,
    /// and advances the epoch once the rotation interval is reached. A
    /// rejected advance (guard window) is logged and retried on a later
    /// tick.
    pub fn handle_rotation_tick(&mut self) {
        if !self.rotation.is_running() {
            return;
        }
        self.rotation.advance_hour();

        if self.rotation.elapsed_hours() >= u32::from(self.security_policy.rotation_time_hours) {
            let next = self.key_sequence.wrapping_add(1);
            if let Err(err) = self.set_current_key_sequence(next) {
                tracing::warn!(%err, "scheduled key rotation deferred");
            }
        }
    }

    /// Drives the rotation timer until it is stopped, sleeping through
    /// the environment so tests can use virtual time.
    pub async fn drive_rotation(&mut self) {
        while let Some(fire_at) = self.rotation.fire_at() {
            let now = self.env.now();
            if fire_at > now {
                let env = self.env.clone();
                env.sleep(fire_at - now).await;
            }
            self.handle_rotation_tick();
        }
    }
}

impl<E: Environment, S: SettingsStore, N: Notifier> Drop for KeyManager<E, S, N> {
    fn drop(&mut self) {
        if self.mode != CryptoMode::KeyRefs {
            return;
        }
        // Volatile derived material is released; the persistent root key
        // and PSKc slots stay for the next boot.
        self.destroy_schedule_refs();
        if let Some(Kek(kek)) = &self.kek {
            self.backend.destroy_key(kek.key_ref());
        }
        if let Some(temporary) = &self.temporary_routing_key {
            self.backend.destroy_key(temporary.key_ref());
        }
    }
}
