//! Change-notification contract
//!
//! The key manager signals an [`Event`] whenever security material or
//! policy changes so dependent state (neighbor tables, advertised network
//! parameters) can react. Signals are fire-and-forget: the manager never
//! depends on an observer's response.

/// Security-material change events emitted by the key manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The network root key was replaced.
    NetworkKeyChanged,
    /// The epoch key sequence moved (rotation or resynchronization).
    KeySequenceChanged,
    /// The commissioning key (PSKc) was set or replaced.
    PskcChanged,
    /// The security policy was updated.
    SecurityPolicyChanged,
}

/// Observer for security-material change events.
pub trait Notifier: Send + Sync + 'static {
    /// Delivers one event. Must not call back into the key manager.
    fn signal(&self, event: Event);
}

/// Notifier that discards every event.
///
/// Default wiring for hosts that have no dependent state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn signal(&self, _event: Event) {}
}

/// Per-neighbor security bookkeeping owned by the frame layer.
///
/// The key manager owns the *reset contract*: replacing the root key
/// invalidates every neighbor's recorded key sequence and frame counters,
/// so the manager invokes this on the registered table. The table itself
/// (and its records) belongs to the excluded frame layer.
pub trait NeighborTable: Send {
    /// Zeroes the recorded key sequence and frame counters of every
    /// known neighbor, child, and router record.
    fn reset_security_state(&self);
}
