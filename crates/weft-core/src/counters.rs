//! Frame counter bookkeeping
//!
//! Counters may never be reused under the same key: reuse breaks the
//! security of the frame encryption mode. The live counters here are
//! paired with *stored* high-water marks, the values last written to
//! non-volatile storage. Persistence is write-amplification-friendly:
//! the key manager persists `live + COUNTER_STORE_AHEAD` only when a live
//! counter catches up with its mark, and a restart resumes from the mark,
//! so the persisted value is always ≥ anything used before a crash.

use serde::{Deserialize, Serialize};

/// How far ahead of the live value a counter is persisted.
///
/// Larger values mean fewer storage writes at the cost of burning more
/// counter space on every restart.
pub const COUNTER_STORE_AHEAD: u32 = 1000;

/// Protocol layer a frame counter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterLayer {
    /// Link-layer (MAC) frames.
    Link,
    /// Routing-layer frames.
    Routing,
    /// Transport-layer frames.
    Transport,
}

impl CounterLayer {
    /// All persisted counter layers, in slot order.
    pub const ALL: [Self; 3] = [Self::Link, Self::Routing, Self::Transport];
}

#[derive(Debug, Clone, Copy, Default)]
struct Counter {
    live: u32,
    stored: u32,
}

/// Live frame counters plus their stored high-water marks.
///
/// The KEK counter has no stored mark: the KEK is volatile and replaced
/// on every commissioning handoff, so its counter restarts at zero with
/// the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCounters {
    link: Counter,
    routing: Counter,
    transport: Counter,
    kek: u32,
}

impl FrameCounters {
    /// All-zero counters and marks.
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, layer: CounterLayer) -> &Counter {
        match layer {
            CounterLayer::Link => &self.link,
            CounterLayer::Routing => &self.routing,
            CounterLayer::Transport => &self.transport,
        }
    }

    fn counter_mut(&mut self, layer: CounterLayer) -> &mut Counter {
        match layer {
            CounterLayer::Link => &mut self.link,
            CounterLayer::Routing => &mut self.routing,
            CounterLayer::Transport => &mut self.transport,
        }
    }

    /// Current live counter for a layer.
    pub fn live(&self, layer: CounterLayer) -> u32 {
        self.counter(layer).live
    }

    /// Stored high-water mark for a layer.
    pub fn stored(&self, layer: CounterLayer) -> u32 {
        self.counter(layer).stored
    }

    /// Overwrites the live counter (restore and diagnostic paths).
    pub fn set_live(&mut self, layer: CounterLayer, value: u32) {
        self.counter_mut(layer).live = value;
    }

    /// Records a newly persisted high-water mark.
    pub fn set_stored(&mut self, layer: CounterLayer, value: u32) {
        self.counter_mut(layer).stored = value;
    }

    /// Advances the live counter, returning the new value and whether it
    /// has reached the stored mark (meaning persistence is due).
    pub fn increment(&mut self, layer: CounterLayer) -> (u32, bool) {
        let counter = self.counter_mut(layer);
        counter.live = counter.live.wrapping_add(1);
        (counter.live, counter.live >= counter.stored)
    }

    /// Current KEK frame counter.
    pub fn kek(&self) -> u32 {
        self.kek
    }

    /// Advances the KEK frame counter.
    pub fn increment_kek(&mut self) -> u32 {
        self.kek = self.kek.wrapping_add(1);
        self.kek
    }

    /// Resets the KEK counter (new KEK installed).
    pub fn reset_kek(&mut self) {
        self.kek = 0;
    }

    /// Zeroes every live counter and mark (new key material in effect).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
