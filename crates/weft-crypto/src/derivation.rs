//! Epoch key derivation
//!
//! Maps (root key, epoch sequence) to the per-epoch key set. Both
//! derivations are pure: the same inputs on the same backend type always
//! produce the same key bytes, which is what lets previous/current/next
//! epoch keys be recomputed on demand instead of persisted.
//!
//! ```text
//! root key ──HMAC-SHA-256(seq_be ‖ "Weft")──▶ 32-byte hash
//!                                              ├── link key   (first 16)
//!                                              └── routing key (last 16)
//!
//! root key ──HKDF-Extract(seq_be ‖ salt label)──▶ PRK
//!              └─HKDF-Expand(info label, 16)────▶ transport key
//! ```

use crate::backend::CryptoBackend;
use crate::error::CryptoError;
use crate::material::{KEY_SIZE, Key, KeyBytes};

/// Domain-separation tag mixed into every epoch key derivation.
pub const PROTOCOL_LABEL: &[u8] = b"Weft";

/// Salt suffix for the transport-key HKDF-Extract step.
pub const TRANSPORT_SALT_LABEL: &[u8] = b"WeftSequenceRootKey";

/// Info string for the transport-key HKDF-Expand step.
pub const TRANSPORT_INFO_LABEL: &[u8] = b"WeftOverInfraKey";

/// One derivation's output: the 32-byte keyed hash split into two
/// independent 16-byte sub-keys.
///
/// Ephemeral by design; always reproducible from root key + sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochKeys {
    /// Per-link-layer encryption key (first half of the hash).
    pub link_key: KeyBytes,
    /// Per-routing-layer encryption key (second half of the hash).
    pub routing_key: KeyBytes,
}

/// Derives the link and routing keys for an epoch sequence.
///
/// HMAC-SHA-256 keyed by the root key over `sequence` (4 bytes,
/// big-endian) followed by [`PROTOCOL_LABEL`].
pub fn derive_epoch_keys(
    backend: &dyn CryptoBackend,
    root_key: &Key,
    sequence: u32,
) -> Result<EpochKeys, CryptoError> {
    let mut hmac = backend.hmac_sha256()?;

    hmac.start(root_key)?;
    hmac.update(&sequence.to_be_bytes())?;
    hmac.update(PROTOCOL_LABEL)?;
    let hash = hmac.finish()?;

    let mut link = [0u8; KEY_SIZE];
    let mut routing = [0u8; KEY_SIZE];
    link.copy_from_slice(&hash[..KEY_SIZE]);
    routing.copy_from_slice(&hash[KEY_SIZE..]);

    Ok(EpochKeys { link_key: KeyBytes::new(link), routing_key: KeyBytes::new(routing) })
}

/// Derives the transport-layer key for an epoch sequence.
///
/// Extract-then-expand: the salt is `sequence` (big-endian) followed by
/// [`TRANSPORT_SALT_LABEL`]; the expand step is keyed by
/// [`TRANSPORT_INFO_LABEL`] and produces 16 bytes.
pub fn derive_transport_key(
    backend: &dyn CryptoBackend,
    root_key: &Key,
    sequence: u32,
) -> Result<KeyBytes, CryptoError> {
    let mut salt = Vec::with_capacity(4 + TRANSPORT_SALT_LABEL.len());
    salt.extend_from_slice(&sequence.to_be_bytes());
    salt.extend_from_slice(TRANSPORT_SALT_LABEL);

    let mut hkdf = backend.hkdf()?;
    hkdf.extract(&salt, root_key)?;

    let mut out = [0u8; KEY_SIZE];
    hkdf.expand(TRANSPORT_INFO_LABEL, &mut out)?;

    Ok(KeyBytes::new(out))
}

#[cfg(test)]
mod tests {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    use super::*;
    use crate::backend::SoftwareBackend;

    fn root() -> Key {
        Key::literal([
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ])
    }

    #[test]
    fn epoch_derivation_is_deterministic() {
        let backend = SoftwareBackend::new();
        let a = derive_epoch_keys(&backend, &root(), 0).unwrap();
        let b = derive_epoch_keys(&backend, &root(), 0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn epoch_derivation_matches_standard_hmac_construction() {
        // The derivation must be exactly HMAC-SHA-256(root, seq_be ‖ label)
        // split down the middle; compute the reference tag directly from
        // the primitive crate.
        let backend = SoftwareBackend::new();
        let sequence = 7u32;
        let keys = derive_epoch_keys(&backend, &root(), sequence).unwrap();

        let mut mac = Hmac::<Sha256>::new_from_slice(&[
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ])
        .unwrap();
        mac.update(&sequence.to_be_bytes());
        mac.update(b"Weft");
        let expected: [u8; 32] = mac.finalize().into_bytes().into();

        assert_eq!(keys.link_key.as_bytes(), &expected[..16]);
        assert_eq!(keys.routing_key.as_bytes(), &expected[16..]);
    }

    #[test]
    fn adjacent_sequences_produce_unrelated_keys() {
        let backend = SoftwareBackend::new();
        let s0 = derive_epoch_keys(&backend, &root(), 0).unwrap();
        let s1 = derive_epoch_keys(&backend, &root(), 1).unwrap();

        assert_ne!(s0.link_key, s1.link_key);
        assert_ne!(s0.routing_key, s1.routing_key);
    }

    #[test]
    fn link_and_routing_halves_differ() {
        let backend = SoftwareBackend::new();
        let keys = derive_epoch_keys(&backend, &root(), 3).unwrap();
        assert_ne!(keys.link_key, keys.routing_key);
    }

    #[test]
    fn transport_key_is_deterministic_and_sequence_bound() {
        let backend = SoftwareBackend::new();
        let a = derive_transport_key(&backend, &root(), 5).unwrap();
        let b = derive_transport_key(&backend, &root(), 5).unwrap();
        let c = derive_transport_key(&backend, &root(), 6).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn transport_key_matches_direct_hkdf() {
        let backend = SoftwareBackend::new();
        let sequence = 2u32;
        let key = derive_transport_key(&backend, &root(), sequence).unwrap();

        let mut salt = Vec::new();
        salt.extend_from_slice(&sequence.to_be_bytes());
        salt.extend_from_slice(b"WeftSequenceRootKey");

        let hk = hkdf::Hkdf::<Sha256>::new(
            Some(&salt),
            &[
                0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC,
                0xDD, 0xEE, 0xFF,
            ],
        );
        let mut expected = [0u8; 16];
        hk.expand(b"WeftOverInfraKey", &mut expected).unwrap();

        assert_eq!(key.as_bytes(), &expected);
    }
}
