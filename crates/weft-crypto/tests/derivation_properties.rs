//! Property-based tests for epoch key derivation
//!
//! These verify the fundamental derivation invariants:
//!
//! 1. **Determinism**: same (root, sequence) always yields the same keys
//! 2. **Standard construction**: output equals a direct HMAC-SHA-256 /
//!    HKDF computation with the primitive crates
//! 3. **Separation**: different sequences or roots yield different keys
//! 4. **Backend agnosticism**: literal-mode and reference-mode backends
//!    derive byte-identical key material

use hmac::{Hmac, Mac};
use proptest::prelude::*;
use sha2::Sha256;
use weft_crypto::{
    CryptoBackend, ImportRequest, Key, KeyAlgorithm, KeyPersistence, KeyType, KeyUsage,
    SecureStoreBackend, SoftwareBackend, derive_epoch_keys, derive_transport_key,
};

fn arb_root() -> impl Strategy<Value = [u8; 16]> {
    any::<[u8; 16]>()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_epoch_derivation_deterministic(root in arb_root(), sequence in any::<u32>()) {
        let backend = SoftwareBackend::new();
        let key = Key::literal(root);

        let a = derive_epoch_keys(&backend, &key, sequence).unwrap();
        let b = derive_epoch_keys(&backend, &key, sequence).unwrap();

        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_epoch_derivation_matches_reference(root in arb_root(), sequence in any::<u32>()) {
        let backend = SoftwareBackend::new();
        let keys = derive_epoch_keys(&backend, &Key::literal(root), sequence).unwrap();

        let mut mac = Hmac::<Sha256>::new_from_slice(&root).unwrap();
        mac.update(&sequence.to_be_bytes());
        mac.update(b"Weft");
        let expected: [u8; 32] = mac.finalize().into_bytes().into();

        prop_assert_eq!(keys.link_key.as_bytes().as_slice(), &expected[..16]);
        prop_assert_eq!(keys.routing_key.as_bytes().as_slice(), &expected[16..]);
    }

    #[test]
    fn prop_sequences_are_separated(root in arb_root(), s1 in any::<u32>(), s2 in any::<u32>()) {
        prop_assume!(s1 != s2);

        let backend = SoftwareBackend::new();
        let key = Key::literal(root);

        let a = derive_epoch_keys(&backend, &key, s1).unwrap();
        let b = derive_epoch_keys(&backend, &key, s2).unwrap();

        prop_assert_ne!(a.link_key, b.link_key);
        prop_assert_ne!(a.routing_key, b.routing_key);
    }

    #[test]
    fn prop_roots_are_separated(r1 in arb_root(), r2 in arb_root(), sequence in any::<u32>()) {
        prop_assume!(r1 != r2);

        let backend = SoftwareBackend::new();

        let a = derive_epoch_keys(&backend, &Key::literal(r1), sequence).unwrap();
        let b = derive_epoch_keys(&backend, &Key::literal(r2), sequence).unwrap();

        prop_assert_ne!(a.link_key, b.link_key);
    }

    #[test]
    fn prop_reference_backend_derives_identical_keys(
        root in arb_root(),
        sequence in any::<u32>(),
    ) {
        // The imported reference differs in handle value, but the derived
        // key material must be byte-identical to the literal-mode result.
        let software = SoftwareBackend::new();
        let store = SecureStoreBackend::new();

        let key_ref = store
            .import_key(&ImportRequest {
                key_type: KeyType::Hmac,
                algorithm: KeyAlgorithm::HmacSha256,
                usage: KeyUsage::SIGN_HASH,
                persistence: KeyPersistence::Volatile,
                bytes: &root,
                preferred_ref: None,
            })
            .unwrap();

        let literal = derive_epoch_keys(&software, &Key::literal(root), sequence).unwrap();
        let by_ref = derive_epoch_keys(&store, &Key::Ref(key_ref), sequence).unwrap();

        prop_assert_eq!(literal, by_ref);
    }

    #[test]
    fn prop_transport_key_deterministic(root in arb_root(), sequence in any::<u32>()) {
        let backend = SoftwareBackend::new();
        let key = Key::literal(root);

        let a = derive_transport_key(&backend, &key, sequence).unwrap();
        let b = derive_transport_key(&backend, &key, sequence).unwrap();

        prop_assert_eq!(a, b);
    }
}
