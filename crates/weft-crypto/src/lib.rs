//! Weft Cryptographic Backend and Key Material
//!
//! Cryptographic building blocks for the Weft mesh stack's security
//! material: the pluggable backend contract, the dual literal/reference
//! key representation, and the deterministic per-epoch key derivation.
//!
//! # Key Lifecycle
//!
//! All symmetric keys in the stack descend from one 16-byte root secret.
//! For each rotation epoch, a single keyed-hash call produces the
//! link-layer and routing-layer keys, and an extract/expand derivation
//! produces the transport key:
//!
//! ```text
//! Root Key (literal bytes, or handle into a secure store)
//!        │
//!        ▼
//! HMAC-SHA-256(seq ‖ label) → Link Key + Routing Key   (per epoch)
//!        │
//!        ▼
//! HKDF Extract/Expand       → Transport Key            (per epoch)
//! ```
//!
//! Derived keys are ephemeral and reproducible; only the root secret (and
//! the independently-managed commissioning and key-encryption keys) has a
//! stored lifecycle.
//!
//! # Dual Representation
//!
//! A [`Key`] is either `Literal` bytes in process memory or an opaque
//! [`KeyRef`] into a backend secure store. Every backend operation accepts
//! both, so the derivation and rotation logic above this crate never
//! branches on the representation. Backend selection is a startup-time
//! strategy choice ([`CryptoMode`]), not a per-call check.
//!
//! # Security
//!
//! - Literal key material is zeroized on drop.
//! - Reference-mode key bytes never leave the store except through
//!   [`CryptoBackend::export_key`], which enforces export usage.
//! - Epoch separation: the sequence number is bound into every
//!   derivation, so keys from different epochs are independent.

pub mod backend;
pub mod derivation;
pub mod error;
pub mod material;

pub use backend::{
    AesEcbCtx, CryptoBackend, CryptoMode, HkdfCtx, HmacSha256Ctx, ImportRequest,
    SecureStoreBackend, Sha256Ctx, SoftwareBackend,
};
pub use derivation::{
    EpochKeys, PROTOCOL_LABEL, TRANSPORT_INFO_LABEL, TRANSPORT_SALT_LABEL, derive_epoch_keys,
    derive_transport_key,
};
pub use error::CryptoError;
pub use material::{
    KEY_SIZE, Kek, Key, KeyAlgorithm, KeyAttributes, KeyBytes, KeyPersistence, KeyRef, KeyType,
    KeyUsage, NetworkKey, Pskc,
};
