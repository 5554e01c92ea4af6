//! Crypto backend contract
//!
//! The key manager never touches a cryptographic primitive directly: every
//! AES, HMAC, HKDF, and SHA-256 operation goes through [`CryptoBackend`],
//! and every operation accepts a [`Key`] in either representation. Two
//! conforming backends exist:
//!
//! - [`SoftwareBackend`]: literal-key mode, primitives run in process
//!   memory.
//! - [`SecureStoreBackend`]: key-reference mode, key bytes live in a
//!   backend-managed store and operations resolve opaque handles
//!   internally.
//!
//! The backend is selected once at stack startup via [`CryptoMode`] and
//! injected into the key manager; derivation and rotation logic stay
//! backend-agnostic.
//!
//! # Contexts
//!
//! Working state (HMAC, AES, HKDF, SHA-256) is carried in boxed context
//! objects allocated by the backend. A context is single-use-at-a-time: a
//! caller completes one `start → update… → finish` sequence before reusing
//! it. Misordered calls (`update` before `start`, `expand` before
//! `extract`) fail with [`CryptoError::InvalidArgs`], never panic.

mod software;
mod store;

pub use software::SoftwareBackend;
pub use store::SecureStoreBackend;

use crate::error::CryptoError;
use crate::material::{
    Key, KeyAlgorithm, KeyAttributes, KeyPersistence, KeyRef, KeyType, KeyUsage,
};

/// Which key representation the stack runs with, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoMode {
    /// Keys are literal bytes in process memory ([`SoftwareBackend`]).
    LiteralKeys,
    /// Keys are opaque references into a secure store
    /// ([`SecureStoreBackend`]).
    KeyRefs,
}

/// Parameters for registering a key with the backend.
#[derive(Debug, Clone)]
pub struct ImportRequest<'a> {
    /// Key type encoding.
    pub key_type: KeyType,
    /// Algorithm the key is bound to.
    pub algorithm: KeyAlgorithm,
    /// Permitted uses.
    pub usage: KeyUsage,
    /// Volatile or persistent storage.
    pub persistence: KeyPersistence,
    /// The literal key bytes to import. Must be non-empty.
    pub bytes: &'a [u8],
    /// Fixed slot to import into, for the well-known persistent keys
    /// (root key, PSKc). `None` lets the backend allocate a fresh handle.
    pub preferred_ref: Option<KeyRef>,
}

/// Streaming HMAC-SHA-256 context.
pub trait HmacSha256Ctx: Send {
    /// Keys the context. Resets any in-progress computation.
    fn start(&mut self, key: &Key) -> Result<(), CryptoError>;

    /// Feeds input bytes. [`CryptoError::InvalidArgs`] if not started.
    fn update(&mut self, bytes: &[u8]) -> Result<(), CryptoError>;

    /// Produces the 32-byte tag and resets the context.
    fn finish(&mut self) -> Result<[u8; 32], CryptoError>;
}

/// Single-block AES-ECB context.
pub trait AesEcbCtx: Send {
    /// Installs the encryption key.
    fn set_key(&mut self, key: &Key) -> Result<(), CryptoError>;

    /// Encrypts one 16-byte block. [`CryptoError::InvalidArgs`] if no key
    /// is installed.
    fn encrypt_block(&mut self, block: &[u8; 16]) -> Result<[u8; 16], CryptoError>;
}

/// HKDF extract-then-expand context.
pub trait HkdfCtx: Send {
    /// Extracts a pseudorandom key from `input_key` under `salt`.
    fn extract(&mut self, salt: &[u8], input_key: &Key) -> Result<(), CryptoError>;

    /// Expands into `out`. [`CryptoError::InvalidArgs`] before `extract`
    /// or when `out` exceeds the HKDF output limit.
    fn expand(&mut self, info: &[u8], out: &mut [u8]) -> Result<(), CryptoError>;
}

/// Streaming SHA-256 context.
pub trait Sha256Ctx: Send {
    /// Begins a new hash computation, discarding any prior state.
    fn start(&mut self);

    /// Feeds input bytes.
    fn update(&mut self, bytes: &[u8]);

    /// Produces the 32-byte digest and resets the context.
    fn finish(&mut self) -> [u8; 32];
}

/// Capability interface over the cryptographic primitives.
///
/// All operations are synchronous and complete in bounded time; the
/// single-threaded execution model of the stack means no operation is ever
/// re-entered (see the key manager's concurrency notes).
pub trait CryptoBackend: Send + Sync {
    /// Prepares the backend. Idempotent; failure is fatal to stack
    /// startup.
    fn init(&self) -> Result<(), CryptoError>;

    /// Registers a literal key, returning an opaque reference.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::InvalidArgs`] for empty key bytes.
    /// - [`CryptoError::Failed`] if the preferred slot is occupied;
    ///   callers destroy the old key first.
    fn import_key(&self, request: &ImportRequest<'_>) -> Result<KeyRef, CryptoError>;

    /// Copies key bytes out of the store into `out`, returning the key
    /// length. Requires the key's usage to permit export.
    fn export_key(&self, key_ref: KeyRef, out: &mut [u8]) -> Result<usize, CryptoError>;

    /// Releases the backend resources behind `key_ref`.
    ///
    /// Destroying the null reference or an already-destroyed reference is
    /// a no-op: destruction is a best-effort cleanup path.
    fn destroy_key(&self, key_ref: KeyRef);

    /// Retrieves a stored key's attributes without reading its value.
    ///
    /// # Errors
    ///
    /// [`CryptoError::NotFound`] when no key exists under `key_ref`; the
    /// boot path uses this non-fatally to decide between generating a
    /// fresh root key and reusing a stored one.
    fn key_attributes(&self, key_ref: KeyRef) -> Result<KeyAttributes, CryptoError>;

    /// Allocates an HMAC-SHA-256 context.
    fn hmac_sha256(&self) -> Result<Box<dyn HmacSha256Ctx>, CryptoError>;

    /// Allocates a single-block AES-ECB context.
    fn aes_ecb(&self) -> Result<Box<dyn AesEcbCtx>, CryptoError>;

    /// Allocates an HKDF context.
    fn hkdf(&self) -> Result<Box<dyn HkdfCtx>, CryptoError>;

    /// Allocates a SHA-256 context.
    fn sha256(&self) -> Box<dyn Sha256Ctx>;
}
