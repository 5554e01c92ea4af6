//! Secure-store backend (key-reference mode)
//!
//! Emulates a secure element / hardware key store: imported key bytes live
//! inside the store, callers hold opaque [`KeyRef`] handles, and primitive
//! contexts resolve handles internally so the bytes never cross the
//! contract boundary. Usage flags are enforced on every resolution: a key
//! imported for HMAC signing cannot be installed into an AES context, and
//! only export-usage keys can be read back out.
//!
//! The store is `Arc`-shared and can outlive a backend instance, which is
//! how persistent keys survive a simulated restart: rebuild the backend
//! over the same store after [`SecureStoreBackend::reset_volatile`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use super::{
    AesEcbCtx, CryptoBackend, HkdfCtx, HmacSha256Ctx, ImportRequest, Sha256Ctx,
};
use crate::error::CryptoError;
use crate::material::{Key, KeyAttributes, KeyPersistence, KeyRef, KeyUsage};

type HmacSha256 = Hmac<Sha256>;

/// First handle value used for store-allocated references; lower values
/// are reserved for the well-known persistent slots.
const FIRST_DYNAMIC_REF: u32 = 0x100;

struct Entry {
    attributes: KeyAttributes,
    bytes: Vec<u8>,
}

impl Drop for Entry {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

struct StoreInner {
    entries: Mutex<HashMap<u32, Entry>>,
    next_ref: AtomicU32,
}

impl StoreInner {
    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Entry>> {
        // Single-threaded execution model: poisoning cannot occur in
        // practice.
        self.entries.lock().expect("secure store mutex poisoned")
    }

    /// Copies a key's bytes out for an internal primitive operation,
    /// checking that `required` usage is permitted.
    fn resolve(
        &self,
        key_ref: KeyRef,
        required: KeyUsage,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let entries = self.lock();
        let entry = entries
            .get(&key_ref.0)
            .ok_or(CryptoError::NotFound { key_ref: key_ref.0 })?;

        if !entry.attributes.usage.contains(required) {
            return Err(CryptoError::Failed { operation: "key usage check" });
        }

        Ok(Zeroizing::new(entry.bytes.clone()))
    }
}

/// Secure-element-backed crypto backend operating on key references.
///
/// Cheap to clone; clones share the underlying store.
#[derive(Clone)]
pub struct SecureStoreBackend {
    inner: Arc<StoreInner>,
}

impl SecureStoreBackend {
    /// Creates a backend over a fresh, empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: Mutex::new(HashMap::new()),
                next_ref: AtomicU32::new(FIRST_DYNAMIC_REF),
            }),
        }
    }

    /// Drops every volatile key, keeping persistent ones.
    ///
    /// Models a device power cycle: a backend rebuilt over this store
    /// afterwards sees exactly the persistent population.
    pub fn reset_volatile(&self) {
        self.inner
            .lock()
            .retain(|_, entry| entry.attributes.persistence == KeyPersistence::Persistent);
    }

    /// Number of live keys in the store.
    ///
    /// Diagnostic accessor; the reference-hygiene tests use it to check
    /// that key replacement never leaks a handle.
    pub fn key_count(&self) -> usize {
        self.inner.lock().len()
    }
}

impl Default for SecureStoreBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoBackend for SecureStoreBackend {
    fn init(&self) -> Result<(), CryptoError> {
        Ok(())
    }

    fn import_key(&self, request: &ImportRequest<'_>) -> Result<KeyRef, CryptoError> {
        if request.bytes.is_empty() {
            return Err(CryptoError::InvalidArgs { reason: "empty key bytes" });
        }

        let mut entries = self.inner.lock();
        let key_ref = match request.preferred_ref {
            Some(preferred) if !preferred.is_null() => {
                if entries.contains_key(&preferred.0) {
                    return Err(CryptoError::Failed { operation: "import into occupied slot" });
                }
                preferred
            },
            _ => KeyRef(self.inner.next_ref.fetch_add(1, Ordering::Relaxed)),
        };

        entries.insert(
            key_ref.0,
            Entry {
                attributes: KeyAttributes {
                    key_type: request.key_type,
                    algorithm: request.algorithm,
                    usage: request.usage,
                    persistence: request.persistence,
                },
                bytes: request.bytes.to_vec(),
            },
        );

        Ok(key_ref)
    }

    fn export_key(&self, key_ref: KeyRef, out: &mut [u8]) -> Result<usize, CryptoError> {
        let bytes = self.inner.resolve(key_ref, KeyUsage::EXPORT)?;

        if out.len() < bytes.len() {
            return Err(CryptoError::InvalidArgs { reason: "export buffer too small" });
        }

        out[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn destroy_key(&self, key_ref: KeyRef) {
        if key_ref.is_null() {
            return;
        }
        self.inner.lock().remove(&key_ref.0);
    }

    fn key_attributes(&self, key_ref: KeyRef) -> Result<KeyAttributes, CryptoError> {
        self.inner
            .lock()
            .get(&key_ref.0)
            .map(|entry| entry.attributes)
            .ok_or(CryptoError::NotFound { key_ref: key_ref.0 })
    }

    fn hmac_sha256(&self) -> Result<Box<dyn HmacSha256Ctx>, CryptoError> {
        Ok(Box::new(StoreHmacSha256 { store: Arc::clone(&self.inner), mac: None }))
    }

    fn aes_ecb(&self) -> Result<Box<dyn AesEcbCtx>, CryptoError> {
        Ok(Box::new(StoreAesEcb { store: Arc::clone(&self.inner), cipher: None }))
    }

    fn hkdf(&self) -> Result<Box<dyn HkdfCtx>, CryptoError> {
        Ok(Box::new(StoreHkdf { store: Arc::clone(&self.inner), prk: None }))
    }

    fn sha256(&self) -> Box<dyn Sha256Ctx> {
        Box::new(StoreSha256 { digest: Sha256::new() })
    }
}

/// Resolves a key argument into usable bytes, copying out of the store for
/// references and borrowing for literals.
fn key_bytes(
    store: &StoreInner,
    key: &Key,
    required: KeyUsage,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    match key {
        Key::Literal(bytes) => Ok(Zeroizing::new(bytes.as_bytes().to_vec())),
        Key::Ref(key_ref) => store.resolve(*key_ref, required),
    }
}

struct StoreHmacSha256 {
    store: Arc<StoreInner>,
    mac: Option<HmacSha256>,
}

impl HmacSha256Ctx for StoreHmacSha256 {
    fn start(&mut self, key: &Key) -> Result<(), CryptoError> {
        let bytes = key_bytes(&self.store, key, KeyUsage::SIGN_HASH)?;
        // Qualified call: KeyInit is in scope for the AES contexts and
        // also provides a new_from_slice.
        let Ok(mac) = <HmacSha256 as Mac>::new_from_slice(&bytes) else {
            unreachable!("HMAC-SHA256 accepts any key size");
        };
        self.mac = Some(mac);
        Ok(())
    }

    fn update(&mut self, bytes: &[u8]) -> Result<(), CryptoError> {
        let Some(mac) = self.mac.as_mut() else {
            return Err(CryptoError::InvalidArgs { reason: "hmac context not started" });
        };
        mac.update(bytes);
        Ok(())
    }

    fn finish(&mut self) -> Result<[u8; 32], CryptoError> {
        let Some(mac) = self.mac.take() else {
            return Err(CryptoError::InvalidArgs { reason: "hmac context not started" });
        };
        Ok(mac.finalize().into_bytes().into())
    }
}

struct StoreAesEcb {
    store: Arc<StoreInner>,
    cipher: Option<Aes128>,
}

impl AesEcbCtx for StoreAesEcb {
    fn set_key(&mut self, key: &Key) -> Result<(), CryptoError> {
        let bytes = key_bytes(&self.store, key, KeyUsage::ENCRYPT)?;
        let Ok(cipher) = Aes128::new_from_slice(&bytes) else {
            return Err(CryptoError::InvalidArgs { reason: "aes key must be 16 bytes" });
        };
        self.cipher = Some(cipher);
        Ok(())
    }

    fn encrypt_block(&mut self, block: &[u8; 16]) -> Result<[u8; 16], CryptoError> {
        let Some(cipher) = self.cipher.as_ref() else {
            return Err(CryptoError::InvalidArgs { reason: "aes key not set" });
        };
        let mut out = GenericArray::clone_from_slice(block);
        cipher.encrypt_block(&mut out);
        Ok(out.into())
    }
}

struct StoreHkdf {
    store: Arc<StoreInner>,
    prk: Option<Hkdf<Sha256>>,
}

impl HkdfCtx for StoreHkdf {
    fn extract(&mut self, salt: &[u8], input_key: &Key) -> Result<(), CryptoError> {
        // Derivation keys are imported with sign-hash usage; HKDF-Extract
        // is itself an HMAC under the hood.
        let ikm = key_bytes(&self.store, input_key, KeyUsage::SIGN_HASH)?;
        self.prk = Some(Hkdf::<Sha256>::new(Some(salt), &ikm));
        Ok(())
    }

    fn expand(&mut self, info: &[u8], out: &mut [u8]) -> Result<(), CryptoError> {
        let Some(prk) = self.prk.as_ref() else {
            return Err(CryptoError::InvalidArgs { reason: "hkdf extract not performed" });
        };
        prk.expand(info, out)
            .map_err(|_| CryptoError::InvalidArgs { reason: "hkdf output length" })
    }
}

struct StoreSha256 {
    digest: Sha256,
}

impl Sha256Ctx for StoreSha256 {
    fn start(&mut self) {
        self.digest = Sha256::new();
    }

    fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    fn finish(&mut self) -> [u8; 32] {
        self.digest.finalize_reset().into()
    }
}
