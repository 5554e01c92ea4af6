//! In-memory software backend (literal-key mode)
//!
//! Primitives run directly on literal key bytes via the RustCrypto crates.
//! The key-store surface (`import`/`export`/`destroy`/`attributes`) is a
//! thin wrapper that retains imported bytes under a handle; there is no
//! real secure store behind it, so "persistent" imports do not survive the
//! process. Contexts reject [`Key::Ref`] arguments: resolving references
//! is the secure-store backend's capability.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use super::{
    AesEcbCtx, CryptoBackend, HkdfCtx, HmacSha256Ctx, ImportRequest, Sha256Ctx,
};
use crate::error::CryptoError;
use crate::material::{Key, KeyAttributes, KeyRef, KeyUsage};

type HmacSha256 = Hmac<Sha256>;

/// First handle value used for backend-allocated references; lower values
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

/// Literal-key software backend.
///
/// Cheap to clone; clones share the retained-key table.
#[derive(Clone, Default)]
pub struct SoftwareBackend {
    entries: Arc<Mutex<HashMap<u32, Entry>>>,
    next_ref: Arc<AtomicU32>,
}

impl SoftwareBackend {
    /// Creates an empty software backend.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_ref: Arc::new(AtomicU32::new(FIRST_DYNAMIC_REF)),
        }
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, Entry>> {
        // Single-threaded execution model: the lock only guards against
        // accidental cross-thread use, poisoning cannot occur in practice.
        self.entries.lock().expect("key table mutex poisoned")
    }
}

impl CryptoBackend for SoftwareBackend {
    fn init(&self) -> Result<(), CryptoError> {
        Ok(())
    }

    fn import_key(&self, request: &ImportRequest<'_>) -> Result<KeyRef, CryptoError> {
        if request.bytes.is_empty() {
            return Err(CryptoError::InvalidArgs { reason: "empty key bytes" });
        }

        let mut entries = self.lock();
        let key_ref = match request.preferred_ref {
            Some(preferred) if !preferred.is_null() => {
                if entries.contains_key(&preferred.0) {
                    return Err(CryptoError::Failed { operation: "import into occupied slot" });
                }
                preferred
            },
            _ => KeyRef(self.next_ref.fetch_add(1, Ordering::Relaxed)),
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
        let entries = self.lock();
        let entry = entries
            .get(&key_ref.0)
            .ok_or(CryptoError::NotFound { key_ref: key_ref.0 })?;

        if !entry.attributes.usage.contains(KeyUsage::EXPORT) {
            return Err(CryptoError::Failed { operation: "export not permitted by key usage" });
        }
        if out.len() < entry.bytes.len() {
            return Err(CryptoError::InvalidArgs { reason: "export buffer too small" });
        }

        out[..entry.bytes.len()].copy_from_slice(&entry.bytes);
        Ok(entry.bytes.len())
    }

    fn destroy_key(&self, key_ref: KeyRef) {
        if key_ref.is_null() {
            return;
        }
        self.lock().remove(&key_ref.0);
    }

    fn key_attributes(&self, key_ref: KeyRef) -> Result<KeyAttributes, CryptoError> {
        self.lock()
            .get(&key_ref.0)
            .map(|entry| entry.attributes)
            .ok_or(CryptoError::NotFound { key_ref: key_ref.0 })
    }

    fn hmac_sha256(&self) -> Result<Box<dyn HmacSha256Ctx>, CryptoError> {
        Ok(Box::new(SoftwareHmacSha256 { mac: None }))
    }

    fn aes_ecb(&self) -> Result<Box<dyn AesEcbCtx>, CryptoError> {
        Ok(Box::new(SoftwareAesEcb { cipher: None }))
    }

    fn hkdf(&self) -> Result<Box<dyn HkdfCtx>, CryptoError> {
        Ok(Box::new(SoftwareHkdf { prk: None }))
    }

    fn sha256(&self) -> Box<dyn Sha256Ctx> {
        Box::new(SoftwareSha256 { digest: Sha256::new() })
    }
}

fn literal_bytes(key: &Key) -> Result<&[u8], CryptoError> {
    match key {
        Key::Literal(bytes) => Ok(bytes.as_bytes()),
        Key::Ref(_) => Err(CryptoError::NotImplemented { capability: "key references" }),
    }
}

struct SoftwareHmacSha256 {
    mac: Option<HmacSha256>,
}

impl HmacSha256Ctx for SoftwareHmacSha256 {
    fn start(&mut self, key: &Key) -> Result<(), CryptoError> {
        let bytes = literal_bytes(key)?;
        // Qualified call: KeyInit is in scope for the AES contexts and
        // also provides a new_from_slice.
        let Ok(mac) = <HmacSha256 as Mac>::new_from_slice(bytes) else {
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

struct SoftwareAesEcb {
    cipher: Option<Aes128>,
}

impl AesEcbCtx for SoftwareAesEcb {
    fn set_key(&mut self, key: &Key) -> Result<(), CryptoError> {
        let bytes = literal_bytes(key)?;
        let Ok(cipher) = Aes128::new_from_slice(bytes) else {
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

struct SoftwareHkdf {
    prk: Option<Hkdf<Sha256>>,
}

impl HkdfCtx for SoftwareHkdf {
    fn extract(&mut self, salt: &[u8], input_key: &Key) -> Result<(), CryptoError> {
        let ikm = literal_bytes(input_key)?;
        self.prk = Some(Hkdf::<Sha256>::new(Some(salt), ikm));
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

struct SoftwareSha256 {
    digest: Sha256,
}

impl Sha256Ctx for SoftwareSha256 {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{KeyAlgorithm, KeyPersistence, KeyType};

    fn raw_import(bytes: &[u8]) -> ImportRequest<'_> {
        ImportRequest {
            key_type: KeyType::Raw,
            algorithm: KeyAlgorithm::Vendor,
            usage: KeyUsage::EXPORT,
            persistence: KeyPersistence::Volatile,
            bytes,
            preferred_ref: None,
        }
    }

    #[test]
    fn hmac_matches_direct_computation() {
        let backend = SoftwareBackend::new();
        let key = Key::literal([0x0B; 16]);

        let mut ctx = backend.hmac_sha256().unwrap();
        ctx.start(&key).unwrap();
        ctx.update(b"hello ").unwrap();
        ctx.update(b"mesh").unwrap();
        let tag = ctx.finish().unwrap();

        let mut mac = <HmacSha256 as Mac>::new_from_slice(&[0x0B; 16]).unwrap();
        mac.update(b"hello mesh");
        let expected: [u8; 32] = mac.finalize().into_bytes().into();

        assert_eq!(tag, expected);
    }

    #[test]
    fn hmac_update_before_start_is_invalid() {
        let backend = SoftwareBackend::new();
        let mut ctx = backend.hmac_sha256().unwrap();
        assert!(matches!(ctx.update(b"x"), Err(CryptoError::InvalidArgs { .. })));
        assert!(matches!(ctx.finish(), Err(CryptoError::InvalidArgs { .. })));
    }

    #[test]
    fn hmac_rejects_key_refs() {
        let backend = SoftwareBackend::new();
        let mut ctx = backend.hmac_sha256().unwrap();
        let result = ctx.start(&Key::Ref(KeyRef(9)));
        assert!(matches!(result, Err(CryptoError::NotImplemented { .. })));
    }

    #[test]
    fn aes_encrypt_before_set_key_is_invalid() {
        let backend = SoftwareBackend::new();
        let mut ctx = backend.aes_ecb().unwrap();
        assert!(matches!(ctx.encrypt_block(&[0; 16]), Err(CryptoError::InvalidArgs { .. })));
    }

    #[test]
    fn aes_is_deterministic() {
        let backend = SoftwareBackend::new();
        let key = Key::literal([0x42; 16]);

        let mut a = backend.aes_ecb().unwrap();
        a.set_key(&key).unwrap();
        let mut b = backend.aes_ecb().unwrap();
        b.set_key(&key).unwrap();

        let block = [0x5A; 16];
        assert_eq!(a.encrypt_block(&block).unwrap(), b.encrypt_block(&block).unwrap());
        assert_ne!(a.encrypt_block(&block).unwrap(), block);
    }

    #[test]
    fn hkdf_expand_before_extract_is_invalid() {
        let backend = SoftwareBackend::new();
        let mut ctx = backend.hkdf().unwrap();
        let mut out = [0u8; 16];
        assert!(matches!(ctx.expand(b"info", &mut out), Err(CryptoError::InvalidArgs { .. })));
    }

    #[test]
    fn sha256_streaming_matches_one_shot() {
        let backend = SoftwareBackend::new();
        let mut ctx = backend.sha256();
        ctx.start();
        ctx.update(b"weft");
        ctx.update(b"-mesh");
        let digest = ctx.finish();

        let expected: [u8; 32] = Sha256::digest(b"weft-mesh").into();
        assert_eq!(digest, expected);
    }

    #[test]
    fn import_rejects_empty_bytes() {
        let backend = SoftwareBackend::new();
        let result = backend.import_key(&raw_import(&[]));
        assert!(matches!(result, Err(CryptoError::InvalidArgs { .. })));
    }

    #[test]
    fn import_export_round_trip() {
        let backend = SoftwareBackend::new();
        let key_ref = backend.import_key(&raw_import(&[7u8; 16])).unwrap();

        let mut out = [0u8; 16];
        let len = backend.export_key(key_ref, &mut out).unwrap();
        assert_eq!(len, 16);
        assert_eq!(out, [7u8; 16]);
    }

    #[test]
    fn destroy_is_idempotent() {
        let backend = SoftwareBackend::new();
        let key_ref = backend.import_key(&raw_import(&[1u8; 16])).unwrap();

        backend.destroy_key(key_ref);
        backend.destroy_key(key_ref);
        backend.destroy_key(KeyRef::NULL);

        assert!(matches!(
            backend.key_attributes(key_ref),
            Err(CryptoError::NotFound { .. })
        ));
    }
}
