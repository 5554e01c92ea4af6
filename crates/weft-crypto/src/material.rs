//! Key material value types
//!
//! A key is either a *literal* (the bytes live in process memory) or a
//! *reference* (an opaque handle naming a secret inside a backend-managed
//! secure store). Exactly one representation is active at a time; the
//! [`Key`](crate::Key) tag records which.
//!
//! Literal material is zeroized on drop. References carry no secret and
//! are plain `Copy` values; destroying the backend entry is the owner's
//! responsibility (see `weft-core`'s key manager).

use zeroize::Zeroize;

/// Size in bytes of every symmetric key in the stack.
pub const KEY_SIZE: usize = 16;

/// A 16-byte literal symmetric key, zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyBytes([u8; KEY_SIZE]);

impl KeyBytes {
    /// Wraps a raw 16-byte key.
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl From<[u8; KEY_SIZE]> for KeyBytes {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl Drop for KeyBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// Key material never appears in logs or panic messages.
impl core::fmt::Debug for KeyBytes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("KeyBytes(..)")
    }
}

/// An opaque handle naming a secret held in a backend secure store.
///
/// The zero handle is the null reference: it names nothing, and
/// destroying it is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyRef(pub u32);

impl KeyRef {
    /// The null reference.
    pub const NULL: Self = Self(0);

    /// Returns true if this is the null reference.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// A symmetric key in its active representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// Key bytes held directly in process memory.
    Literal(KeyBytes),
    /// Opaque reference into a backend secure store.
    Ref(KeyRef),
}

impl Key {
    /// Builds a literal key from raw bytes.
    pub fn literal(bytes: [u8; KEY_SIZE]) -> Self {
        Self::Literal(KeyBytes::new(bytes))
    }

    /// Returns the backend reference, or [`KeyRef::NULL`] for a literal key.
    pub fn key_ref(&self) -> KeyRef {
        match self {
            Self::Literal(_) => KeyRef::NULL,
            Self::Ref(key_ref) => *key_ref,
        }
    }

    /// Returns true if the key is represented as a backend reference.
    pub fn is_ref(&self) -> bool {
        matches!(self, Self::Ref(_))
    }
}

/// The network-wide root secret from which all epoch keys derive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkKey(pub Key);

/// The pre-shared commissioning key (PSKc).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pskc(pub Key);

/// The key-encryption key used to wrap key material during commissioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kek(pub Key);

/// Key type encoding for an imported key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Raw data (no algorithm binding).
    Raw,
    /// AES key.
    Aes,
    /// HMAC key.
    Hmac,
}

/// Key algorithm encoding for an imported key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// Vendor defined.
    Vendor,
    /// AES in ECB mode (single-block).
    AesEcb,
    /// HMAC-SHA-256.
    HmacSha256,
}

/// Permitted uses of an imported key, as a small flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyUsage(u8);

impl KeyUsage {
    /// No permitted use.
    pub const NONE: Self = Self(0);
    /// Key bytes may be exported.
    pub const EXPORT: Self = Self(1);
    /// Key may encrypt.
    pub const ENCRYPT: Self = Self(2);
    /// Key may decrypt.
    pub const DECRYPT: Self = Self(4);
    /// Key may sign hashes (HMAC).
    pub const SIGN_HASH: Self = Self(8);

    /// Returns true if every flag in `other` is present in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for KeyUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Whether an imported key survives a backend restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPersistence {
    /// Key is lost when the backend restarts.
    Volatile,
    /// Key survives restarts in the secure store.
    Persistent,
}

/// Attributes of a stored key, retrievable without reading its value.
///
/// Used at boot to probe whether a persistent root key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyAttributes {
    /// Key type the key was imported with.
    pub key_type: KeyType,
    /// Algorithm binding.
    pub algorithm: KeyAlgorithm,
    /// Permitted uses.
    pub usage: KeyUsage,
    /// Volatile or persistent.
    pub persistence: KeyPersistence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_ref_is_null() {
        assert!(KeyRef::NULL.is_null());
        assert!(!KeyRef(7).is_null());
    }

    #[test]
    fn literal_key_has_null_ref() {
        let key = Key::literal([0u8; KEY_SIZE]);
        assert!(!key.is_ref());
        assert_eq!(key.key_ref(), KeyRef::NULL);
    }

    #[test]
    fn ref_key_reports_its_handle() {
        let key = Key::Ref(KeyRef(42));
        assert!(key.is_ref());
        assert_eq!(key.key_ref(), KeyRef(42));
    }

    #[test]
    fn usage_flags_combine() {
        let usage = KeyUsage::ENCRYPT | KeyUsage::DECRYPT;
        assert!(usage.contains(KeyUsage::ENCRYPT));
        assert!(usage.contains(KeyUsage::DECRYPT));
        assert!(!usage.contains(KeyUsage::EXPORT));
        assert!(usage.contains(KeyUsage::NONE));
    }

    #[test]
    fn key_bytes_debug_hides_material() {
        let key = KeyBytes::new([0xAA; KEY_SIZE]);
        assert_eq!(format!("{key:?}"), "KeyBytes(..)");
    }
}
