//! Error types for the key manager.

use thiserror::Error;
use weft_crypto::CryptoError;

use crate::storage::StorageError;

/// Errors surfaced to administrative callers of the key manager.
///
/// Guard and policy rejections get their own stable variants so operator
/// tooling can explain *why* an action was refused; backend and storage
/// faults pass through transparently.
#[derive(Debug, Error)]
pub enum KeyManagerError {
    /// A forward rotation was requested before the guard window elapsed.
    ///
    /// The caller must re-request after the guard condition clears; the
    /// manager never retries on its own.
    #[error("guard time not elapsed: {elapsed_hours} of {guard_hours} hours since last rotation")]
    GuardTimeNotElapsed {
        /// Hours elapsed since the last rotation.
        elapsed_hours: u32,
        /// Configured guard time in hours.
        guard_hours: u32,
    },

    /// A security policy specified a rotation interval below the minimum.
    #[error("rotation time {hours}h below minimum {min}h")]
    RotationTimeTooShort {
        /// Requested rotation interval in hours.
        hours: u16,
        /// Minimum permitted interval in hours.
        min: u16,
    },

    /// The supplied key material was malformed for the operation.
    #[error("invalid key material: {reason}")]
    InvalidKeyMaterial {
        /// What was wrong with the key.
        reason: &'static str,
    },

    /// Crypto backend failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Settings storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_rejection_is_distinguishable() {
        let err = KeyManagerError::GuardTimeNotElapsed { elapsed_hours: 3, guard_hours: 624 };
        assert_eq!(err.to_string(), "guard time not elapsed: 3 of 624 hours since last rotation");
    }

    #[test]
    fn crypto_errors_pass_through() {
        let err = KeyManagerError::from(CryptoError::NotFound { key_ref: 1 });
        assert!(matches!(err, KeyManagerError::Crypto(CryptoError::NotFound { .. })));
    }
}
