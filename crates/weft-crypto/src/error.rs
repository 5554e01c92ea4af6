//! Error types for crypto backend operations

use thiserror::Error;

/// Errors from crypto backend operations.
///
/// The taxonomy is deliberately small: callers branch on the *kind* of
/// failure (bad input, backend fault, missing capability, missing key),
/// never on backend-specific detail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A malformed or out-of-range argument was supplied
    #[error("invalid argument: {reason}")]
    InvalidArgs {
        /// What was wrong with the argument
        reason: &'static str,
    },

    /// The backend operation failed for an internal reason
    #[error("backend operation failed: {operation}")]
    Failed {
        /// Operation that failed
        operation: &'static str,
    },

    /// The backend does not provide this capability
    #[error("not implemented: {capability}")]
    NotImplemented {
        /// Capability that is absent
        capability: &'static str,
    },

    /// No key exists under the given reference
    #[error("key not found: ref {key_ref:#010x}")]
    NotFound {
        /// The reference that was probed
        key_ref: u32,
    },
}

impl CryptoError {
    /// Returns true if this error is fatal to stack startup.
    ///
    /// `NotFound` is the only non-fatal probe result: it tells the key
    /// manager to generate a fresh root key instead of reusing a stored
    /// one. Everything else on a mandatory path aborts construction.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_non_fatal() {
        assert!(!CryptoError::NotFound { key_ref: 1 }.is_fatal());
    }

    #[test]
    fn backend_faults_are_fatal() {
        assert!(CryptoError::InvalidArgs { reason: "empty key" }.is_fatal());
        assert!(CryptoError::Failed { operation: "import" }.is_fatal());
        assert!(CryptoError::NotImplemented { capability: "key refs" }.is_fatal());
    }
}
