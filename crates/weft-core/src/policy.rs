//! Security policy
//!
//! A compact bit-flag configuration controlling which network behaviors
//! are permitted, plus the key rotation interval. The packed byte form is
//! the wire contract used in network beacons and dataset storage.
//!
//! # Packed layout
//!
//! Byte 0 (always present):
//!
//! | bit  | flag                                     |
//! |------|------------------------------------------|
//! | 0x80 | obtain network key enabled               |
//! | 0x40 | native commissioning enabled             |
//! | 0x20 | routers enabled                          |
//! | 0x10 | external commissioning enabled           |
//! | 0x08 | beacons enabled                          |
//! | 0x04 | commercial commissioning **disabled**    |
//! | 0x02 | autonomous enrollment **disabled**       |
//! | 0x01 | network key provisioning **disabled**    |
//!
//! Byte 1 (optional; absent means all defaults):
//!
//! | bits | field                                    |
//! |------|------------------------------------------|
//! | 0x80 | ToBLE link enabled                       |
//! | 0x40 | non-CCM routers **disabled**             |
//! | 0x20 | reserved, always set on encode           |
//! | 0x1f | version threshold for routing            |
//!
//! Three flags are inverted on the wire (set bit = feature disabled) so
//! that the all-bits-set legacy encoding maps to the conservative
//! default.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default key rotation interval in hours (28 days).
pub const DEFAULT_KEY_ROTATION_TIME: u16 = 672;

/// Minimum permitted key rotation interval in hours.
pub const MIN_KEY_ROTATION_TIME: u16 = 1;

/// Size of the packed flag encoding.
pub const POLICY_FLAG_BYTES: usize = 2;

const OBTAIN_NETWORK_KEY_MASK: u8 = 0x80;
const NATIVE_COMMISSIONING_MASK: u8 = 0x40;
const ROUTERS_MASK: u8 = 0x20;
const EXTERNAL_COMMISSIONING_MASK: u8 = 0x10;
const BEACONS_MASK: u8 = 0x08;
const COMMERCIAL_COMMISSIONING_MASK: u8 = 0x04;
const AUTONOMOUS_ENROLLMENT_MASK: u8 = 0x02;
const NETWORK_KEY_PROVISIONING_MASK: u8 = 0x01;

const TOBLE_LINK_MASK: u8 = 0x80;
const NON_CCM_ROUTERS_MASK: u8 = 0x40;
const RESERVED_MASK: u8 = 0x20;
const VERSION_THRESHOLD_MASK: u8 = 0x1f;

/// Errors from decoding packed policy flags.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The flag byte slice was empty.
    #[error("policy flags must be at least one byte")]
    EmptyFlags,
}

/// Network security policy: rotation interval plus permitted behaviors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// Key rotation interval in hours.
    pub rotation_time_hours: u16,
    /// Devices may request the network key during commissioning.
    pub obtain_network_key: bool,
    /// Native commissioning is permitted.
    pub native_commissioning: bool,
    /// Devices may act as routers.
    pub routers_enabled: bool,
    /// External commissioner traffic is permitted.
    pub external_commissioning: bool,
    /// Network beacons are transmitted.
    pub beacons_enabled: bool,
    /// Commercial commissioning is permitted.
    pub commercial_commissioning: bool,
    /// Autonomous enrollment is permitted.
    pub autonomous_enrollment: bool,
    /// Network key provisioning is permitted.
    pub network_key_provisioning: bool,
    /// ToBLE link is enabled.
    pub toble_link: bool,
    /// Non-CCM routers may participate.
    pub non_ccm_routers: bool,
    /// Minimum routing protocol version for router participation
    /// (5 bits).
    pub version_threshold: u8,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        let mut policy = Self {
            rotation_time_hours: DEFAULT_KEY_ROTATION_TIME,
            obtain_network_key: false,
            native_commissioning: false,
            routers_enabled: false,
            external_commissioning: false,
            beacons_enabled: false,
            commercial_commissioning: false,
            autonomous_enrollment: false,
            network_key_provisioning: false,
            toble_link: false,
            non_ccm_routers: false,
            version_threshold: 0,
        };
        policy.reset_flags();
        policy
    }
}

impl SecurityPolicy {
    /// Resets every flag to its default, leaving the rotation time
    /// untouched.
    pub fn reset_flags(&mut self) {
        self.obtain_network_key = true;
        self.native_commissioning = true;
        self.routers_enabled = true;
        self.external_commissioning = true;
        self.beacons_enabled = true;
        self.commercial_commissioning = false;
        self.autonomous_enrollment = false;
        self.network_key_provisioning = false;
        self.toble_link = true;
        self.non_ccm_routers = false;
        self.version_threshold = 0;
    }

    /// Decodes packed flag bytes, replacing the current flag fields.
    ///
    /// A single-byte encoding leaves every byte-1-controlled field at its
    /// default. The rotation time is not part of the flag encoding and is
    /// unchanged.
    pub fn set_flags(&mut self, flags: &[u8]) -> Result<(), PolicyError> {
        let [first, rest @ ..] = flags else {
            return Err(PolicyError::EmptyFlags);
        };

        self.reset_flags();

        self.obtain_network_key = first & OBTAIN_NETWORK_KEY_MASK != 0;
        self.native_commissioning = first & NATIVE_COMMISSIONING_MASK != 0;
        self.routers_enabled = first & ROUTERS_MASK != 0;
        self.external_commissioning = first & EXTERNAL_COMMISSIONING_MASK != 0;
        self.beacons_enabled = first & BEACONS_MASK != 0;
        self.commercial_commissioning = first & COMMERCIAL_COMMISSIONING_MASK == 0;
        self.autonomous_enrollment = first & AUTONOMOUS_ENROLLMENT_MASK == 0;
        self.network_key_provisioning = first & NETWORK_KEY_PROVISIONING_MASK == 0;

        if let Some(second) = rest.first() {
            self.toble_link = second & TOBLE_LINK_MASK != 0;
            self.non_ccm_routers = second & NON_CCM_ROUTERS_MASK == 0;
            self.version_threshold = second & VERSION_THRESHOLD_MASK;
        }

        Ok(())
    }

    /// Encodes the flags into `out` (zero-filled first).
    ///
    /// With a one-byte buffer only byte 0 is produced; longer buffers get
    /// the full two-byte encoding.
    pub fn write_flags(&self, out: &mut [u8]) -> Result<(), PolicyError> {
        let [first, rest @ ..] = out else {
            return Err(PolicyError::EmptyFlags);
        };

        *first = 0;
        if self.obtain_network_key {
            *first |= OBTAIN_NETWORK_KEY_MASK;
        }
        if self.native_commissioning {
            *first |= NATIVE_COMMISSIONING_MASK;
        }
        if self.routers_enabled {
            *first |= ROUTERS_MASK;
        }
        if self.external_commissioning {
            *first |= EXTERNAL_COMMISSIONING_MASK;
        }
        if self.beacons_enabled {
            *first |= BEACONS_MASK;
        }
        if !self.commercial_commissioning {
            *first |= COMMERCIAL_COMMISSIONING_MASK;
        }
        if !self.autonomous_enrollment {
            *first |= AUTONOMOUS_ENROLLMENT_MASK;
        }
        if !self.network_key_provisioning {
            *first |= NETWORK_KEY_PROVISIONING_MASK;
        }

        if let Some(second) = rest.first_mut() {
            *second = RESERVED_MASK;
            if self.toble_link {
                *second |= TOBLE_LINK_MASK;
            }
            if !self.non_ccm_routers {
                *second |= NON_CCM_ROUTERS_MASK;
            }
            *second |= self.version_threshold & VERSION_THRESHOLD_MASK;
            for byte in rest.iter_mut().skip(1) {
                *byte = 0;
            }
        }

        Ok(())
    }

    /// The full two-byte flag encoding, as advertised in beacons.
    pub fn flag_bytes(&self) -> [u8; POLICY_FLAG_BYTES] {
        let mut out = [0u8; POLICY_FLAG_BYTES];
        let Ok(()) = self.write_flags(&mut out) else {
            unreachable!("two-byte buffer is never empty");
        };
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_flag_bytes() {
        let policy = SecurityPolicy::default();
        // All byte-0 default-on flags plus the three inverted default-off
        // flags; byte 1 carries ToBLE, non-CCM inverted, reserved.
        assert_eq!(policy.flag_bytes(), [0xFF, 0xE0]);
        assert_eq!(policy.rotation_time_hours, DEFAULT_KEY_ROTATION_TIME);
    }

    #[test]
    fn flags_round_trip() {
        let policy = SecurityPolicy {
            obtain_network_key: false,
            commercial_commissioning: true,
            non_ccm_routers: true,
            version_threshold: 0x15,
            ..SecurityPolicy::default()
        };

        let bytes = policy.flag_bytes();

        let mut decoded = SecurityPolicy::default();
        decoded.set_flags(&bytes).unwrap();

        assert_eq!(decoded, policy);
    }

    #[test]
    fn single_byte_decode_defaults_byte_one_fields() {
        let mut policy = SecurityPolicy {
            toble_link: false,
            non_ccm_routers: true,
            version_threshold: 9,
            ..SecurityPolicy::default()
        };

        policy.set_flags(&[0xFF]).unwrap();

        assert!(policy.toble_link);
        assert!(!policy.non_ccm_routers);
        assert_eq!(policy.version_threshold, 0);
    }

    #[test]
    fn empty_flags_are_rejected() {
        let mut policy = SecurityPolicy::default();
        assert_eq!(policy.set_flags(&[]), Err(PolicyError::EmptyFlags));
        assert_eq!(policy.write_flags(&mut []), Err(PolicyError::EmptyFlags));
    }

    #[test]
    fn reserved_bit_is_always_set() {
        let policy = SecurityPolicy::default();
        assert_ne!(policy.flag_bytes()[1] & 0x20, 0);

        let mut everything_off = SecurityPolicy::default();
        everything_off.set_flags(&[0x00, 0x00]).unwrap();
        assert_ne!(everything_off.flag_bytes()[1] & 0x20, 0);
    }

    #[test]
    fn version_threshold_is_masked_to_five_bits() {
        let policy =
            SecurityPolicy { version_threshold: 0xFF, ..SecurityPolicy::default() };
        assert_eq!(policy.flag_bytes()[1] & VERSION_THRESHOLD_MASK, 0x1f);
    }

    #[test]
    fn inverted_flags_decode_as_disabled_when_set() {
        let mut policy = SecurityPolicy::default();
        // Commercial commissioning bit set on the wire means disabled.
        policy.set_flags(&[COMMERCIAL_COMMISSIONING_MASK, 0x20]).unwrap();
        assert!(!policy.commercial_commissioning);

        // Bit clear means enabled.
        policy.set_flags(&[0x00, 0x20]).unwrap();
        assert!(policy.commercial_commissioning);
        assert!(policy.autonomous_enrollment);
        assert!(policy.network_key_provisioning);
    }
}
