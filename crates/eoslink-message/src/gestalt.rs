//! Well-known gestalt keys answered by the coprocessor.
//!
//! The coprocessor may answer more keys than these; ask it with
//! `FetchSupportedGestaltKeysList` for the authoritative list.

pub const AP_NONCE: &str = "ApNonce";
pub const BOARD_ID: &str = "BoardId";
pub const BRIDGE_BUILD: &str = "BridgeBuild";
pub const BUILD_VERSION: &str = "BuildVersion";
pub const CERTIFICATE_SECURITY_MODE: &str = "CertificateSecurityMode";
pub const CHIP_ID: &str = "ChipID";
pub const EFFECTIVE_PRODUCTION_STATUS_AP: &str = "EffectiveProductionStatusAp";
pub const EFFECTIVE_SECURITY_MODE_AP: &str = "EffectiveSecurityModeAp";
pub const HARDWARE_PLATFORM: &str = "HardwarePlatform";
pub const HAS_SEP: &str = "HasSEP";
pub const HW_MODEL_STR: &str = "HWModelStr";
pub const IMAGE4_CRYPTO_HASH_METHOD: &str = "Image4CryptoHashMethod";
pub const IMAGE4_SUPPORTED: &str = "Image4Supported";
pub const IS_APPLE_INTERNAL: &str = "IsAppleInternal";
pub const SERIAL_NUMBER: &str = "SerialNumber";
pub const SIGNING_FUSE: &str = "SigningFuse";
pub const SEP_NONCE: &str = "SEPNonce";
pub const UNIQUE_CHIP_ID: &str = "UniqueChipID";

/// Every key above, in declaration order.
pub const KNOWN_KEYS: [&str; 18] = [
    AP_NONCE,
    BOARD_ID,
    BRIDGE_BUILD,
    BUILD_VERSION,
    CERTIFICATE_SECURITY_MODE,
    CHIP_ID,
    EFFECTIVE_PRODUCTION_STATUS_AP,
    EFFECTIVE_SECURITY_MODE_AP,
    HARDWARE_PLATFORM,
    HAS_SEP,
    HW_MODEL_STR,
    IMAGE4_CRYPTO_HASH_METHOD,
    IMAGE4_SUPPORTED,
    IS_APPLE_INTERNAL,
    SERIAL_NUMBER,
    SIGNING_FUSE,
    SEP_NONCE,
    UNIQUE_CHIP_ID,
];

/// Returns true if `key` is one of the well-known keys.
pub fn is_known(key: &str) -> bool {
    KNOWN_KEYS.contains(&key)
}
