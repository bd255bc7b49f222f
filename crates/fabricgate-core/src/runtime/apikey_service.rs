// fabricgate-core/src/runtime/apikey_service.rs
// ============================================================================
// Module: Fabricgate API Key Service
// Description: Create/validate/rotate/revoke lifecycle for API keys.
// Purpose: Reduce long-lived opaque keys to short-lived capability tokens.
// Dependencies: crate::core, rand, sha2, subtle, time
// ============================================================================

//! ## Overview
//! [`generate_raw_key`] and [`hash_raw_key`] are the only two functions that
//! ever see raw key material; everywhere else in the system only the hash is
//! stored or compared. [`validate`] is a pure function over an already
//! loaded [`ApiKey`] plus a rolling request-count window supplied by the
//! caller, so the sliding-window bookkeeping stays outside this module.

use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::ApiKey;
use crate::core::KeyStatus;
use crate::core::RAW_KEY_PREFIX;
use crate::core::TenantDomain;
use crate::core::error::AsErrorKind;
use crate::core::error::CoreErrorKind;

/// Generates a new raw key of the form `gt2_<tenant>_<random>`.
#[must_use]
pub fn generate_raw_key(tenant: &TenantDomain) -> String {
    let mut random_bytes = [0u8; crate::core::apikey::RAW_KEY_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut random_bytes);
    use base64::Engine;
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes);
    format!("{RAW_KEY_PREFIX}_{}_{encoded}", tenant.as_str())
}

/// Hashes a raw key with SHA-256, hex-encoded, for storage and lookup.
#[must_use]
pub fn hash_raw_key(raw_key: &str) -> String {
    let digest = Sha256::digest(raw_key.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Constant-time comparison between a freshly hashed raw key and a stored
/// hash, to avoid timing side channels on lookup-miss vs. hash-mismatch.
#[must_use]
pub fn hashes_match(computed: &str, stored: &str) -> bool {
    computed.as_bytes().ct_eq(stored.as_bytes()).unwrap_u8() == 1
}

/// Reasons [`validate`] rejects a key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// No key matches the supplied hash.
    #[error("invalid API key")]
    NotFound,
    /// The key is suspended, expired, or revoked.
    #[error("key is {0:?}")]
    InactiveStatus(KeyStatus),
    /// The key's `expires_at` has passed; caller should persist the
    /// transition to `Expired`.
    #[error("key has expired")]
    Expired,
    /// The endpoint is not in the key's allowlist, or is in its blocklist.
    #[error("endpoint not permitted: {0}")]
    EndpointDenied(String),
    /// The source IP is not in the key's allowlist.
    #[error("ip not permitted: {0}")]
    IpDenied(String),
    /// The sliding-window rate limit has been exceeded.
    #[error("rate limit exceeded: {0} requests in the last hour")]
    RateLimited(u32),
}

impl AsErrorKind for ValidationError {
    fn kind(&self) -> CoreErrorKind {
        match self {
            Self::NotFound
            | Self::InactiveStatus(_)
            | Self::Expired
            | Self::EndpointDenied(_)
            | Self::IpDenied(_) => CoreErrorKind::InvalidToken,
            Self::RateLimited(_) => CoreErrorKind::RateLimited,
        }
    }
}

/// Outcome of validating a key that passed every static check; the caller
/// (holding the rate-limit window) still increments usage on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Whether the key's `expires_at` requires persisting an `Expired`
    /// transition even though validation already failed for that reason.
    pub should_mark_expired: bool,
}

/// Validates a key's static fields (status, expiry, endpoint/IP
/// restrictions) and the caller-supplied current request count within the
/// rolling window.
///
/// # Errors
/// Returns the first [`ValidationError`] encountered, checked in the order
/// the access interface specifies: status, expiry, endpoint, IP, then rate
/// limit.
pub fn validate(
    key: &ApiKey,
    endpoint: &str,
    source_ip: &str,
    requests_in_window: u32,
    now: OffsetDateTime,
) -> Result<ValidationOutcome, ValidationError> {
    if key.status != KeyStatus::Active {
        return Err(ValidationError::InactiveStatus(key.status));
    }
    if let Some(expires_at) = key.expires_at
        && now > expires_at
    {
        return Err(ValidationError::Expired);
    }
    if !key.endpoint_allowed(endpoint) {
        return Err(ValidationError::EndpointDenied(endpoint.to_string()));
    }
    if !key.ip_allowed(source_ip) {
        return Err(ValidationError::IpDenied(source_ip.to_string()));
    }
    if requests_in_window >= key.rate_limit_per_hour {
        return Err(ValidationError::RateLimited(requests_in_window));
    }
    Ok(ValidationOutcome { should_mark_expired: false })
}
