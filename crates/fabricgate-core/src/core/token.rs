// fabricgate-core/src/core/token.rs
// ============================================================================
// Module: Fabricgate Capability Token Codec
// Description: Minting, signing, parsing, and verifying capability tokens.
// Purpose: The single envelope format every downstream component trusts for
//          authorization, so that tokens stay opaque outside this module.
// Dependencies: serde, serde_json, sha2, subtle, base64, time
// ============================================================================

//! ## Overview
//! A capability token is a compact signed envelope:
//! `base64url(header) "." base64url(payload) "." base64url(signature)`,
//! where `signature = HMAC-SHA256(signing_key, header_b64 "." payload_b64)`
//! over the canonical-JSON payload. Verification recomputes the signature
//! with a constant-time comparison before inspecting any other field.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;

use crate::core::error::AsErrorKind;
use crate::core::error::CoreErrorKind;
use crate::core::identifiers::TenantDomain;
use crate::core::identifiers::UserId;

/// Default clock-skew tolerance applied when checking token expiry.
pub const CLOCK_SKEW_TOLERANCE: Duration = Duration::seconds(60);

/// Default token lifetime when the caller does not specify one.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::hours(1);

const HEADER_ALG: &str = "HS256";
const HEADER_TYP: &str = "CGT";

/// One granted capability: a resource pattern, the actions it covers, and
/// optional numeric/structural constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Resource pattern, e.g. `"mcp:rag:*"` or `"integration:slack:post"`.
    pub resource: String,
    /// Actions this capability grants; `["*"]` grants all.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Constraints scoped to this capability (e.g. `max_loop_iterations`).
    #[serde(default)]
    pub constraints: BTreeMap<String, serde_json::Value>,
}

impl Capability {
    /// Returns whether this capability's resource pattern matches
    /// `required`, honoring a trailing `*` wildcard on either a whole
    /// resource or an action suffix.
    #[must_use]
    pub fn matches(&self, required: &str) -> bool {
        wildcard_match(&self.resource, required)
    }
}

fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        candidate.starts_with(prefix)
    } else {
        pattern == candidate
    }
}

/// The decoded, verified contents of a capability token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenData {
    /// Subject (user) the token was minted for.
    pub sub: UserId,
    /// Tenant the token is scoped to.
    pub tenant_id: TenantDomain,
    /// Originating API key, if minted via key exchange.
    #[serde(default)]
    pub api_key_id: Option<String>,
    /// Token scope label (`user`, `tenant`, `admin`).
    #[serde(default)]
    pub scope: String,
    /// Granted capabilities.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Token-wide constraints (chain depth, timeouts, loop caps, ...).
    #[serde(default)]
    pub constraints: BTreeMap<String, serde_json::Value>,
    /// Rate-limit overrides carried from the originating API key.
    #[serde(default)]
    pub rate_limits: BTreeMap<String, serde_json::Value>,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

impl TokenData {
    /// Returns the first matching capability for `required`, if any.
    #[must_use]
    pub fn find_capability(&self, required: &str) -> Option<&Capability> {
        self.capabilities.iter().find(|cap| cap.matches(required))
    }

    /// Returns whether the token grants `required` (a `resource` or
    /// `resource:action` pattern).
    #[must_use]
    pub fn has_capability(&self, required: &str) -> bool {
        self.find_capability(required).is_some()
    }

    /// Reads an integer constraint, falling back to `default` if absent or
    /// not representable as `i64`.
    #[must_use]
    pub fn constraint_i64(&self, key: &str, default: i64) -> i64 {
        self.constraints
            .get(key)
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(default)
    }
}

/// A signing key scoped to a single tenant.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }
}

/// Errors raised while minting or verifying a capability token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token string was not well-formed (wrong segment count or invalid
    /// base64url).
    #[error("malformed token")]
    Malformed,
    /// The recomputed signature did not match.
    #[error("signature mismatch")]
    SignatureMismatch,
    /// The payload did not deserialize into [`TokenData`].
    #[error("invalid token payload: {0}")]
    InvalidPayload(String),
    /// The token has expired (outside clock-skew tolerance).
    #[error("token expired")]
    Expired,
    /// The header declared an unsupported algorithm or type.
    #[error("unsupported token header")]
    UnsupportedHeader,
}

impl AsErrorKind for TokenError {
    fn kind(&self) -> CoreErrorKind {
        CoreErrorKind::InvalidToken
    }
}

#[derive(Serialize, Deserialize)]
struct Header<'a> {
    alg: &'a str,
    typ: &'a str,
}

/// Mints a new signed capability token.
#[must_use]
pub fn mint(
    key: &SigningKey,
    sub: UserId,
    tenant_id: TenantDomain,
    scope: impl Into<String>,
    capabilities: Vec<Capability>,
    constraints: BTreeMap<String, serde_json::Value>,
    ttl: Duration,
    now: OffsetDateTime,
) -> String {
    let data = TokenData {
        sub,
        tenant_id,
        api_key_id: None,
        scope: scope.into(),
        capabilities,
        constraints,
        rate_limits: BTreeMap::new(),
        iat: now.unix_timestamp(),
        exp: (now + ttl).unix_timestamp(),
    };
    encode(key, &data)
}

/// Encodes an already-built [`TokenData`] into a signed compact string.
#[must_use]
pub fn encode(key: &SigningKey, data: &TokenData) -> String {
    let header = Header { alg: HEADER_ALG, typ: HEADER_TYP };
    let header_b64 = URL_SAFE_NO_PAD.encode(canonical_json(&header));
    let payload_b64 = URL_SAFE_NO_PAD.encode(canonical_json(data));
    let signature = sign(key, &header_b64, &payload_b64);
    let signature_b64 = URL_SAFE_NO_PAD.encode(signature);
    format!("{header_b64}.{payload_b64}.{signature_b64}")
}

/// Verifies a token string's signature and expiry, returning its data.
///
/// # Errors
/// Returns [`TokenError`] if the token is malformed, unsigned with `key`,
/// structurally invalid, or expired.
pub fn verify(key: &SigningKey, token: &str, now: OffsetDateTime) -> Result<TokenData, TokenError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(|_| TokenError::Malformed)?;
    let header: Header<'_> =
        serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;
    if header.alg != HEADER_ALG || header.typ != HEADER_TYP {
        return Err(TokenError::UnsupportedHeader);
    }

    let expected_signature = sign(key, header_b64, payload_b64);
    let actual_signature =
        URL_SAFE_NO_PAD.decode(signature_b64).map_err(|_| TokenError::Malformed)?;
    if expected_signature.ct_eq(&actual_signature).unwrap_u8() != 1 {
        return Err(TokenError::SignatureMismatch);
    }

    let payload_bytes = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| TokenError::Malformed)?;
    let data: TokenData = serde_json::from_slice(&payload_bytes)
        .map_err(|err| TokenError::InvalidPayload(err.to_string()))?;

    let exp = OffsetDateTime::from_unix_timestamp(data.exp).map_err(|_| TokenError::Malformed)?;
    if now > exp + CLOCK_SKEW_TOLERANCE {
        return Err(TokenError::Expired);
    }

    Ok(data)
}

fn sign(key: &SigningKey, header_b64: &str, payload_b64: &str) -> Vec<u8> {
    let mut mac_input = Vec::with_capacity(header_b64.len() + payload_b64.len() + 1);
    mac_input.extend_from_slice(header_b64.as_bytes());
    mac_input.push(b'.');
    mac_input.extend_from_slice(payload_b64.as_bytes());

    // HMAC-SHA256 built directly from the primitive rather than pulling in
    // the `hmac` crate: ipad/opad per RFC 2104, block size 64 bytes.
    const BLOCK_SIZE: usize = 64;
    let mut block_key = [0u8; BLOCK_SIZE];
    if key.0.len() > BLOCK_SIZE {
        let hashed = Sha256::digest(&key.0);
        block_key[..hashed.len()].copy_from_slice(&hashed);
    } else {
        block_key[..key.0.len()].copy_from_slice(&key.0);
    }

    let mut ipad = [0x36u8; BLOCK_SIZE];
    let mut opad = [0x5cu8; BLOCK_SIZE];
    for i in 0..BLOCK_SIZE {
        ipad[i] ^= block_key[i];
        opad[i] ^= block_key[i];
    }

    let mut inner = Sha256::new();
    inner.update(ipad);
    inner.update(&mac_input);
    let inner_digest = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(opad);
    outer.update(inner_digest);
    outer.finalize().to_vec()
}

fn canonical_json<T: Serialize>(value: &T) -> Vec<u8> {
    // Sorted-key, whitespace-free JSON so the signature is deterministic
    // regardless of struct field declaration order.
    let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
    serde_jcs::to_vec(&value).unwrap_or_else(|_| b"null".to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SigningKey {
        SigningKey::new(b"test-signing-key".to_vec())
    }

    #[test]
    fn mint_then_verify_round_trips_fields() {
        let now = OffsetDateTime::now_utc();
        let caps = vec![Capability {
            resource: "mcp:rag:*".to_string(),
            actions: vec!["*".to_string()],
            constraints: BTreeMap::new(),
        }];
        let token = mint(
            &key(),
            UserId::new("alice"),
            TenantDomain::new("acme"),
            "user",
            caps,
            BTreeMap::new(),
            DEFAULT_TOKEN_TTL,
            now,
        );
        let data = verify(&key(), &token, now).expect("valid token");
        assert_eq!(data.sub.as_str(), "alice");
        assert_eq!(data.tenant_id.as_str(), "acme");
        assert!(data.has_capability("mcp:rag:search"));
    }

    #[test]
    fn verify_rejects_tampered_signature() {
        let now = OffsetDateTime::now_utc();
        let token = mint(
            &key(),
            UserId::new("alice"),
            TenantDomain::new("acme"),
            "user",
            vec![],
            BTreeMap::new(),
            DEFAULT_TOKEN_TTL,
            now,
        );
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(matches!(verify(&key(), &tampered, now), Err(TokenError::SignatureMismatch)));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let now = OffsetDateTime::now_utc();
        let token = mint(
            &key(),
            UserId::new("alice"),
            TenantDomain::new("acme"),
            "user",
            vec![],
            BTreeMap::new(),
            DEFAULT_TOKEN_TTL,
            now,
        );
        let other_key = SigningKey::new(b"different-key".to_vec());
        assert!(matches!(verify(&other_key, &token, now), Err(TokenError::SignatureMismatch)));
    }

    #[test]
    fn verify_rejects_expired_token_past_skew_tolerance() {
        let now = OffsetDateTime::now_utc();
        let token = mint(
            &key(),
            UserId::new("alice"),
            TenantDomain::new("acme"),
            "user",
            vec![],
            BTreeMap::new(),
            Duration::seconds(1),
            now,
        );
        let later = now + Duration::seconds(1) + CLOCK_SKEW_TOLERANCE + Duration::seconds(1);
        assert!(matches!(verify(&key(), &token, later), Err(TokenError::Expired)));
    }

    #[test]
    fn capability_wildcard_matches_prefix_only() {
        let wildcard = Capability {
            resource: "x:*".to_string(),
            actions: vec!["*".to_string()],
            constraints: BTreeMap::new(),
        };
        assert!(wildcard.matches("x:y:z"));
        let exact = Capability {
            resource: "x:y".to_string(),
            actions: vec!["*".to_string()],
            constraints: BTreeMap::new(),
        };
        assert!(!exact.matches("x:yz"));
    }
}
