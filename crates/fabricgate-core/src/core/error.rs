// fabricgate-core/src/core/error.rs
// ============================================================================
// Module: Fabricgate Error Taxonomy
// Description: Shared error-kind enum implementing the control-plane error table.
// Purpose: Let every component classify its failures without agreeing on a
//          single concrete error type.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! `CoreErrorKind` is not itself the error type any function returns; it is
//! the classification every component's own `thiserror` enum can be asked
//! for via [`AsErrorKind`]. Callers that only care "was this a permission
//! problem or a rate limit" match on the kind instead of each crate's
//! concrete variants.

use thiserror::Error;

/// Coarse failure classification shared across every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorKind {
    /// Malformed request or path.
    InvalidInput,
    /// Tenant-name sanitization rejected the input.
    InvalidTenant,
    /// Capability token failed signature, expiry, or structural checks.
    InvalidToken,
    /// Token and resource tenants differ.
    CrossTenant,
    /// Access controller denied the action.
    PermissionDenied,
    /// Referenced resource, automation, or key does not exist.
    NotFound,
    /// Sliding-window rate limit exceeded.
    RateLimited,
    /// Daily or monthly quota exceeded.
    QuotaExceeded,
    /// Automation chain exceeded its configured depth bound.
    ChainDepthExceeded,
    /// Operation exceeded its wall-clock deadline.
    Timeout,
    /// A sandbox pre-flight check rejected the request before any I/O.
    SandboxViolation,
    /// An external call failed.
    UpstreamFailure,
    /// A persisted record could not be parsed.
    IntegrityError,
}

/// Implemented by every component error enum so callers can classify a
/// failure without matching its concrete variants.
pub trait AsErrorKind {
    /// Returns the coarse classification for this error.
    fn kind(&self) -> CoreErrorKind;
}

/// Errors produced by the tenant sanitizer, identifiers, and access algebra.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The supplied tenant domain contains characters outside `[a-z0-9._-]`
    /// or is empty after sanitization.
    #[error("invalid tenant domain: {0}")]
    InvalidTenant(String),
    /// The supplied path would escape the tenant root.
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl AsErrorKind for CoreError {
    fn kind(&self) -> CoreErrorKind {
        match self {
            Self::InvalidTenant(_) => CoreErrorKind::InvalidTenant,
            Self::InvalidPath(_) => CoreErrorKind::InvalidInput,
        }
    }
}
