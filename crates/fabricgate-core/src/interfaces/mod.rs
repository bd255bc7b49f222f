// fabricgate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Fabricgate Interfaces
// Description: Backend-agnostic interfaces for audit, clock, and storage.
// Purpose: Define the contract surfaces used by the runtime without binding
//          it to a concrete filesystem or clock implementation.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces let every runtime module stay deterministic and testable: a
//! [`Clock`] replaces `OffsetDateTime::now_utc()` calls, and an [`AuditSink`]
//! replaces ad hoc logging. Implementations must fail closed rather than
//! silently dropping a record.

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::TenantDomain;
use crate::core::UserId;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Supplies the current time, abstracted so tests can control it.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> OffsetDateTime;
}

/// A clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// One structured audit occurrence: an allow/deny decision, a usage tick, or
/// an integrity skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// When the occurrence was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Short action label, e.g. `"cross_tenant_attempt"`, `"key_validated"`.
    pub action: String,
    /// Owning tenant.
    pub tenant: TenantDomain,
    /// Acting user, if known.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Free-form structured detail.
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    /// Integration identifier, when the record concerns an integration call.
    #[serde(default)]
    pub integration_id: Option<String>,
    /// Sandbox restrictions that were applied before or during the call.
    #[serde(default)]
    pub restrictions_applied: Vec<String>,
}

/// Errors raised while recording an audit record.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The sink could not durably record the event.
    #[error("audit sink io error: {0}")]
    Io(String),
}

/// A destination for structured audit records.
pub trait AuditSink: Send + Sync {
    /// Records one audit occurrence.
    ///
    /// # Errors
    /// Returns [`AuditError`] if the record could not be durably written.
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// An audit sink that discards every record; used in tests and embedding
/// contexts that do not want audit I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Ok(())
    }
}
