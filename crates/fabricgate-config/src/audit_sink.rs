// fabricgate-config/src/audit_sink.rs
// ============================================================================
// Module: Fabricgate JSONL Audit Sink
// Description: Production AuditSink implementation backed by per-tenant
//              append-only JSONL files.
// Purpose: Durably record audit occurrences without ever touching another
//          tenant's directory.
// Dependencies: fabricgate-core
// ============================================================================

//! ## Overview
//! [`JsonlAuditSink`] appends one canonical JSON line per [`AuditRecord`] to
//! `<data_root>/<tenant>/_audit/audit_<date>.jsonl`, using the same
//! tenant-sanitizing and atomic-append discipline
//! [`fabricgate_core::runtime::store`] uses for the event log. A write
//! failure is surfaced as [`AuditError::Io`] rather than silently dropped.

use std::path::PathBuf;

use fabricgate_core::append_jsonl;
use fabricgate_core::core::tenant::root_for;
use fabricgate_core::core::tenant::sanitize_tenant;
use fabricgate_core::ensure_dir;
use fabricgate_core::interfaces::AuditError;
use fabricgate_core::interfaces::AuditRecord;
use fabricgate_core::interfaces::AuditSink;

/// Appends audit records to per-tenant, per-day JSONL files under a
/// configured data root.
#[derive(Debug, Clone)]
pub struct JsonlAuditSink {
    data_root: PathBuf,
}

impl JsonlAuditSink {
    /// Creates a sink rooted at `data_root`, the same root tenant
    /// directories are nested under.
    #[must_use]
    pub fn new(data_root: PathBuf) -> Self {
        Self { data_root }
    }

    fn path_for(&self, record: &AuditRecord) -> Result<PathBuf, AuditError> {
        let tenant =
            sanitize_tenant(record.tenant.as_str()).map_err(|err| AuditError::Io(err.to_string()))?;
        let tenant_root = root_for(&tenant, &self.data_root);
        let audit_dir = tenant_root.join("_audit");
        ensure_dir(&audit_dir).map_err(|err| AuditError::Io(err.to_string()))?;
        let date = record.timestamp.date();
        Ok(audit_dir.join(format!("audit_{date}.jsonl")))
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let path = self.path_for(record)?;
        append_jsonl(&path, record).map_err(|err| AuditError::Io(err.to_string()))
    }
}
