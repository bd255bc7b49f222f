// fabricgate-core/src/core/event.rs
// ============================================================================
// Module: Fabricgate Event Model
// Description: Persisted event records and the fixed event-type catalog.
// Purpose: The data shape appended to events/store/*.jsonl.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Persisted event records and the fixed catalog of event types the control
//! plane can emit, appended to `events/store/*.jsonl`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::EventId;
use crate::core::identifiers::TenantDomain;
use crate::core::identifiers::UserId;

/// One entry in the fixed event-type catalog: a type name plus the data
/// fields a producer is expected to supply.
pub struct CatalogEntry {
    /// Dotted event type, e.g. `"document.uploaded"`.
    pub event_type: &'static str,
    /// Field names expected in `Event::data`.
    pub required_fields: &'static [&'static str],
}

/// The fixed event-type catalog. Producers of an unlisted type are not
/// rejected, only logged as unexpected by the event bus.
pub const EVENT_CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        event_type: "document.uploaded",
        required_fields: &["document_id", "dataset_id", "filename"],
    },
    CatalogEntry {
        event_type: "document.processed",
        required_fields: &["document_id", "chunks_created"],
    },
    CatalogEntry {
        event_type: "agent.created",
        required_fields: &["agent_id", "name", "owner_id"],
    },
    CatalogEntry {
        event_type: "chat.started",
        required_fields: &["conversation_id", "agent_id"],
    },
    CatalogEntry {
        event_type: "resource.shared",
        required_fields: &["resource_id", "access_group", "shared_with"],
    },
    CatalogEntry {
        event_type: "quota.warning",
        required_fields: &["resource_type", "current_usage", "limit"],
    },
    CatalogEntry {
        event_type: "automation.completed",
        required_fields: &["automation_id", "result", "duration_ms"],
    },
    CatalogEntry {
        event_type: "automation.failed",
        required_fields: &["automation_id", "error", "retry_count"],
    },
];

/// Returns the catalog entry for `event_type`, if it is a known type.
#[must_use]
pub fn catalog_entry(event_type: &str) -> Option<&'static CatalogEntry> {
    EVENT_CATALOG.iter().find(|entry| entry.event_type == event_type)
}

/// A domain event, append-only once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Stable identifier.
    pub id: EventId,
    /// Dotted event type.
    pub r#type: String,
    /// Owning tenant.
    pub tenant: TenantDomain,
    /// User the event is attributed to, if any.
    #[serde(default)]
    pub user: Option<UserId>,
    /// Emission timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Event-specific payload, indexed by automation conditions prefixed
    /// with `data.`.
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
    /// Producer metadata, not used for condition matching.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Event {
    /// Resolves a dotted field path against this event for automation
    /// condition matching.
    ///
    /// Paths prefixed with `data.` index into [`Event::data`] (with the
    /// prefix stripped); every other path indexes into the event's
    /// top-level attributes (`type`, `tenant`, `user`, `timestamp`).
    /// Unresolvable paths yield `None`.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> Option<serde_json::Value> {
        if let Some(rest) = path.strip_prefix("data.") {
            return resolve_dotted(&serde_json::to_value(&self.data).ok()?, rest);
        }
        match path {
            "type" => Some(serde_json::Value::String(self.r#type.clone())),
            "tenant" => Some(serde_json::Value::String(self.tenant.as_str().to_string())),
            "user" => self.user.as_ref().map(|u| serde_json::Value::String(u.as_str().to_string())),
            other => resolve_dotted(&serde_json::to_value(self).ok()?, other),
        }
    }
}

fn resolve_dotted(root: &serde_json::Value, path: &str) -> Option<serde_json::Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        let mut data = BTreeMap::new();
        data.insert("document_id".to_string(), serde_json::json!("doc-1"));
        data.insert("chunks_created".to_string(), serde_json::json!(7));
        Event {
            id: EventId::new("e1"),
            r#type: "document.processed".to_string(),
            tenant: TenantDomain::new("acme"),
            user: Some(UserId::new("alice")),
            timestamp: OffsetDateTime::now_utc(),
            data,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn data_prefixed_path_indexes_into_data() {
        let event = sample_event();
        assert_eq!(event.resolve_path("data.chunks_created"), Some(serde_json::json!(7)));
    }

    #[test]
    fn unprefixed_path_indexes_into_event_attributes() {
        let event = sample_event();
        assert_eq!(event.resolve_path("type"), Some(serde_json::json!("document.processed")));
    }

    #[test]
    fn missing_path_resolves_to_none() {
        let event = sample_event();
        assert_eq!(event.resolve_path("data.nonexistent"), None);
    }

    #[test]
    fn catalog_lookup_finds_known_types() {
        let entry = catalog_entry("document.uploaded").expect("known type");
        assert_eq!(entry.required_fields, &["document_id", "dataset_id", "filename"]);
        assert!(catalog_entry("totally.unknown").is_none());
    }
}
