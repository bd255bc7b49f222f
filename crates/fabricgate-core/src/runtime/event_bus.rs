// fabricgate-core/src/runtime/event_bus.rs
// ============================================================================
// Module: Fabricgate Event Bus
// Description: Append-only event log plus event-triggered automation matching.
// Purpose: Decouples event producers from the automations that react to them.
// Dependencies: crate::core, crate::runtime::store, crate::runtime::condition
// ============================================================================

//! ## Overview
//! [`emit`] is the only write path: it appends the event to a daily JSONL log
//! under `events/<tenant>/<yyyy-mm-dd>.jsonl` and returns the subset of the
//! supplied candidate automations whose trigger matches. Dispatching those
//! matches into the chain executor is left to the caller, keeping the event
//! bus free of any dependency on execution.

use std::path::Path;
use std::path::PathBuf;

use time::OffsetDateTime;
use time::macros::format_description;

use crate::core::Automation;
use crate::core::Event;
use crate::core::TenantDomain;
use crate::core::TriggerType;
use crate::runtime::condition::evaluate_all;
use crate::runtime::store;
use crate::runtime::store::StoreError;

/// Returns the path an event log for `tenant` on `timestamp`'s date lives at,
/// rooted under `events_root`.
#[must_use]
pub fn daily_log_path(events_root: &Path, tenant: &TenantDomain, timestamp: OffsetDateTime) -> PathBuf {
    let format = format_description!("[year]-[month]-[day]");
    #[expect(clippy::unwrap_used, reason = "fixed format never fails to render")]
    let date = timestamp.format(&format).unwrap();
    events_root.join(tenant.as_str()).join(format!("{date}.jsonl"))
}

/// Appends `event` to its tenant's daily log and returns the automations
/// among `candidates` that are active, `Event`-triggered, listen for
/// `event.type`, and whose conditions all hold against the event.
///
/// # Errors
/// Returns [`StoreError`] if the log directory cannot be created or the
/// append fails.
pub fn emit(
    events_root: &Path,
    event: &Event,
    candidates: &[Automation],
) -> Result<Vec<Automation>, StoreError> {
    let log_path = daily_log_path(events_root, &event.tenant, event.timestamp);
    if let Some(parent) = log_path.parent() {
        store::ensure_dir(parent)?;
    }
    store::append_jsonl(&log_path, event)?;

    let matches = candidates
        .iter()
        .filter(|automation| matches_event(automation, event))
        .cloned()
        .collect();
    Ok(matches)
}

fn matches_event(automation: &Automation, event: &Event) -> bool {
    if !automation.is_active || automation.trigger_type != TriggerType::Event {
        return false;
    }
    let listened = automation.listened_event_types();
    if !listened.is_empty() && !listened.iter().any(|t| t == &event.r#type) {
        return false;
    }
    evaluate_all(&automation.conditions, |field| event.resolve_path(field))
}

/// Replays events for `tenant` across `[from, to]` (inclusive), optionally
/// filtered by event type and attributed user, from the daily logs rooted
/// at `events_root`. Corrupt lines are skipped per the store's
/// fault-tolerant read policy.
///
/// # Errors
/// Returns [`StoreError::Io`] if a present log file cannot be read.
pub fn event_history(
    events_root: &Path,
    tenant: &TenantDomain,
    from: OffsetDateTime,
    to: OffsetDateTime,
    event_type: Option<&str>,
    user: Option<&crate::core::UserId>,
) -> Result<Vec<Event>, StoreError> {
    let mut events = Vec::new();
    let mut cursor = from.date();
    let to_date = to.date();
    while cursor <= to_date {
        #[expect(clippy::unwrap_used, reason = "midnight of a valid date always constructs")]
        let day_start = cursor.midnight().assume_utc();
        let path = daily_log_path(events_root, tenant, day_start);
        let mut day_events: Vec<Event> = store::read_jsonl_fault_tolerant(&path)?;
        day_events.retain(|event| {
            event.timestamp >= from
                && event.timestamp <= to
                && event_type.is_none_or(|t| event.r#type == t)
                && user.is_none_or(|u| event.user.as_ref() == Some(u))
        });
        events.append(&mut day_events);
        let Some(next) = cursor.next_day() else { break };
        cursor = next;
    }
    Ok(events)
}
