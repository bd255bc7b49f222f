// fabricgate-core/src/core/resource.rs
// ============================================================================
// Module: Fabricgate Resource & Sharing Model
// Description: Persisted resource and sharing-record types.
// Purpose: The data shape stored under resources/ and shares/ in a tenant tree.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Persisted resource and sharing-record types, stored under `resources/`
//! and `shares/` in a tenant tree.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::access::AccessGroup;
use crate::core::access::Permission;
use crate::core::identifiers::ResourceId;
use crate::core::identifiers::TenantDomain;
use crate::core::identifiers::UserId;

/// The kind of thing a resource represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// A dataset of documents.
    Dataset,
    /// An AI agent configuration.
    Agent,
    /// An automation workflow.
    Workflow,
    /// A registered MCP tool server.
    McpServer,
    /// An external integration configuration.
    Integration,
    /// A single document.
    Document,
    /// A free-form configuration blob.
    Configuration,
}

/// A persisted, ownable, shareable resource.
///
/// Invariant: `team_members` on the attached [`SharingRecord`] is non-empty
/// iff `access_group == AccessGroup::Team`, and `owner_id` never appears in
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Stable identifier.
    pub id: ResourceId,
    /// Human-readable name.
    pub name: String,
    /// Resource kind.
    pub r#type: ResourceType,
    /// Owning user.
    pub owner_id: UserId,
    /// Owning tenant.
    pub tenant_domain: TenantDomain,
    /// Visibility scope.
    pub access_group: AccessGroup,
    /// Team membership; see invariant above.
    #[serde(default)]
    pub team_members: Vec<UserId>,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last-update timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Free-form metadata, opaque to the core.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Resource {
    /// Returns whether `team_members` is consistent with `access_group` and
    /// does not include the owner.
    #[must_use]
    pub fn has_consistent_team_membership(&self) -> bool {
        let team_members_nonempty_iff_team = (self.access_group == AccessGroup::Team)
            == !self.team_members.is_empty();
        let owner_not_a_member = !self.team_members.contains(&self.owner_id);
        team_members_nonempty_iff_team && owner_not_a_member
    }
}

/// Side-table recording team membership and per-member permission for a
/// shared resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingRecord {
    /// Resource this record shares.
    pub resource_id: ResourceId,
    /// Owning user, duplicated from the resource for convenient lookups.
    pub owner_id: UserId,
    /// Visibility scope at the time of sharing.
    pub access_group: AccessGroup,
    /// Team membership at the time of sharing.
    #[serde(default)]
    pub team_members: Vec<UserId>,
    /// Per-member permission overrides.
    #[serde(default)]
    pub team_permissions: BTreeMap<UserId, Permission>,
    /// Optional expiration; an expired record is treated as inactive
    /// regardless of `is_active`.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    /// Whether the record is administratively active.
    pub is_active: bool,
}

impl SharingRecord {
    /// Returns whether the record grants access at `now`, accounting for
    /// expiration.
    #[must_use]
    pub fn is_effective(&self, now: OffsetDateTime) -> bool {
        if !self.is_active {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => now <= expires_at,
            None => true,
        }
    }

    /// Looks up the permission granted to `user`, if any.
    #[must_use]
    pub fn permission_for(&self, user: &UserId) -> Option<Permission> {
        self.team_permissions.get(user).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn now() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::days(19000)
    }

    #[test]
    fn expired_record_is_not_effective_even_if_marked_active() {
        let record = SharingRecord {
            resource_id: ResourceId::new("r1"),
            owner_id: UserId::new("owner"),
            access_group: AccessGroup::Team,
            team_members: vec![UserId::new("member")],
            team_permissions: BTreeMap::new(),
            expires_at: Some(now() - Duration::days(1)),
            is_active: true,
        };
        assert!(!record.is_effective(now()));
    }

    #[test]
    fn inactive_record_is_never_effective() {
        let record = SharingRecord {
            resource_id: ResourceId::new("r1"),
            owner_id: UserId::new("owner"),
            access_group: AccessGroup::Team,
            team_members: vec![],
            team_permissions: BTreeMap::new(),
            expires_at: None,
            is_active: false,
        };
        assert!(!record.is_effective(now()));
    }

    #[test]
    fn team_membership_invariant_catches_owner_in_members() {
        let resource = Resource {
            id: ResourceId::new("r1"),
            name: "bad".to_string(),
            r#type: ResourceType::Dataset,
            owner_id: UserId::new("owner"),
            tenant_domain: TenantDomain::new("acme"),
            access_group: AccessGroup::Team,
            team_members: vec![UserId::new("owner")],
            created_at: now(),
            updated_at: now(),
            metadata: BTreeMap::new(),
        };
        assert!(!resource.has_consistent_team_membership());
    }
}
