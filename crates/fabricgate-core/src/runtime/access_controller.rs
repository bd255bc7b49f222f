// fabricgate-core/src/runtime/access_controller.rs
// ============================================================================
// Module: Fabricgate Access Controller
// Description: Arbitrates (user, resource, action, token) into allow/deny.
// Purpose: The single decision point every resource-touching operation
//          routes through.
// Dependencies: crate::core, crate::interfaces, time
// ============================================================================

//! ## Overview
//! `check_permission` never performs I/O; callers supply the already-loaded
//! resource, sharing record, and verified token data. This keeps the
//! decision function pure and exhaustively testable, matching
//! [`crate::core::access`]'s style.

use time::OffsetDateTime;

use crate::core::AccessGroup;
use crate::core::Permission;
use crate::core::Resource;
use crate::core::SharingRecord;
use crate::core::TokenData;
use crate::core::UserId;
use crate::core::access;

/// The outcome of an access-control decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The action is permitted, with a human-readable reason.
    Allow(&'static str),
    /// The action is denied, with a human-readable reason.
    Deny(&'static str),
}

impl Decision {
    /// Returns whether this decision allows the action.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

/// The action being requested against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read the resource.
    Read,
    /// Modify the resource.
    Write,
    /// Delete the resource.
    Delete,
    /// Administer the resource (reshare, change ownership metadata).
    Admin,
}

impl Action {
    const fn is_mutating(self) -> bool {
        !matches!(self, Self::Read)
    }

    const fn required_permission(self) -> Permission {
        match self {
            Self::Read => Permission::Read,
            Self::Write | Self::Delete => Permission::Write,
            Self::Admin => Permission::Admin,
        }
    }
}

/// Evaluates whether `user` may perform `action` on `resource`, given a
/// verified `token` and an optional `sharing` record.
///
/// Implements the control flow of the access-control component directly:
/// cross-tenant tokens and invalid tokens are rejected first; the owner is
/// always allowed; non-owners may never mutate; visibility and per-member
/// permission then gate reads.
#[must_use]
pub fn check_permission(
    user: &UserId,
    token: &TokenData,
    resource: &Resource,
    sharing: Option<&SharingRecord>,
    action: Action,
    now: OffsetDateTime,
) -> Decision {
    if token.tenant_id != resource.tenant_domain {
        return Decision::Deny("Cross-tenant access denied");
    }

    if *user == resource.owner_id {
        return Decision::Allow("Owner access granted");
    }

    if action.is_mutating() {
        return Decision::Deny("Only owner can modify");
    }

    match resource.access_group {
        AccessGroup::Individual => Decision::Deny("Private resource"),
        AccessGroup::Team => check_team_read(user, resource, sharing, action, now),
        AccessGroup::Organization => Decision::Allow("Organization-wide read access"),
    }
}

fn check_team_read(
    user: &UserId,
    resource: &Resource,
    sharing: Option<&SharingRecord>,
    action: Action,
    now: OffsetDateTime,
) -> Decision {
    if !resource.team_members.contains(user) {
        return Decision::Deny("Not a team member");
    }

    if let Some(sharing) = sharing
        && sharing.is_effective(now)
        && let Some(held) = sharing.permission_for(user)
    {
        return if access::permission_ge(held, action.required_permission()) {
            Decision::Allow("Team member read access")
        } else {
            Decision::Deny("Insufficient permission")
        };
    }

    Decision::Allow("Team member read access")
}
