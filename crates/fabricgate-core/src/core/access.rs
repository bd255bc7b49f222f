// fabricgate-core/src/core/access.rs
// ============================================================================
// Module: Fabricgate Access-Group Algebra
// Description: Pure visibility and permission-ranking functions.
// Purpose: Implement the Individual/Team/Organization sharing model and the
//          Read < Write < Admin permission order.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Everything in this module is a pure function of its arguments: no I/O, no
//! clock. The access controller (`runtime::access_controller`) is the only
//! caller; keeping the algebra free of side effects makes it exhaustively
//! testable without a filesystem.

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::TenantDomain;
use crate::core::identifiers::UserId;

/// Resource visibility scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessGroup {
    /// Visible only to the owner.
    Individual,
    /// Visible to the owner and an explicit member list.
    Team,
    /// Visible to every user in the owning tenant.
    Organization,
}

/// Permission level, ordered `Read < Write < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Read-only access.
    Read,
    /// Read and modify.
    Write,
    /// Full control, including sharing and deletion.
    Admin,
}

/// Minimal view of a resource needed to evaluate visibility, decoupled from
/// the full persisted [`crate::core::resource::Resource`] record so the
/// algebra stays a pure function of plain values.
pub struct ResourceView<'a> {
    /// Owning user.
    pub owner_id: &'a UserId,
    /// Owning tenant.
    pub tenant_domain: &'a TenantDomain,
    /// Visibility scope.
    pub access_group: AccessGroup,
    /// Team member list; only meaningful when `access_group == Team`.
    pub team_members: &'a [UserId],
}

/// Returns whether `user` (of tenant `user_tenant`) may see `resource` at
/// all, independent of write/admin permission.
#[must_use]
pub fn visible(user: &UserId, user_tenant: &TenantDomain, resource: &ResourceView<'_>) -> bool {
    if user == resource.owner_id {
        return true;
    }
    match resource.access_group {
        AccessGroup::Individual => false,
        AccessGroup::Team => resource.team_members.contains(user),
        AccessGroup::Organization => user_tenant == resource.tenant_domain,
    }
}

/// Returns whether `user` may mutate `resource`: only the owner may.
#[must_use]
pub fn mutable(user: &UserId, resource: &ResourceView<'_>) -> bool {
    user == resource.owner_id
}

/// Returns true iff `held` meets or exceeds `required` on the `Read < Write
/// < Admin` order.
#[must_use]
pub fn permission_ge(held: Permission, required: Permission) -> bool {
    held >= required
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view<'a>(
        owner: &'a UserId,
        tenant: &'a TenantDomain,
        group: AccessGroup,
        members: &'a [UserId],
    ) -> ResourceView<'a> {
        ResourceView {
            owner_id: owner,
            tenant_domain: tenant,
            access_group: group,
            team_members: members,
        }
    }

    #[test]
    fn owner_always_visible() {
        let owner = UserId::new("owner");
        let tenant = TenantDomain::new("acme");
        let resource = view(&owner, &tenant, AccessGroup::Individual, &[]);
        assert!(visible(&owner, &tenant, &resource));
    }

    #[test]
    fn individual_hidden_from_others() {
        let owner = UserId::new("owner");
        let other = UserId::new("other");
        let tenant = TenantDomain::new("acme");
        let resource = view(&owner, &tenant, AccessGroup::Individual, &[]);
        assert!(!visible(&other, &tenant, &resource));
    }

    #[test]
    fn team_visible_to_members_only() {
        let owner = UserId::new("owner");
        let member = UserId::new("member");
        let stranger = UserId::new("stranger");
        let tenant = TenantDomain::new("acme");
        let members = [member.clone()];
        let resource = view(&owner, &tenant, AccessGroup::Team, &members);
        assert!(visible(&member, &tenant, &resource));
        assert!(!visible(&stranger, &tenant, &resource));
    }

    #[test]
    fn organization_visible_within_tenant_only() {
        let owner = UserId::new("owner");
        let same_tenant_user = UserId::new("colleague");
        let other_tenant_user = UserId::new("outsider");
        let tenant = TenantDomain::new("acme");
        let other_tenant = TenantDomain::new("other");
        let resource = view(&owner, &tenant, AccessGroup::Organization, &[]);
        assert!(visible(&same_tenant_user, &tenant, &resource));
        assert!(!visible(&other_tenant_user, &other_tenant, &resource));
    }

    #[test]
    fn only_owner_is_mutable() {
        let owner = UserId::new("owner");
        let other = UserId::new("other");
        let tenant = TenantDomain::new("acme");
        let resource = view(&owner, &tenant, AccessGroup::Organization, &[]);
        assert!(mutable(&owner, &resource));
        assert!(!mutable(&other, &resource));
    }

    #[test]
    fn permission_order_is_read_write_admin() {
        assert!(permission_ge(Permission::Admin, Permission::Read));
        assert!(permission_ge(Permission::Write, Permission::Write));
        assert!(!permission_ge(Permission::Read, Permission::Write));
    }
}
