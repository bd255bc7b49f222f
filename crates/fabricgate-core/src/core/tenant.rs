// fabricgate-core/src/core/tenant.rs
// ============================================================================
// Module: Fabricgate Tenant Path Sanitizer
// Description: The single chokepoint turning a tenant domain into a safe
//              filesystem segment, and tenant-rooted paths from it.
// Purpose: Prevent path traversal and cross-tenant path confusion.
// Dependencies: std
// ============================================================================

//! ## Overview
//! No component other than this module may construct a tenant-rooted path.
//! [`sanitize_tenant`] is deliberately strict: a rejected tenant domain never
//! reaches the filesystem layer at all.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use crate::core::error::CoreError;

/// A tenant domain after sanitization, safe to use as a filesystem segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantSegment(String);

impl TenantSegment {
    /// Returns the sanitized segment as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lowercases, replaces `.` and `-` with `_`, and rejects any character
/// outside `[a-z0-9_]` or an empty result.
///
/// # Errors
/// Returns [`CoreError::InvalidTenant`] if the input is empty after
/// normalization or contains a character outside the allowed set.
pub fn sanitize_tenant(tenant_domain: &str) -> Result<TenantSegment, CoreError> {
    let normalized: String = tenant_domain
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '.' || c == '-' { '_' } else { c })
        .collect();

    if normalized.is_empty() {
        return Err(CoreError::InvalidTenant("empty tenant domain".to_string()));
    }
    if !normalized.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CoreError::InvalidTenant(format!(
            "tenant domain contains disallowed characters: {tenant_domain}"
        )));
    }
    Ok(TenantSegment(normalized))
}

/// Builds the root directory for a tenant under `data_root`.
#[must_use]
pub fn root_for(tenant: &TenantSegment, data_root: &Path) -> PathBuf {
    data_root.join(&tenant.0)
}

/// Joins a relative sub-path onto a tenant root, rejecting any component
/// that would escape it (`..`, absolute paths, or prefix/root components).
///
/// # Errors
/// Returns [`CoreError::InvalidPath`] if `relative` contains a parent,
/// absolute, or root component.
pub fn join_within_tenant(tenant_root: &Path, relative: &Path) -> Result<PathBuf, CoreError> {
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(CoreError::InvalidPath(format!(
                    "path escapes tenant root: {}",
                    relative.display()
                )));
            }
        }
    }
    Ok(tenant_root.join(relative))
}
