// fabricgate-core/src/core/identifiers.rs
// ============================================================================
// Module: Fabricgate Identifiers
// Description: Canonical opaque identifiers for tenants, users, and resources.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every persisted record in the control plane is addressed by one of the
//! identifiers below. They are opaque newtypes over `String`: validation of
//! *shape* happens at the boundary that constructs them (tenant names go
//! through [`crate::core::tenant::sanitize_tenant`]; all others are expected
//! to be caller-supplied UUIDs and are not otherwise constrained here).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

opaque_id!(
    /// Raw, caller-supplied tenant domain (pre-sanitization).
    TenantDomain
);
opaque_id!(
    /// User identifier, unique within a tenant.
    UserId
);
opaque_id!(
    /// Resource identifier (dataset, agent, workflow, mcp server, ...).
    ResourceId
);
opaque_id!(
    /// API key identifier (not the raw key material).
    ApiKeyId
);
opaque_id!(
    /// Automation identifier.
    AutomationId
);
opaque_id!(
    /// Event identifier.
    EventId
);
opaque_id!(
    /// Integration configuration identifier.
    IntegrationId
);
opaque_id!(
    /// MCP server resource identifier.
    McpServerId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_as_str() {
        let id = UserId::new("alice@acme.io");
        assert_eq!(id.as_str(), "alice@acme.io");
        assert_eq!(id.to_string(), "alice@acme.io");
    }

    #[test]
    fn serializes_as_a_bare_string() {
        let id = ResourceId::new("r-1");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"r-1\"");
    }
}
