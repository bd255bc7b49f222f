// fabricgate-core/src/core/mod.rs
// ============================================================================
// Module: Fabricgate Core Types
// Description: Canonical control-plane data model.
// Purpose: Provide stable, serializable types shared by every runtime module.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types define tenants, resources, sharing, API keys, capability
//! tokens, events, and automations. These are the canonical source of truth
//! for every derived surface (the CLI, MCP dispatch, the integration proxy).

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod access;
pub mod apikey;
pub mod automation;
pub mod error;
pub mod event;
pub mod identifiers;
pub mod resource;
pub mod tenant;
pub mod token;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use access::AccessGroup;
pub use access::Permission;
pub use access::ResourceView;
pub use apikey::ApiKey;
pub use apikey::KeyScope;
pub use apikey::KeyStatus;
pub use apikey::KeyUsage;
pub use apikey::RAW_KEY_PREFIX;
pub use apikey::default_tenant_constraints;
pub use automation::Action;
pub use automation::Automation;
pub use automation::Condition;
pub use automation::ConditionOperator;
pub use automation::ExecutionRecord;
pub use automation::ExecutionState;
pub use automation::ExecutionStep;
pub use automation::LogLevel;
pub use automation::TransformType;
pub use automation::TriggerType;
pub use error::AsErrorKind;
pub use error::CoreError;
pub use error::CoreErrorKind;
pub use event::Event;
pub use event::EVENT_CATALOG;
pub use event::catalog_entry;
pub use identifiers::ApiKeyId;
pub use identifiers::AutomationId;
pub use identifiers::EventId;
pub use identifiers::IntegrationId;
pub use identifiers::McpServerId;
pub use identifiers::ResourceId;
pub use identifiers::TenantDomain;
pub use identifiers::UserId;
pub use resource::Resource;
pub use resource::ResourceType;
pub use resource::SharingRecord;
pub use tenant::TenantSegment;
pub use tenant::join_within_tenant;
pub use tenant::root_for;
pub use tenant::sanitize_tenant;
pub use token::Capability;
pub use token::SigningKey;
pub use token::TokenData;
pub use token::TokenError;
