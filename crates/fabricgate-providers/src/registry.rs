// fabricgate-providers/src/registry.rs
// ============================================================================
// Module: Fabricgate Integration Registry
// Description: Holds per-tenant integration configs and dispatches calls.
// Purpose: The lookup layer between a capability token and the proxy.
// Dependencies: fabricgate-core
// ============================================================================

//! ## Overview
//! The registry is an in-memory cache over integration configs that are
//! themselves persisted as [`fabricgate_core::core::Resource`] metadata by
//! the broker; this module only holds the decoded [`IntegrationConfig`]
//! values and routes a call to [`crate::http::execute_integration`].

use std::collections::BTreeMap;

use thiserror::Error;

use fabricgate_core::core::error::AsErrorKind;
use fabricgate_core::core::error::CoreErrorKind;
use fabricgate_core::core::identifiers::IntegrationId;
use fabricgate_core::core::token::TokenData;

use crate::http::IntegrationConfig;
use crate::http::ProxyError;
use crate::http::ProxyRequest;
use crate::http::ProxyResponse;
use crate::http::execute_integration;

/// Errors raised while looking up or dispatching through the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No integration is registered under the requested identifier.
    #[error("integration not registered: {0}")]
    NotFound(IntegrationId),
    /// The proxy rejected the request before dispatch.
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

impl AsErrorKind for RegistryError {
    fn kind(&self) -> CoreErrorKind {
        match self {
            Self::NotFound(_) => CoreErrorKind::NotFound,
            Self::Proxy(inner) => inner.kind(),
        }
    }
}

/// An in-memory registry of integration configs for one process.
#[derive(Default)]
pub struct IntegrationRegistry {
    configs: BTreeMap<IntegrationId, IntegrationConfig>,
}

impl IntegrationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a config.
    pub fn register(&mut self, config: IntegrationConfig) {
        self.configs.insert(config.id.clone(), config);
    }

    /// Returns the config for `id`, if registered.
    #[must_use]
    pub fn get(&self, id: &IntegrationId) -> Option<&IntegrationConfig> {
        self.configs.get(id)
    }

    /// Looks up `id` and dispatches `request` through [`execute_integration`].
    ///
    /// # Errors
    /// Returns [`RegistryError::NotFound`] if `id` is unregistered, or
    /// propagates a [`ProxyError`] from dispatch.
    pub fn call(
        &self,
        id: &IntegrationId,
        token: &TokenData,
        request: &ProxyRequest,
        requests_in_window: u32,
    ) -> Result<ProxyResponse, RegistryError> {
        let config = self.configs.get(id).ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        Ok(execute_integration(config, token, request, requests_in_window)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::AuthMethod;
    use crate::http::SandboxLevel;
    use fabricgate_core::core::identifiers::TenantDomain;
    use fabricgate_core::core::identifiers::UserId;

    fn config() -> IntegrationConfig {
        IntegrationConfig {
            id: IntegrationId::new("slack"),
            name: "Slack".to_string(),
            base_url: "https://hooks.example.com".to_string(),
            auth_method: AuthMethod::OAuth2 { access_token: "t".to_string() },
            sandbox_level: SandboxLevel::Basic,
            custom_headers: BTreeMap::new(),
            max_requests_per_hour: 10,
            max_response_size_bytes: 1024,
            timeout_seconds: 5,
            allowed_methods: vec![],
            allowed_endpoints: vec![],
            blocked_endpoints: vec![],
            allow_private_networks: false,
            is_active: true,
        }
    }

    #[test]
    fn call_to_unregistered_integration_fails_fast() {
        let registry = IntegrationRegistry::new();
        let token = TokenData {
            sub: UserId::new("alice"),
            tenant_id: TenantDomain::new("acme"),
            api_key_id: None,
            scope: "user".to_string(),
            capabilities: vec![],
            constraints: BTreeMap::new(),
            rate_limits: BTreeMap::new(),
            iat: 0,
            exp: i64::MAX,
        };
        let request = ProxyRequest {
            endpoint: "/x".to_string(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            body: None,
        };
        let result = registry.call(&IntegrationId::new("missing"), &token, &request, 0);
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn registered_integration_is_retrievable() {
        let mut registry = IntegrationRegistry::new();
        registry.register(config());
        assert!(registry.get(&IntegrationId::new("slack")).is_some());
    }
}
