// fabricgate-providers/src/http.rs
// ============================================================================
// Module: Fabricgate Integration Proxy
// Description: Sandboxed outbound HTTP calls on behalf of a tenant integration.
// Purpose: The only place the control plane makes an outbound network call,
//          so every sandbox and SSRF restriction applies uniformly.
// Dependencies: fabricgate-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! [`execute_integration`] never performs network I/O for a rejected request:
//! capability, rate limit, and sandbox checks all run before [`send_pinned_request`]
//! resolves DNS and opens a socket. DNS is resolved once per call and every
//! resolved peer IP is checked against [`is_private_or_link_local`] before the
//! request is sent, regardless of sandbox level — this check cannot be
//! disabled by a sandbox level, only by an integration's explicit
//! `allow_private_networks` flag.

use std::collections::BTreeMap;
use std::io::Read;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;
use std::time::Duration;

use base64::Engine;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use fabricgate_core::core::error::AsErrorKind;
use fabricgate_core::core::error::CoreErrorKind;
use fabricgate_core::core::identifiers::IntegrationId;
use fabricgate_core::core::token::TokenData;

/// How aggressively an integration's outbound calls are restricted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxLevel {
    /// No sandbox-specific restriction beyond ambient SSRF hardening.
    None,
    /// 60s timeout, 1 MiB body cap.
    Basic,
    /// 30s timeout, 512 KiB body cap, allowlist/blocklist enforced.
    Restricted,
    /// 15s timeout, 256 KiB body cap, allowlist/blocklist and method
    /// restriction enforced.
    Strict,
}

/// How an integration authenticates outbound requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AuthMethod {
    /// `headers[key_header or "Authorization"] = "{key_prefix or 'Bearer'} {api_key}"`.
    ApiKey {
        /// The key value itself.
        api_key: String,
        /// Header to place the key in; defaults to `Authorization`.
        #[serde(default)]
        key_header: Option<String>,
        /// Prefix before the key value; defaults to `Bearer`.
        #[serde(default)]
        key_prefix: Option<String>,
    },
    /// `headers["Authorization"] = "Basic " + base64(user:pass)`.
    BasicAuth {
        /// Basic-auth username.
        username: String,
        /// Basic-auth password.
        password: String,
    },
    /// `headers["Authorization"] = "Bearer " + access_token`.
    OAuth2 {
        /// Bearer access token.
        access_token: String,
    },
}

/// A persisted integration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Stable identifier, also the capability-pattern segment.
    pub id: IntegrationId,
    /// Human-readable name.
    pub name: String,
    /// Base URL prepended to relative endpoints.
    pub base_url: String,
    /// Authentication applied to every outbound request.
    pub auth_method: AuthMethod,
    /// Sandbox restriction level.
    pub sandbox_level: SandboxLevel,
    /// Extra headers merged into every request.
    #[serde(default)]
    pub custom_headers: BTreeMap<String, String>,
    /// Sliding-window request cap.
    pub max_requests_per_hour: u32,
    /// Hard cap on response body size, in bytes.
    pub max_response_size_bytes: usize,
    /// Requested timeout; sandbox level and token constraints may tighten it.
    pub timeout_seconds: u64,
    /// Methods this integration's `Strict` sandbox permits; defaults to
    /// `{GET, POST}` if empty.
    #[serde(default)]
    pub allowed_methods: Vec<String>,
    /// Endpoint allowlist; enforced at `Restricted`/`Strict` if non-empty.
    #[serde(default)]
    pub allowed_endpoints: Vec<String>,
    /// Endpoint blocklist; enforced at `Restricted`/`Strict`, wins over the
    /// allowlist.
    #[serde(default)]
    pub blocked_endpoints: Vec<String>,
    /// Disables the private/link-local/loopback peer-IP check.
    #[serde(default)]
    pub allow_private_networks: bool,
    /// Whether this integration currently accepts calls.
    pub is_active: bool,
}

/// One outbound call request against an integration.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Absolute URL, or a path relative to `base_url`.
    pub endpoint: String,
    /// HTTP method.
    pub method: String,
    /// Request headers, merged after authentication and custom headers.
    pub headers: BTreeMap<String, String>,
    /// Request body, if any.
    pub body: Option<serde_json::Value>,
}

/// The outcome of a proxied call.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyResponse {
    /// Whether the call completed with a `2xx` status.
    pub success: bool,
    /// HTTP status code, or a synthetic `408`/`500` for local failures.
    pub status: u16,
    /// Decoded JSON body, or `{"raw_content": "..."}` if not valid JSON.
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    /// Present only when the call failed before or during transport.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Which sandbox/network restrictions were applied before this call.
    pub restrictions_applied: Vec<String>,
}

/// Errors raised before a request ever reaches the network.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The integration is not active.
    #[error("integration is not active")]
    Inactive,
    /// The token lacks `integration:<id>:<method>`.
    #[error("missing capability for {0} {1}")]
    CapabilityDenied(String, String),
    /// The sliding-window rate limit has been exceeded.
    #[error("rate limit exceeded: {0} requests in the last hour")]
    RateLimited(u32),
    /// The endpoint or method was rejected by the sandbox policy.
    #[error("sandbox rejected request: {0}")]
    SandboxRejected(String),
    /// The endpoint could not be parsed as a URL.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
}

impl AsErrorKind for ProxyError {
    fn kind(&self) -> CoreErrorKind {
        match self {
            Self::Inactive | Self::InvalidUrl(_) => CoreErrorKind::InvalidInput,
            Self::SandboxRejected(_) => CoreErrorKind::SandboxViolation,
            Self::CapabilityDenied(_, _) => CoreErrorKind::PermissionDenied,
            Self::RateLimited(_) => CoreErrorKind::RateLimited,
        }
    }
}

struct SandboxPolicy {
    timeout: Duration,
    max_body_bytes: usize,
    enforce_endpoint_lists: bool,
    enforce_method_restriction: bool,
}

const fn policy_for(level: SandboxLevel) -> SandboxPolicy {
    match level {
        SandboxLevel::None => SandboxPolicy {
            timeout: Duration::from_secs(300),
            max_body_bytes: 8 * 1024 * 1024,
            enforce_endpoint_lists: false,
            enforce_method_restriction: false,
        },
        SandboxLevel::Basic => SandboxPolicy {
            timeout: Duration::from_secs(60),
            max_body_bytes: 1024 * 1024,
            enforce_endpoint_lists: false,
            enforce_method_restriction: false,
        },
        SandboxLevel::Restricted => SandboxPolicy {
            timeout: Duration::from_secs(30),
            max_body_bytes: 512 * 1024,
            enforce_endpoint_lists: true,
            enforce_method_restriction: false,
        },
        SandboxLevel::Strict => SandboxPolicy {
            timeout: Duration::from_secs(15),
            max_body_bytes: 256 * 1024,
            enforce_endpoint_lists: true,
            enforce_method_restriction: true,
        },
    }
}

/// Executes one proxied call against `config` on behalf of `token`.
///
/// Performs capability, rate-limit, and sandbox checks before any network
/// I/O; a rejection at any of those stages returns `Err` without the
/// request ever leaving the process. Transport-level failures are reported
/// as a successful `Ok(ProxyResponse)` with `success = false`, matching the
/// pipeline's fail-closed-but-recorded behavior.
///
/// # Errors
/// Returns [`ProxyError`] for every pre-flight rejection.
pub fn execute_integration(
    config: &IntegrationConfig,
    token: &TokenData,
    request: &ProxyRequest,
    requests_in_window: u32,
) -> Result<ProxyResponse, ProxyError> {
    if !config.is_active {
        return Err(ProxyError::Inactive);
    }

    let method_lower = request.method.to_lowercase();
    let capability = format!("integration:{}:{method_lower}", config.id.as_str());
    if !token.has_capability(&capability) {
        return Err(ProxyError::CapabilityDenied(config.id.as_str().to_string(), request.method.clone()));
    }

    if requests_in_window >= config.max_requests_per_hour {
        return Err(ProxyError::RateLimited(requests_in_window));
    }

    let policy = policy_for(config.sandbox_level);
    let mut restrictions_applied = Vec::new();

    if policy.enforce_endpoint_lists {
        restrictions_applied.push("endpoint_allowlist".to_string());
        check_endpoint_lists(config, &request.endpoint)?;
    }
    if policy.enforce_method_restriction {
        restrictions_applied.push("method_restriction".to_string());
        check_method_allowed(config, &request.method)?;
    }

    let timeout = token
        .constraints
        .get("integration_timeout_seconds")
        .and_then(serde_json::Value::as_u64)
        .map(Duration::from_secs)
        .map_or(policy.timeout, |override_timeout| override_timeout.min(policy.timeout));

    let url = build_url(config, &request.endpoint)?;
    let headers = build_headers(config, request);

    restrictions_applied.push("dns_pinned_ssrf_guard".to_string());
    match send_pinned_request(&url, &request.method, &headers, request.body.as_ref(), timeout, config.allow_private_networks, policy.max_body_bytes) {
        Ok((status, body_text)) => {
            let body = serde_json::from_str(&body_text)
                .unwrap_or_else(|_| serde_json::json!({ "raw_content": body_text }));
            Ok(ProxyResponse {
                success: (200..300).contains(&status),
                status,
                body: Some(body),
                error_message: None,
                restrictions_applied,
            })
        }
        Err(TransportError::Timeout) => Ok(ProxyResponse {
            success: false,
            status: 408,
            body: None,
            error_message: Some("request timed out".to_string()),
            restrictions_applied,
        }),
        Err(TransportError::Other(message)) => Ok(ProxyResponse {
            success: false,
            status: 500,
            body: None,
            error_message: Some(message),
            restrictions_applied,
        }),
    }
}

fn check_endpoint_lists(config: &IntegrationConfig, endpoint: &str) -> Result<(), ProxyError> {
    if config.blocked_endpoints.iter().any(|blocked| endpoint.starts_with(blocked.as_str())) {
        return Err(ProxyError::SandboxRejected(format!("endpoint {endpoint} is blocked")));
    }
    if !config.allowed_endpoints.is_empty()
        && !config.allowed_endpoints.iter().any(|allowed| endpoint.starts_with(allowed.as_str()))
    {
        return Err(ProxyError::SandboxRejected(format!("endpoint {endpoint} is not allowlisted")));
    }
    Ok(())
}

fn check_method_allowed(config: &IntegrationConfig, method: &str) -> Result<(), ProxyError> {
    let allowed = if config.allowed_methods.is_empty() {
        vec!["GET".to_string(), "POST".to_string()]
    } else {
        config.allowed_methods.clone()
    };
    if !allowed.iter().any(|allowed_method| allowed_method.eq_ignore_ascii_case(method)) {
        return Err(ProxyError::SandboxRejected(format!("method {method} is not permitted")));
    }
    Ok(())
}

fn build_url(config: &IntegrationConfig, endpoint: &str) -> Result<Url, ProxyError> {
    let raw = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("{}{endpoint}", config.base_url.trim_end_matches('/'))
    };
    let url = Url::parse(&raw).map_err(|err| ProxyError::InvalidUrl(err.to_string()))?;
    if !url.username().is_empty() || url.password().is_some() {
        return Err(ProxyError::InvalidUrl("embedded credentials are not allowed".to_string()));
    }
    Ok(url)
}

fn build_headers(config: &IntegrationConfig, request: &ProxyRequest) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    match &config.auth_method {
        AuthMethod::ApiKey { api_key, key_header, key_prefix } => {
            let header = key_header.clone().unwrap_or_else(|| "Authorization".to_string());
            let prefix = key_prefix.clone().unwrap_or_else(|| "Bearer".to_string());
            headers.insert(header, format!("{prefix} {api_key}"));
        }
        AuthMethod::BasicAuth { username, password } => {
            let encoded =
                base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
            headers.insert("Authorization".to_string(), format!("Basic {encoded}"));
        }
        AuthMethod::OAuth2 { access_token } => {
            headers.insert("Authorization".to_string(), format!("Bearer {access_token}"));
        }
    }
    headers.extend(config.custom_headers.clone());
    headers.extend(request.headers.clone());
    headers
}

enum TransportError {
    Timeout,
    Other(String),
}

#[allow(clippy::too_many_arguments, reason = "every argument is an independent pre-validated policy input")]
fn send_pinned_request(
    url: &Url,
    method: &str,
    headers: &BTreeMap<String, String>,
    body: Option<&serde_json::Value>,
    timeout: Duration,
    allow_private_networks: bool,
    max_body_bytes: usize,
) -> Result<(u16, String), TransportError> {
    let host = url.host_str().ok_or_else(|| TransportError::Other("url host required".to_string()))?;
    let port = url.port_or_known_default().unwrap_or(443);
    let host_for_resolution =
        host.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')).unwrap_or(host);

    let ips = resolve_host_ips(host_for_resolution, port)
        .map_err(|err| TransportError::Other(err.to_string()))?;
    if ips.is_empty() {
        return Err(TransportError::Other("url host has no resolved addresses".to_string()));
    }
    if !allow_private_networks {
        for ip in &ips {
            if is_private_or_link_local(ip) {
                return Err(TransportError::Other(format!(
                    "url host resolves to private or link-local address: {host_for_resolution}"
                )));
            }
        }
    }

    let is_domain = host_for_resolution.parse::<IpAddr>().is_err();
    let mut builder = Client::builder().timeout(timeout).redirect(Policy::none());
    if is_domain {
        let socket_addr = SocketAddr::new(ips[0], port);
        builder = builder.resolve(host_for_resolution, socket_addr);
    }
    let client = builder
        .build()
        .map_err(|err| TransportError::Other(format!("http client build failed: {err}")))?;

    let method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|_| TransportError::Other(format!("invalid http method: {method}")))?;
    let mut request_builder = client.request(method, url.as_str());
    for (key, value) in headers {
        request_builder = request_builder.header(key, value);
    }
    if let Some(body) = body {
        request_builder = request_builder.json(body);
    }

    let response = request_builder.send().map_err(|err| {
        if err.is_timeout() { TransportError::Timeout } else { TransportError::Other(err.to_string()) }
    })?;
    if response.url() != url {
        return Err(TransportError::Other("http redirect not allowed".to_string()));
    }

    let status = response.status().as_u16();
    let text = read_response_limited(response, max_body_bytes)
        .map_err(|err| TransportError::Other(err.to_string()))?;
    Ok((status, text))
}

fn resolve_host_ips(host: &str, port: u16) -> Result<Vec<IpAddr>, String> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }
    (host, port)
        .to_socket_addrs()
        .map(|iter| iter.map(|addr| addr.ip()).collect())
        .map_err(|err| format!("url host resolution failed: {err}"))
}

const fn is_private_or_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => {
            addr.is_private()
                || addr.is_loopback()
                || addr.is_link_local()
                || addr.is_unspecified()
                || addr.is_multicast()
                || addr.is_broadcast()
        }
        IpAddr::V6(addr) => addr.is_loopback() || addr.is_unique_local() || addr.is_unspecified(),
    }
}

fn read_response_limited(mut response: Response, max_bytes: usize) -> Result<String, String> {
    let mut buf = Vec::new();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX).saturating_add(1);
    response.by_ref().take(limit).read_to_end(&mut buf).map_err(|err| err.to_string())?;
    if buf.len() > max_bytes {
        return Err("response exceeds size limit".to_string());
    }
    String::from_utf8(buf).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabricgate_core::core::identifiers::TenantDomain;
    use fabricgate_core::core::identifiers::UserId;
    use fabricgate_core::core::token::Capability;

    fn sample_config(sandbox_level: SandboxLevel) -> IntegrationConfig {
        IntegrationConfig {
            id: IntegrationId::new("slack"),
            name: "Slack".to_string(),
            base_url: "https://hooks.example.com".to_string(),
            auth_method: AuthMethod::ApiKey {
                api_key: "secret".to_string(),
                key_header: None,
                key_prefix: None,
            },
            sandbox_level,
            custom_headers: BTreeMap::new(),
            max_requests_per_hour: 100,
            max_response_size_bytes: 1024,
            timeout_seconds: 10,
            allowed_methods: vec!["GET".to_string()],
            allowed_endpoints: vec!["/safe".to_string()],
            blocked_endpoints: vec![],
            allow_private_networks: false,
            is_active: true,
        }
    }

    fn token_with(capability: &str) -> TokenData {
        TokenData {
            sub: UserId::new("alice"),
            tenant_id: TenantDomain::new("acme"),
            api_key_id: None,
            scope: "user".to_string(),
            capabilities: vec![Capability {
                resource: capability.to_string(),
                actions: vec!["*".to_string()],
                constraints: BTreeMap::new(),
            }],
            constraints: BTreeMap::new(),
            rate_limits: BTreeMap::new(),
            iat: 0,
            exp: i64::MAX,
        }
    }

    #[test]
    fn inactive_integration_rejected_before_capability_check() {
        let mut config = sample_config(SandboxLevel::None);
        config.is_active = false;
        let token = token_with("integration:slack:get");
        let request = ProxyRequest {
            endpoint: "/anything".to_string(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            body: None,
        };
        let result = execute_integration(&config, &token, &request, 0);
        assert!(matches!(result, Err(ProxyError::Inactive)));
    }

    #[test]
    fn missing_capability_rejected_before_network() {
        let config = sample_config(SandboxLevel::None);
        let token = token_with("integration:other:get");
        let request = ProxyRequest {
            endpoint: "/anything".to_string(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            body: None,
        };
        let result = execute_integration(&config, &token, &request, 0);
        assert!(matches!(result, Err(ProxyError::CapabilityDenied(_, _))));
    }

    #[test]
    fn strict_sandbox_rejects_disallowed_method_before_network() {
        let config = sample_config(SandboxLevel::Strict);
        let token = token_with("integration:slack:post");
        let request = ProxyRequest {
            endpoint: "/safe".to_string(),
            method: "POST".to_string(),
            headers: BTreeMap::new(),
            body: None,
        };
        let result = execute_integration(&config, &token, &request, 0);
        assert!(matches!(result, Err(ProxyError::SandboxRejected(_))));
    }

    #[test]
    fn strict_sandbox_rejects_endpoint_outside_allowlist() {
        let config = sample_config(SandboxLevel::Strict);
        let token = token_with("integration:slack:get");
        let request = ProxyRequest {
            endpoint: "/dangerous".to_string(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            body: None,
        };
        let result = execute_integration(&config, &token, &request, 0);
        assert!(matches!(result, Err(ProxyError::SandboxRejected(_))));
    }

    #[test]
    fn rate_limit_enforced_before_network() {
        let config = sample_config(SandboxLevel::None);
        let token = token_with("integration:slack:get");
        let request = ProxyRequest {
            endpoint: "/safe".to_string(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            body: None,
        };
        let result = execute_integration(&config, &token, &request, 100);
        assert!(matches!(result, Err(ProxyError::RateLimited(100))));
    }

    #[test]
    fn private_address_is_rejected_by_the_policy_check() {
        assert!(is_private_or_link_local(&"127.0.0.1".parse().expect("ip")));
        assert!(is_private_or_link_local(&"10.0.0.5".parse().expect("ip")));
        assert!(is_private_or_link_local(&"169.254.1.1".parse().expect("ip")));
        assert!(!is_private_or_link_local(&"8.8.8.8".parse().expect("ip")));
    }

    #[test]
    fn build_headers_applies_api_key_auth_and_merges_custom() {
        let mut config = sample_config(SandboxLevel::None);
        config.custom_headers.insert("X-Trace".to_string(), "abc".to_string());
        let request = ProxyRequest {
            endpoint: "/safe".to_string(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            body: None,
        };
        let headers = build_headers(&config, &request);
        assert_eq!(headers.get("Authorization"), Some(&"Bearer secret".to_string()));
        assert_eq!(headers.get("X-Trace"), Some(&"abc".to_string()));
    }
}
