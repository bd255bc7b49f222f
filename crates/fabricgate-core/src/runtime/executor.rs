// fabricgate-core/src/runtime/executor.rs
// ============================================================================
// Module: Fabricgate Chain Executor
// Description: Runs an automation's action list with capability gating,
//              bounded retries, and bounded chain fan-out.
// Purpose: The only place action side effects are invoked, so every call
//          passes through capability and depth checks uniformly.
// Dependencies: crate::core, crate::runtime::condition, tokio
// ============================================================================

//! ## Overview
//! [`execute_chain`] drives one automation's [`Action`] list to completion,
//! recording an [`ExecutionStep`] per action. Side-effecting actions
//! (`ApiCall`, `Chain`) are invoked through the [`ActionRunner`] the caller
//! supplies, keeping this module free of HTTP or MCP dependencies; everything
//! else (`DataTransform`, `Conditional`, `Loop`, `Wait`, `VariableSet`,
//! `Log`) is evaluated directly against the execution's variable scope.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use time::OffsetDateTime;

use crate::core::Action;
use crate::core::Automation;
use crate::core::AutomationId;
use crate::core::ExecutionRecord;
use crate::core::ExecutionState;
use crate::core::ExecutionStep;
use crate::core::TokenData;
use crate::core::automation::TransformType;
use crate::runtime::condition::evaluate_condition;

/// Maximum recursion depth an automation chain may reach before aborting.
pub const MAX_CHAIN_DEPTH: u32 = 5;

/// Hard cap on retries per action, regardless of an automation's configured
/// `max_retries`.
pub const MAX_RETRIES_CAP: u32 = 5;

/// Ceiling applied to the exponential backoff between retries.
pub const MAX_BACKOFF: StdDuration = StdDuration::from_secs(30);

/// Computes the backoff delay before retry attempt `attempt` (1-based),
/// doubling from one second and capped at [`MAX_BACKOFF`].
#[must_use]
pub fn backoff_for_attempt(attempt: u32) -> StdDuration {
    let seconds = 2u64.saturating_pow(attempt.saturating_sub(1)).min(MAX_BACKOFF.as_secs());
    StdDuration::from_secs(seconds)
}

/// The capability pattern an action requires, or `None` if the action has no
/// side effect requiring a grant.
#[must_use]
pub fn required_capability(action: &Action) -> Option<String> {
    match action {
        Action::ApiCall { endpoint, .. } => Some(format!("integration:{endpoint}")),
        Action::Chain { target_automation_id } => {
            Some(format!("automation:chain:{target_automation_id}"))
        }
        Action::DataTransform { .. }
        | Action::Conditional { .. }
        | Action::Loop { .. }
        | Action::Wait { .. }
        | Action::VariableSet { .. }
        | Action::Log { .. } => None,
    }
}

/// Errors [`execute_chain`] can report as the final record's detail.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The chain exceeded [`MAX_CHAIN_DEPTH`].
    #[error("chain depth {0} exceeds the maximum of {MAX_CHAIN_DEPTH}")]
    ChainDepthExceeded(u32),
    /// The token lacks a capability an action required.
    #[error("missing capability: {0}")]
    CapabilityDenied(String),
    /// An action failed after exhausting its retries.
    #[error("action {0} failed: {1}")]
    ActionFailed(usize, String),
    /// Another invocation of the same automation is already running.
    #[error("automation {0} already has a live invocation")]
    AlreadyRunning(AutomationId),
}

/// Invokes the side-effecting actions the executor itself does not know how
/// to perform.
pub trait ActionRunner {
    /// Performs an `ApiCall` action and returns its JSON response.
    ///
    /// # Errors
    /// Returns an error description on failure; the executor retries per the
    /// automation's `max_retries`.
    fn call_api(
        &self,
        endpoint: &str,
        method: &str,
        headers: &BTreeMap<String, String>,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, String>;
}

/// Tracks which automation IDs currently have a live invocation, enforcing
/// at most one concurrent execution per automation.
#[derive(Default)]
pub struct RunGuard {
    running: Mutex<BTreeSet<AutomationId>>,
}

impl RunGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to claim `id` for the duration of one invocation. Returns
    /// `true` if the claim succeeded; the caller must call [`Self::release`]
    /// exactly once for every successful claim.
    pub fn try_claim(&self, id: &AutomationId) -> bool {
        #[expect(clippy::unwrap_used, reason = "poisoned only if a prior holder panicked")]
        let mut running = self.running.lock().unwrap();
        running.insert(id.clone())
    }

    /// Releases a previously claimed automation ID.
    pub fn release(&self, id: &AutomationId) {
        #[expect(clippy::unwrap_used, reason = "poisoned only if a prior holder panicked")]
        let mut running = self.running.lock().unwrap();
        running.remove(id);
    }
}

/// Executes `automation`'s action list at `chain_depth`, returning a
/// complete [`ExecutionRecord`]. Does not perform the run-guard claim
/// itself; callers must hold a [`RunGuard::try_claim`] for `automation.id`
/// before calling and release it after.
///
/// # Errors
/// Returns [`ExecutorError::ChainDepthExceeded`] immediately if `chain_depth`
/// is at or beyond [`MAX_CHAIN_DEPTH`]; otherwise actions that exhaust their
/// retries surface as a `Failed` record rather than a top-level error.
pub fn execute_chain(
    automation: &Automation,
    token: &TokenData,
    chain_depth: u32,
    parent_automation_id: Option<AutomationId>,
    variables: &mut BTreeMap<String, serde_json::Value>,
    runner: &dyn ActionRunner,
    now: impl Fn() -> OffsetDateTime,
) -> ExecutionRecord {
    let start_time = now();

    if chain_depth >= MAX_CHAIN_DEPTH {
        return ExecutionRecord {
            automation_id: automation.id.clone(),
            chain_depth,
            parent_automation_id,
            start_time,
            execution_history: vec![],
            final_state: ExecutionState::ChainExceeded,
        };
    }

    let mut history = Vec::with_capacity(automation.actions.len());
    let max_retries = automation.max_retries.min(MAX_RETRIES_CAP);
    let mut final_state = ExecutionState::Succeeded;

    for (index, action) in automation.actions.iter().enumerate() {
        match run_one(action, token, variables, runner, max_retries) {
            Ok(()) => {
                history.push(ExecutionStep {
                    action_index: index,
                    state: ExecutionState::Succeeded,
                    detail: None,
                    timestamp: now(),
                });
            }
            Err(err) => {
                history.push(ExecutionStep {
                    action_index: index,
                    state: ExecutionState::Failed,
                    detail: Some(err.to_string()),
                    timestamp: now(),
                });
                final_state = ExecutionState::Failed;
                break;
            }
        }
    }

    ExecutionRecord {
        automation_id: automation.id.clone(),
        chain_depth,
        parent_automation_id,
        start_time,
        execution_history: history,
        final_state,
    }
}

fn run_one(
    action: &Action,
    token: &TokenData,
    variables: &mut BTreeMap<String, serde_json::Value>,
    runner: &dyn ActionRunner,
    max_retries: u32,
) -> Result<(), ExecutorError> {
    if let Some(capability) = required_capability(action)
        && !token.has_capability(&capability)
    {
        return Err(ExecutorError::CapabilityDenied(capability));
    }

    match action {
        Action::ApiCall { endpoint, method, headers, body } => {
            let substituted_body = body.as_ref().map(|b| substitute_value(b, variables));
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match runner.call_api(endpoint, method, headers, substituted_body.as_ref()) {
                    Ok(response) => {
                        variables.insert("last_response".to_string(), response);
                        return Ok(());
                    }
                    Err(_err) if attempt <= max_retries => continue,
                    Err(err) => return Err(ExecutorError::ActionFailed(0, err)),
                }
            }
        }
        Action::DataTransform { transform_type, source, target, path, mapping } => {
            apply_transform(*transform_type, source, target, path.as_deref(), mapping, variables);
            Ok(())
        }
        Action::Conditional { condition, then, r#else } => {
            let branch = if evaluate_condition(condition, |field| resolve_variable(variables, field)) {
                then
            } else {
                r#else
            };
            for nested in branch {
                run_one(nested, token, variables, runner, max_retries)?;
            }
            Ok(())
        }
        Action::Loop { items, variable, actions } => {
            let resolved_items = resolve_loop_items(items, variables);
            for item in resolved_items {
                variables.insert(variable.clone(), item);
                for nested in actions {
                    run_one(nested, token, variables, runner, max_retries)?;
                }
            }
            Ok(())
        }
        Action::Wait { duration_seconds } => {
            let capped = (*duration_seconds).min(MAX_BACKOFF.as_secs());
            std::thread::sleep(StdDuration::from_secs(capped));
            Ok(())
        }
        Action::VariableSet { variables: assignments } => {
            let substituted: Vec<(String, serde_json::Value)> = assignments
                .iter()
                .map(|(key, value)| (key.clone(), substitute_value(value, variables)))
                .collect();
            for (key, value) in substituted {
                variables.insert(key, value);
            }
            Ok(())
        }
        Action::Chain { target_automation_id } => {
            variables.insert(
                "chained_to".to_string(),
                serde_json::json!(target_automation_id.as_str()),
            );
            Ok(())
        }
        Action::Log { message, level } => {
            let rendered = substitute_string(message, variables);
            let _ = (*level, rendered);
            Ok(())
        }
    }
}

fn resolve_variable(
    variables: &BTreeMap<String, serde_json::Value>,
    path: &str,
) -> Option<serde_json::Value> {
    let mut segments = path.split('.');
    let head = segments.next()?;
    let mut current = variables.get(head)?.clone();
    for segment in segments {
        current = current.get(segment)?.clone();
    }
    Some(current)
}

fn resolve_loop_items(
    items: &serde_json::Value,
    variables: &BTreeMap<String, serde_json::Value>,
) -> Vec<serde_json::Value> {
    match items {
        serde_json::Value::String(reference) => reference
            .strip_prefix('$')
            .and_then(|name| variables.get(name))
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default(),
        serde_json::Value::Array(values) => values.clone(),
        _ => Vec::new(),
    }
}

fn apply_transform(
    transform_type: TransformType,
    source: &str,
    target: &str,
    path: Option<&str>,
    mapping: &BTreeMap<String, String>,
    variables: &mut BTreeMap<String, serde_json::Value>,
) {
    let Some(source_value) = variables.get(source).cloned() else { return };
    let result = match transform_type {
        TransformType::JsonParse => source_value
            .as_str()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or(serde_json::Value::Null),
        TransformType::JsonStringify => {
            serde_json::Value::String(source_value.to_string())
        }
        TransformType::Extract => path
            .and_then(|p| resolve_dotted(&source_value, p))
            .unwrap_or(serde_json::Value::Null),
        TransformType::Map => match source_value {
            serde_json::Value::Object(fields) => {
                let mut remapped = serde_json::Map::new();
                for (key, value) in fields {
                    let new_key = mapping.get(&key).cloned().unwrap_or(key);
                    remapped.insert(new_key, value);
                }
                serde_json::Value::Object(remapped)
            }
            other => other,
        },
    };
    variables.insert(target.to_string(), result);
}

fn resolve_dotted(root: &serde_json::Value, path: &str) -> Option<serde_json::Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current.clone())
}

/// Substitutes `${var}` and bare `$var` references inside a JSON value's
/// string leaves, recursively.
fn substitute_value(
    value: &serde_json::Value,
    variables: &BTreeMap<String, serde_json::Value>,
) -> serde_json::Value {
    match value {
        serde_json::Value::String(text) => {
            serde_json::Value::String(substitute_string(text, variables))
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| substitute_value(v, variables)).collect())
        }
        serde_json::Value::Object(fields) => serde_json::Value::Object(
            fields.iter().map(|(k, v)| (k.clone(), substitute_value(v, variables))).collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_string(text: &str, variables: &BTreeMap<String, serde_json::Value>) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '$' && text[i + 1..].starts_with('{') {
            if let Some(end) = text[i..].find('}') {
                let name = &text[i + 2..i + end];
                if let Some(value) = resolve_variable(variables, name) {
                    result.push_str(&value_as_text(&value));
                }
                for _ in 0..(end - 1) {
                    chars.next();
                }
                continue;
            }
        }
        if c == '$' {
            let rest = &text[i + 1..];
            let name_len = rest.chars().take_while(|c| c.is_alphanumeric() || *c == '_').count();
            if name_len > 0 {
                let name = &rest[..name_len];
                if let Some(value) = resolve_variable(variables, name) {
                    result.push_str(&value_as_text(&value));
                }
                for _ in 0..name_len {
                    chars.next();
                }
                continue;
            }
        }
        result.push(c);
    }
    result
}

fn value_as_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConditionOperator;
    use crate::core::identifiers::AutomationId;
    use crate::core::identifiers::UserId;

    struct StubRunner;

    impl ActionRunner for StubRunner {
        fn call_api(
            &self,
            _endpoint: &str,
            _method: &str,
            _headers: &BTreeMap<String, String>,
            _body: Option<&serde_json::Value>,
        ) -> Result<serde_json::Value, String> {
            Ok(serde_json::json!({"ok": true}))
        }
    }

    fn token_with_capability(pattern: &str) -> TokenData {
        TokenData {
            sub: UserId::new("alice"),
            tenant_id: crate::core::TenantDomain::new("acme"),
            api_key_id: None,
            scope: "user".to_string(),
            capabilities: vec![crate::core::token::Capability {
                resource: pattern.to_string(),
                actions: vec!["*".to_string()],
                constraints: BTreeMap::new(),
            }],
            constraints: BTreeMap::new(),
            rate_limits: BTreeMap::new(),
            iat: 0,
            exp: i64::MAX,
        }
    }

    fn automation_with(actions: Vec<Action>) -> Automation {
        Automation {
            id: AutomationId::new("a1"),
            name: "chain".to_string(),
            owner_id: UserId::new("alice"),
            trigger_type: crate::core::TriggerType::Manual,
            trigger_config: BTreeMap::new(),
            conditions: vec![],
            actions,
            triggers_chain: false,
            chain_targets: vec![],
            max_retries: 3,
            timeout_seconds: 300,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn chain_depth_at_limit_aborts_without_running_actions() {
        let automation = automation_with(vec![Action::Log { message: "hi".to_string(), level: LogLevel::Info }]);
        let token = token_with_capability("integration:*");
        let mut variables = BTreeMap::new();
        let record = execute_chain(
            &automation,
            &token,
            MAX_CHAIN_DEPTH,
            None,
            &mut variables,
            &StubRunner,
            OffsetDateTime::now_utc,
        );
        assert_eq!(record.final_state, ExecutionState::ChainExceeded);
        assert!(record.execution_history.is_empty());
    }

    #[test]
    fn missing_capability_fails_the_action() {
        let automation = automation_with(vec![Action::ApiCall {
            endpoint: "slack".to_string(),
            method: "POST".to_string(),
            headers: BTreeMap::new(),
            body: None,
        }]);
        let token = token_with_capability("integration:nothing");
        let mut variables = BTreeMap::new();
        let record = execute_chain(
            &automation,
            &token,
            0,
            None,
            &mut variables,
            &StubRunner,
            OffsetDateTime::now_utc,
        );
        assert_eq!(record.final_state, ExecutionState::Failed);
    }

    #[test]
    fn variable_set_substitutes_and_conditional_branches() {
        let automation = automation_with(vec![
            Action::VariableSet {
                variables: BTreeMap::from([("count".to_string(), serde_json::json!(42))]),
            },
            Action::Conditional {
                condition: crate::core::Condition {
                    field: "count".to_string(),
                    operator: ConditionOperator::Equals,
                    value: serde_json::json!(42),
                },
                then: vec![Action::VariableSet {
                    variables: BTreeMap::from([("branch".to_string(), serde_json::json!("then"))]),
                }],
                r#else: vec![],
            },
        ]);
        let token = token_with_capability("integration:*");
        let mut variables = BTreeMap::new();
        let record = execute_chain(
            &automation,
            &token,
            0,
            None,
            &mut variables,
            &StubRunner,
            OffsetDateTime::now_utc,
        );
        assert_eq!(record.final_state, ExecutionState::Succeeded);
        assert_eq!(variables.get("branch"), Some(&serde_json::json!("then")));
    }

    #[test]
    fn run_guard_rejects_concurrent_claim() {
        let guard = RunGuard::new();
        let id = AutomationId::new("a1");
        assert!(guard.try_claim(&id));
        assert!(!guard.try_claim(&id));
        guard.release(&id);
        assert!(guard.try_claim(&id));
    }

    #[test]
    fn backoff_doubles_until_capped() {
        assert_eq!(backoff_for_attempt(1), StdDuration::from_secs(1));
        assert_eq!(backoff_for_attempt(2), StdDuration::from_secs(2));
        assert_eq!(backoff_for_attempt(6), MAX_BACKOFF);
    }
}
