// fabricgate-core/src/core/automation.rs
// ============================================================================
// Module: Fabricgate Automation Model
// Description: Persisted automation definitions, condition/action variants,
//              and execution-context/state types.
// Purpose: The data shape stored under automations/ and consumed by the
//          chain executor.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Persisted automation definitions — conditions, actions, triggers — plus
//! the execution-context and execution-state types the chain executor reads
//! and writes while running one.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::AutomationId;
use crate::core::identifiers::UserId;

/// What causes an automation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Fires on a cron schedule (schedule owned by an external collaborator;
    /// the core only records the trigger config).
    Cron,
    /// Fires when an inbound webhook is received.
    Webhook,
    /// Fires when a matching event is emitted (see [`crate::core::event`]).
    Event,
    /// Fires when chained from a parent automation.
    Chain,
    /// Fires only on explicit operator invocation.
    Manual,
}

/// A condition operator, matched against a resolved event field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Field equals value.
    Equals,
    /// Field does not equal value.
    NotEquals,
    /// Field (string or array) contains value.
    Contains,
    /// Field is numerically greater than value.
    GreaterThan,
    /// Field is numerically less than value.
    LessThan,
    /// Field resolves to a value at all.
    Exists,
    /// Field does not resolve to a value.
    NotExists,
}

/// One condition an automation's trigger must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted field path; `data.*` indexes into event data, otherwise event
    /// attributes (see [`crate::core::event::Event::resolve_path`]).
    pub field: String,
    /// Comparison operator.
    pub operator: ConditionOperator,
    /// Comparison value; ignored for `Exists`/`NotExists`.
    #[serde(default)]
    pub value: serde_json::Value,
}

/// One action in an automation's action list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Invokes an external HTTP endpoint through the integration proxy.
    ApiCall {
        /// Integration identifier or absolute endpoint.
        endpoint: String,
        /// HTTP method.
        method: String,
        /// Request headers, subject to variable substitution.
        #[serde(default)]
        headers: BTreeMap<String, String>,
        /// Request body, subject to variable substitution.
        #[serde(default)]
        body: Option<serde_json::Value>,
    },
    /// Transforms data in the execution's variable scope.
    DataTransform {
        /// The kind of transform to apply.
        transform_type: TransformType,
        /// Source variable name.
        source: String,
        /// Destination variable name.
        target: String,
        /// Dotted path, used by `Extract`.
        #[serde(default)]
        path: Option<String>,
        /// Key renaming, used by `Map`.
        #[serde(default)]
        mapping: BTreeMap<String, String>,
    },
    /// Branches execution based on a condition.
    Conditional {
        /// Condition to evaluate.
        condition: Condition,
        /// Actions run when the condition is true.
        #[serde(default)]
        then: Vec<Action>,
        /// Actions run when the condition is false.
        #[serde(default)]
        r#else: Vec<Action>,
    },
    /// Iterates a variable-referenced collection.
    Loop {
        /// `$var` reference or literal array of items to iterate.
        items: serde_json::Value,
        /// Variable name bound to the current item each iteration.
        variable: String,
        /// Actions run once per iteration.
        actions: Vec<Action>,
    },
    /// Cooperative delay, capped regardless of the requested duration.
    Wait {
        /// Requested delay in seconds.
        duration_seconds: u64,
    },
    /// Assigns values into the execution's variable scope.
    VariableSet {
        /// Variables to assign, values subject to substitution.
        variables: BTreeMap<String, serde_json::Value>,
    },
    /// Triggers another automation as a chained invocation.
    Chain {
        /// Target automation identifier.
        target_automation_id: AutomationId,
    },
    /// Records a message to the audit trail.
    Log {
        /// Message, subject to variable substitution.
        message: String,
        /// Severity level.
        #[serde(default)]
        level: LogLevel,
    },
}

/// Kinds of [`Action::DataTransform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformType {
    /// Parses a string variable as JSON.
    JsonParse,
    /// Serializes a variable to a JSON string.
    JsonStringify,
    /// Extracts a dotted-path value.
    Extract,
    /// Renames keys per `mapping`.
    Map,
}

/// Severity for [`Action::Log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal operational message.
    #[default]
    Info,
    /// Recoverable problem.
    Warning,
    /// Action failed.
    Error,
}

/// A persisted automation definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    /// Stable identifier.
    pub id: AutomationId,
    /// Human-readable name.
    pub name: String,
    /// Owning user.
    pub owner_id: UserId,
    /// What causes this automation to run.
    pub trigger_type: TriggerType,
    /// Trigger-specific configuration (cron expression, webhook path,
    /// event type list under `event_types`, ...).
    #[serde(default)]
    pub trigger_config: BTreeMap<String, serde_json::Value>,
    /// All conditions must hold for an `Event`-triggered automation to run.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Ordered action list.
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Whether successful completion should chain into other automations.
    #[serde(default)]
    pub triggers_chain: bool,
    /// Automations to invoke when `triggers_chain` is set.
    #[serde(default)]
    pub chain_targets: Vec<AutomationId>,
    /// Maximum retries per action (capped at 5 by the executor).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Wall-clock timeout for the whole chain, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Whether this automation currently runs on trigger.
    pub is_active: bool,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last-update timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_timeout_seconds() -> u64 {
    300
}

impl Automation {
    /// Returns the event types this automation listens for, if
    /// `trigger_type == Event` and `trigger_config.event_types` is set.
    #[must_use]
    pub fn listened_event_types(&self) -> Vec<String> {
        self.trigger_config
            .get("event_types")
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
            })
            .unwrap_or_default()
    }
}

/// Terminal and in-flight states of one automation execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Scheduled but not yet running.
    Pending,
    /// Currently executing.
    Running,
    /// Currently waiting to retry a failed action.
    Retrying,
    /// Completed successfully.
    Succeeded,
    /// Completed with an unrecoverable failure.
    Failed,
    /// Aborted after exceeding its timeout.
    TimedOut,
    /// Aborted after exceeding the maximum chain depth.
    ChainExceeded,
}

/// One step recorded in an execution's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Index of the action within the automation's action list.
    pub action_index: usize,
    /// Outcome state for this step.
    pub state: ExecutionState,
    /// Human-readable detail, e.g. an error message.
    #[serde(default)]
    pub detail: Option<String>,
    /// Timestamp the step completed.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// A persisted record of one complete automation invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Automation that ran.
    pub automation_id: AutomationId,
    /// Recursion depth at which this invocation ran.
    pub chain_depth: u32,
    /// Parent automation, if this was a chained invocation.
    #[serde(default)]
    pub parent_automation_id: Option<AutomationId>,
    /// Start timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    /// Per-step history.
    #[serde(default)]
    pub execution_history: Vec<ExecutionStep>,
    /// Final state.
    pub final_state: ExecutionState,
}
