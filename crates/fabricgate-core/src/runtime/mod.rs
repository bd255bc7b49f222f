// fabricgate-core/src/runtime/mod.rs
// ============================================================================
// Module: Fabricgate Runtime
// Description: Filesystem persistence, access control, and automation
//              execution built on the core data model.
// Purpose: Everything stateful or side-effecting in the control plane core.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules are layered: [`store`] is the only module that touches
//! the filesystem; [`condition`] and [`access_controller`] are pure
//! decision functions built on it and on [`crate::core`]; [`apikey_service`],
//! [`event_bus`], and [`executor`] compose those primitives into the
//! service-level operations the broker and CLI call.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod access_controller;
pub mod apikey_service;
pub mod condition;
pub mod event_bus;
pub mod executor;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use access_controller::Action as AccessAction;
pub use access_controller::Decision;
pub use access_controller::check_permission;
pub use apikey_service::ValidationError;
pub use apikey_service::ValidationOutcome;
pub use apikey_service::generate_raw_key;
pub use apikey_service::hash_raw_key;
pub use apikey_service::hashes_match;
pub use apikey_service::validate as validate_api_key;
pub use condition::evaluate_all;
pub use condition::evaluate_condition;
pub use event_bus::daily_log_path;
pub use event_bus::emit;
pub use event_bus::event_history;
pub use executor::ActionRunner;
pub use executor::ExecutorError;
pub use executor::MAX_BACKOFF;
pub use executor::MAX_CHAIN_DEPTH;
pub use executor::MAX_RETRIES_CAP;
pub use executor::RunGuard;
pub use executor::backoff_for_attempt;
pub use executor::execute_chain;
pub use executor::required_capability;
pub use store::DIR_MODE;
pub use store::FILE_MODE;
pub use store::FileLocks;
pub use store::StoreError;
pub use store::append_jsonl;
pub use store::ensure_dir;
pub use store::read_json_fault_tolerant;
pub use store::read_jsonl_fault_tolerant;
pub use store::write_json_atomic;
