//! Orchestration core for multi-domain test automation.
//!
//! This crate is the shared substrate that domain adapters (HTTP API, SQL,
//! browser UI) plug into during a single logical test execution:
//!
//! - a namespaced, typed data store shared across one test's lifetime
//! - discovery of named "variants" of pluggable contracts across a
//!   prioritized list of scopes, with deterministic disambiguation
//! - runtime decoration of an execution context with extra capability
//!   facades, all sharing the same storage
//! - a generic polling primitive with bounded wait and fixed interval
//! - an ordered lifecycle-hook runner and a post-test cleanup registry
//!
//! Protocol handling, assertion semantics, and report formatting live in the
//! adapters and the host test-runner, not here.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use crucible_core::{
//!     Catalog, ExecutionContext, HookDeclaration, HookFlow, HookOutputs, HookRunner, HookTiming,
//! };
//!
//! struct SeedUsers;
//!
//! #[async_trait]
//! impl HookFlow for SeedUsers {
//!     async fn run(
//!         &self,
//!         ctx: &ExecutionContext,
//!         _arguments: &[String],
//!         outputs: &mut HookOutputs,
//!     ) -> anyhow::Result<()> {
//!         ctx.put("db", "seeded", true);
//!         outputs.insert("SEED_USERS".into(), serde_json::json!({ "rows": 3 }));
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut catalog = Catalog::new();
//! catalog.scope("project.db").hook_flow("SEED_USERS", SeedUsers);
//!
//! let ctx = ExecutionContext::new();
//! let mut runner = HookRunner::new(Arc::new(catalog), vec!["project.db".into()]);
//! runner
//!     .run_before(&ctx, &[HookDeclaration::new(HookTiming::Before, "SEED_USERS", 1)])
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency model
//!
//! One execution context is used by exactly one logical thread of control;
//! the host may run different test groups concurrently, but never shares one
//! context across threads. The retry sleep is the only suspension point.

pub mod config;
pub mod context;
pub mod discovery;
pub mod errors;
pub mod fixtures;
pub mod hooks;
pub mod report;
pub mod retry;
pub mod storage;

// Re-export the public surface
pub use config::CoreConfig;
pub use context::{decorate, Composed, ExecutionContext};
pub use discovery::{Catalog, ContractKind, FacadeFactory, ScopeBuilder};
pub use errors::{CoreError, CoreResult};
pub use fixtures::{
    fixture_value, materialize_now, resolve_deferred, CleanupAction, CleanupFailure,
    CleanupRegistry, DeferredValue, Forge, FIXTURE_NAMESPACE,
};
pub use hooks::{
    GroupState, HookDeclaration, HookFlow, HookOutputs, HookRunner, HookTiming,
    AFTER_OUTPUTS_KEY, BEFORE_OUTPUTS_KEY, HOOK_NAMESPACE,
};
pub use report::{
    record_validation, validations, HookEvent, HookEventSink, HookPhase, ValidationRecord,
    Verdict, VALIDATION_NAMESPACE, VALIDATION_RECORDS_KEY,
};
pub use retry::retry_until;
pub use storage::{ScopedStorage, Store, DEFAULT_NAMESPACE};
