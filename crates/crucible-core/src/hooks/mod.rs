//! Lifecycle hook declarations and the ordered hook runner.
//!
//! The host test-runner hands the runner a declaration list per test group;
//! the runner filters by timing, stable-sorts by declared order, resolves
//! each hook through discovery, and executes in order. Hook outputs
//! accumulate in a shared map written to storage under a well-known key.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::CoreConfig;
use crate::context::ExecutionContext;
use crate::discovery::Catalog;
use crate::errors::{CoreError, CoreResult};
use crate::fixtures::CleanupRegistry;
use crate::report::{HookEvent, HookEventSink};

/// Storage namespace holding hook output maps.
pub const HOOK_NAMESPACE: &str = "hooks";
/// Key for the before-hook output map.
pub const BEFORE_OUTPUTS_KEY: &str = "before_outputs";
/// Key for the after-hook output map.
pub const AFTER_OUTPUTS_KEY: &str = "after_outputs";

/// When a hook runs relative to the test group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookTiming {
    Before,
    After,
}

/// One hook binding supplied by the host test-runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookDeclaration {
    pub timing: HookTiming,
    pub name: String,
    pub order: i32,
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl HookDeclaration {
    pub fn new(timing: HookTiming, name: impl Into<String>, order: i32) -> Self {
        Self {
            timing,
            name: name.into(),
            order,
            arguments: Vec::new(),
        }
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }
}

/// Side-channel outputs accumulated across one timing class's hooks.
pub type HookOutputs = BTreeMap<String, Value>;

/// A named before/after lifecycle action.
#[async_trait]
pub trait HookFlow: Send + Sync {
    async fn run(
        &self,
        ctx: &ExecutionContext,
        arguments: &[String],
        outputs: &mut HookOutputs,
    ) -> anyhow::Result<()>;
}

impl std::fmt::Debug for dyn HookFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn HookFlow")
    }
}

/// Where the runner is in one test group's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Idle,
    RunningBefore,
    Ready,
    RunningAfter,
    Done,
}

/// Executes a test group's hooks in declared order.
pub struct HookRunner {
    catalog: Arc<Catalog>,
    scopes: Vec<String>,
    state: GroupState,
    events: Option<HookEventSink>,
}

impl HookRunner {
    pub fn new(catalog: Arc<Catalog>, scopes: Vec<String>) -> Self {
        Self {
            catalog,
            scopes,
            state: GroupState::Idle,
            events: None,
        }
    }

    /// Build a runner using the configured discovery scopes.
    pub fn from_config(catalog: Arc<Catalog>, config: &CoreConfig) -> Self {
        Self::new(catalog, config.scopes.clone())
    }

    /// Receive a start/stop event around every hook execution.
    pub fn with_event_sink(mut self, sink: HookEventSink) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Run all `timing = Before` hooks from `declarations` in order.
    ///
    /// Fails fast: the first hook failure aborts the remaining before-hooks
    /// and propagates. Re-running overwrites the previously stored output map
    /// (last-write-wins, documented behavior).
    pub async fn run_before(
        &mut self,
        ctx: &ExecutionContext,
        declarations: &[HookDeclaration],
    ) -> CoreResult<()> {
        self.state = GroupState::RunningBefore;
        let result = self
            .run_timing(ctx, declarations, HookTiming::Before, BEFORE_OUTPUTS_KEY)
            .await;
        self.state = GroupState::Ready;
        result
    }

    /// Run all `timing = After` hooks from `declarations` in order.
    ///
    /// Called once the test body has completed, whether it passed or failed.
    pub async fn run_after(
        &mut self,
        ctx: &ExecutionContext,
        declarations: &[HookDeclaration],
    ) -> CoreResult<()> {
        self.state = GroupState::RunningAfter;
        let result = self
            .run_timing(ctx, declarations, HookTiming::After, AFTER_OUTPUTS_KEY)
            .await;
        self.state = GroupState::Done;
        result
    }

    async fn run_timing(
        &self,
        ctx: &ExecutionContext,
        declarations: &[HookDeclaration],
        timing: HookTiming,
        outputs_key: &str,
    ) -> CoreResult<()> {
        let mut selected: Vec<&HookDeclaration> =
            declarations.iter().filter(|d| d.timing == timing).collect();
        // Stable sort: ties keep declaration order.
        selected.sort_by_key(|d| d.order);

        let mut outputs = HookOutputs::new();
        for decl in selected {
            let flow = match self.catalog.resolve_hook_flow(&decl.name, &self.scopes) {
                Ok(flow) => flow,
                Err(err) => {
                    self.store_outputs(ctx, outputs_key, &outputs);
                    return Err(err);
                }
            };

            self.emit(HookEvent::started(timing, &decl.name));
            info!(hook = %decl.name, ?timing, order = decl.order, "running hook");
            let result = flow.run(ctx, &decl.arguments, &mut outputs).await;
            self.emit(HookEvent::finished(timing, &decl.name, result.is_ok()));

            if let Err(source) = result {
                error!(hook = %decl.name, ?timing, error = %source, "hook failed, aborting timing group");
                // Outputs accumulated so far are still stored.
                self.store_outputs(ctx, outputs_key, &outputs);
                return Err(CoreError::HookExecutionFailure {
                    name: decl.name.clone(),
                    source,
                });
            }
        }

        self.store_outputs(ctx, outputs_key, &outputs);
        Ok(())
    }

    fn store_outputs(&self, ctx: &ExecutionContext, key: &str, outputs: &HookOutputs) {
        ctx.storage().sub(HOOK_NAMESPACE).put(key, outputs.clone());
    }

    fn emit(&self, event: HookEvent) {
        if let Some(sink) = &self.events {
            sink(event);
        }
    }

    /// Drive a full group: before-hooks, body, after-hooks, cleanups.
    ///
    /// After-hooks and cleanup actions run regardless of the body's outcome.
    /// The body's error, if any, takes precedence in the returned result;
    /// cleanup failures are logged and never change the outcome.
    pub async fn run_group<F, Fut>(
        &mut self,
        ctx: &ExecutionContext,
        declarations: &[HookDeclaration],
        cleanups: &mut CleanupRegistry,
        body: F,
    ) -> anyhow::Result<()>
    where
        F: FnOnce(ExecutionContext) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.run_before(ctx, declarations).await?;

        let body_result = body(ctx.clone()).await;

        let after_result = self.run_after(ctx, declarations).await;
        let cleanup_failures = cleanups.run_all(ctx).await;
        if !cleanup_failures.is_empty() {
            warn!(failed = cleanup_failures.len(), "cleanup actions failed");
        }

        body_result?;
        after_result?;
        Ok(())
    }
}
