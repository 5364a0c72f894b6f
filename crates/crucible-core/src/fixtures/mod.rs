//! Deferred value creation and the cleanup registry.
//!
//! A forge is a named factory for a fixture. The caller decides at the call
//! site whether to hold the resolved forge for later or materialize it right
//! away; whether repeat materializations create fresh state or memoize is the
//! registered variant's own policy, not enforced here. Every materialized
//! value is recorded into storage under the variant's name for later
//! retrieval.
//!
//! Cleanup actions are resolved by name, scheduled during the test body, and
//! all run after it completes regardless of the body's outcome. A cleanup
//! failure is logged and surfaced to the caller but never changes the test's
//! pass/fail result.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::discovery::Catalog;
use crate::errors::CoreResult;

/// Storage namespace holding materialized fixture values.
pub const FIXTURE_NAMESPACE: &str = "fixtures";

/// A named fixture factory.
#[async_trait]
pub trait Forge: Send + Sync {
    async fn create(&self, ctx: &ExecutionContext) -> anyhow::Result<Value>;
}

/// A resolved forge whose creation is postponed until the caller asks.
pub struct DeferredValue {
    name: String,
    forge: Arc<dyn Forge>,
}

impl DeferredValue {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the forge now and record the result into storage under this
    /// variant's name. Each call invokes the forge again; memoization, if
    /// any, lives in the forge itself.
    pub async fn create(&self, ctx: &ExecutionContext) -> anyhow::Result<Value> {
        let value = self.forge.create(ctx).await?;
        debug!(fixture = %self.name, "materialized fixture");
        ctx.storage()
            .sub(FIXTURE_NAMESPACE)
            .put(self.name.clone(), value.clone());
        Ok(value)
    }
}

/// Resolve the forge named `name` without materializing it.
pub fn resolve_deferred(
    catalog: &Catalog,
    scopes: &[String],
    name: &str,
) -> CoreResult<DeferredValue> {
    let forge = catalog.resolve_forge(name, scopes)?;
    Ok(DeferredValue {
        name: name.to_string(),
        forge,
    })
}

/// Resolve and immediately materialize the fixture named `name`.
pub async fn materialize_now(
    catalog: &Catalog,
    scopes: &[String],
    ctx: &ExecutionContext,
    name: &str,
) -> anyhow::Result<Value> {
    let deferred = resolve_deferred(catalog, scopes, name)?;
    deferred.create(ctx).await
}

/// The materialized value recorded under `name`, or `Value::Null` when the
/// fixture was never created.
pub fn fixture_value(ctx: &ExecutionContext, name: &str) -> Value {
    ctx.storage().sub(FIXTURE_NAMESPACE).get(name)
}

/// One failed cleanup action.
#[derive(Debug)]
pub struct CleanupFailure {
    pub name: String,
    pub error: anyhow::Error,
}

/// A post-test cleanup action.
#[async_trait]
pub trait CleanupAction: Send + Sync {
    async fn run(&self, ctx: &ExecutionContext) -> anyhow::Result<()>;
}

impl std::fmt::Debug for dyn CleanupAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn CleanupAction")
    }
}

/// Cleanup actions scheduled for one test group, run in registration order.
pub struct CleanupRegistry {
    catalog: Arc<Catalog>,
    scopes: Vec<String>,
    pending: Vec<(String, Arc<dyn CleanupAction>)>,
}

impl CleanupRegistry {
    pub fn new(catalog: Arc<Catalog>, scopes: Vec<String>) -> Self {
        Self {
            catalog,
            scopes,
            pending: Vec::new(),
        }
    }

    /// Resolve the cleanup action named `name` and schedule it.
    pub fn register(&mut self, name: &str) -> CoreResult<()> {
        let action = self.catalog.resolve_cleanup(name, &self.scopes)?;
        debug!(cleanup = name, "scheduled cleanup action");
        self.pending.push((name.to_string(), action));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Run every scheduled action once, in registration order. A failing
    /// action does not stop the rest; failures are logged and returned.
    pub async fn run_all(&mut self, ctx: &ExecutionContext) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        for (name, action) in self.pending.drain(..) {
            if let Err(error) = action.run(ctx).await {
                warn!(cleanup = %name, error = %error, "cleanup action failed");
                failures.push(CleanupFailure { name, error });
            }
        }
        failures
    }
}
