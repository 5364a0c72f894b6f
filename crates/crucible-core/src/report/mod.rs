//! Surfaces exposed to reporting collaborators.
//!
//! The core emits hook start/stop events through a caller-supplied sink and
//! accumulates validation records into storage for external rendering. It
//! never formats or persists reports itself.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::hooks::HookTiming;

/// Storage namespace holding accumulated validation records.
pub const VALIDATION_NAMESPACE: &str = "validations";
/// Key under [`VALIDATION_NAMESPACE`] for the record list.
pub const VALIDATION_RECORDS_KEY: &str = "records";

/// Where a hook currently is in its execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    Started,
    Finished { ok: bool },
}

/// One hook execution start/stop event.
#[derive(Debug, Clone, Serialize)]
pub struct HookEvent {
    pub timing: HookTiming,
    pub name: String,
    pub phase: HookPhase,
}

impl HookEvent {
    pub fn started(timing: HookTiming, name: impl Into<String>) -> Self {
        Self {
            timing,
            name: name.into(),
            phase: HookPhase::Started,
        }
    }

    pub fn finished(timing: HookTiming, name: impl Into<String>, ok: bool) -> Self {
        Self {
            timing,
            name: name.into(),
            phase: HookPhase::Finished { ok },
        }
    }
}

/// Sink for hook events. The runner calls this around every hook execution;
/// implementations may forward to a console layer, a log, or drop them.
pub type HookEventSink = Arc<dyn Fn(HookEvent) + Send + Sync>;

/// Pass/fail outcome of one validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

/// One validation outcome, recorded for external rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub name: String,
    pub verdict: Verdict,
    /// Soft validations are reported but do not stop the flow.
    pub soft: bool,
    pub expected: Value,
    pub actual: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ValidationRecord {
    pub fn new(
        name: impl Into<String>,
        verdict: Verdict,
        expected: Value,
        actual: Value,
    ) -> Self {
        Self {
            name: name.into(),
            verdict,
            soft: false,
            expected,
            actual,
            message: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn pass(name: impl Into<String>, expected: Value, actual: Value) -> Self {
        Self::new(name, Verdict::Pass, expected, actual)
    }

    pub fn fail(name: impl Into<String>, expected: Value, actual: Value) -> Self {
        Self::new(name, Verdict::Fail, expected, actual)
    }

    pub fn soft(mut self) -> Self {
        self.soft = true;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

/// Append `record` to the context's validation list.
pub fn record_validation(ctx: &ExecutionContext, record: ValidationRecord) {
    let mut storage = ctx.storage();
    let store = storage.sub(VALIDATION_NAMESPACE);
    let mut records: Vec<ValidationRecord> = store.get(VALIDATION_RECORDS_KEY);
    records.push(record);
    store.put(VALIDATION_RECORDS_KEY, records);
}

/// All validation records accumulated so far, in recording order.
pub fn validations(ctx: &ExecutionContext) -> Vec<ValidationRecord> {
    ctx.storage()
        .sub(VALIDATION_NAMESPACE)
        .get(VALIDATION_RECORDS_KEY)
}
