//! Error taxonomy for the orchestration core.
//!
//! Every failure the core can produce is one of these variants; nothing is
//! swallowed. Discovery failures (`NotFound`, `Ambiguous`, `InvalidName`)
//! indicate a configuration defect and surface before any test logic runs.

use std::time::Duration;

use crate::discovery::ContractKind;

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors produced by the orchestration core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Discovery found zero matches for the requested contract + name.
    #[error("no {kind} named '{name}' found in scopes {scopes:?}")]
    NotFound {
        kind: ContractKind,
        name: String,
        scopes: Vec<String>,
    },

    /// Discovery found multiple matches even after narrowing to the first
    /// configured scope.
    #[error("ambiguous {kind} '{name}': multiple registrations in scope '{scope}'")]
    Ambiguous {
        kind: ContractKind,
        name: String,
        scope: String,
    },

    /// The requested name is not a known variant identifier anywhere in the
    /// catalog, for any contract.
    #[error("'{name}' is not a known variant name")]
    InvalidName { name: String },

    /// A resolved hook's execution failed. Wraps the cause and names the hook.
    #[error("hook '{name}' failed: {source}")]
    HookExecutionFailure {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// The polled condition was not met within the allowed wait.
    #[error("condition not met within {waited:?} ({attempts} attempts); last: {last}")]
    RetryTimeout {
        waited: Duration,
        attempts: u32,
        last: String,
    },

    /// `decorate` was asked to wrap an absent base context.
    #[error("cannot decorate an absent execution context")]
    CompositionFailure,
}

impl CoreError {
    /// Whether this error indicates a configuration defect rather than a
    /// runtime condition. Configuration defects fail fast before test logic.
    pub fn is_configuration_defect(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Ambiguous { .. }
                | Self::InvalidName { .. }
                | Self::CompositionFailure
        )
    }
}
