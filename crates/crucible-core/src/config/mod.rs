//! Core configuration: the discovery scope list and the default storage
//! namespace. Loaded from YAML or assembled in code with builder setters.

use anyhow::Context;
use serde::Deserialize;

use crate::storage::DEFAULT_NAMESPACE;

/// Configuration consumed by the core.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    /// Scopes searched by discovery, highest priority first. The first scope
    /// wins when a variant name is ambiguous across scopes.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Name of the root storage namespace.
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            scopes: Vec::new(),
            default_namespace: default_namespace(),
        }
    }
}

impl CoreConfig {
    /// Parse a YAML configuration document.
    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(raw).context("failed to parse core config")
    }

    /// Append a discovery scope (lowest priority so far).
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// Override the root storage namespace.
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }
}
