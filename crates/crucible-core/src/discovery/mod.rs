//! Variant registry and discovery.
//!
//! Named, pluggable implementations of a contract (hook flows, forges,
//! cleanup actions, facades) are registered up front in a [`Catalog`], keyed
//! by `(contract kind, name, scope)`. Resolution searches an ordered list of
//! scopes and disambiguates deterministically:
//!
//! 1. Search all configured scopes. Exactly one match: return it.
//! 2. Zero matches: `NotFound`.
//! 3. More than one match: retry restricted to the first configured scope.
//!    One match there wins; zero is `NotFound`; more than one (a duplicate
//!    inside a single scope) is `Ambiguous`.
//!
//! A name that is registered nowhere at all, for any contract, is an
//! `InvalidName` rather than `NotFound` - callers branch on the difference.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::context::ExecutionContext;
use crate::errors::{CoreError, CoreResult};
use crate::fixtures::{CleanupAction, Forge};
use crate::hooks::HookFlow;

/// Factory producing a capability facade bound to an execution context.
pub type FacadeFactory =
    dyn Fn(ExecutionContext) -> Arc<dyn Any + Send + Sync> + Send + Sync;

/// The capability being requested from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    HookFlow,
    Forge,
    Cleanup,
    Facade,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HookFlow => write!(f, "hook flow"),
            Self::Forge => write!(f, "forge"),
            Self::Cleanup => write!(f, "cleanup action"),
            Self::Facade => write!(f, "facade"),
        }
    }
}

struct Registered<T> {
    name: String,
    scope: String,
    value: T,
}

/// Registry of all variants, built once at startup.
#[derive(Default)]
pub struct Catalog {
    hook_flows: Vec<Registered<Arc<dyn HookFlow>>>,
    forges: Vec<Registered<Arc<dyn Forge>>>,
    cleanups: Vec<Registered<Arc<dyn CleanupAction>>>,
    facades: Vec<Registered<Arc<FacadeFactory>>>,
    known_names: HashSet<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start registering variants under `scope`.
    pub fn scope(&mut self, scope: impl Into<String>) -> ScopeBuilder<'_> {
        ScopeBuilder {
            catalog: self,
            scope: scope.into(),
        }
    }

    /// Every distinct variant name in the catalog, across all kinds and
    /// scopes.
    pub fn known_names(&self) -> impl Iterator<Item = &str> {
        self.known_names.iter().map(String::as_str)
    }

    pub fn resolve_hook_flow(
        &self,
        name: &str,
        scopes: &[String],
    ) -> CoreResult<Arc<dyn HookFlow>> {
        self.resolve_in(&self.hook_flows, ContractKind::HookFlow, name, scopes)
    }

    pub fn resolve_forge(&self, name: &str, scopes: &[String]) -> CoreResult<Arc<dyn Forge>> {
        self.resolve_in(&self.forges, ContractKind::Forge, name, scopes)
    }

    pub fn resolve_cleanup(
        &self,
        name: &str,
        scopes: &[String],
    ) -> CoreResult<Arc<dyn CleanupAction>> {
        self.resolve_in(&self.cleanups, ContractKind::Cleanup, name, scopes)
    }

    pub fn resolve_facade(
        &self,
        name: &str,
        scopes: &[String],
    ) -> CoreResult<Arc<FacadeFactory>> {
        self.resolve_in(&self.facades, ContractKind::Facade, name, scopes)
    }

    /// The resolution algorithm, shared by every contract kind.
    fn resolve_in<T: Clone>(
        &self,
        entries: &[Registered<T>],
        kind: ContractKind,
        name: &str,
        scopes: &[String],
    ) -> CoreResult<T> {
        if !self.known_names.contains(name) {
            return Err(CoreError::InvalidName { name: name.into() });
        }

        let matches = Self::matches_in(entries, name, scopes);
        match matches.len() {
            1 => {
                debug!(%kind, name, scope = %matches[0].scope, "resolved variant");
                Ok(matches[0].value.clone())
            }
            0 => Err(CoreError::NotFound {
                kind,
                name: name.into(),
                scopes: scopes.to_vec(),
            }),
            n => {
                // Ambiguous across scopes: the first configured scope wins.
                let first = match scopes.first() {
                    Some(first) => first,
                    None => {
                        return Err(CoreError::NotFound {
                            kind,
                            name: name.into(),
                            scopes: scopes.to_vec(),
                        })
                    }
                };
                debug!(
                    %kind,
                    name,
                    matches = n,
                    fallback_scope = %first,
                    "ambiguous variant, narrowing to first configured scope"
                );
                let narrowed = Self::matches_in(entries, name, std::slice::from_ref(first));
                match narrowed.len() {
                    1 => Ok(narrowed[0].value.clone()),
                    0 => Err(CoreError::NotFound {
                        kind,
                        name: name.into(),
                        scopes: vec![first.clone()],
                    }),
                    _ => Err(CoreError::Ambiguous {
                        kind,
                        name: name.into(),
                        scope: first.clone(),
                    }),
                }
            }
        }
    }

    fn matches_in<'a, T>(
        entries: &'a [Registered<T>],
        name: &str,
        scopes: &[String],
    ) -> Vec<&'a Registered<T>> {
        entries
            .iter()
            .filter(|e| e.name == name && scopes.iter().any(|s| *s == e.scope))
            .collect()
    }

    fn remember(&mut self, name: &str) {
        self.known_names.insert(name.to_string());
    }
}

/// Registers variants under one scope. Obtained from [`Catalog::scope`].
pub struct ScopeBuilder<'a> {
    catalog: &'a mut Catalog,
    scope: String,
}

impl ScopeBuilder<'_> {
    pub fn hook_flow(self, name: impl Into<String>, flow: impl HookFlow + 'static) -> Self {
        let name = name.into();
        self.catalog.remember(&name);
        self.catalog.hook_flows.push(Registered {
            name,
            scope: self.scope.clone(),
            value: Arc::new(flow),
        });
        self
    }

    pub fn forge(self, name: impl Into<String>, forge: impl Forge + 'static) -> Self {
        let name = name.into();
        self.catalog.remember(&name);
        self.catalog.forges.push(Registered {
            name,
            scope: self.scope.clone(),
            value: Arc::new(forge),
        });
        self
    }

    pub fn cleanup(self, name: impl Into<String>, action: impl CleanupAction + 'static) -> Self {
        let name = name.into();
        self.catalog.remember(&name);
        self.catalog.cleanups.push(Registered {
            name,
            scope: self.scope.clone(),
            value: Arc::new(action),
        });
        self
    }

    /// Register a facade constructor. The constructor receives a clone of the
    /// base context (sharing its storage) and returns the bound facade.
    pub fn facade<T, F>(self, name: impl Into<String>, construct: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(ExecutionContext) -> T + Send + Sync + 'static,
    {
        let name = name.into();
        self.catalog.remember(&name);
        self.catalog.facades.push(Registered {
            name,
            scope: self.scope.clone(),
            value: Arc::new(move |ctx| Arc::new(construct(ctx)) as Arc<dyn Any + Send + Sync>),
        });
        self
    }
}
