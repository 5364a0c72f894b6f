//! End-to-end group lifecycle: before-hooks seed shared storage, the body
//! works through a decorated facade and the fixture registry, after-hooks and
//! cleanup actions run regardless of the body's outcome.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crucible_core::{
    decorate, materialize_now, record_validation, retry_until, validations, Catalog,
    CleanupAction, CleanupRegistry, CoreConfig, ExecutionContext, Forge, HookDeclaration,
    HookFlow, HookOutputs, HookRunner, HookTiming, ValidationRecord,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

type Trace = Arc<Mutex<Vec<String>>>;

struct TraceHook {
    tag: &'static str,
    trace: Trace,
}

#[async_trait]
impl HookFlow for TraceHook {
    async fn run(
        &self,
        ctx: &ExecutionContext,
        _arguments: &[String],
        outputs: &mut HookOutputs,
    ) -> anyhow::Result<()> {
        self.trace.lock().unwrap().push(format!("hook:{}", self.tag));
        ctx.put("setup", self.tag, true);
        outputs.insert(self.tag.to_string(), json!("done"));
        Ok(())
    }
}

struct TraceCleanup {
    tag: &'static str,
    trace: Trace,
}

#[async_trait]
impl CleanupAction for TraceCleanup {
    async fn run(&self, _ctx: &ExecutionContext) -> anyhow::Result<()> {
        self.trace.lock().unwrap().push(format!("cleanup:{}", self.tag));
        Ok(())
    }
}

struct AccountForge {
    created: Arc<AtomicU32>,
}

#[async_trait]
impl Forge for AccountForge {
    async fn create(&self, _ctx: &ExecutionContext) -> anyhow::Result<serde_json::Value> {
        let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({ "account_id": id }))
    }
}

/// Capability facade bound to the shared context.
struct DbFacade {
    ctx: ExecutionContext,
}

impl DbFacade {
    fn record_row_count(&self, n: i64) {
        self.ctx.put("db", "row_count", n);
    }
}

struct Project {
    catalog: Arc<Catalog>,
    config: CoreConfig,
    trace: Trace,
    accounts_created: Arc<AtomicU32>,
}

fn project() -> Project {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let accounts_created = Arc::new(AtomicU32::new(0));

    let mut catalog = Catalog::new();
    catalog
        .scope("project.main")
        .hook_flow(
            "MIGRATE",
            TraceHook {
                tag: "MIGRATE",
                trace: Arc::clone(&trace),
            },
        )
        .hook_flow(
            "SEED",
            TraceHook {
                tag: "SEED",
                trace: Arc::clone(&trace),
            },
        )
        .hook_flow(
            "REPORT",
            TraceHook {
                tag: "REPORT",
                trace: Arc::clone(&trace),
            },
        )
        .cleanup(
            "DROP_ACCOUNTS",
            TraceCleanup {
                tag: "DROP_ACCOUNTS",
                trace: Arc::clone(&trace),
            },
        )
        .forge(
            "ACCOUNT",
            AccountForge {
                created: Arc::clone(&accounts_created),
            },
        )
        .facade("DB", |ctx| DbFacade { ctx });

    let config = CoreConfig::default()
        .with_scope("project.main")
        .with_default_namespace("suite");

    Project {
        catalog: Arc::new(catalog),
        config,
        trace,
        accounts_created,
    }
}

fn declarations() -> Vec<HookDeclaration> {
    vec![
        HookDeclaration::new(HookTiming::After, "REPORT", 1),
        HookDeclaration::new(HookTiming::Before, "MIGRATE", 1),
        HookDeclaration::new(HookTiming::Before, "SEED", 2),
    ]
}

#[tokio::test]
async fn full_group_runs_hooks_body_and_cleanup_in_order() {
    init_tracing();
    let project = project();
    let ctx = ExecutionContext::from_config(&project.config);
    let mut runner = HookRunner::from_config(Arc::clone(&project.catalog), &project.config);
    let mut cleanups = CleanupRegistry::new(
        Arc::clone(&project.catalog),
        project.config.scopes.clone(),
    );
    cleanups.register("DROP_ACCOUNTS").expect("register cleanup");

    let trace = Arc::clone(&project.trace);
    let catalog = Arc::clone(&project.catalog);
    let scopes = project.config.scopes.clone();
    let result = runner
        .run_group(&ctx, &declarations(), &mut cleanups, |ctx| {
            let trace = Arc::clone(&trace);
            let catalog = Arc::clone(&catalog);
            async move {
                trace.lock().unwrap().push("body".to_string());

                // Before-hook side effects are visible to the body.
                assert!(ctx.get::<bool>("setup", "MIGRATE"));
                assert!(ctx.get::<bool>("setup", "SEED"));

                // Materialize a fixture and use a decorated facade.
                let account = materialize_now(&catalog, &scopes, &ctx, "ACCOUNT").await?;
                assert_eq!(account["account_id"], json!(1));

                let composed = decorate(Some(&ctx), &catalog, &scopes, &["DB"])?;
                let db = composed.facade::<DbFacade>("DB").expect("bound facade");
                db.record_row_count(12);

                // Poll a domain condition through the retry engine.
                let rows = retry_until(
                    Duration::from_millis(100),
                    Duration::from_millis(5),
                    || async { Ok(ctx.get::<i64>("db", "row_count")) },
                    |n| *n == 12,
                )
                .await?;
                assert_eq!(rows, 12);

                record_validation(
                    &ctx,
                    ValidationRecord::pass("row_count", json!(12), json!(12)),
                );
                Ok(())
            }
        })
        .await;

    assert!(result.is_ok(), "{result:?}");
    assert_eq!(
        *project.trace.lock().unwrap(),
        vec![
            "hook:MIGRATE",
            "hook:SEED",
            "body",
            "hook:REPORT",
            "cleanup:DROP_ACCOUNTS"
        ]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>()
    );
    // Facade mutations land in the shared storage.
    assert_eq!(ctx.get::<i64>("db", "row_count"), 12);
    assert_eq!(project.accounts_created.load(Ordering::SeqCst), 1);
    assert_eq!(validations(&ctx).len(), 1);
}

#[tokio::test]
async fn after_hooks_and_cleanup_run_when_the_body_fails() {
    init_tracing();
    let project = project();
    let ctx = ExecutionContext::from_config(&project.config);
    let mut runner = HookRunner::from_config(Arc::clone(&project.catalog), &project.config);
    let mut cleanups = CleanupRegistry::new(
        Arc::clone(&project.catalog),
        project.config.scopes.clone(),
    );
    cleanups.register("DROP_ACCOUNTS").expect("register cleanup");

    let trace = Arc::clone(&project.trace);
    let result = runner
        .run_group(&ctx, &declarations(), &mut cleanups, |_ctx| {
            let trace = Arc::clone(&trace);
            async move {
                trace.lock().unwrap().push("body".to_string());
                anyhow::bail!("assertion failed: status 500 != 200");
            }
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("assertion failed"), "{err}");
    // The body failed, but REPORT and DROP_ACCOUNTS still ran.
    let trace = project.trace.lock().unwrap();
    assert!(trace.contains(&"hook:REPORT".to_string()));
    assert!(trace.contains(&"cleanup:DROP_ACCOUNTS".to_string()));
}

#[tokio::test]
async fn a_failing_before_hook_skips_the_body() {
    init_tracing();
    struct Boom;

    #[async_trait]
    impl HookFlow for Boom {
        async fn run(
            &self,
            _ctx: &ExecutionContext,
            _arguments: &[String],
            _outputs: &mut HookOutputs,
        ) -> anyhow::Result<()> {
            anyhow::bail!("migration timed out");
        }
    }

    let mut catalog = Catalog::new();
    catalog.scope("project.main").hook_flow("MIGRATE", Boom);
    let catalog = Arc::new(catalog);
    let scopes = vec!["project.main".to_string()];

    let ctx = ExecutionContext::new();
    let mut runner = HookRunner::new(Arc::clone(&catalog), scopes.clone());
    let mut cleanups = CleanupRegistry::new(Arc::clone(&catalog), scopes);

    let body_ran = Arc::new(AtomicU32::new(0));
    let decls = vec![HookDeclaration::new(HookTiming::Before, "MIGRATE", 1)];
    let result = {
        let body_ran = Arc::clone(&body_ran);
        runner
            .run_group(&ctx, &decls, &mut cleanups, move |_ctx| async move {
                body_ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
    };

    let err = result.unwrap_err();
    assert!(err.to_string().contains("MIGRATE"), "{err}");
    assert_eq!(body_ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn duplicate_names_across_scopes_resolve_to_the_first_configured_scope() {
    init_tracing();
    // Two project modules both define an "ALPHA" hook; the configured scope
    // order decides which one runs.
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let mut catalog = Catalog::new();
    catalog.scope("first.pkg").hook_flow(
        "ALPHA",
        TraceHook {
            tag: "first",
            trace: Arc::clone(&trace),
        },
    );
    catalog.scope("second.pkg").hook_flow(
        "ALPHA",
        TraceHook {
            tag: "second",
            trace: Arc::clone(&trace),
        },
    );

    let config = CoreConfig::from_yaml("scopes:\n  - first.pkg\n  - second.pkg\n").expect("yaml");
    let ctx = ExecutionContext::from_config(&config);
    let mut runner = HookRunner::from_config(Arc::new(catalog), &config);

    let decls = vec![HookDeclaration::new(HookTiming::Before, "ALPHA", 1)];
    runner.run_before(&ctx, &decls).await.expect("resolves via fallback");

    assert_eq!(*trace.lock().unwrap(), vec!["hook:first".to_string()]);
}
