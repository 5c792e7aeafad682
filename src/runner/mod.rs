//! Sequential case execution.
//!
//! Cases run one at a time, in collection order. Each runs inside its own
//! `case` span; a panicking check is reported as an error of that case and
//! the run continues. Every session still open at the end is closed.

pub mod plan;

pub use plan::{inventory_source, RunPlan};

use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, Instrument};

use crate::cache::CommandCache;
use crate::checks::{CheckContext, Outcome};
use crate::config::{ChecksConfig, Config, DockerConfig};
use crate::dispatch::CommandDispatcher;
use crate::error::{EXIT_FAILURES, EXIT_NO_CASES, EXIT_OK};
use crate::host::HostRegistry;
use crate::intent::StructuredConfigs;
use crate::inventory::ResolvedHost;
use crate::matrix::{Case, Target};
use crate::session::{SessionConnector, SessionSettings};

/// Outcome of one case
#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub id: String,
    pub module: &'static str,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

/// Counts per outcome over a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub xfailed: usize,
    pub errors: usize,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Sessions closed at teardown
    pub sessions_closed: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed(_) => self.failed += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::XFailed(_) => self.xfailed += 1,
            Outcome::Error(_) => self.errors += 1,
        }
    }

    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a CaseResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.record(&result.outcome);
            summary.duration += result.duration;
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed + self.errors > 0
    }

    /// 5 without cases, 1 with any failure or error, else 0
    pub fn exit_code(&self) -> i32 {
        if self.total == 0 {
            EXIT_NO_CASES
        } else if self.has_failures() {
            EXIT_FAILURES
        } else {
            EXIT_OK
        }
    }
}

/// Hosts, dispatcher and intent shared by every case of a run
pub struct Runner {
    registry: HostRegistry,
    dispatcher: CommandDispatcher,
    intent: StructuredConfigs,
    checks: ChecksConfig,
    docker: DockerConfig,
}

impl Runner {
    pub fn new(
        config: &Config,
        hosts: Vec<ResolvedHost>,
        intent: StructuredConfigs,
        connector: Arc<dyn SessionConnector>,
    ) -> Self {
        let cache = CommandCache::shared(config.cache.effective_capacity());
        Self {
            registry: HostRegistry::new(hosts, connector, SessionSettings::from(config)),
            dispatcher: CommandDispatcher::new(cache),
            intent,
            checks: config.checks.clone(),
            docker: config.docker.clone(),
        }
    }

    /// Runner for a prepared plan; the plan keeps its cases
    pub fn for_plan(config: &Config, plan: &mut RunPlan, connector: Arc<dyn SessionConnector>) -> Self {
        let hosts = std::mem::take(&mut plan.hosts);
        let intent = std::mem::take(&mut plan.intent);
        Self::new(config, hosts, intent, connector)
    }

    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    fn context(&self) -> CheckContext<'_> {
        CheckContext {
            registry: &self.registry,
            dispatcher: &self.dispatcher,
            intent: &self.intent,
            settings: &self.checks,
            docker: &self.docker,
        }
    }

    /// Run one case. Never fails: every problem becomes the case outcome.
    pub async fn run_case(&self, case: &Case) -> CaseResult {
        let started = Instant::now();
        let span = info_span!("case", id = %case.id);

        let outcome = async {
            if let Target::Missing { reason } = &case.target {
                return Outcome::Failed(reason.clone());
            }

            let ctx = self.context();
            let run = case.runner.run(&ctx, &case.target, case.param.as_ref());
            match AssertUnwindSafe(run).catch_unwind().await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => e.into_outcome(),
                Err(panic) => Outcome::Error(format!("check panicked: {}", panic_message(&*panic))),
            }
        }
        .instrument(span)
        .await;

        debug!(id = %case.id, outcome = outcome.label(), "Case finished");
        CaseResult {
            id: case.id.clone(),
            module: case.module,
            outcome,
            duration: started.elapsed(),
        }
    }

    /// Run `cases` in order, reporting each result to `observer`, then
    /// close every open session.
    pub async fn run(&self, cases: &[Case], mut observer: impl FnMut(&CaseResult)) -> RunSummary {
        let started = Instant::now();
        info!(cases = cases.len(), hosts = self.registry.len(), "Run started");

        let mut summary = RunSummary::default();
        for case in cases {
            let result = self.run_case(case).await;
            summary.record(&result.outcome);
            observer(&result);
        }

        summary.sessions_closed = self.registry.teardown_all().await;
        summary.duration = started.elapsed();
        let metrics = self.dispatcher.cache().metrics();
        info!(
            passed = summary.passed,
            failed = summary.failed,
            errors = summary.errors,
            cache = %metrics.summary(),
            "Run finished"
        );
        summary
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("registry", &self.registry)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
