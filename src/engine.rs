//! Resource checker: runs the job list against one snapshot.
//!
//! Jobs run sequentially in input order. A check that returns an error,
//! panics or overruns its timeout is recorded as a single FAIL finding and
//! the run continues. Only a failure to collect data aborts the run; a
//! timeout against a source queried on demand (MySQL) counts as one.

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::checks::Execution;
use crate::collector::{CollectError, DataCollector, Snapshot};
use crate::core::{Finding, Report, ResultMap};
use crate::exit;
use crate::jobs::CheckJob;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound for each suspending check.
    pub check_timeout: Duration,
    pub show_progress: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            check_timeout: Duration::from_secs(30),
            show_progress: false,
        }
    }
}

pub struct ResourceChecker {
    collector: Box<dyn DataCollector>,
    jobs: Vec<CheckJob>,
    opts: EngineOptions,
    completed: usize,
    results: ResultMap,
}

impl ResourceChecker {
    pub fn new(collector: Box<dyn DataCollector>, jobs: Vec<CheckJob>, opts: EngineOptions) -> Self {
        Self {
            collector,
            jobs,
            opts,
            completed: 0,
            results: ResultMap::new(),
        }
    }

    /// Number of jobs that will run.
    pub fn total(&self) -> usize {
        self.jobs.iter().filter(|job| job.enabled()).count()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Collects the snapshot and runs every enabled job against it.
    pub async fn execute(&mut self) -> Result<&ResultMap> {
        let snapshot = self.collect().await?;
        self.run(&snapshot).await
    }

    /// Fetches the snapshot. Failure is fatal for the run.
    pub async fn collect(&self) -> Result<Snapshot> {
        let provider = self.collector.provider();
        let started = Instant::now();
        let snapshot = self.collector.fetch_data().await.map_err(|err| {
            exit::collection_failed_err(
                anyhow::Error::new(err)
                    .context(format!("failed to collect {} data", provider.display_name())),
            )
        })?;
        info!(
            provider = %provider,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "collected data"
        );
        Ok(snapshot)
    }

    /// Runs every enabled job against an already collected snapshot.
    pub async fn run(&mut self, snapshot: &Snapshot) -> Result<&ResultMap> {
        self.results = ResultMap::new();
        self.completed = 0;

        let progress = Progress(self.progress_bar());
        for job in self.jobs.iter().filter(|job| job.enabled()) {
            progress.start(job.id());
            let findings = run_job(job, snapshot, self.opts.check_timeout).await?;
            debug!(check_id = job.id(), findings = findings.len(), "check finished");
            self.results.insert(job.id(), findings);
            self.completed += 1;
            progress.advance();
        }
        drop(progress);
        Ok(&self.results)
    }

    pub fn reports(&self) -> &ResultMap {
        &self.results
    }

    pub fn failing_reports(&self) -> Vec<&Finding> {
        self.results.failing_reports()
    }

    pub fn failing_objects(&self) -> BTreeSet<String> {
        self.results.failing_objects()
    }

    pub fn report(&self) -> Report<'_> {
        Report::new(self.collector.provider(), &self.results)
    }

    fn progress_bar(&self) -> Option<indicatif::ProgressBar> {
        use std::io::IsTerminal;
        if !self.opts.show_progress || !std::io::stderr().is_terminal() {
            return None;
        }
        let pb = indicatif::ProgressBar::new(self.total() as u64);
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        if let Ok(style) =
            indicatif::ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_msg}")
        {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

/// Clears the progress bar when the run ends, early returns included.
struct Progress(Option<indicatif::ProgressBar>);

impl Progress {
    fn start(&self, check_id: &str) {
        if let Some(pb) = &self.0 {
            pb.set_message(check_id.to_string());
        }
    }

    fn advance(&self) {
        if let Some(pb) = &self.0 {
            pb.inc(1);
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if let Some(pb) = self.0.take() {
            pb.finish_and_clear();
        }
    }
}

/// Runs one job, turning check failures into a synthetic FAIL finding.
/// Errors out only when the check hit a data collection failure.
async fn run_job(job: &CheckJob, snapshot: &Snapshot, timeout: Duration) -> Result<Vec<Finding>> {
    let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| job.execute(snapshot))) {
        Ok(Execution::Immediate(result)) => result,
        Ok(Execution::Deferred(fut)) => {
            match tokio::time::timeout(timeout, AssertUnwindSafe(fut).catch_unwind()).await {
                Ok(Ok(result)) => result,
                Ok(Err(payload)) => Err(panic_error(payload.as_ref())),
                // Checks over a live source only wait on that source.
                Err(_) if snapshot.queries_on_demand() => Err(CollectError::SourceTimeout {
                    context: format!("{} data for {}", snapshot.provider().display_name(), job.id()),
                    timeout,
                }
                .into()),
                Err(_) => Err(anyhow::anyhow!("timed out after {}s", timeout.as_secs())),
            }
        }
        Err(payload) => Err(panic_error(payload.as_ref())),
    };

    match outcome {
        Ok(findings) => Ok(findings),
        Err(err) if err.chain().any(|cause| cause.is::<CollectError>()) => Err(
            exit::collection_failed_err(err.context(format!("check {} could not read data", job.id()))),
        ),
        Err(err) => {
            warn!(check_id = job.id(), error = %format!("{err:#}"), "check failed");
            Ok(vec![Finding::check_error(job.descriptor(), format!("{err:#}"))])
        }
    }
}

fn panic_error(payload: &(dyn std::any::Any + Send)) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    anyhow::anyhow!("panicked: {message}")
}
