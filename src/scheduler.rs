// src/scheduler.rs
//! Background jobs: jittered recurring runs plus daily wall-clock triggers.
//!
//! Every run executes in its own task under a timeout. A run that errors,
//! panics or overruns is logged and counted; the loop then draws a fresh
//! delay and carries on. State lives in the store, so a restart just starts
//! a fresh cycle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveTime, TimeZone};
use metrics::counter;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::budget::TokenBudget;
use crate::config::{parse_hhmm, SchedulerConfig};
use crate::featured::FeaturedSelector;
use crate::generation::ArticleGenerator;
use crate::news::NewsIngestor;

#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    async fn run(&self) -> anyhow::Result<()>;
}

/// Uniform delay in `[min, max]`. Inverted bounds are swapped.
pub fn jittered_delay<R: Rng + ?Sized>(min: Duration, max: Duration, rng: &mut R) -> Duration {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    let lo_ms = lo.as_millis() as u64;
    let hi_ms = hi.as_millis() as u64;
    if lo_ms == hi_ms {
        return lo;
    }
    Duration::from_millis(rng.random_range(lo_ms..=hi_ms))
}

/// Time from `now` until the next occurrence of wall-clock `at` in `now`'s zone,
/// strictly in the future. Nonexistent local times (DST gaps) move to the next day.
pub fn duration_until<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> Duration {
    let tz = now.timezone();
    let mut day = now.date_naive();
    for _ in 0..3 {
        if let Some(target) = tz.from_local_datetime(&day.and_time(at)).earliest() {
            if target > *now {
                let ms = target.timestamp_millis() - now.timestamp_millis();
                return Duration::from_millis(ms.max(0) as u64);
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    Duration::from_secs(24 * 3600)
}

/// Run one job in its own task, bounded by `timeout`. Returns whether it succeeded.
pub async fn run_guarded(job: Arc<dyn Job>, timeout: Duration) -> bool {
    let name = job.name();
    counter!("scheduler_job_runs_total", "job" => name).increment(1);
    debug!(target: "scheduler", job = name, "job started");

    let task = tokio::spawn(async move { job.run().await });
    let abort = task.abort_handle();
    let failure = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(()))) => None,
        Ok(Ok(Err(e))) => Some(format!("{e:#}")),
        Ok(Err(join)) if join.is_panic() => Some("job panicked".to_string()),
        Ok(Err(join)) => Some(join.to_string()),
        Err(_) => {
            abort.abort();
            Some(format!("timed out after {timeout:?}"))
        }
    };

    match failure {
        None => {
            debug!(target: "scheduler", job = name, "job finished");
            true
        }
        Some(reason) => {
            counter!("scheduler_job_failures_total", "job" => name).increment(1);
            error!(target: "scheduler", job = name, %reason, "job failed");
            false
        }
    }
}

/// Run now, then again after a fresh random delay in `[min, max]` each time.
pub fn spawn_jittered(job: Arc<dyn Job>, min: Duration, max: Duration, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            run_guarded(job.clone(), timeout).await;
            let delay = {
                let mut rng = rand::rng();
                jittered_delay(min, max, &mut rng)
            };
            debug!(target: "scheduler", job = job.name(), delay_secs = delay.as_secs(), "next run scheduled");
            tokio::time::sleep(delay).await;
        }
    })
}

/// Run once a day at local wall-clock `at`.
pub fn spawn_daily(job: Arc<dyn Job>, at: NaiveTime, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = duration_until(&Local::now(), at);
            debug!(target: "scheduler", job = job.name(), wait_secs = wait.as_secs(), "waiting for daily slot");
            tokio::time::sleep(wait).await;
            run_guarded(job.clone(), timeout).await;
        }
    })
}

// ------------------------------------------------------------
// Jobs
// ------------------------------------------------------------

pub struct GenerationJob(pub Arc<ArticleGenerator>);

#[async_trait]
impl Job for GenerationJob {
    fn name(&self) -> &'static str {
        "generation"
    }
    async fn run(&self) -> anyhow::Result<()> {
        self.0.run_cycle().await.context("generation cycle")?;
        Ok(())
    }
}

/// Keeps the source table warm between generation cycles.
pub struct NewsTopUpJob {
    pub ingestor: Arc<NewsIngestor>,
    pub items: u32,
}

#[async_trait]
impl Job for NewsTopUpJob {
    fn name(&self) -> &'static str {
        "news_topup"
    }
    async fn run(&self) -> anyhow::Result<()> {
        match self.ingestor.ingest(self.items).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_expected() => {
                info!(target: "scheduler", reason = %e, "news top-up skipped");
                Ok(())
            }
            Err(e) => Err(e).context("news top-up"),
        }
    }
}

pub struct FeaturedJob(pub Arc<FeaturedSelector>);

#[async_trait]
impl Job for FeaturedJob {
    fn name(&self) -> &'static str {
        "featured"
    }
    async fn run(&self) -> anyhow::Result<()> {
        self.0.run_today().context("featured selection")?;
        Ok(())
    }
}

pub struct BudgetResetJob(pub Arc<TokenBudget>);

#[async_trait]
impl Job for BudgetResetJob {
    fn name(&self) -> &'static str {
        "budget_reset"
    }
    async fn run(&self) -> anyhow::Result<()> {
        self.0.reset_daily();
        Ok(())
    }
}

/// What the scheduler drives.
pub struct SchedulerDeps {
    pub generator: Arc<ArticleGenerator>,
    pub ingestor: Arc<NewsIngestor>,
    pub featured: Arc<FeaturedSelector>,
    pub budget: Arc<TokenBudget>,
    pub topup_items: u32,
}

/// Handles of the running job loops.
pub struct Scheduler {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    /// Spawn every enabled job. With the master switch off nothing runs.
    pub fn start(cfg: &SchedulerConfig, deps: SchedulerDeps) -> anyhow::Result<Self> {
        let mut handles = Vec::new();
        if !cfg.enabled {
            warn!(target: "scheduler", "scheduler disabled, no background jobs will run");
            return Ok(Self { handles });
        }

        let gen = &cfg.generation;
        if gen.enabled {
            let job: Arc<dyn Job> = Arc::new(GenerationJob(deps.generator));
            handles.push((
                "generation",
                spawn_jittered(job, gen.min_interval(), gen.max_interval(), gen.timeout()),
            ));
        }

        let topup = &cfg.news_topup;
        if topup.enabled {
            let job: Arc<dyn Job> = Arc::new(NewsTopUpJob {
                ingestor: deps.ingestor,
                items: deps.topup_items,
            });
            handles.push((
                "news_topup",
                spawn_jittered(job, topup.min_interval(), topup.max_interval(), topup.timeout()),
            ));
        }

        if cfg.featured.enabled {
            let job: Arc<dyn Job> = Arc::new(FeaturedJob(deps.featured));
            handles.push((
                "featured",
                spawn_daily(job, cfg.featured.at_time()?, cfg.featured.timeout()),
            ));
        }

        let reset_at = parse_hhmm(&cfg.budget_reset_at)?;
        let job: Arc<dyn Job> = Arc::new(BudgetResetJob(deps.budget));
        handles.push(("budget_reset", spawn_daily(job, reset_at, Duration::from_secs(10))));

        info!(
            target: "scheduler",
            jobs = ?handles.iter().map(|(n, _)| *n).collect::<Vec<_>>(),
            "scheduler started"
        );
        Ok(Self { handles })
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.handles.iter().map(|(n, _)| *n).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Abort every job loop. In-flight runs are cancelled with them.
    pub fn shutdown(self) {
        for (name, h) in self.handles {
            h.abort();
            debug!(target: "scheduler", job = name, "job loop stopped");
        }
    }
}
