// src/metrics.rs
use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the desk's series.
    /// Fails if a global recorder is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe();
        Ok(Self { handle })
    }

    /// Recorder-less handle for tests; nothing is registered globally.
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: recorder.handle(),
        }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("news_fetch_calls_total", "Feed calls made (each costs one token)");
    describe_counter!("news_items_ingested_total", "New source items stored");
    describe_counter!("news_items_duplicate_total", "Feed items skipped as already stored");
    describe_gauge!("news_budget_remaining", "Feed tokens left today");
    describe_counter!("articles_generated_total", "Articles persisted");
    describe_counter!("article_draft_failures_total", "Articles abandoned at the draft stage");
    describe_counter!(
        "editorial_stage_fallbacks_total",
        "Edit stages that kept their input after a failed call"
    );
    describe_counter!("scheduler_job_runs_total", "Scheduled job runs started");
    describe_counter!("scheduler_job_failures_total", "Scheduled job runs that failed, panicked or timed out");
}
