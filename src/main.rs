//! Satire desk binary.
//! Loads config, seeds writers and styles, starts the background jobs and an
//! optional `/metrics` listener, then waits for Ctrl-C.

use anyhow::Context;
use satire_desk::config::AppConfig;
use satire_desk::metrics::Metrics;
use satire_desk::Desk;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` wins; otherwise desk modules at info, everything else at warn.
/// `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("satire_desk=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

async fn serve_metrics(metrics: Metrics, addr: String) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding metrics listener on {addr}"))?;
    info!(%addr, "metrics endpoint listening");
    axum::serve(listener, metrics.router()).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    let metrics = Metrics::init()?;

    let desk = Desk::build(&cfg)?;
    info!(
        daily_tokens = desk.budget.daily_limit(),
        minimum_articles = cfg.quota.minimum_articles,
        window_hours = cfg.quota.window_hours,
        "satire desk ready"
    );

    let metrics_task = match std::env::var("METRICS_ADDR") {
        Ok(addr) if !addr.trim().is_empty() => Some(tokio::spawn(async move {
            if let Err(e) = serve_metrics(metrics, addr).await {
                warn!(error = %e, "metrics endpoint stopped");
            }
        })),
        _ => None,
    };

    let scheduler = desk.start_scheduler(&cfg)?;
    if scheduler.is_empty() {
        info!("no jobs running; waiting for Ctrl-C");
    }

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl-C")?;
    info!("shutdown requested");

    scheduler.shutdown();
    if let Some(t) = metrics_task {
        t.abort();
    }
    Ok(())
}
