// src/config/mod.rs
//! Application configuration: one TOML file plus a few env overrides.

pub mod llm;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;

use self::llm::LlmConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/satire_desk.toml";
pub const ENV_CONFIG_PATH: &str = "SATIRE_DESK_CONFIG_PATH";
/// `off` disables every scheduled job regardless of the file.
pub const ENV_SCHEDULER_SWITCH: &str = "SATIRE_DESK_SCHEDULER";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub budget: BudgetConfig,
    pub quota: QuotaConfig,
    pub news: NewsConfig,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub images: ImagesConfig,
    pub styles_path: Option<PathBuf>,
    pub voices_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Master switch for all jobs.
    pub enabled: bool,
    pub generation: JobConfig,
    pub news_topup: JobConfig,
    pub featured: DailyJobConfig,
    /// Local wall-clock time the news budget refills, `HH:MM`.
    pub budget_reset_at: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            generation: JobConfig {
                enabled: true,
                min_interval_secs: 3_600,
                max_interval_secs: 7_200,
                timeout_secs: 900,
            },
            news_topup: JobConfig {
                enabled: true,
                min_interval_secs: 1_800,
                max_interval_secs: 5_400,
                timeout_secs: 120,
            },
            featured: DailyJobConfig::default(),
            budget_reset_at: "00:00".to_string(),
        }
    }
}

/// A recurring job whose next delay is drawn from `[min, max]` seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub enabled: bool,
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
    /// Upper bound on a single run.
    pub timeout_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_secs: 3_600,
            max_interval_secs: 7_200,
            timeout_secs: 600,
        }
    }
}

impl JobConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }
    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_secs)
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A job fired once a day at a local wall-clock time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DailyJobConfig {
    pub enabled: bool,
    /// `HH:MM`, local time.
    pub at: String,
    pub timeout_secs: u64,
}

impl Default for DailyJobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            at: "23:00".to_string(),
            timeout_secs: 60,
        }
    }
}

impl DailyJobConfig {
    pub fn at_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.at)
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Feed calls allowed per day.
    pub daily_limit: u32,
    /// Items one feed call returns.
    pub items_per_token: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit: 200,
            items_per_token: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Articles the trailing window should always hold.
    pub minimum_articles: u32,
    pub window_hours: u32,
    /// Source items requested per missing article.
    pub oversample_factor: u32,
    pub special_style_probability: f64,
    /// Articles drafted at the same time within one cycle.
    pub max_concurrent_articles: usize,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            minimum_articles: 10,
            window_hours: 24,
            oversample_factor: 2,
            special_style_probability: crate::style::DEFAULT_SPECIAL_PROBABILITY,
            max_concurrent_articles: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub endpoint: String,
    /// "ENV" means: read from NEWSDATA_API_KEY.
    pub api_key: String,
    pub language: String,
    pub timeout_secs: u64,
    /// Items the top-up job asks for per run.
    pub topup_items: u32,
    /// Serve pages from a local JSON file instead of the network.
    pub fixture_path: Option<PathBuf>,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://newsdata.io/api/1/latest".to_string(),
            api_key: "ENV".to_string(),
            language: "en".to_string(),
            timeout_secs: 15,
            topup_items: 10,
            fixture_path: None,
        }
    }
}

impl NewsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Keep everything in process memory (staging/tests).
    pub in_memory: bool,
    pub sqlite_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            in_memory: false,
            sqlite_path: PathBuf::from("data/satire_desk.sqlite"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Reference stored when no image could be produced.
    pub placeholder_ref: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            placeholder_ref: "images/placeholder.webp".to_string(),
        }
    }
}

pub fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .with_context(|| format!("expected HH:MM local time, got `{s}`"))
}

impl AppConfig {
    /// Resolve the path from `$SATIRE_DESK_CONFIG_PATH`, else the default.
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                ));
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        tracing::warn!("no config file found at {DEFAULT_CONFIG_PATH}, using defaults");
        let mut cfg = Self::default();
        cfg.normalize()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing config at {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s)?;
        cfg.normalize()?;
        Ok(cfg)
    }

    /// Fix up inverted ranges and out-of-range numbers, resolve "ENV" keys
    /// and apply the scheduler env switch.
    pub fn normalize(&mut self) -> Result<()> {
        for job in [
            &mut self.scheduler.generation,
            &mut self.scheduler.news_topup,
        ] {
            if job.min_interval_secs > job.max_interval_secs {
                std::mem::swap(&mut job.min_interval_secs, &mut job.max_interval_secs);
            }
            if job.timeout_secs == 0 {
                job.timeout_secs = JobConfig::default().timeout_secs;
            }
        }
        parse_hhmm(&self.scheduler.budget_reset_at)?;
        self.scheduler.featured.at_time()?;

        if env::var(ENV_SCHEDULER_SWITCH)
            .map(|v| v.eq_ignore_ascii_case("off") || v == "0")
            .unwrap_or(false)
        {
            self.scheduler.enabled = false;
        }

        self.budget.items_per_token = self.budget.items_per_token.max(1);
        let q = &mut self.quota;
        if !q.special_style_probability.is_finite() {
            q.special_style_probability = crate::style::DEFAULT_SPECIAL_PROBABILITY;
        }
        q.special_style_probability = q.special_style_probability.clamp(0.0, 1.0);
        q.oversample_factor = q.oversample_factor.max(1);
        q.max_concurrent_articles = q.max_concurrent_articles.max(1);

        if self.news.api_key.trim().eq_ignore_ascii_case("env") {
            self.news.api_key = env::var("NEWSDATA_API_KEY").unwrap_or_default();
        }
        if self.news.timeout_secs == 0 {
            self.news.timeout_secs = NewsConfig::default().timeout_secs;
        }

        self.llm.normalize();
        Ok(())
    }
}
