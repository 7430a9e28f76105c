// src/desk.rs
//! Wires config into the running desk: storage, seeding, feed client, LLM,
//! editorial pipeline, generator and featured selector.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::budget::TokenBudget;
use crate::config::AppConfig;
use crate::editorial::EditorialPipeline;
use crate::featured::FeaturedSelector;
use crate::generation::{ArticleGenerator, Collections};
use crate::images::PlaceholderImages;
use crate::llm::build_llm_client;
use crate::models::{FeaturedArticle, GeneratedArticle, SourceItem, StyleProfile, Voice};
use crate::news::newsdata::NewsDataClient;
use crate::news::{FixtureNewsApi, NewsApi, NewsIngestor};
use crate::scheduler::{Scheduler, SchedulerDeps};
use crate::seed;
use crate::store::memory::MemoryAdapter;
use crate::store::sqlite::SqliteStore;
use crate::store::Repository;
use crate::style::{StyleCatalog, DEFAULT_STYLES_PATH};

/// Every repository the desk uses, over one engine.
#[derive(Clone)]
pub struct Stores {
    pub sources: Repository<SourceItem>,
    pub voices: Repository<Voice>,
    pub articles: Repository<GeneratedArticle>,
    pub featured: Repository<FeaturedArticle>,
    pub styles: Repository<StyleProfile>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            sources: Repository::new(MemoryAdapter::<SourceItem>::new()),
            voices: Repository::new(MemoryAdapter::<Voice>::new()),
            articles: Repository::new(MemoryAdapter::<GeneratedArticle>::new()),
            featured: Repository::new(MemoryAdapter::<FeaturedArticle>::new()),
            styles: Repository::new(MemoryAdapter::<StyleProfile>::new()),
        }
    }

    pub fn sqlite(db: &SqliteStore) -> Self {
        Self {
            sources: Repository::new(db.adapter::<SourceItem>()),
            voices: Repository::new(db.adapter::<Voice>()),
            articles: Repository::new(db.adapter::<GeneratedArticle>()),
            featured: Repository::new(db.adapter::<FeaturedArticle>()),
            styles: Repository::new(db.adapter::<StyleProfile>()),
        }
    }
}

pub struct Desk {
    pub stores: Stores,
    pub budget: Arc<TokenBudget>,
    pub ingestor: Arc<NewsIngestor>,
    pub generator: Arc<ArticleGenerator>,
    pub featured: Arc<FeaturedSelector>,
    topup_items: u32,
}

impl Desk {
    pub fn build(cfg: &AppConfig) -> Result<Self> {
        let stores = if cfg.storage.in_memory {
            info!("using in-memory storage");
            Stores::in_memory()
        } else {
            let db = SqliteStore::open(&cfg.storage.sqlite_path)
                .with_context(|| format!("opening {}", cfg.storage.sqlite_path.display()))?;
            Stores::sqlite(&db)
        };
        Self::with_stores(cfg, stores, news_api(cfg)?)
    }

    /// Build around existing stores and feed client.
    pub fn with_stores(cfg: &AppConfig, stores: Stores, api: Arc<dyn NewsApi>) -> Result<Self> {
        let styles_path = cfg
            .styles_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STYLES_PATH));
        let styles = Arc::new(StyleCatalog::load(&styles_path)?);
        seed::seed_styles(&stores.styles, &styles)?;

        let voices_path = cfg
            .voices_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(seed::DEFAULT_VOICES_PATH));
        seed::seed_voices(&stores.voices, seed::load_voices(&voices_path)?)?;

        let budget = Arc::new(TokenBudget::new(
            cfg.budget.daily_limit,
            cfg.budget.items_per_token,
        ));
        let ingestor = Arc::new(NewsIngestor::new(
            api,
            budget.clone(),
            stores.sources.clone(),
            cfg.news.timeout(),
        ));

        let llm = build_llm_client(&cfg.llm)?;
        let pipeline = Arc::new(EditorialPipeline::new(
            llm,
            styles,
            Duration::from_secs(cfg.llm.timeout_secs),
            cfg.llm.temperature,
        ));
        let generator = Arc::new(ArticleGenerator::new(
            cfg.quota.clone(),
            ingestor.clone(),
            pipeline,
            Arc::new(PlaceholderImages::new(cfg.images.placeholder_ref.clone())),
            cfg.images.placeholder_ref.clone(),
            Collections {
                articles: stores.articles.clone(),
                sources: stores.sources.clone(),
                voices: stores.voices.clone(),
            },
        ));
        let featured = Arc::new(FeaturedSelector::new(
            stores.articles.clone(),
            stores.featured.clone(),
        ));

        Ok(Self {
            stores,
            budget,
            ingestor,
            generator,
            featured,
            topup_items: cfg.news.topup_items,
        })
    }

    pub fn start_scheduler(&self, cfg: &AppConfig) -> Result<Scheduler> {
        Scheduler::start(
            &cfg.scheduler,
            SchedulerDeps {
                generator: self.generator.clone(),
                ingestor: self.ingestor.clone(),
                featured: self.featured.clone(),
                budget: self.budget.clone(),
                topup_items: self.topup_items,
            },
        )
    }
}

fn news_api(cfg: &AppConfig) -> Result<Arc<dyn NewsApi>> {
    if let Some(path) = &cfg.news.fixture_path {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("reading news fixture {}", path.display()))?;
        info!(path = %path.display(), "serving news from fixture");
        return Ok(Arc::new(FixtureNewsApi::from_fixture(&body)?));
    }
    if cfg.news.api_key.is_empty() {
        warn!("NEWSDATA_API_KEY not set; feed calls will be rejected upstream");
    }
    Ok(Arc::new(NewsDataClient::new(
        &cfg.news.endpoint,
        &cfg.news.api_key,
        &cfg.news.language,
        cfg.news.timeout(),
    )?))
}
