// src/generation.rs
//! Article generation cycle: quota check, news backfill, style + voice pick,
//! editorial pipeline, persistence.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::counter;
use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::config::QuotaConfig;
use crate::editorial::{EditorNote, EditorialPipeline};
use crate::error::{Error, Result};
use crate::images::ImageService;
use crate::models::{GeneratedArticle, SourceItem, Voice, WriterType};
use crate::news::NewsIngestor;
use crate::quota;
use crate::store::Repository;

#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub deficit: u32,
    pub requested_sources: u32,
    /// New source items the feed gave us this cycle.
    pub ingested: usize,
    /// Size of the pool the draw was made from.
    pub candidates: usize,
    pub generated: usize,
    pub draft_failures: usize,
    /// Keys of the articles persisted this cycle.
    pub article_keys: Vec<String>,
    /// Per-article editor notes, keyed like `article_keys`.
    pub notes: HashMap<String, Vec<EditorNote>>,
}

/// Stored collections the generator reads and writes.
#[derive(Clone)]
pub struct Collections {
    pub articles: Repository<GeneratedArticle>,
    pub sources: Repository<SourceItem>,
    pub voices: Repository<Voice>,
}

pub struct ArticleGenerator {
    quota: QuotaConfig,
    ingestor: Arc<NewsIngestor>,
    pipeline: Arc<EditorialPipeline>,
    images: Arc<dyn ImageService>,
    placeholder_image: String,
    store: Collections,
}

struct Assignment {
    source: SourceItem,
    voice: Voice,
    style_key: String,
}

impl ArticleGenerator {
    pub fn new(
        quota: QuotaConfig,
        ingestor: Arc<NewsIngestor>,
        pipeline: Arc<EditorialPipeline>,
        images: Arc<dyn ImageService>,
        placeholder_image: impl Into<String>,
        store: Collections,
    ) -> Self {
        Self {
            quota,
            ingestor,
            pipeline,
            images,
            placeholder_image: placeholder_image.into(),
            store,
        }
    }

    pub async fn run_cycle(&self) -> Result<GenerationReport> {
        self.run_cycle_at(Utc::now()).await
    }

    /// One cycle with the quota window ending at `now`.
    #[instrument(skip(self))]
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<GenerationReport> {
        let since = quota::window_start(now, self.quota.window_hours);
        let deficit = quota::deficit(&self.store.articles, since, self.quota.minimum_articles)?;
        let mut report = GenerationReport {
            deficit,
            ..Default::default()
        };
        let Some(plan) = quota::plan_backfill(deficit, self.quota.oversample_factor) else {
            info!(target: "generation", minimum = self.quota.minimum_articles, "quota satisfied, nothing to generate");
            return Ok(report);
        };
        report.requested_sources = plan.source_request;

        let voices = self.store.voices.read_all()?;
        if voices.is_empty() {
            return Err(Error::Config("no voices stored; seed writers before generating".into()));
        }

        let fresh = match self.ingestor.ingest(plan.source_request).await {
            Ok(r) => r.new_items,
            Err(e) if e.is_expected() => {
                info!(target: "generation", reason = %e, "no source material this cycle");
                return Ok(report);
            }
            Err(e) => return Err(e),
        };
        report.ingested = fresh.len();

        let pool = self.candidate_pool(fresh, plan.source_request as usize)?;
        report.candidates = pool.len();
        if pool.is_empty() {
            info!(target: "generation", deficit, "no unused source items available");
            return Ok(report);
        }

        let assignments = self.assign(pool, deficit as usize, &voices);
        let limit = self.quota.max_concurrent_articles.max(1);
        let results: Vec<Result<(GeneratedArticle, Vec<EditorNote>)>> = stream::iter(assignments)
            .map(|a| self.produce(a))
            .buffer_unordered(limit)
            .collect()
            .await;

        for res in results {
            match res {
                Ok((article, notes)) => {
                    report.generated += 1;
                    report.notes.insert(article.key.clone(), notes);
                    report.article_keys.push(article.key);
                }
                Err(Error::DraftFailed(reason)) => {
                    report.draft_failures += 1;
                    counter!("article_draft_failures_total").increment(1);
                    warn!(target: "generation", %reason, "draft failed, article skipped");
                }
                Err(e) => {
                    warn!(target: "generation", error = %e, "article generation failed");
                }
            }
        }

        info!(
            target: "generation",
            deficit = report.deficit,
            ingested = report.ingested,
            candidates = report.candidates,
            generated = report.generated,
            draft_failures = report.draft_failures,
            "generation cycle finished"
        );
        Ok(report)
    }

    /// Fresh items first; if they can't cover the request, add stored items
    /// no article has used yet, newest first.
    fn candidate_pool(&self, fresh: Vec<SourceItem>, wanted: usize) -> Result<Vec<SourceItem>> {
        if fresh.len() >= wanted {
            return Ok(fresh);
        }
        let articles = self.store.articles.read_all()?;
        let mut seen: HashSet<String> = fresh.iter().map(|s| s.id.clone()).collect();
        let mut pool = fresh;
        for item in quota::unused_sources(self.store.sources.read_all()?, &articles) {
            if pool.len() >= wanted {
                break;
            }
            if seen.insert(item.id.clone()) {
                pool.push(item);
            }
        }
        debug!(target: "generation", pool = pool.len(), wanted, "candidate pool topped up from stored items");
        Ok(pool)
    }

    /// Draw sources without replacement and give each a voice and style.
    fn assign(&self, pool: Vec<SourceItem>, count: usize, voices: &[Voice]) -> Vec<Assignment> {
        let mut rng = rand::rng();
        let picks = quota::draw_sources(pool, count, &mut rng);
        picks
            .into_iter()
            .map(|source| {
                let voice = voices[rng.random_range(0..voices.len())].clone();
                let style_key = self
                    .pipeline
                    .styles()
                    .select_style(&source, self.quota.special_style_probability, &mut rng)
                    .to_string();
                Assignment {
                    source,
                    voice,
                    style_key,
                }
            })
            .collect()
    }

    async fn produce(&self, a: Assignment) -> Result<(GeneratedArticle, Vec<EditorNote>)> {
        let edited = self.pipeline.run(&a.voice, &a.source, &a.style_key).await?;
        for n in &edited.notes {
            debug!(target: "editorial", source = %a.source.id, stage = n.stage.as_str(), changed = n.changed, note = %n.note);
        }

        let head_image_ref = match self.images.generate_and_store(&edited.draft.image_prompt).await {
            Ok(r) if !r.is_empty() => r,
            Ok(_) => self.placeholder_image.clone(),
            Err(e) => {
                warn!(target: "generation", error = %e, "image generation failed, using placeholder");
                self.placeholder_image.clone()
            }
        };

        let draft = edited.draft;
        let notes = edited.notes;
        let mut article = GeneratedArticle {
            key: String::new(),
            title: draft.title,
            content: draft.content,
            author_ref: a.voice.key.clone(),
            timestamp: Utc::now().to_rfc3339(),
            category: draft.category,
            head_image_ref,
            short_description: draft.short_description,
            source_item_ref: Some(a.source.id.clone()),
            writer_type: WriterType::Ai,
            is_featured: false,
            featured_date: None,
        };
        if !self.store.articles.create(&mut article)? {
            warn!(target: "generation", key = %article.key, "article key collision, not stored");
        }
        counter!("articles_generated_total").increment(1);
        info!(
            target: "generation",
            key = %article.key,
            source = %a.source.id,
            voice = %a.voice.key,
            style = %edited.style_key,
            category = %article.category,
            "article generated"
        );
        Ok((article, notes))
    }
}
