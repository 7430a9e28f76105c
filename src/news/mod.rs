// src/news/mod.rs
//! News feed access and token-budgeted ingestion into the source-item store.

pub mod newsdata;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::budget::TokenBudget;
use crate::error::{Error, Result};
use crate::models::SourceItem;
use crate::store::Repository;

/// One item as the feed reports it, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNewsItem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsPage {
    pub items: Vec<RawNewsItem>,
    /// `None` once the feed has no further pages.
    pub next_page: Option<String>,
}

#[async_trait]
pub trait NewsApi: Send + Sync {
    /// One remote call. `page` is the cursor from the previous page, if any.
    async fn fetch(&self, page: Option<&str>) -> Result<NewsPage>;
    fn name(&self) -> &'static str;
}

/// Normalize feed text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // Descriptions can be whole articles; the prompt only needs the gist.
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }
    out
}

/// Feed timestamps arrive as RFC 3339 or `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn parse_published_at(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

impl RawNewsItem {
    /// `None` when the item has no usable title.
    pub fn into_source_item(self) -> Option<SourceItem> {
        let title = normalize_text(&self.title);
        if self.id.trim().is_empty() || title.is_empty() {
            return None;
        }
        let published_at = match self.published_at.as_deref().map(parse_published_at) {
            Some(Some(ts)) => ts,
            _ => {
                debug!(target: "ingest", id = %self.id, "unparsable publish date, using now");
                Utc::now()
            }
        };
        Some(SourceItem {
            id: self.id.trim().to_string(),
            title,
            description: self
                .description
                .as_deref()
                .map(normalize_text)
                .unwrap_or_default(),
            published_at,
            timezone: self.timezone.unwrap_or_else(|| "UTC".to_string()),
        })
    }
}

/// Why an ingestion run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Got the requested number of new items or used the planned pages.
    Fulfilled,
    BudgetExhausted,
    SourceExhausted,
    /// A fetch failed or timed out; the pages already stored are kept.
    FetchFailed,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Newly stored, non-duplicate items in feed order.
    pub new_items: Vec<SourceItem>,
    pub duplicates: usize,
    pub pages: u32,
    pub stop: StopReason,
}

impl IngestReport {
    fn empty(stop: StopReason) -> Self {
        Self {
            new_items: Vec::new(),
            duplicates: 0,
            pages: 0,
            stop,
        }
    }
}

pub struct NewsIngestor {
    api: Arc<dyn NewsApi>,
    budget: Arc<TokenBudget>,
    sources: Repository<SourceItem>,
    fetch_timeout: Duration,
}

impl NewsIngestor {
    pub fn new(
        api: Arc<dyn NewsApi>,
        budget: Arc<TokenBudget>,
        sources: Repository<SourceItem>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            api,
            budget,
            sources,
            fetch_timeout,
        }
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    /// One feed call. Takes a token first; without one the call is not made.
    pub async fn fetch_page(&self, cursor: Option<&str>) -> Result<NewsPage> {
        if !self.budget.try_consume(1) {
            return Err(Error::BudgetExhausted {
                needed: 1,
                remaining: self.budget.remaining(),
            });
        }
        counter!("news_fetch_calls_total").increment(1);

        match tokio::time::timeout(self.fetch_timeout, self.api.fetch(cursor)).await {
            Ok(res) => res,
            Err(_) => Err(Error::Timeout {
                what: "news fetch",
                after: self.fetch_timeout,
            }),
        }
    }

    /// Page through the feed until `target_count` new items are stored, the
    /// planned pages are used, the feed ends, or the budget runs out.
    ///
    /// Only fails up front when not a single token is left; otherwise returns
    /// whatever was obtained, which may be less than requested.
    #[instrument(skip(self), fields(provider = self.api.name()))]
    pub async fn ingest(&self, target_count: u32) -> Result<IngestReport> {
        if target_count == 0 {
            return Ok(IngestReport::empty(StopReason::Fulfilled));
        }
        let pages_planned = self.budget.capacity_for(target_count);
        if self.budget.remaining() == 0 {
            return Err(Error::BudgetExhausted {
                needed: pages_planned,
                remaining: 0,
            });
        }
        if let Err(e) = self.budget.ensure_covers(target_count) {
            debug!(target: "ingest", error = %e, "budget covers only part of the request");
        }

        let mut report = IngestReport::empty(StopReason::Fulfilled);
        let mut cursor: Option<String> = None;

        while report.pages < pages_planned && (report.new_items.len() as u32) < target_count {
            let page = match self.fetch_page(cursor.as_deref()).await {
                Ok(p) => p,
                Err(Error::BudgetExhausted { .. }) => {
                    report.stop = StopReason::BudgetExhausted;
                    break;
                }
                Err(e) => {
                    warn!(target: "ingest", error = %e, pages = report.pages, "news fetch failed");
                    report.stop = StopReason::FetchFailed;
                    break;
                }
            };
            report.pages += 1;

            for raw in page.items {
                let Some(mut item) = raw.into_source_item() else {
                    continue;
                };
                if self.sources.create(&mut item)? {
                    report.new_items.push(item);
                } else {
                    report.duplicates += 1;
                }
            }

            match page.next_page {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => {
                    report.stop = StopReason::SourceExhausted;
                    break;
                }
            }
        }

        counter!("news_items_ingested_total").increment(report.new_items.len() as u64);
        counter!("news_items_duplicate_total").increment(report.duplicates as u64);
        info!(
            target: "ingest",
            requested = target_count,
            new = report.new_items.len(),
            duplicates = report.duplicates,
            pages = report.pages,
            stop = ?report.stop,
            remaining_tokens = self.budget.remaining(),
            "news ingest finished"
        );
        Ok(report)
    }
}

/// Serves canned pages in order; the cursor is the page index. Useful for
/// local runs without a feed key and for tests.
pub struct FixtureNewsApi {
    pages: Vec<NewsPage>,
    calls: AtomicUsize,
}

impl FixtureNewsApi {
    pub fn from_pages(pages: Vec<NewsPage>) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
        }
    }

    /// A single page parsed from a newsdata-style JSON body.
    pub fn from_fixture(content: &str) -> Result<Self> {
        let mut page = newsdata::parse_page(content)?;
        page.next_page = None;
        Ok(Self::from_pages(vec![page]))
    }

    /// Number of `fetch` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsApi for FixtureNewsApi {
    async fn fetch(&self, page: Option<&str>) -> Result<NewsPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let idx: usize = page.and_then(|p| p.parse().ok()).unwrap_or(0);
        let Some(p) = self.pages.get(idx) else {
            return Ok(NewsPage::default());
        };
        let next_page = if idx + 1 < self.pages.len() {
            Some((idx + 1).to_string())
        } else {
            p.next_page.clone()
        };
        Ok(NewsPage {
            items: p.items.clone(),
            next_page,
        })
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
