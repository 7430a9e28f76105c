// src/featured.rs
//! Daily featured pick: one article per local calendar day.

use chrono::{DateTime, Local, NaiveDate, Utc};
use rand::Rng;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{featured_day_key, FeaturedArticle, GeneratedArticle};
use crate::store::Repository;

pub struct FeaturedSelector {
    articles: Repository<GeneratedArticle>,
    featured: Repository<FeaturedArticle>,
}

impl FeaturedSelector {
    pub fn new(articles: Repository<GeneratedArticle>, featured: Repository<FeaturedArticle>) -> Self {
        Self { articles, featured }
    }

    /// Pick for the current local day.
    pub fn run_today(&self) -> Result<Option<GeneratedArticle>> {
        self.run_at(Local::now())
    }

    /// Pick for the local day `now` falls on.
    pub fn run_at(&self, now: DateTime<Local>) -> Result<Option<GeneratedArticle>> {
        let mut rng = rand::rng();
        self.select_for(now.date_naive(), &mut rng)
    }

    /// Feature a random article published on `day` (local time).
    ///
    /// Returns `None` when the day already has a pick or nothing was published
    /// that day. Safe to call repeatedly: the featured record is keyed by date
    /// and only the first create wins; a losing run clears its own flag.
    pub fn select_for<R: Rng + ?Sized>(
        &self,
        day: NaiveDate,
        rng: &mut R,
    ) -> Result<Option<GeneratedArticle>> {
        let date = featured_day_key(day);
        if let Some(existing) = self.featured.read_by_key(&date)? {
            info!(target: "featured", %date, article = %existing.article_key, "already featured today");
            return Ok(None);
        }

        let articles = self.articles.read_all()?;
        if let Some(flagged) = articles.iter().find(|a| a.is_featured_on(day)) {
            // flag present without a record: restore the record, don't pick again
            let mut record = FeaturedArticle {
                date: date.clone(),
                article_key: flagged.key.clone(),
                created_at: Utc::now(),
            };
            self.featured.create(&mut record)?;
            return Ok(None);
        }

        let todays: Vec<&GeneratedArticle> = articles
            .iter()
            .filter(|a| match a.published_at() {
                Some(ts) => ts.with_timezone(&Local).date_naive() == day,
                None => false,
            })
            .collect();
        if todays.is_empty() {
            info!(target: "featured", %date, "no articles published today, nothing to feature");
            return Ok(None);
        }

        // Flag before record; a flag without a record is restored above.
        let mut pick = todays[rng.random_range(0..todays.len())].clone();
        pick.is_featured = true;
        pick.featured_date = Some(date.clone());
        self.articles.update(&pick)?;

        let mut record = FeaturedArticle {
            date: date.clone(),
            article_key: pick.key.clone(),
            created_at: Utc::now(),
        };
        match self.featured.create(&mut record) {
            Ok(true) => {}
            Ok(false) => {
                warn!(target: "featured", %date, "another run featured an article first");
                self.unflag(pick)?;
                return Ok(None);
            }
            Err(e) => {
                if let Err(undo) = self.unflag(pick) {
                    warn!(target: "featured", %date, error = %undo, "could not clear featured flag");
                }
                return Err(e);
            }
        }
        info!(target: "featured", %date, article = %pick.key, title = %pick.title, "article featured");
        Ok(Some(pick))
    }

    fn unflag(&self, mut article: GeneratedArticle) -> Result<()> {
        article.is_featured = false;
        article.featured_date = None;
        self.articles.update(&article).map(|_| ())
    }
}
