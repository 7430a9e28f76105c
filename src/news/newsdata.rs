// src/news/newsdata.rs
//! HTTP client for a newsdata.io-style `latest news` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{NewsApi, NewsPage, RawNewsItem};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct Resp {
    status: String,
    #[serde(default)]
    results: Option<serde_json::Value>,
    #[serde(rename = "nextPage", default)]
    next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Article {
    article_id: String,
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "pubDateTZ")]
    pub_date_tz: Option<String>,
}

/// Parse one response body. An `"error"` status is an upstream error; on
/// error the API puts a message object in `results` instead of a list.
pub fn parse_page(body: &str) -> Result<NewsPage> {
    let resp: Resp = serde_json::from_str(body)?;
    if !resp.status.eq_ignore_ascii_case("success") {
        let message = resp
            .results
            .as_ref()
            .and_then(|r| r.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(Error::Upstream {
            service: "newsdata",
            message,
        });
    }
    let articles: Vec<Article> = match resp.results {
        Some(v) => serde_json::from_value(v)?,
        None => Vec::new(),
    };
    let items = articles
        .into_iter()
        .filter_map(|a| {
            let title = a.title?;
            Some(RawNewsItem {
                id: a.article_id,
                title,
                description: a.description,
                published_at: a.pub_date,
                timezone: a.pub_date_tz,
            })
        })
        .collect();
    Ok(NewsPage {
        items,
        next_page: resp.next_page.filter(|p| !p.is_empty()),
    })
}

pub struct NewsDataClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: String,
}

impl NewsDataClient {
    pub fn new(endpoint: &str, api_key: &str, language: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("satire-desk/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            language: language.to_string(),
        })
    }
}

#[async_trait]
impl NewsApi for NewsDataClient {
    async fn fetch(&self, page: Option<&str>) -> Result<NewsPage> {
        let mut query: Vec<(&str, &str)> = vec![
            ("apikey", self.api_key.as_str()),
            ("language", self.language.as_str()),
        ];
        if let Some(p) = page {
            query.push(("page", p));
        }
        let resp = self.http.get(&self.endpoint).query(&query).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            // The body usually still carries the JSON error message.
            return match parse_page(&body) {
                Err(e @ Error::Upstream { .. }) => Err(e),
                _ => Err(Error::Upstream {
                    service: "newsdata",
                    message: format!("HTTP {status}"),
                }),
            };
        }
        parse_page(&body)
    }

    fn name(&self) -> &'static str {
        "newsdata"
    }
}
