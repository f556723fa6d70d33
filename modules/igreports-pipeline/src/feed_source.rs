//! RSS/Atom report source for the oversight.gov feed.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use feed_rs::model::Entry;
use tracing::{debug, info};

use igreports_common::ReportFacts;

use crate::traits::ReportSource;

pub struct FeedReportSource {
    feed_url: String,
    http: reqwest::Client,
}

impl FeedReportSource {
    pub fn new(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ReportSource for FeedReportSource {
    async fn fetch_recent(&self, days_back: u32) -> Result<Vec<ReportFacts>> {
        let body = self
            .http
            .get(&self.feed_url)
            .send()
            .await
            .context("feed request failed")?
            .error_for_status()
            .context("feed request returned an error status")?
            .bytes()
            .await
            .context("failed to read feed body")?;

        let feed = feed_rs::parser::parse(body.as_ref())
            .map_err(|e| anyhow!("failed to parse feed: {e}"))?;

        let cutoff = Utc::now() - Duration::days(days_back as i64);
        let mut facts = Vec::new();
        for entry in &feed.entries {
            let published = entry.published.or(entry.updated);
            if let Some(ts) = published {
                if ts < cutoff {
                    continue;
                }
            }
            match entry_facts(entry) {
                Some(f) => facts.push(f),
                None => debug!(entry_id = %entry.id, "Skipping feed entry without link or title"),
            }
        }

        info!(
            feed_url = %self.feed_url,
            total = feed.entries.len(),
            recent = facts.len(),
            "Feed fetched"
        );
        Ok(facts)
    }
}

fn entry_facts(entry: &Entry) -> Option<ReportFacts> {
    let title = entry.title.as_ref().map(|t| t.content.trim().to_string())?;
    if title.is_empty() {
        return None;
    }
    let source_url = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .filter(|href| !href.is_empty())?;

    // The entry id is the stable identifier when present; the link is the
    // fallback since oversight.gov report URLs are themselves stable.
    let report_id = if entry.id.is_empty() {
        source_url.clone()
    } else {
        entry.id.clone()
    };

    let abstract_text = entry
        .summary
        .as_ref()
        .map(|s| strip_html(&s.content))
        .filter(|s| !s.is_empty());

    Some(ReportFacts {
        report_id,
        source_url,
        title,
        agency_code: None,
        agency_name: entry.authors.first().map(|a| a.name.clone()),
        report_type: entry.categories.first().map(|c| c.term.clone()),
        published_date: entry.published.or(entry.updated).map(|ts| ts.date_naive()),
        abstract_text,
    })
}

/// Feed summaries arrive as HTML fragments. Tags go, entities stay as-is.
fn strip_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
