// Trait abstractions for the pipeline's external collaborators.
//
// ReportSource — the scrape edge (feed fetch, HTML parsing, whatever).
// ReportClassifier / Summarizer — the paid LLM edges.
// Publisher — the social-posting edge.
//
// Collaborator results are tagged outcome enums rather than bare Results:
// the retry logic in the stages needs to distinguish "the collaborator
// answered garbage" (contract drift, retry + log distinctly) from "the
// call never landed" (transient, retry quietly), and neither of those is
// a pipeline error. These traits also enable deterministic testing with
// the mocks in `testing.rs`: no network, no API keys.

use anyhow::Result;
use async_trait::async_trait;

use igreports_common::{ClassifierVerdict, Report, ReportFacts, TokenUsage};

/// Supplies report facts for a lookback window. Every field beyond
/// `report_id`, `title`, `source_url` is optional.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn fetch_recent(&self, days_back: u32) -> Result<Vec<ReportFacts>>;
}

/// One classification attempt against the external classifier.
#[derive(Debug, Clone)]
pub enum ClassifyOutcome {
    /// Well-formed, validated verdict (score already clamped into [1,10]).
    Classified {
        verdict: ClassifierVerdict,
        usage: TokenUsage,
    },
    /// The collaborator answered, but not in contract (unparseable output
    /// or missing required fields). Tokens were still spent.
    Malformed { detail: String, usage: TokenUsage },
    /// Network / timeout / rate limit. Nothing was spent that we know of.
    Transient { detail: String },
}

#[async_trait]
pub trait ReportClassifier: Send + Sync {
    async fn classify(&self, report: &Report) -> ClassifyOutcome;
}

/// One summarization attempt against the external summarizer.
#[derive(Debug, Clone)]
pub enum SummarizeOutcome {
    /// Raw generated text, not yet truncated or decorated.
    Summary { text: String, usage: TokenUsage },
    Malformed { detail: String, usage: TokenUsage },
    Transient { detail: String },
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, report: &Report) -> SummarizeOutcome;
}

/// One publication attempt. `reference` is an opaque handle from the
/// publishing platform (e.g. an AT-URI) recorded for audit.
#[derive(Debug, Clone)]
pub enum PublishOutcome {
    Published { reference: String },
    Failed { detail: String },
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str) -> PublishOutcome;
}
