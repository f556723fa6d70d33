// Test mocks for the pipeline.
//
// Four mocks matching the four trait boundaries:
// - MockSource (ReportSource) — fixed batch of report facts
// - MockClassifier (ReportClassifier) — scripted per-report outcome queues
// - MockSummarizer (Summarizer) — scripted outcome queue or fixed text
// - MockPublisher (Publisher) — scripted results, records published texts
//
// Plus helpers for constructing ReportFacts and a Config that never
// touches the environment.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use igreports_common::{ClassifierVerdict, Config, Report, ReportFacts, TokenUsage};

use crate::traits::{
    ClassifyOutcome, PublishOutcome, Publisher, ReportClassifier, ReportSource, SummarizeOutcome,
    Summarizer,
};

pub fn test_usage() -> TokenUsage {
    TokenUsage {
        prompt_tokens: 120,
        completion_tokens: 40,
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        openai_api_key: "sk-test".to_string(),
        classifier_model: "gpt-4o-mini".to_string(),
        summarizer_model: "gpt-4o-mini".to_string(),
        feed_url: "https://feed.test/reports.xml".to_string(),
        bluesky_handle: "test.bsky.social".to_string(),
        bluesky_app_password: "hunter2".to_string(),
        daily_budget_cents: 0,
        publish_slots: 4,
        publish_anchor_hour: 14,
        publish_jitter_secs: 0,
        summary_soft_cap: 280,
        summary_hard_cap: 300,
    }
}

pub fn facts(report_id: &str, title: &str) -> ReportFacts {
    ReportFacts {
        report_id: report_id.to_string(),
        source_url: format!("https://www.oversight.gov/report/{report_id}"),
        title: title.to_string(),
        agency_code: Some("HHS".to_string()),
        agency_name: Some("Health and Human Services OIG".to_string()),
        report_type: Some("Audit".to_string()),
        published_date: None,
        abstract_text: None,
    }
}

pub fn newsworthy_verdict(score: u8) -> ClassifierVerdict {
    ClassifierVerdict {
        newsworthy: true,
        score,
        reason: "Substantiated fraud with a large dollar amount".to_string(),
        dollar_amount: Some(50_000_000),
        criminal: false,
        topics: vec!["fraud".to_string()],
    }
}

pub fn routine_verdict() -> ClassifierVerdict {
    ClassifierVerdict {
        newsworthy: false,
        score: 2,
        reason: "Routine compliance review".to_string(),
        dollar_amount: None,
        criminal: false,
        topics: vec![],
    }
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Returns the same batch of facts on every fetch, whatever the window,
/// or a permanent error in failing mode. Counts fetch calls either way.
pub struct MockSource {
    batch: Vec<ReportFacts>,
    fail: Option<String>,
    calls: AtomicU32,
}

impl MockSource {
    pub fn new(batch: Vec<ReportFacts>) -> Self {
        Self {
            batch,
            fail: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing(detail: &str) -> Self {
        Self {
            batch: Vec::new(),
            fail: Some(detail.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportSource for MockSource {
    async fn fetch_recent(&self, _days_back: u32) -> Result<Vec<ReportFacts>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail {
            Some(detail) => Err(anyhow::anyhow!("{detail}")),
            None => Ok(self.batch.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockClassifier
// ---------------------------------------------------------------------------

/// Scripted classifier. `.on()` queues outcomes per report id, consumed
/// in order; once a queue is drained the last default applies. Counts
/// every call so tests can assert the paid edge was or was not hit.
pub struct MockClassifier {
    scripts: Mutex<HashMap<String, VecDeque<ClassifyOutcome>>>,
    default: ClassifyOutcome,
    calls: AtomicU32,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default: ClassifyOutcome::Classified {
                verdict: routine_verdict(),
                usage: test_usage(),
            },
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_default(mut self, outcome: ClassifyOutcome) -> Self {
        self.default = outcome;
        self
    }

    pub fn on(self, report_id: &str, outcomes: Vec<ClassifyOutcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(report_id.to_string(), outcomes.into());
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportClassifier for MockClassifier {
    async fn classify(&self, report: &Report) -> ClassifyOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut scripts = self.scripts.lock().unwrap();
        if let Some(queue) = scripts.get_mut(&report.report_id) {
            if let Some(outcome) = queue.pop_front() {
                return outcome;
            }
        }
        self.default.clone()
    }
}

// ---------------------------------------------------------------------------
// MockSummarizer
// ---------------------------------------------------------------------------

/// Scripted summarizer. Defaults to a fixed short summary; `.on()`
/// queues per-report outcomes consumed in order.
pub struct MockSummarizer {
    scripts: Mutex<HashMap<String, VecDeque<SummarizeOutcome>>>,
    default_text: String,
    calls: AtomicU32,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default_text: "An IG report found problems worth reading about.".to_string(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.default_text = text.to_string();
        self
    }

    pub fn on(self, report_id: &str, outcomes: Vec<SummarizeOutcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(report_id.to_string(), outcomes.into());
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, report: &Report) -> SummarizeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut scripts = self.scripts.lock().unwrap();
        if let Some(queue) = scripts.get_mut(&report.report_id) {
            if let Some(outcome) = queue.pop_front() {
                return outcome;
            }
        }
        SummarizeOutcome::Summary {
            text: self.default_text.clone(),
            usage: test_usage(),
        }
    }
}

// ---------------------------------------------------------------------------
// MockPublisher
// ---------------------------------------------------------------------------

/// Scripted publisher. Outcomes are consumed from a global queue; when
/// drained, every publish succeeds with a sequential reference. Records
/// each published text for assertions.
pub struct MockPublisher {
    outcomes: Mutex<VecDeque<PublishOutcome>>,
    published: Mutex<Vec<String>>,
    calls: AtomicU32,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            published: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn then(self, outcome: PublishOutcome) -> Self {
        self.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    pub fn then_fail(self, detail: &str) -> Self {
        self.then(PublishOutcome::Failed {
            detail: detail.to_string(),
        })
    }

    pub fn published_texts(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, text: &str) -> PublishOutcome {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.outcomes.lock().unwrap().pop_front();
        let outcome = scripted.unwrap_or(PublishOutcome::Published {
            reference: format!("at://did:plc:test/app.bsky.feed.post/{n}"),
        });
        if let PublishOutcome::Published { .. } = outcome {
            self.published.lock().unwrap().push(text.to_string());
        }
        outcome
    }
}
