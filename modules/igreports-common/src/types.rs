use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle position of a report. Transitions are monotonic: a report
/// never moves back to an earlier state. The one exception is the publish
/// retry path, which re-enters `PublishFailed` → `Published` without
/// rewinding anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Ingested,
    KeywordPassed,
    KeywordRejected,
    ClassifiedNewsworthy,
    ClassifiedNotNewsworthy,
    Summarized,
    Published,
    PublishFailed,
}

impl ReportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportState::Ingested => "ingested",
            ReportState::KeywordPassed => "keyword_passed",
            ReportState::KeywordRejected => "keyword_rejected",
            ReportState::ClassifiedNewsworthy => "classified_newsworthy",
            ReportState::ClassifiedNotNewsworthy => "classified_not_newsworthy",
            ReportState::Summarized => "summarized",
            ReportState::Published => "published",
            ReportState::PublishFailed => "publish_failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ingested" => Some(ReportState::Ingested),
            "keyword_passed" => Some(ReportState::KeywordPassed),
            "keyword_rejected" => Some(ReportState::KeywordRejected),
            "classified_newsworthy" => Some(ReportState::ClassifiedNewsworthy),
            "classified_not_newsworthy" => Some(ReportState::ClassifiedNotNewsworthy),
            "summarized" => Some(ReportState::Summarized),
            "published" => Some(ReportState::Published),
            "publish_failed" => Some(ReportState::PublishFailed),
            _ => None,
        }
    }

    /// Terminal states accept no further transitions (publish retry aside).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReportState::KeywordRejected
                | ReportState::ClassifiedNotNewsworthy
                | ReportState::Published
        )
    }
}

impl std::fmt::Display for ReportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Descriptive facts captured at ingestion. Everything except `report_id`,
/// `title`, and `source_url` is optional; re-scrapes may return truncated
/// records, so the first-seen values are authoritative and later ingestions
/// only fill fields that are still empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFacts {
    /// Stable external identifier. Unique key; never changes.
    pub report_id: String,
    pub source_url: String,
    pub title: String,
    pub agency_code: Option<String>,
    pub agency_name: Option<String>,
    pub report_type: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub abstract_text: Option<String>,
}

/// Validated classifier verdict. `score` is clamped into [1, 10] before
/// this struct is constructed; external numeric ranges are never trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierVerdict {
    pub newsworthy: bool,
    pub score: u8,
    pub reason: String,
    pub dollar_amount: Option<u64>,
    pub criminal: bool,
    pub topics: Vec<String>,
}

/// Token counts reported by an LLM collaborator for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// The central entity: one oversight report moving through the pipeline.
/// Created by the ingestion gate, mutated only by the stage matching its
/// current state, never deleted.
#[derive(Debug, Clone)]
pub struct Report {
    pub report_id: String,
    pub source_url: String,
    pub title: String,
    pub agency_code: Option<String>,
    pub agency_name: Option<String>,
    pub report_type: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub abstract_text: Option<String>,

    pub state: ReportState,

    // Present only once classified.
    pub newsworthy_score: Option<u8>,
    pub classifier_reason: Option<String>,
    pub topics: Vec<String>,
    pub dollar_amount: Option<u64>,
    pub criminal_flag: bool,

    // Present iff state is Summarized, Published, or PublishFailed.
    pub summary_text: Option<String>,

    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub publish_reference: Option<String>,
    pub publish_attempts: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    /// Title and abstract joined for keyword matching.
    pub fn searchable_text(&self) -> String {
        match &self.abstract_text {
            Some(abs) => format!("{} {}", self.title, abs),
            None => self.title.clone(),
        }
    }
}
