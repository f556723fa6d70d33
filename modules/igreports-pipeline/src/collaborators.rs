//! Production collaborators for the paid LLM edges: a JSON-mode
//! classifier and a plain-text summarizer, both over `llm-client`.

use async_trait::async_trait;

use igreports_common::{Config, Report, TokenUsage};
use llm_client::{LlmError, OpenAi, Usage};

use crate::classify::RawVerdict;
use crate::traits::{ClassifyOutcome, ReportClassifier, SummarizeOutcome, Summarizer};

const CLASSIFIER_SYSTEM: &str = "You judge whether federal Inspector General reports are \
newsworthy to the general public. Newsworthy means: fraud, criminal conduct, large dollar \
amounts of waste or improper payments, public-safety failures, or findings about programs \
ordinary people rely on. Routine financial statement audits, FISMA compliance reviews, and \
semiannual reports are not newsworthy. Score 1-10, give a one-sentence reason, report any \
dollar amount in whole dollars, and list 1-3 short topic strings.";

const SUMMARIZER_SYSTEM: &str = "You write single-paragraph social media posts about federal \
Inspector General reports for a general audience. Plain language, factual and neutral. \
Mention the dollar amount when significant and note criminal charges when present. No \
hashtags, no links, no quotation marks around the whole post. Stay under 280 characters.";

fn token_usage(u: Usage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
    }
}

fn report_prompt(report: &Report) -> String {
    let mut prompt = format!("Title: {}\n", report.title);
    if let Some(agency) = report.agency_name.as_deref().or(report.agency_code.as_deref()) {
        prompt.push_str(&format!("Agency: {agency}\n"));
    }
    if let Some(kind) = &report.report_type {
        prompt.push_str(&format!("Type: {kind}\n"));
    }
    if let Some(date) = &report.published_date {
        prompt.push_str(&format!("Published: {date}\n"));
    }
    if let Some(abstract_text) = &report.abstract_text {
        prompt.push_str(&format!("Abstract: {abstract_text}\n"));
    }
    prompt
}

pub struct LlmClassifier {
    ai: OpenAi,
}

impl LlmClassifier {
    pub fn new(config: &Config) -> Self {
        Self {
            ai: OpenAi::new(&config.openai_api_key, &config.classifier_model),
        }
    }
}

#[async_trait]
impl ReportClassifier for LlmClassifier {
    async fn classify(&self, report: &Report) -> ClassifyOutcome {
        let user = format!(
            "Classify this Inspector General report:\n\n{}",
            report_prompt(report)
        );

        match self.ai.extract::<RawVerdict>(CLASSIFIER_SYSTEM, user, 300).await {
            Ok(extraction) => {
                let usage = token_usage(extraction.usage);
                match extraction.value.validate() {
                    Ok(verdict) => ClassifyOutcome::Classified { verdict, usage },
                    Err(detail) => ClassifyOutcome::Malformed { detail, usage },
                }
            }
            Err(LlmError::Malformed { detail, usage }) => ClassifyOutcome::Malformed {
                detail,
                usage: token_usage(usage),
            },
            Err(LlmError::Empty { usage }) => ClassifyOutcome::Malformed {
                detail: "empty response".to_string(),
                usage: token_usage(usage),
            },
            Err(e) => ClassifyOutcome::Transient {
                detail: e.to_string(),
            },
        }
    }
}

pub struct LlmSummarizer {
    ai: OpenAi,
}

impl LlmSummarizer {
    pub fn new(config: &Config) -> Self {
        Self {
            ai: OpenAi::new(&config.openai_api_key, &config.summarizer_model),
        }
    }
}

/// "$2300000" reads badly in a post prompt; compact it the way a reader
/// would write it. `None` stays visible as N/A so the model does not invent
/// a figure.
fn format_dollars(amount: Option<u64>) -> String {
    match amount {
        Some(d) if d >= 1_000_000 => format!("${:.1}M", d as f64 / 1_000_000.0),
        Some(d) if d >= 1_000 => format!("${:.0}K", d as f64 / 1_000.0),
        Some(d) => format!("${d}"),
        None => "N/A".to_string(),
    }
}

fn summary_prompt(report: &Report) -> String {
    let mut user = format!(
        "Write a post about this Inspector General report:\n\n{}",
        report_prompt(report)
    );
    if let Some(reason) = &report.classifier_reason {
        user.push_str(&format!("Key finding: {reason}\n"));
    }
    user.push_str(&format!(
        "Dollar amount: {}\n",
        format_dollars(report.dollar_amount)
    ));
    user.push_str(&format!(
        "Criminal: {}\n",
        if report.criminal_flag { "Yes" } else { "No" }
    ));
    user.push_str(&format!("Topics: {}\n", report.topics.join(", ")));
    user
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, report: &Report) -> SummarizeOutcome {
        let user = summary_prompt(report);

        match self.ai.complete(SUMMARIZER_SYSTEM, user, 200, 0.7).await {
            Ok(completion) => SummarizeOutcome::Summary {
                text: completion.text,
                usage: token_usage(completion.usage),
            },
            Err(LlmError::Empty { usage }) => SummarizeOutcome::Malformed {
                detail: "empty response".to_string(),
                usage: token_usage(usage),
            },
            Err(LlmError::Malformed { detail, usage }) => SummarizeOutcome::Malformed {
                detail,
                usage: token_usage(usage),
            },
            Err(e) => SummarizeOutcome::Transient {
                detail: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use igreports_common::ReportState;

    fn classified_report() -> Report {
        Report {
            report_id: "va-002".into(),
            source_url: "https://www.oversight.gov/report/va-002".into(),
            title: "Theft of COVID Relief Funds".into(),
            agency_code: Some("VA".into()),
            agency_name: Some("Department of Veterans Affairs".into()),
            report_type: Some("Investigation".into()),
            published_date: None,
            abstract_text: None,
            state: ReportState::ClassifiedNewsworthy,
            newsworthy_score: Some(9),
            classifier_reason: Some("Employee charged with stealing relief funds".into()),
            topics: vec!["fraud".into(), "healthcare".into()],
            dollar_amount: Some(450_000),
            criminal_flag: true,
            summary_text: None,
            scheduled_at: None,
            published_at: None,
            publish_reference: None,
            publish_attempts: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn summary_prompt_carries_verdict_fields() {
        let prompt = summary_prompt(&classified_report());
        assert!(prompt.contains("Key finding: Employee charged"));
        assert!(prompt.contains("Dollar amount: $450K"));
        assert!(prompt.contains("Criminal: Yes"));
        assert!(prompt.contains("Topics: fraud, healthcare"));
    }

    #[test]
    fn summary_prompt_marks_missing_dollar_amount() {
        let mut report = classified_report();
        report.dollar_amount = None;
        report.criminal_flag = false;
        let prompt = summary_prompt(&report);
        assert!(prompt.contains("Dollar amount: N/A"));
        assert!(prompt.contains("Criminal: No"));
    }

    #[test]
    fn dollar_amounts_are_compacted() {
        assert_eq!(format_dollars(Some(2_300_000)), "$2.3M");
        assert_eq!(format_dollars(Some(50_000_000)), "$50.0M");
        assert_eq!(format_dollars(Some(450_000)), "$450K");
        assert_eq!(format_dollars(Some(750)), "$750");
        assert_eq!(format_dollars(None), "N/A");
    }

    #[test]
    fn prompt_includes_available_facts_and_skips_missing_ones() {
        let report = Report {
            report_id: "hud-001".into(),
            source_url: "https://www.oversight.gov/report/hud-001".into(),
            title: "HUD Grant Fraud Investigation".into(),
            agency_code: Some("HUD".into()),
            agency_name: Some("Housing and Urban Development OIG".into()),
            report_type: None,
            published_date: None,
            abstract_text: Some("Investigation substantiated fraud.".into()),
            state: ReportState::KeywordPassed,
            newsworthy_score: None,
            classifier_reason: None,
            topics: vec![],
            dollar_amount: None,
            criminal_flag: false,
            summary_text: None,
            scheduled_at: None,
            published_at: None,
            publish_reference: None,
            publish_attempts: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let prompt = report_prompt(&report);
        assert!(prompt.contains("HUD Grant Fraud Investigation"));
        assert!(prompt.contains("Housing and Urban Development OIG"));
        assert!(prompt.contains("Abstract:"));
        assert!(!prompt.contains("Type:"));
        assert!(!prompt.contains("Published:"));
    }
}
