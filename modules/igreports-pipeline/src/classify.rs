//! Newsworthiness classifier stage. Pushes each `KeywordPassed` report
//! through the external classifier, with the validation and retry
//! contract: malformed output is a collaborator failure (never a
//! negative verdict), scores are clamped, retries are bounded, every
//! attempt lands in the usage ledger.

use anyhow::Result;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use igreports_common::{ClassifierVerdict, ReportState, TokenUsage};
use igreports_store::{TransitionOutcome, UsageRecord};

use crate::budget::OperationCost;
use crate::retry::{backoff_delay, MAX_ATTEMPTS};
use crate::run::RunContext;
use crate::stats::RunStats;
use crate::traits::ClassifyOutcome;

/// What the classifier collaborator returns on the wire. Everything is
/// optional so a structurally-valid JSON object always parses; the
/// required-field check happens in `validate`, where it can be reported
/// as contract drift rather than a deserialization error.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RawVerdict {
    pub newsworthy: Option<bool>,
    pub score: Option<i64>,
    pub reason: Option<String>,
    #[serde(default)]
    pub dollar_amount: Option<i64>,
    #[serde(default)]
    pub criminal: Option<bool>,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
}

impl RawVerdict {
    /// Enforce the response contract. `newsworthy`, `score`, `reason`
    /// are required; the rest default. The score is clamped into [1,10]
    /// no matter what the collaborator returned.
    pub fn validate(self) -> Result<ClassifierVerdict, String> {
        let newsworthy = self
            .newsworthy
            .ok_or_else(|| "missing required field: newsworthy".to_string())?;
        let score = self
            .score
            .ok_or_else(|| "missing required field: score".to_string())?;
        let reason = self
            .reason
            .ok_or_else(|| "missing required field: reason".to_string())?;

        Ok(ClassifierVerdict {
            newsworthy,
            score: score.clamp(1, 10) as u8,
            reason,
            dollar_amount: self.dollar_amount.and_then(|d| u64::try_from(d).ok()),
            criminal: self.criminal.unwrap_or(false),
            topics: self.topics.unwrap_or_default(),
        })
    }
}

pub async fn run_classify(ctx: &RunContext, limit: u32, stats: &mut RunStats) -> Result<()> {
    let reports = ctx
        .store
        .list_in_state(ReportState::KeywordPassed, limit)
        .await?;

    if reports.is_empty() {
        info!("Classification: nothing to classify");
        return Ok(());
    }
    info!(count = reports.len(), "Classification: starting");

    for report in &reports {
        if !ctx.budget.admits(OperationCost::CLASSIFICATION) {
            info!("Classification: budget ceiling reached, stopping for this run");
            stats.budget_stopped = true;
            break;
        }

        let verdict = match classify_with_retry(ctx, report).await {
            Some(v) => v,
            None => {
                stats.classify_exhausted += 1;
                continue;
            }
        };

        if verdict.newsworthy {
            info!(
                report_id = %report.report_id,
                score = verdict.score,
                reason = %verdict.reason,
                "Newsworthy"
            );
        } else {
            info!(
                report_id = %report.report_id,
                score = verdict.score,
                "Not newsworthy"
            );
        }

        if ctx.dry_run {
            if verdict.newsworthy {
                stats.classified_newsworthy += 1;
            } else {
                stats.classified_not_newsworthy += 1;
            }
            continue;
        }

        match ctx.store.mark_classified(&report.report_id, &verdict).await? {
            TransitionOutcome::Applied => {
                if verdict.newsworthy {
                    stats.classified_newsworthy += 1;
                } else {
                    stats.classified_not_newsworthy += 1;
                }
            }
            TransitionOutcome::Conflict => {
                warn!(report_id = %report.report_id, "Classification: state conflict, skipping");
                stats.conflicts_skipped += 1;
            }
        }
    }

    Ok(())
}

/// Up to `MAX_ATTEMPTS` classification calls with exponential backoff.
/// Returns `None` on exhaustion, leaving the report in its pre-call
/// state so the next run picks it up again.
async fn classify_with_retry(ctx: &RunContext, report: &igreports_common::Report) -> Option<ClassifierVerdict> {
    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 {
            tokio::time::sleep(backoff_delay(attempt - 1)).await;
        }

        ctx.budget.spend(OperationCost::CLASSIFICATION);
        let outcome = ctx.classifier.classify(report).await;

        let usage = match &outcome {
            ClassifyOutcome::Classified { usage, .. } | ClassifyOutcome::Malformed { usage, .. } => {
                *usage
            }
            ClassifyOutcome::Transient { .. } => TokenUsage::default(),
        };
        record_attempt(ctx, "classifier", usage, OperationCost::CLASSIFICATION).await;

        match outcome {
            ClassifyOutcome::Classified { verdict, .. } => return Some(verdict),
            ClassifyOutcome::Malformed { detail, .. } => {
                // Contract drift, not a network blip; log it as such.
                warn!(
                    report_id = %report.report_id,
                    attempt = attempt + 1,
                    detail = %detail,
                    "Classifier returned malformed response"
                );
            }
            ClassifyOutcome::Transient { detail } => {
                warn!(
                    report_id = %report.report_id,
                    attempt = attempt + 1,
                    detail = %detail,
                    "Classifier call failed, will retry"
                );
            }
        }
    }

    warn!(report_id = %report.report_id, attempts = MAX_ATTEMPTS, "Classification retries exhausted");
    None
}

/// Ledger append for one collaborator attempt. Ledger trouble is logged
/// but never fails the stage.
pub(crate) async fn record_attempt(ctx: &RunContext, collaborator: &str, usage: TokenUsage, cost_cents: u64) {
    if ctx.dry_run {
        return;
    }
    let record = UsageRecord::new(&ctx.run_id, collaborator, None, usage, cost_cents);
    if let Err(e) = ctx.store.record_usage(&record).await {
        warn!(collaborator, error = %e, "Failed to record usage");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(newsworthy: Option<bool>, score: Option<i64>, reason: Option<&str>) -> RawVerdict {
        RawVerdict {
            newsworthy,
            score,
            reason: reason.map(str::to_string),
            dollar_amount: None,
            criminal: None,
            topics: None,
        }
    }

    #[test]
    fn missing_required_fields_fail_validation() {
        assert!(raw(None, Some(7), Some("r")).validate().is_err());
        assert!(raw(Some(true), None, Some("r")).validate().is_err());
        assert!(raw(Some(true), Some(7), None).validate().is_err());
    }

    #[test]
    fn score_is_clamped_into_range() {
        assert_eq!(raw(Some(true), Some(0), Some("r")).validate().unwrap().score, 1);
        assert_eq!(raw(Some(true), Some(15), Some("r")).validate().unwrap().score, 10);
        assert_eq!(raw(Some(true), Some(-3), Some("r")).validate().unwrap().score, 1);
        assert_eq!(raw(Some(true), Some(7), Some("r")).validate().unwrap().score, 7);
    }

    #[test]
    fn optional_fields_default() {
        let verdict = raw(Some(false), Some(3), Some("routine")).validate().unwrap();
        assert_eq!(verdict.dollar_amount, None);
        assert!(!verdict.criminal);
        assert!(verdict.topics.is_empty());
    }

    #[test]
    fn negative_dollar_amounts_become_unknown() {
        let mut r = raw(Some(true), Some(8), Some("r"));
        r.dollar_amount = Some(-500);
        assert_eq!(r.validate().unwrap().dollar_amount, None);
    }
}
