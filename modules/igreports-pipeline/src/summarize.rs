//! Summary generator stage. Turns each `ClassifiedNewsworthy` report
//! into a decorated, length-capped post via the summarizer collaborator.

use anyhow::Result;
use tracing::{info, warn};

use igreports_common::{Report, ReportState, TokenUsage};
use igreports_store::TransitionOutcome;

use crate::budget::OperationCost;
use crate::classify::record_attempt;
use crate::decorate::{decorate, DecorationLimits};
use crate::retry::{backoff_delay, MAX_ATTEMPTS};
use crate::run::RunContext;
use crate::stats::RunStats;
use crate::traits::SummarizeOutcome;

pub async fn run_summarize(ctx: &RunContext, limit: u32, stats: &mut RunStats) -> Result<()> {
    let reports = ctx
        .store
        .list_in_state(ReportState::ClassifiedNewsworthy, limit)
        .await?;

    if reports.is_empty() {
        info!("Summaries: nothing to summarize");
        return Ok(());
    }
    info!(count = reports.len(), "Summaries: starting");

    let limits = DecorationLimits {
        soft_cap: ctx.config.summary_soft_cap,
        hard_cap: ctx.config.summary_hard_cap,
        ..DecorationLimits::default()
    };

    for report in &reports {
        if !ctx.budget.admits(OperationCost::SUMMARIZATION) {
            info!("Summaries: budget ceiling reached, stopping for this run");
            stats.budget_stopped = true;
            break;
        }

        let raw = match summarize_with_retry(ctx, report).await {
            Some(text) if !text.trim().is_empty() => text,
            Some(_) => {
                warn!(report_id = %report.report_id, "Summarizer returned empty text, using fallback");
                fallback_summary(report)
            }
            None => {
                stats.summarize_exhausted += 1;
                continue;
            }
        };

        let post = decorate(&raw, &report.source_url, &report.topics, limits);
        info!(
            report_id = %report.report_id,
            chars = post.chars().count(),
            "Summary generated"
        );

        if ctx.dry_run {
            stats.summarized += 1;
            continue;
        }

        match ctx.store.mark_summarized(&report.report_id, &post).await? {
            TransitionOutcome::Applied => stats.summarized += 1,
            TransitionOutcome::Conflict => {
                warn!(report_id = %report.report_id, "Summaries: state conflict, skipping");
                stats.conflicts_skipped += 1;
            }
        }
    }

    Ok(())
}

async fn summarize_with_retry(ctx: &RunContext, report: &Report) -> Option<String> {
    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 {
            tokio::time::sleep(backoff_delay(attempt - 1)).await;
        }

        ctx.budget.spend(OperationCost::SUMMARIZATION);
        let outcome = ctx.summarizer.summarize(report).await;

        let usage = match &outcome {
            SummarizeOutcome::Summary { usage, .. } | SummarizeOutcome::Malformed { usage, .. } => {
                *usage
            }
            SummarizeOutcome::Transient { .. } => TokenUsage::default(),
        };
        record_attempt(ctx, "summarizer", usage, OperationCost::SUMMARIZATION).await;

        match outcome {
            SummarizeOutcome::Summary { text, .. } => return Some(text),
            SummarizeOutcome::Malformed { detail, .. } => {
                warn!(
                    report_id = %report.report_id,
                    attempt = attempt + 1,
                    detail = %detail,
                    "Summarizer returned malformed response"
                );
            }
            SummarizeOutcome::Transient { detail } => {
                warn!(
                    report_id = %report.report_id,
                    attempt = attempt + 1,
                    detail = %detail,
                    "Summarizer call failed, will retry"
                );
            }
        }
    }

    warn!(report_id = %report.report_id, attempts = MAX_ATTEMPTS, "Summary retries exhausted");
    None
}

/// Plain summary assembled from stored facts, for when the collaborator
/// answers with nothing usable.
pub fn fallback_summary(report: &Report) -> String {
    let agency = report
        .agency_name
        .as_deref()
        .or(report.agency_code.as_deref())
        .unwrap_or("Federal agency");
    format!("New IG report from {agency}: {}", report.title)
}
