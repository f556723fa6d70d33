//! Run orchestration. One `run()` call executes the whole pipeline in
//! stage order against whatever work is sitting in the store, so a
//! report ingested today and a report stuck mid-pipeline from last week
//! get the same treatment. Stage errors are caught per stage; one bad
//! stage never takes down the rest of the run.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use igreports_common::{Config, ReportState};
use igreports_store::{ReportStore, TransitionOutcome};

use crate::budget::BudgetTracker;
use crate::gate::run_ingest;
use crate::classify::run_classify;
use crate::prefilter::keyword_match;
use crate::scheduler::run_publish;
use crate::stats::RunStats;
use crate::summarize::run_summarize;
use crate::traits::{Publisher, ReportClassifier, ReportSource, Summarizer};

const STAGE_LIMIT: u32 = 100;

/// Everything a run needs: config, store, the four collaborator edges,
/// and the per-run budget.
pub struct RunContext {
    pub run_id: String,
    pub config: Config,
    pub store: ReportStore,
    pub source: Arc<dyn ReportSource>,
    pub classifier: Arc<dyn ReportClassifier>,
    pub summarizer: Arc<dyn Summarizer>,
    pub publisher: Arc<dyn Publisher>,
    pub budget: BudgetTracker,
    pub dry_run: bool,
}

impl RunContext {
    pub fn new(
        config: Config,
        store: ReportStore,
        source: Arc<dyn ReportSource>,
        classifier: Arc<dyn ReportClassifier>,
        summarizer: Arc<dyn Summarizer>,
        publisher: Arc<dyn Publisher>,
        dry_run: bool,
    ) -> Self {
        let budget = BudgetTracker::new(config.daily_budget_cents);
        Self {
            run_id: Uuid::new_v4().to_string(),
            config,
            store,
            source,
            classifier,
            summarizer,
            publisher,
            budget,
            dry_run,
        }
    }
}

/// Which stages to run, and with what knobs.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub days_back: u32,
    pub classify_limit: u32,
    pub skip_ingest: bool,
    pub skip_prefilter: bool,
    pub skip_classify: bool,
    pub skip_summarize: bool,
    pub skip_publish: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            days_back: 1,
            classify_limit: STAGE_LIMIT,
            skip_ingest: false,
            skip_prefilter: false,
            skip_classify: false,
            skip_summarize: false,
            skip_publish: false,
        }
    }
}

/// Execute one full pipeline run. Returns per-stage counts; call
/// `RunStats::failures` to decide the exit code.
pub async fn run(ctx: &RunContext, opts: &PipelineOptions) -> RunStats {
    let mut stats = RunStats::default();
    info!(run_id = %ctx.run_id, dry_run = ctx.dry_run, "Pipeline run starting");

    if !opts.skip_ingest {
        if let Err(e) = run_ingest(ctx, opts.days_back, &mut stats).await {
            error!(error = %e, "Ingestion stage failed");
            stats.stage_errors += 1;
        }
    }

    if !opts.skip_prefilter {
        if let Err(e) = run_prefilter(ctx, &mut stats).await {
            error!(error = %e, "Prefilter stage failed");
            stats.stage_errors += 1;
        }
    }

    if !opts.skip_classify {
        if let Err(e) = run_classify(ctx, opts.classify_limit, &mut stats).await {
            error!(error = %e, "Classification stage failed");
            stats.stage_errors += 1;
        }
    }

    if !opts.skip_summarize {
        if let Err(e) = run_summarize(ctx, STAGE_LIMIT, &mut stats).await {
            error!(error = %e, "Summary stage failed");
            stats.stage_errors += 1;
        }
    }

    if !opts.skip_publish {
        if let Err(e) = run_publish(ctx, Utc::now(), &mut stats).await {
            error!(error = %e, "Publication stage failed");
            stats.stage_errors += 1;
        }
    }

    stats.spent_cents = ctx.budget.total_spent();
    ctx.budget.log_status();
    info!(run_id = %ctx.run_id, "Pipeline run finished");
    stats
}

/// Keyword prefilter stage: `Ingested` → `KeywordPassed` | `KeywordRejected`.
/// Deterministic and free, so no budget gate and no retry.
pub async fn run_prefilter(ctx: &RunContext, stats: &mut RunStats) -> Result<()> {
    let reports = ctx
        .store
        .list_in_state(ReportState::Ingested, STAGE_LIMIT)
        .await?;

    if reports.is_empty() {
        info!("Prefilter: nothing to screen");
        return Ok(());
    }

    for report in &reports {
        let matched = keyword_match(&report.searchable_text());
        let passed = matched.is_some();

        if let Some(term) = matched {
            info!(report_id = %report.report_id, term, "Prefilter: passed");
        } else {
            info!(report_id = %report.report_id, "Prefilter: rejected");
        }

        if ctx.dry_run {
            if passed {
                stats.keyword_passed += 1;
            } else {
                stats.keyword_rejected += 1;
            }
            continue;
        }

        match ctx.store.mark_keyword_result(&report.report_id, passed).await? {
            TransitionOutcome::Applied => {
                if passed {
                    stats.keyword_passed += 1;
                } else {
                    stats.keyword_rejected += 1;
                }
            }
            TransitionOutcome::Conflict => {
                warn!(report_id = %report.report_id, "Prefilter: state conflict, skipping");
                stats.conflicts_skipped += 1;
            }
        }
    }

    Ok(())
}
