//! Ingestion gate. Admits report facts from the source collaborator
//! into the store. No newsworthiness judgment happens here; the gate's
//! only job is dedup (known ids merge, never reset) and bookkeeping.

use anyhow::{anyhow, Result};
use tracing::{debug, info, warn};

use igreports_common::ReportFacts;
use igreports_store::UpsertOutcome;

use crate::retry::{backoff_delay, MAX_ATTEMPTS};
use crate::run::RunContext;
use crate::stats::RunStats;

pub async fn run_ingest(ctx: &RunContext, days_back: u32, stats: &mut RunStats) -> Result<()> {
    info!(days_back, "Ingestion: fetching recent reports");

    let facts = fetch_with_retry(ctx, days_back).await?;
    stats.fetched = facts.len() as u32;

    if facts.is_empty() {
        warn!("Ingestion: source returned no reports");
        return Ok(());
    }

    for fact in &facts {
        if fact.report_id.is_empty() || fact.title.is_empty() || fact.source_url.is_empty() {
            warn!(report_id = %fact.report_id, "Ingestion: skipping record missing required fields");
            continue;
        }

        if ctx.dry_run {
            debug!(report_id = %fact.report_id, "[dry run] would upsert report");
            stats.ingested_new += 1;
            continue;
        }

        let (report, outcome) = ctx.store.upsert(fact).await?;
        match outcome {
            UpsertOutcome::Inserted => {
                stats.ingested_new += 1;
                debug!(report_id = %report.report_id, "New report ingested");
            }
            UpsertOutcome::Merged => stats.ingested_known += 1,
        }
    }

    info!(
        new = stats.ingested_new,
        known = stats.ingested_known,
        "Ingestion complete"
    );
    Ok(())
}

/// The scrape edge is just as failure-prone as the paid edges, so it
/// gets the same bounded backoff. Exhaustion propagates: with no facts
/// there is nothing for the rest of the run to ingest.
async fn fetch_with_retry(ctx: &RunContext, days_back: u32) -> Result<Vec<ReportFacts>> {
    let mut last_err = None;
    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 {
            tokio::time::sleep(backoff_delay(attempt - 1)).await;
        }
        match ctx.source.fetch_recent(days_back).await {
            Ok(facts) => return Ok(facts),
            Err(e) => {
                warn!(attempt = attempt + 1, error = %e, "Report source fetch failed, will retry");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("report source fetch failed")))
}
