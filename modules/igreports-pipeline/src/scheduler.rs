//! Publication scheduler. Spreads summarized reports across the day
//! and dispatches the ones whose slot has arrived.
//!
//! Two phases, both idempotent:
//!   1. Assignment: every `Summarized` report without a slot gets one.
//!     Slots start at the anchor hour and repeat every `24 / slots`
//!     hours, each nudged by a small random jitter so posts never land
//!     at machine-regular times. Assignments are persisted; a re-run
//!     never re-rolls an existing slot.
//!   2. Dispatch: due reports plus failed ones still inside the retry
//!     budget go to the publisher. Success is terminal.

use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use rand::Rng;
use tracing::{info, warn};

use igreports_common::Report;
use igreports_store::TransitionOutcome;

use crate::run::RunContext;
use crate::stats::RunStats;
use crate::traits::PublishOutcome;

/// A `PublishFailed` report is retried on later runs until it has
/// consumed this many attempts in total.
pub const MAX_PUBLISH_ATTEMPTS: u32 = 3;

const DISPATCH_LIMIT: u32 = 50;

/// Computes slot times for a batch of unscheduled reports.
#[derive(Debug, Clone, Copy)]
pub struct SlotPlanner {
    pub slots_per_day: u32,
    pub anchor_hour: u32,
    pub jitter_secs: u32,
}

impl SlotPlanner {
    pub fn from_config(config: &igreports_common::Config) -> Self {
        Self {
            slots_per_day: config.publish_slots.clamp(1, 6),
            anchor_hour: config.publish_anchor_hour.min(23),
            jitter_secs: config.publish_jitter_secs,
        }
    }

    /// Slot time for the `index`-th report of the batch, anchored to the
    /// day containing `now`. Slots that already passed roll forward a
    /// day so nothing is scheduled in the past.
    pub fn slot_at<R: Rng>(&self, now: DateTime<Utc>, index: u32, rng: &mut R) -> DateTime<Utc> {
        let spacing_hours = 24 / self.slots_per_day.max(1);
        let base = Utc
            .with_ymd_and_hms(
                now.year(),
                now.month(),
                now.day(),
                self.anchor_hour,
                0,
                0,
            )
            .single()
            .unwrap_or(now);

        let slot = index % self.slots_per_day;
        let day = index / self.slots_per_day;
        let mut at = base
            + Duration::hours((slot * spacing_hours) as i64)
            + Duration::days(day as i64);

        if at < now {
            at += Duration::days(1);
        }
        if self.jitter_secs > 0 {
            at += Duration::seconds(rng.random_range(0..=self.jitter_secs as i64));
        }
        at
    }
}

pub async fn run_publish(ctx: &RunContext, now: DateTime<Utc>, stats: &mut RunStats) -> Result<()> {
    assign_slots(ctx, now, stats).await?;
    dispatch_due(ctx, now, stats).await?;
    Ok(())
}

async fn assign_slots(ctx: &RunContext, now: DateTime<Utc>, stats: &mut RunStats) -> Result<()> {
    let pending = ctx.store.list_unscheduled(DISPATCH_LIMIT).await?;
    if pending.is_empty() {
        return Ok(());
    }

    let planner = SlotPlanner::from_config(&ctx.config);
    let mut rng = rand::rng();

    for (i, report) in pending.iter().enumerate() {
        let at = planner.slot_at(now, i as u32, &mut rng);

        if ctx.dry_run {
            info!(report_id = %report.report_id, scheduled_at = %at, "[dry run] would schedule");
            stats.scheduled += 1;
            continue;
        }

        match ctx.store.set_schedule(&report.report_id, at).await? {
            TransitionOutcome::Applied => {
                info!(report_id = %report.report_id, scheduled_at = %at, "Slot assigned");
                stats.scheduled += 1;
            }
            TransitionOutcome::Conflict => {
                stats.conflicts_skipped += 1;
            }
        }
    }

    Ok(())
}

async fn dispatch_due(ctx: &RunContext, now: DateTime<Utc>, stats: &mut RunStats) -> Result<()> {
    let mut due = ctx.store.list_due(now, DISPATCH_LIMIT).await?;
    let retries = ctx
        .store
        .list_publish_retries(MAX_PUBLISH_ATTEMPTS, DISPATCH_LIMIT)
        .await?;
    due.extend(retries);

    if due.is_empty() {
        info!("Publication: nothing due");
        return Ok(());
    }
    info!(count = due.len(), "Publication: dispatching");

    for report in &due {
        publish_one(ctx, report, now, stats).await?;
    }
    Ok(())
}

async fn publish_one(
    ctx: &RunContext,
    report: &Report,
    now: DateTime<Utc>,
    stats: &mut RunStats,
) -> Result<()> {
    let text = match report.summary_text.as_deref() {
        Some(t) if !t.is_empty() => t,
        _ => {
            warn!(report_id = %report.report_id, "Publication: no summary text, skipping");
            return Ok(());
        }
    };

    if ctx.dry_run {
        info!(report_id = %report.report_id, "[dry run] would publish:\n{text}");
        stats.published += 1;
        return Ok(());
    }

    match ctx.publisher.publish(text).await {
        PublishOutcome::Published { reference } => {
            match ctx
                .store
                .mark_published(&report.report_id, report.state, &reference, now)
                .await?
            {
                TransitionOutcome::Applied => {
                    info!(report_id = %report.report_id, reference = %reference, "Published");
                    stats.published += 1;
                }
                TransitionOutcome::Conflict => {
                    warn!(report_id = %report.report_id, "Publication: state conflict, skipping");
                    stats.conflicts_skipped += 1;
                }
            }
        }
        PublishOutcome::Failed { detail } => {
            warn!(
                report_id = %report.report_id,
                attempt = report.publish_attempts + 1,
                detail = %detail,
                "Publish attempt failed"
            );
            match ctx
                .store
                .mark_publish_failed(&report.report_id, report.state)
                .await?
            {
                TransitionOutcome::Applied => stats.publish_failed += 1,
                TransitionOutcome::Conflict => stats.conflicts_skipped += 1,
            }
            if report.publish_attempts + 1 >= MAX_PUBLISH_ATTEMPTS {
                warn!(report_id = %report.report_id, "Publish retry budget exhausted");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn planner() -> SlotPlanner {
        SlotPlanner {
            slots_per_day: 4,
            anchor_hour: 14,
            jitter_secs: 0,
        }
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, 0, 0).unwrap()
    }

    #[test]
    fn slots_are_spaced_from_the_anchor() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = at(9);
        let p = planner();

        assert_eq!(p.slot_at(now, 0, &mut rng), at(14));
        assert_eq!(p.slot_at(now, 1, &mut rng), at(20));
        // Slot 2 wraps past midnight: 14:00 + 12h.
        assert_eq!(p.slot_at(now, 2, &mut rng), at(14) + Duration::hours(12));
    }

    #[test]
    fn past_slots_roll_forward_a_day() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = at(15);
        let first = planner().slot_at(now, 0, &mut rng);
        assert_eq!(first, at(14) + Duration::days(1));
        assert!(first > now);
    }

    #[test]
    fn overflow_batches_spill_into_following_days() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = at(9);
        let p = planner();
        let fifth = p.slot_at(now, 4, &mut rng);
        assert_eq!(fifth, at(14) + Duration::days(1));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let p = SlotPlanner {
            jitter_secs: 900,
            ..planner()
        };
        let now = at(9);
        for i in 0..20 {
            let slot = p.slot_at(now, i % 4, &mut rng);
            let base = planner().slot_at(now, i % 4, &mut rng);
            let delta = (slot - base).num_seconds();
            assert!((0..=900).contains(&delta), "jitter {delta} out of range");
        }
    }
}
