//! Per-run spend ceiling over the two paid collaborator calls. The gate
//! is checked before each report enters the classifier or summarizer
//! stage; when it closes, the stage stops for the rest of the run and
//! the leftover reports wait in their current state for tomorrow.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Flat per-call estimates in cents. Both stages run short gpt-4o-mini
/// prompts; actual token spend is recorded in the usage ledger, these
/// round-ups only drive the gate.
pub struct OperationCost;

impl OperationCost {
    pub const CLASSIFICATION: u64 = 1;
    pub const SUMMARIZATION: u64 = 1;
}

/// Cents spent against a per-run ceiling. A ceiling of zero disables the
/// gate entirely. The counter is atomic so the classifier and summarizer
/// stages could overlap without double-counting headroom.
pub struct BudgetTracker {
    ceiling_cents: u64,
    spent_cents: AtomicU64,
}

impl BudgetTracker {
    pub fn new(ceiling_cents: u64) -> Self {
        Self {
            ceiling_cents,
            spent_cents: AtomicU64::new(0),
        }
    }

    /// Gate check before a paid call. A `false` here is the caller's cue
    /// to stop its stage and flip the `budget_stopped` stat.
    pub fn admits(&self, cost_cents: u64) -> bool {
        self.ceiling_cents == 0
            || self.spent_cents.load(Ordering::Relaxed) + cost_cents <= self.ceiling_cents
    }

    /// Count one attempt's cost. Retries of malformed or transient calls
    /// spend like any other attempt; tokens went out either way.
    pub fn spend(&self, cost_cents: u64) -> u64 {
        self.spent_cents.fetch_add(cost_cents, Ordering::Relaxed) + cost_cents
    }

    pub fn total_spent(&self) -> u64 {
        self.spent_cents.load(Ordering::Relaxed)
    }

    pub fn log_status(&self) {
        if self.ceiling_cents > 0 {
            info!(
                spent_cents = self.total_spent(),
                ceiling_cents = self.ceiling_cents,
                "Budget status"
            );
        }
    }
}
