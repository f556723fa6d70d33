use chrono::{DateTime, Utc};
use sqlx::Row;

use igreports_common::{IgReportsError, TokenUsage};

use crate::report_store::ReportStore;

/// One appended row in the usage ledger: a single call to a paid
/// collaborator, whether or not it produced a usable response.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub recorded_at: DateTime<Utc>,
    pub run_id: String,
    pub collaborator: String,
    pub model: Option<String>,
    pub usage: TokenUsage,
    pub cost_cents: u64,
}

impl UsageRecord {
    pub fn new(
        run_id: &str,
        collaborator: &str,
        model: Option<&str>,
        usage: TokenUsage,
        cost_cents: u64,
    ) -> Self {
        Self {
            recorded_at: Utc::now(),
            run_id: run_id.to_string(),
            collaborator: collaborator.to_string(),
            model: model.map(str::to_string),
            usage,
            cost_cents,
        }
    }
}

fn db_err(e: sqlx::Error) -> IgReportsError {
    IgReportsError::Database(e.to_string())
}

impl ReportStore {
    /// Append one ledger row. The ledger is append-only history; budget
    /// gating within a run uses the in-memory tracker, not this table.
    pub async fn record_usage(&self, record: &UsageRecord) -> Result<(), IgReportsError> {
        sqlx::query(
            r#"
            INSERT INTO usage_ledger (
                recorded_at, run_id, collaborator, model,
                prompt_tokens, completion_tokens, cost_cents
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.recorded_at)
        .bind(&record.run_id)
        .bind(&record.collaborator)
        .bind(&record.model)
        .bind(record.usage.prompt_tokens as i64)
        .bind(record.usage.completion_tokens as i64)
        .bind(record.cost_cents as i64)
        .execute(self.pool())
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Total recorded spend for one run, in cents.
    pub async fn run_cost_cents(&self, run_id: &str) -> Result<u64, IgReportsError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(cost_cents), 0) AS total FROM usage_ledger WHERE run_id = ?",
        )
        .bind(run_id)
        .fetch_one(self.pool())
        .await
        .map_err(db_err)?;
        let total: i64 = row.try_get("total").map_err(db_err)?;
        Ok(total.max(0) as u64)
    }

    /// All-time recorded spend, in cents.
    pub async fn total_cost_cents(&self) -> Result<u64, IgReportsError> {
        let row = sqlx::query("SELECT COALESCE(SUM(cost_cents), 0) AS total FROM usage_ledger")
            .fetch_one(self.pool())
            .await
            .map_err(db_err)?;
        let total: i64 = row.try_get("total").map_err(db_err)?;
        Ok(total.max(0) as u64)
    }

    /// Number of calls recorded for one collaborator within a run.
    pub async fn usage_call_count(
        &self,
        run_id: &str,
        collaborator: &str,
    ) -> Result<u64, IgReportsError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM usage_ledger WHERE run_id = ? AND collaborator = ?",
        )
        .bind(run_id)
        .bind(collaborator)
        .fetch_one(self.pool())
        .await
        .map_err(db_err)?;
        let n: i64 = row.try_get("n").map_err(db_err)?;
        Ok(n as u64)
    }
}
