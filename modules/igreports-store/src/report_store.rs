use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use igreports_common::{ClassifierVerdict, IgReportsError, Report, ReportFacts, ReportState};

/// Outcome of a guarded state transition. `Conflict` means the report was
/// not in the expected state, typically because another invocation got there
/// first. Callers log and skip; they never retry in the same run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    Conflict,
}

/// How an ingestion write landed: a brand-new row, or a merge into one
/// that already existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Merged,
}

/// Durable report ledger. All writes are single-statement transactions
/// scoped to one report; every transition carries an expected-state
/// predicate (`... AND state = ?`) so overlapping runs cannot
/// double-process a report.
#[derive(Clone)]
pub struct ReportStore {
    pool: SqlitePool,
}

fn db_err(e: sqlx::Error) -> IgReportsError {
    IgReportsError::Database(e.to_string())
}

impl ReportStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database at `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self, IgReportsError> {
        let pool = SqlitePool::connect(url).await.map_err(db_err)?;
        crate::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory store for tests. Single connection so the schema is
    /// shared across all queries.
    #[cfg(any(test, feature = "test-support"))]
    pub async fn in_memory() -> Result<Self, IgReportsError> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;
        crate::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Idempotent ingestion write. Unknown `report_id` inserts a new
    /// `Ingested` report. A known id is a merge, never a reset: state and
    /// non-empty descriptive fields are left untouched, and only fields
    /// that are still empty are filled in (re-scrapes may return truncated
    /// data, so first-seen values are authoritative). Uniqueness is
    /// enforced in the insert itself (`ON CONFLICT DO NOTHING`), so a
    /// racing duplicate ingest degrades to a merge instead of erroring.
    pub async fn upsert(
        &self,
        facts: &ReportFacts,
    ) -> Result<(Report, UpsertOutcome), IgReportsError> {
        let now = Utc::now();

        let inserted = sqlx::query(
            r#"
            INSERT INTO reports (
                report_id, source_url, title, agency_code, agency_name,
                report_type, published_date, abstract_text,
                state, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(report_id) DO NOTHING
            "#,
        )
        .bind(&facts.report_id)
        .bind(&facts.source_url)
        .bind(&facts.title)
        .bind(&facts.agency_code)
        .bind(&facts.agency_name)
        .bind(&facts.report_type)
        .bind(facts.published_date)
        .bind(&facts.abstract_text)
        .bind(ReportState::Ingested.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .rows_affected()
            == 1;

        if !inserted {
            debug!(report_id = %facts.report_id, "Known report, merging empty fields only");
            sqlx::query(
                r#"
                UPDATE reports SET
                    agency_code    = COALESCE(NULLIF(agency_code, ''), ?),
                    agency_name    = COALESCE(NULLIF(agency_name, ''), ?),
                    report_type    = COALESCE(NULLIF(report_type, ''), ?),
                    published_date = COALESCE(published_date, ?),
                    abstract_text  = COALESCE(NULLIF(abstract_text, ''), ?),
                    updated_at     = ?
                WHERE report_id = ?
                "#,
            )
            .bind(&facts.agency_code)
            .bind(&facts.agency_name)
            .bind(&facts.report_type)
            .bind(facts.published_date)
            .bind(&facts.abstract_text)
            .bind(now)
            .bind(&facts.report_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }

        let report = self.find(&facts.report_id).await?.ok_or_else(|| {
            IgReportsError::Database(format!("report {} vanished after upsert", facts.report_id))
        })?;
        let outcome = if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Merged
        };
        Ok((report, outcome))
    }

    pub async fn find(&self, report_id: &str) -> Result<Option<Report>, IgReportsError> {
        let row = sqlx::query("SELECT * FROM reports WHERE report_id = ?")
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|r| report_from_row(&r)).transpose()
    }

    /// Reports currently in `state`, oldest-ingested first. The stable
    /// ordering keeps repeated runs under a budget cap making consistent
    /// progress instead of starving older reports.
    pub async fn list_in_state(
        &self,
        state: ReportState,
        limit: u32,
    ) -> Result<Vec<Report>, IgReportsError> {
        let rows = sqlx::query(
            "SELECT * FROM reports WHERE state = ? ORDER BY created_at ASC, rowid ASC LIMIT ?",
        )
        .bind(state.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(report_from_row).collect()
    }

    /// `Summarized` reports with no slot assignment yet, ordered by
    /// score descending then `created_at` ascending, so the most newsworthy
    /// items get the earliest slots.
    pub async fn list_unscheduled(&self, limit: u32) -> Result<Vec<Report>, IgReportsError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM reports
            WHERE state = ? AND scheduled_at IS NULL
            ORDER BY newsworthy_score DESC, created_at ASC, rowid ASC
            LIMIT ?
            "#,
        )
        .bind(ReportState::Summarized.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(report_from_row).collect()
    }

    /// `Summarized` reports whose slot time has arrived.
    pub async fn list_due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Report>, IgReportsError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM reports
            WHERE state = ? AND scheduled_at IS NOT NULL AND scheduled_at <= ?
            ORDER BY scheduled_at ASC, rowid ASC
            LIMIT ?
            "#,
        )
        .bind(ReportState::Summarized.as_str())
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(report_from_row).collect()
    }

    /// `PublishFailed` reports still within the retry budget.
    pub async fn list_publish_retries(
        &self,
        max_attempts: u32,
        limit: u32,
    ) -> Result<Vec<Report>, IgReportsError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM reports
            WHERE state = ? AND publish_attempts < ?
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?
            "#,
        )
        .bind(ReportState::PublishFailed.as_str())
        .bind(max_attempts as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(report_from_row).collect()
    }

    // -----------------------------------------------------------------------
    // Guarded transitions. Each is one UPDATE with `AND state = ?`; zero
    // rows affected means the report left the expected state under us.
    // -----------------------------------------------------------------------

    /// `Ingested` → `KeywordPassed` | `KeywordRejected`.
    pub async fn mark_keyword_result(
        &self,
        report_id: &str,
        passed: bool,
    ) -> Result<TransitionOutcome, IgReportsError> {
        let new_state = if passed {
            ReportState::KeywordPassed
        } else {
            ReportState::KeywordRejected
        };
        let result = sqlx::query(
            "UPDATE reports SET state = ?, updated_at = ? WHERE report_id = ? AND state = ?",
        )
        .bind(new_state.as_str())
        .bind(Utc::now())
        .bind(report_id)
        .bind(ReportState::Ingested.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(outcome(result.rows_affected()))
    }

    /// `KeywordPassed` → `ClassifiedNewsworthy` | `ClassifiedNotNewsworthy`.
    pub async fn mark_classified(
        &self,
        report_id: &str,
        verdict: &ClassifierVerdict,
    ) -> Result<TransitionOutcome, IgReportsError> {
        let new_state = if verdict.newsworthy {
            ReportState::ClassifiedNewsworthy
        } else {
            ReportState::ClassifiedNotNewsworthy
        };
        let topics_json = serde_json::to_string(&verdict.topics)
            .map_err(|e| IgReportsError::Database(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE reports SET
                state = ?, newsworthy_score = ?, classifier_reason = ?,
                topics = ?, dollar_amount = ?, criminal_flag = ?, updated_at = ?
            WHERE report_id = ? AND state = ?
            "#,
        )
        .bind(new_state.as_str())
        .bind(verdict.score as i64)
        .bind(&verdict.reason)
        .bind(topics_json)
        .bind(verdict.dollar_amount.map(|v| v.min(i64::MAX as u64) as i64))
        .bind(verdict.criminal)
        .bind(Utc::now())
        .bind(report_id)
        .bind(ReportState::KeywordPassed.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(outcome(result.rows_affected()))
    }

    /// `ClassifiedNewsworthy` → `Summarized`.
    pub async fn mark_summarized(
        &self,
        report_id: &str,
        summary_text: &str,
    ) -> Result<TransitionOutcome, IgReportsError> {
        let result = sqlx::query(
            r#"
            UPDATE reports SET state = ?, summary_text = ?, updated_at = ?
            WHERE report_id = ? AND state = ?
            "#,
        )
        .bind(ReportState::Summarized.as_str())
        .bind(summary_text)
        .bind(Utc::now())
        .bind(report_id)
        .bind(ReportState::ClassifiedNewsworthy.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(outcome(result.rows_affected()))
    }

    /// Assign a publication slot. Not a state change (the report stays
    /// `Summarized`) but still guarded so a re-run never re-rolls an
    /// existing assignment.
    pub async fn set_schedule(
        &self,
        report_id: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, IgReportsError> {
        let result = sqlx::query(
            r#"
            UPDATE reports SET scheduled_at = ?, updated_at = ?
            WHERE report_id = ? AND state = ? AND scheduled_at IS NULL
            "#,
        )
        .bind(scheduled_at)
        .bind(Utc::now())
        .bind(report_id)
        .bind(ReportState::Summarized.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(outcome(result.rows_affected()))
    }

    /// `Summarized` | `PublishFailed` → `Published`. Terminal; a report is
    /// published at most once.
    pub async fn mark_published(
        &self,
        report_id: &str,
        expected: ReportState,
        publish_reference: &str,
        published_at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, IgReportsError> {
        let result = sqlx::query(
            r#"
            UPDATE reports SET
                state = ?, published_at = ?, publish_reference = ?,
                publish_attempts = publish_attempts + 1, updated_at = ?
            WHERE report_id = ? AND state = ?
            "#,
        )
        .bind(ReportState::Published.as_str())
        .bind(published_at)
        .bind(publish_reference)
        .bind(Utc::now())
        .bind(report_id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(outcome(result.rows_affected()))
    }

    /// `Summarized` | `PublishFailed` → `PublishFailed`, counting the
    /// attempt. Non-terminal: eligible for bounded retry next run.
    pub async fn mark_publish_failed(
        &self,
        report_id: &str,
        expected: ReportState,
    ) -> Result<TransitionOutcome, IgReportsError> {
        let result = sqlx::query(
            r#"
            UPDATE reports SET
                state = ?, publish_attempts = publish_attempts + 1, updated_at = ?
            WHERE report_id = ? AND state = ?
            "#,
        )
        .bind(ReportState::PublishFailed.as_str())
        .bind(Utc::now())
        .bind(report_id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(outcome(result.rows_affected()))
    }

    /// Per-state totals for the end-of-run report.
    pub async fn counts_by_state(&self) -> Result<Vec<(ReportState, u64)>, IgReportsError> {
        let rows = sqlx::query("SELECT state, COUNT(*) AS n FROM reports GROUP BY state")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut counts = Vec::new();
        for row in rows {
            let state_str: String = row.try_get("state").map_err(db_err)?;
            let n: i64 = row.try_get("n").map_err(db_err)?;
            if let Some(state) = ReportState::parse(&state_str) {
                counts.push((state, n as u64));
            }
        }
        Ok(counts)
    }
}

fn outcome(rows_affected: u64) -> TransitionOutcome {
    if rows_affected == 1 {
        TransitionOutcome::Applied
    } else {
        TransitionOutcome::Conflict
    }
}

fn report_from_row(row: &SqliteRow) -> Result<Report, IgReportsError> {
    let state_str: String = row.try_get("state").map_err(db_err)?;
    let state = ReportState::parse(&state_str)
        .ok_or_else(|| IgReportsError::Database(format!("unknown report state: {state_str}")))?;

    let topics_json: String = row.try_get("topics").map_err(db_err)?;
    let topics: Vec<String> = serde_json::from_str(&topics_json).unwrap_or_default();

    Ok(Report {
        report_id: row.try_get("report_id").map_err(db_err)?,
        source_url: row.try_get("source_url").map_err(db_err)?,
        title: row.try_get("title").map_err(db_err)?,
        agency_code: row.try_get("agency_code").map_err(db_err)?,
        agency_name: row.try_get("agency_name").map_err(db_err)?,
        report_type: row.try_get("report_type").map_err(db_err)?,
        published_date: row
            .try_get::<Option<NaiveDate>, _>("published_date")
            .map_err(db_err)?,
        abstract_text: row.try_get("abstract_text").map_err(db_err)?,
        state,
        newsworthy_score: row
            .try_get::<Option<i64>, _>("newsworthy_score")
            .map_err(db_err)?
            .map(|v| v.clamp(1, 10) as u8),
        classifier_reason: row.try_get("classifier_reason").map_err(db_err)?,
        topics,
        dollar_amount: row
            .try_get::<Option<i64>, _>("dollar_amount")
            .map_err(db_err)?
            .map(|v| v.max(0) as u64),
        criminal_flag: row.try_get("criminal_flag").map_err(db_err)?,
        summary_text: row.try_get("summary_text").map_err(db_err)?,
        scheduled_at: row
            .try_get::<Option<DateTime<Utc>>, _>("scheduled_at")
            .map_err(db_err)?,
        published_at: row
            .try_get::<Option<DateTime<Utc>>, _>("published_at")
            .map_err(db_err)?,
        publish_reference: row.try_get("publish_reference").map_err(db_err)?,
        publish_attempts: row.try_get::<i64, _>("publish_attempts").map_err(db_err)? as u32,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}
