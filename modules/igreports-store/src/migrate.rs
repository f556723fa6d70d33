use igreports_common::IgReportsError;
use sqlx::SqlitePool;
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS reports (
    report_id         TEXT PRIMARY KEY,
    source_url        TEXT NOT NULL,
    title             TEXT NOT NULL,
    agency_code       TEXT,
    agency_name       TEXT,
    report_type       TEXT,
    published_date    TEXT,
    abstract_text     TEXT,
    state             TEXT NOT NULL,
    newsworthy_score  INTEGER,
    classifier_reason TEXT,
    topics            TEXT NOT NULL DEFAULT '[]',
    dollar_amount     INTEGER,
    criminal_flag     INTEGER NOT NULL DEFAULT 0,
    summary_text      TEXT,
    scheduled_at      TEXT,
    published_at      TEXT,
    publish_reference TEXT,
    publish_attempts  INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reports_state ON reports(state, created_at);

CREATE TABLE IF NOT EXISTS usage_ledger (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    recorded_at       TEXT NOT NULL,
    run_id            TEXT NOT NULL,
    collaborator      TEXT NOT NULL,
    model             TEXT,
    prompt_tokens     INTEGER NOT NULL DEFAULT 0,
    completion_tokens INTEGER NOT NULL DEFAULT 0,
    cost_cents        INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_usage_run ON usage_ledger(run_id);
"#;

/// Create tables and indexes. Safe to call on every startup.
pub async fn migrate(pool: &SqlitePool) -> Result<(), IgReportsError> {
    for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| IgReportsError::Database(format!("migration failed: {e}")))?;
    }
    info!("Database schema ready");
    Ok(())
}
