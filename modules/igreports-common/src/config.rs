use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: String,

    // AI provider
    pub openai_api_key: String,
    pub classifier_model: String,
    pub summarizer_model: String,

    // Report source
    pub feed_url: String,

    // Publisher
    pub bluesky_handle: String,
    pub bluesky_app_password: String,

    // Budget (cents per run, 0 = unlimited)
    pub daily_budget_cents: u64,

    // Publication scheduling
    pub publish_slots: u32,
    pub publish_anchor_hour: u32,
    pub publish_jitter_secs: u32,

    // Summary length caps (chars)
    pub summary_soft_cap: usize,
    pub summary_hard_cap: usize,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://igreports.db?mode=rwc".to_string()),
            openai_api_key: required_env("OPENAI_API_KEY"),
            classifier_model: env::var("CLASSIFIER_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            summarizer_model: env::var("SUMMARIZER_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            feed_url: env::var("REPORTS_FEED_URL")
                .unwrap_or_else(|_| "https://www.oversight.gov/rss/reports.xml".to_string()),
            bluesky_handle: required_env("BLUESKY_HANDLE"),
            bluesky_app_password: required_env("BLUESKY_APP_PASSWORD"),
            daily_budget_cents: parsed_env("DAILY_BUDGET_CENTS", 100),
            publish_slots: parsed_env("PUBLISH_SLOTS", 4),
            publish_anchor_hour: parsed_env("PUBLISH_ANCHOR_HOUR", 14),
            publish_jitter_secs: parsed_env("PUBLISH_JITTER_SECS", 900),
            summary_soft_cap: parsed_env("SUMMARY_SOFT_CAP", 280),
            summary_hard_cap: parsed_env("SUMMARY_HARD_CAP", 300),
        }
    }

    /// Log the loaded config with secrets redacted.
    pub fn log_redacted(&self) {
        tracing::info!(
            database_url = %self.database_url,
            feed_url = %self.feed_url,
            publish_slots = self.publish_slots,
            publish_anchor_hour = self.publish_anchor_hour,
            daily_budget_cents = self.daily_budget_cents,
            "Config loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}
