use std::time::Duration;

/// Attempt cap for classifier and summarizer calls. The publisher gets
/// its own cross-run retry budget (`publish_attempts` on the report).
pub const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between collaborator attempts.
const BASE_DELAY_MS: u64 = 500;

/// Backoff delay after a failed attempt (0-based): 500ms, 1s, 2s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_DELAY_MS << attempt.min(4))
}
