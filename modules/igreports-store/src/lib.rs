mod migrate;
mod report_store;
mod usage;

pub use migrate::migrate;
pub use report_store::{ReportStore, TransitionOutcome, UpsertOutcome};
pub use usage::UsageRecord;
