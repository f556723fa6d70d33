pub mod bluesky;
pub mod budget;
pub mod classify;
pub mod collaborators;
pub mod decorate;
pub mod feed_source;
pub mod gate;
pub mod prefilter;
pub mod retry;
pub mod run;
pub mod scheduler;
pub mod stats;
pub mod summarize;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
