/// Per-stage counts for one pipeline run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub fetched: u32,
    pub ingested_new: u32,
    pub ingested_known: u32,
    pub keyword_passed: u32,
    pub keyword_rejected: u32,
    pub classified_newsworthy: u32,
    pub classified_not_newsworthy: u32,
    pub classify_exhausted: u32,
    pub summarized: u32,
    pub summarize_exhausted: u32,
    pub scheduled: u32,
    pub published: u32,
    pub publish_failed: u32,
    pub conflicts_skipped: u32,
    /// Whole stages that errored out (source down past retries, store
    /// unreachable). The other stages still run.
    pub stage_errors: u32,
    pub budget_stopped: bool,
    pub spent_cents: u64,
}

impl RunStats {
    /// Unrecoverable (post-retry) errors this run. Non-zero means a
    /// non-zero exit code; individual failures never abort the run.
    pub fn failures(&self) -> u32 {
        self.classify_exhausted + self.summarize_exhausted + self.publish_failed + self.stage_errors
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Pipeline Run Complete ===")?;
        writeln!(f, "Fetched from source:  {}", self.fetched)?;
        writeln!(f, "Ingested (new):       {}", self.ingested_new)?;
        writeln!(f, "Ingested (known):     {}", self.ingested_known)?;
        writeln!(f, "Keyword passed:       {}", self.keyword_passed)?;
        writeln!(f, "Keyword rejected:     {}", self.keyword_rejected)?;
        writeln!(f, "Newsworthy:           {}", self.classified_newsworthy)?;
        writeln!(f, "Not newsworthy:       {}", self.classified_not_newsworthy)?;
        writeln!(f, "Summarized:           {}", self.summarized)?;
        writeln!(f, "Scheduled:            {}", self.scheduled)?;
        writeln!(f, "Published:            {}", self.published)?;
        writeln!(f, "Publish failed:       {}", self.publish_failed)?;
        if self.conflicts_skipped > 0 {
            writeln!(f, "Conflicts skipped:    {}", self.conflicts_skipped)?;
        }
        if self.stage_errors > 0 {
            writeln!(f, "Stage errors:         {}", self.stage_errors)?;
        }
        if self.classify_exhausted + self.summarize_exhausted > 0 {
            writeln!(
                f,
                "Retries exhausted:    {} classify, {} summarize",
                self.classify_exhausted, self.summarize_exhausted
            )?;
        }
        if self.budget_stopped {
            writeln!(f, "Budget ceiling reached; classification cut short")?;
        }
        writeln!(f, "Spent this run:       {}¢", self.spent_cents)?;
        Ok(())
    }
}
