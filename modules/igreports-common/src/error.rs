use thiserror::Error;

/// Store-level failures. Collaborator trouble never becomes an error at
/// this level: the stages model it with tagged outcome enums so retry
/// policy stays local, and lost transition races surface as
/// `TransitionOutcome::Conflict`, not as errors.
#[derive(Error, Debug)]
pub enum IgReportsError {
    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
