use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("persistence sink error: {0}")]
    Sink(String),

    #[error("journal already shut down")]
    ShutDown,
}
