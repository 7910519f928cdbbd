use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("capability not supported by this adapter")]
    Unsupported,
    #[error("subprocess {0} failed: {1}")]
    SubprocessFailed(String, String),
    #[error("subprocess {0} not found on this system")]
    SubprocessMissing(String),
    #[error("failed to parse {0} output")]
    ParseFailed(&'static str),
    #[error("request failed: {0}")]
    Request(String),
}
