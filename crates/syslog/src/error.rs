use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyslogError {
    #[error("failed to bind UDP socket on {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("socket receive failed: {0}")]
    Recv(std::io::Error),
}
