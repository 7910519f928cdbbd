use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("a capture is already running")]
    AlreadyRunning,
    #[error("no capture is running")]
    NotRunning,
    #[error("failed to open capture device {0}: {1}")]
    OpenFailed(String, String),
    #[error("unsupported channel type for device {0}")]
    UnsupportedChannel(String),
}
