use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpeedTestError {
    #[error("locate service returned no capacity")]
    NoCapacity,
    #[error("locate service response did not contain a usable {0} URL")]
    MissingUrl(&'static str),
    #[error("locate request failed: {0}")]
    Locate(String),
    #[error("websocket error: {0}")]
    WebSocket(String),
    #[error("{0}")]
    LatencyUnavailable(String),
}
