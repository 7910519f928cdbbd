mod engine;
mod error;
mod locate;
mod ndt7;

pub use engine::{run_speed_test, Phase, ProgressEvent, SpeedTestOptions, SpeedTestResult};
pub use error::SpeedTestError;
pub use locate::{
    locate, LocateResult, CLIENT_LIBRARY_NAME, CLIENT_LIBRARY_VERSION, CLIENT_NAME, CLIENT_VERSION,
    DEFAULT_LOCATE_BASE,
};
pub use ndt7::{compute_latency_stats, download, upload, ChunkProgress, LatencyStats, TransferResult};
