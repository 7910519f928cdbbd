//! Orchestrates locate -> download -> upload into one `SpeedTestResult`.

use crate::error::SpeedTestError;
use crate::locate::{self, LocateResult};
use crate::ndt7::{self, ChunkProgress, LatencyStats};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// Minimum gap between progress emissions within a single phase. A forced
/// final emission per phase bypasses this.
const PROGRESS_THROTTLE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct SpeedTestOptions {
    pub locate_base: String,
    pub service_name: String,
    pub service_type: String,
    pub download_bytes: u64,
    pub upload_bytes: u64,
    pub max_upload_seconds: Option<u64>,
}

impl Default for SpeedTestOptions {
    fn default() -> Self {
        Self {
            locate_base: locate::DEFAULT_LOCATE_BASE.to_string(),
            service_name: "ndt".to_string(),
            service_type: "locate".to_string(),
            download_bytes: 50 * 1024 * 1024,
            upload_bytes: 25 * 1024 * 1024,
            max_upload_seconds: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeedTestResult {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub success: bool,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub download_bytes: u64,
    pub upload_bytes: u64,
    pub latency: Option<LatencyStats>,
    pub metadata: Value,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Locating,
    Downloading,
    Uploading,
    Done,
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub bytes: u64,
    pub target: u64,
    pub mbps: Option<f64>,
    pub latency_sample_ms: Option<f64>,
    pub samples_collected: usize,
    pub samples_target: usize,
    pub elapsed_ms: u64,
}

fn mbps_so_far(bytes: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64().max(0.000_001);
    (bytes as f64 * 8.0) / (seconds * 1_000_000.0)
}

/// Throttles a phase's chunk stream down to one emission per
/// `PROGRESS_THROTTLE`, always letting the first chunk through.
struct PhaseThrottle {
    phase: Phase,
    phase_start: Instant,
    test_start: Instant,
    target: u64,
    last_emit: Option<Instant>,
}

impl PhaseThrottle {
    fn new(phase: Phase, test_start: Instant, target: u64) -> Self {
        Self { phase, phase_start: Instant::now(), test_start, target, last_emit: None }
    }

    fn event(&self, chunk: ChunkProgress) -> ProgressEvent {
        ProgressEvent {
            phase: self.phase,
            bytes: chunk.bytes,
            target: self.target,
            mbps: Some(mbps_so_far(chunk.bytes, self.phase_start.elapsed())),
            latency_sample_ms: chunk.latency_sample_ms,
            samples_collected: chunk.samples_collected,
            samples_target: ndt7::MAX_LATENCY_SAMPLES,
            elapsed_ms: self.test_start.elapsed().as_millis() as u64,
        }
    }

    /// Forwards `chunk` to `on_progress` if a latency sample just arrived
    /// or the throttle window has elapsed; always forwards the first chunk.
    fn maybe_emit(&mut self, chunk: ChunkProgress, on_progress: &mut impl FnMut(ProgressEvent)) {
        let now = Instant::now();
        let due = self.last_emit.map_or(true, |last| now.duration_since(last) >= PROGRESS_THROTTLE);
        if chunk.latency_sample_ms.is_some() || due {
            self.last_emit = Some(now);
            on_progress(self.event(chunk));
        }
    }

    /// Unconditionally forwards `chunk`, bypassing the throttle.
    fn force_emit(&mut self, chunk: ChunkProgress, on_progress: &mut impl FnMut(ProgressEvent)) {
        self.last_emit = Some(Instant::now());
        on_progress(self.event(chunk));
    }
}

fn metadata(locate_base: &str, locate: &LocateResult) -> Value {
    json!({
        "locateUrl": locate_base,
        "downloadUrl": locate.download_url,
        "uploadUrl": locate.upload_url,
        "serviceName": locate.service_name,
        "serviceType": locate.service_type,
        "clientName": locate::CLIENT_NAME,
    })
}

/// Runs the full locate -> download -> upload sequence. `on_progress` is
/// throttled internally to one update per 250ms per phase, plus one
/// forced final update per phase regardless of the throttle.
pub async fn run_speed_test(options: SpeedTestOptions, mut on_progress: impl FnMut(ProgressEvent)) -> SpeedTestResult {
    let test_start = Instant::now();
    let started_at = Utc::now();

    let mut locating = PhaseThrottle::new(Phase::Locating, test_start, 0);
    locating.force_emit(ChunkProgress { bytes: 0, latency_sample_ms: None, samples_collected: 0 }, &mut on_progress);

    let locate_result = match locate::locate(&options.locate_base, &options.service_name, &options.service_type).await {
        Ok(r) => r,
        Err(e) => return failed(started_at, e),
    };

    let mut downloading = PhaseThrottle::new(Phase::Downloading, test_start, options.download_bytes);
    let download = match ndt7::download(&locate_result.download_url, options.download_bytes, |chunk| downloading.maybe_emit(chunk, &mut on_progress)).await {
        Ok(r) => r,
        Err(e) => return failed(started_at, e),
    };
    downloading.force_emit(ChunkProgress { bytes: download.bytes, latency_sample_ms: None, samples_collected: download.latency.len() }, &mut on_progress);

    let mut uploading = PhaseThrottle::new(Phase::Uploading, test_start, options.upload_bytes);
    let upload = match ndt7::upload(&locate_result.upload_url, options.upload_bytes, options.max_upload_seconds, |chunk| uploading.maybe_emit(chunk, &mut on_progress)).await {
        Ok(r) => r,
        Err(e) => return failed(started_at, e),
    };
    uploading.force_emit(ChunkProgress { bytes: upload.bytes, latency_sample_ms: None, samples_collected: upload.latency.len() }, &mut on_progress);

    let mut samples = download.latency.clone();
    samples.extend(upload.latency.clone());
    let latency = ndt7::compute_latency_stats(&samples);

    let mut done = PhaseThrottle::new(Phase::Done, test_start, options.download_bytes + options.upload_bytes);
    done.force_emit(ChunkProgress { bytes: download.bytes + upload.bytes, latency_sample_ms: None, samples_collected: samples.len() }, &mut on_progress);

    match latency {
        Ok(stats) => SpeedTestResult {
            started_at,
            completed_at: Utc::now(),
            success: true,
            download_mbps: Some(download.mbps),
            upload_mbps: Some(upload.mbps),
            download_bytes: download.bytes,
            upload_bytes: upload.bytes,
            latency: Some(stats),
            metadata: metadata(&options.locate_base, &locate_result),
            error: None,
        },
        Err(e) => SpeedTestResult {
            started_at,
            completed_at: Utc::now(),
            success: false,
            download_mbps: Some(download.mbps),
            upload_mbps: Some(upload.mbps),
            download_bytes: download.bytes,
            upload_bytes: upload.bytes,
            latency: None,
            metadata: metadata(&options.locate_base, &locate_result),
            error: Some(e.to_string()),
        },
    }
}

fn failed(started_at: DateTime<Utc>, error: SpeedTestError) -> SpeedTestResult {
    SpeedTestResult {
        started_at,
        completed_at: Utc::now(),
        success: false,
        download_mbps: None,
        upload_mbps: None,
        download_bytes: 0,
        upload_bytes: 0,
        latency: None,
        metadata: Value::Null,
        error: Some(error.to_string()),
    }
}
