//! ndt7 download/upload over a `net.measurementlab.ndt.v7` WebSocket.

use crate::error::SpeedTestError;
use futures_util::{SinkExt, StreamExt};
use rand::RngCore;
use serde::Deserialize;
use statrs::statistics::Statistics;
use std::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;

const SUBPROTOCOL: &str = "net.measurementlab.ndt.v7";
const UPLOAD_FRAME_BYTES: usize = 64 * 1024;
const DEFAULT_MAX_UPLOAD_SECONDS: u64 = 13;
pub const MAX_LATENCY_SAMPLES: usize = 512;

/// Snapshot handed to the caller's chunk callback after every frame a
/// transfer sends or receives, so the engine can throttle its own
/// progress emission without `ndt7` knowing about that policy.
#[derive(Debug, Clone, Copy)]
pub struct ChunkProgress {
    pub bytes: u64,
    pub latency_sample_ms: Option<f64>,
    pub samples_collected: usize,
}

#[derive(Debug, Deserialize)]
struct TcpInfo {
    #[serde(rename = "RTT")]
    rtt: Option<f64>,
    #[serde(rename = "MinRTT")]
    min_rtt: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MeasurementFrame {
    #[serde(rename = "TCPInfo")]
    tcp_info: Option<TcpInfo>,
}

#[derive(Debug, Clone, Default)]
pub struct LatencyStats {
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
    pub jitter_ms: f64,
}

fn latency_stats(samples_us: &[f64]) -> Result<LatencyStats, SpeedTestError> {
    if samples_us.is_empty() {
        return Err(SpeedTestError::LatencyUnavailable(
            "Latency samples unavailable: no TCPInfo measurement frames were received".to_string(),
        ));
    }
    let ms: Vec<f64> = samples_us.iter().map(|us| us / 1000.0).collect();
    Ok(LatencyStats {
        min_ms: ms.clone().min(),
        max_ms: ms.clone().max(),
        avg_ms: ms.clone().mean(),
        jitter_ms: ms.population_std_dev(),
    })
}

/// Records an RTT sample from a measurement frame, returning the raw
/// microsecond value if one was added.
fn record_sample(text: &str, samples: &mut Vec<f64>) -> Option<f64> {
    let info = serde_json::from_str::<MeasurementFrame>(text).ok()?.tcp_info?;
    let value = info.rtt.or(info.min_rtt)?;
    if samples.len() < MAX_LATENCY_SAMPLES {
        samples.push(value);
        Some(value)
    } else {
        None
    }
}

async fn connect(url: &str) -> Result<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>, SpeedTestError> {
    let mut request = url.into_client_request().map_err(|e| SpeedTestError::WebSocket(e.to_string()))?;
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", SUBPROTOCOL.parse().map_err(|_| SpeedTestError::WebSocket("invalid subprotocol header".into()))?);
    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| SpeedTestError::WebSocket(e.to_string()))?;
    Ok(stream)
}

#[derive(Debug, Clone, Default)]
pub struct TransferResult {
    pub bytes: u64,
    pub mbps: f64,
    pub latency: Vec<f64>,
}

fn mbps(bytes: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64().max(0.000_001);
    (bytes as f64 * 8.0) / (seconds * 1_000_000.0)
}

/// Downloads until `target_bytes` are received or the server closes
/// the connection, counting binary frames toward throughput and
/// extracting RTT samples from text measurement frames. `on_chunk` fires
/// after every frame processed, binary or text.
pub async fn download(url: &str, target_bytes: u64, mut on_chunk: impl FnMut(ChunkProgress)) -> Result<TransferResult, SpeedTestError> {
    let mut ws = connect(url).await?;
    let mut bytes: u64 = 0;
    let mut samples = Vec::new();
    let start = Instant::now();

    while bytes < target_bytes {
        match ws.next().await {
            Some(Ok(Message::Binary(data))) => {
                bytes += data.len() as u64;
                on_chunk(ChunkProgress { bytes, latency_sample_ms: None, samples_collected: samples.len() });
            }
            Some(Ok(Message::Text(text))) => {
                let sample_ms = record_sample(&text, &mut samples).map(|us| us / 1000.0);
                on_chunk(ChunkProgress { bytes, latency_sample_ms: sample_ms, samples_collected: samples.len() });
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(SpeedTestError::WebSocket(e.to_string())),
        }
    }
    let elapsed = start.elapsed();
    let _ = ws.close(None).await;

    Ok(TransferResult { bytes, mbps: mbps(bytes, elapsed), latency: samples })
}

/// Sends random frames up to `target_bytes` or `MaxTestSeconds`,
/// concurrently draining text measurement frames for RTT samples.
/// `on_chunk` fires after every frame sent and after every RTT sample.
pub async fn upload(url: &str, target_bytes: u64, max_seconds: Option<u64>, mut on_chunk: impl FnMut(ChunkProgress)) -> Result<TransferResult, SpeedTestError> {
    let mut ws = connect(url).await?;
    let deadline = Instant::now() + Duration::from_secs(max_seconds.unwrap_or(DEFAULT_MAX_UPLOAD_SECONDS));
    let mut bytes: u64 = 0;
    let mut samples = Vec::new();
    let start = Instant::now();
    let mut rng = rand::thread_rng();

    while bytes < target_bytes && Instant::now() < deadline {
        let mut frame = vec![0u8; UPLOAD_FRAME_BYTES];
        rng.fill_bytes(&mut frame);
        if ws.send(Message::Binary(frame.clone())).await.is_err() {
            break;
        }
        bytes += frame.len() as u64;
        on_chunk(ChunkProgress { bytes, latency_sample_ms: None, samples_collected: samples.len() });

        while let Ok(Some(Ok(Message::Text(text)))) = tokio::time::timeout(Duration::from_millis(1), ws.next()).await {
            let sample_ms = record_sample(&text, &mut samples).map(|us| us / 1000.0);
            if sample_ms.is_some() {
                on_chunk(ChunkProgress { bytes, latency_sample_ms: sample_ms, samples_collected: samples.len() });
            }
        }
    }
    let elapsed = start.elapsed();
    let _ = ws.close(None).await;

    Ok(TransferResult { bytes, mbps: mbps(bytes, elapsed), latency: samples })
}

pub fn compute_latency_stats(samples: &[f64]) -> Result<LatencyStats, SpeedTestError> {
    latency_stats(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mbps_formula_matches_spec() {
        // 10_000_000 bytes over 1s should be 80 Mbps.
        let value = mbps(10_000_000, Duration::from_secs(1));
        assert!((value - 80.0).abs() < 0.001);
    }

    #[test]
    fn empty_samples_report_failure() {
        assert!(latency_stats(&[]).is_err());
    }

    #[test]
    fn jitter_is_population_stddev_of_samples() {
        let stats = latency_stats(&[10_000.0, 20_000.0, 30_000.0]).unwrap();
        assert_eq!(stats.min_ms, 10.0);
        assert_eq!(stats.max_ms, 30.0);
        assert!((stats.avg_ms - 20.0).abs() < 0.001);
        assert!(stats.jitter_ms > 0.0);
    }
}
