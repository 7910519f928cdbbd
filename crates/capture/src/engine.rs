//! Live packet capture: one capture at a time, ring-buffered and sampled
//! to subscribers in periodic batches.

use crate::error::CaptureError;
use crate::model::{CaptureOptions, PacketCaptureRecord};
use crate::parser::parse_frame;
use manlab_core::CircularBuffer;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const SAMPLE_CHANNEL_CAPACITY: usize = 1000;
const BROADCAST_CAPACITY: usize = 256;

pub struct CaptureEngine {
    active: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
    buffer: Arc<CircularBuffer<PacketCaptureRecord>>,
    batch_sender: broadcast::Sender<Vec<PacketCaptureRecord>>,
    capture_thread: std::sync::Mutex<Option<std::thread::JoinHandle<()>>>,
    broadcaster_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CaptureEngine {
    pub fn new(max_buffered_packets: usize) -> Self {
        let (batch_sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            active: Arc::new(AtomicBool::new(false)),
            next_id: Arc::new(AtomicU64::new(1)),
            buffer: Arc::new(CircularBuffer::new(max_buffered_packets.max(1))),
            batch_sender,
            capture_thread: std::sync::Mutex::new(None),
            broadcaster_task: std::sync::Mutex::new(None),
        }
    }

    pub fn buffer(&self) -> &CircularBuffer<PacketCaptureRecord> {
        &self.buffer
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<PacketCaptureRecord>> {
        self.batch_sender.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn start_capture(&self, options: CaptureOptions) -> Result<(), CaptureError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }

        if let Err(e) = self.open_and_spawn(&options) {
            self.active.store(false, Ordering::SeqCst);
            return Err(e);
        }

        info!(device = %options.device_name, snap_len = options.snap_len, promiscuous = options.promiscuous, "capture started");
        Ok(())
    }

    fn open_and_spawn(&self, options: &CaptureOptions) -> Result<(), CaptureError> {
        let interfaces = pnet::datalink::interfaces();
        let interface = interfaces
            .into_iter()
            .find(|i| i.name == options.device_name)
            .ok_or_else(|| CaptureError::DeviceNotFound(options.device_name.clone()))?;

        let config = pnet::datalink::Config {
            read_timeout: Some(Duration::from_secs(1)),
            promiscuous: options.promiscuous,
            ..Default::default()
        };

        let channel = pnet::datalink::channel(&interface, config)
            .map_err(|e| CaptureError::OpenFailed(options.device_name.clone(), e.to_string()))?;
        let (_, mut rx) = match channel {
            pnet::datalink::Channel::Ethernet(tx, rx) => (tx, rx),
            _ => return Err(CaptureError::UnsupportedChannel(options.device_name.clone())),
        };

        let (sample_tx, sample_rx) = mpsc::channel::<PacketCaptureRecord>(SAMPLE_CHANNEL_CAPACITY);
        let active = self.active.clone();
        let next_id = self.next_id.clone();
        let buffer = self.buffer.clone();
        let sample_every = options.broadcast_sample_every.max(1);
        let device_name = options.device_name.clone();
        let snap_len = options.snap_len;

        let capture_thread = std::thread::spawn(move || {
            let mut seen: u64 = 0;
            while active.load(Ordering::SeqCst) {
                match rx.next() {
                    Ok(raw) => {
                        let raw = &raw[..raw.len().min(snap_len)];
                        let id = next_id.fetch_add(1, Ordering::SeqCst);
                        if let Some(record) = parse_frame(id, raw) {
                            buffer.add(record.clone());
                            seen += 1;
                            if seen % sample_every as u64 == 0 {
                                // Drop-newest: a full channel means the broadcaster is behind, so the
                                // new sample is discarded rather than blocking the capture thread.
                                let _ = sample_tx.try_send(record);
                            }
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                    Err(e) => {
                        warn!(device = %device_name, error = %e, "capture read error, stopping");
                        break;
                    }
                }
            }
            info!(device = %device_name, "capture thread stopped");
        });

        let broadcaster = self.batch_sender.clone();
        let broadcast_interval = Duration::from_millis(options.broadcast_interval_ms.max(25));
        let batch_size = options.broadcast_batch_size;
        let broadcaster_task = tokio::spawn(run_broadcaster(sample_rx, broadcaster, broadcast_interval, batch_size));

        *self.capture_thread.lock().expect("capture thread lock poisoned") = Some(capture_thread);
        *self.broadcaster_task.lock().expect("broadcaster task lock poisoned") = Some(broadcaster_task);

        Ok(())
    }

    pub fn stop_capture(&self) -> Result<(), CaptureError> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Err(CaptureError::NotRunning);
        }
        if let Some(handle) = self.capture_thread.lock().expect("capture thread lock poisoned").take() {
            let _ = handle.join();
        }
        if let Some(task) = self.broadcaster_task.lock().expect("broadcaster task lock poisoned").take() {
            task.abort();
        }
        Ok(())
    }
}

async fn run_broadcaster(
    mut sample_rx: mpsc::Receiver<PacketCaptureRecord>,
    sender: broadcast::Sender<Vec<PacketCaptureRecord>>,
    interval: Duration,
    batch_size: usize,
) {
    let mut batch = Vec::with_capacity(batch_size.max(1));
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            maybe_record = sample_rx.recv() => {
                match maybe_record {
                    Some(record) => {
                        batch.push(record);
                        if batch.len() >= batch_size.max(1) {
                            let _ = sender.send(std::mem::take(&mut batch));
                        }
                    }
                    None => break,
                }
            }
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    let _ = sender.send(std::mem::take(&mut batch));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_engine_is_not_running() {
        let engine = CaptureEngine::new(100);
        assert!(!engine.is_running());
    }

    #[test]
    fn starting_unknown_device_fails_without_marking_active() {
        let engine = CaptureEngine::new(100);
        let options = CaptureOptions {
            device_name: "definitely-not-a-real-device".to_string(),
            ..Default::default()
        };
        let result = engine.start_capture(options);
        assert!(result.is_err());
        assert!(!engine.is_running());
    }

    #[test]
    fn stop_without_start_reports_not_running() {
        let engine = CaptureEngine::new(100);
        assert!(matches!(engine.stop_capture(), Err(CaptureError::NotRunning)));
    }
}
