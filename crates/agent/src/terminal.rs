//! One interactive shell per agent, pumped output budgeted by bytes and
//! wall-clock. Same pump/flush shape as `script.rs`, but the shell stays
//! open across multiple input writes instead of running to completion.

use crate::error::TerminalError;
use crate::proc::{isolate_process_group, kill_tree};
use chrono::{DateTime, Utc};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::sync::Notify;
use uuid::Uuid;

const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct TerminalSessionState {
    pub session_id: Uuid,
    pub started_at_utc: DateTime<Utc>,
    pub bytes_sent: u64,
    pub closed: bool,
}

fn spawn_shell() -> std::io::Result<Child> {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = tokio::process::Command::new("powershell");
        c.args(["-NoLogo", "-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", "-"]);
        c
    } else {
        let mut c = tokio::process::Command::new("/bin/bash");
        c.args(["--norc", "--noprofile", "-i"]);
        c
    };
    cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
    isolate_process_group(&mut cmd);
    cmd.spawn()
}

struct Session {
    state: Mutex<TerminalSessionState>,
    stdin: tokio::sync::Mutex<ChildStdin>,
    close_notify: Arc<Notify>,
    bytes_sent: Arc<AtomicU64>,
}

pub struct TerminalManager {
    max_output_bytes: u64,
    max_duration: Duration,
    session: Mutex<Option<Arc<Session>>>,
}

impl TerminalManager {
    pub fn new(max_output_bytes: u64, max_duration: Duration) -> Self {
        Self { max_output_bytes, max_duration, session: Mutex::new(None) }
    }

    /// Spawns the shell and starts pumping output through `on_output`
    /// as `(session_id, chunk, closed)`. Rejects a second concurrent open.
    pub fn open<F>(&self, on_output: F) -> Result<Uuid, TerminalError>
    where
        F: Fn(Uuid, String, bool) + Send + Sync + 'static,
    {
        let mut guard = self.session.lock().expect("terminal session lock poisoned");
        if guard.is_some() {
            return Err(TerminalError::AlreadyOpen);
        }

        let mut child = spawn_shell().map_err(TerminalError::Spawn)?;
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let session_id = Uuid::new_v4();
        let close_notify = Arc::new(Notify::new());
        let bytes_sent = Arc::new(AtomicU64::new(0));

        let session = Arc::new(Session {
            state: Mutex::new(TerminalSessionState { session_id, started_at_utc: Utc::now(), bytes_sent: 0, closed: false }),
            stdin: tokio::sync::Mutex::new(stdin),
            close_notify: close_notify.clone(),
            bytes_sent: bytes_sent.clone(),
        });

        let max_output_bytes = self.max_output_bytes;
        let max_duration = self.max_duration;
        let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));

        spawn_reader(stdout, buffer.clone());
        spawn_reader(stderr, buffer.clone());
        spawn_flusher(session_id, buffer, bytes_sent.clone(), max_output_bytes, max_duration, close_notify.clone(), on_output, child);

        *guard = Some(session);
        Ok(session_id)
    }

    pub async fn send_input(&self, session_id: Uuid, text: &str) -> Result<(), TerminalError> {
        let session = {
            let guard = self.session.lock().expect("terminal session lock poisoned");
            let session = guard.as_ref().ok_or(TerminalError::NotOpen)?;
            if session.state.lock().expect("terminal state lock poisoned").session_id != session_id {
                return Err(TerminalError::NotOpen);
            }
            session.clone()
        };
        let mut stdin = session.stdin.lock().await;
        stdin.write_all(text.as_bytes()).await.map_err(TerminalError::Write)
    }

    pub fn close(&self, session_id: Uuid) -> Result<(), TerminalError> {
        let mut guard = self.session.lock().expect("terminal session lock poisoned");
        let session = guard.as_ref().ok_or(TerminalError::NotOpen)?;
        if session.state.lock().expect("terminal state lock poisoned").session_id != session_id {
            return Err(TerminalError::NotOpen);
        }
        session.close_notify.notify_waiters();
        *guard = None;
        Ok(())
    }
}

fn spawn_reader<R>(reader: R, buffer: Arc<Mutex<Vec<u8>>>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = reader;
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buffer.lock().expect("terminal buffer lock poisoned").extend_from_slice(&chunk[..n]),
            }
        }
    });
}

#[allow(clippy::too_many_arguments)]
fn spawn_flusher<F>(
    session_id: Uuid,
    buffer: Arc<Mutex<Vec<u8>>>,
    bytes_sent: Arc<AtomicU64>,
    max_output_bytes: u64,
    max_duration: Duration,
    close_notify: Arc<Notify>,
    on_output: F,
    mut child: Child,
) where
    F: Fn(Uuid, String, bool) + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let deadline = tokio::time::Instant::now() + max_duration;
        let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
        let mut closed = false;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let pending = {
                        let mut buf = buffer.lock().expect("terminal buffer lock poisoned");
                        std::mem::take(&mut *buf)
                    };
                    if !pending.is_empty() {
                        let remaining = max_output_bytes.saturating_sub(bytes_sent.load(Ordering::SeqCst));
                        let take = (pending.len() as u64).min(remaining) as usize;
                        if take > 0 {
                            let text = String::from_utf8_lossy(&pending[..take]).into_owned();
                            bytes_sent.fetch_add(take as u64, Ordering::SeqCst);
                            on_output(session_id, text, false);
                        }
                        if bytes_sent.load(Ordering::SeqCst) >= max_output_bytes {
                            on_output(session_id, String::new(), true);
                            closed = true;
                        }
                    }
                    if tokio::time::Instant::now() >= deadline {
                        on_output(session_id, String::new(), true);
                        closed = true;
                    }
                    if closed {
                        break;
                    }
                }
                _ = close_notify.notified() => {
                    on_output(session_id, String::new(), true);
                    break;
                }
            }
        }

        kill_tree(&mut child).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn rejects_second_concurrent_open() {
        let manager = TerminalManager::new(1_000_000, Duration::from_secs(30));
        let first = manager.open(|_, _, _| {});
        assert!(first.is_ok());
        let second = manager.open(|_, _, _| {});
        assert!(matches!(second, Err(TerminalError::AlreadyOpen)));
        manager.close(first.unwrap()).unwrap();
    }

    #[tokio::test]
    async fn echoed_output_reaches_callback() {
        let manager = TerminalManager::new(1_000_000, Duration::from_secs(30));
        let saw_output = Arc::new(AtomicBool::new(false));
        let saw_output_clone = saw_output.clone();
        let session_id = manager
            .open(move |_, chunk, _| {
                if chunk.contains("terminal-probe") {
                    saw_output_clone.store(true, Ordering::SeqCst);
                }
            })
            .unwrap();
        manager.send_input(session_id, "echo terminal-probe\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        manager.close(session_id).unwrap();
        assert!(saw_output.load(Ordering::SeqCst));
    }
}
