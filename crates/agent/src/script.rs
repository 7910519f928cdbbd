//! Remote script fetch-and-run: temp file, sandboxed subprocess, chunked
//! output over a bounded channel, run-to-completion (not interactive).

use crate::error::ScriptError;
use crate::proc::{isolate_process_group, kill_tree};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use uuid::Uuid;

const CHUNK_MAX_CHARS: usize = 2048;
const FLUSH_INTERVAL: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    PowerShell,
}

#[derive(Debug, Clone)]
pub struct ScriptRun {
    pub run_id: Uuid,
    pub script_id: Uuid,
    pub shell: Shell,
    pub content: String,
}

#[derive(Debug, Clone)]
pub enum ScriptFrame {
    Output { run_id: Uuid, script_id: Uuid, stream: &'static str, chunk: String },
    Info { run_id: Uuid, script_id: Uuid, message: String },
}

fn posix_env() -> Vec<(String, String)> {
    const ALLOW: &[&str] = &["PATH", "HOME", "USER", "TMPDIR", "LANG"];
    ALLOW.iter().filter_map(|k| std::env::var(k).ok().map(|v| (k.to_string(), v))).collect()
}

fn windows_env() -> Vec<(String, String)> {
    const ALLOW: &[&str] = &["PATH", "TEMP", "TMP", "SystemRoot", "ComSpec", "USERPROFILE", "USERNAME"];
    ALLOW.iter().filter_map(|k| std::env::var(k).ok().map(|v| (k.to_string(), v))).collect()
}

fn build_command(shell: Shell, script_path: &std::path::Path) -> Command {
    let mut cmd = match shell {
        Shell::Bash => {
            let mut c = Command::new("/bin/bash");
            c.arg(script_path);
            c
        }
        Shell::PowerShell => {
            let program = if cfg!(target_os = "windows") { "powershell" } else { "pwsh" };
            let mut c = Command::new(program);
            c.arg("-File").arg(script_path);
            c
        }
    };

    cmd.env_clear();
    let allowed = if cfg!(target_os = "windows") { windows_env() } else { posix_env() };
    cmd.envs(allowed);
    cmd.env("MANLAB", "1");
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    isolate_process_group(&mut cmd);
    cmd
}

async fn pump_stream<R: AsyncRead + Unpin>(reader: R, stream: &'static str, run_id: Uuid, script_id: Uuid, on_frame: tokio::sync::mpsc::Sender<ScriptFrame>) {
    let mut lines = BufReader::new(reader).lines();
    let mut buffer = String::new();
    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(text)) => {
                        buffer.push_str(&text);
                        buffer.push('\n');
                        while buffer.chars().count() >= CHUNK_MAX_CHARS {
                            let chunk: String = buffer.drain(..CHUNK_MAX_CHARS.min(buffer.len())).collect();
                            let _ = on_frame.send(ScriptFrame::Output { run_id, script_id, stream, chunk }).await;
                        }
                    }
                    Ok(None) => break,
                    Err(_) => break,
                }
            }
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    let chunk = std::mem::take(&mut buffer);
                    let _ = on_frame.send(ScriptFrame::Output { run_id, script_id, stream, chunk }).await;
                }
            }
        }
    }
    if !buffer.is_empty() {
        let _ = on_frame.send(ScriptFrame::Output { run_id, script_id, stream, chunk: buffer }).await;
    }
}

/// Writes the script to a temp file, runs it under the given shell, and
/// streams output frames through `on_frame` as they arrive. The temp
/// file is removed on every exit path since it's a `NamedTempFile`.
pub async fn run(run_spec: ScriptRun, max_duration: Duration, on_frame: tokio::sync::mpsc::Sender<ScriptFrame>) -> Result<i32, ScriptError> {
    let suffix = match run_spec.shell {
        Shell::Bash => ".sh",
        Shell::PowerShell => ".ps1",
    };
    let mut temp_file = tempfile::Builder::new().suffix(suffix).tempfile()?;
    std::io::Write::write_all(&mut temp_file, run_spec.content.as_bytes())?;
    let path = temp_file.path().to_path_buf();

    let mut child = build_command(run_spec.shell, &path).spawn()?;
    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let stdout_task = tokio::spawn(pump_stream(stdout, "stdout", run_spec.run_id, run_spec.script_id, on_frame.clone()));
    let stderr_task = tokio::spawn(pump_stream(stderr, "stderr", run_spec.run_id, run_spec.script_id, on_frame.clone()));

    let exit_code = match tokio::time::timeout(max_duration, child.wait()).await {
        Ok(Ok(status)) => status.code().unwrap_or(-1),
        Ok(Err(_)) => -1,
        Err(_) => {
            kill_tree(&mut child).await;
            let _ = on_frame
                .send(ScriptFrame::Info { run_id: run_spec.run_id, script_id: run_spec.script_id, message: "Script timed out and was killed.".to_string() })
                .await;
            return Err(ScriptError::TimedOut);
        }
    };

    let _ = stdout_task.await;
    let _ = stderr_task.await;

    let _ = on_frame
        .send(ScriptFrame::Info {
            run_id: run_spec.run_id,
            script_id: run_spec.script_id,
            message: format!("Script completed. ExitCode={exit_code}"),
        })
        .await;

    if exit_code != 0 {
        return Err(ScriptError::NonZeroExit(exit_code));
    }
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_bash_script_and_reports_exit_code() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(32);
        let run_spec = ScriptRun { run_id: Uuid::new_v4(), script_id: Uuid::new_v4(), shell: Shell::Bash, content: "echo hello".to_string() };
        let result = run(run_spec, Duration::from_secs(5), tx).await;
        assert_eq!(result.unwrap(), 0);

        let mut saw_output = false;
        let mut saw_info = false;
        while let Ok(frame) = rx.try_recv() {
            match frame {
                ScriptFrame::Output { chunk, .. } => {
                    if chunk.contains("hello") {
                        saw_output = true;
                    }
                }
                ScriptFrame::Info { message, .. } => {
                    if message.contains("ExitCode=0") {
                        saw_info = true;
                    }
                }
            }
        }
        assert!(saw_output);
        assert!(saw_info);
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported_as_error() {
        let (tx, _rx) = tokio::sync::mpsc::channel(32);
        let run_spec = ScriptRun { run_id: Uuid::new_v4(), script_id: Uuid::new_v4(), shell: Shell::Bash, content: "exit 7".to_string() };
        let result = run(run_spec, Duration::from_secs(5), tx).await;
        assert!(matches!(result, Err(ScriptError::NonZeroExit(7))));
    }

    #[tokio::test]
    async fn long_running_script_is_killed_on_timeout() {
        let (tx, _rx) = tokio::sync::mpsc::channel(32);
        let run_spec = ScriptRun { run_id: Uuid::new_v4(), script_id: Uuid::new_v4(), shell: Shell::Bash, content: "sleep 30".to_string() };
        let result = run(run_spec, Duration::from_millis(200), tx).await;
        assert!(matches!(result, Err(ScriptError::TimedOut)));
    }
}
