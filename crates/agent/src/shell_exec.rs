//! `ShellExecutor` — one-shot bounded command execution, merging stdout
//! and stderr into a single capped buffer. Simpler cousin of
//! `update_exec`'s streamed package-manager run: here the caller wants
//! one final string, not progress frames, so output is just collected.

use crate::error::ShellExecError;
use crate::proc::{isolate_process_group, kill_tree};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct ShellExecResult {
    pub exit_code: i32,
    pub output: String,
    pub truncated: bool,
}

fn build_command(command: &str) -> Command {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd.exe");
        c.arg("/c").arg(command);
        c
    } else {
        let mut c = Command::new("/bin/bash");
        c.arg("-lc").arg(command);
        c
    };
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    isolate_process_group(&mut cmd);
    cmd
}

/// Runs `command` under the platform shell, merging stdout/stderr into a
/// single buffer capped at `max_output_chars`. Kills the process tree if
/// `timeout` elapses first.
pub async fn run(command: &str, max_output_chars: usize, timeout: Duration) -> Result<ShellExecResult, ShellExecError> {
    let mut child = build_command(command).spawn().map_err(ShellExecError::Spawn)?;
    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();
    let mut output = String::new();
    let mut truncated = false;

    let pump = async {
        loop {
            tokio::select! {
                line = stdout_lines.next_line() => {
                    match line {
                        Ok(Some(text)) => push_line(&mut output, &mut truncated, &text, max_output_chars),
                        Ok(None) => break,
                        Err(_) => break,
                    }
                }
                line = stderr_lines.next_line() => {
                    match line {
                        Ok(Some(text)) => push_line(&mut output, &mut truncated, &text, max_output_chars),
                        Ok(None) => continue,
                        Err(_) => continue,
                    }
                }
                else => break,
            }
        }
    };

    let exit_code = match tokio::time::timeout(timeout, async {
        pump.await;
        child.wait().await
    })
    .await
    {
        Ok(Ok(status)) => status.code().unwrap_or(-1),
        Ok(Err(_)) => -1,
        Err(_) => {
            kill_tree(&mut child).await;
            return Err(ShellExecError::TimedOut);
        }
    };

    Ok(ShellExecResult { exit_code, output, truncated })
}

fn push_line(output: &mut String, truncated: &mut bool, line: &str, max_output_chars: usize) {
    if *truncated {
        return;
    }
    let remaining = max_output_chars.saturating_sub(output.chars().count());
    if remaining == 0 {
        *truncated = true;
        return;
    }
    let take: String = line.chars().take(remaining).collect();
    let would_truncate = take.chars().count() < line.chars().count();
    output.push_str(&take);
    output.push('\n');
    if would_truncate {
        *truncated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_command_and_merges_output() {
        let result = run("echo out; echo err 1>&2", 4096, Duration::from_secs(5)).await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("out"));
        assert!(result.output.contains("err"));
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn truncates_output_past_the_char_budget() {
        let result = run("echo 0123456789", 5, Duration::from_secs(5)).await.unwrap();
        assert!(result.truncated);
        assert!(result.output.chars().count() <= 5);
    }

    #[tokio::test]
    async fn reports_nonzero_exit_code() {
        let result = run("exit 3", 4096, Duration::from_secs(5)).await.unwrap();
        assert_eq!(result.exit_code, 3);
    }

    #[tokio::test]
    async fn kills_process_on_timeout() {
        let result = run("sleep 30", 4096, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(ShellExecError::TimedOut)));
    }
}
