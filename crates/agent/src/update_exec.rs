//! OS-dispatched package manager upgrade, streamed line-by-line to the
//! dispatcher's status callback.

use crate::dispatch::DispatchStatus;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use uuid::Uuid;

fn linux_distro_id() -> Option<String> {
    let contents = std::fs::read_to_string("/etc/os-release").ok()?;
    contents.lines().find_map(|line| line.strip_prefix("ID=").map(|v| v.trim_matches('"').to_string()))
}

/// Picks the platform's package manager upgrade invocation. Returns
/// `(program, args)`.
fn upgrade_command() -> Option<(&'static str, Vec<&'static str>)> {
    if cfg!(target_os = "windows") {
        return Some(("winget", vec!["upgrade", "--all", "--accept-package-agreements", "--accept-source-agreements"]));
    }
    if cfg!(target_os = "macos") {
        return Some(("brew", vec!["upgrade"]));
    }
    match linux_distro_id().as_deref() {
        Some("ubuntu") | Some("debian") => Some(("apt-get", vec!["-y", "upgrade"])),
        Some("fedora") | Some("rhel") | Some("centos") => Some(("dnf", vec!["-y", "upgrade"])),
        Some("arch") => Some(("pacman", vec!["-Syu", "--noconfirm"])),
        Some("opensuse") | Some("opensuse-leap") | Some("sles") => Some(("zypper", vec!["update", "-y"])),
        _ => None,
    }
}

fn prefixed(stream: &str, line: &str) -> String {
    if stream == "stderr" {
        format!("[ERROR] {line}")
    } else {
        line.to_string()
    }
}

/// Runs the platform package-manager upgrade, streaming each stdout/stderr
/// line to `on_status` as it arrives, then a final exit-code frame.
pub async fn run_update(command_id: Uuid, on_status: &mut dyn FnMut(DispatchStatus)) {
    let Some((program, args)) = upgrade_command() else {
        on_status(DispatchStatus {
            command_id,
            phase: crate::dispatch::StatusPhase::Failed,
            message: "no known package manager for this platform".to_string(),
            result: None,
        });
        return;
    };

    let mut child = match Command::new(program).args(&args).stdout(Stdio::piped()).stderr(Stdio::piped()).spawn() {
        Ok(child) => child,
        Err(e) => {
            on_status(DispatchStatus {
                command_id,
                phase: crate::dispatch::StatusPhase::Failed,
                message: format!("failed to start {program}: {e}"),
                result: None,
            });
            return;
        }
    };

    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");
    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();
    let mut combined = String::new();

    loop {
        tokio::select! {
            line = stdout_lines.next_line() => {
                match line {
                    Ok(Some(text)) => {
                        combined.push_str(&text);
                        combined.push('\n');
                        on_status(DispatchStatus {
                            command_id,
                            phase: crate::dispatch::StatusPhase::InProgress,
                            message: prefixed("stdout", &text),
                            result: None,
                        });
                    }
                    Ok(None) => break,
                    Err(_) => break,
                }
            }
            line = stderr_lines.next_line() => {
                match line {
                    Ok(Some(text)) => {
                        combined.push_str(&text);
                        combined.push('\n');
                        on_status(DispatchStatus {
                            command_id,
                            phase: crate::dispatch::StatusPhase::InProgress,
                            message: prefixed("stderr", &text),
                            result: None,
                        });
                    }
                    Ok(None) => continue,
                    Err(_) => continue,
                }
            }
            else => break,
        }
    }

    let exit_code = child.wait().await.ok().and_then(|s| s.code()).unwrap_or(-1);
    let phase = if exit_code == 0 { crate::dispatch::StatusPhase::Success } else { crate::dispatch::StatusPhase::Failed };
    on_status(DispatchStatus {
        command_id,
        phase,
        message: format!("Exit code: {exit_code}\n{combined}"),
        result: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_marks_stderr_lines_only() {
        assert_eq!(prefixed("stderr", "boom"), "[ERROR] boom");
        assert_eq!(prefixed("stdout", "ok"), "ok");
    }
}
