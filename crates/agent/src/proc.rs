//! Process-group spawn/kill helpers shared by `script`, `shell_exec`, and
//! `terminal`: a killed child must take any descendants it spawned (e.g. a
//! backgrounded `sleep 100 &`) down with it, not just itself.

use tokio::process::{Child, Command};

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Places the future child in its own process group so `kill_tree` can
/// reach its descendants. Call before `spawn()`.
pub fn isolate_process_group(cmd: &mut Command) {
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
    #[cfg(windows)]
    {
        std::os::windows::process::CommandExt::creation_flags(cmd, CREATE_NEW_PROCESS_GROUP);
    }
}

/// Kills `child` and everything in its process group, then reaps it.
pub async fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            let pgid = nix::unistd::Pid::from_raw(pid as i32);
            let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL);
        }
    }
    #[cfg(windows)]
    {
        if let Some(pid) = child.id() {
            let _ = std::process::Command::new("taskkill").args(["/PID", &pid.to_string(), "/T", "/F"]).output();
        }
    }
    let _ = child.start_kill();
    let _ = child.wait().await;
}
