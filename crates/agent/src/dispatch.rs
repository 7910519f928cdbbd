//! `AgentDispatcher` — routes inbound `CommandEnvelope`s by lowercased
//! type to one handler per command, dispatching over a JSON `type`
//! string instead of a distinct RPC method per command.

use crate::docker::DockerGateway;
use crate::error::DispatchError;
use crate::script::{self, Shell, ScriptFrame, ScriptRun};
use crate::update_exec;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::LazyLock;
use std::time::Duration;
use uuid::Uuid;

const MAX_PAYLOAD_BYTES: usize = 32 * 1024;
const DEFAULT_SCRIPT_TIMEOUT_SECONDS: u64 = 300;

static CONTAINER_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]{1,128}$").expect("static pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPhase {
    InProgress,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchStatus {
    pub command_id: Uuid,
    pub phase: StatusPhase,
    pub message: String,
    pub result: Option<Value>,
}

impl DispatchStatus {
    fn in_progress(command_id: Uuid, message: impl Into<String>) -> Self {
        Self { command_id, phase: StatusPhase::InProgress, message: message.into(), result: None }
    }
    fn success(command_id: Uuid, message: impl Into<String>, result: Value) -> Self {
        Self { command_id, phase: StatusPhase::Success, message: message.into(), result: Some(result) }
    }
    fn failed(command_id: Uuid, message: impl Into<String>) -> Self {
        Self { command_id, phase: StatusPhase::Failed, message: message.into(), result: None }
    }
}

/// Extracts a `containerId` (or `ContainerId`) field from a command
/// payload and validates it against the allowed character set.
pub fn extract_container_id(payload: &Value) -> Result<String, DispatchError> {
    let raw = payload
        .get("containerId")
        .or_else(|| payload.get("ContainerId"))
        .and_then(Value::as_str)
        .ok_or(DispatchError::InvalidContainerId)?;
    if CONTAINER_ID_RE.is_match(raw) {
        Ok(raw.to_string())
    } else {
        Err(DispatchError::InvalidContainerId)
    }
}

pub struct AgentDispatcher {
    docker: Option<DockerGateway>,
}

impl AgentDispatcher {
    pub fn new(docker: Option<DockerGateway>) -> Self {
        Self { docker }
    }

    /// Runs one command end to end, reporting progress through
    /// `on_status`. Never propagates an error to the caller — every
    /// failure becomes a `Failed` status frame instead.
    pub async fn dispatch(&self, command_id: Uuid, command_type: &str, payload: &str, on_status: &mut dyn FnMut(DispatchStatus)) {
        let lowered = command_type.to_ascii_lowercase();
        on_status(DispatchStatus::in_progress(command_id, format!("Executing command: {lowered}")));

        if payload.len() > MAX_PAYLOAD_BYTES {
            on_status(DispatchStatus::failed(command_id, "payload exceeds the 32 KiB command size limit"));
            return;
        }

        let parsed: Value = if payload.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str(payload) {
                Ok(v) => v,
                Err(e) => {
                    on_status(DispatchStatus::failed(command_id, format!("payload is not valid JSON: {e}")));
                    return;
                }
            }
        };

        match lowered.as_str() {
            "docker.list" => self.handle_docker_list(command_id, on_status).await,
            "docker.start" => self.handle_docker_lifecycle(command_id, &parsed, "start", on_status).await,
            "docker.stop" => self.handle_docker_lifecycle(command_id, &parsed, "stop", on_status).await,
            "docker.restart" => self.handle_docker_lifecycle(command_id, &parsed, "restart", on_status).await,
            "system.update" => update_exec::run_update(command_id, on_status).await,
            "script.run" => self.handle_script_run(command_id, &parsed, on_status).await,
            other => on_status(DispatchStatus::failed(command_id, format!("unknown command type: {other}"))),
        }
    }

    async fn handle_docker_list(&self, command_id: Uuid, on_status: &mut dyn FnMut(DispatchStatus)) {
        let Some(docker) = &self.docker else {
            on_status(DispatchStatus::failed(command_id, "docker is not available on this agent"));
            return;
        };
        match docker.list().await {
            Ok(containers) => on_status(DispatchStatus::success(command_id, "listed containers", json!(containers))),
            Err(e) => on_status(DispatchStatus::failed(command_id, format!("docker.list failed: {e}"))),
        }
    }

    async fn handle_docker_lifecycle(&self, command_id: Uuid, payload: &Value, action: &str, on_status: &mut dyn FnMut(DispatchStatus)) {
        let Some(docker) = &self.docker else {
            on_status(DispatchStatus::failed(command_id, "docker is not available on this agent"));
            return;
        };
        let container_id = match extract_container_id(payload) {
            Ok(id) => id,
            Err(_) => {
                on_status(DispatchStatus::failed(command_id, "missing or invalid containerId"));
                return;
            }
        };
        let outcome = match action {
            "start" => docker.start(&container_id).await,
            "stop" => docker.stop(&container_id).await,
            "restart" => docker.restart(&container_id).await,
            _ => unreachable!("handle_docker_lifecycle called with unknown action"),
        };
        match outcome {
            Ok(()) => on_status(DispatchStatus::success(
                command_id,
                format!("docker.{action} succeeded"),
                json!({ "success": true, "containerId": container_id, "action": action }),
            )),
            Err(e) => on_status(DispatchStatus::failed(command_id, format!("docker.{action} failed: {e}"))),
        }
    }

    async fn handle_script_run(&self, command_id: Uuid, payload: &Value, on_status: &mut dyn FnMut(DispatchStatus)) {
        let Some(content) = payload.get("content").and_then(Value::as_str) else {
            on_status(DispatchStatus::failed(command_id, "missing script content"));
            return;
        };
        let shell = match payload.get("shell").and_then(Value::as_str).unwrap_or("bash") {
            "bash" => Shell::Bash,
            "powershell" => Shell::PowerShell,
            other => {
                on_status(DispatchStatus::failed(command_id, format!("unsupported shell: {other}")));
                return;
            }
        };
        let timeout_seconds = payload.get("timeoutSeconds").and_then(Value::as_u64).unwrap_or(DEFAULT_SCRIPT_TIMEOUT_SECONDS);
        let script_id = payload.get("scriptId").and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok()).unwrap_or_else(Uuid::new_v4);

        let run_spec = ScriptRun { run_id: command_id, script_id, shell, content: content.to_string() };
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let run_task = tokio::spawn(script::run(run_spec, Duration::from_secs(timeout_seconds), tx));

        while let Some(frame) = rx.recv().await {
            match frame {
                ScriptFrame::Output { stream, chunk, .. } => on_status(DispatchStatus::in_progress(command_id, format!("[{stream}] {chunk}"))),
                ScriptFrame::Info { message, .. } => on_status(DispatchStatus::in_progress(command_id, message)),
            }
        }

        match run_task.await {
            Ok(Ok(exit_code)) => on_status(DispatchStatus::success(command_id, "script.run succeeded", json!({ "exitCode": exit_code }))),
            Ok(Err(e)) => on_status(DispatchStatus::failed(command_id, format!("script.run failed: {e}"))),
            Err(e) => on_status(DispatchStatus::failed(command_id, format!("script.run task panicked: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_valid_container_id() {
        let payload = json!({ "containerId": "web-1.prod" });
        assert_eq!(extract_container_id(&payload).unwrap(), "web-1.prod");
    }

    #[test]
    fn rejects_container_id_with_bad_characters() {
        let payload = json!({ "containerId": "web 1; rm -rf" });
        assert!(extract_container_id(&payload).is_err());
    }

    #[test]
    fn falls_back_to_capitalized_container_id_field() {
        let payload = json!({ "ContainerId": "abc123" });
        assert_eq!(extract_container_id(&payload).unwrap(), "abc123");
    }

    #[tokio::test]
    async fn unknown_command_reports_failed_without_panicking() {
        let dispatcher = AgentDispatcher::new(None);
        let mut statuses = Vec::new();
        let id = Uuid::new_v4();
        dispatcher.dispatch(id, "nonsense.command", "", &mut |s| statuses.push(s)).await;
        assert_eq!(statuses.last().unwrap().phase, StatusPhase::Failed);
    }

    #[tokio::test]
    async fn script_run_reports_success_with_exit_code() {
        let dispatcher = AgentDispatcher::new(None);
        let mut statuses = Vec::new();
        let id = Uuid::new_v4();
        let payload = json!({ "shell": "bash", "content": "echo from-dispatch" }).to_string();
        dispatcher.dispatch(id, "script.run", &payload, &mut |s| statuses.push(s)).await;
        let last = statuses.last().unwrap();
        assert_eq!(last.phase, StatusPhase::Success);
        assert!(statuses.iter().any(|s| s.message.contains("from-dispatch")));
    }

    #[tokio::test]
    async fn script_run_rejects_missing_content() {
        let dispatcher = AgentDispatcher::new(None);
        let mut statuses = Vec::new();
        let id = Uuid::new_v4();
        dispatcher.dispatch(id, "script.run", "{}", &mut |s| statuses.push(s)).await;
        assert_eq!(statuses.last().unwrap().phase, StatusPhase::Failed);
    }

    #[tokio::test]
    async fn oversized_payload_fails_fast() {
        let dispatcher = AgentDispatcher::new(None);
        let huge = "a".repeat(MAX_PAYLOAD_BYTES + 1);
        let mut statuses = Vec::new();
        let id = Uuid::new_v4();
        dispatcher.dispatch(id, "docker.list", &huge, &mut |s| statuses.push(s)).await;
        assert_eq!(statuses.last().unwrap().phase, StatusPhase::Failed);
    }
}
