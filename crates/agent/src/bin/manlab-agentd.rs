//! Composition root standing in for the external command hub transport:
//! reads newline-delimited JSON `CommandEnvelope`s from stdin, dispatches
//! each through `AgentDispatcher`, and writes newline-delimited JSON
//! status frames to stdout.

use manlab_agent::{AgentConfig, AgentDispatcher, DockerGateway};
use serde::Deserialize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct CommandEnvelope {
    command_id: Uuid,
    command_type: String,
    #[serde(default)]
    payload: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "manlab_agentd=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::load()?;
    config.validate().map_err(|e| format!("invalid agent configuration: {e}"))?;

    tracing::info!(docker_socket = %config.docker_socket, "starting manlab-agentd");

    let docker = match DockerGateway::connect(&config.docker_socket) {
        Ok(gateway) => Some(gateway),
        Err(e) => {
            tracing::warn!(error = %e, "docker unavailable, docker.* commands will fail");
            None
        }
    };
    let dispatcher = AgentDispatcher::new(docker);

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let stdout = std::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let envelope: CommandEnvelope = match serde_json::from_str(&line) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed command envelope");
                continue;
            }
        };

        if envelope.payload.len() > config.max_command_payload_bytes {
            tracing::warn!(command_id = %envelope.command_id, "dropping oversized command payload");
            continue;
        }

        let mut out = stdout.lock();
        dispatcher
            .dispatch(envelope.command_id, &envelope.command_type, &envelope.payload, &mut |status| {
                if let Ok(line) = serde_json::to_string(&status) {
                    let _ = writeln!(out, "{line}");
                    let _ = out.flush();
                }
            })
            .await;
    }

    Ok(())
}
