//! Thin Docker wrapper used by the `docker.*` dispatcher commands.

use bollard::query_parameters::{ListContainersOptions, RestartContainerOptions, StopContainerOptions};
use bollard::Docker;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
    pub status: String,
    pub created: i64,
}

#[derive(Debug, Clone)]
pub struct DockerGateway {
    client: Docker,
}

impl DockerGateway {
    pub fn connect(socket_path: &str) -> Result<Self, bollard::errors::Error> {
        let client = if socket_path.is_empty() {
            Docker::connect_with_local_defaults()?
        } else {
            let clean = socket_path.trim_start_matches("unix://");
            Docker::connect_with_socket(clean, 120, bollard::API_DEFAULT_VERSION)?
        };
        Ok(Self { client })
    }

    pub async fn list(&self) -> Result<Vec<ContainerSummary>, bollard::errors::Error> {
        let options = Some(ListContainersOptions { all: true, ..Default::default() });
        let containers = self.client.list_containers(options).await?;
        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: c.id.unwrap_or_default(),
                names: c.names.unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                state: c.state.map(|s| s.to_string()).unwrap_or_default(),
                status: c.status.unwrap_or_default(),
                created: c.created.unwrap_or_default(),
            })
            .collect())
    }

    pub async fn start(&self, container_id: &str) -> Result<(), bollard::errors::Error> {
        self.client.start_container(container_id, None::<bollard::query_parameters::StartContainerOptions>).await
    }

    pub async fn stop(&self, container_id: &str) -> Result<(), bollard::errors::Error> {
        self.client.stop_container(container_id, None::<StopContainerOptions>).await
    }

    pub async fn restart(&self, container_id: &str) -> Result<(), bollard::errors::Error> {
        self.client.restart_container(container_id, None::<RestartContainerOptions>).await
    }
}
