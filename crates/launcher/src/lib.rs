//! Container task launcher backed by the local Docker daemon.
//!
//! Each [`intake::LaunchRequest`] becomes one detached container running the
//! configured task image. The request's environment overrides become the
//! container's environment and its tags become container labels, so a
//! running task can be found by `JiraStoryId` with `docker ps --filter`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Implements [`intake::TaskLauncher`].

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{Config, CreateContainerOptions, StartContainerOptions};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::TryStreamExt;
use intake::dispatch::TAG_JIRA_STORY_ID;
use intake::{LaunchReceipt, LaunchRequest, TaskLaunchError, TaskLauncher};
use tracing::{info, instrument};

/// Message carried by every launch failure.
pub const LAUNCH_FAILED: &str = "Failed to start container task";

/// Default prefix for container names.
pub const DEFAULT_CONTAINER_PREFIX: &str = "jira-task";

/// Label marking containers started by this launcher.
const MANAGED_BY_LABEL: &str = "managed_by";
const MANAGED_BY_VALUE: &str = "jira-intake";

/// Which image to run and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    pub image: String,
    /// Docker network to attach the container to; the daemon default when `None`.
    pub network: Option<String>,
    pub container_prefix: String,
    /// Pull the image before each launch if it is missing locally.
    pub pull_image: bool,
}

impl LauncherConfig {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            network: None,
            container_prefix: DEFAULT_CONTAINER_PREFIX.to_string(),
            pull_image: false,
        }
    }
}

/// Everything needed to create one task container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// `KEY=VALUE` pairs.
    pub env: Vec<String>,
    pub labels: HashMap<String, String>,
    pub network: Option<String>,
}

impl ContainerSpec {
    /// Builds the container for `request` under `config`.
    pub fn for_request(config: &LauncherConfig, request: &LaunchRequest) -> Self {
        let story = request
            .tags
            .get(TAG_JIRA_STORY_ID)
            .map(|id| sanitize_name(id))
            .unwrap_or_else(|| "task".to_string());
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("{}-{}-{}", config.container_prefix, story, &suffix[..8]);

        let env = request
            .env
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();

        let mut labels: HashMap<String, String> = request
            .tags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());

        Self {
            name,
            image: config.image.clone(),
            env,
            labels,
            network: config.network.clone(),
        }
    }

    fn into_config(self) -> Config<String> {
        Config {
            image: Some(self.image),
            env: Some(self.env),
            labels: Some(self.labels),
            host_config: Some(HostConfig {
                auto_remove: Some(true),
                network_mode: self.network,
                ..Default::default()
            }),
            tty: Some(false),
            ..Default::default()
        }
    }
}

/// Docker container names allow `[a-zA-Z0-9_.-]`.
fn sanitize_name(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// [`TaskLauncher`] that starts detached Docker containers.
pub struct DockerTaskLauncher {
    docker: Docker,
    config: LauncherConfig,
}

impl DockerTaskLauncher {
    /// Connects to the local daemon using the platform defaults (`DOCKER_HOST`
    /// or the local socket).
    ///
    /// The daemon is not contacted until the first launch.
    pub fn connect(config: LauncherConfig) -> Result<Self, bollard::errors::Error> {
        Ok(Self::new(Docker::connect_with_local_defaults()?, config))
    }

    pub fn new(docker: Docker, config: LauncherConfig) -> Self {
        Self { docker, config }
    }

    async fn ensure_image(&self) -> Result<(), bollard::errors::Error> {
        let image = &self.config.image;
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }
        info!(image = %image, "Pulling task image");
        let mut stream = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: image.clone(),
                ..Default::default()
            }),
            None,
            None,
        );
        while stream.try_next().await?.is_some() {}
        Ok(())
    }

    async fn start(&self, spec: ContainerSpec) -> Result<String, bollard::errors::Error> {
        if self.config.pull_image {
            self.ensure_image().await?;
        }
        let name = spec.name.clone();
        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.as_str(),
                    platform: None,
                }),
                spec.into_config(),
            )
            .await?;
        self.docker
            .start_container(&name, None::<StartContainerOptions<String>>)
            .await?;
        Ok(created.id)
    }
}

#[async_trait]
impl TaskLauncher for DockerTaskLauncher {
    #[instrument(name = "launch_task", skip_all, fields(container = tracing::field::Empty))]
    async fn launch(&self, request: LaunchRequest) -> Result<LaunchReceipt, TaskLaunchError> {
        let spec = ContainerSpec::for_request(&self.config, &request);
        tracing::Span::current().record("container", spec.name.as_str());
        let name = spec.name.clone();

        let task_id = self
            .start(spec)
            .await
            .map_err(|e| TaskLaunchError::new(LAUNCH_FAILED, e.to_string()))?;

        info!(container = %name, task_id = %task_id, "Container task started");
        Ok(LaunchReceipt { task_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn request(story_id: &str) -> LaunchRequest {
        LaunchRequest {
            env: BTreeMap::from([
                ("GITHUB_LINK".to_string(), "https://github.com/org/repo".to_string()),
                ("JIRA_STORY_ID".to_string(), story_id.to_string()),
                ("TASK_TYPE".to_string(), "long_running_task".to_string()),
            ]),
            tags: BTreeMap::from([
                ("JiraStoryId".to_string(), story_id.to_string()),
                ("TaskType".to_string(), "long_running_task".to_string()),
            ]),
        }
    }

    #[test]
    fn env_overrides_become_key_value_pairs() {
        let spec = ContainerSpec::for_request(&LauncherConfig::new("worker:1"), &request("10042"));

        assert_eq!(
            spec.env,
            vec![
                "GITHUB_LINK=https://github.com/org/repo",
                "JIRA_STORY_ID=10042",
                "TASK_TYPE=long_running_task",
            ]
        );
        assert_eq!(spec.image, "worker:1");
    }

    #[test]
    fn tags_become_labels() {
        let spec = ContainerSpec::for_request(&LauncherConfig::new("worker"), &request("10042"));

        assert_eq!(spec.labels.get("JiraStoryId").map(String::as_str), Some("10042"));
        assert_eq!(
            spec.labels.get("TaskType").map(String::as_str),
            Some("long_running_task")
        );
        assert_eq!(
            spec.labels.get(MANAGED_BY_LABEL).map(String::as_str),
            Some(MANAGED_BY_VALUE)
        );
    }

    #[test]
    fn container_names_are_unique_per_launch() {
        let config = LauncherConfig::new("worker");
        let a = ContainerSpec::for_request(&config, &request("10042"));
        let b = ContainerSpec::for_request(&config, &request("10042"));

        assert!(a.name.starts_with("jira-task-10042-"));
        assert_eq!(a.name.len(), "jira-task-10042-".len() + 8);
        assert_ne!(a.name, b.name);
    }

    #[test]
    fn story_ids_are_sanitised_into_the_name() {
        let config = LauncherConfig {
            container_prefix: "nemo".to_string(),
            ..LauncherConfig::new("worker")
        };
        let spec = ContainerSpec::for_request(&config, &request("a b/c"));
        assert!(spec.name.starts_with("nemo-a-b-c-"));
    }

    #[test]
    fn network_is_passed_to_the_host_config() {
        let config = LauncherConfig {
            network: Some("tasks".to_string()),
            ..LauncherConfig::new("worker")
        };
        let docker_config = ContainerSpec::for_request(&config, &request("1")).into_config();
        let host = docker_config.host_config.unwrap();

        assert_eq!(host.network_mode.as_deref(), Some("tasks"));
        assert_eq!(host.auto_remove, Some(true));
    }

    #[test]
    fn missing_story_tag_falls_back_to_a_generic_name() {
        let spec =
            ContainerSpec::for_request(&LauncherConfig::new("worker"), &LaunchRequest::default());
        assert!(spec.name.starts_with("jira-task-task-"));
        assert!(spec.env.is_empty());
    }
}
