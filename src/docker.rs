//! Client containers on the overlay network.
//!
//! A [`DockerContainer`] wraps a running container. It is attached by name,
//! or, when that name does not exist and an image is configured, started
//! from the image and removed again on [`DockerContainer::close`].

use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, InspectContainerOptions,
    RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::Docker;
use futures::StreamExt;
use thiserror::Error;
use tracing::debug;

/// Errors talking to the Docker daemon
#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Failed to connect to Docker: {0}")]
    Connect(#[source] bollard::errors::Error),

    #[error("Container {0} not found")]
    NotFound(String),

    #[error("Container {container}: {source}")]
    Api {
        container: String,
        #[source]
        source: bollard::errors::Error,
    },
}

/// A running container commands can be executed in
pub struct DockerContainer {
    docker: Docker,
    name: String,
    /// Started by us, removed on close
    owned: bool,
}

impl DockerContainer {
    /// Attach to `name`, or run it from `image` when it does not exist
    pub async fn open(name: &str, image: Option<&str>) -> Result<Self, DockerError> {
        let docker = Docker::connect_with_local_defaults().map_err(DockerError::Connect)?;

        match docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(_) => {
                debug!(container = name, "Attached to client container");
                Ok(Self {
                    docker,
                    name: name.to_string(),
                    owned: false,
                })
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => match image {
                Some(image) => Self::run(docker, name, image).await,
                None => Err(DockerError::NotFound(name.to_string())),
            },
            Err(source) => Err(DockerError::Api {
                container: name.to_string(),
                source,
            }),
        }
    }

    async fn run(docker: Docker, name: &str, image: &str) -> Result<Self, DockerError> {
        let api = |source| DockerError::Api {
            container: name.to_string(),
            source,
        };

        let options = CreateContainerOptions {
            name,
            platform: None,
        };
        let config = ContainerConfig {
            image: Some(image),
            cmd: Some(vec!["sleep", "infinity"]),
            ..Default::default()
        };
        docker
            .create_container(Some(options), config)
            .await
            .map_err(api)?;
        docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(api)?;

        debug!(container = name, image, "Started client container");
        Ok(Self {
            docker,
            name: name.to_string(),
            owned: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `cmd` in the container and collect stdout and stderr
    pub async fn exec(&self, cmd: &[&str]) -> Result<String, DockerError> {
        let api = |source| DockerError::Api {
            container: self.name.clone(),
            source,
        };

        let exec = self
            .docker
            .create_exec(
                &self.name,
                CreateExecOptions {
                    cmd: Some(cmd.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(api)?;

        let mut collected = String::new();
        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(&exec.id, None).await.map_err(api)?
        {
            while let Some(chunk) = output.next().await {
                collected.push_str(&chunk.map_err(api)?.to_string());
            }
        }
        Ok(collected)
    }

    /// Remove the container if it was started by [`DockerContainer::open`]
    pub async fn close(self) -> Result<(), DockerError> {
        if !self.owned {
            return Ok(());
        }
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(&self.name, Some(options))
            .await
            .map_err(|source| DockerError::Api {
                container: self.name.clone(),
                source,
            })
    }
}

impl std::fmt::Debug for DockerContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerContainer")
            .field("name", &self.name)
            .field("owned", &self.owned)
            .finish()
    }
}
