//! Overlay reachability from client containers.

use async_trait::async_trait;
use std::sync::Arc;

use super::{unexpected, Check, CheckContext, CheckError, CheckParam, Outcome};
use crate::config::DockerConfig;
use crate::matrix::{Fixture, Target};

#[cfg_attr(not(feature = "docker"), allow(dead_code))]
const PING_RECEIVED: &str = "1 packets received";

pub fn checks(docker: &DockerConfig) -> Vec<Arc<dyn Check>> {
    vec![Arc::new(ClientsCanPing {
        targets: docker.targets.clone(),
    })]
}

/// Linux ping command, one probe with a two second deadline
pub fn ping_args(ip: &str) -> [&str; 6] {
    ["ping", ip, "-c", "1", "-w", "2"]
}

/// Every client container reaches every configured target
pub struct ClientsCanPing {
    targets: Vec<String>,
}

#[async_trait]
impl Check for ClientsCanPing {
    fn module(&self) -> &'static str {
        "overlay"
    }

    fn name(&self) -> &'static str {
        "clients_can_ping"
    }

    fn fixture(&self) -> Fixture {
        Fixture::DockerClient
    }

    fn params(&self) -> Vec<CheckParam> {
        self.targets
            .iter()
            .map(|ip| CheckParam::new(ip.clone(), [ip.clone()]))
            .collect()
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let name = match target {
            Target::Container { name } => name,
            other => return Err(unexpected("container", other)),
        };
        let Some(ip) = param.map(|p| p.arg(0)) else {
            return Ok(Outcome::Skipped("No overlay targets configured".into()));
        };
        ping_from(ctx, name, ip).await
    }
}

#[cfg(feature = "docker")]
async fn ping_from(ctx: &CheckContext<'_>, name: &str, ip: &str) -> Result<Outcome, CheckError> {
    use crate::docker::DockerContainer;

    let docker = |e: crate::docker::DockerError| CheckError::Docker(e.to_string());
    let container = DockerContainer::open(name, ctx.docker.image.as_deref())
        .await
        .map_err(docker)?;
    let output = container.exec(&ping_args(ip)).await;
    container.close().await.map_err(docker)?;

    let output = output.map_err(docker)?;
    Ok(Outcome::check(output.contains(PING_RECEIVED), || {
        format!("{name} cannot reach {ip}")
    }))
}

#[cfg(not(feature = "docker"))]
async fn ping_from(_ctx: &CheckContext<'_>, _name: &str, _ip: &str) -> Result<Outcome, CheckError> {
    Ok(Outcome::Skipped("requires docker".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_follow_targets() {
        let checks = checks(&DockerConfig {
            targets: vec!["10.1.10.11".into(), "10.1.20.21".into()],
            ..Default::default()
        });
        let ids: Vec<_> = checks[0].params().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["10.1.10.11", "10.1.20.21"]);
    }

    #[test]
    fn test_ping_args() {
        assert_eq!(ping_args("10.1.10.11").join(" "), "ping 10.1.10.11 -c 1 -w 2");
    }
}
