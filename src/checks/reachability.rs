//! Data-plane reachability over p2p links and between loopbacks.

use async_trait::async_trait;
use std::sync::Arc;

use super::{expect_link, unexpected, Check, CheckContext, CheckError, CheckParam, Outcome};
use crate::matrix::{Fixture, Target};

const MODULE: &str = "reachability";
const PING_RECEIVED: &str = "1 received";

pub fn checks() -> Vec<Arc<dyn Check>> {
    vec![Arc::new(P2pNeighborIsReachable), Arc::new(LoopbackIsReachable)]
}

/// EOS ping command, one probe
pub fn ping_command(ip: &str, source: Option<&str>) -> String {
    let ip = ip.split('/').next().unwrap_or(ip);
    match source {
        Some(source) => format!("ping {ip} source {source} repeat 1"),
        None => format!("ping {ip} repeat 1"),
    }
}

/// The peer end of every p2p link answers a ping
pub struct P2pNeighborIsReachable;

#[async_trait]
impl Check for P2pNeighborIsReachable {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "p2p_neighbor_is_reachable"
    }

    fn fixture(&self) -> Fixture {
        Fixture::P2pLink
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        _param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let link = expect_link(target)?;
        let Some(peer_ip) = &link.peer_ip else {
            return Ok(Outcome::Failed(format!(
                "No intended address for {}-{}",
                link.peer_node, link.peer_interface
            )));
        };

        let command = ping_command(peer_ip, None);
        let mut conn = ctx.connection(&link.node).await?;
        let output = ctx.send_text(&mut conn, &command).await;
        conn.release().await?;

        let output = output?;
        Ok(Outcome::check(output.contains(PING_RECEIVED), || {
            format!("{} cannot reach {peer_ip}", link.node)
        }))
    }
}

/// Every other l3 host reaches the loopback, sourcing from its own
pub struct LoopbackIsReachable;

#[async_trait]
impl Check for LoopbackIsReachable {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "loopback_is_reachable"
    }

    fn fixture(&self) -> Fixture {
        Fixture::Loopback
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        _param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let loopback = match target {
            Target::Loopback(loopback) => loopback,
            other => return Err(unexpected("loopback", other)),
        };
        let Some(ip) = &loopback.ip else {
            return Ok(Outcome::Failed(format!(
                "{} has no address on {}",
                loopback.host, loopback.interface
            )));
        };

        let sources: Vec<_> = ctx
            .intent
            .loopbacks()
            .into_iter()
            .filter(|lo| {
                lo.host != loopback.host
                    && lo.ip.is_some()
                    && ctx.registry.contains(&lo.host)
                    && Fixture::L3Host.accepts_role(ctx.registry.role(&lo.host))
            })
            .collect();
        if sources.is_empty() {
            return Ok(Outcome::Skipped(format!("No other l3 host to ping {ip} from")));
        }

        let mut unreachable = Vec::new();
        for source in &sources {
            let command = ping_command(ip, source.ip.as_deref());
            let mut device = ctx.host(&source.host).await?;
            let output = ctx.send_text(&mut device, &command).await?;
            if !output.contains(PING_RECEIVED) {
                unreachable.push(source.host.as_str());
            }
        }

        Ok(Outcome::check(unreachable.is_empty(), || {
            format!("{ip} is not reachable from: {}", unreachable.join(", "))
        }))
    }
}
