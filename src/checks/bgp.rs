//! BGP configuration and session state on l3 hosts.
//!
//! Hosts without a `router_bgp` block in their intent are expected
//! failures: BGP simply is not part of their design.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use super::{
    expect_host, json_field, json_scalar, Check, CheckContext, CheckError, CheckParam, Outcome,
};
use crate::config::BgpPeerCheck;
use crate::intent::structured::{bgp_neighbors, evpn_peer_groups, router_bgp};
use crate::inventory::scalar_to_string;
use crate::matrix::{Fixture, Target};

const MODULE: &str = "bgp";
const SHOW_BGP_SUMMARY: &str = "show ip bgp summary";
const SHOW_BGP_SUMMARY_JSON: &str = "show ip bgp summary | json";
const SHOW_EVPN_SUMMARY_JSON: &str = "show bgp evpn summary | json";
const SHOW_ROUTE_SUMMARY: &str = "show ip route summary";
const ESTABLISHED: &str = "Established";

pub fn checks() -> Vec<Arc<dyn Check>> {
    vec![
        Arc::new(ExpectedAsnIsConfigured),
        Arc::new(MultiAgentIsConfigured),
        Arc::new(BgpEnabled),
        Arc::new(ExpectedPeersAreEstablished),
    ]
}

fn not_expected() -> Outcome {
    Outcome::XFailed("BGP is not expected on this device.".to_string())
}

/// `router_bgp` intent of `host`, `None` when BGP is not part of its design
fn bgp_intent<'c>(
    ctx: &'c CheckContext<'_>,
    host: &str,
) -> Result<Option<&'c serde_yaml::Value>, CheckError> {
    Ok(router_bgp(ctx.host_intent(host)?))
}

/// Configured ASN matches `router_bgp.as`
pub struct ExpectedAsnIsConfigured;

#[async_trait]
impl Check for ExpectedAsnIsConfigured {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "expected_asn_is_configured"
    }

    fn fixture(&self) -> Fixture {
        Fixture::L3Host
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        _param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let host = expect_host(target)?;
        let Some(bgp) = bgp_intent(ctx, &host.name)? else {
            return Ok(not_expected());
        };
        let Some(expected) = bgp.get("as").and_then(scalar_to_string) else {
            return Ok(Outcome::Failed("Intent has no 'router_bgp.as'".into()));
        };

        let mut device = ctx.host(&host.name).await?;
        let output = ctx.send_json(&mut device, SHOW_BGP_SUMMARY_JSON).await?;
        let actual = json_scalar(json_field(
            &output,
            &["vrfs", "default", "asn"],
            SHOW_BGP_SUMMARY_JSON,
        )?);

        Ok(Outcome::check(actual == expected, || {
            format!("ASN: {actual} != {expected}")
        }))
    }
}

/// The routing protocol model is `multi-agent`
pub struct MultiAgentIsConfigured;

#[async_trait]
impl Check for MultiAgentIsConfigured {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "multi_agent_is_configured"
    }

    fn fixture(&self) -> Fixture {
        Fixture::L3Host
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        _param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let host = expect_host(target)?;
        if bgp_intent(ctx, &host.name)?.is_none() {
            return Ok(not_expected());
        }

        let mut device = ctx.host(&host.name).await?;
        let output = ctx.send_text(&mut device, SHOW_ROUTE_SUMMARY).await?;
        Ok(Outcome::check(output.contains("multi-agent"), || {
            "ArBGP multi-agent model is not configured".to_string()
        }))
    }
}

/// The BGP process is not disabled
pub struct BgpEnabled;

#[async_trait]
impl Check for BgpEnabled {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "bgp_enabled"
    }

    fn fixture(&self) -> Fixture {
        Fixture::L3Host
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        _param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let host = expect_host(target)?;
        if bgp_intent(ctx, &host.name)?.is_none() {
            return Ok(not_expected());
        }

        let mut device = ctx.host(&host.name).await?;
        let output = ctx.send_text(&mut device, SHOW_BGP_SUMMARY).await?;
        Ok(Outcome::check(!output.contains("BGP is disabled"), || {
            "BGP is disabled".to_string()
        }))
    }
}

/// Neighbors expected in one address family.
///
/// When `address_family_evpn` names peer groups, EVPN sessions are the
/// neighbors in those groups and the IPv4 table holds the rest; otherwise
/// every neighbor is expected in both.
pub fn expected_peers(router_bgp: &serde_yaml::Value, family: &str) -> Vec<String> {
    let evpn_groups = evpn_peer_groups(router_bgp);
    bgp_neighbors(router_bgp)
        .into_iter()
        .filter(|(_, group)| {
            if evpn_groups.is_empty() {
                return true;
            }
            let in_evpn = group.as_ref().is_some_and(|g| evpn_groups.contains(g));
            if family == "evpn" {
                in_evpn
            } else {
                !in_evpn
            }
        })
        .map(|(ip, _)| ip)
        .collect()
}

/// Peers of `expected` that are not `Established`, with their state
pub fn unestablished_peers(peers: &Value, expected: &[String]) -> Vec<(String, String)> {
    expected
        .iter()
        .filter_map(|neighbor| {
            let state = peers
                .get(neighbor)
                .and_then(|p| p.get("peerState"))
                .map(json_scalar);
            match state {
                Some(state) if state == ESTABLISHED => None,
                Some(state) => Some((neighbor.clone(), state)),
                None => Some((neighbor.clone(), "not configured".to_string())),
            }
        })
        .collect()
}

/// Every intended neighbor is `Established`, per address family
pub struct ExpectedPeersAreEstablished;

#[async_trait]
impl Check for ExpectedPeersAreEstablished {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "expected_peers_are_established"
    }

    fn fixture(&self) -> Fixture {
        Fixture::L3Host
    }

    fn params(&self) -> Vec<CheckParam> {
        vec![
            CheckParam::new("bgp", [SHOW_BGP_SUMMARY_JSON]),
            CheckParam::new("evpn", [SHOW_EVPN_SUMMARY_JSON]),
        ]
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let host = expect_host(target)?;
        let Some(bgp) = bgp_intent(ctx, &host.name)? else {
            return Ok(not_expected());
        };
        let (family, command) = match param {
            Some(p) => (p.id.as_str(), p.arg(0)),
            None => ("bgp", SHOW_BGP_SUMMARY_JSON),
        };

        let expected = expected_peers(bgp, family);
        if expected.is_empty() {
            return Ok(Outcome::Skipped(format!("No {family} neighbors in intent")));
        }

        let mut device = ctx.host(&host.name).await?;
        let output = ctx.send_json(&mut device, command).await?;
        let peers = json_field(&output, &["vrfs", "default", "peers"], command)?;
        let down = unestablished_peers(peers, &expected);
        if down.is_empty() {
            return Ok(Outcome::Passed);
        }

        let summary = down
            .iter()
            .map(|(peer, state)| format!("{peer} ({state})"))
            .collect::<Vec<_>>()
            .join(", ");
        match ctx.settings.bgp_peer_check {
            BgpPeerCheck::Strict => Ok(Outcome::Failed(format!(
                "Peers not established: {summary}"
            ))),
            BgpPeerCheck::Lenient => {
                warn!(host = %host.name, family, peers = %summary, "Peers not established");
                Ok(Outcome::Passed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn intent(text: &str) -> serde_yaml::Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_expected_peers_split_by_family() {
        let bgp = intent(
            r#"
neighbors:
  192.168.255.1: {peer_group: EVPN-OVERLAY-PEERS}
  172.31.255.0: {peer_group: IPv4-UNDERLAY-PEERS}
address_family_evpn:
  peer_groups:
    EVPN-OVERLAY-PEERS: {activate: true}
"#,
        );
        assert_eq!(expected_peers(&bgp, "bgp"), vec!["172.31.255.0"]);
        assert_eq!(expected_peers(&bgp, "evpn"), vec!["192.168.255.1"]);
    }

    #[test]
    fn test_all_peers_without_evpn_groups() {
        let bgp = intent("neighbors:\n  10.0.0.1: {}\n  10.0.0.3: {}\n");
        assert_eq!(expected_peers(&bgp, "evpn").len(), 2);
        assert_eq!(expected_peers(&bgp, "bgp").len(), 2);
    }

    #[test]
    fn test_unestablished_peers() {
        let peers = json!({
            "10.0.0.1": {"peerState": "Established"},
            "10.0.0.3": {"peerState": "Active"},
        });
        let expected = vec!["10.0.0.1".to_string(), "10.0.0.3".to_string(), "10.0.0.5".to_string()];
        assert_eq!(
            unestablished_peers(&peers, &expected),
            vec![
                ("10.0.0.3".to_string(), "Active".to_string()),
                ("10.0.0.5".to_string(), "not configured".to_string()),
            ]
        );
    }
}
