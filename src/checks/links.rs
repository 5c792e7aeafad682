//! Physical links from the fabric documentation tables.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{expect_link, json_field, json_scalar, Check, CheckContext, CheckError, CheckParam, Outcome};
use crate::matrix::{Fixture, Target};

const MODULE: &str = "links";
const SHOW_INTERFACES: &str = "show interfaces | json";
const SHOW_LLDP: &str = "show lldp neighbors | json";
const SHOW_IP_INTERFACE: &str = "show ip interface | json";

pub fn checks() -> Vec<Arc<dyn Check>> {
    vec![
        Arc::new(LinkIsConnected),
        Arc::new(LldpNeighborsMatchIntent),
        Arc::new(P2pLinksHaveCorrectIps),
    ]
}

/// Every topology link is up
pub struct LinkIsConnected;

#[async_trait]
impl Check for LinkIsConnected {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "every_link_in_topology_is_connected"
    }

    fn fixture(&self) -> Fixture {
        Fixture::Topology
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        _param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let link = expect_link(target)?;
        let mut conn = ctx.connection(&link.node).await?;
        let output = ctx.send_json(&mut conn, SHOW_INTERFACES).await;
        conn.release().await?;

        let output = output?;
        let status = json_scalar(json_field(
            &output,
            &["interfaces", link.node_interface.as_str(), "interfaceStatus"],
            SHOW_INTERFACES,
        )?);
        Ok(Outcome::check(status == "connected", || {
            format!("Link is not connected ({status})")
        }))
    }
}

/// `(neighbor device, neighbor port)` pairs seen on `interface`; device
/// names are cut at the first dot so FQDNs match inventory names
pub fn lldp_neighbors_on(output: &Value, interface: &str) -> Result<Vec<(String, String)>, CheckError> {
    let neighbors = json_field(output, &["lldpNeighbors"], SHOW_LLDP)?;
    Ok(neighbors
        .as_array()
        .map(|list| {
            list.iter()
                .filter(|n| n.get("port").and_then(Value::as_str) == Some(interface))
                .filter_map(|n| {
                    let device = n.get("neighborDevice").and_then(Value::as_str)?;
                    let port = n.get("neighborPort").and_then(Value::as_str)?;
                    let short = device.split('.').next().unwrap_or(device);
                    Some((short.to_string(), port.to_string()))
                })
                .collect()
        })
        .unwrap_or_default())
}

/// LLDP sees the intended peer on every topology link
pub struct LldpNeighborsMatchIntent;

#[async_trait]
impl Check for LldpNeighborsMatchIntent {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "lldp_neighbors_match_intent"
    }

    fn fixture(&self) -> Fixture {
        Fixture::Topology
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        _param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let link = expect_link(target)?;
        if let Some(peer_type) = &link.peer_type {
            if ctx.settings.lldp_ignore_peer_types.contains(peer_type) {
                return Ok(Outcome::Skipped(format!(
                    "LLDP is not checked on {peer_type} peers"
                )));
            }
        }

        let mut conn = ctx.connection(&link.node).await?;
        let output = ctx.send_json(&mut conn, SHOW_LLDP).await;
        conn.release().await?;

        let neighbors = lldp_neighbors_on(&output?, &link.node_interface)?;
        if neighbors.is_empty() {
            return Ok(Outcome::Failed(format!(
                "No neighbors found on: {}",
                link.node_interface
            )));
        }
        let expected = (link.peer_node.clone(), link.peer_interface.clone());
        Ok(Outcome::check(neighbors.contains(&expected), || {
            format!("Expected: {}, {}", link.peer_node, link.peer_interface)
        }))
    }
}

/// Primary address of `interface` in `show ip interface | json`
pub fn primary_address(output: &Value, interface: &str) -> Option<String> {
    output
        .get("interfaces")?
        .get(interface)?
        .get("interfaceAddress")?
        .get("primaryIp")?
        .get("address")
        .map(json_scalar)
}

/// Both ends of every p2p link carry their intended address
pub struct P2pLinksHaveCorrectIps;

#[async_trait]
impl Check for P2pLinksHaveCorrectIps {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "l3_p2p_links_have_correct_ips"
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
        let ends = [
            (&link.node, &link.node_interface, &link.node_ip),
            (&link.peer_node, &link.peer_interface, &link.peer_ip),
        ];

        for (node, interface, ip) in ends {
            let Some(ip) = ip else {
                return Ok(Outcome::Failed(format!(
                    "No intended address for {node}-{interface}"
                )));
            };

            let mut conn = ctx.connection(node).await?;
            let output = ctx.send_json(&mut conn, SHOW_IP_INTERFACE).await;
            conn.release().await?;
            let output = output?;

            if output
                .get("interfaces")
                .and_then(|i| i.get(interface.as_str()))
                .is_none()
            {
                return Ok(Outcome::Failed(format!("{node}-{interface} has no configured IP")));
            }

            let expected = ip.split('/').next().unwrap_or(ip);
            let actual = primary_address(&output, interface).unwrap_or_default();
            if actual != expected {
                return Ok(Outcome::Failed(format!(
                    "{node}-{interface}: {actual} != {expected}"
                )));
            }
        }

        Ok(Outcome::Passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lldp_neighbors_on() {
        let output = json!({"lldpNeighbors": [
            {"port": "Ethernet1", "neighborDevice": "spine1.lab.local", "neighborPort": "Ethernet1"},
            {"port": "Ethernet2", "neighborDevice": "spine2", "neighborPort": "Ethernet1"},
        ]});
        assert_eq!(
            lldp_neighbors_on(&output, "Ethernet1").unwrap(),
            vec![("spine1".to_string(), "Ethernet1".to_string())]
        );
        assert!(lldp_neighbors_on(&output, "Ethernet3").unwrap().is_empty());
    }

    #[test]
    fn test_primary_address() {
        let output = json!({"interfaces": {"Ethernet1": {
            "interfaceAddress": {"primaryIp": {"address": "172.31.255.1", "maskLen": 31}}
        }}});
        assert_eq!(primary_address(&output, "Ethernet1").as_deref(), Some("172.31.255.1"));
        assert_eq!(primary_address(&output, "Ethernet2"), None);
    }
}
