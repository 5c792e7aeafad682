//! VLAN deployment and spanning-tree mode on leaves.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{expect_host, json_field, Check, CheckContext, CheckError, CheckParam, Outcome};
use crate::config::ChecksConfig;
use crate::intent::structured::intended_vlans;
use crate::intent::vlan_range;
use crate::inventory::scalar_to_string;
use crate::matrix::{Fixture, Target};

const MODULE: &str = "vlans";
const SHOW_VLAN: &str = "show vlan | json";
const SHOW_RUN_STP: &str = "show run | include spanning-tree";

pub fn checks(settings: &ChecksConfig) -> Vec<Arc<dyn Check>> {
    vec![
        Arc::new(VlansMatchIntent),
        Arc::new(RequiredVlansExist {
            vlans: settings.required_vlans.clone(),
        }),
        Arc::new(SpanningTreeMode),
    ]
}

/// VLAN ids present in `show vlan | json`
pub fn device_vlans(output: &Value) -> Result<Vec<String>, CheckError> {
    let vlans = json_field(output, &["vlans"], SHOW_VLAN)?;
    Ok(vlans
        .as_object()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default())
}

fn as_ids(vlans: &[String]) -> BTreeSet<u16> {
    vlans.iter().filter_map(|v| v.trim().parse().ok()).collect()
}

/// Every intended VLAN is deployed
pub struct VlansMatchIntent;

#[async_trait]
impl Check for VlansMatchIntent {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "vlans_match_intent"
    }

    fn fixture(&self) -> Fixture {
        Fixture::Leaf
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        _param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let host = expect_host(target)?;
        let intended = intended_vlans(ctx.host_intent(&host.name)?);
        if intended.is_empty() {
            return Ok(Outcome::Skipped("No vlans in intent".into()));
        }

        let mut device = ctx.host(&host.name).await?;
        let output = ctx.send_json(&mut device, SHOW_VLAN).await?;
        let found = device_vlans(&output)?;

        let found_ids = as_ids(&found);
        let missing: Vec<String> = as_ids(&intended)
            .difference(&found_ids)
            .map(u16::to_string)
            .collect();

        Ok(Outcome::check(missing.is_empty(), || {
            format!(
                "expected: {}. Found: {}. Diff: {}",
                vlan_range(&intended),
                vlan_range(&found),
                vlan_range(&missing)
            )
        }))
    }
}

/// Each VLAN listed under `[checks] required_vlans` exists
pub struct RequiredVlansExist {
    vlans: Vec<u16>,
}

#[async_trait]
impl Check for RequiredVlansExist {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "required_vlan_exists"
    }

    fn fixture(&self) -> Fixture {
        Fixture::Leaf
    }

    fn params(&self) -> Vec<CheckParam> {
        self.vlans
            .iter()
            .map(|vlan| CheckParam::new(vlan.to_string(), [vlan.to_string()]))
            .collect()
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let host = expect_host(target)?;
        let Some(vlan) = param.map(|p| p.arg(0)) else {
            return Ok(Outcome::Skipped("No required VLANs configured".into()));
        };

        let mut device = ctx.host(&host.name).await?;
        let output = ctx.send_json(&mut device, SHOW_VLAN).await?;
        let found = device_vlans(&output)?;

        Ok(Outcome::check(found.iter().any(|v| v == vlan), || {
            format!("VLAN {vlan} not found. Found: {}", vlan_range(&found))
        }))
    }
}

/// Spanning-tree runs in the intended mode
pub struct SpanningTreeMode;

#[async_trait]
impl Check for SpanningTreeMode {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "spanning_tree_mode"
    }

    fn fixture(&self) -> Fixture {
        Fixture::Leaf
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        _param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let host = expect_host(target)?;
        let mode = ctx
            .intent
            .try_get(&host.name)
            .and_then(|intent| intent.get("spanning_tree"))
            .and_then(|stp| stp.get("mode"))
            .and_then(scalar_to_string)
            .unwrap_or_else(|| ctx.settings.spanning_tree_mode.clone());

        let mut device = ctx.host(&host.name).await?;
        let output = ctx.send_text(&mut device, SHOW_RUN_STP).await?;
        let expected = format!("spanning-tree mode {mode}");

        Ok(Outcome::check(output.contains(&expected), || {
            format!("'{expected}' is not configured")
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_vlans() {
        let output = json!({"vlans": {"1": {"name": "default"}, "110": {"name": "Tenant"}}});
        let mut vlans = device_vlans(&output).unwrap();
        vlans.sort();
        assert_eq!(vlans, vec!["1", "110"]);
        assert!(device_vlans(&json!({})).is_err());
    }

    #[test]
    fn test_required_vlan_params() {
        let check = RequiredVlansExist {
            vlans: vec![110, 4094],
        };
        let ids: Vec<_> = check.params().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["110", "4094"]);
    }
}
