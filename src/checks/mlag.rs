//! MLAG state and configuration on leaf pairs.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{expect_host, json_field, json_scalar, Check, CheckContext, CheckError, CheckParam, Outcome};
use crate::inventory::scalar_to_string;
use crate::matrix::{Fixture, Target};

const MODULE: &str = "mlag";
const SHOW_MLAG: &str = "show mlag detail | json";

/// `show mlag detail` key and the `mlag_configuration` intent key it must match
const CONFIG_FIELDS: [(&str, &str); 6] = [
    ("domainId", "domain_id"),
    ("localInterface", "local_interface"),
    ("peerLink", "peer_link"),
    ("peerAddress", "peer_address"),
    ("reloadDelay", "reload_delay_mlag"),
    ("reloadDelayNonMlag", "reload_delay_non_mlag"),
];

pub fn checks() -> Vec<Arc<dyn Check>> {
    vec![
        Arc::new(MlagStateAndStatus),
        Arc::new(MlagConfigurationMatchesIntent),
    ]
}

/// MLAG is active and its peer negotiation connected
pub struct MlagStateAndStatus;

#[async_trait]
impl Check for MlagStateAndStatus {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "mlag_state_and_status"
    }

    fn fixture(&self) -> Fixture {
        Fixture::Leaf
    }

    fn params(&self) -> Vec<CheckParam> {
        vec![
            CheckParam::new("state-active", ["state", "active"]),
            CheckParam::new("negStatus-connected", ["negStatus", "connected"]),
        ]
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let host = expect_host(target)?;
        let (key, expected) = match param {
            Some(p) => (p.arg(0), p.arg(1)),
            None => ("state", "active"),
        };

        let mut device = ctx.host(&host.name).await?;
        let output = ctx.send_json(&mut device, SHOW_MLAG).await?;
        let actual = json_scalar(json_field(&output, &[key], SHOW_MLAG)?);

        Ok(Outcome::check(actual == expected, || {
            format!("Expected '{key}' == '{expected}', found '{actual}'")
        }))
    }
}

/// Fields of `show mlag detail` that differ from `mlag_configuration`
pub fn config_mismatches(output: &Value, intent: &serde_yaml::Value) -> Vec<String> {
    CONFIG_FIELDS
        .iter()
        .filter_map(|(device_key, intent_key)| {
            let expected = intent.get(*intent_key).and_then(scalar_to_string)?;
            let actual = output.get(*device_key).map(json_scalar);
            match actual {
                Some(actual) if actual == expected => None,
                Some(actual) => Some(format!("{device_key}: {actual} != {expected}")),
                None => Some(format!("{device_key}: missing != {expected}")),
            }
        })
        .collect()
}

/// MLAG configuration matches `mlag_configuration` intent
pub struct MlagConfigurationMatchesIntent;

#[async_trait]
impl Check for MlagConfigurationMatchesIntent {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "mlag_configuration_matches_intent"
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
        let intent = ctx.host_intent(&host.name)?;
        let Some(mlag) = intent.get("mlag_configuration").filter(|v| !v.is_null()) else {
            return Ok(Outcome::Skipped("No mlag_configuration in intent".into()));
        };

        let mut device = ctx.host(&host.name).await?;
        let output = ctx.send_json(&mut device, SHOW_MLAG).await?;
        let mismatches = config_mismatches(&output, mlag);

        Ok(Outcome::check(mismatches.is_empty(), || {
            format!("MLAG configuration differs: {}", mismatches.join("; "))
        }))
    }
}
