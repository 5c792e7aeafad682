//! Device identity: hostname, software version and hardware model.

use async_trait::async_trait;
use std::sync::Arc;

use super::{expect_host, json_field, json_scalar, Check, CheckContext, CheckError, CheckParam, Outcome};
use crate::matrix::{Fixture, Target};

const MODULE: &str = "system";
const SHOW_VERSION: &str = "show version | json";

pub fn checks() -> Vec<Arc<dyn Check>> {
    vec![
        Arc::new(HostnameMatchesIntended),
        Arc::new(SoftwareVersion),
        Arc::new(DeviceModelIsCorrect),
        Arc::new(ModelIsVirtual),
    ]
}

/// Strip separators and case so `cEOS-Lab`, `ceos_lab` and `ceoslab` compare equal
pub fn normalize_model(model: &str) -> String {
    model.to_lowercase().replace(['-', '_'], "")
}

/// The prompt hostname is the inventory name
pub struct HostnameMatchesIntended;

#[async_trait]
impl Check for HostnameMatchesIntended {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "hostname_matches_intended"
    }

    fn fixture(&self) -> Fixture {
        Fixture::Host
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        _param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let host = expect_host(target)?;
        let mut device = ctx.host(&host.name).await?;
        let hostname = device.prompt_hostname().await?;

        Ok(Outcome::check(hostname == host.name, || {
            format!("Hostname: {hostname} != {}", host.name)
        }))
    }
}

/// The running version contains the `version` host variable
pub struct SoftwareVersion;

#[async_trait]
impl Check for SoftwareVersion {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "software_version"
    }

    fn fixture(&self) -> Fixture {
        Fixture::Host
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        _param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let host = expect_host(target)?;
        let Some(expected) = host.vars.version() else {
            return Ok(Outcome::Skipped("No 'version' variable for this host".into()));
        };

        let mut device = ctx.host(&host.name).await?;
        let output = ctx.send_json(&mut device, SHOW_VERSION).await?;
        let running = json_scalar(json_field(&output, &["version"], SHOW_VERSION)?);

        Ok(Outcome::check(running.contains(&expected), || {
            format!("Version: {running} does not contain {expected}")
        }))
    }
}

/// `modelName` matches `<type>.defaults.platform`
pub struct DeviceModelIsCorrect;

#[async_trait]
impl Check for DeviceModelIsCorrect {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "device_model_is_correct"
    }

    fn fixture(&self) -> Fixture {
        Fixture::Host
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        _param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let host = expect_host(target)?;
        let Some(platform) = host.vars.expected_platform() else {
            return Ok(Outcome::Skipped(
                "No '<type>.defaults.platform' variable for this host".into(),
            ));
        };

        let mut device = ctx.host(&host.name).await?;
        let output = ctx.send_json(&mut device, SHOW_VERSION).await?;
        let model = json_scalar(json_field(&output, &["modelName"], SHOW_VERSION)?);

        Ok(Outcome::check(
            model.to_lowercase() == normalize_model(&platform),
            || format!("Model: {model} != {platform}"),
        ))
    }
}

/// `modelName` is the configured virtual model
pub struct ModelIsVirtual;

#[async_trait]
impl Check for ModelIsVirtual {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn name(&self) -> &'static str {
        "model_is_virtual"
    }

    fn fixture(&self) -> Fixture {
        Fixture::Host
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        _param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError> {
        let host = expect_host(target)?;
        let mut device = ctx.host(&host.name).await?;
        let output = ctx.send_json(&mut device, SHOW_VERSION).await?;
        let model = json_scalar(json_field(&output, &["modelName"], SHOW_VERSION)?);
        let expected = &ctx.settings.expected_model;

        Ok(Outcome::check(&model == expected, || {
            format!("Model: {model} != {expected}")
        }))
    }
}
