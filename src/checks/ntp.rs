//! NTP synchronisation.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{expect_host, json_scalar, Check, CheckContext, CheckError, CheckParam, Outcome};
use crate::matrix::{Fixture, Target};

const SHOW_NTP: &str = "show ntp status | json";

pub fn checks() -> Vec<Arc<dyn Check>> {
    vec![Arc::new(NtpIsSynchronised)]
}

/// `status` of `show ntp status | json`; older releases nest it under `json`
pub fn ntp_status(output: &Value) -> Option<String> {
    output
        .get("status")
        .or_else(|| output.get("json").and_then(|j| j.get("status")))
        .map(json_scalar)
}

pub struct NtpIsSynchronised;

#[async_trait]
impl Check for NtpIsSynchronised {
    fn module(&self) -> &'static str {
        "ntp"
    }

    fn name(&self) -> &'static str {
        "ntp_is_synchronised"
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
        let output = ctx.send_json(&mut device, SHOW_NTP).await?;
        let status = ntp_status(&output).ok_or_else(|| CheckError::MissingField {
            command: SHOW_NTP.to_string(),
            path: "status".to_string(),
        })?;

        Ok(Outcome::check(status == "synchronised", || {
            "NTP is not synchronised".to_string()
        }))
    }
}
