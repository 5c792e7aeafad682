//! Device state checks.
//!
//! Every check compares what a device reports with the intended design.
//! A check names the [`Fixture`] it runs against and, optionally, a list of
//! its own parameters; the matrix multiplies the two into cases.
//!
//! Checks return an [`Outcome`]. A `CheckError` means the check could not
//! be evaluated at all (session down, command output unusable) and is
//! reported as an error rather than a failure.

pub mod bgp;
pub mod links;
pub mod mlag;
pub mod ntp;
pub mod overlay;
pub mod reachability;
pub mod system;
pub mod vlans;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use crate::config::{ChecksConfig, DockerConfig};
use crate::dispatch::{CommandDispatcher, DispatchError};
use crate::host::{HostError, HostRegistry, ScopedSession, TestHost};
use crate::intent::{IntentError, StructuredConfigs};
use crate::matrix::{Fixture, Target};

/// Result of one case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed(String),
    Skipped(String),
    /// Expected failure: the check does not apply to this target
    #[serde(rename = "xfailed")]
    XFailed(String),
    Error(String),
}

impl Outcome {
    /// `Passed` when `condition` holds, else `Failed` with the message
    pub fn check(condition: bool, message: impl FnOnce() -> String) -> Self {
        if condition {
            Outcome::Passed
        } else {
            Outcome::Failed(message())
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed(_) => "failed",
            Outcome::Skipped(_) => "skipped",
            Outcome::XFailed(_) => "xfailed",
            Outcome::Error(_) => "error",
        }
    }

    /// Failed or errored
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_) | Outcome::Error(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed(m) | Outcome::Skipped(m) | Outcome::XFailed(m) | Outcome::Error(m) => {
                Some(m)
            }
        }
    }
}

/// Errors that prevent a check from being evaluated
#[derive(Error, Debug)]
pub enum CheckError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error("'{command}' output has no '{path}'")]
    MissingField { command: String, path: String },

    #[error("Check expects a {expected} target, got {found}")]
    UnexpectedTarget {
        expected: &'static str,
        found: String,
    },

    #[error("Docker error: {0}")]
    Docker(String),
}

impl CheckError {
    /// Missing intent is a failed case, everything else an error
    pub fn into_outcome(self) -> Outcome {
        match self {
            CheckError::Intent(e @ IntentError::MissingHost(_)) => Outcome::Failed(e.to_string()),
            other => Outcome::Error(other.to_string()),
        }
    }
}

/// Extra parameter of a parametrized check, e.g. `bgp` / `evpn`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckParam {
    /// Id appended to the case id
    pub id: String,
    pub args: Vec<String>,
}

impl CheckParam {
    pub fn new<I, S>(id: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Argument `index`, or an empty string
    pub fn arg(&self, index: usize) -> &str {
        self.args.get(index).map(String::as_str).unwrap_or_default()
    }
}

/// Everything a check may use while running
pub struct CheckContext<'a> {
    pub registry: &'a HostRegistry,
    pub dispatcher: &'a CommandDispatcher,
    pub intent: &'a StructuredConfigs,
    pub settings: &'a ChecksConfig,
    pub docker: &'a DockerConfig,
}

impl CheckContext<'_> {
    /// Session-scoped access to a connected host
    pub async fn host(&self, name: &str) -> Result<OwnedMutexGuard<TestHost>, CheckError> {
        Ok(self.registry.acquire(name).await?)
    }

    /// Connection for one scope, closed on release or drop
    pub async fn connection(&self, name: &str) -> Result<ScopedSession, CheckError> {
        Ok(self.registry.scoped(name).await?)
    }

    /// Intent of `host`, failing the case when there is none
    pub fn host_intent(&self, host: &str) -> Result<&serde_yaml::Value, CheckError> {
        Ok(self.intent.get(host)?)
    }

    /// Send a `| json` command through the dispatcher
    pub async fn send_json(&self, host: &mut TestHost, command: &str) -> Result<Value, CheckError> {
        let session = host.session_mut()?;
        Ok(self.dispatcher.send_json(session, command).await?)
    }

    /// Send a plain command through the dispatcher
    pub async fn send_text(&self, host: &mut TestHost, command: &str) -> Result<String, CheckError> {
        let session = host.session_mut()?;
        Ok(self.dispatcher.send_text(session, command).await?)
    }
}

/// A device state check
#[async_trait]
pub trait Check: Send + Sync {
    /// Module the check belongs to, e.g. `bgp`
    fn module(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn fixture(&self) -> Fixture;

    /// Own parameters; empty for unparametrized checks
    fn params(&self) -> Vec<CheckParam> {
        Vec::new()
    }

    async fn run(
        &self,
        ctx: &CheckContext<'_>,
        target: &Target,
        param: Option<&CheckParam>,
    ) -> Result<Outcome, CheckError>;
}

/// Walk `path` through nested JSON objects
pub fn json_field<'v>(value: &'v Value, path: &[&str], command: &str) -> Result<&'v Value, CheckError> {
    path.iter()
        .try_fold(value, |current, key| current.get(key))
        .ok_or_else(|| CheckError::MissingField {
            command: command.to_string(),
            path: path.join("."),
        })
}

/// JSON scalar as a string without quotes
pub fn json_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn expect_host<'t>(target: &'t Target) -> Result<&'t crate::inventory::ResolvedHost, CheckError> {
    match target {
        Target::Host(host) => Ok(host),
        other => Err(unexpected("host", other)),
    }
}

pub(crate) fn expect_link<'t>(target: &'t Target) -> Result<&'t crate::intent::LinkRecord, CheckError> {
    match target {
        Target::Link(link) => Ok(link),
        other => Err(unexpected("link", other)),
    }
}

fn unexpected(expected: &'static str, found: &Target) -> CheckError {
    let found = match found {
        Target::Host(_) => "host",
        Target::Link(_) => "link",
        Target::Loopback(_) => "loopback",
        Target::Container { .. } => "container",
        Target::Missing { .. } => "missing",
    };
    CheckError::UnexpectedTarget {
        expected,
        found: found.to_string(),
    }
}

/// Every check, in run order
pub fn registry(settings: &ChecksConfig, docker: &DockerConfig) -> Vec<Arc<dyn Check>> {
    let mut checks: Vec<Arc<dyn Check>> = Vec::new();
    checks.extend(system::checks());
    checks.extend(ntp::checks());
    checks.extend(mlag::checks());
    checks.extend(bgp::checks());
    checks.extend(vlans::checks(settings));
    checks.extend(links::checks());
    checks.extend(reachability::checks());
    checks.extend(overlay::checks(docker));
    checks
}
