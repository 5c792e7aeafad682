//! Everything that happens before the first device is contacted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::checks::{self, Check};
use crate::config::{Config, Defaults, InventoryBackend};
use crate::error::{Error, Result};
use crate::intent::{inventory_root, FabricDocs, StructuredConfigs};
use crate::inventory::{
    AnsibleInventoryCli, FileInventory, InventorySource, ResolvedHost, TestbedFile,
};
use crate::matrix::{self, Case, CaseFilter, MatrixInputs, Parametrization};

/// Selector used when none is configured
pub const DEFAULT_SELECTOR: &str = "all";

/// Inventory path used when none is configured
pub const DEFAULT_INVENTORY: &str = "inventory";

/// Pick the inventory adapter for the configured defaults.
///
/// A testbed file wins over the inventory path. A missing path is a
/// configuration error.
pub fn inventory_source(defaults: &Defaults) -> Result<Box<dyn InventorySource>> {
    if let Some(testbed) = &defaults.testbed {
        return Ok(Box::new(TestbedFile::open(testbed)?));
    }

    let path = inventory_path(defaults);
    if !path.exists() {
        return Err(Error::InventoryPathMissing(path));
    }
    match defaults.backend {
        InventoryBackend::Native => Ok(Box::new(FileInventory::open(&path)?)),
        InventoryBackend::Ansible => Ok(Box::new(AnsibleInventoryCli::new(
            defaults.ansible_inventory_program.clone(),
            &path,
        )?)),
    }
}

pub fn inventory_path(defaults: &Defaults) -> PathBuf {
    defaults
        .inventory
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_INVENTORY))
}

/// Directory `intended/` and `documentation/` are looked up in
pub fn intent_root(defaults: &Defaults) -> PathBuf {
    match (&defaults.inventory, &defaults.testbed) {
        (None, Some(testbed)) => inventory_root(testbed),
        _ => inventory_root(&inventory_path(defaults)),
    }
}

/// Resolved hosts, loaded intent and the collected cases of one run
pub struct RunPlan {
    /// Description of the inventory source
    pub source: String,
    pub hosts: Vec<ResolvedHost>,
    pub intent: StructuredConfigs,
    pub parametrizations: Vec<Parametrization>,
    pub cases: Vec<Case>,
}

impl RunPlan {
    /// Resolve the inventory, load intent and collect cases
    pub fn prepare(config: &Config, filter: &CaseFilter) -> Result<Self> {
        let source = inventory_source(&config.defaults)?;
        let root = intent_root(&config.defaults);
        let checks = checks::registry(&config.checks, &config.docker);
        Self::from_source(source.as_ref(), &root, config, &checks, filter)
    }

    /// Same as [`RunPlan::prepare`] with the source and checks supplied
    pub fn from_source(
        source: &dyn InventorySource,
        root: &Path,
        config: &Config,
        checks: &[Arc<dyn Check>],
        filter: &CaseFilter,
    ) -> Result<Self> {
        let selector = config
            .defaults
            .hosts
            .as_deref()
            .unwrap_or(DEFAULT_SELECTOR);
        let hosts = source.resolve(selector)?;
        info!(source = %source.describe(), selector, hosts = hosts.len(), "Inventory resolved");

        let intent = StructuredConfigs::load(root)?;
        let fabric = config.defaults.fabric.clone();
        let docs = FabricDocs::load(root, fabric.as_deref())?;
        debug!(
            intent_hosts = intent.len(),
            topology = docs.topology.is_some(),
            p2p = docs.p2p.is_some(),
            "Intent loaded"
        );

        let inputs = MatrixInputs {
            hosts,
            intent,
            fabric,
            docs,
            docker_clients: config.docker.clients.clone(),
        };
        let requested = matrix::requested_fixtures(checks, filter);
        let parametrizations = matrix::build(&inputs, &requested);
        let cases = matrix::collect(checks, &parametrizations, filter);
        info!(cases = cases.len(), "Cases collected");

        Ok(Self {
            source: source.describe(),
            hosts: inputs.hosts,
            intent: inputs.intent,
            parametrizations,
            cases,
        })
    }
}

impl std::fmt::Debug for RunPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunPlan")
            .field("source", &self.source)
            .field("hosts", &self.hosts.len())
            .field("cases", &self.cases.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_inventory_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let defaults = Defaults {
            inventory: Some(dir.path().join("nope.yml")),
            ..Defaults::default()
        };
        let err = inventory_source(&defaults).err().unwrap();
        assert!(err.is_config_error());
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG);
    }

    #[test]
    fn test_intent_root_follows_testbed() {
        let defaults = Defaults {
            testbed: Some(PathBuf::from("/srv/lab/devices.yaml")),
            ..Defaults::default()
        };
        assert_eq!(intent_root(&defaults), PathBuf::from("/srv/lab"));
    }
}
