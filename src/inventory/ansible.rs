//! `ansible-inventory` backed source.
//!
//! Runs `ansible-inventory --inventory <path> --list` once and resolves
//! selectors against its JSON output, so every plugin, constructed group
//! and vault lookup the local Ansible installation supports is honoured.

use super::{Inventory, InventoryError, InventoryResult, InventorySource, ResolvedHost};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::debug;

/// Inventory resolved by the external `ansible-inventory` tool
#[derive(Debug)]
pub struct AnsibleInventoryCli {
    program: String,
    path: PathBuf,
    listing: OnceLock<Inventory>,
}

impl AnsibleInventoryCli {
    /// A missing inventory path is rejected before the tool is run
    pub fn new(program: impl Into<String>, path: impl AsRef<Path>) -> InventoryResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(InventoryError::PathNotFound(path.to_path_buf()));
        }
        Ok(Self {
            program: program.into(),
            path: path.to_path_buf(),
            listing: OnceLock::new(),
        })
    }

    fn list(&self) -> InventoryResult<&Inventory> {
        if let Some(inventory) = self.listing.get() {
            return Ok(inventory);
        }

        debug!(program = %self.program, inventory = %self.path.display(), "Listing inventory");
        let output = Command::new(&self.program)
            .arg("--inventory")
            .arg(&self.path)
            .arg("--list")
            .output()
            .map_err(|e| InventoryError::ToolFailed {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(InventoryError::ToolFailed {
                program: self.program.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let inventory = Inventory::from_json(&String::from_utf8_lossy(&output.stdout))?;
        Ok(self.listing.get_or_init(|| inventory))
    }
}

impl InventorySource for AnsibleInventoryCli {
    fn describe(&self) -> String {
        format!("{} --inventory {}", self.program, self.path.display())
    }

    fn resolve(&self, selector: &str) -> InventoryResult<Vec<ResolvedHost>> {
        self.list()?.resolve_pattern(selector)
    }
}
