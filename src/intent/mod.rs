//! Intended design data.
//!
//! Two read-only sources sit next to the inventory:
//!
//! - `intended/structured_configs/<host>.yml`: per-device structured
//!   configuration ([`StructuredConfigs`])
//! - `documentation/<fabric>/*topology*.csv` and `*p2p*.csv`: fabric link
//!   tables ([`FabricDocs`])
//!
//! Both are loaded once per run.

pub mod fabric;
pub mod structured;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use fabric::{
    load_fabric_links, vlan_range, FabricDocs, LinkRecord, LinkTable, P2P_PATTERN,
    TOPOLOGY_PATTERN,
};
pub use structured::{LoopbackRecord, StructuredConfigs};

/// Errors raised while loading intent
#[derive(Error, Debug)]
pub enum IntentError {
    #[error("Could not load host intent for: {0}")]
    MissingHost(String),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{} has no '{column}' column", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("Invalid file pattern: {0}")]
    Pattern(String),
}

/// Result type for intent loading
pub type IntentResult<T> = Result<T, IntentError>;

/// Directory the intent folders are resolved against: the inventory path
/// itself when it is a directory, else its parent.
pub fn inventory_root(inventory_path: &Path) -> PathBuf {
    if inventory_path.is_dir() {
        return inventory_path.to_path_buf();
    }
    match inventory_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("inventory.yml");
        std::fs::write(&file, "all: {}\n").unwrap();

        assert_eq!(inventory_root(dir.path()), dir.path());
        assert_eq!(inventory_root(&file), dir.path());
        assert_eq!(inventory_root(Path::new("inventory.yml")), PathBuf::from("."));
    }

    #[test]
    fn test_missing_host_message() {
        assert_eq!(
            IntentError::MissingHost("leaf9".into()).to_string(),
            "Could not load host intent for: leaf9"
        );
    }
}
