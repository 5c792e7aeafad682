//! Per-device structured configuration.

use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{IntentError, IntentResult};
use crate::inventory::scalar_to_string;

/// Location of the structured configs below the inventory root
pub const STRUCTURED_CONFIGS_DIR: &str = "intended/structured_configs";

/// Structured configs keyed by file stem (the hostname)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredConfigs {
    configs: BTreeMap<String, Value>,
}

impl StructuredConfigs {
    /// Load `<root>/intended/structured_configs`; an absent directory yields
    /// an empty set.
    pub fn load(inventory_root: &Path) -> IntentResult<Self> {
        Self::load_dir(&inventory_root.join(STRUCTURED_CONFIGS_DIR))
    }

    /// Load every `*.yml` / `*.yaml` file of `dir`, non-recursively
    pub fn load_dir(dir: &Path) -> IntentResult<Self> {
        let mut configs = BTreeMap::new();
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "No structured configs directory");
            return Ok(Self { configs });
        }

        for path in yaml_files(dir)? {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = std::fs::read_to_string(&path).map_err(|source| IntentError::Io {
                path: path.clone(),
                source,
            })?;
            let document: Value =
                serde_yaml::from_str(&content).map_err(|source| IntentError::Yaml {
                    path: path.clone(),
                    source,
                })?;
            if configs.insert(stem.to_string(), document).is_some() {
                warn!(host = stem, "Both .yml and .yaml intent found, keeping the last");
            }
        }

        debug!(dir = %dir.display(), hosts = configs.len(), "Loaded structured configs");
        Ok(Self { configs })
    }

    pub fn from_map(configs: BTreeMap<String, Value>) -> Self {
        Self { configs }
    }

    /// Intent for `host`, or [`IntentError::MissingHost`]
    pub fn get(&self, host: &str) -> IntentResult<&Value> {
        self.configs
            .get(host)
            .ok_or_else(|| IntentError::MissingHost(host.to_string()))
    }

    pub fn try_get(&self, host: &str) -> Option<&Value> {
        self.configs.get(host)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Whether `host` has a `router_bgp` block
    pub fn has_bgp(&self, host: &str) -> bool {
        self.try_get(host).and_then(router_bgp).is_some()
    }

    /// Loopback0 of every host with intent, in hostname order
    pub fn loopbacks(&self) -> Vec<LoopbackRecord> {
        self.configs
            .iter()
            .map(|(host, intent)| LoopbackRecord {
                host: host.clone(),
                interface: LOOPBACK.to_string(),
                ip: loopback_address(intent, LOOPBACK),
            })
            .collect()
    }
}

fn yaml_files(dir: &Path) -> IntentResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for ext in ["yml", "yaml"] {
        let pattern = dir.join(format!("*.{ext}"));
        let pattern = pattern.to_string_lossy();
        let paths = glob::glob(&pattern).map_err(|e| IntentError::Pattern(e.to_string()))?;
        files.extend(paths.filter_map(Result::ok).filter(|p| p.is_file()));
    }
    files.sort();
    Ok(files)
}

const LOOPBACK: &str = "Loopback0";

/// A host's router-id loopback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopbackRecord {
    pub host: String,
    pub interface: String,
    /// Address without prefix length
    pub ip: Option<String>,
}

impl LoopbackRecord {
    /// `host-ip`, or `host-no-ip` when the address is unknown
    pub fn id(&self) -> String {
        match &self.ip {
            Some(ip) => format!("{}-{}", self.host, ip),
            None => format!("{}-no-ip", self.host),
        }
    }
}

fn strip_prefix_len(address: &str) -> String {
    address.split('/').next().unwrap_or(address).trim().to_string()
}

/// Address of `interface` under `loopback_interfaces`, in mapping or list form
pub fn loopback_address(intent: &Value, interface: &str) -> Option<String> {
    let loopbacks = intent.get("loopback_interfaces")?;
    let entry = match loopbacks {
        Value::Mapping(map) => map.get(interface),
        Value::Sequence(items) => items
            .iter()
            .find(|item| item.get("name").and_then(Value::as_str) == Some(interface)),
        _ => None,
    }?;
    entry
        .get("ip_address")
        .and_then(Value::as_str)
        .map(strip_prefix_len)
}

/// The `router_bgp` block, if present and not null
pub fn router_bgp(intent: &Value) -> Option<&Value> {
    intent.get("router_bgp").filter(|v| !v.is_null())
}

/// Intended VLAN ids; `vlans` may be a mapping keyed by id or a list of
/// entries with an `id` field.
pub fn intended_vlans(intent: &Value) -> Vec<String> {
    match intent.get("vlans") {
        Some(Value::Mapping(map)) => map.keys().filter_map(scalar_to_string).collect(),
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| item.get("id").and_then(scalar_to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Addresses of the BGP neighbors declared under `router_bgp.neighbors`
/// (mapping keyed by address, or list of entries with `ip_address`)
pub fn bgp_neighbors(router_bgp: &Value) -> Vec<(String, Option<String>)> {
    let peer_group = |entry: &Value| {
        entry
            .get("peer_group")
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    match router_bgp.get("neighbors") {
        Some(Value::Mapping(map)) => map
            .iter()
            .filter_map(|(ip, entry)| Some((scalar_to_string(ip)?, peer_group(entry))))
            .collect(),
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|entry| {
                let ip = entry.get("ip_address").and_then(scalar_to_string)?;
                Some((ip, peer_group(entry)))
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Peer groups activated under `address_family_evpn`
pub fn evpn_peer_groups(router_bgp: &Value) -> Vec<String> {
    let Some(groups) = router_bgp
        .get("address_family_evpn")
        .and_then(|af| af.get("peer_groups"))
    else {
        return Vec::new();
    };
    match groups {
        Value::Mapping(map) => map.keys().filter_map(scalar_to_string).collect(),
        Value::Sequence(items) => items
            .iter()
            .filter_map(|item| item.get("name").and_then(scalar_to_string))
            .collect(),
        _ => Vec::new(),
    }
}
