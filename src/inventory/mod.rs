//! Inventory resolution for netverify.
//!
//! Produces `(host, variables)` pairs for a host or group selector. Three
//! sources implement [`InventorySource`]:
//! - [`FileInventory`]: YAML, INI and JSON inventories, inventory
//!   directories and executable dynamic inventory scripts
//! - [`AnsibleInventoryCli`]: delegates to the `ansible-inventory` tool
//! - [`TestbedFile`]: a flat list of devices

pub mod ansible;
pub mod group;
pub mod host;
pub mod testbed;

pub use ansible::AnsibleInventoryCli;
pub use group::Group;
pub use host::{scalar_to_string, Host, HostParseError, HostVars, ResolvedHost};
pub use testbed::{TestbedDevice, TestbedFile};

use host::parse_ini_value;
use indexmap::IndexMap;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors that can occur during inventory operations
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("inventory path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no hosts matched pattern: {0}")]
    NoMatch(String),

    #[error("invalid host pattern: {0}")]
    InvalidPattern(String),

    #[error("dynamic inventory script failed: {0}")]
    DynamicInventoryFailed(String),

    #[error("{program} failed: {message}")]
    ToolFailed { program: String, message: String },

    #[error("host parse error: {0}")]
    HostParse(#[from] HostParseError),

    #[error("invalid testbed file '{}': {message}", path.display())]
    InvalidTestbed { path: PathBuf, message: String },
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Anything that can turn a host selector into resolved hosts
pub trait InventorySource: Send + Sync {
    /// Human readable description, used in logs and reports
    fn describe(&self) -> String;

    /// Resolve a selector (`all`, a group, a host or an Ansible pattern).
    ///
    /// Results are sorted by host name and never contain duplicates. A
    /// selector that matches nothing is an error.
    fn resolve(&self, selector: &str) -> InventoryResult<Vec<ResolvedHost>>;
}

/// Hosts and groups read from inventory files
#[derive(Debug, Clone)]
pub struct Inventory {
    hosts: BTreeMap<String, Host>,
    groups: BTreeMap<String, Group>,
    source: Option<String>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    /// Create a new empty inventory with default groups
    pub fn new() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert("all".to_string(), Group::all());
        groups.insert("ungrouped".to_string(), Group::ungrouped());
        Self {
            hosts: BTreeMap::new(),
            groups,
            source: None,
        }
    }

    /// Load inventory from a file or directory
    pub fn load<P: AsRef<Path>>(path: P) -> InventoryResult<Self> {
        let path = path.as_ref();
        let mut inventory = Self::new();
        inventory.source = Some(path.display().to_string());

        if path.is_file() {
            inventory.load_file(path)?;
            // group_vars/ and host_vars/ sit next to an inventory file
            if let Some(parent) = path.parent() {
                inventory.load_adjacent_vars(parent)?;
            }
        } else if path.is_dir() {
            inventory.load_directory(path)?;
        } else {
            return Err(InventoryError::PathNotFound(path.to_path_buf()));
        }

        inventory.compute_group_parents();
        debug!(
            source = %path.display(),
            hosts = inventory.hosts.len(),
            groups = inventory.groups.len(),
            "Loaded inventory"
        );

        Ok(inventory)
    }

    /// Build an inventory from `--list` style JSON
    pub fn from_json(content: &str) -> InventoryResult<Self> {
        let mut inventory = Self::new();
        inventory.parse_json(content)?;
        inventory.compute_group_parents();
        Ok(inventory)
    }

    /// Load a single inventory file
    fn load_file(&mut self, path: &Path) -> InventoryResult<()> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        if is_executable(path) && !matches!(extension.as_str(), "yml" | "yaml" | "json" | "ini") {
            return self.load_dynamic(path);
        }

        let content = std::fs::read_to_string(path)?;

        match extension.as_str() {
            "yml" | "yaml" => self.parse_yaml(&content)?,
            "json" => self.parse_json(&content)?,
            "ini" => self.parse_ini(&content)?,
            _ => {
                let trimmed = content.trim_start();
                if trimmed.starts_with('{') {
                    self.parse_json(&content)?;
                } else if content.contains(':') && !trimmed.starts_with('[') {
                    self.parse_yaml(&content)?;
                } else {
                    self.parse_ini(&content)?;
                }
            }
        }

        Ok(())
    }

    /// Load inventory from a directory
    fn load_directory(&mut self, path: &Path) -> InventoryResult<()> {
        for name in [
            "hosts",
            "hosts.yml",
            "hosts.yaml",
            "hosts.ini",
            "inventory.yml",
            "inventory.yaml",
        ] {
            let hosts_file = path.join(name);
            if hosts_file.is_file() {
                self.load_file(&hosts_file)?;
                break;
            }
        }

        self.load_adjacent_vars(path)
    }

    fn load_adjacent_vars(&mut self, dir: &Path) -> InventoryResult<()> {
        let group_vars = dir.join("group_vars");
        if group_vars.is_dir() {
            self.load_group_vars(&group_vars)?;
        }

        let host_vars = dir.join("host_vars");
        if host_vars.is_dir() {
            self.load_host_vars(&host_vars)?;
        }

        Ok(())
    }

    /// Load group variables from group_vars directory
    fn load_group_vars(&mut self, path: &Path) -> InventoryResult<()> {
        for (group_name, vars) in read_vars_tree(path)? {
            self.groups
                .entry(group_name.clone())
                .or_insert_with(|| Group::new(group_name))
                .merge_vars(&vars);
        }
        Ok(())
    }

    /// Load host variables from host_vars directory
    fn load_host_vars(&mut self, path: &Path) -> InventoryResult<()> {
        for (host_name, vars) in read_vars_tree(path)? {
            if let Some(host) = self.hosts.get_mut(&host_name) {
                host.merge_vars(&vars);
            } else {
                trace!(host = %host_name, "Ignoring host_vars for unknown host");
            }
        }
        Ok(())
    }

    /// Load dynamic inventory from an executable script
    fn load_dynamic(&mut self, path: &Path) -> InventoryResult<()> {
        debug!(script = %path.display(), "Running dynamic inventory");
        let output = Command::new(path)
            .arg("--list")
            .output()
            .map_err(|e| InventoryError::DynamicInventoryFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(InventoryError::DynamicInventoryFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        self.parse_json(&String::from_utf8_lossy(&output.stdout))
    }

    /// Parse YAML inventory format
    fn parse_yaml(&mut self, content: &str) -> InventoryResult<()> {
        let data: serde_yaml::Value = serde_yaml::from_str(content)?;

        if let serde_yaml::Value::Mapping(map) = data {
            if let Some(all) = map.get("all") {
                self.parse_yaml_group("all", all)?;
            } else {
                for (key, value) in &map {
                    if let Some(group_name) = key.as_str() {
                        self.parse_yaml_group(group_name, value)?;
                        self.ensure_group("all").add_child(group_name);
                    }
                }
            }
        }

        Ok(())
    }

    /// Parse a YAML group definition
    fn parse_yaml_group(&mut self, name: &str, value: &serde_yaml::Value) -> InventoryResult<()> {
        self.ensure_group(name);

        let Some(map) = value.as_mapping() else {
            return Ok(());
        };

        if let Some(hosts) = map.get("hosts").and_then(|h| h.as_mapping()) {
            for (host_key, host_value) in hosts {
                let Some(host_name) = yaml_key(host_key) else {
                    continue;
                };

                let vars: IndexMap<String, serde_yaml::Value> = host_value
                    .as_mapping()
                    .map(|m| {
                        m.iter()
                            .filter_map(|(k, v)| yaml_key(k).map(|k| (k, v.clone())))
                            .collect()
                    })
                    .unwrap_or_default();

                self.add_host_to_group(&host_name, name, &vars);
            }
        }

        if let Some(children) = map.get("children").and_then(|c| c.as_mapping()) {
            for (child_key, child_value) in children {
                if let Some(child_name) = yaml_key(child_key) {
                    self.ensure_group(name).add_child(child_name.clone());
                    self.parse_yaml_group(&child_name, child_value)?;
                }
            }
        }

        if let Some(vars) = map.get("vars").and_then(|v| v.as_mapping()) {
            let group = self.ensure_group(name);
            for (var_key, var_value) in vars {
                if let Some(key) = yaml_key(var_key) {
                    group.set_var(key, var_value.clone());
                }
            }
        }

        Ok(())
    }

    /// Parse JSON inventory format (Ansible dynamic inventory / `--list`)
    fn parse_json(&mut self, content: &str) -> InventoryResult<()> {
        let data: serde_json::Value = serde_json::from_str(content)?;
        let Some(map) = data.as_object() else {
            return Ok(());
        };

        for (group_name, value) in map {
            if group_name == "_meta" {
                continue;
            }
            self.ensure_group(group_name);

            let (hosts, group_data) = match value {
                serde_json::Value::Array(hosts) => (Some(hosts), None),
                serde_json::Value::Object(data) => {
                    (data.get("hosts").and_then(|h| h.as_array()), Some(data))
                }
                _ => (None, None),
            };

            for host_name in hosts.into_iter().flatten().filter_map(|h| h.as_str()) {
                self.add_host_to_group(host_name, group_name, &IndexMap::new());
            }

            let Some(group_data) = group_data else {
                continue;
            };

            if let Some(children) = group_data.get("children").and_then(|c| c.as_array()) {
                for child in children.iter().filter_map(|c| c.as_str()) {
                    self.ensure_group(group_name).add_child(child);
                    self.ensure_group(child);
                }
            }

            if let Some(vars) = group_data.get("vars").and_then(|v| v.as_object()) {
                let group = self.ensure_group(group_name);
                for (key, value) in vars {
                    group.set_var(key.clone(), json_to_yaml(value));
                }
            }
        }

        let hostvars = map
            .get("_meta")
            .and_then(|m| m.get("hostvars"))
            .and_then(|h| h.as_object());

        for (host_name, vars) in hostvars.into_iter().flatten() {
            let vars: IndexMap<String, serde_yaml::Value> = vars
                .as_object()
                .map(|v| v.iter().map(|(k, v)| (k.clone(), json_to_yaml(v))).collect())
                .unwrap_or_default();

            match self.hosts.get_mut(host_name) {
                Some(host) => host.merge_vars(&vars),
                None => self.add_host_to_group(host_name, "ungrouped", &vars),
            }
        }

        Ok(())
    }

    /// Parse INI inventory format
    fn parse_ini(&mut self, content: &str) -> InventoryResult<()> {
        let mut current_group = "ungrouped".to_string();
        let mut is_vars_section = false;
        let mut is_children_section = false;

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let section = &line[1..line.len() - 1];

                match section.rsplit_once(':') {
                    Some((group_name, suffix)) => {
                        current_group = group_name.to_string();
                        is_vars_section = suffix == "vars";
                        is_children_section = suffix == "children";
                    }
                    None => {
                        current_group = section.to_string();
                        is_vars_section = false;
                        is_children_section = false;
                    }
                }

                self.ensure_group(&current_group);
                continue;
            }

            if is_vars_section {
                if let Some((key, value)) = line.split_once('=') {
                    self.ensure_group(&current_group)
                        .set_var(key.trim(), parse_ini_value(value));
                }
            } else if is_children_section {
                self.ensure_group(&current_group).add_child(line);
                self.ensure_group(line);
            } else {
                let host = Host::parse(line)?;
                self.add_host_to_group(&host.name, &current_group, &host.vars);
            }
        }

        Ok(())
    }

    fn ensure_group(&mut self, name: &str) -> &mut Group {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| Group::new(name))
    }

    /// Register a host in a group, merging vars if it was already seen
    fn add_host_to_group(
        &mut self,
        host_name: &str,
        group_name: &str,
        vars: &IndexMap<String, serde_yaml::Value>,
    ) {
        self.ensure_group(group_name).add_host(host_name);
        self.ensure_group("all").add_host(host_name);

        let host = self
            .hosts
            .entry(host_name.to_string())
            .or_insert_with(|| Host::new(host_name));
        host.add_to_group(group_name);
        host.add_to_group("all");
        host.merge_vars(vars);
    }

    /// Compute parent group relationships from children
    fn compute_group_parents(&mut self) {
        let edges: Vec<(String, String)> = self
            .groups
            .values()
            .flat_map(|g| g.children.iter().map(|c| (g.name.clone(), c.clone())))
            .collect();

        for (parent, child) in edges {
            self.ensure_group(&child).add_parent(parent);
        }
    }

    /// Add a host to the inventory
    pub fn add_host(&mut self, host: Host) {
        let groups: Vec<String> = host
            .groups
            .iter()
            .filter(|g| g.as_str() != "all")
            .cloned()
            .collect();

        if groups.is_empty() {
            self.add_host_to_group(&host.name, "ungrouped", &host.vars);
        } else {
            for group in groups {
                self.add_host_to_group(&host.name, &group, &host.vars);
            }
        }
    }

    /// Add a group to the inventory
    pub fn add_group(&mut self, group: Group) {
        self.groups.insert(group.name.clone(), group);
        self.compute_group_parents();
    }

    pub fn get_host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    pub fn get_group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// All hosts, sorted by name
    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Get hosts matching a pattern
    ///
    /// Supported patterns:
    /// - `all` or `*` - all hosts
    /// - `hostname` - specific host
    /// - `groupname` - all hosts in group and its children
    /// - `a:b` or `a,b` - union
    /// - `a:&b` - intersection
    /// - `a:!b` - exclusion
    /// - `~regex` - regex match on hostname
    /// - globs such as `leaf*`
    pub fn get_hosts_for_pattern(&self, pattern: &str) -> InventoryResult<Vec<&Host>> {
        let pattern = pattern.trim();

        if pattern.is_empty() {
            return Ok(Vec::new());
        }

        if pattern == "all" || pattern == "*" {
            return Ok(self.hosts.values().collect());
        }

        if pattern.contains(':') || pattern.contains(',') {
            return self.parse_complex_pattern(pattern);
        }

        if let Some(regex_str) = pattern.strip_prefix('~') {
            let regex = Regex::new(regex_str)
                .map_err(|_| InventoryError::InvalidPattern(pattern.to_string()))?;
            return Ok(self
                .hosts
                .values()
                .filter(|h| regex.is_match(&h.name))
                .collect());
        }

        if pattern.contains(['*', '?', '[']) {
            let glob = glob::Pattern::new(pattern)
                .map_err(|_| InventoryError::InvalidPattern(pattern.to_string()))?;
            return Ok(self
                .hosts
                .values()
                .filter(|h| glob.matches(&h.name))
                .collect());
        }

        if let Some(group) = self.groups.get(pattern) {
            return Ok(self.get_hosts_in_group_recursive(group));
        }

        if let Some(host) = self.hosts.get(pattern) {
            return Ok(vec![host]);
        }

        Err(InventoryError::NoMatch(pattern.to_string()))
    }

    /// Parse a complex pattern with operators
    fn parse_complex_pattern(&self, pattern: &str) -> InventoryResult<Vec<&Host>> {
        let mut result: BTreeSet<&str> = BTreeSet::new();

        for part in split_pattern(pattern) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            if let Some(sub_pattern) = part.strip_prefix('&') {
                let sub: BTreeSet<&str> = self
                    .get_hosts_for_pattern(sub_pattern)?
                    .into_iter()
                    .map(|h| h.name.as_str())
                    .collect();
                result = result.intersection(&sub).copied().collect();
            } else if let Some(sub_pattern) = part.strip_prefix('!') {
                for host in self.get_hosts_for_pattern(sub_pattern)? {
                    result.remove(host.name.as_str());
                }
            } else {
                for host in self.get_hosts_for_pattern(part)? {
                    result.insert(host.name.as_str());
                }
            }
        }

        Ok(result
            .into_iter()
            .filter_map(|name| self.hosts.get(name))
            .collect())
    }

    /// Get all hosts in a group, including hosts from child groups
    fn get_hosts_in_group_recursive(&self, group: &Group) -> Vec<&Host> {
        let mut names: BTreeSet<&str> = BTreeSet::new();
        let mut pending = vec![group];
        let mut visited: BTreeSet<&str> = BTreeSet::new();

        while let Some(current) = pending.pop() {
            if !visited.insert(current.name.as_str()) {
                continue;
            }
            names.extend(current.hosts.iter().map(String::as_str));
            pending.extend(current.children.iter().filter_map(|c| self.groups.get(c)));
        }

        names
            .into_iter()
            .filter_map(|name| self.hosts.get(name))
            .collect()
    }

    /// Distance of a group from the top of the hierarchy (`all` is 0)
    fn group_depth(&self, name: &str, memo: &mut HashMap<String, usize>, stack: &mut Vec<String>) -> usize {
        if let Some(depth) = memo.get(name) {
            return *depth;
        }
        if name == "all" || stack.iter().any(|s| s == name) {
            return 0;
        }

        stack.push(name.to_string());
        let parents: Vec<String> = self
            .groups
            .get(name)
            .map(|g| g.parents.iter().cloned().collect())
            .unwrap_or_default();
        let depth = parents
            .iter()
            .map(|p| self.group_depth(p, memo, stack) + 1)
            .max()
            .unwrap_or(1);
        stack.pop();

        memo.insert(name.to_string(), depth);
        depth
    }

    /// Every group the host belongs to, directly or through ancestors,
    /// ordered from least to most specific (depth, then name)
    pub fn host_groups(&self, host: &Host) -> Vec<String> {
        let mut collected: BTreeSet<String> = BTreeSet::new();
        let mut pending: Vec<String> = host.groups.iter().cloned().collect();
        pending.push("all".to_string());

        while let Some(name) = pending.pop() {
            if !collected.insert(name.clone()) {
                continue;
            }
            if let Some(group) = self.groups.get(&name) {
                pending.extend(group.parents.iter().cloned());
            }
        }

        let mut memo = HashMap::new();
        let mut stack = Vec::new();
        let mut ordered: Vec<(usize, String)> = collected
            .into_iter()
            .map(|name| (self.group_depth(&name, &mut memo, &mut stack), name))
            .collect();
        ordered.sort();
        ordered.into_iter().map(|(_, name)| name).collect()
    }

    /// Merged variables for a host: `all` < parent groups < child groups < host
    pub fn host_vars(&self, host: &Host) -> HostVars {
        let mut vars = IndexMap::new();

        for group_name in self.host_groups(host) {
            if let Some(group) = self.groups.get(&group_name) {
                for (key, value) in &group.vars {
                    vars.insert(key.clone(), value.clone());
                }
            }
        }

        for (key, value) in &host.vars {
            vars.insert(key.clone(), value.clone());
        }

        HostVars::new(vars)
    }

    /// Resolve a selector into sorted hosts with merged variables
    pub fn resolve_pattern(&self, selector: &str) -> InventoryResult<Vec<ResolvedHost>> {
        let hosts = self.get_hosts_for_pattern(selector)?;
        if hosts.is_empty() {
            return Err(InventoryError::NoMatch(selector.to_string()));
        }

        let mut resolved: Vec<ResolvedHost> = hosts
            .into_iter()
            .map(|h| ResolvedHost::new(h.name.clone(), self.host_vars(h)))
            .collect();
        resolved.sort_by(|a, b| a.name.cmp(&b.name));
        resolved.dedup_by(|a, b| a.name == b.name);

        Ok(resolved)
    }
}

impl std::fmt::Display for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Inventory ({} hosts, {} groups)",
            self.hosts.len(),
            self.groups.len()
        )?;

        for group in self.groups.values().filter(|g| !g.hosts.is_empty()) {
            writeln!(f, "  [{}]", group.name)?;
            for host in group.hosts.iter().filter_map(|h| self.hosts.get(h)) {
                writeln!(f, "    {host}")?;
            }
        }

        Ok(())
    }
}

/// Native inventory files
#[derive(Debug, Clone)]
pub struct FileInventory {
    path: PathBuf,
    inventory: Inventory,
}

impl FileInventory {
    /// Load the inventory at `path`; a missing path is a configuration error
    pub fn open(path: impl AsRef<Path>) -> InventoryResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(InventoryError::PathNotFound(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            inventory: Inventory::load(path)?,
        })
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }
}

impl InventorySource for FileInventory {
    fn describe(&self) -> String {
        format!("inventory {}", self.path.display())
    }

    fn resolve(&self, selector: &str) -> InventoryResult<Vec<ResolvedHost>> {
        self.inventory.resolve_pattern(selector)
    }
}

/// Fixed host list, mostly useful in tests and for programmatic runs
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    inventory: Inventory,
}

impl StaticInventory {
    pub fn new(hosts: impl IntoIterator<Item = ResolvedHost>) -> Self {
        let mut inventory = Inventory::new();
        for resolved in hosts {
            let mut host = Host::new(resolved.name);
            for (key, value) in resolved.vars.iter() {
                host.set_var(key.clone(), value.clone());
            }
            if let Some(role) = resolved.vars.role() {
                host.add_to_group(role);
            }
            inventory.add_host(host);
        }
        inventory.compute_group_parents();
        Self { inventory }
    }
}

impl InventorySource for StaticInventory {
    fn describe(&self) -> String {
        format!("{} static hosts", self.inventory.host_count())
    }

    fn resolve(&self, selector: &str) -> InventoryResult<Vec<ResolvedHost>> {
        self.inventory.resolve_pattern(selector)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

/// Read `group_vars`/`host_vars`: `<name>.yml` files and `<name>/` directories
fn read_vars_tree(path: &Path) -> InventoryResult<Vec<(String, IndexMap<String, serde_yaml::Value>)>> {
    let mut entries: Vec<_> = std::fs::read_dir(path)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.path());

    let mut result = Vec::new();
    for entry in entries {
        let file_path = entry.path();
        if file_path.is_file() && is_vars_file(&file_path) {
            let name = file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            result.push((name, read_vars_file(&file_path)?));
        } else if file_path.is_dir() {
            let name = file_path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();

            let mut files: Vec<_> = std::fs::read_dir(&file_path)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_vars_file(p))
                .collect();
            files.sort();

            let mut merged = IndexMap::new();
            for file in files {
                merged.extend(read_vars_file(&file)?);
            }
            result.push((name, merged));
        }
    }

    Ok(result)
}

fn is_vars_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        None | Some("yml" | "yaml" | "json")
    )
}

fn read_vars_file(path: &Path) -> InventoryResult<IndexMap<String, serde_yaml::Value>> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_yaml::Value = serde_yaml::from_str(&content)?;
    Ok(value
        .as_mapping()
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| yaml_key(k).map(|k| (k, v.clone())))
                .collect()
        })
        .unwrap_or_default())
}

/// Mapping keys as strings; numeric hostnames are legal in YAML inventories
fn yaml_key(key: &serde_yaml::Value) -> Option<String> {
    scalar_to_string(key)
}

/// Split pattern by `:` or `,` but not inside brackets
fn split_pattern(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut bracket_depth: usize = 0;

    for (i, ch) in pattern.char_indices() {
        match ch {
            '[' => bracket_depth += 1,
            ']' => bracket_depth = bracket_depth.saturating_sub(1),
            ':' | ',' if bracket_depth == 0 => {
                parts.push(&pattern[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    parts.push(&pattern[start..]);
    parts
}

/// Convert JSON value to YAML value
pub(crate) fn json_to_yaml(value: &serde_json::Value) -> serde_yaml::Value {
    match value {
        serde_json::Value::Null => serde_yaml::Value::Null,
        serde_json::Value::Bool(b) => serde_yaml::Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_yaml::Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                serde_yaml::Value::Number(u.into())
            } else {
                serde_yaml::Value::Number(n.as_f64().unwrap_or_default().into())
            }
        }
        serde_json::Value::String(s) => serde_yaml::Value::String(s.clone()),
        serde_json::Value::Array(arr) => {
            serde_yaml::Value::Sequence(arr.iter().map(json_to_yaml).collect())
        }
        serde_json::Value::Object(obj) => {
            let mut map = serde_yaml::Mapping::new();
            for (k, v) in obj {
                map.insert(serde_yaml::Value::String(k.clone()), json_to_yaml(v));
            }
            serde_yaml::Value::Mapping(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fabric_yaml() -> Inventory {
        let mut inv = Inventory::new();
        inv.parse_yaml(
            r#"
all:
  vars:
    ansible_network_os: arista.eos.eos
  children:
    FABRIC:
      vars:
        fabric_name: FABRIC
      children:
        DC1_SPINES:
          vars:
            type: spine
          hosts:
            spine1:
              ansible_host: 172.100.100.2
            spine2:
              ansible_host: 172.100.100.3
        DC1_L3_LEAVES:
          vars:
            type: l3leaf
          hosts:
            leaf1:
              ansible_host: 172.100.100.4
              type: l2leaf
"#,
        )
        .unwrap();
        inv.compute_group_parents();
        inv
    }

    #[test]
    fn test_empty_inventory() {
        let inv = Inventory::new();
        assert_eq!(inv.host_count(), 0);
        assert!(inv.get_group("all").is_some());
        assert!(inv.get_group("ungrouped").is_some());
    }

    #[test]
    fn test_parse_ini() {
        let mut inv = Inventory::new();
        inv.parse_ini(
            r#"
[spines]
spine1 ansible_host=10.0.0.1
spine2 ansible_host=10.0.0.2

[leaves]
leaf1 ansible_host=10.0.0.10

[leaves:vars]
type=l3leaf

[fabric:children]
spines
leaves
        "#,
        )
        .unwrap();
        inv.compute_group_parents();

        assert_eq!(inv.host_count(), 3);
        let leaves = inv.get_group("leaves").unwrap();
        assert!(leaves.hosts.contains("leaf1"));
        assert!(leaves.get_var("type").is_some());
        assert!(inv.get_group("spines").unwrap().parents.contains("fabric"));
    }

    #[test]
    fn test_var_precedence() {
        let inv = fabric_yaml();
        let leaf1 = inv.get_host("leaf1").unwrap();
        let vars = inv.host_vars(leaf1);

        // host var beats group var
        assert_eq!(vars.role().as_deref(), Some("l2leaf"));
        // inherited from all and FABRIC
        assert_eq!(vars.network_os().as_deref(), Some("arista.eos.eos"));
        assert_eq!(vars.get_str("fabric_name").as_deref(), Some("FABRIC"));

        let spine1 = inv.get_host("spine1").unwrap();
        assert_eq!(inv.host_vars(spine1).role().as_deref(), Some("spine"));
    }

    #[test]
    fn test_group_order_puts_all_first() {
        let inv = fabric_yaml();
        let groups = inv.host_groups(inv.get_host("spine1").unwrap());
        assert_eq!(groups, vec!["all", "FABRIC", "DC1_SPINES"]);
    }

    #[test]
    fn test_pattern_matching() {
        let inv = fabric_yaml();

        assert_eq!(inv.get_hosts_for_pattern("all").unwrap().len(), 3);
        assert_eq!(inv.get_hosts_for_pattern("FABRIC").unwrap().len(), 3);
        assert_eq!(inv.get_hosts_for_pattern("DC1_SPINES").unwrap().len(), 2);
        assert_eq!(inv.get_hosts_for_pattern("leaf1").unwrap().len(), 1);
        assert_eq!(inv.get_hosts_for_pattern("spine*").unwrap().len(), 2);
        assert_eq!(inv.get_hosts_for_pattern("~spine\\d+").unwrap().len(), 2);
        assert_eq!(
            inv.get_hosts_for_pattern("FABRIC:!DC1_SPINES").unwrap().len(),
            1
        );
        assert_eq!(inv.get_hosts_for_pattern("spine1,leaf1").unwrap().len(), 2);
        assert_eq!(
            inv.get_hosts_for_pattern("FABRIC:&DC1_L3_LEAVES").unwrap().len(),
            1
        );
    }

    #[test]
    fn test_unknown_selector_fails() {
        let inv = fabric_yaml();
        assert!(matches!(
            inv.resolve_pattern("border1"),
            Err(InventoryError::NoMatch(_))
        ));
    }

    #[test]
    fn test_resolve_is_sorted() {
        let inv = fabric_yaml();
        let names: Vec<_> = inv
            .resolve_pattern("all")
            .unwrap()
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, vec!["leaf1", "spine1", "spine2"]);
    }

    #[test]
    fn test_parse_json_list_output() {
        let inv = Inventory::from_json(
            r#"{
                "_meta": {"hostvars": {"leaf1": {"type": "l3leaf", "ansible_port": 22}}},
                "all": {"children": ["ungrouped", "DC1_LEAFS"]},
                "DC1_LEAFS": {"hosts": ["leaf1"]}
            }"#,
        )
        .unwrap();

        let resolved = inv.resolve_pattern("DC1_LEAFS").unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].vars.role().as_deref(), Some("l3leaf"));
        assert_eq!(resolved[0].vars.ansible_port(), Some(22));
    }

    #[test]
    fn test_missing_path() {
        let err = FileInventory::open("/nonexistent/inventory.yml").unwrap_err();
        assert!(matches!(err, InventoryError::PathNotFound(_)));
    }

    #[test]
    fn test_static_inventory_groups_by_role() {
        let mut vars = HostVars::default();
        vars.insert("type", serde_yaml::Value::String("spine".into()));
        let source = StaticInventory::new(vec![
            ResolvedHost::new("spine1", vars),
            ResolvedHost::new("leaf1", HostVars::default()),
        ]);

        let spines = source.resolve("spine").unwrap();
        assert_eq!(spines.len(), 1);
        assert_eq!(source.resolve("all").unwrap().len(), 2);
    }
}
