//! Inventory hosts and their variables.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised while parsing an INI host line
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostParseError {
    #[error("empty host definition")]
    EmptyInput,

    #[error("expected key=value, found '{0}'")]
    InvalidVariable(String),
}

/// A host as declared in the inventory, before group variables are merged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Host {
    /// Inventory hostname
    pub name: String,

    /// Host-specific variables
    #[serde(default)]
    pub vars: IndexMap<String, Value>,

    /// Groups this host belongs to directly
    #[serde(skip)]
    pub groups: BTreeSet<String>,
}

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: Value) {
        self.vars.insert(key.into(), value);
    }

    pub fn get_var(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn add_to_group(&mut self, group: impl Into<String>) {
        self.groups.insert(group.into());
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    pub fn merge_vars(&mut self, other: &IndexMap<String, Value>) {
        for (key, value) in other {
            self.vars.insert(key.clone(), value.clone());
        }
    }

    /// Parse an INI host line such as `leaf1 ansible_host=172.100.100.4 ansible_port=22`
    pub fn parse(input: &str) -> Result<Self, HostParseError> {
        let mut parts = input.split_whitespace();
        let name = parts.next().ok_or(HostParseError::EmptyInput)?;
        let mut host = Host::new(name);

        for part in parts {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| HostParseError::InvalidVariable(part.to_string()))?;
            host.set_var(key, parse_ini_value(value));
        }

        Ok(host)
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Host {}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.vars.get("ansible_host").and_then(scalar_to_string) {
            Some(address) if address != self.name => write!(f, "{} ({})", self.name, address),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// Parse INI value (handle quoted strings, booleans and integers)
pub(crate) fn parse_ini_value(value: &str) -> Value {
    let value = value.trim();

    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        return Value::String(value[1..value.len() - 1].to_string());
    }

    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" => return Value::Bool(true),
        "false" | "no" | "off" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(n) = value.parse::<i64>() {
        return Value::Number(n.into());
    }

    Value::String(value.to_string())
}

/// Render a scalar YAML value as a string; `None` for mappings, sequences and null
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}

/// Merged variables of one resolved host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostVars(IndexMap<String, Value>);

impl HostVars {
    pub fn new(vars: IndexMap<String, Value>) -> Self {
        Self(vars)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Scalar variable rendered as a string
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(scalar_to_string)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Device role (`l2leaf`, `l3leaf`, `spine`, `server`)
    pub fn role(&self) -> Option<String> {
        self.get_str("type")
    }

    /// Management address
    pub fn ansible_host(&self) -> Option<String> {
        self.get_str("ansible_host")
    }

    /// SSH port; `None` when absent or not a valid port
    pub fn ansible_port(&self) -> Option<u16> {
        self.get_str("ansible_port").and_then(|p| p.trim().parse().ok())
    }

    pub fn network_os(&self) -> Option<String> {
        self.get_str("ansible_network_os")
    }

    /// Intended software version
    pub fn version(&self) -> Option<String> {
        self.get_str("version")
    }

    /// Follow a dotted path through nested mappings, e.g. `l3leaf.defaults.platform`
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = current.as_mapping()?.get(segment)?;
        }
        Some(current)
    }

    /// Platform declared for this host's role under `<type>.defaults.platform`
    pub fn expected_platform(&self) -> Option<String> {
        let role = self.role()?;
        self.lookup(&format!("{role}.defaults.platform"))
            .and_then(scalar_to_string)
    }
}

impl From<IndexMap<String, Value>> for HostVars {
    fn from(vars: IndexMap<String, Value>) -> Self {
        Self(vars)
    }
}

impl FromIterator<(String, Value)> for HostVars {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A host produced by an inventory source together with its merged variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedHost {
    pub name: String,
    pub vars: HostVars,
}

impl ResolvedHost {
    pub fn new(name: impl Into<String>, vars: HostVars) -> Self {
        Self {
            name: name.into(),
            vars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_parse() {
        let host = Host::parse("leaf1 ansible_host=172.100.100.4 ansible_port=2222 type=l3leaf")
            .unwrap();
        assert_eq!(host.name, "leaf1");
        assert_eq!(
            host.get_var("ansible_host"),
            Some(&Value::String("172.100.100.4".into()))
        );
        assert_eq!(host.get_var("ansible_port"), Some(&Value::Number(2222.into())));
        assert_eq!(host.to_string(), "leaf1 (172.100.100.4)");
    }

    #[test]
    fn test_host_parse_errors() {
        assert_eq!(Host::parse("   "), Err(HostParseError::EmptyInput));
        assert_eq!(
            Host::parse("leaf1 stray"),
            Err(HostParseError::InvalidVariable("stray".into()))
        );
    }

    #[test]
    fn test_parse_ini_value() {
        assert_eq!(parse_ini_value("'eos'"), Value::String("eos".into()));
        assert_eq!(parse_ini_value("yes"), Value::Bool(true));
        assert_eq!(parse_ini_value("22"), Value::Number(22.into()));
        assert_eq!(parse_ini_value("4.30.1F"), Value::String("4.30.1F".into()));
    }

    #[test]
    fn test_host_vars_accessors() {
        let vars: HostVars = serde_yaml::from_str(
            r#"
type: l3leaf
ansible_host: 172.100.100.4
ansible_port: "2222"
ansible_network_os: arista.eos.eos
l3leaf:
  defaults:
    platform: vEOS-LAB
"#,
        )
        .unwrap();

        assert_eq!(vars.role().as_deref(), Some("l3leaf"));
        assert_eq!(vars.ansible_host().as_deref(), Some("172.100.100.4"));
        assert_eq!(vars.ansible_port(), Some(2222));
        assert_eq!(vars.network_os().as_deref(), Some("arista.eos.eos"));
        assert_eq!(vars.expected_platform().as_deref(), Some("vEOS-LAB"));
        assert!(vars.lookup("l3leaf.defaults.missing").is_none());
    }
}
