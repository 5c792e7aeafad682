//! Inventory groups.
//!
//! A group is a named set of hosts and child groups with shared variables.
//! Parent links are derived from `children` once the whole inventory has
//! been read.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A group of hosts in the inventory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    /// Group name
    pub name: String,

    /// Host names belonging to this group
    #[serde(default)]
    pub hosts: BTreeSet<String>,

    /// Child group names
    #[serde(default)]
    pub children: BTreeSet<String>,

    /// Parent group names (computed from children relationships)
    #[serde(skip)]
    pub parents: BTreeSet<String>,

    /// Group-specific variables
    #[serde(default)]
    pub vars: IndexMap<String, serde_yaml::Value>,
}

impl Group {
    /// Create a new group with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create the special "all" group
    pub fn all() -> Self {
        Self::new("all")
    }

    /// Create the special "ungrouped" group
    pub fn ungrouped() -> Self {
        Self::new("ungrouped")
    }

    pub fn add_host(&mut self, host: impl Into<String>) {
        self.hosts.insert(host.into());
    }

    pub fn add_child(&mut self, child: impl Into<String>) {
        self.children.insert(child.into());
    }

    /// Add a parent group (internal use for reverse lookups)
    pub fn add_parent(&mut self, parent: impl Into<String>) {
        self.parents.insert(parent.into());
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: serde_yaml::Value) {
        self.vars.insert(key.into(), value);
    }

    pub fn get_var(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.vars.get(key)
    }

    /// Merge variables from another source; later values win
    pub fn merge_vars(&mut self, other: &IndexMap<String, serde_yaml::Value>) {
        for (key, value) in other {
            self.vars.insert(key.clone(), value.clone());
        }
    }

    /// Check if this group is empty (no hosts and no children)
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.children.is_empty()
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Group {}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} hosts, {} children)",
            self.name,
            self.hosts.len(),
            self.children.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_new() {
        let group = Group::new("DC1_LEAFS");
        assert_eq!(group.name, "DC1_LEAFS");
        assert!(group.is_empty());
        assert!(group.vars.is_empty());
    }

    #[test]
    fn test_group_members_are_sorted() {
        let mut group = Group::new("DC1_SPINES");
        group.add_host("spine2");
        group.add_host("spine1");
        group.add_host("spine1");

        let hosts: Vec<_> = group.hosts.iter().cloned().collect();
        assert_eq!(hosts, vec!["spine1", "spine2"]);
        assert!(group.hosts.contains("spine1"));
    }

    #[test]
    fn test_group_vars_merge() {
        let mut group = Group::new("DC1_L3_LEAVES");
        group.set_var("type", serde_yaml::Value::String("l2leaf".into()));

        let mut overrides = IndexMap::new();
        overrides.insert("type".to_string(), serde_yaml::Value::String("l3leaf".into()));
        group.merge_vars(&overrides);

        assert_eq!(
            group.get_var("type"),
            Some(&serde_yaml::Value::String("l3leaf".into()))
        );
    }
}
