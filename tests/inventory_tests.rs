//! Integration tests for inventory resolution
//!
//! This test suite covers:
//! - YAML inventories with nested children groups
//! - group_vars/ and host_vars/ next to the inventory file
//! - Selectors (all, groups, hosts, globs, exclusions)
//! - Flat testbed files
//! - Configuration errors for missing paths

mod common;

use common::*;
use netverify::error::{Error, EXIT_CONFIG};
use netverify::inventory::{FileInventory, InventoryError, InventorySource, TestbedFile};
use pretty_assertions::assert_eq;

fn names(source: &dyn InventorySource, selector: &str) -> Vec<String> {
    source
        .resolve(selector)
        .unwrap()
        .into_iter()
        .map(|h| h.name)
        .collect()
}

// ============================================================================
// Native Inventory Tests
// ============================================================================

#[test]
fn test_resolve_all_is_sorted() {
    let project = AvdProject::two_node_fabric();
    let inventory = FileInventory::open(project.inventory_path()).unwrap();

    assert_eq!(names(&inventory, "all"), vec!["leaf1", "spine1"]);
}

#[test]
fn test_resolve_groups_and_hosts() {
    let project = AvdProject::two_node_fabric();
    let inventory = FileInventory::open(project.inventory_path()).unwrap();

    assert_eq!(names(&inventory, "DC1_FABRIC"), vec!["leaf1", "spine1"]);
    assert_eq!(names(&inventory, "DC1_SPINES"), vec!["spine1"]);
    assert_eq!(names(&inventory, "leaf1"), vec!["leaf1"]);
    assert_eq!(names(&inventory, "leaf*"), vec!["leaf1"]);
    assert_eq!(names(&inventory, "all:!spine1"), vec!["leaf1"]);
}

#[test]
fn test_group_vars_are_inherited() {
    let project = AvdProject::two_node_fabric();
    let inventory = FileInventory::open(project.inventory_path()).unwrap();

    let hosts = inventory.resolve("all").unwrap();
    let leaf = hosts.iter().find(|h| h.name == "leaf1").unwrap();
    assert_eq!(leaf.vars.role().as_deref(), Some("l3leaf"));
    assert_eq!(leaf.vars.network_os().as_deref(), Some("eos"));
    assert_eq!(leaf.vars.ansible_host().as_deref(), Some("192.168.0.12"));
}

#[test]
fn test_adjacent_var_directories() {
    let project = AvdProject::two_node_fabric();
    project.write("group_vars/DC1_SPINES.yml", "platform: vEOS-lab\nversion: 4.30\n");
    project.write("host_vars/spine1.yml", "version: 4.31.1F\n");

    let inventory = FileInventory::open(project.inventory_path()).unwrap();
    let hosts = inventory.resolve("spine1").unwrap();
    let spine = &hosts[0];

    assert_eq!(spine.vars.get_str("platform").as_deref(), Some("vEOS-lab"));
    // host_vars win over group_vars
    assert_eq!(spine.vars.version().as_deref(), Some("4.31.1F"));
}

#[test]
fn test_unknown_selector_is_an_error() {
    let project = AvdProject::two_node_fabric();
    let inventory = FileInventory::open(project.inventory_path()).unwrap();

    let err = inventory.resolve("border*").unwrap_err();
    assert!(matches!(err, InventoryError::NoMatch(_)));
}

#[test]
fn test_missing_inventory_is_a_config_error() {
    let project = AvdProject::new();
    let err = FileInventory::open(project.root().join("nope.yml")).unwrap_err();
    assert!(matches!(err, InventoryError::PathNotFound(_)));

    let err = Error::from(err);
    assert!(err.is_config_error());
    assert_eq!(err.exit_code(), EXIT_CONFIG);
}

// ============================================================================
// Testbed Tests
// ============================================================================

const TESTBED: &str = r#"
- hostname: leaf1
  host: 172.100.100.4
  device_type: arista_eos
  username: admin
  password: admin
  type: l3leaf
- hostname: spine1
  host: 172.100.100.2
  device_type: arista_eos
  username: admin
  password: admin
  type: spine
"#;

#[test]
fn test_testbed_hosts_look_like_inventory_hosts() {
    let project = AvdProject::new();
    let path = project.write("devices.yaml", TESTBED);

    let testbed = TestbedFile::open(&path).unwrap();
    assert_eq!(testbed.devices().len(), 2);

    let hosts = testbed.resolve("all").unwrap();
    assert_eq!(hosts.len(), 2);
    let leaf = &hosts[0];
    assert_eq!(leaf.name, "leaf1");
    assert_eq!(leaf.vars.ansible_host().as_deref(), Some("172.100.100.4"));
    assert_eq!(leaf.vars.role().as_deref(), Some("l3leaf"));
    assert_eq!(leaf.vars.get_str("ansible_user").as_deref(), Some("admin"));
}

#[test]
fn test_testbed_duplicate_hostnames_are_rejected() {
    let project = AvdProject::new();
    let path = project.write(
        "devices.yaml",
        "- hostname: leaf1\n  host: 10.0.0.1\n- hostname: leaf1\n  host: 10.0.0.2\n",
    );

    let err = TestbedFile::open(&path).unwrap_err();
    assert!(matches!(err, InventoryError::InvalidTestbed { .. }));
}

#[test]
fn test_missing_testbed() {
    let project = AvdProject::new();
    let err = TestbedFile::open(project.root().join("devices.yaml")).unwrap_err();
    assert!(matches!(err, InventoryError::PathNotFound(_)));
}
