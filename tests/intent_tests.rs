//! Integration tests for intent loading
//!
//! Covers structured configs keyed by file stem and the fabric CSV tables
//! found under `documentation/<fabric>`.

mod common;

use common::*;
use netverify::intent::{
    inventory_root, load_fabric_links, FabricDocs, IntentError, StructuredConfigs, P2P_PATTERN,
    TOPOLOGY_PATTERN,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Structured Configs
// ============================================================================

#[test]
fn test_structured_configs_are_keyed_by_file_stem() {
    let project = AvdProject::new()
        .with_intent("leaf1", "hostname: leaf1\n")
        .with_intent("leaf2", "hostname: leaf2\n");

    let intent = StructuredConfigs::load(project.root()).unwrap();
    let hosts: Vec<&str> = intent.hosts().collect();
    assert_eq!(hosts, vec!["leaf1", "leaf2"]);
    assert_eq!(
        intent.get("leaf2").unwrap().get("hostname").and_then(|v| v.as_str()),
        Some("leaf2")
    );
}

#[test]
fn test_absent_intent_directory_is_empty() {
    let project = AvdProject::new();
    let intent = StructuredConfigs::load(project.root()).unwrap();
    assert!(intent.is_empty());
}

#[test]
fn test_missing_host_intent() {
    let project = AvdProject::two_node_fabric();
    let intent = StructuredConfigs::load(project.root()).unwrap();

    let err = intent.get("leaf9").unwrap_err();
    assert!(matches!(err, IntentError::MissingHost(ref h) if h == "leaf9"));
    assert_eq!(err.to_string(), "Could not load host intent for: leaf9");
}

#[test]
fn test_invalid_yaml_names_the_file() {
    let project = AvdProject::new().with_intent("leaf1", "hostname: [unclosed\n");
    let err = StructuredConfigs::load(project.root()).unwrap_err();
    assert!(matches!(err, IntentError::Yaml { .. }));
    assert!(err.to_string().contains("leaf1.yml"));
}

#[test]
fn test_loopbacks_strip_prefix_length() {
    let project = AvdProject::two_node_fabric();
    let intent = StructuredConfigs::load(project.root()).unwrap();

    let ids: Vec<String> = intent.loopbacks().iter().map(|lo| lo.id()).collect();
    assert_eq!(ids, vec!["leaf1-192.168.255.3", "spine1-192.168.255.1"]);
    assert!(intent.has_bgp("leaf1"));
    assert!(!intent.has_bgp("spine1"));
}

// ============================================================================
// Fabric Documentation
// ============================================================================

#[test]
fn test_topology_row_is_kept_literally() {
    let project = AvdProject::two_node_fabric();

    let table = load_fabric_links(project.root(), "DC1_FABRIC", TOPOLOGY_PATTERN)
        .unwrap()
        .unwrap();
    assert_eq!(table.len(), 1);

    let link = &table.records[0];
    assert_eq!(link.node, "leaf1");
    assert_eq!(link.node_interface, "Ethernet1");
    assert_eq!(link.peer_node, "spine1");
    assert_eq!(link.peer_interface, "Ethernet1");
    assert_eq!(link.peer_type.as_deref(), Some("spine"));
    assert_eq!(link.get("Node Type"), Some("l3leaf"));
    assert_eq!(link.id(), "leaf1-Ethernet1-spine1-Ethernet1");
}

#[test]
fn test_p2p_addresses() {
    let project = AvdProject::two_node_fabric();

    let table = load_fabric_links(project.root(), "DC1_FABRIC", P2P_PATTERN)
        .unwrap()
        .unwrap();
    let link = &table.records[0];
    assert_eq!(link.node_ip.as_deref(), Some("172.31.255.1/31"));
    assert_eq!(link.peer_ip.as_deref(), Some("172.31.255.0/31"));
}

#[test]
fn test_first_matching_csv_wins() {
    let project = AvdProject::new()
        .with_doc("DC1", "b-topology.csv", TOPOLOGY_CSV)
        .with_doc(
            "DC1",
            "a-topology.csv",
            "Node,Node Interface,Peer Node,Peer Interface\nleaf2,Ethernet2,spine2,Ethernet2\n",
        );

    let table = load_fabric_links(project.root(), "DC1", TOPOLOGY_PATTERN)
        .unwrap()
        .unwrap();
    assert!(table.path.ends_with("a-topology.csv"));
    assert_eq!(table.records[0].node, "leaf2");
}

#[test]
fn test_missing_column_is_reported() {
    let project = AvdProject::new().with_doc("DC1", "topology.csv", "Node,Peer Node\nleaf1,spine1\n");

    let err = load_fabric_links(project.root(), "DC1", TOPOLOGY_PATTERN).unwrap_err();
    assert!(matches!(err, IntentError::MissingColumn { ref column, .. } if column == "Node Interface"));
}

#[test]
fn test_fabric_docs_without_fabric_or_files() {
    let project = AvdProject::two_node_fabric();

    let docs = FabricDocs::load(project.root(), None).unwrap();
    assert_eq!(docs, FabricDocs::default());

    let docs = FabricDocs::load(project.root(), Some("DC2_FABRIC")).unwrap();
    assert!(docs.topology.is_none());
    assert!(docs.p2p.is_none());
}

#[test]
fn test_inventory_root() {
    let project = AvdProject::two_node_fabric();
    assert_eq!(inventory_root(&project.inventory_path()), project.root());
    assert_eq!(inventory_root(project.root()), project.root());
}
