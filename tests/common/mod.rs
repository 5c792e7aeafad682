//! Shared test utilities and fixtures for the netverify test suite.
//!
//! This module provides:
//! - A scripted [`StubSession`] and [`StubConnector`] with call counters
//! - An [`AvdProject`] builder laying out an inventory, structured configs
//!   and fabric documentation in a temporary directory
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_yaml::Value;
use tempfile::TempDir;

use netverify::inventory::{HostVars, ResolvedHost};
use netverify::platform::DevicePlatform;
use netverify::session::{
    session_identity, CliSession, ConnectParams, SessionConnector, SessionError, SessionResult,
};

// ============================================================================
// Scripted Sessions
// ============================================================================

/// Replies per host name, then per command
pub type Script = HashMap<String, HashMap<String, String>>;

/// A session answering from a script and counting round trips.
#[derive(Debug)]
pub struct StubSession {
    identity: String,
    host: String,
    alive: bool,
    script: Arc<RwLock<Script>>,
    sent: Arc<AtomicUsize>,
}

impl StubSession {
    pub fn new(host: &str, script: Arc<RwLock<Script>>, sent: Arc<AtomicUsize>) -> Self {
        Self {
            identity: format!("stub@{host}"),
            host: host.to_string(),
            alive: true,
            script,
            sent,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }
}

#[async_trait]
impl CliSession for StubSession {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn platform(&self) -> DevicePlatform {
        DevicePlatform::AristaEos
    }

    async fn send_command(&mut self, command: &str) -> SessionResult<String> {
        if !self.alive {
            return Err(SessionError::Closed);
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .script
            .read()
            .get(&self.host)
            .and_then(|replies| replies.get(command))
            .cloned()
            .unwrap_or_default())
    }

    async fn enable(&mut self) -> SessionResult<()> {
        Ok(())
    }

    async fn find_prompt(&mut self) -> SessionResult<String> {
        Ok(format!("{}#", self.host))
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    async fn disconnect(&mut self) -> SessionResult<()> {
        self.alive = false;
        Ok(())
    }
}

/// Connector handing out [`StubSession`]s that share one script.
#[derive(Debug, Clone, Default)]
pub struct StubConnector {
    script: Arc<RwLock<Script>>,
    connects: Arc<AtomicUsize>,
    sent: Arc<AtomicUsize>,
}

impl StubConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `reply` for `command` on `host`
    pub fn reply(&self, host: &str, command: &str, reply: impl Into<String>) -> &Self {
        self.script
            .write()
            .entry(host.to_string())
            .or_default()
            .insert(command.to_string(), reply.into());
        self
    }

    /// Script a JSON reply
    pub fn reply_json(&self, host: &str, command: &str, reply: serde_json::Value) -> &Self {
        self.reply(host, command, reply.to_string())
    }

    /// Sessions opened so far
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Commands that reached a session so far
    pub fn commands_sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn session(&self, host: &str) -> StubSession {
        StubSession::new(host, Arc::clone(&self.script), Arc::clone(&self.sent))
    }
}

#[async_trait]
impl SessionConnector for StubConnector {
    async fn connect(&self, params: &ConnectParams) -> SessionResult<Box<dyn CliSession>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let session = self
            .session(&params.host_name)
            .with_identity(session_identity(params));
        Ok(Box::new(session))
    }
}

// ============================================================================
// Hosts
// ============================================================================

/// Variables of an EOS host with credentials and a `type` role
pub fn eos_vars(role: &str) -> HostVars {
    [
        ("type", role),
        ("ansible_network_os", "eos"),
        ("ansible_user", "admin"),
        ("ansible_password", "admin"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
    .collect()
}

pub fn eos_host(name: &str, role: &str) -> ResolvedHost {
    ResolvedHost::new(name, eos_vars(role))
}

// ============================================================================
// AVD Project Layout
// ============================================================================

/// A temporary AVD project: `inventory.yml`, `intended/structured_configs`
/// and `documentation/<fabric>`.
pub struct AvdProject {
    dir: TempDir,
}

impl AvdProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.root().join("inventory.yml")
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, content).expect("write file");
        path
    }

    pub fn with_inventory(self, content: &str) -> Self {
        self.write("inventory.yml", content);
        self
    }

    pub fn with_intent(self, host: &str, content: &str) -> Self {
        self.write(&format!("intended/structured_configs/{host}.yml"), content);
        self
    }

    pub fn with_doc(self, fabric: &str, file: &str, content: &str) -> Self {
        self.write(&format!("documentation/{fabric}/{file}"), content);
        self
    }

    /// A two node fabric: `spine1` (spine) and `leaf1` (l3leaf with BGP
    /// intent), one topology link and one p2p link between them.
    pub fn two_node_fabric() -> Self {
        Self::new()
            .with_inventory(TWO_NODE_INVENTORY)
            .with_intent("leaf1", LEAF1_INTENT)
            .with_intent("spine1", SPINE1_INTENT)
            .with_doc("DC1_FABRIC", "DC1_FABRIC-topology.csv", TOPOLOGY_CSV)
            .with_doc("DC1_FABRIC", "DC1_FABRIC-p2p-links.csv", P2P_CSV)
    }
}

impl Default for AvdProject {
    fn default() -> Self {
        Self::new()
    }
}

pub const TWO_NODE_INVENTORY: &str = r#"
all:
  vars:
    ansible_network_os: eos
    ansible_user: admin
    ansible_password: admin
  children:
    DC1_FABRIC:
      children:
        DC1_SPINES:
          vars:
            type: spine
          hosts:
            spine1:
              ansible_host: 192.168.0.10
        DC1_L3_LEAVES:
          vars:
            type: l3leaf
          hosts:
            leaf1:
              ansible_host: 192.168.0.12
"#;

pub const LEAF1_INTENT: &str = r#"
hostname: leaf1
router_bgp:
  as: "65101"
  router_id: 192.168.255.3
  neighbors:
    172.31.255.0:
      peer_group: IPv4-UNDERLAY-PEERS
    192.168.255.1:
      peer_group: EVPN-OVERLAY-PEERS
  address_family_evpn:
    peer_groups:
      EVPN-OVERLAY-PEERS:
        activate: true
loopback_interfaces:
  Loopback0:
    ip_address: 192.168.255.3/32
vlans:
  110:
    name: Tenant_A_OP_Zone_1
  111:
    name: Tenant_A_OP_Zone_2
"#;

pub const SPINE1_INTENT: &str = r#"
hostname: spine1
loopback_interfaces:
  Loopback0:
    ip_address: 192.168.255.1/32
"#;

pub const TOPOLOGY_CSV: &str = "\
Node Type,Node,Node Interface,Peer Type,Peer Node,Peer Interface
l3leaf,leaf1,Ethernet1,spine,spine1,Ethernet1
";

pub const P2P_CSV: &str = "\
Type,Node,Node Interface,Leaf IP Address,Peer Type,Peer Node,Peer Interface,Peer IP Address
l3leaf,leaf1,Ethernet1,172.31.255.1/31,spine,spine1,Ethernet1,172.31.255.0/31
";
