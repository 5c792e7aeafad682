//! Flat testbed files.
//!
//! A testbed is a YAML list of devices (optionally under a `devices:` key):
//!
//! ```yaml
//! - hostname: leaf1
//!   host: 172.100.100.4
//!   device_type: arista_eos
//!   username: admin
//!   password: admin
//! ```
//!
//! Each entry becomes a resolved host whose variables use the usual Ansible
//! names, so the rest of the pipeline cannot tell the two apart.

use super::{Host, Inventory, InventoryError, InventoryResult, InventorySource, ResolvedHost};
use crate::platform::DevicePlatform;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};

/// One device of a testbed file
#[derive(Debug, Clone, Deserialize)]
pub struct TestbedDevice {
    pub hostname: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Fabric role
    #[serde(default, rename = "type")]
    pub role: Option<String>,
    /// Any other keys are passed through as host variables
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl TestbedDevice {
    /// Translate the device into an inventory host
    fn to_host(&self) -> Host {
        let mut host = Host::new(&self.hostname);

        for (key, value) in &self.extra {
            host.set_var(key.clone(), value.clone());
        }
        if let Some(address) = &self.host {
            host.set_var("ansible_host", Value::String(address.clone()));
        }
        if let Some(port) = self.port {
            host.set_var("ansible_port", Value::Number(port.into()));
        }
        if let Some(device_type) = &self.device_type {
            let network_os = device_type
                .parse::<DevicePlatform>()
                .map(|p| p.network_os().to_string())
                .unwrap_or_else(|_| device_type.clone());
            host.set_var("ansible_network_os", Value::String(network_os));
        }
        if let Some(user) = &self.username {
            host.set_var("ansible_user", Value::String(user.clone()));
        }
        if let Some(password) = &self.password {
            host.set_var("ansible_password", Value::String(password.clone()));
        }
        if let Some(secret) = &self.secret {
            host.set_var("ansible_become_password", Value::String(secret.clone()));
        }
        if let Some(role) = &self.role {
            host.set_var("type", Value::String(role.clone()));
            host.add_to_group(role.clone());
        }

        host
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TestbedDocument {
    List(Vec<TestbedDevice>),
    Wrapped { devices: Vec<TestbedDevice> },
}

/// Inventory source backed by a testbed file
#[derive(Debug, Clone)]
pub struct TestbedFile {
    path: PathBuf,
    devices: Vec<TestbedDevice>,
    inventory: Inventory,
}

impl TestbedFile {
    pub fn open(path: impl AsRef<Path>) -> InventoryResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(InventoryError::PathNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    pub fn parse(path: impl AsRef<Path>, content: &str) -> InventoryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let devices = match serde_yaml::from_str::<TestbedDocument>(content) {
            Ok(TestbedDocument::List(devices)) | Ok(TestbedDocument::Wrapped { devices }) => {
                devices
            }
            Err(e) => {
                return Err(InventoryError::InvalidTestbed {
                    path,
                    message: e.to_string(),
                })
            }
        };

        let mut inventory = Inventory::new();
        for device in &devices {
            if inventory.get_host(&device.hostname).is_some() {
                return Err(InventoryError::InvalidTestbed {
                    path,
                    message: format!("duplicate hostname '{}'", device.hostname),
                });
            }
            inventory.add_host(device.to_host());
        }

        Ok(Self {
            path,
            devices,
            inventory,
        })
    }

    pub fn devices(&self) -> &[TestbedDevice] {
        &self.devices
    }
}

impl InventorySource for TestbedFile {
    fn describe(&self) -> String {
        format!("testbed {}", self.path.display())
    }

    fn resolve(&self, selector: &str) -> InventoryResult<Vec<ResolvedHost>> {
        self.inventory.resolve_pattern(selector)
    }
}
