//! Configuration module for netverify
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/netverify/netverify.toml)
//! - User configuration (~/.netverify.toml)
//! - Project configuration (./netverify.toml)
//! - Environment variables
//! - Command-line arguments (applied by the CLI layer)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default run settings
    pub defaults: Defaults,

    /// Names of the environment variables holding device credentials
    pub credentials: CredentialsConfig,

    /// SSH session settings
    pub ssh: SshConfig,

    /// Command output memoization
    pub cache: CacheSettings,

    /// Tunables for individual checks
    pub checks: ChecksConfig,

    /// Overlay client containers
    pub docker: DockerConfig,

    /// Colors and output settings
    pub colors: ColorsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Where host data comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InventoryBackend {
    /// Parse the Ansible inventory in-process
    #[default]
    Native,
    /// Delegate to the `ansible-inventory` command line tool
    Ansible,
}

/// Default configuration values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Ansible inventory file or directory
    pub inventory: Option<PathBuf>,

    /// Host or group selector
    pub hosts: Option<String>,

    /// Fabric name under `documentation/`
    pub fabric: Option<String>,

    /// Flat testbed file used instead of an inventory
    pub testbed: Option<PathBuf>,

    /// Inventory backend
    pub backend: InventoryBackend,

    /// Program used by the `ansible` backend
    pub ansible_inventory_program: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            inventory: None,
            hosts: None,
            fabric: None,
            testbed: None,
            backend: InventoryBackend::Native,
            ansible_inventory_program: "ansible-inventory".to_string(),
        }
    }
}

/// Credential environment variable names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Login user
    pub user_env: String,

    /// Login password
    pub password_env: String,

    /// Enable secret; the login password is used when unset
    pub enable_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            user_env: "ANSIBLE_USER".to_string(),
            password_env: "ANSIBLE_PASSWORD".to_string(),
            enable_env: "ANSIBLE_BECOME_PASSWORD".to_string(),
        }
    }
}

/// How unknown and changed SSH host keys are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Accept hosts missing from known_hosts, reject changed keys
    #[default]
    AcceptNew,
    /// Only accept keys already present in known_hosts
    Strict,
    /// Accept every key
    Off,
}

/// SSH settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// TCP connect plus authentication timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Maximum time to wait for the prompt after a command
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Host key checking policy
    pub host_key_checking: HostKeyPolicy,

    /// Terminal width requested for the PTY
    pub terminal_width: u32,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(600),
            host_key_checking: HostKeyPolicy::AcceptNew,
            terminal_width: 511,
        }
    }
}

/// Command output cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Memoize identical commands per session
    pub enabled: bool,

    /// Maximum number of cached outputs; 0 disables memoization
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 128,
        }
    }
}

impl CacheSettings {
    /// Capacity actually handed to the command cache.
    pub fn effective_capacity(&self) -> usize {
        if self.enabled {
            self.capacity
        } else {
            0
        }
    }
}

/// How BGP peer state is asserted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BgpPeerCheck {
    /// Every intended neighbor must be present and Established
    #[default]
    Strict,
    /// Record peer states without failing
    Lenient,
}

/// Check tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    /// BGP peer assertion mode
    pub bgp_peer_check: BgpPeerCheck,

    /// Model name every device must report (lab images report `cEOSLab`)
    pub expected_model: String,

    /// VLANs that must exist on every leaf regardless of intent
    pub required_vlans: Vec<u16>,

    /// Spanning tree mode used when intent does not name one
    pub spanning_tree_mode: String,

    /// LLDP is not asserted on links towards these peer types
    pub lldp_ignore_peer_types: Vec<String>,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            bgp_peer_check: BgpPeerCheck::Strict,
            expected_model: "cEOSLab".to_string(),
            required_vlans: vec![],
            spanning_tree_mode: "mstp".to_string(),
            lldp_ignore_peer_types: vec!["server".to_string()],
        }
    }
}

/// Overlay client containers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Names of running client containers
    pub clients: Vec<String>,

    /// Addresses every client must reach
    pub targets: Vec<String>,

    /// Image used when no client container is named
    pub image: Option<String>,
}

/// Colors and output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Enable colors
    pub enabled: bool,

    /// Passed case color
    pub passed: String,

    /// Failed case color
    pub failed: String,

    /// Skipped case color
    pub skipped: String,

    /// Expected failure color
    pub xfailed: String,

    /// Error color
    pub error: String,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            passed: "green".to_string(),
            failed: "red".to_string(),
            skipped: "cyan".to_string(),
            xfailed: "yellow".to_string(),
            error: "bright_red".to_string(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level used when neither `-v` nor `RUST_LOG` is given
    pub level: String,

    /// Log format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Keep `ours` unless `theirs` differs from the default.
fn prefer<T: PartialEq + Clone>(ours: &T, theirs: T, default: &T) -> T {
    if &theirs == default {
        ours.clone()
    } else {
        theirs
    }
}

impl Config {
    /// Load configuration from the standard locations
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Get list of config file paths to check, lowest precedence first
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System-wide config
        paths.push(PathBuf::from("/etc/netverify/netverify.toml"));

        // User config
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".netverify.toml"));
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("netverify/netverify.toml"));
        }

        // Project config (current directory)
        paths.push(PathBuf::from("netverify.toml"));

        // Environment variable, then an explicit --config path
        if let Ok(env_config) = std::env::var("NETVERIFY_CONFIG") {
            paths.push(PathBuf::from(env_config));
        }
        if let Some(path) = explicit_path {
            paths.push(path.clone());
        }

        paths
    }

    /// Load a config file and merge it over this one
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?,
            "toml" => toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?,
            _ => toml::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; `other` wins for non-default values
    fn merge(&self, other: Config) -> Config {
        let default = Config::default();
        Config {
            defaults: Defaults {
                inventory: other
                    .defaults
                    .inventory
                    .or_else(|| self.defaults.inventory.clone()),
                hosts: other.defaults.hosts.or_else(|| self.defaults.hosts.clone()),
                fabric: other.defaults.fabric.or_else(|| self.defaults.fabric.clone()),
                testbed: other
                    .defaults
                    .testbed
                    .or_else(|| self.defaults.testbed.clone()),
                backend: prefer(
                    &self.defaults.backend,
                    other.defaults.backend,
                    &default.defaults.backend,
                ),
                ansible_inventory_program: prefer(
                    &self.defaults.ansible_inventory_program,
                    other.defaults.ansible_inventory_program,
                    &default.defaults.ansible_inventory_program,
                ),
            },
            credentials: prefer(&self.credentials, other.credentials, &default.credentials),
            ssh: SshConfig {
                connect_timeout: prefer(
                    &self.ssh.connect_timeout,
                    other.ssh.connect_timeout,
                    &default.ssh.connect_timeout,
                ),
                read_timeout: prefer(
                    &self.ssh.read_timeout,
                    other.ssh.read_timeout,
                    &default.ssh.read_timeout,
                ),
                host_key_checking: prefer(
                    &self.ssh.host_key_checking,
                    other.ssh.host_key_checking,
                    &default.ssh.host_key_checking,
                ),
                terminal_width: prefer(
                    &self.ssh.terminal_width,
                    other.ssh.terminal_width,
                    &default.ssh.terminal_width,
                ),
            },
            cache: prefer(&self.cache, other.cache, &default.cache),
            checks: ChecksConfig {
                bgp_peer_check: prefer(
                    &self.checks.bgp_peer_check,
                    other.checks.bgp_peer_check,
                    &default.checks.bgp_peer_check,
                ),
                expected_model: prefer(
                    &self.checks.expected_model,
                    other.checks.expected_model,
                    &default.checks.expected_model,
                ),
                required_vlans: if other.checks.required_vlans.is_empty() {
                    self.checks.required_vlans.clone()
                } else {
                    other.checks.required_vlans
                },
                spanning_tree_mode: prefer(
                    &self.checks.spanning_tree_mode,
                    other.checks.spanning_tree_mode,
                    &default.checks.spanning_tree_mode,
                ),
                lldp_ignore_peer_types: prefer(
                    &self.checks.lldp_ignore_peer_types,
                    other.checks.lldp_ignore_peer_types,
                    &default.checks.lldp_ignore_peer_types,
                ),
            },
            docker: prefer(&self.docker, other.docker, &default.docker),
            colors: prefer(&self.colors, other.colors, &default.colors),
            logging: prefer(&self.logging, other.logging, &default.logging),
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // NETVERIFY_INVENTORY
        if let Ok(path) = std::env::var("NETVERIFY_INVENTORY") {
            self.defaults.inventory = Some(PathBuf::from(path));
        }

        // NETVERIFY_HOSTS
        if let Ok(hosts) = std::env::var("NETVERIFY_HOSTS") {
            self.defaults.hosts = Some(hosts);
        }

        // NETVERIFY_FABRIC
        if let Ok(fabric) = std::env::var("NETVERIFY_FABRIC") {
            self.defaults.fabric = Some(fabric);
        }

        // NETVERIFY_READ_TIMEOUT accepts "90s", "10m" or plain seconds
        if let Ok(timeout) = std::env::var("NETVERIFY_READ_TIMEOUT") {
            if let Some(duration) = parse_duration(&timeout) {
                self.ssh.read_timeout = duration;
            }
        }

        // NETVERIFY_CACHE_CAPACITY
        if let Ok(capacity) = std::env::var("NETVERIFY_CACHE_CAPACITY") {
            if let Ok(n) = capacity.parse() {
                self.cache.capacity = n;
            }
        }

        // NO_COLOR
        if std::env::var("NO_COLOR").is_ok() || std::env::var("NETVERIFY_NO_COLOR").is_ok() {
            self.colors.enabled = false;
        }
    }

    /// Load a single file over the defaults, without environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}

fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    humantime_serde::re::humantime::parse_duration(value).ok()
}
