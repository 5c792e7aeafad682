//! Device CLI sessions.
//!
//! A [`CliSession`] is one interactive management session on a network
//! device: send a command, wait for the prompt, return what the device
//! printed. [`SessionConnector`] opens sessions; the default connector uses
//! SSH (`russh` feature). Both are traits so the host lifecycle and the
//! dispatcher can be exercised against stub sessions.

#[cfg(feature = "russh")]
pub mod ssh;

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{Config, CredentialsConfig, HostKeyPolicy};
use crate::inventory::HostVars;
use crate::platform::{platform_for, DevicePlatform, PlatformError};

/// Default SSH port when `ansible_port` is absent
pub const DEFAULT_PORT: u16 = 22;

/// Errors raised by device sessions
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to connect to {host}:{port}: {message}")]
    ConnectionFailed {
        host: String,
        port: u16,
        message: String,
    },

    #[error("Authentication failed for {user}@{host}")]
    AuthenticationFailed { user: String, host: String },

    #[error("Timed out after {timeout_secs}s waiting for {waiting_for}")]
    Timeout {
        timeout_secs: u64,
        waiting_for: String,
    },

    #[error("Session closed by the device")]
    Closed,

    #[error("Could not enter privileged mode: {0}")]
    EnableFailed(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("No session transport available (built without the 'russh' feature)")]
    TransportUnavailable,

    #[error("SSH error: {0}")]
    Ssh(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Login credentials for one device
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Secret for privileged mode; the login password when not set
    pub enable_secret: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("enable_secret", &self.enable_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            enable_secret: None,
        }
    }

    pub fn with_enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(secret.into());
        self
    }

    /// Resolve credentials from the environment, falling back to host variables.
    pub fn resolve(config: &CredentialsConfig, vars: &HostVars) -> SessionResult<Self> {
        Self::resolve_with(config, vars, |name| std::env::var(name).ok())
    }

    /// Same as [`Credentials::resolve`] with an injectable environment lookup.
    pub fn resolve_with(
        config: &CredentialsConfig,
        vars: &HostVars,
        env: impl Fn(&str) -> Option<String>,
    ) -> SessionResult<Self> {
        let lookup = |env_name: &str, var_names: &[&str]| {
            env(env_name)
                .filter(|v| !v.is_empty())
                .or_else(|| var_names.iter().find_map(|name| vars.get_str(name)))
        };

        let username = lookup(&config.user_env, &["ansible_user", "ansible_ssh_user"])
            .ok_or_else(|| SessionError::MissingCredential(config.user_env.clone()))?;
        let password = lookup(&config.password_env, &["ansible_password", "ansible_ssh_pass"])
            .ok_or_else(|| SessionError::MissingCredential(config.password_env.clone()))?;
        let enable_secret = lookup(&config.enable_env, &["ansible_become_password"]);

        Ok(Self {
            username,
            password,
            enable_secret,
        })
    }

    /// Secret answered at the enable password prompt
    pub fn enable_secret(&self) -> &str {
        self.enable_secret.as_deref().unwrap_or(&self.password)
    }
}

/// Session settings shared by every host of a run
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub credentials: CredentialsConfig,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub host_key_policy: HostKeyPolicy,
    pub terminal_width: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            credentials: config.credentials.clone(),
            connect_timeout: config.ssh.connect_timeout,
            read_timeout: config.ssh.read_timeout,
            host_key_policy: config.ssh.host_key_checking,
            terminal_width: config.ssh.terminal_width,
        }
    }
}

/// Everything needed to open a session to one host
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Inventory name of the host
    pub host_name: String,
    /// Address to connect to
    pub address: String,
    pub port: u16,
    pub platform: DevicePlatform,
    pub credentials: Credentials,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub host_key_policy: HostKeyPolicy,
    pub terminal_width: u32,
}

impl ConnectParams {
    /// Build connection parameters from a host's inventory variables.
    ///
    /// Fails fast on a missing or unknown `ansible_network_os`; no default
    /// driver is ever assumed.
    pub fn for_host(
        host_name: &str,
        vars: &HostVars,
        settings: &SessionSettings,
    ) -> SessionResult<Self> {
        let network_os = vars
            .network_os()
            .ok_or_else(|| PlatformError::Missing(host_name.to_string()))?;
        let platform = platform_for(&network_os)?;
        let credentials = Credentials::resolve(&settings.credentials, vars)?;

        Ok(Self {
            host_name: host_name.to_string(),
            address: vars.ansible_host().unwrap_or_else(|| host_name.to_string()),
            port: vars.ansible_port().unwrap_or(DEFAULT_PORT),
            platform,
            credentials,
            connect_timeout: settings.connect_timeout,
            read_timeout: settings.read_timeout,
            host_key_policy: settings.host_key_policy,
            terminal_width: settings.terminal_width,
        })
    }

    /// Session identity prefix, `user@address:port`
    pub fn endpoint(&self) -> String {
        format!("{}@{}:{}", self.credentials.username, self.address, self.port)
    }
}

static SESSION_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Unique identity for a newly opened session.
///
/// The serial makes a reconnected session distinct from the one it
/// replaces, so cached output never outlives the session that produced it.
pub fn session_identity(params: &ConnectParams) -> String {
    let serial = SESSION_SERIAL.fetch_add(1, Ordering::Relaxed);
    format!("{}#{}", params.endpoint(), serial)
}

/// One interactive CLI session on a device
#[async_trait]
pub trait CliSession: Send + Sync {
    /// Identity used to key cached command output
    fn identity(&self) -> &str;

    fn platform(&self) -> DevicePlatform;

    /// Send a command and return everything printed before the next prompt
    async fn send_command(&mut self, command: &str) -> SessionResult<String>;

    /// Enter privileged mode; a no-op when already privileged
    async fn enable(&mut self) -> SessionResult<()>;

    /// Current CLI prompt, e.g. `leaf1#`
    async fn find_prompt(&mut self) -> SessionResult<String>;

    fn is_alive(&self) -> bool;

    /// Close the session; a no-op when already closed
    async fn disconnect(&mut self) -> SessionResult<()>;
}

/// Opens device sessions
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> SessionResult<Box<dyn CliSession>>;
}

/// Connector used when no transport is compiled in
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableConnector;

#[async_trait]
impl SessionConnector for UnavailableConnector {
    async fn connect(&self, _params: &ConnectParams) -> SessionResult<Box<dyn CliSession>> {
        Err(SessionError::TransportUnavailable)
    }
}

/// The connector for real devices
pub fn default_connector() -> Arc<dyn SessionConnector> {
    #[cfg(feature = "russh")]
    {
        Arc::new(ssh::SshConnector)
    }
    #[cfg(not(feature = "russh"))]
    {
        Arc::new(UnavailableConnector)
    }
}

/// Remove the command echo and the trailing prompt from raw CLI output.
pub fn clean_output(raw: &str, command: &str, platform: DevicePlatform) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "");
    let mut body = normalized.as_str();

    if let Some(m) = platform.prompt_regex().find(body) {
        body = &body[..m.start()];
    }

    let mut lines = body.lines().peekable();
    if let Some(first) = lines.peek() {
        if !command.is_empty() && first.trim_end().ends_with(command.trim()) {
            lines.next();
        }
    }

    lines.collect::<Vec<_>>().join("\n").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_yaml::Value;

    fn vars(pairs: &[(&str, &str)]) -> HostVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn test_credentials_prefer_environment() {
        let config = CredentialsConfig::default();
        let host_vars = vars(&[("ansible_user", "ansible"), ("ansible_password", "hv")]);
        let env = |name: &str| match name {
            "ANSIBLE_USER" => Some("admin".to_string()),
            _ => None,
        };

        let creds = Credentials::resolve_with(&config, &host_vars, env).unwrap();
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.password, "hv");
        assert_eq!(creds.enable_secret(), "hv");
    }

    #[test]
    fn test_missing_password_is_reported() {
        let config = CredentialsConfig::default();
        let err = Credentials::resolve_with(&config, &HostVars::default(), |name| {
            (name == "ANSIBLE_USER").then(|| "admin".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, SessionError::MissingCredential(ref v) if v == "ANSIBLE_PASSWORD"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new("admin", "hunter2").with_enable_secret("s3cret");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn test_connect_params_require_known_platform() {
        let settings = SessionSettings::default();
        let mut host_vars: HostVars = IndexMap::new().into();
        host_vars.insert("ansible_user", Value::String("admin".into()));
        host_vars.insert("ansible_password", Value::String("admin".into()));

        let err = ConnectParams::for_host("leaf1", &host_vars, &settings).unwrap_err();
        assert!(matches!(err, SessionError::Platform(PlatformError::Missing(_))));

        host_vars.insert("ansible_network_os", Value::String("junos".into()));
        let err = ConnectParams::for_host("leaf1", &host_vars, &settings).unwrap_err();
        assert!(matches!(err, SessionError::Platform(PlatformError::Unsupported(_))));
    }

    #[test]
    fn test_clean_output() {
        let raw = "show version\r\nArista cEOSLab\r\nSoftware image version: 4.32\r\nleaf1#";
        assert_eq!(
            clean_output(raw, "show version", DevicePlatform::AristaEos),
            "Arista cEOSLab\nSoftware image version: 4.32"
        );
        assert_eq!(clean_output("leaf1#", "", DevicePlatform::AristaEos), "");
    }
}
