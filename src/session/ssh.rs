//! SSH CLI sessions over russh.
//!
//! Opens an interactive shell with a PTY, detects the device prompt, turns
//! paging off, and then runs one command at a time by writing it to the
//! channel and reading until the prompt comes back.

use async_trait::async_trait;
use regex::Regex;
use russh::client::{Handle, Handler, Msg};
use russh::keys::key::PublicKey;
use russh::{Channel, ChannelMsg, Disconnect};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::{
    clean_output, session_identity, CliSession, ConnectParams, SessionConnector, SessionError,
    SessionResult,
};
use crate::config::HostKeyPolicy;
use crate::platform::DevicePlatform;

/// Wraps `russh::Error` for the `Handler` trait
#[derive(Debug)]
pub struct RusshError(pub russh::Error);

impl From<russh::Error> for RusshError {
    fn from(err: russh::Error) -> Self {
        RusshError(err)
    }
}

impl std::fmt::Display for RusshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Russh error: {}", self.0)
    }
}

impl std::error::Error for RusshError {}

impl From<russh::Error> for SessionError {
    fn from(err: russh::Error) -> Self {
        SessionError::Ssh(err.to_string())
    }
}

fn password_prompt() -> &'static Regex {
    static PROMPT: OnceLock<Regex> = OnceLock::new();
    PROMPT.get_or_init(|| {
        Regex::new(r"(?i)password:\s*\z").unwrap_or_else(|e| panic!("invalid regex: {e}"))
    })
}

/// Client handler checking host keys against `~/.ssh/known_hosts`
struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

#[async_trait]
impl Handler for ClientHandler {
    type Error = RusshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        if self.policy == HostKeyPolicy::Off {
            return Ok(true);
        }

        match russh_keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => {
                debug!(host = %self.host, "Host key verified against known_hosts");
                Ok(true)
            }
            Ok(false) if self.policy == HostKeyPolicy::Strict => {
                warn!(host = %self.host, "Host not found in known_hosts, rejecting");
                Ok(false)
            }
            Ok(false) => {
                warn!(host = %self.host, "Host not found in known_hosts, accepting");
                Ok(true)
            }
            Err(e) => {
                warn!(
                    host = %self.host,
                    error = %e,
                    "HOST KEY VERIFICATION FAILED! Server key does not match known_hosts entry."
                );
                Ok(false)
            }
        }
    }
}

/// Opens [`SshCliSession`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct SshConnector;

#[async_trait]
impl SessionConnector for SshConnector {
    async fn connect(&self, params: &ConnectParams) -> SessionResult<Box<dyn CliSession>> {
        let session = SshCliSession::open(params).await?;
        Ok(Box::new(session))
    }
}

/// An interactive shell on a device
pub struct SshCliSession {
    identity: String,
    host_name: String,
    platform: DevicePlatform,
    read_timeout: Duration,
    enable_secret: String,
    prompt: String,
    handle: Option<Handle<ClientHandler>>,
    channel: Option<Channel<Msg>>,
}

impl SshCliSession {
    pub async fn open(params: &ConnectParams) -> SessionResult<Self> {
        let addr = format!("{}:{}", params.address, params.port);
        debug!(host = %params.host_name, addr = %addr, "Opening SSH session");

        let mut config = russh::client::Config::default();
        config.inactivity_timeout = Some(params.read_timeout + params.connect_timeout);
        let config = Arc::new(config);

        let socket = tokio::time::timeout(params.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| SessionError::Timeout {
                timeout_secs: params.connect_timeout.as_secs(),
                waiting_for: format!("TCP connection to {addr}"),
            })?
            .map_err(|e| SessionError::ConnectionFailed {
                host: params.address.clone(),
                port: params.port,
                message: e.to_string(),
            })?;
        socket.set_nodelay(true)?;

        let handler = ClientHandler {
            host: params.address.clone(),
            port: params.port,
            policy: params.host_key_policy,
        };

        let mut handle = russh::client::connect_stream(config, socket, handler)
            .await
            .map_err(|e| SessionError::ConnectionFailed {
                host: params.address.clone(),
                port: params.port,
                message: format!("SSH handshake failed: {e}"),
            })?;

        let authenticated = handle
            .authenticate_password(&params.credentials.username, &params.credentials.password)
            .await?;
        if !authenticated {
            return Err(SessionError::AuthenticationFailed {
                user: params.credentials.username.clone(),
                host: params.address.clone(),
            });
        }

        let mut channel = handle.channel_open_session().await?;
        channel
            .request_pty(true, "xterm", params.terminal_width, 24, 0, 0, &[])
            .await?;
        channel.request_shell(true).await?;

        let mut session = Self {
            identity: session_identity(params),
            host_name: params.host_name.clone(),
            platform: params.platform,
            read_timeout: params.read_timeout,
            enable_secret: params.credentials.enable_secret().to_string(),
            prompt: String::new(),
            handle: Some(handle),
            channel: Some(channel),
        };

        let prompt = session.platform.prompt_regex();
        let banner = session.read_until(&[prompt]).await?.0;
        session.prompt = last_line(&banner);
        debug!(host = %session.host_name, prompt = %session.prompt, "Login prompt detected");

        for command in session.platform.session_preparation() {
            session.send_command(command).await?;
        }

        Ok(session)
    }

    async fn write(&mut self, text: &str) -> SessionResult<()> {
        let channel = self.channel.as_mut().ok_or(SessionError::Closed)?;
        trace!(host = %self.host_name, data = %text.trim_end(), "Sending");
        channel.data(text.as_bytes()).await?;
        Ok(())
    }

    /// Read until one of `patterns` matches the end of the received text.
    ///
    /// Returns the text and the index of the matching pattern.
    async fn read_until(&mut self, patterns: &[&Regex]) -> SessionResult<(String, usize)> {
        let timeout = self.read_timeout;
        let deadline = Instant::now() + timeout;
        let channel = self.channel.as_mut().ok_or(SessionError::Closed)?;
        let mut buffer = String::new();

        loop {
            let msg = tokio::time::timeout_at(deadline, channel.wait())
                .await
                .map_err(|_| SessionError::Timeout {
                    timeout_secs: timeout.as_secs(),
                    waiting_for: "device prompt".to_string(),
                })?;

            match msg {
                Some(ChannelMsg::Data { ref data }) | Some(ChannelMsg::ExtendedData { ref data, .. }) => {
                    buffer.push_str(&String::from_utf8_lossy(data));
                    let normalized = buffer.replace('\r', "");
                    if let Some(idx) = patterns.iter().position(|re| re.is_match(&normalized)) {
                        trace!(host = %self.host_name, bytes = buffer.len(), "Prompt matched");
                        return Ok((normalized, idx));
                    }
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    self.channel = None;
                    return Err(SessionError::Closed);
                }
                Some(_) => {}
            }
        }
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl CliSession for SshCliSession {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn platform(&self) -> DevicePlatform {
        self.platform
    }

    async fn send_command(&mut self, command: &str) -> SessionResult<String> {
        let prompt = self.platform.prompt_regex();
        self.write(&format!("{command}\n")).await?;
        let (raw, _) = self.read_until(&[prompt]).await?;
        self.prompt = last_line(&raw);
        Ok(clean_output(&raw, command, self.platform))
    }

    async fn enable(&mut self) -> SessionResult<()> {
        if !self.platform.has_enable_mode() || self.prompt.ends_with('#') {
            return Ok(());
        }

        let prompt = self.platform.prompt_regex();
        self.write("enable\n").await?;
        let (raw, matched) = self.read_until(&[prompt, password_prompt()]).await?;
        let raw = if matched == 1 {
            let secret = format!("{}\n", self.enable_secret);
            self.write(&secret).await?;
            self.read_until(&[prompt]).await?.0
        } else {
            raw
        };

        self.prompt = last_line(&raw);
        if self.prompt.ends_with('#') {
            debug!(host = %self.host_name, "Entered privileged mode");
            Ok(())
        } else {
            Err(SessionError::EnableFailed(format!(
                "prompt is still '{}' on {}",
                self.prompt, self.host_name
            )))
        }
    }

    async fn find_prompt(&mut self) -> SessionResult<String> {
        let prompt = self.platform.prompt_regex();
        self.write("\n").await?;
        let (raw, _) = self.read_until(&[prompt]).await?;
        self.prompt = last_line(&raw);
        Ok(self.prompt.clone())
    }

    fn is_alive(&self) -> bool {
        self.channel.is_some() && self.handle.as_ref().is_some_and(|h| !h.is_closed())
    }

    async fn disconnect(&mut self) -> SessionResult<()> {
        if let Some(channel) = self.channel.take() {
            if let Err(e) = channel.eof().await {
                debug!(host = %self.host_name, error = %e, "Failed to send EOF on shell channel");
            }
        }
        if let Some(handle) = self.handle.take() {
            debug!(host = %self.host_name, "Closing SSH session");
            handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SshCliSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshCliSession")
            .field("identity", &self.identity)
            .field("platform", &self.platform)
            .field("prompt", &self.prompt)
            .field("connected", &self.channel.is_some())
            .finish()
    }
}
