//! Test hosts and their session lifecycle.
//!
//! A [`TestHost`] is either disconnected or connected. Connecting twice
//! opens one session; disconnecting twice closes it once. The
//! [`HostRegistry`] owns every host of a run and hands out exclusive access,
//! either for the rest of the run ([`HostRegistry::acquire`]) or for one
//! scope that always ends disconnected ([`HostRegistry::scoped`]).

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::inventory::{HostVars, ResolvedHost};
use crate::platform::hostname_from_prompt;
use crate::session::{
    CliSession, ConnectParams, SessionConnector, SessionError, SessionSettings,
};

/// Errors raised by the host lifecycle
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Unknown host: {0}")]
    UnknownHost(String),

    #[error("Host {0} is not connected")]
    NotConnected(String),

    #[error("{host}: {source}")]
    Session {
        host: String,
        #[source]
        source: SessionError,
    },
}

impl HostError {
    fn session(host: &str, source: SessionError) -> Self {
        HostError::Session {
            host: host.to_string(),
            source,
        }
    }
}

/// One device under test
pub struct TestHost {
    name: String,
    vars: HostVars,
    session: Option<Box<dyn CliSession>>,
    enabled: bool,
    sessions_opened: usize,
}

impl TestHost {
    pub fn new(name: impl Into<String>, vars: HostVars) -> Self {
        Self {
            name: name.into(),
            vars,
            session: None,
            enabled: false,
            sessions_opened: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vars(&self) -> &HostVars {
        &self.vars
    }

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_alive())
    }

    /// Number of sessions opened over the host's lifetime
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened
    }

    /// Open a session unless one is already live.
    pub async fn init_connection(
        &mut self,
        connector: &dyn SessionConnector,
        settings: &SessionSettings,
    ) -> Result<(), HostError> {
        if self.is_connected() {
            return Ok(());
        }
        // A session the device dropped is replaced, never reused
        self.session = None;
        self.enabled = false;

        let params = ConnectParams::for_host(&self.name, &self.vars, settings)
            .map_err(|e| HostError::session(&self.name, e))?;
        debug!(host = %self.name, endpoint = %params.endpoint(), platform = %params.platform, "Connecting");

        let session = connector
            .connect(&params)
            .await
            .map_err(|e| HostError::session(&self.name, e))?;
        self.session = Some(session);
        self.sessions_opened += 1;
        Ok(())
    }

    /// Enter privileged mode once per session
    pub async fn enable(&mut self) -> Result<(), HostError> {
        if self.enabled {
            return Ok(());
        }
        let name = self.name.clone();
        self.session_mut()?
            .enable()
            .await
            .map_err(|e| HostError::session(&name, e))?;
        self.enabled = true;
        Ok(())
    }

    /// Close the session if there is one
    pub async fn disconnect(&mut self) -> Result<(), HostError> {
        self.enabled = false;
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        debug!(host = %self.name, session = session.identity(), "Disconnecting");
        session
            .disconnect()
            .await
            .map_err(|e| HostError::session(&self.name, e))
    }

    pub fn session_mut(&mut self) -> Result<&mut dyn CliSession, HostError> {
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(HostError::NotConnected(self.name.clone())),
        }
    }

    /// Current prompt with the mode marker left in place
    pub async fn find_prompt(&mut self) -> Result<String, HostError> {
        let name = self.name.clone();
        self.session_mut()?
            .find_prompt()
            .await
            .map_err(|e| HostError::session(&name, e))
    }

    /// Hostname reported by the device prompt
    pub async fn prompt_hostname(&mut self) -> Result<String, HostError> {
        let prompt = self.find_prompt().await?;
        Ok(hostname_from_prompt(&prompt).to_string())
    }
}

impl std::fmt::Debug for TestHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestHost")
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .field("enabled", &self.enabled)
            .field("sessions_opened", &self.sessions_opened)
            .finish()
    }
}

/// Every test host of a run
pub struct HostRegistry {
    hosts: BTreeMap<String, Arc<Mutex<TestHost>>>,
    roles: BTreeMap<String, Option<String>>,
    connector: Arc<dyn SessionConnector>,
    settings: SessionSettings,
}

impl HostRegistry {
    pub fn new(
        hosts: impl IntoIterator<Item = ResolvedHost>,
        connector: Arc<dyn SessionConnector>,
        settings: SessionSettings,
    ) -> Self {
        let mut roles = BTreeMap::new();
        let hosts = hosts
            .into_iter()
            .map(|h| {
                roles.insert(h.name.clone(), h.vars.role());
                let host = TestHost::new(h.name.clone(), h.vars);
                (h.name, Arc::new(Mutex::new(host)))
            })
            .collect();
        Self {
            hosts,
            roles,
            connector,
            settings,
        }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hosts.contains_key(name)
    }

    /// The `type` variable of a host, without locking it
    pub fn role(&self, name: &str) -> Option<&str> {
        self.roles.get(name).and_then(|r| r.as_deref())
    }

    fn host(&self, name: &str) -> Result<Arc<Mutex<TestHost>>, HostError> {
        self.hosts
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::UnknownHost(name.to_string()))
    }

    /// Lock a host without touching its session
    pub async fn lock(&self, name: &str) -> Result<OwnedMutexGuard<TestHost>, HostError> {
        Ok(self.host(name)?.lock_owned().await)
    }

    /// Exclusive access to a connected, privileged host; the session stays
    /// open for later cases until [`HostRegistry::teardown_all`].
    pub async fn acquire(&self, name: &str) -> Result<OwnedMutexGuard<TestHost>, HostError> {
        let mut guard = self.lock(name).await?;
        guard
            .init_connection(self.connector.as_ref(), &self.settings)
            .await?;
        guard.enable().await?;
        Ok(guard)
    }

    /// Exclusive access to a connected host that is disconnected when the
    /// guard is released or dropped.
    pub async fn scoped(&self, name: &str) -> Result<ScopedSession, HostError> {
        let guard = self.acquire(name).await?;
        Ok(ScopedSession { guard: Some(guard) })
    }

    /// Disconnect every host; returns how many sessions were closed
    pub async fn teardown_all(&self) -> usize {
        let mut closed = 0;
        for (name, host) in &self.hosts {
            let mut host = host.lock().await;
            if !host.is_connected() {
                continue;
            }
            match host.disconnect().await {
                Ok(()) => closed += 1,
                Err(e) => warn!(host = %name, error = %e, "Disconnect failed"),
            }
        }
        closed
    }
}

impl std::fmt::Debug for HostRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRegistry")
            .field("hosts", &self.hosts.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A host session that is closed on every exit path.
///
/// Call [`ScopedSession::release`] to disconnect and observe errors. If the
/// guard is dropped instead (early return, `?`, panic), the disconnect is
/// spawned on the current Tokio runtime.
pub struct ScopedSession {
    guard: Option<OwnedMutexGuard<TestHost>>,
}

impl ScopedSession {
    pub async fn release(mut self) -> Result<(), HostError> {
        match self.guard.take() {
            Some(mut host) => host.disconnect().await,
            None => Ok(()),
        }
    }
}

impl Deref for ScopedSession {
    type Target = TestHost;

    fn deref(&self) -> &TestHost {
        // `guard` is only taken by `release`, which consumes the scope
        match &self.guard {
            Some(guard) => &**guard,
            None => unreachable!("scoped session used after release"),
        }
    }
}

impl DerefMut for ScopedSession {
    fn deref_mut(&mut self) -> &mut TestHost {
        match &mut self.guard {
            Some(guard) => &mut **guard,
            None => unreachable!("scoped session used after release"),
        }
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        let Some(mut host) = self.guard.take() else {
            return;
        };
        if !host.is_connected() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = host.disconnect().await {
                        warn!(host = %host.name(), error = %e, "Scoped disconnect failed");
                    }
                });
            }
            Err(_) => warn!(
                host = %host.name(),
                "No runtime to close scoped session; dropping it"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DevicePlatform;
    use crate::session::{SessionResult, UnavailableConnector};
    use async_trait::async_trait;
    use serde_yaml::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Idle {
        alive: bool,
    }

    #[async_trait]
    impl CliSession for Idle {
        fn identity(&self) -> &str {
            "idle"
        }
        fn platform(&self) -> DevicePlatform {
            DevicePlatform::AristaEos
        }
        async fn send_command(&mut self, _command: &str) -> SessionResult<String> {
            Ok(String::new())
        }
        async fn enable(&mut self) -> SessionResult<()> {
            Ok(())
        }
        async fn find_prompt(&mut self) -> SessionResult<String> {
            Ok("leaf1(config)#".into())
        }
        fn is_alive(&self) -> bool {
            self.alive
        }
        async fn disconnect(&mut self) -> SessionResult<()> {
            self.alive = false;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl SessionConnector for Counting {
        async fn connect(&self, _params: &ConnectParams) -> SessionResult<Box<dyn CliSession>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Idle { alive: true }))
        }
    }

    fn eos_vars() -> HostVars {
        [
            ("ansible_network_os", "eos"),
            ("ansible_user", "admin"),
            ("ansible_password", "admin"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
    }

    #[tokio::test]
    async fn test_init_connection_is_idempotent() {
        let connector = Counting::default();
        let settings = SessionSettings::default();
        let mut host = TestHost::new("leaf1", eos_vars());

        host.init_connection(&connector, &settings).await.unwrap();
        host.init_connection(&connector, &settings).await.unwrap();

        assert_eq!(connector.0.load(Ordering::SeqCst), 1);
        assert_eq!(host.sessions_opened(), 1);
        assert!(host.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_twice_is_noop() {
        let connector = Counting::default();
        let mut host = TestHost::new("leaf1", eos_vars());
        host.disconnect().await.unwrap();

        host.init_connection(&connector, &SessionSettings::default())
            .await
            .unwrap();
        host.disconnect().await.unwrap();
        host.disconnect().await.unwrap();
        assert!(!host.is_connected());
        assert!(matches!(host.session_mut(), Err(HostError::NotConnected(_))));
    }

    #[tokio::test]
    async fn test_prompt_hostname() {
        let connector = Counting::default();
        let mut host = TestHost::new("leaf1", eos_vars());
        host.init_connection(&connector, &SessionSettings::default())
            .await
            .unwrap();
        assert_eq!(host.prompt_hostname().await.unwrap(), "leaf1");
    }

    #[tokio::test]
    async fn test_unknown_host() {
        let registry = HostRegistry::new(
            Vec::new(),
            Arc::new(UnavailableConnector),
            SessionSettings::default(),
        );
        assert!(matches!(
            registry.acquire("leaf9").await,
            Err(HostError::UnknownHost(_))
        ));
    }

    #[tokio::test]
    async fn test_scoped_release_disconnects() {
        let connector = Arc::new(Counting::default());
        let registry = HostRegistry::new(
            vec![ResolvedHost::new("leaf1", eos_vars())],
            connector.clone(),
            SessionSettings::default(),
        );

        let scope = registry.scoped("leaf1").await.unwrap();
        assert!(scope.is_connected());
        scope.release().await.unwrap();

        let host = registry.lock("leaf1").await.unwrap();
        assert!(!host.is_connected());
        drop(host);

        // Re-acquisition after release opens a fresh session
        let host = registry.acquire("leaf1").await.unwrap();
        assert_eq!(host.sessions_opened(), 2);
    }
}
