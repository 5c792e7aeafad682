//! Session lifecycle tests for test hosts and the host registry
//!
//! This test suite covers:
//! - Lazy connection on first use, reused afterwards
//! - Scoped sessions closed on release and on drop
//! - Teardown of every open session
//! - Fail-fast connection parameters (credentials, platform)

mod common;

use common::*;
use mockall::mock;
use tokio_test::{assert_err, assert_ok};
use std::sync::Arc;

use async_trait::async_trait;
use netverify::host::{HostError, HostRegistry};
use netverify::inventory::ResolvedHost;
use netverify::session::{
    CliSession, ConnectParams, SessionConnector, SessionError, SessionResult, SessionSettings,
};

mock! {
    pub Connector {}

    #[async_trait]
    impl SessionConnector for Connector {
        async fn connect(&self, params: &ConnectParams) -> SessionResult<Box<dyn CliSession>>;
    }
}

/// A mock connector expecting `times` connects, answering from `stub`
fn expect_connects(times: usize, stub: StubConnector) -> MockConnector {
    let mut connector = MockConnector::new();
    connector
        .expect_connect()
        .times(times)
        .returning(move |params| Ok(Box::new(stub.session(&params.host_name)) as Box<dyn CliSession>));
    connector
}

fn registry(hosts: Vec<ResolvedHost>, connector: impl SessionConnector + 'static) -> HostRegistry {
    HostRegistry::new(hosts, Arc::new(connector), SessionSettings::default())
}

// ============================================================================
// Lazy Sessions
// ============================================================================

#[tokio::test]
async fn test_acquire_connects_once() {
    let connector = expect_connects(1, StubConnector::new());
    let registry = registry(vec![eos_host("leaf1", "l3leaf")], connector);

    {
        let host = registry.acquire("leaf1").await.unwrap();
        assert!(host.is_connected());
    }
    let host = registry.acquire("leaf1").await.unwrap();
    assert!(host.is_connected());
    assert_eq!(host.sessions_opened(), 1);
}

#[tokio::test]
async fn test_lock_does_not_connect() {
    let connector = expect_connects(0, StubConnector::new());
    let registry = registry(vec![eos_host("leaf1", "l3leaf")], connector);

    let host = registry.lock("leaf1").await.unwrap();
    assert!(!host.is_connected());
    assert_eq!(host.vars().role().as_deref(), Some("l3leaf"));
    assert_eq!(registry.role("leaf1"), Some("l3leaf"));
    assert_eq!(registry.role("leaf9"), None);
}

#[tokio::test]
async fn test_unknown_host() {
    let connector = expect_connects(0, StubConnector::new());
    let registry = registry(vec![eos_host("leaf1", "l3leaf")], connector);

    let err = assert_err!(registry.acquire("leaf9").await);
    assert!(matches!(err, HostError::UnknownHost(ref h) if h == "leaf9"));
    assert!(!registry.contains("leaf9"));
}

#[tokio::test]
async fn test_dead_session_is_replaced() {
    let connector = expect_connects(2, StubConnector::new());
    let registry = registry(vec![eos_host("leaf1", "l3leaf")], connector);

    {
        let mut host = registry.acquire("leaf1").await.unwrap();
        host.session_mut().unwrap().disconnect().await.unwrap();
        assert!(!host.is_connected());
    }
    let host = registry.acquire("leaf1").await.unwrap();
    assert!(host.is_connected());
    assert_eq!(host.sessions_opened(), 2);
}

#[tokio::test]
async fn test_prompt_hostname() {
    let connector = expect_connects(1, StubConnector::new());
    let registry = registry(vec![eos_host("leaf1", "l3leaf")], connector);

    let mut host = registry.acquire("leaf1").await.unwrap();
    assert_eq!(host.prompt_hostname().await.unwrap(), "leaf1");
}

// ============================================================================
// Scoped Sessions
// ============================================================================

#[tokio::test]
async fn test_scoped_session_release_disconnects() {
    let connector = expect_connects(2, StubConnector::new());
    let registry = registry(vec![eos_host("leaf1", "l3leaf")], connector);

    let scoped = registry.scoped("leaf1").await.unwrap();
    assert!(scoped.is_connected());
    scoped.release().await.unwrap();

    assert!(!registry.lock("leaf1").await.unwrap().is_connected());

    // The next user gets a new session
    let host = registry.acquire("leaf1").await.unwrap();
    assert_eq!(host.sessions_opened(), 2);
}

#[tokio::test]
async fn test_scoped_session_drop_disconnects() {
    let connector = expect_connects(1, StubConnector::new());
    let registry = registry(vec![eos_host("leaf1", "l3leaf")], connector);

    {
        let scoped = registry.scoped("leaf1").await.unwrap();
        assert!(scoped.is_connected());
    }

    // Waits for the spawned disconnect to release the host
    let host = registry.lock("leaf1").await.unwrap();
    assert!(!host.is_connected());
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_teardown_closes_open_sessions() {
    let connector = expect_connects(2, StubConnector::new());
    let registry = registry(
        vec![
            eos_host("leaf1", "l3leaf"),
            eos_host("leaf2", "l3leaf"),
            eos_host("spine1", "spine"),
        ],
        connector,
    );

    drop(registry.acquire("leaf1").await.unwrap());
    drop(registry.acquire("spine1").await.unwrap());

    assert_eq!(registry.teardown_all().await, 2);
    assert_eq!(registry.teardown_all().await, 0);
    assert!(!registry.lock("leaf1").await.unwrap().is_connected());
}

// ============================================================================
// Connection Parameters
// ============================================================================

#[tokio::test]
async fn test_missing_credentials_fail_before_connecting() {
    let connector = expect_connects(0, StubConnector::new());
    let mut vars = eos_vars("l3leaf");
    vars.insert("ansible_password", serde_yaml::Value::Null);
    let registry = registry(vec![ResolvedHost::new("leaf1", vars)], connector);

    let err = registry.acquire("leaf1").await.unwrap_err();
    assert!(matches!(
        err,
        HostError::Session {
            source: SessionError::MissingCredential(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_unknown_platform_fails_before_connecting() {
    let connector = expect_connects(0, StubConnector::new());
    let mut vars = eos_vars("l3leaf");
    vars.insert("ansible_network_os", serde_yaml::Value::String("junos".into()));
    let registry = registry(vec![ResolvedHost::new("leaf1", vars)], connector);

    let err = registry.acquire("leaf1").await.unwrap_err();
    assert!(matches!(
        err,
        HostError::Session {
            source: SessionError::Platform(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_connect_params_come_from_inventory() {
    let mut connector = MockConnector::new();
    let stub = StubConnector::new();
    connector
        .expect_connect()
        .withf(|params: &ConnectParams| {
            params.address == "192.168.0.12" && params.port == 22 && params.credentials.username == "admin"
        })
        .times(1)
        .returning(move |params| Ok(Box::new(stub.session(&params.host_name)) as Box<dyn CliSession>));

    let mut vars = eos_vars("l3leaf");
    vars.insert("ansible_host", serde_yaml::Value::String("192.168.0.12".into()));
    let registry = registry(vec![ResolvedHost::new("leaf1", vars)], connector);

    let host = assert_ok!(registry.acquire("leaf1").await);
    assert_eq!(host.sessions_opened(), 1);
}
