//! Test matrix generation.
//!
//! [`build`] turns resolved hosts, intent and fabric documentation into one
//! [`Parametrization`] per requested [`Fixture`]. It is a pure function:
//! nothing here opens a session or reads a file.
//!
//! Case ids come from the data, never from list positions:
//!
//! | fixture        | id                                           |
//! |----------------|----------------------------------------------|
//! | hosts          | `leaf1`                                      |
//! | links          | `leaf1-Ethernet1-spine1-Ethernet1`           |
//! | loopbacks (l3) | `leaf1-192.168.255.3` or `leaf1-no-ip`       |
//! | client         | container name                               |
//!
//! A fixture without backing data yields a single `missing-<what>` case so
//! the gap shows up in the report instead of as an empty suite.

pub mod collect;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::intent::{FabricDocs, LinkRecord, LinkTable, LoopbackRecord, StructuredConfigs};
use crate::inventory::ResolvedHost;

pub use collect::{collect, requested_fixtures, Case, CaseFilter};

/// Role values of the `type` host variable
pub mod roles {
    pub const L2LEAF: &str = "l2leaf";
    pub const L3LEAF: &str = "l3leaf";
    pub const SPINE: &str = "spine";
    pub const SERVER: &str = "server";
}

/// A kind of target a check runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fixture {
    /// Every resolved host
    Host,
    /// `l2leaf` and `l3leaf` hosts
    Leaf,
    /// `spine` hosts
    Spine,
    /// `l3leaf` and `spine` hosts
    L3Host,
    /// Rows of the fabric topology table
    Topology,
    /// Rows of the fabric p2p table
    P2pLink,
    /// Loopback0 of every selected l3 host with intent
    Loopback,
    /// Overlay client containers
    DockerClient,
}

/// How long a fixture's targets are shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Session,
    Module,
}

impl Fixture {
    pub const ALL: [Fixture; 8] = [
        Fixture::Host,
        Fixture::Leaf,
        Fixture::Spine,
        Fixture::L3Host,
        Fixture::Topology,
        Fixture::P2pLink,
        Fixture::Loopback,
        Fixture::DockerClient,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Fixture::Host => "host",
            Fixture::Leaf => "leaf_host",
            Fixture::Spine => "spine_host",
            Fixture::L3Host => "l3_host",
            Fixture::Topology => "avd_topology",
            Fixture::P2pLink => "avd_p2p_link",
            Fixture::Loopback => "loopback",
            Fixture::DockerClient => "docker_host",
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Fixture::Host => Scope::Session,
            _ => Scope::Module,
        }
    }

    /// Whether a host with `role` belongs to this fixture; only meaningful
    /// for host fixtures.
    pub fn accepts_role(&self, role: Option<&str>) -> bool {
        match self {
            Fixture::Host => true,
            Fixture::Leaf => matches!(role, Some(roles::L2LEAF | roles::L3LEAF)),
            Fixture::Spine => matches!(role, Some(roles::SPINE)),
            Fixture::L3Host => matches!(role, Some(roles::L3LEAF | roles::SPINE)),
            _ => false,
        }
    }

    pub fn is_host_fixture(&self) -> bool {
        matches!(
            self,
            Fixture::Host | Fixture::Leaf | Fixture::Spine | Fixture::L3Host
        )
    }
}

impl std::fmt::Display for Fixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The value a case runs against
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    Host(ResolvedHost),
    Link(LinkRecord),
    Loopback(LoopbackRecord),
    Container { name: String },
    /// No data backs the fixture; the reason is reported as a failure
    Missing { reason: String },
}

impl Target {
    pub fn host_name(&self) -> Option<&str> {
        match self {
            Target::Host(host) => Some(&host.name),
            Target::Link(link) => Some(&link.node),
            Target::Loopback(lo) => Some(&lo.host),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Target::Missing { .. })
    }
}

/// One target of a fixture together with its id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureCase {
    pub id: String,
    pub target: Target,
}

impl FixtureCase {
    fn missing(what: &str, reason: impl Into<String>) -> Self {
        Self {
            id: format!("missing-{what}"),
            target: Target::Missing {
                reason: reason.into(),
            },
        }
    }
}

/// The cases generated for one fixture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parametrization {
    pub fixture: Fixture,
    pub scope: Scope,
    pub cases: Vec<FixtureCase>,
}

impl Parametrization {
    pub fn ids(&self) -> Vec<&str> {
        self.cases.iter().map(|c| c.id.as_str()).collect()
    }
}

/// Everything the matrix is built from
#[derive(Debug, Clone, Default)]
pub struct MatrixInputs {
    pub hosts: Vec<ResolvedHost>,
    pub intent: StructuredConfigs,
    pub fabric: Option<String>,
    pub docs: FabricDocs,
    pub docker_clients: Vec<String>,
}

impl MatrixInputs {
    /// Hosts sorted by name with duplicates removed
    pub fn sorted_hosts(&self) -> Vec<&ResolvedHost> {
        let unique: BTreeMap<&str, &ResolvedHost> = self
            .hosts
            .iter()
            .map(|h| (h.name.as_str(), h))
            .collect();
        unique.into_values().collect()
    }
}

/// Build one parametrization per requested fixture, in fixture order
pub fn build(inputs: &MatrixInputs, requested: &BTreeSet<Fixture>) -> Vec<Parametrization> {
    requested
        .iter()
        .map(|&fixture| Parametrization {
            fixture,
            scope: fixture.scope(),
            cases: fixture_cases(inputs, fixture),
        })
        .collect()
}

fn fixture_cases(inputs: &MatrixInputs, fixture: Fixture) -> Vec<FixtureCase> {
    match fixture {
        Fixture::Host | Fixture::Leaf | Fixture::Spine | Fixture::L3Host => {
            host_cases(inputs, fixture)
        }
        Fixture::Topology => link_cases(inputs, inputs.docs.topology.as_ref(), "topology"),
        Fixture::P2pLink => link_cases(inputs, inputs.docs.p2p.as_ref(), "p2p"),
        Fixture::Loopback => loopback_cases(inputs),
        Fixture::DockerClient => container_cases(inputs),
    }
}

fn host_cases(inputs: &MatrixInputs, fixture: Fixture) -> Vec<FixtureCase> {
    let cases: Vec<FixtureCase> = inputs
        .sorted_hosts()
        .into_iter()
        .filter(|h| fixture.accepts_role(h.vars.role().as_deref()))
        .map(|h| FixtureCase {
            id: h.name.clone(),
            target: Target::Host(h.clone()),
        })
        .collect();

    if cases.is_empty() {
        return vec![FixtureCase::missing(
            fixture.name(),
            format!("No hosts selected for fixture '{fixture}'"),
        )];
    }
    cases
}

fn link_cases(inputs: &MatrixInputs, table: Option<&LinkTable>, what: &str) -> Vec<FixtureCase> {
    let Some(fabric) = inputs.fabric.as_deref() else {
        return vec![FixtureCase::missing(
            "fabric",
            "The --fabric option is required for link checks",
        )];
    };
    match table {
        Some(table) if !table.is_empty() => table
            .records
            .iter()
            .map(|link| FixtureCase {
                id: link.id(),
                target: Target::Link(link.clone()),
            })
            .collect(),
        Some(table) => vec![FixtureCase::missing(
            what,
            format!("{} has no rows", table.path.display()),
        )],
        None => vec![FixtureCase::missing(
            what,
            format!("No *{what}*.csv found in documentation/{fabric}"),
        )],
    }
}

fn loopback_cases(inputs: &MatrixInputs) -> Vec<FixtureCase> {
    let l3_hosts: BTreeSet<&str> = inputs
        .hosts
        .iter()
        .filter(|h| Fixture::L3Host.accepts_role(h.vars.role().as_deref()))
        .map(|h| h.name.as_str())
        .collect();
    let cases: Vec<FixtureCase> = inputs
        .intent
        .loopbacks()
        .into_iter()
        .filter(|lo| l3_hosts.contains(lo.host.as_str()))
        .map(|lo| FixtureCase {
            id: lo.id(),
            target: Target::Loopback(lo),
        })
        .collect();

    if cases.is_empty() {
        return vec![FixtureCase::missing(
            "loopbacks",
            "No structured config found for the selected l3 hosts",
        )];
    }
    cases
}

fn container_cases(inputs: &MatrixInputs) -> Vec<FixtureCase> {
    if inputs.docker_clients.is_empty() {
        return vec![FixtureCase::missing(
            "clients",
            "No client containers configured under [docker] clients",
        )];
    }
    inputs
        .docker_clients
        .iter()
        .map(|name| FixtureCase {
            id: name.clone(),
            target: Target::Container { name: name.clone() },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::HostVars;
    use pretty_assertions::assert_eq;
    use serde_yaml::Value;

    fn host(name: &str, role: &str) -> ResolvedHost {
        let vars: HostVars = [("type".to_string(), Value::String(role.to_string()))]
            .into_iter()
            .collect();
        ResolvedHost::new(name, vars)
    }

    fn inputs() -> MatrixInputs {
        MatrixInputs {
            hosts: vec![
                host("spine1", "spine"),
                host("leaf2", "l2leaf"),
                host("leaf1", "l3leaf"),
                host("host1", "server"),
                host("leaf1", "l3leaf"),
            ],
            ..Default::default()
        }
    }

    fn ids(params: &[Parametrization], fixture: Fixture) -> Vec<String> {
        params
            .iter()
            .find(|p| p.fixture == fixture)
            .map(|p| p.cases.iter().map(|c| c.id.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_hosts_sorted_and_unique() {
        let params = build(&inputs(), &BTreeSet::from([Fixture::Host]));
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].scope, Scope::Session);
        assert_eq!(
            ids(&params, Fixture::Host),
            vec!["host1", "leaf1", "leaf2", "spine1"]
        );
    }

    #[test]
    fn test_role_filters() {
        let requested = BTreeSet::from([Fixture::Leaf, Fixture::Spine, Fixture::L3Host]);
        let params = build(&inputs(), &requested);

        assert_eq!(ids(&params, Fixture::Leaf), vec!["leaf1", "leaf2"]);
        assert_eq!(ids(&params, Fixture::Spine), vec!["spine1"]);
        assert_eq!(ids(&params, Fixture::L3Host), vec!["leaf1", "spine1"]);
        assert!(params.iter().all(|p| p.scope == Scope::Module));
    }

    #[test]
    fn test_missing_cases() {
        let empty = MatrixInputs::default();
        let requested = BTreeSet::from([
            Fixture::Spine,
            Fixture::Topology,
            Fixture::Loopback,
            Fixture::DockerClient,
        ]);
        let params = build(&empty, &requested);

        assert_eq!(ids(&params, Fixture::Spine), vec!["missing-spine_host"]);
        assert_eq!(ids(&params, Fixture::Topology), vec!["missing-fabric"]);
        assert_eq!(ids(&params, Fixture::Loopback), vec!["missing-loopbacks"]);
        assert_eq!(ids(&params, Fixture::DockerClient), vec!["missing-clients"]);

        let with_fabric = MatrixInputs {
            fabric: Some("DC1_FABRIC".into()),
            ..Default::default()
        };
        let params = build(&with_fabric, &BTreeSet::from([Fixture::P2pLink]));
        assert_eq!(ids(&params, Fixture::P2pLink), vec!["missing-p2p"]);
        assert!(params[0].cases[0].target.is_missing());
    }

    #[test]
    fn test_loopbacks_only_for_l3_hosts() {
        let intent: BTreeMap<String, Value> = [
            ("leaf1", "loopback_interfaces:\n  Loopback0:\n    ip_address: 192.168.255.3/32\n"),
            ("leaf2", "hostname: leaf2\n"),
            ("spine1", "loopback_interfaces:\n  Loopback0:\n    ip_address: 192.168.255.1/32\n"),
        ]
        .into_iter()
        .map(|(host, text)| (host.to_string(), serde_yaml::from_str(text).unwrap()))
        .collect();
        let inputs = MatrixInputs {
            intent: StructuredConfigs::from_map(intent),
            ..inputs()
        };

        let params = build(&inputs, &BTreeSet::from([Fixture::Loopback]));
        // leaf2 is an l2leaf: no router-id loopback expected
        assert_eq!(
            ids(&params, Fixture::Loopback),
            vec!["leaf1-192.168.255.3", "spine1-192.168.255.1"]
        );
    }

    #[test]
    fn test_unrequested_fixtures_are_not_built() {
        let params = build(&inputs(), &BTreeSet::new());
        assert!(params.is_empty());
    }
}
