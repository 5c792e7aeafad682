//! # netverify - Acceptance tests for Arista AVD fabrics
//!
//! netverify validates the live state of an EVPN/VXLAN fabric deployed with
//! Arista AVD against the intended design AVD generated: structured
//! configurations per device plus the topology and p2p tables of the
//! fabric documentation.
//!
//! ## Core Concepts
//!
//! - **Inventory**: the Ansible inventory (or a flat testbed file) the hosts
//!   under test are resolved from
//! - **Intent**: `intended/structured_configs/<host>.yml` and the
//!   `documentation/<fabric>/` CSV tables
//! - **Sessions**: one lazily opened CLI session per device, privileged
//!   once, closed at the end of the run
//! - **Checks**: comparisons of device state with intent, grouped in
//!   modules (`system`, `bgp`, `mlag`, `vlans`, `links`, ...)
//! - **Matrix**: the pure expansion of checks over hosts, links and
//!   loopbacks into ordered cases
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           CLI Interface                             │
//! │            (clap parsing, config merge, report rendering)           │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │               Run plan: inventory + intent + matrix                 │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  Runner (sequential, one span per case)             │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┼─────────────────────────┐
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │  Host registry  │   │ Command dispatcher  │   │       Checks        │
//! │ (lazy sessions) │   │  (memoizing LRU)    │   │  (intent vs state)  │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  SSH CLI sessions (russh, PTY shell)                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use netverify::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::default();
//!     let mut plan = RunPlan::prepare(&config, &CaseFilter::default())?;
//!     let runner = Runner::for_plan(&config, &mut plan, default_connector());
//!     let summary = runner.run(&plan.cases, |result| println!("{}", result.id)).await;
//!     std::process::exit(summary.exit_code());
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Configuration
    pub use crate::config::Config;

    // Error handling
    pub use crate::error::{Error, Result};

    // Inventory
    pub use crate::inventory::{
        FileInventory, HostVars, InventorySource, ResolvedHost, StaticInventory, TestbedFile,
    };

    // Intent
    pub use crate::intent::{FabricDocs, LinkRecord, LoopbackRecord, StructuredConfigs};

    // Sessions and hosts
    pub use crate::host::{HostRegistry, ScopedSession, TestHost};
    pub use crate::session::{
        default_connector, CliSession, ConnectParams, SessionConnector, SessionSettings,
    };

    // Dispatch and caching
    pub use crate::cache::CommandCache;
    pub use crate::dispatch::{CommandDispatcher, CommandOutput};

    // Checks and matrix
    pub use crate::checks::{Check, CheckContext, CheckParam, Outcome};
    pub use crate::matrix::{Case, CaseFilter, Fixture, Target};

    // Execution
    pub use crate::runner::{CaseResult, RunPlan, RunSummary, Runner};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and exit codes.
pub mod error;

/// Layered configuration: defaults, config files, environment.
pub mod config;

// ============================================================================
// Intent and Inventory
// ============================================================================

/// Host and group inventory management.
///
/// Resolves a host selector into hosts with merged variables, from native
/// inventory files, the `ansible-inventory` CLI or a flat testbed file.
pub mod inventory;

/// Intended design: structured configs and fabric documentation tables.
pub mod intent;

// ============================================================================
// Device Access
// ============================================================================

/// Device platforms and their prompts.
pub mod platform;

/// CLI sessions to network devices.
pub mod session;

/// Test hosts and their session lifecycle.
pub mod host;

/// Bounded caches.
pub mod cache;

/// Command dispatch with per-session memoization.
pub mod dispatch;

/// Client containers for overlay checks.
#[cfg(feature = "docker")]
pub mod docker;

// ============================================================================
// Checks and Execution
// ============================================================================

/// Device state checks.
pub mod checks;

/// Expansion of checks into cases.
pub mod matrix;

/// Sequential case execution.
pub mod runner;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
