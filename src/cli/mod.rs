//! CLI module for netverify
//!
//! This module provides the command-line interface for netverify,
//! including argument parsing, configuration overrides, and subcommand
//! handling.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use netverify::config::{Config, InventoryBackend};
use netverify::matrix::CaseFilter;
use std::path::PathBuf;

/// Testbed file used when `--testbed` is given without a path
pub const DEFAULT_TESTBED: &str = "devices.yaml";

/// netverify - acceptance tests for Arista AVD fabrics
///
/// Compares the live state of every device with the intended design
/// generated by AVD.
#[derive(Parser, Debug, Clone)]
#[command(name = "netverify")]
#[command(author = "netverify Contributors")]
#[command(version)]
#[command(about = "Acceptance tests for Arista AVD fabrics", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the Ansible inventory file or directory [default: inventory]
    #[arg(long = "inventory-path", global = true)]
    pub inventory_path: Option<PathBuf>,

    /// Host or group selector [default: all]
    #[arg(long, global = true)]
    pub hosts: Option<String>,

    /// Fabric name under documentation/
    #[arg(long, global = true)]
    pub fabric: Option<String>,

    /// Use a flat testbed file instead of an inventory
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        default_missing_value = DEFAULT_TESTBED,
        value_name = "PATH"
    )]
    pub testbed: Option<PathBuf>,

    /// Inventory backend
    #[arg(long = "inventory-backend", global = true, value_enum)]
    pub inventory_backend: Option<InventoryBackend>,

    /// Only run cases whose id contains this substring
    #[arg(short = 'k', long, global = true)]
    pub filter: Option<String>,

    /// Only run checks of this module (repeatable)
    #[arg(long = "module", global = true, action = clap::ArgAction::Append)]
    pub modules: Vec<String>,

    /// Send every command to the device, even when already answered
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// One JSON object per line
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run every collected case against the devices
    Run(commands::run::RunArgs),

    /// List the collected cases without contacting any device
    Collect(commands::collect::CollectArgs),

    /// Print the resolved hosts and their key variables
    Hosts(commands::hosts::HostsArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }

    /// The subcommand, `run` when none was given
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(commands::run::RunArgs::default()))
    }

    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(path) = &self.inventory_path {
            config.defaults.inventory = Some(path.clone());
        }
        if let Some(hosts) = &self.hosts {
            config.defaults.hosts = Some(hosts.clone());
        }
        if let Some(fabric) = &self.fabric {
            config.defaults.fabric = Some(fabric.clone());
        }
        if let Some(testbed) = &self.testbed {
            config.defaults.testbed = Some(testbed.clone());
        }
        if let Some(backend) = self.inventory_backend {
            config.defaults.backend = backend;
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
        if self.no_color {
            config.colors.enabled = false;
        }
    }

    pub fn case_filter(&self) -> CaseFilter {
        CaseFilter {
            keyword: self.filter.clone(),
            modules: self.modules.clone(),
        }
    }
}
