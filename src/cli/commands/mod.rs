//! Subcommands module for netverify CLI
//!
//! This module contains all the subcommand implementations.

pub mod collect;
pub mod hosts;
pub mod run;

use crate::cli::output::OutputFormatter;
use netverify::config::Config;
use netverify::error::Error;
use netverify::matrix::CaseFilter;
use netverify::runner::RunPlan;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration with command-line overrides applied
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Case selection
    pub filter: CaseFilter,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let output = OutputFormatter::new(config.colors.clone(), cli.is_json(), cli.verbosity());

        Self {
            output,
            filter: cli.case_filter(),
            config,
        }
    }

    /// Resolve the inventory and collect cases, reporting failures.
    ///
    /// On error the exit code of the failure is returned instead.
    pub fn prepare(&self) -> Result<RunPlan, i32> {
        RunPlan::prepare(&self.config, &self.filter).map_err(|e| self.report(&e))
    }

    /// Print `error` and return its exit code
    pub fn report(&self, error: &Error) -> i32 {
        self.output.error(&error.to_string());
        error.exit_code()
    }
}
