//! Run command - Execute every collected case
//!
//! This module implements the `run` subcommand: resolve the inventory,
//! collect cases, run them in order against the devices and print a recap.

use super::CommandContext;
use anyhow::Result;
use chrono::Local;
use clap::Parser;
use netverify::error::EXIT_NO_CASES;
use netverify::runner::Runner;
use netverify::session::default_connector;

/// Arguments for the run command
#[derive(Parser, Debug, Clone, Default)]
pub struct RunArgs {
    /// Only print failed and errored cases
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let started = Local::now();
        ctx.output.banner("NETVERIFY RUN");

        let mut plan = match ctx.prepare() {
            Ok(plan) => plan,
            Err(code) => return Ok(code),
        };
        ctx.output.info(&format!(
            "{} hosts from {}, {} cases",
            plan.hosts.len(),
            plan.source,
            plan.cases.len()
        ));

        if plan.cases.is_empty() {
            ctx.output.warning("No cases were collected");
            return Ok(EXIT_NO_CASES);
        }

        let runner = Runner::for_plan(&ctx.config, &mut plan, default_connector());
        let output = &ctx.output;
        let quiet = self.quiet;
        let mut current_module = "";

        let summary = runner
            .run(&plan.cases, |result| {
                if quiet && !result.outcome.is_failure() {
                    return;
                }
                if result.module != current_module {
                    current_module = result.module;
                    output.section(current_module);
                }
                output.case_result(result);
            })
            .await;

        ctx.output.recap(&summary, started);
        Ok(summary.exit_code())
    }
}
