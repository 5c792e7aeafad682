//! Collect command - List cases without contacting devices

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use netverify::error::{EXIT_NO_CASES, EXIT_OK};

/// Arguments for the collect command
#[derive(Parser, Debug, Clone, Default)]
pub struct CollectArgs {
    /// Also print the targets of every requested fixture
    #[arg(long)]
    pub fixtures: bool,
}

impl CollectArgs {
    /// Execute the collect command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let plan = match ctx.prepare() {
            Ok(plan) => plan,
            Err(code) => return Ok(code),
        };

        if self.fixtures {
            ctx.output.banner("FIXTURES");
            for parametrization in &plan.parametrizations {
                ctx.output.parametrization(parametrization);
            }
        }

        ctx.output.banner("COLLECTED CASES");
        for case in &plan.cases {
            ctx.output.case_listing(case);
        }

        if plan.cases.is_empty() {
            ctx.output.warning("No cases were collected");
            return Ok(EXIT_NO_CASES);
        }
        ctx.output
            .info(&format!("{} cases from {}", plan.cases.len(), plan.source));
        Ok(EXIT_OK)
    }
}
