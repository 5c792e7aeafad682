//! Hosts command - Print the resolved hosts

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use netverify::error::EXIT_OK;
use netverify::runner::inventory_source;
use netverify::runner::plan::DEFAULT_SELECTOR;

/// Arguments for the hosts command
#[derive(Parser, Debug, Clone, Default)]
pub struct HostsArgs {
    /// Print every variable, not only the key ones
    #[arg(long)]
    pub vars: bool,
}

impl HostsArgs {
    /// Execute the hosts command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let selector = ctx
            .config
            .defaults
            .hosts
            .clone()
            .unwrap_or_else(|| DEFAULT_SELECTOR.to_string());

        let hosts = match inventory_source(&ctx.config.defaults)
            .and_then(|source| source.resolve(&selector).map_err(Into::into))
        {
            Ok(hosts) => hosts,
            Err(e) => return Ok(ctx.report(&e)),
        };

        ctx.output.banner(&format!("HOSTS [{}]", selector));
        for host in &hosts {
            ctx.output.host(host, self.vars);
        }
        ctx.output.info(&format!("{} hosts", hosts.len()));
        Ok(EXIT_OK)
    }
}
