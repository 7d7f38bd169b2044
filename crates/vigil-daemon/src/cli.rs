//! CLI definition using clap derive.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vigild",
    about = "distributed polling lease coordinator",
    subcommand_required = false,
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the lease coordinator and poll scheduler (default)
    Run(RunOpts),
}

#[derive(clap::Args, Default)]
pub struct RunOpts {
    /// Shared key-value store connection string
    #[arg(long, env = "VIGIL_KV_URL")]
    pub kv_url: Option<String>,

    /// Operator-supplied instance name; synthesised from the hostname if omitted
    #[arg(long, env = "VIGIL_NODE_NAME")]
    pub node_name: Option<String>,

    /// Upstream game-server API base URL the poll scheduler fetches from
    #[arg(long, env = "VIGIL_UPSTREAM_BASE_URL")]
    pub upstream_base_url: Option<String>,
}
