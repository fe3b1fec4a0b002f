use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "medialocker")]
#[command(about = "Offline media gateway", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the gateway process
    Gateway(GatewayArgs),
}

#[derive(clap::Args, Debug)]
pub struct GatewayArgs {
    /// Configuration file (default: config/medialocker.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
