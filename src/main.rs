use clap::Parser;
use medialocker::cli::{Cli, Commands};
use medialocker::gateway::server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Gateway(args) => server::run(args.config).await?,
    }

    Ok(())
}
