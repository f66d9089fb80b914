use anyhow::Result;
use clap::Parser;

mod cli;
mod manifest;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // "warn" by default for clean reports, "debug" with --verbose
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => {
            let code = crate::cli::run::run(args).await?;
            std::process::exit(code);
        }
        Commands::List(args) => crate::cli::list::run(args),
    }
}
