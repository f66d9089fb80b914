pub mod list;
pub mod run;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hookline",
    version,
    about = "Run a pipeline of code-quality hooks against a repository"
)]
pub struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the hook pipeline and report a verdict
    Run(run::RunArgs),
    /// Show the resolved hook order without running anything
    List(list::ListArgs),
}
