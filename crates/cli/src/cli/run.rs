use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use hookline_core::{FileSet, PathFilter, Pipeline, report};

use crate::manifest::Manifest;

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline manifest
    #[arg(short, long, default_value = "hookline.toml")]
    pub config: PathBuf,

    /// Repository root to run against
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Override the worker count for concurrent check-only hooks
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    pub format: String,

    /// Candidate files relative to the root (e.g. the changed files);
    /// defaults to walking the whole tree
    pub files: Vec<PathBuf>,
}

/// Runs the pipeline and returns the process exit code
/// (0 pass, 1 fail, 2 aborted).
pub async fn run(args: RunArgs) -> Result<i32> {
    let manifest = Manifest::load(&args.config)?;
    let mut engine = manifest.engine;
    if let Some(jobs) = args.jobs {
        engine.max_workers = jobs.max(1);
    }

    let global_filter = match engine.exclude.as_deref() {
        Some(pattern) => Some(PathFilter::compile(pattern, "global exclude")?),
        None => None,
    };

    let files = if args.files.is_empty() {
        FileSet::discover(&args.root, global_filter.as_ref())?
    } else {
        let candidates = match &global_filter {
            Some(filter) => args
                .files
                .into_iter()
                .filter(|path| !filter.excludes(path))
                .collect(),
            None => args.files,
        };
        FileSet::from_paths(&args.root, candidates)
    };

    let pipeline = Pipeline::from_descriptors(manifest.hooks, engine)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, winding down");
                cancel.cancel();
            }
        });
    }

    let verdict = pipeline.run(&files, cancel).await;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        print!("{}", report::render(&verdict));
    }

    Ok(verdict.exit_code())
}
