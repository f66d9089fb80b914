use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use hookline_core::Pipeline;

use crate::manifest::Manifest;

#[derive(Args)]
pub struct ListArgs {
    /// Pipeline manifest
    #[arg(short, long, default_value = "hookline.toml")]
    pub config: PathBuf,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn run(args: ListArgs) -> Result<()> {
    let manifest = Manifest::load(&args.config)?;
    // surface configuration errors here instead of at run time
    Pipeline::from_descriptors(manifest.hooks.clone(), manifest.engine)?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&manifest.hooks)?);
        return Ok(());
    }

    for hook in &manifest.hooks {
        let mode = if hook.mutating { "rewrites" } else { "checks" };
        let mut line = format!("{:<28} {mode}", hook.id);
        if !hook.depends_on.is_empty() {
            line.push_str(&format!("  (after: {})", hook.depends_on.join(", ")));
        }
        if !hook.enabled {
            line.push_str("  [disabled]");
        }
        println!("{line}");
    }
    Ok(())
}
