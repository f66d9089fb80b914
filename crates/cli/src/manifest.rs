//! Pipeline manifest loading.
//!
//! The engine takes an ordered descriptor list and settings from whoever
//! loads configuration; this module is that collaborator for the CLI. The
//! manifest is TOML: an optional `[engine]` table plus `[[hooks]]` entries in
//! execution order.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use hookline_core::{EngineConfig, HookDescriptor};

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub hooks: Vec<HookDescriptor>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let manifest: Manifest = toml::from_str(&content)
            .with_context(|| format!("failed to parse manifest {}", path.display()))?;
        Ok(manifest)
    }
}
