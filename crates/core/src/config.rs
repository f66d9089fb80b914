//! Engine-level settings supplied by the configuration collaborator.

use serde::{Deserialize, Serialize};

/// Tuning knobs for a pipeline run. All fields have workable defaults, so an
/// empty `[engine]` table (or none at all) is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on concurrently running check-only hooks.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Per-hook deadline in milliseconds when a descriptor does not set its
    /// own. `None` means no deadline.
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,

    /// Grace period before a hook process is forcibly terminated after a
    /// cancellation signal.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    /// Global exclusion pattern applied when building the base file set.
    #[serde(default)]
    pub exclude: Option<String>,

    /// Approximate command-line budget per hook invocation; longer file
    /// lists are split into multiple invocations.
    #[serde(default = "default_max_command_bytes")]
    pub max_command_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            default_timeout_ms: None,
            kill_grace_ms: default_kill_grace_ms(),
            exclude: None,
            max_command_bytes: default_max_command_bytes(),
        }
    }
}

fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_kill_grace_ms() -> u64 {
    2000
}

fn default_max_command_bytes() -> usize {
    128 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_uses_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert!(config.max_workers >= 1);
        assert_eq!(config.default_timeout_ms, None);
        assert_eq!(config.kill_grace_ms, 2000);
        assert_eq!(config.exclude, None);
        assert_eq!(config.max_command_bytes, 128 * 1024);
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            max_workers = 2
            default_timeout_ms = 30000
            exclude = '^vendor/'
            "#,
        )
        .unwrap();
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.default_timeout_ms, Some(30000));
        assert_eq!(config.exclude.as_deref(), Some("^vendor/"));
    }
}
