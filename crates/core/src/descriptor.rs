//! Declarative description of a single hook.

use serde::{Deserialize, Serialize};

/// One hook declaration: identity, invocation arguments, applicability
/// filter, and mutation mode.
///
/// Descriptors are immutable inputs; declaration order in the pipeline is
/// significant because later rewriting hooks see files modified by earlier
/// ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookDescriptor {
    /// Unique id within the pipeline.
    pub id: String,

    /// Program to invoke.
    pub program: String,

    /// Arguments passed ahead of the file list.
    #[serde(default)]
    pub args: Vec<String>,

    /// Regular expression over relative paths; matching files are excluded
    /// from this hook's invocation.
    #[serde(default)]
    pub exclude: Option<String>,

    /// Whether the hook may rewrite files in place (formatter) as opposed to
    /// only reporting findings (linter).
    #[serde(default)]
    pub mutating: bool,

    /// Ids of hooks that must complete before this one starts.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Per-hook deadline in milliseconds, overriding the engine default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Disabled hooks are dropped from the pipeline entirely.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Append the selected file list to the arguments. Disable for hooks
    /// that discover their own inputs; such hooks run exactly once even when
    /// no files match.
    #[serde(default = "default_pass_filenames")]
    pub pass_filenames: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_pass_filenames() -> bool {
    true
}

impl HookDescriptor {
    /// Minimal descriptor for `program` with defaults everywhere else.
    /// The id doubles as the program name, like most real hook declarations.
    pub fn command(id: &str, program: &str) -> Self {
        Self {
            id: id.to_string(),
            program: program.to_string(),
            args: Vec::new(),
            exclude: None,
            mutating: false,
            depends_on: Vec::new(),
            timeout_ms: None,
            enabled: true,
            pass_filenames: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_defaults() {
        let descriptor: HookDescriptor = toml::from_str(
            r#"
            id = "trailing-whitespace"
            program = "trailing-whitespace-fixer"
            "#,
        )
        .unwrap();

        assert_eq!(descriptor.id, "trailing-whitespace");
        assert!(descriptor.args.is_empty());
        assert_eq!(descriptor.exclude, None);
        assert!(!descriptor.mutating);
        assert!(descriptor.depends_on.is_empty());
        assert_eq!(descriptor.timeout_ms, None);
        assert!(descriptor.enabled);
        assert!(descriptor.pass_filenames);
    }

    #[test]
    fn test_toml_full_declaration() {
        let descriptor: HookDescriptor = toml::from_str(
            r#"
            id = "docformatter"
            program = "docformatter"
            args = ["--in-place", "--wrap-summaries", "88"]
            exclude = '^migrations/'
            mutating = true
            depends_on = ["isort"]
            timeout_ms = 60000
            "#,
        )
        .unwrap();

        assert_eq!(descriptor.args.len(), 3);
        assert!(descriptor.mutating);
        assert_eq!(descriptor.depends_on, vec!["isort".to_string()]);
        assert_eq!(descriptor.timeout_ms, Some(60000));
    }
}
