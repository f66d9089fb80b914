//! Error taxonomy for pipeline construction and file selection.
//!
//! Only configuration-time problems surface as `Err` values: a malformed
//! exclusion pattern, a duplicate hook id, a dependency on a hook that does
//! not run earlier, or an unreadable repository root. Problems during hook
//! execution (missing binaries, lint findings, timeouts) are never errors at
//! this level: they become [`HookResult`](crate::runner::HookResult) values
//! and are handled by the coordinator's state transitions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Two hooks in the same pipeline share an id.
    #[error("duplicate hook id '{0}'")]
    DuplicateHookId(String),

    /// An exclusion pattern failed to compile. `scope` names the owner
    /// ("hook 'black'" or "global exclude").
    #[error("invalid exclude pattern for {scope}: {source}")]
    InvalidExcludePattern {
        scope: String,
        #[source]
        source: regex::Error,
    },

    /// A hook depends on an id that is unknown or declared after it.
    #[error("hook '{hook}' depends on '{dependency}', which does not run before it")]
    BadDependency { hook: String, dependency: String },

    /// File selection could not read the repository root.
    #[error("file selection failed: {0}")]
    Io(#[from] std::io::Error),
}
