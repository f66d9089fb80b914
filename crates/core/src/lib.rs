//! Hookline core: a hook-pipeline execution engine.
//!
//! Given an ordered list of hook declarations (formatters and linters), the
//! engine resolves which files each hook should see, invokes each hook as an
//! external process, and aggregates the results into a single verdict:
//!
//! - [`selector`] builds the candidate file set and applies exclusion
//!   patterns.
//! - [`descriptor`] is the immutable declaration of one hook.
//! - [`runner`] invokes a hook, captures output and exit status, and detects
//!   in-place rewrites by content hashing.
//! - [`coordinator`] orders hooks, schedules safe concurrency, and produces
//!   the [`PipelineVerdict`].
//!
//! Fetching hook implementations, managing their environments, and parsing
//! any upstream configuration syntax are left to external collaborators.

pub mod config;
pub mod coordinator;
pub mod descriptor;
pub mod error;
pub mod report;
pub mod runner;
pub mod selector;

pub use config::EngineConfig;
pub use coordinator::{Pipeline, PipelineVerdict, VerdictStatus};
pub use descriptor::HookDescriptor;
pub use error::PipelineError;
pub use runner::{CommandHook, HookResult, HookStatus, InvokeContext, RunnableHook};
pub use selector::{FileSet, PathFilter};
