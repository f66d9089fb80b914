//! Hook invocation: spawning one hook against its selected files.
//!
//! The coordinator only depends on the [`RunnableHook`] trait; [`CommandHook`]
//! is the production implementation wrapping an external program. Exit codes
//! map to statuses as follows: zero is a pass, non-zero is a failure
//! (a code-quality finding), and anything that prevents the program from
//! running to completion (spawn failure, deadline, cancellation) is an
//! error, which is fatal for the whole run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::descriptor::HookDescriptor;
use crate::error::PipelineError;
use crate::selector::{PathFilter, normalize};

/// Outcome of one hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    /// Hook ran and reported no findings.
    Passed,
    /// Hook ran and reported findings (non-zero exit), or rewrote files.
    Failed,
    /// Hook could not run to completion: launch failure, timeout, or
    /// cancellation. Always fatal for the run.
    Error,
    /// Hook never ran because an earlier error or cancellation aborted the run.
    Skipped,
}

impl HookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookStatus::Passed => "passed",
            HookStatus::Failed => "failed",
            HookStatus::Error => "error",
            HookStatus::Skipped => "skipped",
        }
    }
}

/// Result of one (hook, run) pair. Created at the end of an invocation,
/// consumed by the coordinator, discarded after aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct HookResult {
    pub hook_id: String,
    pub status: HookStatus,
    /// Files the hook rewrote, from snapshot comparison. Always empty for
    /// check-only hooks, whatever the tool did.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modified: Vec<PathBuf>,
    /// Captured stdout/stderr, or the launch problem.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub diagnostics: String,
    pub duration_ms: u64,
}

impl HookResult {
    pub fn skipped(hook_id: &str) -> Self {
        Self {
            hook_id: hook_id.to_string(),
            status: HookStatus::Skipped,
            modified: Vec::new(),
            diagnostics: String::new(),
            duration_ms: 0,
        }
    }
}

/// Per-run context shared by every invocation.
#[derive(Debug, Clone)]
pub struct InvokeContext {
    /// Repository root: working directory for hook processes and base for
    /// snapshot hashing.
    pub root: PathBuf,
    pub cancel: CancellationToken,
    pub default_timeout: Option<Duration>,
    pub kill_grace: Duration,
    pub max_command_bytes: usize,
}

impl InvokeContext {
    pub fn new(root: &Path, config: &EngineConfig, cancel: CancellationToken) -> Self {
        Self {
            root: root.to_path_buf(),
            cancel,
            default_timeout: config.default_timeout_ms.map(Duration::from_millis),
            kill_grace: Duration::from_millis(config.kill_grace_ms),
            max_command_bytes: config.max_command_bytes,
        }
    }
}

/// Anything with an identity that can be invoked against a file set. The
/// coordinator schedules and aggregates through this trait only, so new hook
/// kinds plug in without touching it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunnableHook: Send + Sync {
    fn id(&self) -> &str;

    /// Whether this hook may rewrite files in place. Mutating hooks are
    /// never scheduled concurrently with anything.
    fn mutating(&self) -> bool {
        false
    }

    /// Ids of hooks whose completion this hook requires.
    fn depends_on(&self) -> &[String] {
        &[]
    }

    /// Applicability filter over root-relative paths.
    fn accepts(&self, path: &Path) -> bool {
        let _ = path;
        true
    }

    async fn invoke(&self, files: Vec<PathBuf>, ctx: &InvokeContext) -> HookResult;
}

/// The production hook: one external program plus its declared arguments,
/// with the filtered file list appended.
pub struct CommandHook {
    descriptor: HookDescriptor,
    filter: Option<PathFilter>,
}

impl CommandHook {
    /// Compiles the descriptor's exclusion pattern up front, so a malformed
    /// pattern fails pipeline construction before any hook executes.
    pub fn new(descriptor: HookDescriptor) -> Result<Self, PipelineError> {
        let filter = match descriptor.exclude.as_deref() {
            Some(pattern) => Some(PathFilter::compile(
                pattern,
                &format!("hook '{}'", descriptor.id),
            )?),
            None => None,
        };
        Ok(Self { descriptor, filter })
    }

    /// Split the file list so each invocation's command line stays under the
    /// configured budget. At least one file per chunk; hooks that take no
    /// filenames get a single bare invocation.
    fn chunks<'a>(&self, files: &'a [PathBuf], max_bytes: usize) -> Vec<&'a [PathBuf]> {
        if !self.descriptor.pass_filenames {
            return vec![&files[..0]];
        }
        let base: usize = self.descriptor.program.len()
            + self
                .descriptor
                .args
                .iter()
                .map(|arg| arg.len() + 1)
                .sum::<usize>();

        let mut out = Vec::new();
        let mut start = 0;
        let mut budget = base;
        for (i, file) in files.iter().enumerate() {
            let cost = normalize(file).len() + 1;
            if i > start && budget + cost > max_bytes {
                out.push(&files[start..i]);
                start = i;
                budget = base;
            }
            budget += cost;
        }
        out.push(&files[start..]);
        out
    }

    async fn invoke_once(
        &self,
        files: &[PathBuf],
        remaining: Option<Duration>,
        ctx: &InvokeContext,
    ) -> Invocation {
        let mut command = Command::new(&self.descriptor.program);
        command
            .args(&self.descriptor.args)
            .args(files)
            .current_dir(&ctx.root)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = command.output();
        tokio::pin!(output);

        let deadline = async {
            match remaining {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            res = &mut output => match res {
                Ok(output) => Invocation::Completed(output),
                Err(e) => Invocation::LaunchFailed(e),
            },
            _ = deadline => Invocation::TimedOut,
            _ = ctx.cancel.cancelled() => {
                // bounded grace for an in-flight process; dropping the
                // future kills the child (kill_on_drop)
                match tokio::time::timeout(ctx.kill_grace, &mut output).await {
                    Ok(Ok(output)) => Invocation::Completed(output),
                    Ok(Err(e)) => Invocation::LaunchFailed(e),
                    Err(_) => Invocation::Cancelled,
                }
            }
        }
    }
}

enum Invocation {
    Completed(std::process::Output),
    LaunchFailed(std::io::Error),
    TimedOut,
    Cancelled,
}

#[async_trait]
impl RunnableHook for CommandHook {
    fn id(&self) -> &str {
        &self.descriptor.id
    }

    fn mutating(&self) -> bool {
        self.descriptor.mutating
    }

    fn depends_on(&self) -> &[String] {
        &self.descriptor.depends_on
    }

    fn accepts(&self, path: &Path) -> bool {
        self.filter.as_ref().is_none_or(|filter| !filter.excludes(path))
    }

    async fn invoke(&self, files: Vec<PathBuf>, ctx: &InvokeContext) -> HookResult {
        let start = Instant::now();
        let id = self.descriptor.id.clone();

        if files.is_empty() && self.descriptor.pass_filenames {
            debug!("hook '{id}': no files to check");
            return HookResult {
                hook_id: id,
                status: HookStatus::Passed,
                modified: Vec::new(),
                diagnostics: String::new(),
                duration_ms: start.elapsed().as_millis() as u64,
            };
        }

        let before = self
            .descriptor
            .mutating
            .then(|| snapshot(&ctx.root, &files));

        let budget = self
            .descriptor
            .timeout_ms
            .map(Duration::from_millis)
            .or(ctx.default_timeout);
        let deadline = budget.map(|d| start + d);

        let mut status = HookStatus::Passed;
        let mut diagnostics = String::new();

        for chunk in self.chunks(&files, ctx.max_command_bytes) {
            // The deadline covers the whole hook, not each chunk.
            let remaining = deadline.map(|at| at.saturating_duration_since(Instant::now()));
            if let Some(left) = remaining
                && left.is_zero()
            {
                status = HookStatus::Error;
                push_line(
                    &mut diagnostics,
                    &format!("timed out after {}ms", budget.unwrap_or_default().as_millis()),
                );
                break;
            }

            match self.invoke_once(chunk, remaining, ctx).await {
                Invocation::Completed(output) => {
                    if !output.status.success() {
                        status = HookStatus::Failed;
                    }
                    push_line(&mut diagnostics, &collect_output(&output));
                }
                Invocation::LaunchFailed(e) => {
                    warn!("hook '{id}': failed to launch '{}': {e}", self.descriptor.program);
                    status = HookStatus::Error;
                    push_line(
                        &mut diagnostics,
                        &format!("failed to launch '{}': {e}", self.descriptor.program),
                    );
                    break;
                }
                Invocation::TimedOut => {
                    warn!("hook '{id}': timed out");
                    status = HookStatus::Error;
                    push_line(
                        &mut diagnostics,
                        &format!("timed out after {}ms", budget.unwrap_or_default().as_millis()),
                    );
                    break;
                }
                Invocation::Cancelled => {
                    status = HookStatus::Error;
                    push_line(&mut diagnostics, "cancelled before completion");
                    break;
                }
            }
        }

        let modified = match before {
            Some(before) => changed_files(&ctx.root, &files, &before),
            None => Vec::new(),
        };
        if !modified.is_empty() && status == HookStatus::Passed {
            // formatters may exit 0 after rewriting; a rewrite is a finding
            status = HookStatus::Failed;
            push_line(
                &mut diagnostics,
                &format!("rewrote {} file(s)", modified.len()),
            );
        }

        debug!("hook '{id}': {}", status.as_str());
        HookResult {
            hook_id: id,
            status,
            modified,
            diagnostics,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

fn push_line(diagnostics: &mut String, line: &str) {
    if line.is_empty() {
        return;
    }
    if !diagnostics.is_empty() {
        diagnostics.push('\n');
    }
    diagnostics.push_str(line);
}

fn collect_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, true) => String::new(),
        (false, true) => stdout.trim_end().to_string(),
        (true, false) => stderr.trim_end().to_string(),
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr.trim_end()),
    }
}

type ContentHash = [u8; 32];

fn snapshot(root: &Path, files: &[PathBuf]) -> HashMap<PathBuf, Option<ContentHash>> {
    files
        .iter()
        .map(|file| (file.clone(), hash_file(&root.join(file))))
        .collect()
}

fn hash_file(path: &Path) -> Option<ContentHash> {
    let bytes = std::fs::read(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Some(hasher.finalize().into())
}

/// Files whose content hash differs from the pre-invocation snapshot,
/// including files the hook created or deleted.
fn changed_files(
    root: &Path,
    files: &[PathBuf],
    before: &HashMap<PathBuf, Option<ContentHash>>,
) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|file| {
            let after = hash_file(&root.join(file));
            before.get(*file).copied().unwrap_or(None) != after
        })
        .cloned()
        .collect()
}
