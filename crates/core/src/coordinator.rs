//! Pipeline coordination: ordering, scheduling, and verdict aggregation.
//!
//! Hooks execute in declaration order. Ordering is a correctness requirement,
//! not a performance choice: mutation hooks change file content and later
//! hooks must observe the post-rewrite state. The only concurrency is across
//! consecutive runs of check-only, dependency-free hooks, which go onto a
//! bounded worker pool; their results are still reported in declaration
//! order.
//!
//! Per-hook transitions: a hook reporting an error status (launch failure,
//! timeout, cancellation) aborts the run and everything after it is skipped;
//! a plain failure (a finding) is recorded and the run continues, so one run
//! surfaces every violation.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::descriptor::HookDescriptor;
use crate::error::PipelineError;
use crate::runner::{CommandHook, HookResult, HookStatus, InvokeContext, RunnableHook};
use crate::selector::FileSet;

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Every hook ran and passed.
    Pass,
    /// Every hook ran; at least one reported findings.
    Fail,
    /// An error or cancellation stopped the run early.
    Aborted,
}

/// The only externally observed output of a run: aggregate status plus one
/// result per hook, in declaration order. Immutable after construction.
#[derive(Debug, Serialize)]
pub struct PipelineVerdict {
    pub status: VerdictStatus,
    pub results: Vec<HookResult>,
}

impl PipelineVerdict {
    /// Process exit code contract: 0 pass, 1 fail, 2 aborted.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            VerdictStatus::Pass => 0,
            VerdictStatus::Fail => 1,
            VerdictStatus::Aborted => 2,
        }
    }
}

/// An ordered, validated set of hooks ready to run against file sets.
///
/// Construction is fail-fast: duplicate ids, bad dependency references, and
/// malformed exclusion patterns are rejected before any hook executes. The
/// hook list is injected here rather than looked up in any global registry.
pub struct Pipeline {
    hooks: Vec<Arc<dyn RunnableHook>>,
    config: EngineConfig,
}

impl Pipeline {
    /// Build the production pipeline from descriptors. Disabled hooks are
    /// dropped (after id validation, so a disabled duplicate still fails).
    pub fn from_descriptors(
        descriptors: Vec<HookDescriptor>,
        config: EngineConfig,
    ) -> Result<Self, PipelineError> {
        validate_order(
            descriptors
                .iter()
                .map(|d| (d.id.as_str(), d.depends_on.as_slice())),
        )?;

        let mut hooks: Vec<Arc<dyn RunnableHook>> = Vec::new();
        for descriptor in descriptors {
            if !descriptor.enabled {
                debug!("hook '{}' disabled, dropping from pipeline", descriptor.id);
                continue;
            }
            hooks.push(Arc::new(CommandHook::new(descriptor)?));
        }
        Ok(Self { hooks, config })
    }

    /// Build a pipeline from arbitrary runnable hooks (other hook kinds, or
    /// test doubles).
    pub fn from_hooks(
        hooks: Vec<Arc<dyn RunnableHook>>,
        config: EngineConfig,
    ) -> Result<Self, PipelineError> {
        validate_order(hooks.iter().map(|h| (h.id(), h.depends_on())))?;
        Ok(Self { hooks, config })
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Run every hook against `files` and aggregate the verdict.
    pub async fn run(&self, files: &FileSet, cancel: CancellationToken) -> PipelineVerdict {
        let ctx = InvokeContext::new(files.root(), &self.config, cancel.clone());
        info!(
            "running {} hook(s) over {} file(s)",
            self.hooks.len(),
            files.len()
        );

        let total = self.hooks.len();
        let mut slots: Vec<Option<HookResult>> = (0..total).map(|_| None).collect();
        let mut aborted = false;
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));

        let mut index = 0;
        while index < total {
            if cancel.is_cancelled() {
                aborted = true;
                break;
            }

            let batch_end = self.batch_end(index);
            if batch_end - index == 1 {
                let hook = &self.hooks[index];
                let hook_files = files.matching(|p| hook.accepts(p));
                let result = hook.invoke(hook_files, &ctx).await;
                let is_error = result.status == HookStatus::Error;
                if is_error {
                    warn!("hook '{}' errored, aborting run", result.hook_id);
                }
                slots[index] = Some(result);
                index += 1;
                if is_error {
                    aborted = true;
                    break;
                }
            } else {
                // Concurrent batch of check-only, dependency-free hooks. An
                // error in one lets in-flight peers finish (their results are
                // kept) but keeps queued peers from starting.
                let batch_abort = CancellationToken::new();
                let mut join = JoinSet::new();
                for i in index..batch_end {
                    let hook = Arc::clone(&self.hooks[i]);
                    let hook_files = files.matching(|p| hook.accepts(p));
                    let ctx = ctx.clone();
                    let cancel = cancel.clone();
                    let batch_abort = batch_abort.clone();
                    let semaphore = Arc::clone(&semaphore);
                    join.spawn(async move {
                        let _permit = semaphore
                            .acquire_owned()
                            .await
                            .expect("worker semaphore is never closed");
                        if cancel.is_cancelled() || batch_abort.is_cancelled() {
                            return (i, HookResult::skipped(hook.id()));
                        }
                        let result = hook.invoke(hook_files, &ctx).await;
                        if result.status == HookStatus::Error {
                            batch_abort.cancel();
                        }
                        (i, result)
                    });
                }

                while let Some(joined) = join.join_next().await {
                    match joined {
                        Ok((i, result)) => {
                            if result.status == HookStatus::Error {
                                warn!("hook '{}' errored, aborting run", result.hook_id);
                                aborted = true;
                            }
                            slots[i] = Some(result);
                        }
                        Err(e) => {
                            warn!("hook task panicked: {e}");
                            aborted = true;
                        }
                    }
                }
                index = batch_end;
                if aborted {
                    break;
                }
            }
        }

        if cancel.is_cancelled() {
            aborted = true;
        }

        let results: Vec<HookResult> = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.unwrap_or_else(|| HookResult::skipped(self.hooks[i].id())))
            .collect();

        let status = if aborted {
            VerdictStatus::Aborted
        } else if results.iter().any(|r| r.status == HookStatus::Failed) {
            VerdictStatus::Fail
        } else {
            VerdictStatus::Pass
        };
        info!("pipeline {:?}", status);
        PipelineVerdict { status, results }
    }

    /// `[start, end)` of the maximal concurrent-safe batch beginning at
    /// `start`. Mutating or dependent hooks always batch alone: a mutating
    /// hook is never scheduled alongside anything (directory-level caches in
    /// hook programs make overlap analysis on file sets unsound), and a
    /// dependent hook must observe every predecessor's output.
    fn batch_end(&self, start: usize) -> usize {
        let independent =
            |hook: &Arc<dyn RunnableHook>| !hook.mutating() && hook.depends_on().is_empty();
        if !independent(&self.hooks[start]) {
            return start + 1;
        }
        let mut end = start + 1;
        while end < self.hooks.len() && independent(&self.hooks[end]) {
            end += 1;
        }
        end
    }
}

/// Reject duplicate ids and dependencies that do not point at an earlier
/// hook (unknown ids and forward references alike).
fn validate_order<'a>(
    hooks: impl Iterator<Item = (&'a str, &'a [String])>,
) -> Result<(), PipelineError> {
    let mut seen = std::collections::HashSet::new();
    for (id, depends_on) in hooks {
        for dependency in depends_on {
            if !seen.contains(dependency.as_str()) {
                return Err(PipelineError::BadDependency {
                    hook: id.to_string(),
                    dependency: dependency.clone(),
                });
            }
        }
        if !seen.insert(id) {
            return Err(PipelineError::DuplicateHookId(id.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::MockRunnableHook;
    use std::path::Path;
    use std::path::PathBuf;

    fn mock_hook(id: &str, status: HookStatus) -> Arc<dyn RunnableHook> {
        let id_owned = id.to_string();
        let mut mock = MockRunnableHook::new();
        mock.expect_id().return_const(id_owned.clone());
        mock.expect_mutating().return_const(false);
        mock.expect_depends_on().return_const(Vec::<String>::new());
        mock.expect_accepts().return_const(true);
        mock.expect_invoke().returning(move |_, _| HookResult {
            hook_id: id_owned.clone(),
            status,
            modified: Vec::new(),
            diagnostics: String::new(),
            duration_ms: 1,
        });
        Arc::new(mock)
    }

    fn sequential_mock(id: &str, status: HookStatus) -> Arc<dyn RunnableHook> {
        // mutating hooks batch alone, forcing strict declaration order
        let id_owned = id.to_string();
        let mut mock = MockRunnableHook::new();
        mock.expect_id().return_const(id_owned.clone());
        mock.expect_mutating().return_const(true);
        mock.expect_depends_on().return_const(Vec::<String>::new());
        mock.expect_accepts().return_const(true);
        mock.expect_invoke().returning(move |_, _| HookResult {
            hook_id: id_owned.clone(),
            status,
            modified: Vec::new(),
            diagnostics: String::new(),
            duration_ms: 1,
        });
        Arc::new(mock)
    }

    fn empty_files() -> FileSet {
        FileSet::from_paths(Path::new("."), vec![PathBuf::from("a.py")])
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let hooks = vec![
            mock_hook("fmt", HookStatus::Passed),
            mock_hook("fmt", HookStatus::Passed),
        ];
        assert!(matches!(
            Pipeline::from_hooks(hooks, EngineConfig::default()),
            Err(PipelineError::DuplicateHookId(_))
        ));
    }

    #[test]
    fn test_forward_dependency_rejected() {
        let mut early = MockRunnableHook::new();
        early.expect_id().return_const("early".to_string());
        early
            .expect_depends_on()
            .return_const(vec!["late".to_string()]);

        let mut late = MockRunnableHook::new();
        late.expect_id().return_const("late".to_string());
        late.expect_depends_on().return_const(Vec::<String>::new());

        let hooks: Vec<Arc<dyn RunnableHook>> = vec![Arc::new(early), Arc::new(late)];
        assert!(matches!(
            Pipeline::from_hooks(hooks, EngineConfig::default()),
            Err(PipelineError::BadDependency { .. })
        ));
    }

    #[test]
    fn test_disabled_duplicate_still_rejected() {
        let mut duplicate = HookDescriptor::command("fmt", "fmt");
        duplicate.enabled = false;
        let descriptors = vec![HookDescriptor::command("fmt", "fmt"), duplicate];
        assert!(matches!(
            Pipeline::from_descriptors(descriptors, EngineConfig::default()),
            Err(PipelineError::DuplicateHookId(_))
        ));
    }

    #[test]
    fn test_disabled_hooks_are_dropped() {
        let mut disabled = HookDescriptor::command("off", "off");
        disabled.enabled = false;
        let descriptors = vec![HookDescriptor::command("on", "on"), disabled];
        let pipeline = Pipeline::from_descriptors(descriptors, EngineConfig::default()).unwrap();
        assert_eq!(pipeline.hook_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_continues_and_fails_verdict() {
        let hooks = vec![
            sequential_mock("a", HookStatus::Failed),
            sequential_mock("b", HookStatus::Passed),
        ];
        let pipeline = Pipeline::from_hooks(hooks, EngineConfig::default()).unwrap();
        let verdict = pipeline.run(&empty_files(), CancellationToken::new()).await;

        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert_eq!(verdict.exit_code(), 1);
        assert_eq!(verdict.results[0].status, HookStatus::Failed);
        // the failure did not stop the second hook
        assert_eq!(verdict.results[1].status, HookStatus::Passed);
    }

    #[tokio::test]
    async fn test_error_aborts_and_skips_rest() {
        let hooks = vec![
            sequential_mock("a", HookStatus::Passed),
            sequential_mock("b", HookStatus::Error),
            sequential_mock("c", HookStatus::Passed),
        ];
        let pipeline = Pipeline::from_hooks(hooks, EngineConfig::default()).unwrap();
        let verdict = pipeline.run(&empty_files(), CancellationToken::new()).await;

        assert_eq!(verdict.status, VerdictStatus::Aborted);
        assert_eq!(verdict.exit_code(), 2);
        assert_eq!(verdict.results[1].status, HookStatus::Error);
        assert_eq!(verdict.results[2].status, HookStatus::Skipped);
    }

    #[tokio::test]
    async fn test_concurrent_batch_reports_in_declaration_order() {
        let hooks: Vec<Arc<dyn RunnableHook>> = vec![
            mock_hook("first", HookStatus::Passed),
            mock_hook("second", HookStatus::Failed),
            mock_hook("third", HookStatus::Passed),
        ];
        let pipeline = Pipeline::from_hooks(hooks, EngineConfig::default()).unwrap();
        let verdict = pipeline.run(&empty_files(), CancellationToken::new()).await;

        let order: Vec<&str> = verdict.results.iter().map(|r| r.hook_id.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
        assert_eq!(verdict.status, VerdictStatus::Fail);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_everything() {
        let hooks = vec![sequential_mock("a", HookStatus::Passed)];
        let pipeline = Pipeline::from_hooks(hooks, EngineConfig::default()).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let verdict = pipeline.run(&empty_files(), cancel).await;

        assert_eq!(verdict.status, VerdictStatus::Aborted);
        assert_eq!(verdict.results[0].status, HookStatus::Skipped);
    }

    #[tokio::test]
    async fn test_verdict_serializes_with_snake_case_statuses() {
        let hooks = vec![
            sequential_mock("a", HookStatus::Passed),
            sequential_mock("b", HookStatus::Error),
            sequential_mock("c", HookStatus::Passed),
        ];
        let pipeline = Pipeline::from_hooks(hooks, EngineConfig::default()).unwrap();
        let verdict = pipeline.run(&empty_files(), CancellationToken::new()).await;

        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["status"], "aborted");
        assert_eq!(json["results"][1]["status"], "error");
        assert_eq!(json["results"][2]["status"], "skipped");
    }

    #[tokio::test]
    async fn test_determinism_across_runs() {
        let descriptors = vec![HookDescriptor::command("true-1", "true"), {
            let mut d = HookDescriptor::command("true-2", "true");
            d.pass_filenames = false;
            d
        }];
        let pipeline = Pipeline::from_descriptors(descriptors, EngineConfig::default()).unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        let files = FileSet::discover(dir.path(), None).unwrap();

        let first = pipeline.run(&files, CancellationToken::new()).await;
        let second = pipeline.run(&files, CancellationToken::new()).await;
        assert_eq!(first.status, second.status);
        let statuses = |v: &PipelineVerdict| {
            v.results
                .iter()
                .map(|r| (r.hook_id.clone(), r.status))
                .collect::<Vec<_>>()
        };
        assert_eq!(statuses(&first), statuses(&second));
    }
}
