//! Human-readable rendering of a pipeline verdict.
//!
//! The report always enumerates every hook with its individual status, so a
//! reader can tell "this hook found problems" from "this hook could not run".

use std::fmt::Write;

use crate::coordinator::{PipelineVerdict, VerdictStatus};
use crate::runner::HookStatus;
use crate::selector::normalize;

pub fn render(verdict: &PipelineVerdict) -> String {
    let mut out = String::new();

    for result in &verdict.results {
        match result.status {
            HookStatus::Skipped => {
                let _ = writeln!(out, "{:<7} {}", result.status.as_str(), result.hook_id);
            }
            _ => {
                let _ = writeln!(
                    out,
                    "{:<7} {:<28} ({} ms)",
                    result.status.as_str(),
                    result.hook_id,
                    result.duration_ms
                );
            }
        }
        for path in &result.modified {
            let _ = writeln!(out, "        rewrote {}", normalize(path));
        }
        if matches!(result.status, HookStatus::Failed | HookStatus::Error) {
            for line in result.diagnostics.lines() {
                let _ = writeln!(out, "        {line}");
            }
        }
    }

    let failed = verdict
        .results
        .iter()
        .filter(|r| r.status == HookStatus::Failed)
        .count();
    let summary = match verdict.status {
        VerdictStatus::Pass => "pipeline: passed".to_string(),
        VerdictStatus::Fail => format!("pipeline: failed ({failed} hook(s) reported findings)"),
        VerdictStatus::Aborted => "pipeline: aborted".to_string(),
    };
    let _ = writeln!(out, "{summary}");

    out
}
