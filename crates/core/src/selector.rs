//! File selection: the candidate set for a run, and per-hook filtering.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::PipelineError;

/// Compiled exclusion pattern, matched against normalized relative paths.
#[derive(Debug, Clone)]
pub struct PathFilter {
    pattern: Regex,
}

impl PathFilter {
    /// Compile `pattern`, attributing failures to `scope` (e.g. "hook 'black'"
    /// or "global exclude") so the configuration error names its owner.
    pub fn compile(pattern: &str, scope: &str) -> Result<Self, PipelineError> {
        let pattern =
            Regex::new(pattern).map_err(|source| PipelineError::InvalidExcludePattern {
                scope: scope.to_string(),
                source,
            })?;
        Ok(Self { pattern })
    }

    /// Whether `path` is excluded by this filter.
    pub fn excludes(&self, path: &Path) -> bool {
        self.pattern.is_match(&normalize(path))
    }
}

/// Forward-slash form of a relative path, used for pattern matching and for
/// the stable ordering guarantee.
pub fn normalize(path: &Path) -> String {
    let text = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        text.into_owned()
    } else {
        text.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// The candidate files for one pipeline run: root-relative paths, stable-sorted
/// and deduplicated. Produced once per run, then filtered per hook.
#[derive(Debug, Clone)]
pub struct FileSet {
    root: PathBuf,
    paths: Vec<PathBuf>,
}

impl FileSet {
    /// Walk `root` and collect candidate files, respecting `.gitignore`,
    /// `.ignore`, and hidden-file conventions. Unreadable entries are logged
    /// and skipped; a missing root is an error.
    pub fn discover(root: &Path, exclude: Option<&PathFilter>) -> Result<Self, PipelineError> {
        if !root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("repository root {} is not a directory", root.display()),
            )
            .into());
        }

        let mut paths = Vec::new();
        for entry in WalkBuilder::new(root).standard_filters(true).build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();
            if exclude.is_some_and(|filter| filter.excludes(&rel)) {
                continue;
            }
            paths.push(rel);
        }

        debug!("selected {} candidate file(s) under {}", paths.len(), root.display());
        Ok(Self::from_paths(root, paths))
    }

    /// Build a file set from an explicit list of root-relative paths (run
    /// mode where the caller already knows the candidates, e.g. changed
    /// files). Same ordering and dedup guarantees as [`FileSet::discover`].
    pub fn from_paths(root: &Path, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut paths: Vec<PathBuf> = paths.into_iter().collect();
        paths.sort_by_cached_key(|p| normalize(p));
        paths.dedup();
        Self {
            root: root.to_path_buf(),
            paths,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// The per-hook view: every candidate accepted by `accept`, in order.
    pub fn matching(&self, accept: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
        self.paths
            .iter()
            .filter(|path| accept(path))
            .cloned()
            .collect()
    }
}
