use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result, SyncFailedDetails};
use crate::utils::command::{CommandSpec, ProcessRunner};

/// Where a path sits relative to version control.
///
/// Built fresh for every operation; pulls and pushes can move the tree
/// underneath a cached handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryHandle {
    pub working_dir: PathBuf,
    pub top_level_dir: PathBuf,
    pub is_submodule: bool,
}

/// Answers repository-membership questions by probing `git rev-parse`.
pub struct RepositoryLocator<'a> {
    runner: &'a dyn ProcessRunner,
}

impl<'a> RepositoryLocator<'a> {
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        Self { runner }
    }

    /// Whether `path` is inside a working copy. Logs a warning when it is not.
    pub fn is_repository(&self, path: &Path) -> bool {
        let output = self
            .runner
            .execute(&CommandSpec::git(["rev-parse", "--git-dir"]), path);
        if output.success() {
            true
        } else {
            log_warn!("git", "{} is not a git repo, skipping...", path.display());
            false
        }
    }

    /// Outermost directory of the working copy containing `path`.
    pub fn top_level(&self, path: &Path) -> Result<PathBuf> {
        let command = CommandSpec::git(["rev-parse", "--show-toplevel"]);
        let output = self.runner.execute(&command, path);
        if !output.success() || output.trimmed().is_empty() {
            return Err(Error::git_sync_failed(SyncFailedDetails {
                command: command.to_string(),
                path: path.display().to_string(),
                exit_code: output.exit_code,
                output: output.output,
            }));
        }
        Ok(PathBuf::from(output.trimmed()))
    }

    /// True when the directory above `path`'s top level belongs to another
    /// working copy.
    pub fn is_submodule(&self, path: &Path) -> bool {
        let Some(top) = self.find_top_level(path) else {
            return false;
        };
        self.enclosing_root(&top).is_some()
    }

    /// Walks upward while each parent still resolves to a repository and
    /// returns the last root found. A path whose parent is outside version
    /// control comes back as its own top level.
    pub fn enclosing_super_repository(&self, path: &Path) -> PathBuf {
        let mut current = self
            .find_top_level(path)
            .unwrap_or_else(|| path.to_path_buf());

        while let Some(root) = self.enclosing_root(&current) {
            log_status!("git", "{} is nested in {}", current.display(), root.display());
            current = root;
        }

        current
    }

    pub fn locate(&self, path: &Path) -> Option<RepositoryHandle> {
        let top_level_dir = self.find_top_level(path)?;
        let is_submodule = self.enclosing_root(&top_level_dir).is_some();
        Some(RepositoryHandle {
            working_dir: path.to_path_buf(),
            top_level_dir,
            is_submodule,
        })
    }

    /// Top level of the repository containing `root`'s parent, if any.
    fn enclosing_root(&self, root: &Path) -> Option<PathBuf> {
        let parent = root.parent()?;
        if parent == root {
            return None;
        }
        self.find_top_level(parent)
            .filter(|enclosing| enclosing.as_path() != root)
    }

    /// Silent variant of [`top_level`](Self::top_level) for upward walks.
    pub(crate) fn find_top_level(&self, path: &Path) -> Option<PathBuf> {
        let output = self
            .runner
            .execute(&CommandSpec::git(["rev-parse", "--show-toplevel"]), path);
        if output.success() && !output.trimmed().is_empty() {
            Some(PathBuf::from(output.trimmed()))
        } else {
            None
        }
    }
}
