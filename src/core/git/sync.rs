use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cookbook::CookbookRef;
use crate::error::{Error, Result, SyncFailedDetails};
use crate::utils::command::{CommandSpec, ProcessOutput, ProcessRunner};

use super::locator::RepositoryLocator;

pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_BRANCH: &str = "master";

const AUTOSTASH_MESSAGE: &str = "spork: autostash before pull";
const NOTHING_TO_COMMIT: [&str; 3] = [
    "nothing to commit",
    "nothing added to commit",
    "no changes added to commit",
];

/// Remote and branch used for pushes. Unset values fall back to
/// `origin` / `master`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    Committed,
    NothingToCommit,
}

/// Result of an operation whose failure degrades the run without ending it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PublishOutcome {
    Published,
    Failed { message: String, output: String },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published)
    }
}

/// Git synchronization bound to one working copy for the whole invocation.
///
/// Pulls, submodule pulls and adds take an explicit path and are fatal on
/// failure. Commits, pushes and tags run against the bound repository.
pub struct GitSync {
    runner: Arc<dyn ProcessRunner>,
    root: PathBuf,
    settings: GitSettings,
}

impl GitSync {
    /// Bind to the working copy containing `workdir`.
    pub fn open(
        workdir: &Path,
        runner: Arc<dyn ProcessRunner>,
        settings: GitSettings,
    ) -> Result<Self> {
        let root = RepositoryLocator::new(runner.as_ref())
            .find_top_level(workdir)
            .ok_or_else(|| {
                log_error!(
                    "git",
                    "You are not currently in a git repository: {}",
                    workdir.display()
                );
                Error::git_not_a_repository(workdir.display().to_string())
            })?;

        Ok(Self {
            runner,
            root,
            settings,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn remote(&self) -> &str {
        self.settings.remote.as_deref().unwrap_or(DEFAULT_REMOTE)
    }

    pub fn branch(&self) -> &str {
        self.settings.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }

    pub fn locator(&self) -> RepositoryLocator<'_> {
        RepositoryLocator::new(self.runner.as_ref())
    }

    /// Stash local edits, pull, then restore the stash.
    pub fn pull(&self, path: &Path) -> Result<()> {
        log_status!("git", "Git Pull {}", path.display());
        if !self.locator().is_repository(path) {
            return Ok(());
        }

        log_status!("git", "Pulling latest changes from {}", path.display());
        let stash_before = self.stash_top(path);
        self.require(
            path,
            CommandSpec::git(["stash", "push", "--include-untracked", "-m", AUTOSTASH_MESSAGE]),
        )?;
        let stashed = match self.stash_top(path) {
            Some(top) => stash_before.as_deref() != Some(top.as_str()),
            None => false,
        };
        let stash_kept = || {
            format!(
                "Local changes in {} are still stashed; run `git stash pop` there once the conflict is resolved",
                path.display()
            )
        };

        if let Err(err) = self.require(path, CommandSpec::git(["pull"])) {
            if stashed {
                return Err(err.with_hint(stash_kept()));
            }
            return Err(err);
        }

        if stashed {
            self.require(path, CommandSpec::git(["stash", "pop"]))
                .map_err(|err| err.with_hint(stash_kept()))?;
        }
        Ok(())
    }

    /// Object id of the newest stash entry, if any.
    fn stash_top(&self, path: &Path) -> Option<String> {
        let out = self.runner.execute(
            &CommandSpec::git(["rev-parse", "-q", "--verify", "refs/stash"]),
            path,
        );
        if out.success() && !out.trimmed().is_empty() {
            Some(out.trimmed().to_string())
        } else {
            None
        }
    }

    /// Pull every submodule, starting from the outermost enclosing repository.
    pub fn pull_submodules(&self, path: &Path) -> Result<()> {
        let locator = self.locator();
        if !locator.is_repository(path) {
            return Ok(());
        }

        log_status!("git", "Pulling latest changes from git submodules (if any)");
        let mut top_level = locator.top_level(path)?;
        if locator.is_submodule(&top_level) {
            top_level = locator.enclosing_super_repository(&top_level);
        }

        self.require(
            &top_level,
            CommandSpec::git(["submodule", "foreach", "git", "pull"]),
        )?;
        Ok(())
    }

    /// Stage a single file relative to `path`.
    pub fn add(&self, path: &Path, filename: &str) -> Result<()> {
        log_status!("git", "Git Add {}", filename);
        if !self.locator().is_repository(path) {
            return Ok(());
        }

        log_status!("git", "Git add'ing {}", path.join(filename).display());
        self.require(path, CommandSpec::git(["add", "--", filename]))?;
        Ok(())
    }

    /// Stage everything, including deletions, and commit.
    pub fn commit_all(&self, message: &str) -> Result<CommitOutcome> {
        log_status!("git", "Committing changes");
        let root = self.root.clone();

        self.require(&root, CommandSpec::git(["add", "."]))?;

        // `add .` does not reliably record removals; stage them explicitly.
        let deleted = self.require(&root, CommandSpec::git(["ls-files", "-z", "--deleted"]))?;
        let removed: Vec<String> = deleted
            .output
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        if !removed.is_empty() {
            let mut args = vec![
                "rm".to_string(),
                "--quiet".to_string(),
                "--ignore-unmatch".to_string(),
                "--".to_string(),
            ];
            args.extend(removed);
            self.require(&root, CommandSpec::git(args))?;
        }

        let staged = self
            .runner
            .execute(&CommandSpec::git(["diff", "--cached", "--quiet"]), &root);
        if staged.success() {
            log_status!("git", "Nothing to commit");
            return Ok(CommitOutcome::NothingToCommit);
        }

        let command = CommandSpec::git(["commit", "-m", message]);
        let output = self.runner.execute(&command, &root);
        if output.success() {
            return Ok(CommitOutcome::Committed);
        }
        if NOTHING_TO_COMMIT.iter().any(|p| output.output.contains(p)) {
            log_status!("git", "Nothing to commit");
            return Ok(CommitOutcome::NothingToCommit);
        }
        Err(self.sync_failure(&root, &command, output))
    }

    /// Push the configured branch. Failures are reported, never raised.
    pub fn push(&self, include_tags: bool) -> PublishOutcome {
        log_status!("git", "Git Push");
        let remote = self.remote();
        let branch = self.branch();
        let failure = |output: ProcessOutput| {
            let message = format!("Could not push to remote {}/{}. Does it exist?", remote, branch);
            log_error!("git", "{}", message);
            PublishOutcome::Failed {
                message,
                output: output.output,
            }
        };

        let output = self
            .runner
            .execute(&CommandSpec::git(["push", remote, branch]), &self.root);
        if !output.success() {
            return failure(output);
        }

        if include_tags {
            let output = self
                .runner
                .execute(&CommandSpec::git(["push", "--tags", remote]), &self.root);
            if !output.success() {
                return failure(output);
            }
        }

        PublishOutcome::Published
    }

    /// Create a lightweight tag. Failures are reported, never raised.
    pub fn tag(&self, name: &str) -> PublishOutcome {
        log_status!("git", "Git Tag {}", name);
        let output = self
            .runner
            .execute(&CommandSpec::git(["tag", name]), &self.root);
        if output.success() {
            return PublishOutcome::Published;
        }

        let message = format!("Could not tag {}. Does it already exist?", name);
        log_error!("git", "{}", message);
        log_error!("git", "You may need to delete the tag before running promote again.");
        PublishOutcome::Failed {
            message,
            output: output.output,
        }
    }

    /// Run a command whose failure ends the run, echoing its output.
    fn require(&self, dir: &Path, command: CommandSpec) -> Result<ProcessOutput> {
        let output = self.runner.execute(&command, dir);
        if output.success() {
            Ok(output)
        } else {
            Err(self.sync_failure(dir, &command, output))
        }
    }

    fn sync_failure(&self, dir: &Path, command: &CommandSpec, output: ProcessOutput) -> Error {
        log_error!("git", "{}\n{}", command, output.output);
        Error::git_sync_failed(SyncFailedDetails {
            command: command.to_string(),
            path: dir.display().to_string(),
            exit_code: output.exit_code,
            output: output.output,
        })
    }
}

/// `name@version` pairs joined with `-`.
pub fn tag_name(cookbooks: &[CookbookRef]) -> String {
    cookbooks
        .iter()
        .map(CookbookRef::qualified_name)
        .collect::<Vec<_>>()
        .join("-")
}
