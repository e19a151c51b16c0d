use std::path::Path;

use crate::cookbook::METADATA_FILE;
use crate::error::Result;
use crate::hooks::{Hook, HookContext, Plugin};

use super::sync::{tag_name, GitSync};

pub const PLUGIN_NAME: &str = "git";

const PRE_COMMIT_PREFIX: &str = "[PreCommit] Bumping cookbooks:";
const BUMP_COMMIT_PREFIX: &str = "[Spork] Bumping cookbooks:";

/// Keeps cookbook and environment repositories synchronized around each
/// pipeline stage: pull before trusting local state, push after mutating it.
pub struct GitPlugin {
    sync: GitSync,
    tag_on_promote: bool,
}

impl GitPlugin {
    pub fn new(sync: GitSync, tag_on_promote: bool) -> Self {
        Self {
            sync,
            tag_on_promote,
        }
    }

    fn pull_all(&self, path: &Path) -> Result<()> {
        self.sync.pull(path)?;
        self.sync.pull_submodules(path)
    }

    /// Whether the environment path lives in the same repository as any of
    /// the cookbooks, in which case the cookbook sweep already covers it.
    fn environment_shares_repository(&self, ctx: &HookContext) -> bool {
        let locator = self.sync.locator();
        let Some(env_root) = locator.find_top_level(&ctx.environment_path) else {
            return false;
        };
        ctx.cookbooks
            .iter()
            .filter_map(|c| locator.find_top_level(&c.root_dir))
            .any(|root| root == env_root)
    }

    fn sweep(&self, ctx: &HookContext) -> Result<()> {
        if self.environment_shares_repository(ctx) {
            log_status!(
                "git",
                "{} shares a repository with the cookbooks, skipping separate pull",
                ctx.environment_path.display()
            );
        } else {
            self.pull_all(&ctx.environment_path)?;
        }

        for cookbook in &ctx.cookbooks {
            self.pull_all(&cookbook.root_dir)?;
        }
        Ok(())
    }

    fn sweep_and_publish(&self, hook: Hook, ctx: &HookContext) -> Result<()> {
        log_status!("git", "{}", hook.label());
        self.sweep(ctx)?;

        log_status!("git", "Pre-committing local changes");
        self.sync
            .commit_all(&format!("{}\n{}", PRE_COMMIT_PREFIX, ctx.cookbook_lines()))?;
        self.sync.push(false);
        Ok(())
    }
}

impl Plugin for GitPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn before_bump(&self, ctx: &HookContext) -> Result<()> {
        self.sweep_and_publish(Hook::BeforeBump, ctx)
    }

    fn before_upload(&self, ctx: &HookContext) -> Result<()> {
        self.sweep_and_publish(Hook::BeforeUpload, ctx)
    }

    fn before_promote(&self, ctx: &HookContext) -> Result<()> {
        log_status!("git", "{}", Hook::BeforePromote.label());
        self.sweep(ctx)
    }

    fn after_bump(&self, ctx: &HookContext) -> Result<()> {
        log_status!("git", "{}", Hook::AfterBump.label());
        for cookbook in &ctx.cookbooks {
            self.sync.add(&cookbook.root_dir, METADATA_FILE)?;
        }
        self.sync
            .commit_all(&format!("{}\n{}", BUMP_COMMIT_PREFIX, ctx.cookbook_lines()))?;
        self.sync.push(false);
        Ok(())
    }

    fn after_promote_local(&self, ctx: &HookContext) -> Result<()> {
        if ctx.environments.is_empty() {
            return Ok(());
        }
        log_status!("git", "{}", Hook::AfterPromoteLocal.label());
        for environment in &ctx.environments {
            self.sync
                .add(&ctx.environment_path, &environment.file_name())?;
        }
        let names: Vec<&str> = ctx.environments.iter().map(|e| e.name.as_str()).collect();
        self.sync.commit_all(&format!(
            "[Spork] Promoting cookbooks to {}:\n{}",
            names.join(","),
            ctx.cookbook_lines()
        ))?;
        self.sync.push(false);
        Ok(())
    }

    fn after_promote_remote(&self, ctx: &HookContext) -> Result<()> {
        if !self.tag_on_promote || ctx.cookbooks.is_empty() {
            return Ok(());
        }
        log_status!("git", "{}", Hook::AfterPromoteRemote.label());
        if self.sync.tag(&tag_name(&ctx.cookbooks)).is_published() {
            self.sync.push(true);
        }
        Ok(())
    }
}
