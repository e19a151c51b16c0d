//! Lifecycle hooks around the bump / upload / promote stages.
//!
//! A plugin is any type implementing [`Plugin`]; every hook defaults to a
//! no-op so plugins only implement the events they care about. The
//! [`HookDispatcher`] invokes registered plugins in registration order and
//! stops at the first error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::SporkConfig;
use crate::cookbook::{CookbookRef, EnvironmentRef};
use crate::error::{Error, Result};
use crate::git::{self, GitPlugin, GitSync};
use crate::utils::command::ProcessRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    BeforeBump,
    AfterBump,
    BeforeUpload,
    AfterUpload,
    BeforePromote,
    AfterPromoteLocal,
    AfterPromoteRemote,
}

impl Hook {
    pub const ALL: [Hook; 7] = [
        Hook::BeforeBump,
        Hook::AfterBump,
        Hook::BeforeUpload,
        Hook::AfterUpload,
        Hook::BeforePromote,
        Hook::AfterPromoteLocal,
        Hook::AfterPromoteRemote,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::BeforeBump => "before_bump",
            Hook::AfterBump => "after_bump",
            Hook::BeforeUpload => "before_upload",
            Hook::AfterUpload => "after_upload",
            Hook::BeforePromote => "before_promote",
            Hook::AfterPromoteLocal => "after_promote_local",
            Hook::AfterPromoteRemote => "after_promote_remote",
        }
    }

    /// Human label announced when the hook starts.
    pub fn label(&self) -> &'static str {
        match self {
            Hook::BeforeBump => "Before Bump",
            Hook::AfterBump => "After Bump",
            Hook::BeforeUpload => "Before Upload",
            Hook::AfterUpload => "After Upload",
            Hook::BeforePromote => "Before Promote",
            Hook::AfterPromoteLocal => "After Promote Local",
            Hook::AfterPromoteRemote => "After Promote Remote",
        }
    }

    /// Parse a hook name. Accepts `before_bump` and `before-bump`.
    pub fn parse(name: &str) -> Result<Hook> {
        let normalized = name.trim().replace('-', "_");
        Hook::ALL
            .iter()
            .copied()
            .find(|hook| hook.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = Hook::ALL.iter().map(Hook::as_str).collect();
                Error::validation_invalid_argument(
                    "hook",
                    format!("Unknown hook '{}'. Known hooks: {}", name, known.join(", ")),
                )
            })
    }
}

/// What a hook operates on.
#[derive(Debug, Clone, Serialize)]
pub struct HookContext {
    pub cookbooks: Vec<CookbookRef>,
    pub environments: Vec<EnvironmentRef>,
    pub environment_path: PathBuf,
}

impl HookContext {
    /// `name@version` per cookbook, one per line, indented.
    pub fn cookbook_lines(&self) -> String {
        self.cookbooks
            .iter()
            .map(|c| format!("  {}", c.qualified_name()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub trait Plugin {
    fn name(&self) -> &str;

    fn before_bump(&self, _ctx: &HookContext) -> Result<()> {
        Ok(())
    }

    fn after_bump(&self, _ctx: &HookContext) -> Result<()> {
        Ok(())
    }

    fn before_upload(&self, _ctx: &HookContext) -> Result<()> {
        Ok(())
    }

    fn after_upload(&self, _ctx: &HookContext) -> Result<()> {
        Ok(())
    }

    fn before_promote(&self, _ctx: &HookContext) -> Result<()> {
        Ok(())
    }

    fn after_promote_local(&self, _ctx: &HookContext) -> Result<()> {
        Ok(())
    }

    fn after_promote_remote(&self, _ctx: &HookContext) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct HookDispatcher {
    plugins: Vec<Box<dyn Plugin>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the plugins enabled in config, in the order listed.
    pub fn from_config(
        config: &SporkConfig,
        working_dir: &Path,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<Self> {
        let mut dispatcher = Self::new();
        for name in &config.plugins {
            match name.as_str() {
                git::PLUGIN_NAME => {
                    let sync = GitSync::open(working_dir, runner.clone(), config.git.settings())?;
                    dispatcher.register(Box::new(GitPlugin::new(
                        sync,
                        config.git.tag_on_promote,
                    )));
                }
                other => {
                    return Err(Error::config_invalid_value(
                        "plugins",
                        Some(other.to_string()),
                        format!("Unknown plugin '{}'. Known plugins: {}", other, git::PLUGIN_NAME),
                    ));
                }
            }
        }
        Ok(dispatcher)
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run `hook` on every plugin in order. The first error aborts.
    pub fn dispatch(&self, hook: Hook, ctx: &HookContext) -> Result<()> {
        for plugin in &self.plugins {
            log_status!("hook", "{} ({})", hook.label(), plugin.name());
            invoke(plugin.as_ref(), hook, ctx)?;
        }
        Ok(())
    }
}

fn invoke(plugin: &dyn Plugin, hook: Hook, ctx: &HookContext) -> Result<()> {
    match hook {
        Hook::BeforeBump => plugin.before_bump(ctx),
        Hook::AfterBump => plugin.after_bump(ctx),
        Hook::BeforeUpload => plugin.before_upload(ctx),
        Hook::AfterUpload => plugin.after_upload(ctx),
        Hook::BeforePromote => plugin.before_promote(ctx),
        Hook::AfterPromoteLocal => plugin.after_promote_local(ctx),
        Hook::AfterPromoteRemote => plugin.after_promote_remote(ctx),
    }
}
