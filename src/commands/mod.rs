use clap::Args;
use std::path::PathBuf;

use spork::config::{ConfigOverrides, SporkConfig};

pub type CmdResult<T> = spork::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

/// Repository layout and git settings shared by commands that touch cookbooks.
///
/// Flags override the matching values from spork.json.
#[derive(Args, Default, Debug)]
pub struct RepoArgs {
    /// Environment to promote into (repeatable)
    #[arg(short = 'e', long = "environment", value_name = "ENV")]
    pub environments: Vec<String>,

    /// Colon-separated list of directories containing cookbooks
    #[arg(long, value_name = "PATHS")]
    pub cookbook_path: Option<String>,

    /// Directory containing environment JSON files
    #[arg(long, value_name = "PATH")]
    pub environment_path: Option<String>,

    /// Git remote to push to (default: origin)
    #[arg(long)]
    pub remote: Option<String>,

    /// Git branch to push (default: master)
    #[arg(long)]
    pub branch: Option<String>,
}

impl RepoArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            remote: self.remote.clone(),
            branch: self.branch.clone(),
            cookbook_path: self.cookbook_path.as_deref().map(spork::config::split_path_list),
            environment_path: self.environment_path.clone(),
        }
    }

    /// Effective config and the directory the run is anchored at.
    pub fn load(&self) -> spork::Result<(SporkConfig, PathBuf)> {
        let config = spork::config::load_config()?.with_overrides(self.overrides());
        let working_dir = std::env::current_dir().map_err(|e| {
            spork::Error::internal_io(e.to_string(), Some("resolve working directory".to_string()))
        })?;
        Ok((config, working_dir))
    }
}

pub mod bupload;
pub mod config;
pub mod hook;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (spork::Result<serde_json::Value>, i32) {
    crate::tty::status("spork is working...");

    match command {
        crate::Commands::Bupload(args) => dispatch!(args, global, bupload),
        crate::Commands::Hook(args) => dispatch!(args, global, hook),
        crate::Commands::Config(args) => dispatch!(args, global, config),
    }
}
