use clap::Args;
use serde::Serialize;
use std::sync::Arc;

use spork::cookbook::{CookbookRef, EnvironmentRef, MetadataLoader, MetadataReader};
use spork::hooks::{Hook, HookContext, HookDispatcher};
use spork::utils::command::SystemRunner;

use super::{CmdResult, RepoArgs};

#[derive(Args)]
pub struct HookArgs {
    /// Hook to run (before_bump, after_bump, before_upload, after_upload,
    /// before_promote, after_promote_local, after_promote_remote)
    pub hook: String,

    /// Cookbooks the hook operates on
    pub cookbooks: Vec<String>,

    #[command(flatten)]
    pub repo: RepoArgs,
}

#[derive(Debug, Serialize)]
pub struct HookOutput {
    hook: Hook,
    plugins: Vec<String>,
    cookbooks: Vec<CookbookRef>,
    environments: Vec<EnvironmentRef>,
}

pub fn run(args: HookArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<HookOutput> {
    let hook = Hook::parse(&args.hook)?;
    if args.cookbooks.is_empty() {
        return Err(spork::Error::validation_missing_argument(vec![
            "cookbooks".to_string(),
        ]));
    }

    let (config, working_dir) = args.repo.load()?;
    let reader = MetadataReader::new(config.cookbook_paths(&working_dir));
    let cookbooks = args
        .cookbooks
        .iter()
        .map(|name| reader.load_cookbook(name))
        .collect::<spork::Result<Vec<_>>>()?;

    let environment_path = config.environment_dir(&working_dir);
    let ctx = HookContext {
        cookbooks,
        environments: args
            .repo
            .environments
            .iter()
            .map(|name| EnvironmentRef::new(&environment_path, name.as_str()))
            .collect(),
        environment_path,
    };

    let dispatcher = HookDispatcher::from_config(&config, &working_dir, Arc::new(SystemRunner))?;
    dispatcher.dispatch(hook, &ctx)?;

    Ok((
        HookOutput {
            hook,
            plugins: dispatcher.plugin_names(),
            cookbooks: ctx.cookbooks,
            environments: ctx.environments,
        },
        0,
    ))
}
