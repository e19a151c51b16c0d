use clap::Args;
use std::sync::Arc;

use spork::pipeline::{PipelineOptions, PipelineOutcome, PipelineRunner};
use spork::utils::command::SystemRunner;

use super::{CmdResult, RepoArgs};

#[derive(Args)]
pub struct BuploadArgs {
    /// Cookbook to bump, upload and promote
    pub cookbook: Option<String>,

    #[command(flatten)]
    pub repo: RepoArgs,

    /// Freeze the uploaded cookbook version
    #[arg(long)]
    pub freeze: bool,

    /// Upload the cookbook's dependencies too
    #[arg(short = 'D', long)]
    pub include_dependencies: bool,
}

/// A pipeline that ran but failed is still returned as data: the envelope's
/// `success` says the command produced an outcome, while `status` and the
/// exit code say whether the pipeline passed.
pub fn run(args: BuploadArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<PipelineOutcome> {
    let cookbook = args.cookbook.ok_or_else(|| {
        spork::Error::validation_missing_argument(vec!["cookbook".to_string()])
            .with_hint("Usage: spork bupload COOKBOOK")
    })?;

    let (config, working_dir) = args.repo.load()?;
    let options = PipelineOptions {
        freeze: args.freeze,
        include_dependencies: args.include_dependencies,
        environments: args.repo.environments.clone(),
        environment_path: config.environment_dir(&working_dir),
    };

    let pipeline =
        PipelineRunner::from_config(&config, &working_dir, Arc::new(SystemRunner), options)?;
    let outcome = pipeline.run(&cookbook);
    let exit_code = if outcome.is_success() { 0 } else { 1 };

    Ok((outcome, exit_code))
}
