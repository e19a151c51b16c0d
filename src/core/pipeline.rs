//! Bump, upload and promote one cookbook, with lifecycle hooks around each
//! stage. The first failure ends the run; finished stages are not rolled back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::config::{SporkConfig, StageCommands};
use crate::cookbook::{EnvironmentRef, MetadataLoader, MetadataReader};
use crate::error::{Error, Hint, Result, StageFailedDetails};
use crate::hooks::{Hook, HookContext, HookDispatcher};
use crate::utils::command::{CommandSpec, ProcessOutput, ProcessRunner};

const COOKBOOK_PLACEHOLDER: &str = "{cookbook}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Bump,
    Upload,
    Promote,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Bump, Stage::Upload, Stage::Promote];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Bump => "bump",
            Stage::Upload => "upload",
            Stage::Promote => "promote",
        }
    }

    fn before(&self) -> Hook {
        match self {
            Stage::Bump => Hook::BeforeBump,
            Stage::Upload => Hook::BeforeUpload,
            Stage::Promote => Hook::BeforePromote,
        }
    }

    fn after(&self) -> &'static [Hook] {
        match self {
            Stage::Bump => &[Hook::AfterBump],
            Stage::Upload => &[Hook::AfterUpload],
            Stage::Promote => &[Hook::AfterPromoteLocal, Hook::AfterPromoteRemote],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    pub stage: Stage,
    pub command: String,
    pub exit_code: i32,
    pub output: String,
}

impl StageResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineRunStatus {
    Success,
    Failed,
}

/// Where and why a run stopped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineFailure {
    /// Stage name (`bump`) or hook name (`before_upload`).
    pub step: String,
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    pub cookbook: String,
    pub status: PipelineRunStatus,
    pub stages: Vec<StageResult>,
    pub hooks: Vec<Hook>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<PipelineFailure>,
}

impl PipelineOutcome {
    fn new(cookbook: &str) -> Self {
        Self {
            cookbook: cookbook.to_string(),
            status: PipelineRunStatus::Success,
            stages: Vec::new(),
            hooks: Vec::new(),
            failure: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PipelineRunStatus::Success
    }

    fn fail(mut self, step: &str, err: Error) -> Self {
        log_error!("pipeline", "{}: {}", step, err.message);
        self.status = PipelineRunStatus::Failed;
        self.failure = Some(PipelineFailure {
            step: step.to_string(),
            code: err.code.as_str().to_string(),
            message: err.message,
            details: err.details,
            hints: err.hints,
        });
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub freeze: bool,
    pub include_dependencies: bool,
    pub environments: Vec<String>,
    pub environment_path: PathBuf,
}

pub struct PipelineRunner {
    runner: Arc<dyn ProcessRunner>,
    working_dir: PathBuf,
    commands: StageCommands,
    dispatcher: HookDispatcher,
    loader: Box<dyn MetadataLoader>,
    options: PipelineOptions,
}

impl PipelineRunner {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        working_dir: &Path,
        commands: StageCommands,
        dispatcher: HookDispatcher,
        loader: Box<dyn MetadataLoader>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            runner,
            working_dir: working_dir.to_path_buf(),
            commands,
            dispatcher,
            loader,
            options,
        }
    }

    /// Wire a runner from config: stage commands, enabled plugins and a
    /// metadata reader over the configured cookbook path.
    pub fn from_config(
        config: &SporkConfig,
        working_dir: &Path,
        runner: Arc<dyn ProcessRunner>,
        options: PipelineOptions,
    ) -> Result<Self> {
        let dispatcher = HookDispatcher::from_config(config, working_dir, runner.clone())?;
        let loader = MetadataReader::new(config.cookbook_paths(working_dir));
        Ok(Self::new(
            runner,
            working_dir,
            config.stages.clone(),
            dispatcher,
            Box::new(loader),
            options,
        ))
    }

    pub fn run(&self, cookbook: &str) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::new(cookbook);

        for stage in Stage::ALL {
            let before = stage.before();
            if let Err(err) = self.dispatch(before, cookbook, &mut outcome) {
                return outcome.fail(before.as_str(), err);
            }

            let result = match self.run_stage(stage, cookbook) {
                Ok(result) => result,
                Err(err) => return outcome.fail(stage.as_str(), err),
            };
            let failed = !result.success();
            outcome.stages.push(result.clone());
            if failed {
                return outcome.fail(stage.as_str(), stage_failure(result));
            }

            for &hook in stage.after() {
                if let Err(err) = self.dispatch(hook, cookbook, &mut outcome) {
                    return outcome.fail(hook.as_str(), err);
                }
            }
        }

        log_status!("pipeline", "{} bumped, uploaded and promoted", cookbook);
        outcome
    }

    /// Run `hook` with freshly loaded cookbook metadata.
    fn dispatch(&self, hook: Hook, cookbook: &str, outcome: &mut PipelineOutcome) -> Result<()> {
        if self.dispatcher.is_empty() {
            return Ok(());
        }
        let ctx = self.context(cookbook)?;
        outcome.hooks.push(hook);
        self.dispatcher.dispatch(hook, &ctx)
    }

    fn context(&self, cookbook: &str) -> Result<HookContext> {
        let cookbook = self.loader.load_cookbook(cookbook)?;
        Ok(HookContext {
            cookbooks: vec![cookbook],
            environments: self
                .options
                .environments
                .iter()
                .map(|name| EnvironmentRef::new(&self.options.environment_path, name.as_str()))
                .collect(),
            environment_path: self.options.environment_path.clone(),
        })
    }

    fn run_stage(&self, stage: Stage, cookbook: &str) -> Result<StageResult> {
        let command = self.command_for(stage, cookbook)?;
        let rendered = command.to_string();

        log_status!("pipeline", "{} {}", stage.as_str(), cookbook);
        eprintln!("## Begin: {} ##", rendered);
        let ProcessOutput { exit_code, output } = self.runner.execute(&command, &self.working_dir);
        if !output.is_empty() {
            eprint!("{}", output);
            if !output.ends_with('\n') {
                eprintln!();
            }
        }
        eprintln!("## End: {} ##", rendered);

        Ok(StageResult {
            stage,
            command: rendered,
            exit_code,
            output,
        })
    }

    fn command_for(&self, stage: Stage, cookbook: &str) -> Result<CommandSpec> {
        let template = match stage {
            Stage::Bump => &self.commands.bump,
            Stage::Upload => &self.commands.upload,
            Stage::Promote => &self.commands.promote,
        };

        let mut argv = template
            .iter()
            .map(|arg| arg.replace(COOKBOOK_PLACEHOLDER, cookbook));
        let program = argv.next().ok_or_else(|| {
            Error::config_invalid_value(
                format!("stages.{}", stage.as_str()),
                None,
                format!("{} command is empty", stage.as_str()),
            )
        })?;

        let mut args: Vec<String> = argv.collect();
        if stage == Stage::Upload {
            if self.options.freeze {
                args.push("--freeze".to_string());
            }
            if self.options.include_dependencies {
                args.push("--include-dependencies".to_string());
            }
        }

        Ok(CommandSpec::new(program, args))
    }
}

fn stage_failure(result: StageResult) -> Error {
    Error::pipeline_stage_failed(StageFailedDetails {
        stage: result.stage.as_str().to_string(),
        command: result.command,
        exit_code: result.exit_code,
        output: result.output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookbook::CookbookRef;
    use crate::hooks::Plugin;
    use crate::utils::command::testing::FakeRunner;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Reports a higher version once `bumped` is set.
    struct FakeLoader {
        bumped: Rc<Cell<bool>>,
    }

    impl MetadataLoader for FakeLoader {
        fn load_cookbook(&self, name: &str) -> Result<CookbookRef> {
            if name == "missing" {
                return Err(Error::cookbook_not_found(name, Vec::new()));
            }
            let version = if self.bumped.get() { "1.0.1" } else { "1.0.0" };
            Ok(CookbookRef::new(name, format!("/chef/cookbooks/{}", name), version))
        }
    }

    /// Logs `hook@version`; fails on the configured hook.
    struct Recorder {
        log: Rc<RefCell<Vec<String>>>,
        fail_on: Option<Hook>,
    }

    impl Recorder {
        fn record(&self, hook: Hook, ctx: &HookContext) -> Result<()> {
            self.log
                .borrow_mut()
                .push(format!("{}@{}", hook.as_str(), ctx.cookbooks[0].version));
            if self.fail_on == Some(hook) {
                return Err(Error::internal_unexpected(format!("{} refused", hook.as_str())));
            }
            Ok(())
        }
    }

    impl Plugin for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }
        fn before_bump(&self, ctx: &HookContext) -> Result<()> {
            self.record(Hook::BeforeBump, ctx)
        }
        fn after_bump(&self, ctx: &HookContext) -> Result<()> {
            self.record(Hook::AfterBump, ctx)
        }
        fn before_upload(&self, ctx: &HookContext) -> Result<()> {
            self.record(Hook::BeforeUpload, ctx)
        }
        fn after_upload(&self, ctx: &HookContext) -> Result<()> {
            self.record(Hook::AfterUpload, ctx)
        }
        fn before_promote(&self, ctx: &HookContext) -> Result<()> {
            self.record(Hook::BeforePromote, ctx)
        }
        fn after_promote_local(&self, ctx: &HookContext) -> Result<()> {
            self.record(Hook::AfterPromoteLocal, ctx)
        }
        fn after_promote_remote(&self, ctx: &HookContext) -> Result<()> {
            self.record(Hook::AfterPromoteRemote, ctx)
        }
    }

    struct Fixture {
        runner: Arc<FakeRunner>,
        log: Rc<RefCell<Vec<String>>>,
        pipeline: PipelineRunner,
    }

    fn fixture(runner: FakeRunner, fail_on: Option<Hook>, options: PipelineOptions) -> Fixture {
        let bumped = Rc::new(Cell::new(false));
        let flag = bumped.clone();
        let runner = Arc::new(runner.respond(move |cmd, _| {
            if cmd.args.get(1).map(String::as_str) == Some("bump") {
                flag.set(true);
            }
            None
        }));

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = HookDispatcher::new();
        dispatcher.register(Box::new(Recorder {
            log: log.clone(),
            fail_on,
        }));

        let pipeline = PipelineRunner::new(
            runner.clone(),
            Path::new("/chef"),
            StageCommands::default(),
            dispatcher,
            Box::new(FakeLoader { bumped }),
            options,
        );
        Fixture {
            runner,
            log,
            pipeline,
        }
    }

    #[test]
    fn stages_run_in_order_for_nginx() {
        let f = fixture(
            FakeRunner::new().on(&["spork", "upload"], 0, "Uploaded nginx\n"),
            None,
            PipelineOptions::default(),
        );

        let outcome = f.pipeline.run("nginx");

        assert!(outcome.is_success());
        assert_eq!(
            f.runner.commands(),
            vec![
                "knife spork bump nginx",
                "knife spork upload nginx",
                "knife spork promote nginx --remote",
            ]
        );
        let stages: Vec<Stage> = outcome.stages.iter().map(|s| s.stage).collect();
        assert_eq!(stages, Stage::ALL.to_vec());
        assert_eq!(outcome.stages[1].output, "Uploaded nginx\n");
        assert!(f
            .runner
            .calls()
            .iter()
            .all(|(_, dir)| dir == Path::new("/chef")));
    }

    #[test]
    fn hooks_wrap_stages_and_see_bumped_version() {
        let f = fixture(FakeRunner::new(), None, PipelineOptions::default());

        let outcome = f.pipeline.run("nginx");

        assert_eq!(
            *f.log.borrow(),
            vec![
                "before_bump@1.0.0",
                "after_bump@1.0.1",
                "before_upload@1.0.1",
                "after_upload@1.0.1",
                "before_promote@1.0.1",
                "after_promote_local@1.0.1",
                "after_promote_remote@1.0.1",
            ]
        );
        assert_eq!(outcome.hooks.len(), Hook::ALL.len());
    }

    #[test]
    fn failed_stage_stops_the_run() {
        let f = fixture(
            FakeRunner::new().on(&["spork", "upload"], 100, "ERROR: server refused\n"),
            None,
            PipelineOptions::default(),
        );

        let outcome = f.pipeline.run("nginx");

        assert_eq!(outcome.status, PipelineRunStatus::Failed);
        assert_eq!(f.runner.commands().len(), 2);
        assert_eq!(outcome.stages.len(), 2);
        assert_eq!(outcome.stages[1].exit_code, 100);

        let failure = outcome.failure.unwrap();
        assert_eq!(failure.step, "upload");
        assert_eq!(failure.code, "pipeline.stage_failed");
        assert_eq!(failure.details["output"], "ERROR: server refused\n");
        assert!(!f.log.borrow().iter().any(|h| h.starts_with("after_upload")));
    }

    #[test]
    fn hook_failure_prevents_the_stage() {
        let f = fixture(
            FakeRunner::new(),
            Some(Hook::BeforeUpload),
            PipelineOptions::default(),
        );

        let outcome = f.pipeline.run("nginx");

        assert!(!outcome.is_success());
        assert_eq!(f.runner.commands(), vec!["knife spork bump nginx"]);
        assert_eq!(outcome.failure.unwrap().step, "before_upload");
    }

    #[test]
    fn unknown_cookbook_fails_before_any_stage() {
        let f = fixture(FakeRunner::new(), None, PipelineOptions::default());

        let outcome = f.pipeline.run("missing");

        assert!(f.runner.calls().is_empty());
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.step, "before_bump");
        assert_eq!(failure.code, "cookbook.not_found");
    }

    #[test]
    fn upload_flags_are_forwarded() {
        let f = fixture(
            FakeRunner::new(),
            None,
            PipelineOptions {
                freeze: true,
                include_dependencies: true,
                ..PipelineOptions::default()
            },
        );

        f.pipeline.run("nginx");

        assert_eq!(
            f.runner.commands()[1],
            "knife spork upload nginx --freeze --include-dependencies"
        );
        assert_eq!(f.runner.commands()[2], "knife spork promote nginx --remote");
    }

    #[test]
    fn cookbook_name_is_one_argument() {
        let f = fixture(FakeRunner::new(), None, PipelineOptions::default());

        f.pipeline.run("my cookbook; rm -rf /");

        let (bump, _) = &f.runner.calls()[0];
        assert_eq!(bump.program, "knife");
        assert_eq!(bump.args, vec!["spork", "bump", "my cookbook; rm -rf /"]);
    }

    #[test]
    fn empty_stage_command_is_a_config_error() {
        let runner = Arc::new(FakeRunner::new());
        let pipeline = PipelineRunner::new(
            runner.clone(),
            Path::new("/chef"),
            StageCommands {
                promote: Vec::new(),
                ..StageCommands::default()
            },
            HookDispatcher::new(),
            Box::new(FakeLoader {
                bumped: Rc::new(Cell::new(false)),
            }),
            PipelineOptions::default(),
        );

        let outcome = pipeline.run("nginx");

        assert_eq!(runner.commands().len(), 2);
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.step, "promote");
        assert_eq!(failure.code, "config.invalid_value");
    }

    #[test]
    fn environments_reach_hook_context() {
        let f = fixture(
            FakeRunner::new(),
            None,
            PipelineOptions {
                environments: vec!["production".to_string()],
                environment_path: PathBuf::from("/chef/environments"),
                ..PipelineOptions::default()
            },
        );

        let ctx = f.pipeline.context("nginx").unwrap();

        assert_eq!(ctx.environments.len(), 1);
        assert_eq!(ctx.environments[0].name, "production");
        assert_eq!(
            ctx.environments[0].path,
            PathBuf::from("/chef/environments/production.json")
        );
    }
}
