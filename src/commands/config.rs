use clap::{Args, Subcommand};
use serde::Serialize;

use spork::config::{self, SporkConfig};

use super::CmdResult;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Display configuration (built-in defaults merged with spork.json)
    Show {
        /// Show only built-in defaults (ignore spork.json)
        #[arg(long)]
        builtin: bool,
    },
    /// Write built-in defaults to spork.json
    Init {
        /// Overwrite an existing spork.json
        #[arg(long)]
        force: bool,
    },
    /// Show the path to spork.json
    Path,
}

#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<SporkConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exists: Option<bool>,
}

pub fn run(args: ConfigArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ConfigOutput> {
    match args.command {
        ConfigCommand::Show { builtin } => show(builtin),
        ConfigCommand::Init { force } => init(force),
        ConfigCommand::Path => path(),
    }
}

fn show(builtin: bool) -> CmdResult<ConfigOutput> {
    let config = if builtin {
        SporkConfig::default()
    } else {
        config::load_config()?
    };

    Ok((
        ConfigOutput {
            command: "config.show".to_string(),
            config: Some(config),
            path: None,
            exists: None,
        },
        0,
    ))
}

fn init(force: bool) -> CmdResult<ConfigOutput> {
    let path = config::config_path()?;
    if path.exists() && !force {
        return Err(spork::Error::validation_invalid_argument(
            "force",
            format!("{} already exists", path.display()),
        )
        .with_hint("Pass --force to replace it with the built-in defaults"));
    }

    let defaults = SporkConfig::default();
    config::save_config_to(&defaults, &path)?;

    Ok((
        ConfigOutput {
            command: "config.init".to_string(),
            config: Some(defaults),
            path: Some(path.display().to_string()),
            exists: Some(true),
        },
        0,
    ))
}

fn path() -> CmdResult<ConfigOutput> {
    let path = config::config_path()?;
    let exists = path.exists();

    Ok((
        ConfigOutput {
            command: "config.path".to_string(),
            config: None,
            path: Some(path.display().to_string()),
            exists: Some(exists),
        },
        0,
    ))
}
