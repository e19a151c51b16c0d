//! Process execution primitives.
//!
//! Every external program spork drives (git, knife) goes through a
//! [`ProcessRunner`]. Commands are argument vectors, never shell strings, and
//! the runner reports the exit status instead of interpreting it.

use std::fmt;
use std::path::Path;
use std::process::Command;

use serde::Serialize;

use crate::utils::shell;

/// A program plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables set on the child process.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
        }
    }

    /// Shorthand for `git <args>`, run under the C locale so its messages
    /// stay in English.
    pub fn git<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("git", args)
            .with_env("LC_ALL", "C")
            .with_env("LANGUAGE", "")
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.program)
        } else {
            write!(f, "{} {}", self.program, shell::quote_args(&self.args))
        }
    }
}

/// Exit status and combined output of one process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessOutput {
    /// `-1` when the process was killed by a signal or never started.
    pub exit_code: i32,
    /// stdout followed by stderr.
    pub output: String,
}

impl ProcessOutput {
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn trimmed(&self) -> &str {
        self.output.trim()
    }
}

/// Launches commands and reports their exit status.
pub trait ProcessRunner {
    fn execute(&self, command: &CommandSpec, working_dir: &Path) -> ProcessOutput;
}

/// Runs commands as real child processes, blocking until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn execute(&self, command: &CommandSpec, working_dir: &Path) -> ProcessOutput {
        let result = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .current_dir(working_dir)
            .output();

        match result {
            Ok(out) => {
                let mut output = String::from_utf8_lossy(&out.stdout).to_string();
                output.push_str(&String::from_utf8_lossy(&out.stderr));
                ProcessOutput {
                    exit_code: out.status.code().unwrap_or(-1),
                    output,
                }
            }
            Err(e) => ProcessOutput {
                exit_code: -1,
                output: format!("Failed to run {}: {}", command, e),
            },
        }
    }
}
