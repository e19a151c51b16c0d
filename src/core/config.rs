use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::git::GitSettings;
use crate::paths;
use crate::utils::io;

/// Root configuration structure for spork.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SporkConfig {
    /// Plugins run at every lifecycle hook, in order.
    #[serde(default = "default_plugins")]
    pub plugins: Vec<String>,

    #[serde(default)]
    pub git: GitConfig,

    /// Directories searched for `<cookbook>/metadata.rb`.
    #[serde(default = "default_cookbook_path")]
    pub cookbook_path: Vec<String>,

    /// Directory holding `<environment>.json` definitions.
    #[serde(default = "default_environment_path")]
    pub environment_path: String,

    #[serde(default)]
    pub stages: StageCommands,
}

impl Default for SporkConfig {
    fn default() -> Self {
        Self {
            plugins: default_plugins(),
            git: GitConfig::default(),
            cookbook_path: default_cookbook_path(),
            environment_path: default_environment_path(),
            stages: StageCommands::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Tag `name@version` and push tags after a remote promote.
    #[serde(default)]
    pub tag_on_promote: bool,
}

impl GitConfig {
    pub fn settings(&self) -> GitSettings {
        GitSettings {
            remote: self.remote.clone(),
            branch: self.branch.clone(),
        }
    }
}

/// Argument vectors for the three pipeline stages. `{cookbook}` is replaced
/// with the cookbook name in every argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCommands {
    #[serde(default = "default_bump_command")]
    pub bump: Vec<String>,

    #[serde(default = "default_upload_command")]
    pub upload: Vec<String>,

    #[serde(default = "default_promote_command")]
    pub promote: Vec<String>,
}

impl Default for StageCommands {
    fn default() -> Self {
        Self {
            bump: default_bump_command(),
            upload: default_upload_command(),
            promote: default_promote_command(),
        }
    }
}

/// Values supplied on the command line, applied over the file config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub cookbook_path: Option<Vec<String>>,
    pub environment_path: Option<String>,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_plugins() -> Vec<String> {
    vec![crate::git::PLUGIN_NAME.to_string()]
}

fn default_cookbook_path() -> Vec<String> {
    vec!["cookbooks".to_string()]
}

fn default_environment_path() -> String {
    "environments".to_string()
}

fn knife_spork(args: &[&str]) -> Vec<String> {
    ["knife", "spork"]
        .iter()
        .chain(args.iter())
        .map(|s| s.to_string())
        .collect()
}

fn default_bump_command() -> Vec<String> {
    knife_spork(&["bump", "{cookbook}"])
}

fn default_upload_command() -> Vec<String> {
    knife_spork(&["upload", "{cookbook}"])
}

fn default_promote_command() -> Vec<String> {
    knife_spork(&["promote", "{cookbook}", "--remote"])
}

// =============================================================================
// Resolution
// =============================================================================

impl SporkConfig {
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if overrides.remote.is_some() {
            self.git.remote = overrides.remote;
        }
        if overrides.branch.is_some() {
            self.git.branch = overrides.branch;
        }
        if let Some(paths) = overrides.cookbook_path {
            self.cookbook_path = paths;
        }
        if let Some(path) = overrides.environment_path {
            self.environment_path = path;
        }
        self
    }

    pub fn cookbook_paths(&self, base: &Path) -> Vec<PathBuf> {
        self.cookbook_path
            .iter()
            .map(|p| resolve_path(base, p))
            .collect()
    }

    pub fn environment_dir(&self, base: &Path) -> PathBuf {
        resolve_path(base, &self.environment_path)
    }
}

/// Expand `~` and anchor relative paths at `base`.
pub fn resolve_path(base: &Path, raw: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(raw).to_string());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

/// Split a colon-separated path list, dropping empty entries.
pub fn split_path_list(raw: &str) -> Vec<String> {
    raw.split(':')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

// =============================================================================
// Loading functions
// =============================================================================

/// Location of spork.json.
pub fn config_path() -> Result<PathBuf> {
    paths::spork_json()
}

/// Load spork.json from the config directory.
pub fn load_config() -> Result<SporkConfig> {
    load_config_from(&config_path()?)
}

/// Load a config file. A missing file yields built-in defaults; a malformed
/// one is an error.
pub fn load_config_from(path: &Path) -> Result<SporkConfig> {
    if !path.exists() {
        return Ok(SporkConfig::default());
    }

    let content = io::read_file(path, &format!("read {}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

/// Save config to a file (creates parent directories if missing).
pub fn save_config_to(config: &SporkConfig, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(config).map_err(|e| {
        Error::internal_json(e.to_string(), Some("serialize spork.json".to_string()))
    })?;
    io::write_file(path, &content, &format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config_from(&dir.path().join("spork.json")).unwrap();

        assert_eq!(config, SporkConfig::default());
        assert_eq!(config.plugins, vec!["git"]);
        assert_eq!(config.stages.bump, vec!["knife", "spork", "bump", "{cookbook}"]);
        assert_eq!(
            config.stages.promote,
            vec!["knife", "spork", "promote", "{cookbook}", "--remote"]
        );
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spork.json");
        fs::write(
            &path,
            r#"{"git": {"remote": "upstream", "tag_on_promote": true}, "stages": {"upload": ["echo", "{cookbook}"]}}"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();

        assert_eq!(config.git.remote.as_deref(), Some("upstream"));
        assert_eq!(config.git.branch, None);
        assert!(config.git.tag_on_promote);
        assert_eq!(config.stages.upload, vec!["echo", "{cookbook}"]);
        assert_eq!(config.stages.bump, default_bump_command());
        assert_eq!(config.environment_path, "environments");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spork.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidJson);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("spork.json");
        let mut config = SporkConfig::default();
        config.git.branch = Some("main".to_string());

        save_config_to(&config, &path).unwrap();

        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = SporkConfig::default().with_overrides(ConfigOverrides {
            remote: Some("backup".to_string()),
            branch: None,
            cookbook_path: Some(vec!["site-cookbooks".to_string()]),
            environment_path: None,
        });

        assert_eq!(config.git.settings().remote.as_deref(), Some("backup"));
        assert_eq!(config.git.settings().branch, None);
        assert_eq!(config.cookbook_path, vec!["site-cookbooks"]);
        assert_eq!(config.environment_path, "environments");
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let config = SporkConfig::default();
        let base = Path::new("/chef-repo");

        assert_eq!(
            config.cookbook_paths(base),
            vec![PathBuf::from("/chef-repo/cookbooks")]
        );
        assert_eq!(
            config.environment_dir(base),
            PathBuf::from("/chef-repo/environments")
        );
        assert_eq!(
            resolve_path(base, "/abs/envs"),
            PathBuf::from("/abs/envs")
        );
    }

    #[test]
    fn split_path_list_drops_empty_entries() {
        assert_eq!(
            split_path_list("cookbooks::site-cookbooks:"),
            vec!["cookbooks", "site-cookbooks"]
        );
    }
}
