//! Cookbook and environment references.
//!
//! A cookbook is found by directory name on the search path and its
//! `metadata.rb` is scanned for `name` and `version`. Dependency resolution
//! belongs to knife.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::utils::{io, parser};

pub const METADATA_FILE: &str = "metadata.rb";

const NAME_PATTERN: &str = r#"(?m)^\s*name\s+['"]([^'"]+)['"]"#;
const VERSION_PATTERN: &str = r#"(?m)^\s*version\s+['"]([^'"]+)['"]"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CookbookRef {
    pub name: String,
    pub root_dir: PathBuf,
    pub version: String,
}

impl CookbookRef {
    pub fn new(
        name: impl Into<String>,
        root_dir: impl Into<PathBuf>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            root_dir: root_dir.into(),
            version: version.into(),
        }
    }

    /// `name@version`.
    pub fn qualified_name(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// An environment and the JSON file that defines it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentRef {
    pub name: String,
    pub path: PathBuf,
}

impl EnvironmentRef {
    pub fn new(environment_path: &Path, name: impl Into<String>) -> Self {
        let name = name.into();
        let path = environment_path.join(Self::file_name_for(&name));
        Self { name, path }
    }

    pub fn file_name(&self) -> String {
        Self::file_name_for(&self.name)
    }

    fn file_name_for(name: &str) -> String {
        format!("{}.json", name)
    }
}

/// Resolves cookbook names to their current on-disk state.
pub trait MetadataLoader {
    fn load_cookbook(&self, name: &str) -> Result<CookbookRef>;
}

/// Finds `<search path>/<name>/metadata.rb`, first match wins.
#[derive(Debug, Clone)]
pub struct MetadataReader {
    cookbook_paths: Vec<PathBuf>,
}

impl MetadataReader {
    pub fn new(cookbook_paths: Vec<PathBuf>) -> Self {
        Self { cookbook_paths }
    }

    fn find(&self, name: &str) -> Option<PathBuf> {
        self.cookbook_paths
            .iter()
            .map(|base| base.join(name))
            .find(|dir| dir.join(METADATA_FILE).is_file())
    }
}

impl MetadataLoader for MetadataReader {
    fn load_cookbook(&self, name: &str) -> Result<CookbookRef> {
        let root_dir = self.find(name).ok_or_else(|| {
            Error::cookbook_not_found(
                name,
                self.cookbook_paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
            )
        })?;

        let metadata_path = root_dir.join(METADATA_FILE);
        let content = io::read_file(
            &metadata_path,
            &format!("read {}", metadata_path.display()),
        )?;

        let declared_name =
            parser::extract_first(&content, NAME_PATTERN).unwrap_or_else(|| name.to_string());
        let version = parser::extract_first(&content, VERSION_PATTERN).ok_or_else(|| {
            Error::config_invalid_value(
                metadata_path.display().to_string(),
                None,
                "metadata.rb does not declare a version",
            )
        })?;

        semver::Version::parse(&version).map_err(|e| {
            Error::config_invalid_value(
                metadata_path.display().to_string(),
                Some(version.clone()),
                format!("Invalid cookbook version: {}", e),
            )
        })?;

        Ok(CookbookRef {
            name: declared_name,
            root_dir,
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::fs;
    use tempfile::TempDir;

    fn write_cookbook(base: &Path, dir: &str, metadata: &str) {
        let root = base.join(dir);
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(METADATA_FILE), metadata).unwrap();
    }

    #[test]
    fn loads_name_and_version_from_metadata() {
        let temp = TempDir::new().unwrap();
        write_cookbook(
            temp.path(),
            "nginx",
            "name 'nginx'\nmaintainer 'ops'\nversion '2.7.4'\ndepends 'apt', '~> 2.0'\n",
        );

        let reader = MetadataReader::new(vec![temp.path().to_path_buf()]);
        let cookbook = reader.load_cookbook("nginx").unwrap();

        assert_eq!(cookbook.name, "nginx");
        assert_eq!(cookbook.version, "2.7.4");
        assert_eq!(cookbook.root_dir, temp.path().join("nginx"));
        assert_eq!(cookbook.qualified_name(), "nginx@2.7.4");
    }

    #[test]
    fn first_search_path_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_cookbook(first.path(), "apt", "version \"1.0.0\"\n");
        write_cookbook(second.path(), "apt", "version \"9.0.0\"\n");

        let reader = MetadataReader::new(vec![
            first.path().join("missing"),
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        let cookbook = reader.load_cookbook("apt").unwrap();

        assert_eq!(cookbook.version, "1.0.0");
        assert_eq!(cookbook.name, "apt");
    }

    #[test]
    fn missing_cookbook_is_not_found() {
        let temp = TempDir::new().unwrap();
        let reader = MetadataReader::new(vec![temp.path().to_path_buf()]);

        let err = reader.load_cookbook("nginx").unwrap_err();
        assert_eq!(err.code, ErrorCode::CookbookNotFound);
    }

    #[test]
    fn non_semver_version_is_rejected() {
        let temp = TempDir::new().unwrap();
        write_cookbook(temp.path(), "nginx", "name 'nginx'\nversion '2.7'\n");

        let reader = MetadataReader::new(vec![temp.path().to_path_buf()]);
        let err = reader.load_cookbook("nginx").unwrap_err();

        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
        assert_eq!(err.details["value"], "2.7");
    }

    #[test]
    fn environment_ref_points_at_json_definition() {
        let env = EnvironmentRef::new(Path::new("/chef/environments"), "production");
        assert_eq!(env.path, PathBuf::from("/chef/environments/production.json"));
        assert_eq!(env.file_name(), "production.json");
    }
}
