//! `config.toml` schema and loading
//!
//! A missing file yields defaults. Command-line flags are applied on top
//! in `commands::client_config`.

use anyhow::{Context, Result, bail};
use farm::{LinkMode, ResolutionPolicy, ScanConfig, ScanMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DotConfig {
    pub directories: DirectoriesConfig,
    pub symlinks: SymlinksConfig,
    pub ignore: IgnoreConfig,
    pub dotfile: DotfileConfig,
    pub operations: OperationsConfig,
    pub doctor: DoctorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectoriesConfig {
    /// Directory holding one subdirectory per package
    pub package: String,
    /// Where links are created (default: home directory)
    pub target: Option<String>,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            package: ".".to_string(),
            target: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SymlinksConfig {
    pub mode: LinkMode,
    pub on_conflict: ResolutionPolicy,
    pub backup_suffix: String,
    pub backup_dir: Option<String>,
}

impl Default for SymlinksConfig {
    fn default() -> Self {
        Self {
            mode: LinkMode::Relative,
            on_conflict: ResolutionPolicy::Fail,
            backup_suffix: farm::planner::DEFAULT_BACKUP_SUFFIX.to_string(),
            backup_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IgnoreConfig {
    pub use_defaults: bool,
    pub patterns: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            use_defaults: true,
            patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DotfileConfig {
    pub translate: bool,
    pub prefix: String,
}

impl Default for DotfileConfig {
    fn default() -> Self {
        Self {
            translate: true,
            prefix: "dot-".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperationsConfig {
    /// 0 = number of cores
    pub max_parallel: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DoctorConfig {
    pub scan_mode: ScanMode,
    /// 0 = unlimited
    pub max_depth: usize,
    pub skip_patterns: Vec<String>,
    /// 0 = unlimited
    pub max_issues: usize,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        let scan = ScanConfig::off();
        Self {
            scan_mode: scan.mode,
            max_depth: scan.max_depth,
            skip_patterns: scan.skip_patterns,
            max_issues: scan.max_issues,
        }
    }
}

impl DoctorConfig {
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            mode: self.scan_mode,
            max_depth: self.max_depth,
            skip_patterns: self.skip_patterns.clone(),
            max_issues: self.max_issues,
            ..ScanConfig::off()
        }
    }
}

impl DotConfig {
    /// Default config file location
    pub fn default_path() -> Result<PathBuf> {
        Ok(paths::config_dir()?.join("config.toml"))
    }

    /// Load from `path`, or the default location when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            log::debug!("config_missing path={}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format in dot config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.directories.package.trim().is_empty() {
            bail!("directories.package cannot be empty");
        }
        if self
            .directories
            .target
            .as_deref()
            .is_some_and(|t| t.trim().is_empty())
        {
            bail!("directories.target cannot be empty");
        }
        if self.dotfile.translate && self.dotfile.prefix.is_empty() {
            bail!("dotfile.prefix cannot be empty when translation is enabled");
        }
        if self.symlinks.backup_suffix.is_empty() && self.symlinks.backup_dir.is_none() {
            bail!("symlinks.backup_suffix cannot be empty without symlinks.backup_dir");
        }
        for pattern in self.ignore.patterns.iter().chain(&self.doctor.skip_patterns) {
            farm::ignore::Pattern::new(pattern)
                .with_context(|| format!("Invalid pattern '{pattern}'"))?;
        }
        Ok(())
    }

    /// Package directory, expanded and made absolute
    pub fn package_dir(&self) -> Result<PathBuf> {
        absolute(&paths::expand(&self.directories.package))
    }

    /// Target directory, expanded and made absolute
    pub fn target_dir(&self) -> Result<PathBuf> {
        match &self.directories.target {
            Some(target) => absolute(&paths::expand(target)),
            None => dirs::home_dir().context("Could not determine home directory"),
        }
    }
}

/// Resolve `path` against the current directory
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(farm::path::normalize(path));
    }
    let cwd = std::env::current_dir().context("Could not determine current directory")?;
    Ok(farm::path::normalize(&cwd.join(path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_full_config() {
        let toml = r#"
[directories]
package = "~/dotfiles"
target = "/home/me"

[symlinks]
mode = "absolute"
on_conflict = "backup"
backup_suffix = ".orig"

[ignore]
use_defaults = false
patterns = ["*.swp", "README*"]

[dotfile]
prefix = "_"

[operations]
max_parallel = 4

[doctor]
scan_mode = "scoped"
max_depth = 3
max_issues = 50
"#;
        let config = DotConfig::parse(toml).unwrap();
        assert_eq!(config.symlinks.mode, LinkMode::Absolute);
        assert_eq!(config.symlinks.on_conflict, ResolutionPolicy::Backup);
        assert_eq!(config.symlinks.backup_suffix, ".orig");
        assert!(!config.ignore.use_defaults);
        assert_eq!(config.dotfile.prefix, "_");
        assert_eq!(config.operations.max_parallel, 4);

        let scan = config.doctor.scan_config();
        assert_eq!(scan.mode, ScanMode::Scoped);
        assert_eq!(scan.max_depth, 3);
        assert_eq!(scan.max_issues, 50);
        assert!(scan.skip_patterns.contains(&".git".to_string()));
    }

    #[test]
    fn empty_config_is_default() {
        let config = DotConfig::parse("").unwrap();
        assert_eq!(config, DotConfig::default());
        assert_eq!(config.directories.package, ".");
        assert_eq!(config.doctor.scan_mode, ScanMode::Off);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(DotConfig::parse("[symlinks]\nmode = \"hard\"\n").is_err());
        assert!(DotConfig::parse("[doctor]\nscan_mode = \"everything\"\n").is_err());
    }

    #[test]
    fn rejects_empty_values() {
        assert!(DotConfig::parse("[directories]\npackage = \"\"\n").is_err());
        assert!(DotConfig::parse("[dotfile]\nprefix = \"\"\n").is_err());
        assert!(DotConfig::parse("[dotfile]\ntranslate = false\nprefix = \"\"\n").is_ok());
    }

    #[test]
    fn rejects_bad_pattern() {
        assert!(DotConfig::parse("[ignore]\npatterns = [\"[z-a]\"]\n").is_err());
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = DotConfig::load(Some(&tmp.path().join("config.toml"))).unwrap();
        assert_eq!(config, DotConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[directories]\npackage = \"/srv/dotfiles\"\n").unwrap();
        let config = DotConfig::load(Some(&path)).unwrap();
        assert_eq!(config.package_dir().unwrap(), PathBuf::from("/srv/dotfiles"));
    }
}
