//! Configuration file support for `.colabprep.toml`
//!
//! Configuration files can be placed in:
//! - User home directory: `~/.colabprep.toml` (user defaults)
//! - Project directory: `./.colabprep.toml` (project defaults)
//! - Custom location via `--config` (replaces the project file)
//!
//! Precedence order (highest to lowest):
//! 1. Command-line arguments
//! 2. Project config (or `--config`)
//! 3. User config
//! 4. Built-in defaults

use anyhow::{Context, Result};
use colabprep_notebook::RewriteOptions;
use colored::Colorize;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory and the home directory
pub const CONFIG_FILE_NAME: &str = ".colabprep.toml";

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Setup cell contents
    pub setup: Option<SetupConfig>,
    /// Asset path rewriting
    pub assets: Option<AssetsConfig>,
    /// Output document shape
    pub output: Option<OutputConfig>,
    /// Run behaviour
    pub run: Option<RunConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SetupConfig {
    /// Insert the setup cell at all
    pub enabled: Option<bool>,
    /// Packages installed with `pip install -q -U`
    pub packages: Option<Vec<String>>,
    /// Extra lines appended to the setup cell
    pub commands: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Rewrite relative asset paths at all
    pub rewrite: Option<bool>,
    /// Remote root for asset directories
    pub base_url: Option<String>,
    /// Directory names treated as assets
    pub dirs: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Clear outputs and execution counters
    pub clear_outputs: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Stop at the first failing notebook
    pub fail_fast: Option<bool>,
}

impl Config {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("{e}"))
    }

    /// Resolve the effective file configuration
    ///
    /// An explicit `--config` file must load; discovered files that fail to
    /// parse are reported and ignored.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let user_config = Self::load_optional(dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME)));
        let project_config = match explicit {
            Some(path) => Some(Self::load_from_file(path)?),
            None => Self::load_optional(Some(PathBuf::from(CONFIG_FILE_NAME))),
        };
        Ok(Self::merge(user_config, project_config))
    }

    fn load_optional(path: Option<PathBuf>) -> Option<Self> {
        let path = path?;
        if !path.exists() {
            return None;
        }

        match Self::load_from_file(&path) {
            Ok(config) => {
                log::debug!("Loaded config from {}", path.display());
                Some(config)
            }
            Err(e) => {
                eprintln!(
                    "{} Ignoring config {}: {:#}",
                    "Warning:".yellow().bold(),
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Merge two configs, `project` wins field by field
    pub fn merge(user: Option<Self>, project: Option<Self>) -> Self {
        let user = user.unwrap_or_default();
        let Some(project) = project else {
            return user;
        };

        Self {
            setup: merge_section(user.setup, project.setup, |base, over| SetupConfig {
                enabled: over.enabled.or(base.enabled),
                packages: over.packages.or(base.packages),
                commands: over.commands.or(base.commands),
            }),
            assets: merge_section(user.assets, project.assets, |base, over| AssetsConfig {
                rewrite: over.rewrite.or(base.rewrite),
                base_url: over.base_url.or(base.base_url),
                dirs: over.dirs.or(base.dirs),
            }),
            output: merge_section(user.output, project.output, |base, over| OutputConfig {
                clear_outputs: over.clear_outputs.or(base.clear_outputs),
            }),
            run: merge_section(user.run, project.run, |base, over| RunConfig {
                fail_fast: over.fail_fast.or(base.fail_fast),
            }),
        }
    }

    /// Rewrite options from built-in defaults overlaid with this config
    pub fn rewrite_options(&self) -> RewriteOptions {
        let mut options = RewriteOptions::default();

        if let Some(setup) = &self.setup {
            if let Some(enabled) = setup.enabled {
                options.setup_cell = enabled;
            }
            if let Some(packages) = &setup.packages {
                options.packages.clone_from(packages);
            }
            if let Some(commands) = &setup.commands {
                options.setup_commands.clone_from(commands);
            }
        }

        if let Some(assets) = &self.assets {
            if let Some(rewrite) = assets.rewrite {
                options.rewrite_paths = rewrite;
            }
            if let Some(base_url) = &assets.base_url {
                options.base_url.clone_from(base_url);
            }
            if let Some(dirs) = &assets.dirs {
                options.asset_dirs.clone_from(dirs);
            }
        }

        if let Some(clear) = self.output.as_ref().and_then(|o| o.clear_outputs) {
            options.clear_outputs = clear;
        }

        options
    }

    /// Configured fail-fast default
    pub fn fail_fast(&self) -> bool {
        self.run
            .as_ref()
            .and_then(|r| r.fail_fast)
            .unwrap_or(false)
    }
}

fn merge_section<T>(base: Option<T>, over: Option<T>, combine: impl FnOnce(T, T) -> T) -> Option<T> {
    match (base, over) {
        (Some(base), Some(over)) => Some(combine(base, over)),
        (base, None) => base,
        (None, over) => over,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml(
            r#"
            [setup]
            packages = ["albumentations>=1.4", "timm"]
            commands = ["!nvidia-smi"]

            [assets]
            base_url = "https://example.org/repo"
            dirs = ["images", "data"]

            [output]
            clear_outputs = true

            [run]
            fail_fast = true
            "#,
        )
        .unwrap();

        let options = config.rewrite_options();
        assert_eq!(options.packages, vec!["albumentations>=1.4", "timm"]);
        assert_eq!(options.setup_commands, vec!["!nvidia-smi"]);
        assert_eq!(options.base_url, "https://example.org/repo");
        assert_eq!(options.asset_dirs, vec!["images", "data"]);
        assert!(options.clear_outputs);
        assert!(options.setup_cell);
        assert!(config.fail_fast());
    }

    #[test]
    fn test_empty_config_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.rewrite_options(), RewriteOptions::default());
        assert!(!config.fail_fast());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_toml("[setup]\npackage = \"x\"\n").is_err());
    }

    #[test]
    fn test_project_overrides_user_per_field() {
        let user = Config::from_toml(
            "[assets]\nbase_url = \"https://user.example\"\ndirs = [\"data\"]\n[run]\nfail_fast = true\n",
        )
        .unwrap();
        let project =
            Config::from_toml("[assets]\nbase_url = \"https://project.example\"\n").unwrap();

        let merged = Config::merge(Some(user), Some(project));
        let options = merged.rewrite_options();

        assert_eq!(options.base_url, "https://project.example");
        assert_eq!(options.asset_dirs, vec!["data"]);
        assert!(merged.fail_fast());
    }

    #[test]
    fn test_merge_without_configs() {
        assert_eq!(Config::merge(None, None), Config::default());
    }
}
