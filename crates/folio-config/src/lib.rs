//! Configuration management for Folio.
//!
//! Parses `folio.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `project.root_path` and `project.build_path` support environment variable
//! expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::Pattern;
use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override page source directory.
    pub root_path: Option<PathBuf>,
    /// Override build output directory.
    pub build_path: Option<PathBuf>,
    /// Override page glob.
    pub glob: Option<String>,
    /// Override freshness policy.
    pub policy: Option<Policy>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "folio.toml";

const DEFAULT_ROOT: &str = "source";
const DEFAULT_BUILD: &str = ".folio/build";
const DEFAULT_GLOB: &str = "**/*.html";
const DEFAULT_EXTENSION: &str = "html";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Project configuration (paths are relative strings from TOML).
    project: ProjectConfigRaw,
    /// Freshness policy configuration.
    pub freshness: FreshnessConfig,
    /// Source watching configuration.
    pub watch: WatchConfig,

    /// Resolved project configuration (set after loading).
    #[serde(skip)]
    pub project_resolved: ProjectSettings,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw project configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ProjectConfigRaw {
    root_path: Option<String>,
    build_path: Option<String>,
    glob: Option<String>,
    output_extension: Option<String>,
}

/// Resolved project configuration with absolute paths.
#[derive(Debug, Default)]
pub struct ProjectSettings {
    /// Directory holding page sources.
    pub root_path: PathBuf,
    /// Directory for rendered output and rebuild state.
    pub build_path: PathBuf,
    /// Glob selecting page sources.
    pub glob: String,
    /// Extension of rendered output files, without the dot.
    pub output_extension: String,
}

/// When reads bring rendered content up to date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Reads wait for a rebuild pass.
    #[default]
    Blocking,
    /// Reads return current content and rebuild in the background.
    NonBlocking,
}

/// Freshness configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FreshnessConfig {
    pub policy: Policy,
    /// Re-render previously failed pages on every pass.
    pub retry_failed: bool,
}

/// Source watching configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Keep watching after `folio build` completes its pass.
    pub enabled: bool,
    /// Quiet period before a burst of changes triggers a rebuild.
    pub debounce_ms: u64,
}

impl WatchConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_ms: 100,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`project.root_path`").
        field: String,
        /// Error message (e.g., "${`BOOK_DIR`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `folio.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. The merged
    /// result is validated.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails or
    /// the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(root_path) = &settings.root_path {
            self.project_resolved.root_path.clone_from(root_path);
        }
        if let Some(build_path) = &settings.build_path {
            self.project_resolved.build_path.clone_from(build_path);
        }
        if let Some(glob) = &settings.glob {
            self.project_resolved.glob.clone_from(glob);
        }
        if let Some(policy) = settings.policy {
            self.freshness.policy = policy;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            project: ProjectConfigRaw::default(),
            freshness: FreshnessConfig::default(),
            watch: WatchConfig::default(),
            project_resolved: ProjectSettings {
                root_path: base.join(DEFAULT_ROOT),
                build_path: base.join(DEFAULT_BUILD),
                glob: DEFAULT_GLOB.to_owned(),
                output_extension: DEFAULT_EXTENSION.to_owned(),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_project()?;
        self.validate_watch()?;
        Ok(())
    }

    fn validate_project(&self) -> Result<(), ConfigError> {
        let project = &self.project_resolved;

        require_non_empty(&project.glob, "project.glob")?;
        Pattern::new(&project.glob).map_err(|e| {
            ConfigError::Validation(format!("project.glob is not a valid pattern: {e}"))
        })?;

        require_non_empty(&project.output_extension, "project.output_extension")?;
        if project.output_extension.starts_with('.') {
            return Err(ConfigError::Validation(
                "project.output_extension must not start with a dot".to_owned(),
            ));
        }
        if project.output_extension.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "project.output_extension must not contain path separators".to_owned(),
            ));
        }

        Ok(())
    }

    fn validate_watch(&self) -> Result<(), ConfigError> {
        if self.watch.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "watch.debounce_ms must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref root) = self.project.root_path {
            self.project.root_path = Some(expand::expand_env(root, "project.root_path")?);
        }
        if let Some(ref build) = self.project.build_path {
            self.project.build_path = Some(expand::expand_env(build, "project.build_path")?);
        }
        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.project_resolved = ProjectSettings {
            root_path: resolve(self.project.root_path.as_deref(), DEFAULT_ROOT),
            build_path: resolve(self.project.build_path.as_deref(), DEFAULT_BUILD),
            glob: self
                .project
                .glob
                .clone()
                .unwrap_or_else(|| DEFAULT_GLOB.to_owned()),
            output_extension: self
                .project
                .output_extension
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned()),
        };
    }
}
