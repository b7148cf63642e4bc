use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use privreset_core::{IgnoreList, ObjectKind, Settings, SnowflakeSettings, TokenType};
use serde::Deserialize;

use crate::error::{AppError, Result};

const DEFAULT_CONFIG_ENV: &str = "PRIVRESET_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "privreset.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: Option<String>,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
    pub output_directory: PathBuf,
    pub settings: RunSettings,
    pub application: ApplicationSettings,
    pub snowflake: SnowflakeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: Some(String::from("info")),
            log_format: LogFormat::Text,
            log_file: None,
            output_directory: PathBuf::from("."),
            settings: RunSettings::default(),
            application: ApplicationSettings::default(),
            snowflake: SnowflakeConfig::default(),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dry_run: bool,
    pub output_directory: Option<PathBuf>,
    pub new_owner: Option<String>,
}

impl AppConfig {
    pub fn from_sources(cli_path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let env_path = std::env::var(DEFAULT_CONFIG_ENV).ok();

        if let Some(path) = cli_path {
            if path.as_os_str().is_empty() {
                return Err(AppError::Config(
                    "configuration path must not be empty".into(),
                ));
            }
        }

        let mut config = if let Some(path) = cli_path {
            Self::load_from_path(path)?
        } else if let Some(path) = env_path.as_deref().filter(|p| !p.is_empty()) {
            Self::load_from_path(path)?
        } else if cwd.join(DEFAULT_CONFIG_FILE).is_file() {
            Self::load_from_path(cwd.join(DEFAULT_CONFIG_FILE))?
        } else {
            let mut cfg = Self::default();
            cfg.normalize_paths(&cwd);
            cfg
        };

        config.apply(overrides, &cwd);
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let raw = fs::read_to_string(&absolute_path)?;
        let mut config: AppConfig = toml::from_str(&raw)?;
        let base = absolute_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.normalize_paths(&base);
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides, cwd: &Path) {
        if overrides.dry_run {
            self.settings.run_dry = true;
        }
        if let Some(directory) = &overrides.output_directory {
            self.output_directory = cwd.join(directory);
        }
        if let Some(owner) = &overrides.new_owner {
            self.settings.new_owner = owner.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.settings.new_owner.trim().is_empty() {
            return Err(AppError::Config("settings.new_owner must not be empty".into()));
        }

        if self.settings.objects.is_empty() {
            return Err(AppError::Config("settings.objects must list at least one object kind".into()));
        }

        if self.settings.workers == 0 {
            return Err(AppError::Config(
                "settings.workers must be greater than zero".into(),
            ));
        }

        if self.snowflake.account_url.trim().is_empty() {
            return Err(AppError::Config("snowflake.account_url must not be empty".into()));
        }

        if self.snowflake.role.trim().is_empty() {
            return Err(AppError::Config("snowflake.role must not be empty".into()));
        }

        Ok(())
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Inputs for the reconciliation run.
    pub fn reconcile_settings(&self) -> Settings {
        Settings {
            databases: self.settings.databases.clone(),
            objects: self.settings.objects.clone(),
            new_owner: self.settings.new_owner.clone(),
            run_dry: self.settings.run_dry,
            workers: self.settings.workers,
            ignore: IgnoreList {
                databases: self.application.databases_to_ignore.clone(),
                schemas: self.application.schemas_to_ignore.clone(),
            },
            output_directory: self.output_directory.clone(),
        }
    }

    /// Session settings, with the token taken from the environment first.
    pub fn snowflake_settings(&self) -> Result<SnowflakeSettings> {
        self.snowflake.resolve(|name| std::env::var(name).ok())
    }

    fn normalize_paths(&mut self, base: &Path) {
        if self.output_directory.is_relative() {
            self.output_directory = base.join(&self.output_directory);
        }
        if let Some(path) = &mut self.log_file {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub databases: Vec<String>,
    pub objects: Vec<ObjectKind>,
    pub new_owner: String,
    pub run_dry: bool,
    pub workers: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            databases: Vec::new(),
            objects: ObjectKind::ALL.to_vec(),
            new_owner: String::new(),
            run_dry: true,
            workers: privreset_core::pool::DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub databases_to_ignore: Vec<String>,
    pub schemas_to_ignore: Vec<String>,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        let IgnoreList { databases, schemas } = IgnoreList::default();
        Self {
            databases_to_ignore: databases,
            schemas_to_ignore: schemas,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnowflakeConfig {
    pub account_url: String,
    pub role: String,
    pub warehouse: Option<String>,
    pub token_env: String,
    pub token: Option<String>,
    pub token_type: TokenType,
    pub statement_timeout_secs: u64,
}

impl Default for SnowflakeConfig {
    fn default() -> Self {
        Self {
            account_url: String::new(),
            role: String::new(),
            warehouse: None,
            token_env: String::from("SNOWFLAKE_TOKEN"),
            token: None,
            token_type: TokenType::Oauth,
            statement_timeout_secs: 120,
        }
    }
}

impl SnowflakeConfig {
    fn resolve<F>(&self, lookup: F) -> Result<SnowflakeSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(&self.token_env)
            .filter(|token| !token.is_empty())
            .or_else(|| self.token.clone().filter(|token| !token.is_empty()))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "no warehouse token: set {} or snowflake.token",
                    self.token_env
                ))
            })?;

        let mut settings = SnowflakeSettings::new(&self.account_url, token, &self.role);
        settings.token_type = self.token_type;
        settings.warehouse = self.warehouse.clone();
        settings.statement_timeout = Duration::from_secs(self.statement_timeout_secs);
        Ok(settings)
    }
}
