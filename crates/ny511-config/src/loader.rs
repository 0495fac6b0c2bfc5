//! Configuration loading utilities

use crate::schema::{Config, PagingMode};
use ny511_common::{DashError, LoggingConfig, SocrataConfig};
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};
use validator::ValidationErrors;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_VAR: &str = "NY511_CONFIG_PATH";

/// File names probed, in order, when no path is given.
pub const CONFIG_CANDIDATES: [&str; 3] = ["config.yaml", "config.yml", "config.toml"];

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error when reading configuration file
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// File extension is neither YAML nor TOML
    #[error("Unsupported configuration format: '{0}' (expected .yaml, .yml or .toml)")]
    UnsupportedFormat(String),

    /// Configuration validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationErrors),

    /// Environment variable parsing error
    #[error("Failed to parse environment variable '{var}': {source}")]
    EnvParseError {
        var: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The app token file could not be read
    #[error("Failed to read app token file '{path}': {source}")]
    TokenFileError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<ConfigError> for DashError {
    fn from(err: ConfigError) -> Self {
        DashError::config_with_source("Failed to load configuration", err)
    }
}

/// On-disk configuration format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Reads process environment variables.
pub fn process_env(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// Configuration loader for the application
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a file with process environment overrides applied.
    pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        Self::load_config_with_env(path, process_env)
    }

    /// Load a file, taking overrides from `lookup` instead of the process
    /// environment.
    pub fn load_config_with_env<P, F>(path: P, lookup: F) -> Result<Config, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse_str(&content, format)?;
        info!("Loaded configuration from {}", path.display());
        Self::finalize(config, lookup)
    }

    /// Parse configuration text without overrides or validation.
    pub fn parse_str(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
        match format {
            ConfigFormat::Yaml => Ok(serde_yaml::from_str(content)?),
            ConfigFormat::Toml => Ok(toml::from_str(content)?),
        }
    }

    /// Load configuration following the search order: `NY511_CONFIG_PATH`, then
    /// the candidate files in the working directory, then defaults.
    pub fn load() -> ny511_common::Result<Config> {
        Ok(Self::discover(Path::new("."), process_env)?)
    }

    /// Load an explicit file when given, otherwise search.
    pub fn load_from(path: Option<&Path>) -> ny511_common::Result<Config> {
        match path {
            Some(path) => Ok(Self::load_config(path)?),
            None => Self::load(),
        }
    }

    /// Search `base_dir` for a configuration file.
    pub fn discover<F>(base_dir: &Path, lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(CONFIG_PATH_VAR) {
            return Self::load_config_with_env(PathBuf::from(path), lookup);
        }

        for candidate in CONFIG_CANDIDATES {
            let path = base_dir.join(candidate);
            if path.exists() {
                return Self::load_config_with_env(path, lookup);
            }
        }

        debug!("No configuration file found, using defaults");
        Self::finalize(Config::default(), lookup)
    }

    fn finalize<F>(mut config: Config, lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::apply_env_overrides(&mut config, &lookup)?;
        Self::resolve_app_token(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Read `app_token_file` into `app_token` unless a token is already set.
    fn resolve_app_token(config: &mut Config) -> Result<(), ConfigError> {
        if config.dataset.app_token.is_some() {
            return Ok(());
        }
        if let Some(path) = &config.dataset.app_token_file {
            let token = std::fs::read_to_string(path).map_err(|source| {
                ConfigError::TokenFileError {
                    path: path.clone(),
                    source,
                }
            })?;
            let token = token.trim();
            if !token.is_empty() {
                config.dataset.app_token = Some(token.to_string());
            }
        }
        Ok(())
    }

    /// Apply `NY511_*` overrides to configuration
    fn apply_env_overrides<F>(config: &mut Config, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Dataset overrides
        if let Some(endpoint) = lookup("NY511_ENDPOINT") {
            config.dataset.endpoint = endpoint;
        }
        if let Some(token) = lookup("NY511_APP_TOKEN") {
            config.dataset.app_token = Some(token);
        }
        if let Some(region) = lookup("NY511_REGION") {
            config.dataset.region = region;
        }
        if let Some(timeout) = parse_var(lookup, "NY511_TIMEOUT")? {
            config.dataset.timeout_seconds = timeout;
        }
        if let Some(retries) = parse_var(lookup, "NY511_MAX_RETRIES")? {
            config.dataset.max_retries = retries;
        }

        // Paging overrides
        if let Some(page_size) = parse_var(lookup, "NY511_PAGE_SIZE")? {
            config.paging.page_size = page_size;
        }
        if let Some(page_count) = parse_var(lookup, "NY511_PAGE_COUNT")? {
            config.paging.page_count = page_count;
        }
        if let Some(mode) = parse_var::<PagingMode, _>(lookup, "NY511_PAGING_MODE")? {
            config.paging.mode = mode;
        }

        // Output overrides
        if let Some(level) = lookup("NY511_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(dir) = lookup("NY511_OUTPUT_DIR") {
            config.charts.output_dir = dir;
        }

        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Into<Box<dyn StdError + Send + Sync>>,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::EnvParseError {
                var: var.to_string(),
                source: e.into(),
            }),
        None => Ok(None),
    }
}

impl Config {
    /// HTTP client settings for the SODA client.
    pub fn socrata_config(&self) -> SocrataConfig {
        let mut socrata = SocrataConfig::new(self.dataset.endpoint.clone())
            .with_timeout(self.dataset.timeout_seconds)
            .with_rate_limit(self.dataset.rate_limit_per_sec)
            .with_max_retries(self.dataset.max_retries);
        if let Some(token) = &self.dataset.app_token {
            socrata = socrata.with_app_token(token.clone());
        }
        socrata
    }

    /// Subscriber settings for `ny511_common::logging`.
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.logging.level.clone(),
            json_format: self.logging.json,
            pretty_format: self.logging.pretty,
            file_path: self.logging.file.clone(),
            ..LoggingConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DailyStrategy;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn config_file(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_load_yaml_partial_sections_use_defaults() {
        let file = config_file("paging:\n  mode: cursor\n  page_size: 250\n", ".yaml");
        let config = ConfigLoader::load_config_with_env(file.path(), no_env).unwrap();

        assert_eq!(config.paging.mode, PagingMode::Cursor);
        assert_eq!(config.paging.page_size, 250);
        assert_eq!(config.paging.page_count, 5);
        assert_eq!(config.dataset.region, "NY");
    }

    #[test]
    fn test_load_toml() {
        let toml = "[pipeline]\ndaily_strategy = \"server_side\"\ntop_categories = 3\n";
        let file = config_file(toml, ".toml");
        let config = ConfigLoader::load_config_with_env(file.path(), no_env).unwrap();
        assert_eq!(config.pipeline.daily_strategy, DailyStrategy::ServerSide);
        assert_eq!(config.pipeline.top_categories, 3);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = config_file("{}", ".json");
        let err = ConfigLoader::load_config_with_env(file.path(), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_invalid_yaml() {
        let file = config_file("dataset:\n  region: [unclosed", ".yaml");
        let err = ConfigLoader::load_config_with_env(file.path(), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::YamlError(_)));
    }

    #[test]
    fn test_validation_error() {
        let file = config_file("charts:\n  background_color: \"white\"\n", ".yml");
        let err = ConfigLoader::load_config_with_env(file.path(), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_environment_overrides() {
        let file = config_file("dataset:\n  region: \"NY\"\n", ".yaml");
        let lookup = env(&[
            ("NY511_APP_TOKEN", "env-token"),
            ("NY511_PAGE_COUNT", "7"),
            ("NY511_PAGING_MODE", "cursor"),
            ("NY511_LOG_LEVEL", "debug"),
            ("NY511_OUTPUT_DIR", "/tmp/ny511"),
        ]);
        let config = ConfigLoader::load_config_with_env(file.path(), lookup).unwrap();

        assert_eq!(config.dataset.app_token.as_deref(), Some("env-token"));
        assert_eq!(config.paging.page_count, 7);
        assert_eq!(config.paging.mode, PagingMode::Cursor);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.charts.output_dir, "/tmp/ny511");
    }

    #[test]
    fn test_env_parse_error() {
        let file = config_file("{}\n", ".yaml");
        let err = ConfigLoader::load_config_with_env(file.path(), env(&[("NY511_PAGE_SIZE", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { ref var, .. } if var == "NY511_PAGE_SIZE"));

        let err = ConfigLoader::load_config_with_env(file.path(), env(&[("NY511_PAGING_MODE", "random")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));
    }

    #[test]
    fn test_env_override_is_validated() {
        let file = config_file("{}\n", ".yaml");
        let err = ConfigLoader::load_config_with_env(file.path(), env(&[("NY511_REGION", "new york")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_app_token_file() {
        let token = config_file("  file-token\n", ".txt");
        let yaml = format!("dataset:\n  app_token_file: \"{}\"\n", token.path().display());
        let file = config_file(&yaml, ".yaml");
        let config = ConfigLoader::load_config_with_env(file.path(), no_env).unwrap();
        assert_eq!(config.dataset.app_token.as_deref(), Some("file-token"));
    }

    #[test]
    fn test_missing_app_token_file() {
        let file = config_file("dataset:\n  app_token_file: \"/nonexistent/token\"\n", ".yaml");
        let err = ConfigLoader::load_config_with_env(file.path(), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::TokenFileError { .. }));
    }

    #[test]
    fn test_missing_config_file() {
        let err = ConfigLoader::load_config_with_env("/nonexistent/path/config.yaml", no_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_discover_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::discover(dir.path(), no_env).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_discover_prefers_candidates_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[paging]\npage_size = 10\n").unwrap();
        std::fs::write(dir.path().join("config.yml"), "paging:\n  page_size: 20\n").unwrap();

        let config = ConfigLoader::discover(dir.path(), no_env).unwrap();
        assert_eq!(config.paging.page_size, 20);
    }

    #[test]
    fn test_discover_honours_config_path_var() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.yaml"), "paging:\n  page_size: 20\n").unwrap();
        let explicit = config_file("paging:\n  page_size: 30\n", ".yaml");
        let path = explicit.path().display().to_string();

        let config = ConfigLoader::discover(dir.path(), env(&[(CONFIG_PATH_VAR, path.as_str())])).unwrap();
        assert_eq!(config.paging.page_size, 30);
    }

    #[test]
    fn test_runtime_conversions() {
        let mut config = Config::default();
        config.dataset.app_token = Some("abc".to_string());
        config.dataset.max_retries = 1;
        config.logging.json = true;

        let socrata = config.socrata_config();
        assert_eq!(socrata.app_token.as_deref(), Some("abc"));
        assert_eq!(socrata.max_retries, 1);
        assert_eq!(socrata.timeout_secs, 30);

        let logging = config.logging_config();
        assert!(logging.json_format);
        assert_eq!(logging.level, "info");
    }

    #[test]
    fn test_config_error_converts_to_dash_error() {
        let err: DashError = ConfigError::UnsupportedFormat("x.ini".to_string()).into();
        assert!(err.to_string().contains("Failed to load configuration"));
    }
}
