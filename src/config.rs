use crate::cache::CacheConfig;
use crate::cli::ValidateArgs;
use crate::http_client::HttpClientConfig;
use crate::retry::RetryPolicy;
use crate::validator::ValidationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Prefix shared by every environment override
const ENV_PREFIX: &str = "STAC_VALIDATE_";

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub validation: ValidationSettings,
    pub cache: CacheSettings,
    pub network: NetworkSettings,
    pub output: OutputSettings,
    pub schemas: SchemaSettings,
}

/// Traversal settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ValidationSettings {
    /// Linked documents fetched at once (defaults to the CPU count)
    pub concurrency: Option<usize>,
    /// Deepest level whose links are followed
    pub max_depth: Option<u32>,
    /// Show progress on stderr
    pub show_progress: bool,
}

/// Per-run cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of parsed documents kept
    pub max_entries: u64,
    /// Maximum number of compiled schemas kept
    pub max_compiled_schemas: u64,
    /// Optional document TTL in seconds
    pub ttl_seconds: Option<u64>,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkSettings {
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
    /// Delay before the first retry in milliseconds
    pub retry_initial_delay_ms: u64,
    /// Upper bound of a single retry delay in milliseconds
    pub retry_max_delay_ms: u64,
    /// Growth factor between retry delays
    pub retry_multiplier: u32,
    /// Total retry budget in seconds
    pub retry_max_elapsed_seconds: u64,
    /// Optional cap on retries per request
    pub retry_max_attempts: Option<u32>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputSettings {
    /// Echo records and print a summary
    pub verbose: bool,
    /// Suppress the records on stdout
    pub no_output: bool,
    /// File receiving a copy of the records
    pub log_file: Option<PathBuf>,
}

/// Offline schema bundle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SchemaSettings {
    /// Directory of schema files keyed by `$id`
    pub directory: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            max_entries: defaults.max_entries,
            max_compiled_schemas: defaults.max_compiled_schemas,
            ttl_seconds: None,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            timeout_seconds: HttpClientConfig::default().timeout_seconds,
            retry_initial_delay_ms: retry.initial_delay.as_millis() as u64,
            retry_max_delay_ms: retry.max_delay.as_millis() as u64,
            retry_multiplier: retry.multiplier,
            retry_max_elapsed_seconds: retry.max_elapsed.as_secs(),
            retry_max_attempts: retry.max_retries,
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(args: &ValidateArgs) -> Result<Config> {
        Self::load_config_with(&SystemEnvProvider, args).await
    }

    /// [`load_config`](Self::load_config) with a custom environment provider
    pub async fn load_config_with(env: &impl EnvProvider, args: &ValidateArgs) -> Result<Config> {
        let mut config = match &args.config {
            Some(config_path) => Self::load_from_file(config_path).await?,
            None => Self::find_config_file().await?.unwrap_or_default(),
        };

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, args);

        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON); missing keys keep their defaults
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "stac-validate.toml",
            "stac-validate.json",
            ".stac-validate.toml",
            ".stac-validate.json",
        ];

        // Check current directory first
        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                tracing::debug!(path = %path.display(), "Using configuration file");
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("stac-validate");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    tracing::debug!(path = %path.display(), "Using configuration file");
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        // Validation settings
        if let Some(concurrency) = parse_env(env, "CONCURRENCY")? {
            config.validation.concurrency = Some(concurrency);
        }
        if let Some(max_depth) = parse_env(env, "MAX_DEPTH")? {
            config.validation.max_depth = Some(max_depth);
        }
        if let Some(progress) = parse_env(env, "PROGRESS")? {
            config.validation.show_progress = progress;
        }

        // Cache settings
        if let Some(max_entries) = parse_env(env, "CACHE_ENTRIES")? {
            config.cache.max_entries = max_entries;
        }

        // Network settings
        if let Some(timeout) = parse_env(env, "TIMEOUT")? {
            config.network.timeout_seconds = timeout;
        }
        if let Some(max_elapsed) = parse_env(env, "RETRY_MAX_ELAPSED")? {
            config.network.retry_max_elapsed_seconds = max_elapsed;
        }
        if let Some(max_attempts) = parse_env(env, "RETRY_ATTEMPTS")? {
            config.network.retry_max_attempts = Some(max_attempts);
        }

        // Output settings
        if let Some(verbose) = parse_env(env, "VERBOSE")? {
            config.output.verbose = verbose;
        }
        if let Some(log_file) = env.get(&format!("{}LOG_FILE", ENV_PREFIX)) {
            config.output.log_file = Some(PathBuf::from(log_file));
        }

        if let Some(schema_dir) = env.get(&format!("{}SCHEMA_DIR", ENV_PREFIX)) {
            config.schemas.directory = Some(PathBuf::from(schema_dir));
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, args: &ValidateArgs) -> Config {
        if args.concurrency.is_some() {
            config.validation.concurrency = args.concurrency;
        }
        if args.max_depth.is_some() {
            config.validation.max_depth = args.max_depth;
        }
        config.validation.show_progress |= args.progress;

        if let Some(timeout) = args.timeout {
            config.network.timeout_seconds = timeout;
        }

        config.output.verbose |= args.verbose;
        config.output.no_output |= args.no_output;
        if let Some(log_file) = &args.log_file {
            config.output.log_file = Some(log_file.clone());
        }

        if let Some(schema_dir) = &args.schema_dir {
            config.schemas.directory = Some(schema_dir.clone());
        }

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if let Some(concurrency) = config.validation.concurrency {
            if concurrency == 0 {
                return Err(ConfigError::Validation(
                    "Concurrency must be greater than 0".to_string(),
                ));
            }
            if concurrency > 1000 {
                return Err(ConfigError::Validation(
                    "Concurrency cannot exceed 1000".to_string(),
                ));
            }
        }

        if config.cache.max_entries == 0 {
            return Err(ConfigError::Validation(
                "Cache max entries must be greater than 0".to_string(),
            ));
        }

        if config.cache.max_compiled_schemas == 0 {
            return Err(ConfigError::Validation(
                "Compiled schema cache size must be greater than 0".to_string(),
            ));
        }

        if config.network.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.network.retry_multiplier == 0 {
            return Err(ConfigError::Validation(
                "Retry multiplier must be at least 1".to_string(),
            ));
        }

        if config.network.retry_initial_delay_ms > config.network.retry_max_delay_ms {
            return Err(ConfigError::Validation(
                "Initial retry delay cannot exceed the maximum retry delay".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the effective concurrency bound
    pub fn get_concurrency(config: &Config) -> usize {
        config.validation.concurrency.unwrap_or_else(num_cpus::get)
    }

    pub fn validation_config(config: &Config) -> ValidationConfig {
        ValidationConfig {
            max_concurrent_fetches: Self::get_concurrency(config),
            max_depth: config.validation.max_depth,
            show_progress: config.validation.show_progress,
            verbose: config.output.verbose,
        }
    }

    pub fn cache_config(config: &Config) -> CacheConfig {
        CacheConfig {
            max_entries: config.cache.max_entries,
            max_compiled_schemas: config.cache.max_compiled_schemas,
            ttl: config.cache.ttl_seconds.map(Duration::from_secs),
        }
    }

    pub fn http_client_config(config: &Config) -> HttpClientConfig {
        HttpClientConfig {
            timeout_seconds: config.network.timeout_seconds,
            ..HttpClientConfig::default()
        }
    }

    pub fn retry_policy(config: &Config) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(config.network.retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.network.retry_max_delay_ms),
            multiplier: config.network.retry_multiplier,
            max_elapsed: Duration::from_secs(config.network.retry_max_elapsed_seconds),
            max_retries: config.network.retry_max_attempts,
        }
    }
}

/// Read `STAC_VALIDATE_{name}` and parse it, naming the variable on failure
fn parse_env<T: FromStr>(env: &impl EnvProvider, name: &str) -> Result<Option<T>> {
    let key = format!("{}{}", ENV_PREFIX, name);
    match env.get(&key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Mock environment variable provider for testing
    #[derive(Default)]
    struct MockEnvProvider {
        vars: HashMap<String, String>,
    }

    impl MockEnvProvider {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
            }
        }

        fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.vars.insert(key.into(), value.into());
        }
    }

    impl EnvProvider for MockEnvProvider {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    fn args(target: &str) -> ValidateArgs {
        ValidateArgs {
            target: target.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.validation.concurrency, None);
        assert_eq!(config.validation.max_depth, None);
        assert!(!config.validation.show_progress);

        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.network.timeout_seconds, 30);
        assert_eq!(config.network.retry_multiplier, 2);
        assert_eq!(config.network.retry_max_elapsed_seconds, 300);

        assert!(!config.output.verbose);
        assert!(config.schemas.directory.is_none());
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("stac-validate.toml");

        let toml_content = r#"
[validation]
concurrency = 8
max_depth = 3
show_progress = true

[cache]
max_entries = 250

[network]
timeout_seconds = 60
retry_initial_delay_ms = 100
retry_max_attempts = 4

[output]
verbose = true
log_file = "/tmp/stac.json"

[schemas]
directory = "/opt/stac-schemas"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();

        assert_eq!(config.validation.concurrency, Some(8));
        assert_eq!(config.validation.max_depth, Some(3));
        assert!(config.validation.show_progress);
        assert_eq!(config.cache.max_entries, 250);
        // unspecified keys keep defaults
        assert_eq!(config.cache.max_compiled_schemas, 100);
        assert_eq!(config.network.timeout_seconds, 60);
        assert_eq!(config.network.retry_max_attempts, Some(4));
        assert_eq!(config.network.retry_max_delay_ms, 30_000);
        assert_eq!(config.output.log_file, Some(PathBuf::from("/tmp/stac.json")));
        assert_eq!(
            config.schemas.directory,
            Some(PathBuf::from("/opt/stac-schemas"))
        );
    }

    #[tokio::test]
    async fn test_load_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("stac-validate.json");

        fs::write(
            &config_path,
            r#"{"validation": {"concurrency": 2}, "network": {"timeout_seconds": 5}}"#,
        )
        .unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();
        assert_eq!(config.validation.concurrency, Some(2));
        assert_eq!(config.network.timeout_seconds, 5);
        assert_eq!(config.cache, CacheSettings::default());
    }

    #[tokio::test]
    async fn test_unsupported_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "validation: {}").unwrap();

        let result = ConfigManager::load_from_file(&config_path).await;
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"));
    }

    #[tokio::test]
    async fn test_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[validation\nconcurrency = ").unwrap();

        let result = ConfigManager::load_from_file(&config_path).await;
        assert!(matches!(result, Err(ConfigError::TomlParsing(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let mut env = MockEnvProvider::new();
        env.set("STAC_VALIDATE_CONCURRENCY", "16");
        env.set("STAC_VALIDATE_MAX_DEPTH", "2");
        env.set("STAC_VALIDATE_TIMEOUT", "10");
        env.set("STAC_VALIDATE_VERBOSE", "true");
        env.set("STAC_VALIDATE_SCHEMA_DIR", "/srv/schemas");

        let config =
            ConfigManager::apply_environment_overrides_with(&env, Config::default()).unwrap();

        assert_eq!(config.validation.concurrency, Some(16));
        assert_eq!(config.validation.max_depth, Some(2));
        assert_eq!(config.network.timeout_seconds, 10);
        assert!(config.output.verbose);
        assert_eq!(config.schemas.directory, Some(PathBuf::from("/srv/schemas")));
    }

    #[test]
    fn test_invalid_environment_values() {
        let mut env = MockEnvProvider::new();
        env.set("STAC_VALIDATE_CONCURRENCY", "many");

        let result = ConfigManager::apply_environment_overrides_with(&env, Config::default());
        match result {
            Err(ConfigError::Environment(message)) => {
                assert!(message.contains("STAC_VALIDATE_CONCURRENCY"))
            }
            other => panic!("Expected environment error, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_with_cli() {
        let mut config = Config::default();
        config.validation.concurrency = Some(4);
        config.network.timeout_seconds = 90;

        let cli_args = ValidateArgs {
            concurrency: Some(12),
            verbose: true,
            schema_dir: Some(PathBuf::from("bundle")),
            ..args("catalog.json")
        };

        let merged = ConfigManager::merge_with_cli(config, &cli_args);
        assert_eq!(merged.validation.concurrency, Some(12));
        // flags not given on the command line leave the file value alone
        assert_eq!(merged.network.timeout_seconds, 90);
        assert!(merged.output.verbose);
        assert_eq!(merged.schemas.directory, Some(PathBuf::from("bundle")));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.validation.concurrency = Some(0);
        assert!(ConfigManager::validate_config(&config).is_err());

        config.validation.concurrency = Some(1001);
        assert!(ConfigManager::validate_config(&config).is_err());

        config.validation.concurrency = Some(1000);
        assert!(ConfigManager::validate_config(&config).is_ok());

        config.network.timeout_seconds = 0;
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = Config::default();
        config.cache.max_entries = 0;
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = Config::default();
        config.network.retry_initial_delay_ms = 60_000;
        assert!(ConfigManager::validate_config(&config).is_err());
    }

    #[test]
    fn test_derived_configs() {
        let mut config = Config::default();
        config.validation.concurrency = Some(3);
        config.validation.max_depth = Some(1);
        config.network.retry_max_attempts = Some(2);
        config.cache.ttl_seconds = Some(60);

        let validation = ConfigManager::validation_config(&config);
        assert_eq!(validation.max_concurrent_fetches, 3);
        assert_eq!(validation.max_depth, Some(1));

        let retry = ConfigManager::retry_policy(&config);
        assert_eq!(retry.max_retries, Some(2));
        assert_eq!(retry, RetryPolicy {
            max_retries: Some(2),
            ..RetryPolicy::default()
        });

        let cache = ConfigManager::cache_config(&config);
        assert_eq!(cache.ttl, Some(Duration::from_secs(60)));
        assert_eq!(ConfigManager::http_client_config(&config).timeout_seconds, 30);
    }

    #[tokio::test]
    async fn test_load_config_with_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("custom.toml");
        fs::write(&config_path, "[validation]\nconcurrency = 5\n").unwrap();

        let mut env = MockEnvProvider::new();
        env.set("STAC_VALIDATE_CONCURRENCY", "6");

        let cli_args = ValidateArgs {
            config: Some(config_path),
            ..args("catalog.json")
        };
        let config = ConfigManager::load_config_with(&env, &cli_args).await.unwrap();

        // environment beats the file
        assert_eq!(config.validation.concurrency, Some(6));
    }

    #[tokio::test]
    async fn test_load_config_missing_explicit_file() {
        let cli_args = ValidateArgs {
            concurrency: Some(0),
            config: Some(PathBuf::from("/nonexistent/stac-validate.toml")),
            ..args("catalog.json")
        };

        // a missing explicit config file is an IO error before validation
        let result = ConfigManager::load_config_with(&MockEnvProvider::new(), &cli_args).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
