use crate::cli::{Cli, OutputFormat};
use crate::error::{ConfigError, ConfigResult};
use crate::http_client::HttpClientConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings keys understood by [`FromXmlConfig::from_settings`]
pub mod keys {
    pub const SCHEMA_PATH: &str = "schema_path";
    pub const WORKSPACE_DIR: &str = "workspace.dir";
    pub const HTTP_TIMEOUT_SECONDS: &str = "http.timeout.seconds";
    pub const HTTP_USER_AGENT: &str = "http.user.agent";
    pub const BINDING_CACHE_ENABLED: &str = "binding.cache.enabled";
}

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

/// Configuration of one transform instance, plus the CLI's batch settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct FromXmlConfig {
    /// Schema location: a filesystem path or an `http(s)://` URL
    pub schema_path: Option<String>,
    pub workspace: WorkspaceConfig,
    pub http: HttpConfig,
    pub binding: BindingConfig,
    pub processing: ProcessingConfig,
    pub output: OutputConfig,
    pub files: FileConfig,
}

/// Where compilation workspaces are created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub dir: PathBuf,
}

/// Remote schema fetching
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds; unset means no timeout
    pub timeout_seconds: Option<u64>,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BindingConfig {
    /// Share compiled models between instances configured with the same schema
    pub cache_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of parallel conversion threads
    pub threads: Option<usize>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormatConfig,
    pub verbose: bool,
    /// Errors only
    pub quiet: bool,
}

/// File processing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub extensions: Vec<String>,
    /// Include patterns (gitignore glob syntax)
    pub include_patterns: Vec<String>,
    /// Exclude patterns (gitignore glob syntax)
    pub exclude_patterns: Vec<String>,
}

/// Serializable version of the CLI's [`OutputFormat`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    Json,
    Pretty,
    Summary,
}

impl From<OutputFormat> for OutputFormatConfig {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => OutputFormatConfig::Json,
            OutputFormat::Pretty => OutputFormatConfig::Pretty,
            OutputFormat::Summary => OutputFormatConfig::Summary,
        }
    }
}

impl From<OutputFormatConfig> for OutputFormat {
    fn from(format: OutputFormatConfig) -> Self {
        match format {
            OutputFormatConfig::Json => OutputFormat::Json,
            OutputFormatConfig::Pretty => OutputFormat::Pretty,
            OutputFormatConfig::Summary => OutputFormat::Summary,
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            dir: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("from-xml")
                .join("workspaces"),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        let defaults = HttpClientConfig::default();
        Self {
            timeout_seconds: defaults.timeout_seconds,
            user_agent: defaults.user_agent,
        }
    }
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormatConfig::Json,
            verbose: false,
            quiet: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_patterns: vec![],
            exclude_patterns: vec![],
        }
    }
}

fn invalid_setting(field: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

impl FromXmlConfig {
    /// Build a configuration from the host's settings map.
    ///
    /// `schema_path` is required; unknown keys are ignored.
    pub fn from_settings(settings: &HashMap<String, String>) -> ConfigResult<Self> {
        let mut config = FromXmlConfig::default();

        let schema_path = settings
            .get(keys::SCHEMA_PATH)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: keys::SCHEMA_PATH.to_string(),
            })?;
        config.schema_path = Some(schema_path.to_string());

        if let Some(dir) = settings.get(keys::WORKSPACE_DIR) {
            if dir.trim().is_empty() {
                return Err(invalid_setting(keys::WORKSPACE_DIR, dir, "must not be empty"));
            }
            config.workspace.dir = PathBuf::from(dir);
        }

        if let Some(timeout) = settings.get(keys::HTTP_TIMEOUT_SECONDS) {
            let seconds: u64 = timeout
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    invalid_setting(keys::HTTP_TIMEOUT_SECONDS, timeout, e.to_string())
                })?;
            if seconds == 0 {
                return Err(invalid_setting(
                    keys::HTTP_TIMEOUT_SECONDS,
                    timeout,
                    "must be greater than 0",
                ));
            }
            config.http.timeout_seconds = Some(seconds);
        }

        if let Some(user_agent) = settings.get(keys::HTTP_USER_AGENT) {
            config.http.user_agent = user_agent.clone();
        }

        if let Some(enabled) = settings.get(keys::BINDING_CACHE_ENABLED) {
            config.binding.cache_enabled = enabled.trim().parse().map_err(|_| {
                invalid_setting(keys::BINDING_CACHE_ENABLED, enabled, "expected true or false")
            })?;
        }

        Ok(config)
    }

    /// The configured schema location
    pub fn schema_location(&self) -> ConfigResult<&str> {
        self.schema_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: keys::SCHEMA_PATH.to_string(),
            })
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout_seconds: self.http.timeout_seconds,
            user_agent: self.http.user_agent.clone(),
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> ConfigResult<FromXmlConfig> {
        let mut config = FromXmlConfig::default();

        if let Some(config_path) = &cli.config {
            let file_config = Self::load_from_file(config_path).await?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file().await? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides(config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> ConfigResult<FromXmlConfig> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                },
                _ => ConfigError::InvalidFormat {
                    details: format!("{}: {}", path.display(), e),
                },
            })?;
        debug!(path = %path.display(), "loading configuration file");

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match toml::from_str::<FromXmlConfig>(&content) {
                Ok(config) => Ok(config),
                Err(_) => Ok(serde_json::from_str(&content)?),
            },
        }
    }

    /// Find a configuration file in the current directory or the user config directory
    pub async fn find_config_file() -> ConfigResult<Option<FromXmlConfig>> {
        let config_names = [
            "from-xml.toml",
            "from-xml.json",
            ".from-xml.toml",
            ".from-xml.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("from-xml");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: FromXmlConfig) -> ConfigResult<FromXmlConfig> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: FromXmlConfig,
    ) -> ConfigResult<FromXmlConfig> {
        if let Some(schema_path) = env.get("FROM_XML_SCHEMA_PATH") {
            config.schema_path = Some(schema_path);
        }

        if let Some(dir) = env.get("FROM_XML_WORKSPACE_DIR") {
            config.workspace.dir = PathBuf::from(dir);
        }

        if let Some(timeout) = env.get("FROM_XML_HTTP_TIMEOUT") {
            config.http.timeout_seconds = Some(timeout.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid FROM_XML_HTTP_TIMEOUT value: {}", timeout))
            })?);
        }

        if let Some(enabled) = env.get("FROM_XML_BINDING_CACHE") {
            config.binding.cache_enabled = enabled.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid FROM_XML_BINDING_CACHE value: {}", enabled))
            })?;
        }

        if let Some(threads) = env.get("FROM_XML_THREADS") {
            config.processing.threads = Some(threads.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid FROM_XML_THREADS value: {}", threads))
            })?);
        }

        if let Some(format) = env.get("FROM_XML_FORMAT") {
            config.output.format = match format.to_lowercase().as_str() {
                "json" => OutputFormatConfig::Json,
                "pretty" => OutputFormatConfig::Pretty,
                "summary" => OutputFormatConfig::Summary,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid FROM_XML_FORMAT value: {}",
                        format
                    )));
                }
            };
        }

        if let Some(extensions) = env.get("FROM_XML_EXTENSIONS") {
            config.files.extensions = extensions
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: FromXmlConfig, cli: &Cli) -> FromXmlConfig {
        if let Some(schema) = &cli.schema {
            config.schema_path = Some(schema.clone());
        }
        if let Some(dir) = &cli.workspace_dir {
            config.workspace.dir = dir.clone();
        }
        if cli.timeout.is_some() {
            config.http.timeout_seconds = cli.timeout;
        }
        if cli.no_binding_cache {
            config.binding.cache_enabled = false;
        }
        if cli.threads.is_some() {
            config.processing.threads = cli.threads;
        }

        if let Some(format) = cli.format {
            config.output.format = format.into();
        }
        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        if let Some(extensions) = cli.get_extensions() {
            config.files.extensions = extensions;
        }
        if !cli.include_patterns.is_empty() {
            config.files.include_patterns = cli.include_patterns.clone();
        }
        if !cli.exclude_patterns.is_empty() {
            config.files.exclude_patterns = cli.exclude_patterns.clone();
        }

        config
    }

    /// Merge two configurations (second takes precedence for non-None values)
    pub fn merge_configs(mut base: FromXmlConfig, override_config: FromXmlConfig) -> FromXmlConfig {
        if override_config.schema_path.is_some() {
            base.schema_path = override_config.schema_path;
        }
        base.workspace = override_config.workspace;

        if override_config.http.timeout_seconds.is_some() {
            base.http.timeout_seconds = override_config.http.timeout_seconds;
        }
        base.http.user_agent = override_config.http.user_agent;
        base.binding = override_config.binding;

        if override_config.processing.threads.is_some() {
            base.processing.threads = override_config.processing.threads;
        }

        base.output = override_config.output;

        if !override_config.files.extensions.is_empty() {
            base.files.extensions = override_config.files.extensions;
        }
        if !override_config.files.include_patterns.is_empty() {
            base.files.include_patterns = override_config.files.include_patterns;
        }
        if !override_config.files.exclude_patterns.is_empty() {
            base.files.exclude_patterns = override_config.files.exclude_patterns;
        }

        base
    }

    /// Validate configuration values
    pub fn validate_config(config: &FromXmlConfig) -> ConfigResult<()> {
        config.schema_location()?;

        if let Some(threads) = config.processing.threads {
            if threads == 0 || threads > 1000 {
                return Err(invalid_setting(
                    "processing.threads",
                    &threads.to_string(),
                    "must be between 1 and 1000",
                ));
            }
        }

        if config.http.timeout_seconds == Some(0) {
            return Err(invalid_setting(
                keys::HTTP_TIMEOUT_SECONDS,
                "0",
                "must be greater than 0",
            ));
        }

        if config.output.verbose && config.output.quiet {
            return Err(invalid_setting(
                "output",
                "verbose+quiet",
                "cannot enable both verbose and quiet modes",
            ));
        }

        if config.files.extensions.is_empty() {
            return Err(ConfigError::MissingField {
                field: "files.extensions".to_string(),
            });
        }
        for ext in &config.files.extensions {
            if ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(invalid_setting("files.extensions", ext, "not a bare extension"));
            }
        }

        Ok(())
    }

    /// Get the effective thread count
    pub fn get_thread_count(config: &FromXmlConfig) -> usize {
        config.processing.threads.unwrap_or_else(num_cpus::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

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

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_settings_defaults() {
        let config = FromXmlConfig::from_settings(&settings(&[("schema_path", "order.xsd")])).unwrap();

        assert_eq!(config.schema_location().unwrap(), "order.xsd");
        assert!(config.binding.cache_enabled);
        assert_eq!(config.http.timeout_seconds, None);
        assert!(config.http.user_agent.starts_with("from-xml/"));
        assert!(config.workspace.dir.ends_with("workspaces"));
    }

    #[test]
    fn test_from_settings_optional_keys() {
        let config = FromXmlConfig::from_settings(&settings(&[
            ("schema_path", "https://example.com/order.xsd"),
            ("workspace.dir", "/var/tmp/ws"),
            ("http.timeout.seconds", "15"),
            ("http.user.agent", "pipeline/2"),
            ("binding.cache.enabled", "false"),
            ("something.else", "ignored"),
        ]))
        .unwrap();

        assert_eq!(config.workspace.dir, PathBuf::from("/var/tmp/ws"));
        assert_eq!(config.http.timeout_seconds, Some(15));
        assert!(!config.binding.cache_enabled);

        let http = config.http_client_config();
        assert_eq!(http.user_agent, "pipeline/2");
        assert_eq!(http.timeout_seconds, Some(15));
    }

    #[test]
    fn test_from_settings_requires_schema_path() {
        for map in [settings(&[]), settings(&[("schema_path", "  ")])] {
            match FromXmlConfig::from_settings(&map) {
                Err(ConfigError::MissingField { field }) => assert_eq!(field, "schema_path"),
                other => panic!("Expected MissingField, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_from_settings_rejects_bad_values() {
        let bad = [
            ("http.timeout.seconds", "soon"),
            ("http.timeout.seconds", "0"),
            ("binding.cache.enabled", "maybe"),
            ("workspace.dir", ""),
        ];
        for (key, value) in bad {
            let result = FromXmlConfig::from_settings(&settings(&[("schema_path", "a.xsd"), (key, value)]));
            match result {
                Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, key),
                other => panic!("Expected InvalidValue for {}, got {:?}", key, other),
            }
        }
    }

    #[tokio::test]
    async fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("from-xml.toml");
        fs::write(
            &config_path,
            r#"
schema_path = "schemas/order.xsd"

[http]
timeout_seconds = 20

[binding]
cache_enabled = false

[processing]
threads = 6

[output]
format = "pretty"

[files]
extensions = ["xml", "msg"]
"#,
        )
        .unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();
        assert_eq!(config.schema_path.as_deref(), Some("schemas/order.xsd"));
        assert_eq!(config.http.timeout_seconds, Some(20));
        assert!(!config.binding.cache_enabled);
        assert_eq!(config.processing.threads, Some(6));
        assert_eq!(config.output.format, OutputFormatConfig::Pretty);
        assert_eq!(config.files.extensions, vec!["xml", "msg"]);
        assert!(config.http.user_agent.starts_with("from-xml/"));
    }

    #[tokio::test]
    async fn test_load_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("from-xml.json");
        fs::write(
            &config_path,
            r#"{"schema_path": "http://example.com/a.xsd", "output": {"format": "summary", "verbose": false, "quiet": true}}"#,
        )
        .unwrap();

        let config = ConfigManager::load_from_file(&config_path).await.unwrap();
        assert_eq!(config.schema_path.as_deref(), Some("http://example.com/a.xsd"));
        assert_eq!(config.output.format, OutputFormatConfig::Summary);
        assert!(config.output.quiet);
        assert!(config.binding.cache_enabled);
    }

    #[tokio::test]
    async fn test_load_errors() {
        let temp_dir = TempDir::new().unwrap();

        let yaml = temp_dir.path().join("config.yaml");
        fs::write(&yaml, "schema_path: a.xsd").unwrap();
        assert!(matches!(
            ConfigManager::load_from_file(&yaml).await,
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"
        ));

        let broken = temp_dir.path().join("broken.toml");
        fs::write(&broken, "schema_path = ").unwrap();
        assert!(matches!(
            ConfigManager::load_from_file(&broken).await,
            Err(ConfigError::InvalidFormat { .. })
        ));

        let missing = temp_dir.path().join("missing.toml");
        assert!(matches!(
            ConfigManager::load_from_file(&missing).await,
            Err(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let mut mock_env = MockEnvProvider::new();
        mock_env.set("FROM_XML_SCHEMA_PATH", "/env/order.xsd");
        mock_env.set("FROM_XML_WORKSPACE_DIR", "/env/ws");
        mock_env.set("FROM_XML_HTTP_TIMEOUT", "120");
        mock_env.set("FROM_XML_FORMAT", "summary");
        mock_env.set("FROM_XML_EXTENSIONS", "xml, msg");

        let config =
            ConfigManager::apply_environment_overrides_with(&mock_env, FromXmlConfig::default())
                .unwrap();

        assert_eq!(config.schema_path.as_deref(), Some("/env/order.xsd"));
        assert_eq!(config.workspace.dir, PathBuf::from("/env/ws"));
        assert_eq!(config.http.timeout_seconds, Some(120));
        assert_eq!(config.output.format, OutputFormatConfig::Summary);
        assert_eq!(config.files.extensions, vec!["xml", "msg"]);
    }

    #[test]
    fn test_invalid_environment_values() {
        let mut mock_env = MockEnvProvider::new();
        mock_env.set("FROM_XML_HTTP_TIMEOUT", "forever");

        let result =
            ConfigManager::apply_environment_overrides_with(&mock_env, FromXmlConfig::default());
        assert!(matches!(result, Err(ConfigError::Environment(_))));
    }

    #[test]
    fn test_merge_with_cli() {
        use clap::Parser;

        let temp_dir = TempDir::new().unwrap();
        let cli = Cli::try_parse_from([
            "from-xml",
            "--schema",
            "order.xsd",
            "--threads",
            "12",
            "--verbose",
            "--extensions",
            "xml,msg",
            "--format",
            "summary",
            "--no-binding-cache",
            temp_dir.path().to_str().unwrap(),
        ])
        .unwrap();

        let mut base = FromXmlConfig::default();
        base.output.quiet = true;
        let config = ConfigManager::merge_with_cli(base, &cli);

        assert_eq!(config.schema_path.as_deref(), Some("order.xsd"));
        assert_eq!(config.processing.threads, Some(12));
        assert!(config.output.verbose);
        assert!(!config.output.quiet);
        assert!(!config.binding.cache_enabled);
        assert_eq!(config.files.extensions, vec!["xml", "msg"]);
        assert_eq!(config.output.format, OutputFormatConfig::Summary);
    }

    #[test]
    fn test_merge_configs() {
        let mut base = FromXmlConfig::default();
        base.schema_path = Some("base.xsd".to_string());
        base.processing.threads = Some(4);

        let mut override_config = FromXmlConfig::default();
        override_config.http.timeout_seconds = Some(60);

        let merged = ConfigManager::merge_configs(base, override_config);

        assert_eq!(merged.schema_path.as_deref(), Some("base.xsd"));
        assert_eq!(merged.processing.threads, Some(4));
        assert_eq!(merged.http.timeout_seconds, Some(60));
    }

    #[test]
    fn test_config_validation() {
        let mut config = FromXmlConfig::default();
        assert!(matches!(
            ConfigManager::validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.schema_path = Some("order.xsd".to_string());
        assert!(ConfigManager::validate_config(&config).is_ok());

        config.processing.threads = Some(0);
        assert!(ConfigManager::validate_config(&config).is_err());
        config.processing.threads = Some(4);

        config.http.timeout_seconds = Some(0);
        assert!(ConfigManager::validate_config(&config).is_err());
        config.http.timeout_seconds = None;

        config.output.verbose = true;
        config.output.quiet = true;
        assert!(ConfigManager::validate_config(&config).is_err());
        config.output.quiet = false;

        config.files.extensions = vec!["invalid/ext".to_string()];
        assert!(ConfigManager::validate_config(&config).is_err());

        config.files.extensions = vec![];
        assert!(ConfigManager::validate_config(&config).is_err());
    }

    #[test]
    fn test_thread_count() {
        let mut config = FromXmlConfig::default();
        assert!(ConfigManager::get_thread_count(&config) >= 1);
        config.processing.threads = Some(3);
        assert_eq!(ConfigManager::get_thread_count(&config), 3);
    }

    #[test]
    fn test_output_format_conversion() {
        for format in [OutputFormat::Json, OutputFormat::Pretty, OutputFormat::Summary] {
            assert_eq!(OutputFormat::from(OutputFormatConfig::from(format)), format);
        }
    }
}
