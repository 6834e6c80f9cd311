use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "winquote.toml";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub extraction: ExtractionConfig,
    pub logging: LoggingConfig,
}

/// Where the persisted catalog lives.
#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ExtractionConfig {
    pub provider: ExtractionProvider,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_file_mb: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider: ExtractionProvider::Gemini,
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 120,
            max_file_mb: 30,
        }
    }
}

impl ExtractionConfig {
    /// True when a non-blank key is present. A missing key is reported by the
    /// extractor at call time, so input validation still runs without one.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionProvider {
    Gemini,
}

impl ExtractionProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub catalog_url: Option<String>,
    pub log_level: Option<String>,
    pub extraction_model: Option<String>,
    pub extraction_api_key: Option<String>,
    pub extraction_timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig {
                url: "sqlite://winquote.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            extraction: ExtractionConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for ExtractionProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            other => Err(ConfigError::Validation(format!(
                "unsupported extraction provider `{other}` (expected gemini)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(catalog) = patch.catalog {
            if let Some(url) = catalog.url {
                self.catalog.url = url;
            }
            if let Some(max_connections) = catalog.max_connections {
                self.catalog.max_connections = max_connections;
            }
            if let Some(timeout_secs) = catalog.timeout_secs {
                self.catalog.timeout_secs = timeout_secs;
            }
        }

        if let Some(extraction) = patch.extraction {
            if let Some(provider) = extraction.provider {
                self.extraction.provider = provider;
            }
            if let Some(api_key) = extraction.api_key {
                self.extraction.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = extraction.base_url {
                self.extraction.base_url = base_url;
            }
            if let Some(model) = extraction.model {
                self.extraction.model = model;
            }
            if let Some(timeout_secs) = extraction.timeout_secs {
                self.extraction.timeout_secs = timeout_secs;
            }
            if let Some(max_file_mb) = extraction.max_file_mb {
                self.extraction.max_file_mb = max_file_mb;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("WINQUOTE_CATALOG_URL") {
            self.catalog.url = value;
        }
        if let Some(value) = read_env("WINQUOTE_CATALOG_MAX_CONNECTIONS") {
            self.catalog.max_connections = parse_u32("WINQUOTE_CATALOG_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("WINQUOTE_CATALOG_TIMEOUT_SECS") {
            self.catalog.timeout_secs = parse_u64("WINQUOTE_CATALOG_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("WINQUOTE_EXTRACTION_PROVIDER") {
            self.extraction.provider = value.parse()?;
        }
        let api_key =
            read_env("WINQUOTE_EXTRACTION_API_KEY").or_else(|| read_env("GEMINI_API_KEY"));
        if let Some(value) = api_key {
            self.extraction.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("WINQUOTE_EXTRACTION_BASE_URL") {
            self.extraction.base_url = value;
        }
        if let Some(value) = read_env("WINQUOTE_EXTRACTION_MODEL") {
            self.extraction.model = value;
        }
        if let Some(value) = read_env("WINQUOTE_EXTRACTION_TIMEOUT_SECS") {
            self.extraction.timeout_secs = parse_u64("WINQUOTE_EXTRACTION_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("WINQUOTE_EXTRACTION_MAX_FILE_MB") {
            self.extraction.max_file_mb = parse_u64("WINQUOTE_EXTRACTION_MAX_FILE_MB", &value)?;
        }

        let log_level =
            read_env("WINQUOTE_LOGGING_LEVEL").or_else(|| read_env("WINQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("WINQUOTE_LOGGING_FORMAT").or_else(|| read_env("WINQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(catalog_url) = overrides.catalog_url {
            self.catalog.url = catalog_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(model) = overrides.extraction_model {
            self.extraction.model = model;
        }
        if let Some(api_key) = overrides.extraction_api_key {
            self.extraction.api_key = Some(secret_value(api_key));
        }
        if let Some(timeout_secs) = overrides.extraction_timeout_secs {
            self.extraction.timeout_secs = timeout_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_catalog(&self.catalog)?;
        validate_extraction(&self.extraction)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    let url = catalog.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "catalog.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if catalog.max_connections == 0 {
        return Err(ConfigError::Validation(
            "catalog.max_connections must be greater than zero".to_string(),
        ));
    }

    if catalog.timeout_secs == 0 || catalog.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "catalog.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_extraction(extraction: &ExtractionConfig) -> Result<(), ConfigError> {
    if extraction.timeout_secs == 0 || extraction.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "extraction.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if extraction.max_file_mb == 0 || extraction.max_file_mb > 100 {
        return Err(ConfigError::Validation(
            "extraction.max_file_mb must be in range 1..=100".to_string(),
        ));
    }

    if extraction.model.trim().is_empty() {
        return Err(ConfigError::Validation("extraction.model must not be empty".to_string()));
    }

    let base_url = extraction.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "extraction.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    catalog: Option<CatalogPatch>,
    extraction: Option<ExtractionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractionPatch {
    provider: Option<ExtractionProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_file_mb: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
