use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;
use winquote_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};

use crate::commands::{load_config, CommandResult};

const COMMAND: &str = "config";

/// Prints every effective setting with where it came from. Secrets are redacted.
pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key: &str, env_keys: &[&str]| {
        field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines =
        vec!["effective config (source precedence: override > env > file > default):".to_string()];
    for (key, value, env_keys) in effective_fields(&config) {
        lines.push(render_line(key, &value, source(key, env_keys)));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

type Field = (&'static str, String, &'static [&'static str]);

fn field(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Field {
    (key, value, env_keys)
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    let api_key = config
        .extraction
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        field("catalog.url", config.catalog.url.clone(), &["WINQUOTE_CATALOG_URL"]),
        field(
            "catalog.max_connections",
            config.catalog.max_connections.to_string(),
            &["WINQUOTE_CATALOG_MAX_CONNECTIONS"],
        ),
        field(
            "catalog.timeout_secs",
            config.catalog.timeout_secs.to_string(),
            &["WINQUOTE_CATALOG_TIMEOUT_SECS"],
        ),
        field(
            "extraction.provider",
            config.extraction.provider.as_str().to_string(),
            &["WINQUOTE_EXTRACTION_PROVIDER"],
        ),
        field("extraction.model", config.extraction.model.clone(), &["WINQUOTE_EXTRACTION_MODEL"]),
        field(
            "extraction.base_url",
            config.extraction.base_url.clone(),
            &["WINQUOTE_EXTRACTION_BASE_URL"],
        ),
        field("extraction.api_key", api_key, &["WINQUOTE_EXTRACTION_API_KEY", "GEMINI_API_KEY"]),
        field(
            "extraction.timeout_secs",
            config.extraction.timeout_secs.to_string(),
            &["WINQUOTE_EXTRACTION_TIMEOUT_SECS"],
        ),
        field(
            "extraction.max_file_mb",
            config.extraction.max_file_mb.to_string(),
            &["WINQUOTE_EXTRACTION_MAX_FILE_MB"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["WINQUOTE_LOGGING_LEVEL", "WINQUOTE_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            config.logging.format.as_str().to_string(),
            &["WINQUOTE_LOGGING_FORMAT", "WINQUOTE_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if config_file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the first four characters of longer keys.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.get(..4) {
        Some(prefix) if trimmed.len() > 12 => format!("{prefix}***"),
        _ => "<redacted>".to_string(),
    }
}
