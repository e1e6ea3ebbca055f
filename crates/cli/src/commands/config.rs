use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use quoteflow_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    render(LoadOptions::default())
}

pub fn render(options: LoadOptions) -> String {
    let config_file_path = options.config_path.clone().or_else(detect_config_path);
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields: [(&str, String, &[&str]); 8] = [
        ("llm.base_url", config.llm.base_url.clone(), &["QUOTEFLOW_LLM_BASE_URL"]),
        ("llm.model", config.llm.model.clone(), &["QUOTEFLOW_LLM_MODEL"]),
        ("llm.api_key", redact_secret(config.llm.api_key.as_ref()), &["QUOTEFLOW_LLM_API_KEY"]),
        (
            "record_store.base_url",
            config.record_store.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["QUOTEFLOW_RECORD_STORE_BASE_URL"],
        ),
        (
            "record_store.table_id",
            config.record_store.table_id.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["QUOTEFLOW_RECORD_STORE_TABLE_ID"],
        ),
        (
            "record_store.api_token",
            redact_secret(config.record_store.api_token.as_ref()),
            &["QUOTEFLOW_RECORD_STORE_API_TOKEN"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["QUOTEFLOW_LOGGING_LEVEL", "QUOTEFLOW_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["QUOTEFLOW_LOGGING_FORMAT", "QUOTEFLOW_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in fields {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }
    lines.push(format!(
        "- record archiving: {}",
        if config.record_store.is_complete() { "enabled" } else { "disabled" }
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["quoteflow.toml", "config/quoteflow.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
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

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
