use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;
use voicepay_core::config::{AppConfig, LoadOptions};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key: &str, env_keys: &[&str]| {
        field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let params = &config.agent.params;
    let entries = vec![
        entry(
            "agent.public_base_url",
            config.agent.public_base_url.clone(),
            &["VOICEPAY_AGENT_PUBLIC_BASE_URL", "NGROK_URL"],
        ),
        entry("agent.voice", config.agent.voice.clone(), &["VOICEPAY_AGENT_VOICE"]),
        entry("agent.temperature", params.temperature.to_string(), &["VOICEPAY_AGENT_TEMPERATURE"]),
        entry("agent.top_p", params.top_p.to_string(), &["VOICEPAY_AGENT_TOP_P"]),
        entry("agent.confidence", params.confidence.to_string(), &["VOICEPAY_AGENT_CONFIDENCE"]),
        entry(
            "agent.barge_confidence",
            params.barge_confidence.to_string(),
            &["VOICEPAY_AGENT_BARGE_CONFIDENCE"],
        ),
        entry(
            "capture.max_digits",
            config.capture.max_digits.to_string(),
            &["VOICEPAY_CAPTURE_MAX_DIGITS"],
        ),
        entry(
            "capture.initial_timeout_secs",
            config.capture.initial_timeout_secs.to_string(),
            &["VOICEPAY_CAPTURE_INITIAL_TIMEOUT_SECS"],
        ),
        entry(
            "capture.ttl_secs",
            config.capture.ttl_secs.to_string(),
            &["VOICEPAY_CAPTURE_TTL_SECS"],
        ),
        entry("database.url", config.database.url.clone(), &["VOICEPAY_DATABASE_URL"]),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["VOICEPAY_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["VOICEPAY_DATABASE_TIMEOUT_SECS"],
        ),
        entry(
            "database.run_migrations",
            config.database.run_migrations.to_string(),
            &["VOICEPAY_DATABASE_RUN_MIGRATIONS"],
        ),
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["VOICEPAY_SERVER_BIND_ADDRESS"],
        ),
        entry("server.port", config.server.port.to_string(), &["VOICEPAY_SERVER_PORT"]),
        entry(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["VOICEPAY_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["VOICEPAY_LOGGING_LEVEL", "VOICEPAY_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["VOICEPAY_LOGGING_FORMAT", "VOICEPAY_LOG_FORMAT"],
        ),
    ];

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for item in entries {
        lines.push(render_line(item.key, &item.value, source(item.key, item.env_keys)));
    }
    lines.join("\n")
}

struct ConfigEntry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn entry(key: &'static str, value: String, env_keys: &'static [&'static str]) -> ConfigEntry {
    ConfigEntry { key, value, env_keys }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("voicepay.toml"), PathBuf::from("config/voicepay.toml")]
        .into_iter()
        .find(|path| path.exists())
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
    let from_env = env_keys.iter().find(|key| {
        env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false)
    });
    if let Some(env_key) = from_env {
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

#[cfg(test)]
mod tests {
    use super::{contains_path, field_source};

    #[test]
    fn nested_keys_are_found_in_file_documents() {
        let doc: toml::Value =
            "[agent]\npublic_base_url = \"https://a.example\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "agent.public_base_url"));
        assert!(!contains_path(&doc, "agent.voice"));
        assert_eq!(
            field_source("agent.public_base_url", &[], Some(&doc), None),
            "file (config file)"
        );
        assert_eq!(field_source("server.port", &[], Some(&doc), None), "default");
    }
}
