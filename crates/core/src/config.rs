use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::{CaptureSettings, MAX_CARD_DIGITS};
use crate::descriptor::{AgentDescriptor, CallbackBase, GenerationParams, DEFAULT_VOICE};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub capture: CaptureSettings,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub public_base_url: String,
    pub voice: String,
    pub params: GenerationParams,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
    pub run_migrations: bool,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub public_base_url: Option<String>,
    pub database_url: Option<String>,
    pub run_migrations: Option<bool>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub capture_ttl_secs: Option<u64>,
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
            agent: AgentConfig {
                public_base_url: String::new(),
                voice: DEFAULT_VOICE.to_string(),
                params: GenerationParams::default(),
            },
            capture: CaptureSettings::default(),
            database: DatabaseConfig {
                url: "sqlite://customer.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
                run_migrations: false,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 5000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("voicepay.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Validated callback base. Only fails on a config that skipped `validate`.
    pub fn callback_base(&self) -> Result<CallbackBase, ConfigError> {
        CallbackBase::parse(&self.agent.public_base_url).map_err(|error| {
            ConfigError::Validation(format!(
                "agent.public_base_url {error}; set VOICEPAY_AGENT_PUBLIC_BASE_URL (or NGROK_URL) to this service's public address"
            ))
        })
    }

    pub fn agent_descriptor(&self) -> Result<AgentDescriptor, ConfigError> {
        Ok(AgentDescriptor::new(
            self.callback_base()?,
            self.agent.voice.clone(),
            self.agent.params.clone(),
        ))
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(agent) = patch.agent {
            if let Some(public_base_url) = agent.public_base_url {
                self.agent.public_base_url = public_base_url;
            }
            if let Some(voice) = agent.voice {
                self.agent.voice = voice;
            }
            if let Some(temperature) = agent.temperature {
                self.agent.params.temperature = temperature;
            }
            if let Some(top_p) = agent.top_p {
                self.agent.params.top_p = top_p;
            }
            if let Some(confidence) = agent.confidence {
                self.agent.params.confidence = confidence;
            }
            if let Some(barge_confidence) = agent.barge_confidence {
                self.agent.params.barge_confidence = barge_confidence;
            }
        }

        if let Some(capture) = patch.capture {
            if let Some(max_digits) = capture.max_digits {
                self.capture.max_digits = max_digits;
            }
            if let Some(initial_timeout_secs) = capture.initial_timeout_secs {
                self.capture.initial_timeout_secs = initial_timeout_secs;
            }
            if let Some(ttl_secs) = capture.ttl_secs {
                self.capture.ttl_secs = ttl_secs;
            }
        }

        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
            if let Some(run_migrations) = database.run_migrations {
                self.database.run_migrations = run_migrations;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
        let public_base_url =
            read_env("VOICEPAY_AGENT_PUBLIC_BASE_URL").or_else(|| read_env("NGROK_URL"));
        if let Some(value) = public_base_url {
            self.agent.public_base_url = value;
        }
        if let Some(value) = read_env("VOICEPAY_AGENT_VOICE") {
            self.agent.voice = value;
        }
        if let Some(value) = read_env("VOICEPAY_AGENT_TEMPERATURE") {
            self.agent.params.temperature = parse_f64("VOICEPAY_AGENT_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("VOICEPAY_AGENT_TOP_P") {
            self.agent.params.top_p = parse_f64("VOICEPAY_AGENT_TOP_P", &value)?;
        }
        if let Some(value) = read_env("VOICEPAY_AGENT_CONFIDENCE") {
            self.agent.params.confidence = parse_f64("VOICEPAY_AGENT_CONFIDENCE", &value)?;
        }
        if let Some(value) = read_env("VOICEPAY_AGENT_BARGE_CONFIDENCE") {
            self.agent.params.barge_confidence =
                parse_f64("VOICEPAY_AGENT_BARGE_CONFIDENCE", &value)?;
        }

        if let Some(value) = read_env("VOICEPAY_CAPTURE_MAX_DIGITS") {
            self.capture.max_digits = parse_u8("VOICEPAY_CAPTURE_MAX_DIGITS", &value)?;
        }
        if let Some(value) = read_env("VOICEPAY_CAPTURE_INITIAL_TIMEOUT_SECS") {
            self.capture.initial_timeout_secs =
                parse_u32("VOICEPAY_CAPTURE_INITIAL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("VOICEPAY_CAPTURE_TTL_SECS") {
            self.capture.ttl_secs = parse_u64("VOICEPAY_CAPTURE_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("VOICEPAY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("VOICEPAY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("VOICEPAY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("VOICEPAY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("VOICEPAY_DATABASE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("VOICEPAY_DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations =
                parse_bool("VOICEPAY_DATABASE_RUN_MIGRATIONS", &value)?;
        }

        if let Some(value) = read_env("VOICEPAY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("VOICEPAY_SERVER_PORT") {
            self.server.port = parse_u16("VOICEPAY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("VOICEPAY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("VOICEPAY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("VOICEPAY_LOGGING_LEVEL").or_else(|| read_env("VOICEPAY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("VOICEPAY_LOGGING_FORMAT").or_else(|| read_env("VOICEPAY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(public_base_url) = overrides.public_base_url {
            self.agent.public_base_url = public_base_url;
        }
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(run_migrations) = overrides.run_migrations {
            self.database.run_migrations = run_migrations;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(ttl_secs) = overrides.capture_ttl_secs {
            self.capture.ttl_secs = ttl_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_agent(self)?;
        validate_capture(&self.capture)?;
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("voicepay.toml"), PathBuf::from("config/voicepay.toml")]
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

fn validate_agent(config: &AppConfig) -> Result<(), ConfigError> {
    config.callback_base()?;

    if config.agent.voice.trim().is_empty() {
        return Err(ConfigError::Validation("agent.voice must not be empty".to_string()));
    }

    let params = &config.agent.params;
    let tunables = [
        ("agent.temperature", params.temperature),
        ("agent.top_p", params.top_p),
        ("agent.confidence", params.confidence),
        ("agent.barge_confidence", params.barge_confidence),
    ];
    for (key, value) in tunables {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Validation(format!("{key} must be in range 0.0..=1.0")));
        }
    }

    Ok(())
}

fn validate_capture(capture: &CaptureSettings) -> Result<(), ConfigError> {
    if capture.max_digits == 0 || capture.max_digits > MAX_CARD_DIGITS {
        return Err(ConfigError::Validation(format!(
            "capture.max_digits must be in range 1..={MAX_CARD_DIGITS}"
        )));
    }

    if capture.initial_timeout_secs == 0 || capture.initial_timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "capture.initial_timeout_secs must be in range 1..=60".to_string(),
        ));
    }

    if capture.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "capture.ttl_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
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

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse::<u8>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
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

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    agent: Option<AgentPatch>,
    capture: Option<CapturePatch>,
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    public_base_url: Option<String>,
    voice: Option<String>,
    temperature: Option<f64>,
    top_p: Option<f64>,
    confidence: Option<f64>,
    barge_confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CapturePatch {
    max_digits: Option<u8>,
    initial_timeout_secs: Option<u32>,
    ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
    run_migrations: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
