use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, FixedOffset};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::availability::BookingPolicy;
use crate::clock::offset_from_hours;

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["courtside.toml", "config/courtside.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub whatsapp: WhatsappConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub booking: BookingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Twilio WhatsApp credentials. Outbound delivery is disabled until all three are set.
#[derive(Clone, Debug)]
pub struct WhatsappConfig {
    pub account_sid: Option<SecretString>,
    pub auth_token: Option<SecretString>,
    pub from_number: Option<String>,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    pub session_timeout_minutes: i64,
    pub retention_hours: i64,
    pub context_entries: usize,
    pub max_duration_hours: u32,
    pub default_country_code: String,
    pub utc_offset_hours: i32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Groq,
    OpenAi,
    Ollama,
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_enabled: Option<bool>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub server_port: Option<u16>,
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
            database: DatabaseConfig {
                url: "sqlite://courtside.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            whatsapp: WhatsappConfig {
                account_sid: None,
                auth_token: None,
                from_number: None,
                api_base_url: "https://api.twilio.com".to_string(),
            },
            llm: LlmConfig {
                enabled: true,
                provider: LlmProvider::Groq,
                api_key: None,
                base_url: None,
                model: "llama-3.1-8b-instant".to_string(),
                timeout_secs: 10,
                max_tokens: 500,
                temperature: 0.7,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            booking: BookingConfig {
                session_timeout_minutes: 30,
                retention_hours: 24,
                context_entries: 10,
                max_duration_hours: 6,
                default_country_code: "55".to_string(),
                utc_offset_hours: -3,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected groq|openai|ollama)"
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

impl WhatsappConfig {
    pub fn is_configured(&self) -> bool {
        let filled = |value: &Option<SecretString>| {
            value.as_ref().is_some_and(|secret| !secret.expose_secret().trim().is_empty())
        };
        filled(&self.account_sid)
            && filled(&self.auth_token)
            && self.from_number.as_deref().is_some_and(|number| !number.trim().is_empty())
    }
}

impl LlmConfig {
    /// Chat-completions base URL for the selected provider.
    pub fn effective_base_url(&self) -> String {
        if let Some(base_url) = self.base_url.as_deref().filter(|url| !url.trim().is_empty()) {
            return base_url.trim_end_matches('/').to_string();
        }
        match self.provider {
            LlmProvider::Groq => "https://api.groq.com/openai/v1".to_string(),
            LlmProvider::OpenAi => "https://api.openai.com/v1".to_string(),
            LlmProvider::Ollama => "http://localhost:11434/v1".to_string(),
        }
    }

    /// Hosted providers need a key; a local ollama does not.
    pub fn is_usable(&self) -> bool {
        if !self.enabled {
            return false;
        }
        match self.provider {
            LlmProvider::Ollama => true,
            LlmProvider::Groq | LlmProvider::OpenAi => self
                .api_key
                .as_ref()
                .is_some_and(|key| !key.expose_secret().trim().is_empty()),
        }
    }
}

impl BookingConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::minutes(self.session_timeout_minutes)
    }

    pub fn retention(&self) -> Duration {
        Duration::hours(self.retention_hours)
    }

    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        offset_from_hours(self.utc_offset_hours).ok_or_else(|| {
            ConfigError::Validation("booking.utc_offset_hours must be in range -12..=14".to_string())
        })
    }

    pub fn policy(&self) -> Result<BookingPolicy, ConfigError> {
        Ok(BookingPolicy::new(self.max_duration_hours, self.offset()?))
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
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
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
        }

        if let Some(whatsapp) = patch.whatsapp {
            if let Some(account_sid) = whatsapp.account_sid {
                self.whatsapp.account_sid = Some(secret_value(account_sid));
            }
            if let Some(auth_token) = whatsapp.auth_token {
                self.whatsapp.auth_token = Some(secret_value(auth_token));
            }
            if let Some(from_number) = whatsapp.from_number {
                self.whatsapp.from_number = Some(from_number);
            }
            if let Some(api_base_url) = whatsapp.api_base_url {
                self.whatsapp.api_base_url = api_base_url;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(enabled) = llm.enabled {
                self.llm.enabled = enabled;
            }
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
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

        if let Some(booking) = patch.booking {
            if let Some(minutes) = booking.session_timeout_minutes {
                self.booking.session_timeout_minutes = minutes;
            }
            if let Some(hours) = booking.retention_hours {
                self.booking.retention_hours = hours;
            }
            if let Some(entries) = booking.context_entries {
                self.booking.context_entries = entries;
            }
            if let Some(hours) = booking.max_duration_hours {
                self.booking.max_duration_hours = hours;
            }
            if let Some(code) = booking.default_country_code {
                self.booking.default_country_code = code;
            }
            if let Some(offset) = booking.utc_offset_hours {
                self.booking.utc_offset_hours = offset;
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
        if let Some(value) = read_env("COURTSIDE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("COURTSIDE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_value("COURTSIDE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("COURTSIDE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_value("COURTSIDE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COURTSIDE_WHATSAPP_ACCOUNT_SID") {
            self.whatsapp.account_sid = Some(secret_value(value));
        }
        if let Some(value) = read_env("COURTSIDE_WHATSAPP_AUTH_TOKEN") {
            self.whatsapp.auth_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("COURTSIDE_WHATSAPP_FROM_NUMBER") {
            self.whatsapp.from_number = Some(value);
        }
        if let Some(value) = read_env("COURTSIDE_WHATSAPP_API_BASE_URL") {
            self.whatsapp.api_base_url = value;
        }

        if let Some(value) = read_env("COURTSIDE_LLM_ENABLED") {
            self.llm.enabled = parse_value("COURTSIDE_LLM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("COURTSIDE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let api_key = read_env("COURTSIDE_LLM_API_KEY").or_else(|| read_env("GROQ_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("COURTSIDE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("COURTSIDE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("COURTSIDE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_value("COURTSIDE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("COURTSIDE_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_value("COURTSIDE_LLM_MAX_TOKENS", &value)?;
        }

        if let Some(value) = read_env("COURTSIDE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("COURTSIDE_SERVER_PORT") {
            self.server.port = parse_value("COURTSIDE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("COURTSIDE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_value("COURTSIDE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("COURTSIDE_BOOKING_SESSION_TIMEOUT_MINUTES") {
            self.booking.session_timeout_minutes =
                parse_value("COURTSIDE_BOOKING_SESSION_TIMEOUT_MINUTES", &value)?;
        }
        if let Some(value) = read_env("COURTSIDE_BOOKING_RETENTION_HOURS") {
            self.booking.retention_hours =
                parse_value("COURTSIDE_BOOKING_RETENTION_HOURS", &value)?;
        }
        if let Some(value) = read_env("COURTSIDE_BOOKING_CONTEXT_ENTRIES") {
            self.booking.context_entries =
                parse_value("COURTSIDE_BOOKING_CONTEXT_ENTRIES", &value)?;
        }
        if let Some(value) = read_env("COURTSIDE_BOOKING_MAX_DURATION_HOURS") {
            self.booking.max_duration_hours =
                parse_value("COURTSIDE_BOOKING_MAX_DURATION_HOURS", &value)?;
        }
        if let Some(value) = read_env("COURTSIDE_BOOKING_DEFAULT_COUNTRY_CODE") {
            self.booking.default_country_code = value;
        }
        if let Some(value) = read_env("COURTSIDE_BOOKING_UTC_OFFSET_HOURS") {
            self.booking.utc_offset_hours =
                parse_value("COURTSIDE_BOOKING_UTC_OFFSET_HOURS", &value)?;
        }

        let log_level =
            read_env("COURTSIDE_LOGGING_LEVEL").or_else(|| read_env("COURTSIDE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("COURTSIDE_LOGGING_FORMAT").or_else(|| read_env("COURTSIDE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_whatsapp(&self.whatsapp)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_booking(&self.booking)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The config file `load` would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
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

fn validate_whatsapp(whatsapp: &WhatsappConfig) -> Result<(), ConfigError> {
    let any_set = whatsapp.account_sid.is_some()
        || whatsapp.auth_token.is_some()
        || whatsapp.from_number.is_some();
    if !any_set {
        return Ok(());
    }
    if !whatsapp.is_configured() {
        return Err(ConfigError::Validation(
            "whatsapp.account_sid, whatsapp.auth_token and whatsapp.from_number must be set together. Find them in the Twilio console > Messaging > Try it out > Send a WhatsApp message"
                .to_string(),
        ));
    }

    let account_sid =
        whatsapp.account_sid.as_ref().map(|sid| sid.expose_secret().trim()).unwrap_or_default();
    if !account_sid.starts_with("AC") {
        return Err(ConfigError::Validation(
            "whatsapp.account_sid must start with `AC` (hint: the auth token is a separate value)"
                .to_string(),
        ));
    }

    let from_number = whatsapp.from_number.as_deref().map(str::trim).unwrap_or_default();
    if !from_number.starts_with("whatsapp:+") && !from_number.starts_with('+') {
        return Err(ConfigError::Validation(
            "whatsapp.from_number must look like `whatsapp:+14155238886` or `+14155238886`"
                .to_string(),
        ));
    }

    if !whatsapp.api_base_url.starts_with("http://")
        && !whatsapp.api_base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "whatsapp.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation("llm.max_tokens must be greater than zero".to_string()));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation("llm.temperature must be in range 0.0..=2.0".to_string()));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
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

fn validate_booking(booking: &BookingConfig) -> Result<(), ConfigError> {
    if booking.session_timeout_minutes <= 0 {
        return Err(ConfigError::Validation(
            "booking.session_timeout_minutes must be greater than zero".to_string(),
        ));
    }

    if booking.retention_hours <= 0 {
        return Err(ConfigError::Validation(
            "booking.retention_hours must be greater than zero".to_string(),
        ));
    }

    if booking.context_entries == 0 {
        return Err(ConfigError::Validation(
            "booking.context_entries must be greater than zero".to_string(),
        ));
    }

    if booking.max_duration_hours == 0 || booking.max_duration_hours > 24 {
        return Err(ConfigError::Validation(
            "booking.max_duration_hours must be in range 1..=24".to_string(),
        ));
    }

    let code = booking.default_country_code.trim();
    if code.is_empty() || code.len() > 3 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::Validation(
            "booking.default_country_code must be 1 to 3 digits without `+` (e.g. `55`)"
                .to_string(),
        ));
    }

    if !(-12..=14).contains(&booking.utc_offset_hours) {
        return Err(ConfigError::Validation(
            "booking.utc_offset_hours must be in range -12..=14".to_string(),
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

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    whatsapp: Option<WhatsappPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    booking: Option<BookingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WhatsappPatch {
    account_sid: Option<String>,
    auth_token: Option<String>,
    from_number: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    enabled: Option<bool>,
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BookingPatch {
    session_timeout_minutes: Option<i64>,
    retention_hours: Option<i64>,
    context_entries: Option<usize>,
    max_duration_hours: Option<u32>,
    default_country_code: Option<String>,
    utc_offset_hours: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_without_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.booking.session_timeout_minutes == 30, "session timeout defaults to 30")?;
        ensure(config.booking.retention_hours == 24, "retention defaults to 24h")?;
        ensure(config.booking.max_duration_hours == 6, "duration cap defaults to 6h")?;
        ensure(config.booking.default_country_code == "55", "country code defaults to 55")?;
        ensure(matches!(config.llm.provider, LlmProvider::Groq), "groq is the default provider")?;
        ensure(!config.llm.is_usable(), "llm without api key is not usable")?;
        ensure(!config.whatsapp.is_configured(), "whatsapp starts unconfigured")?;
        ensure(
            config.booking.offset().ok().map(|offset| offset.local_minus_utc()) == Some(-3 * 3600),
            "offset defaults to -03:00",
        )?;
        Ok(())
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_TWILIO_SID", "AC0123456789");
        env::set_var("TEST_TWILIO_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("courtside.toml");
            fs::write(
                &path,
                r#"
[whatsapp]
account_sid = "${TEST_TWILIO_SID}"
auth_token = "${TEST_TWILIO_TOKEN}"
from_number = "whatsapp:+14155238886"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.whatsapp.is_configured(), "whatsapp should be fully configured")?;
            ensure(
                config.whatsapp.auth_token.as_ref().map(|token| token.expose_secret())
                    == Some("token-from-env"),
                "auth token should be loaded from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_TWILIO_SID", "TEST_TWILIO_TOKEN"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COURTSIDE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("COURTSIDE_BOOKING_SESSION_TIMEOUT_MINUTES", "45");
        env::set_var("COURTSIDE_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("courtside.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[booking]
session_timeout_minutes = 20
retention_hours = 12

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "log format alias should be read from env",
            )?;
            ensure(
                config.booking.session_timeout_minutes == 45,
                "env session timeout should win over file",
            )?;
            ensure(config.booking.retention_hours == 12, "file retention should win over default")?;
            Ok(())
        })();

        clear_vars(&[
            "COURTSIDE_DATABASE_URL",
            "COURTSIDE_BOOKING_SESSION_TIMEOUT_MINUTES",
            "COURTSIDE_LOG_FORMAT",
        ]);
        result
    }

    #[test]
    fn partial_twilio_credentials_fail_fast() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COURTSIDE_WHATSAPP_ACCOUNT_SID", "AC0123456789");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("whatsapp.auth_token")
            );
            ensure(has_message, "validation failure should mention the missing twilio fields")
        })();

        clear_vars(&["COURTSIDE_WHATSAPP_ACCOUNT_SID"]);
        result
    }

    #[test]
    fn invalid_numeric_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COURTSIDE_BOOKING_MAX_DURATION_HOURS", "six");

        let result = (|| -> Result<(), String> {
            let is_invalid = matches!(
                AppConfig::load(LoadOptions::default()),
                Err(ConfigError::InvalidEnvOverride { ref key, .. })
                    if key == "COURTSIDE_BOOKING_MAX_DURATION_HOURS"
            );
            ensure(is_invalid, "non-numeric duration cap should be rejected")
        })();

        clear_vars(&["COURTSIDE_BOOKING_MAX_DURATION_HOURS"]);
        result
    }

    #[test]
    fn groq_key_alias_enables_llm_and_stays_redacted() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("GROQ_API_KEY", "gsk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(config.llm.is_usable(), "api key alias should make the llm usable")?;
            ensure(
                config.llm.effective_base_url() == "https://api.groq.com/openai/v1",
                "groq base url should be derived",
            )?;
            ensure(!debug.contains("gsk-secret-value"), "debug output should not contain api key")?;
            Ok(())
        })();

        clear_vars(&["GROQ_API_KEY"]);
        result
    }
}
