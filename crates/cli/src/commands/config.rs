use std::env;
use std::fs;
use std::path::Path;

use courtside_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value) in effective_values(&config) {
        let source = field_source(
            key_path,
            &env_key(key_path),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("whatsapp.account_sid", redact_secret(config.whatsapp.account_sid.as_ref())),
        ("whatsapp.auth_token", redact_secret(config.whatsapp.auth_token.as_ref())),
        (
            "whatsapp.from_number",
            config.whatsapp.from_number.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        ("whatsapp.api_base_url", config.whatsapp.api_base_url.clone()),
        ("llm.enabled", config.llm.enabled.to_string()),
        ("llm.provider", format!("{:?}", config.llm.provider)),
        ("llm.model", config.llm.model.clone()),
        ("llm.base_url", config.llm.effective_base_url()),
        ("llm.api_key", redact_secret(config.llm.api_key.as_ref())),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string()),
        ("llm.max_tokens", config.llm.max_tokens.to_string()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("booking.session_timeout_minutes", config.booking.session_timeout_minutes.to_string()),
        ("booking.retention_hours", config.booking.retention_hours.to_string()),
        ("booking.context_entries", config.booking.context_entries.to_string()),
        ("booking.max_duration_hours", config.booking.max_duration_hours.to_string()),
        ("booking.default_country_code", config.booking.default_country_code.clone()),
        ("booking.utc_offset_hours", config.booking.utc_offset_hours.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ]
}

/// `llm.api_key` -> `COURTSIDE_LLM_API_KEY`
fn env_key(key_path: &str) -> String {
    format!("COURTSIDE_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
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

    // Twilio SIDs and Groq keys carry a short public prefix worth showing.
    match trimmed.get(..4) {
        Some(prefix) if trimmed.len() > 12 => format!("{prefix}***"),
        _ => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use toml::Value;

    use super::{contains_path, env_key, redact_secret};

    #[test]
    fn env_keys_follow_section_and_field() {
        assert_eq!(env_key("llm.api_key"), "COURTSIDE_LLM_API_KEY");
        assert_eq!(env_key("booking.utc_offset_hours"), "COURTSIDE_BOOKING_UTC_OFFSET_HOURS");
    }

    #[test]
    fn secrets_never_render_in_full() {
        let sid = SecretString::from("AC0123456789abcdef0123456789abcdef".to_string());
        assert_eq!(redact_secret(Some(&sid)), "AC01***");
        assert_eq!(redact_secret(Some(&SecretString::from("short".to_string()))), "<redacted>");
        assert_eq!(redact_secret(None), "<unset>");
    }

    #[test]
    fn nested_keys_are_found_in_config_file() {
        let doc: Value = "[llm]\nmodel = \"llama\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
    }
}
