use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DISPLAY_NAME: &str = "Usuário";

/// Canonical `+<countrycode><digits>` phone number used as the sender identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhoneNumber(pub String);

impl PhoneNumber {
    /// Normalizes a raw sender id (`whatsapp:+55 (51) 99999-0000`, `5199990000`, ...).
    ///
    /// Non-digit characters are dropped. A number that already carries the
    /// default country code only gains the leading `+`; anything else without
    /// a `+` gets the default country code prepended.
    pub fn normalize(raw: &str, default_country_code: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let without_transport = trimmed.strip_prefix("whatsapp:").unwrap_or(trimmed).trim();
        let explicit_plus = without_transport.starts_with('+');
        let digits = without_transport.chars().filter(char::is_ascii_digit).collect::<String>();

        if digits.is_empty() {
            return None;
        }

        let canonical = if explicit_plus || digits.starts_with(default_country_code) {
            format!("+{digits}")
        } else {
            format!("+{default_country_code}{digits}")
        };

        Some(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub phone: PhoneNumber,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(phone: PhoneNumber, created_at: DateTime<Utc>) -> Self {
        Self { phone, display_name: DEFAULT_DISPLAY_NAME.to_string(), created_at }
    }
}
