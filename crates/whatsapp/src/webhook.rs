use serde::Deserialize;
use uuid::Uuid;

/// Body returned to Twilio after every webhook call; replies go out through the REST API.
pub const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

/// Fields of Twilio's `application/x-www-form-urlencoded` message webhook that we use.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct InboundForm {
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "MessageSid", default)]
    pub message_sid: Option<String>,
    #[serde(rename = "ProfileName", default)]
    pub profile_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Raw sender id as delivered, e.g. `whatsapp:+5551999990000`.
    pub sender: String,
    pub text: String,
    pub message_sid: Option<String>,
    pub profile_name: Option<String>,
    /// Message sid when Twilio sent one, otherwise unique to this delivery.
    pub correlation_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundDisposition {
    Accepted(InboundMessage),
    Ignored { reason: &'static str },
}

impl InboundForm {
    /// Posts without a sender or with a blank body are acknowledged and dropped.
    pub fn into_disposition(self) -> InboundDisposition {
        let sender = self.from.trim().to_string();
        if sender.is_empty() {
            return InboundDisposition::Ignored { reason: "missing sender" };
        }

        let text = self.body.trim().to_string();
        if text.is_empty() {
            return InboundDisposition::Ignored { reason: "empty body" };
        }

        let message_sid = self.message_sid.filter(|sid| !sid.trim().is_empty());
        let correlation_id =
            message_sid.clone().unwrap_or_else(|| format!("wa-{}-{}", sender, Uuid::new_v4()));

        InboundDisposition::Accepted(InboundMessage {
            sender,
            text,
            message_sid,
            profile_name: self.profile_name.filter(|name| !name.trim().is_empty()),
            correlation_id,
        })
    }
}
