use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use courtside_core::config::LlmConfig;

/// Structured next step the model may propose alongside its reply text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuggestedAction {
    RequestQuote,
    CommitReservation,
    CancelReservation,
}

impl SuggestedAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "request_quote" => Some(Self::RequestQuote),
            "commit_reservation" | "confirm_reservation" => Some(Self::CommitReservation),
            "cancel_reservation" => Some(Self::CancelReservation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestQuote => "request_quote",
            Self::CommitReservation => "commit_reservation",
            Self::CancelReservation => "cancel_reservation",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlmPrompt {
    pub system: String,
    pub user: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlmReply {
    pub text: String,
    pub suggested_action: Option<SuggestedAction>,
}

impl LlmReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), suggested_action: None }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &LlmPrompt) -> Result<LlmReply>;
}

/// Stands in when no provider is usable; every call fails so the caller
/// degrades to its canned reply.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledLlmClient;

#[async_trait]
impl LlmClient for DisabledLlmClient {
    async fn complete(&self, _prompt: &LlmPrompt) -> Result<LlmReply> {
        Err(anyhow!("llm fallback is disabled"))
    }
}

/// Answers every prompt with the same reply after an optional delay.
#[derive(Clone, Debug)]
pub struct StaticLlmClient {
    reply: LlmReply,
    delay: Duration,
}

impl StaticLlmClient {
    pub fn new(reply: LlmReply) -> Self {
        Self { reply, delay: Duration::ZERO }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl LlmClient for StaticLlmClient {
    async fn complete(&self, _prompt: &LlmPrompt) -> Result<LlmReply> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.reply.clone())
    }
}

/// Chat-completions client for Groq, OpenAI and ollama's compatible endpoint.
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl std::fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("failed to build llm http client")?;

        Ok(Self {
            client,
            base_url: config.effective_base_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StructuredContent {
    reply: String,
    #[serde(default)]
    suggested_action: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, prompt: &LlmPrompt) -> Result<LlmReply> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": { "type": "json_object" },
        });

        let mut request = self.client.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.context("llm request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("llm provider answered {status}: {detail}"));
        }

        let completion =
            response.json::<ChatCompletion>().await.context("llm response was not valid json")?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("llm response had no content"))?;

        Ok(parse_content(&content))
    }
}

/// Reads the `{reply, suggested_action}` object the system prompt asks for.
/// Plain text is accepted as a reply without an action.
pub fn parse_content(content: &str) -> LlmReply {
    match serde_json::from_str::<StructuredContent>(content.trim()) {
        Ok(structured) => LlmReply {
            text: structured.reply.trim().to_string(),
            suggested_action: structured.suggested_action.as_deref().and_then(SuggestedAction::parse),
        },
        Err(_) => LlmReply::text(content.trim()),
    }
}

/// Picks the client for the configured provider, or the disabled one.
pub fn build_llm_client(config: &LlmConfig) -> Arc<dyn LlmClient> {
    if !config.is_usable() {
        tracing::info!(
            event_name = "llm.disabled",
            enabled = config.enabled,
            provider = ?config.provider,
            "llm fallback disabled; unknown messages get a canned reply"
        );
        return Arc::new(DisabledLlmClient);
    }

    match OpenAiCompatibleClient::from_config(config) {
        Ok(client) => {
            tracing::info!(
                event_name = "llm.configured",
                provider = ?config.provider,
                model = %config.model,
                "llm fallback client ready"
            );
            Arc::new(client)
        }
        Err(error) => {
            tracing::warn!(
                event_name = "llm.client_failed",
                error = %error,
                "could not build llm client; falling back to canned replies"
            );
            Arc::new(DisabledLlmClient)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use secrecy::SecretString;
    use tokio::sync::Mutex;

    use courtside_core::config::{LlmConfig, LlmProvider};

    use super::{
        parse_content, LlmClient, LlmPrompt, OpenAiCompatibleClient, SuggestedAction,
    };

    type Captured = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    fn config(base_url: String) -> LlmConfig {
        LlmConfig {
            enabled: true,
            provider: LlmProvider::Groq,
            api_key: Some(SecretString::from("gsk-test".to_string())),
            base_url: Some(base_url),
            model: "llama-3.1-8b-instant".to_string(),
            timeout_secs: 5,
            max_tokens: 300,
            temperature: 0.3,
        }
    }

    async fn fake_provider(content: &'static str) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/chat/completions",
                post(
                    move |State(captured): State<Captured>,
                          headers: HeaderMap,
                          Json(body): Json<serde_json::Value>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|value| value.to_str().ok())
                            .map(str::to_string);
                        captured.lock().await.push((auth, body));
                        Json(serde_json::json!({
                            "choices": [{ "message": { "role": "assistant", "content": content } }]
                        }))
                    },
                ),
            )
            .with_state(Arc::clone(&captured));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{address}"), captured)
    }

    #[test]
    fn structured_content_carries_suggested_action() {
        let reply = parse_content(r#"{"reply":"Posso cotar para você.","suggested_action":"request_quote"}"#);
        assert_eq!(reply.text, "Posso cotar para você.");
        assert_eq!(reply.suggested_action, Some(SuggestedAction::RequestQuote));

        let reply = parse_content(r#"{"reply":"Ok","suggested_action":"fly_to_the_moon"}"#);
        assert_eq!(reply.suggested_action, None);
    }

    #[test]
    fn plain_text_content_is_a_reply_without_action() {
        let reply = parse_content("  Funcionamos das 8h às 22h.  ");
        assert_eq!(reply.text, "Funcionamos das 8h às 22h.");
        assert_eq!(reply.suggested_action, None);
    }

    #[test]
    fn disabled_or_keyless_config_is_not_usable() {
        let mut keyless = config("http://localhost".to_string());
        keyless.api_key = None;
        assert!(!keyless.is_usable());

        let mut local = keyless.clone();
        local.provider = LlmProvider::Ollama;
        assert!(local.is_usable());
    }

    #[tokio::test]
    async fn client_posts_chat_completion_with_json_response_format() {
        let (base_url, captured) =
            fake_provider(r#"{"reply":"Temos quadras de futsal.","suggested_action":null}"#).await;
        let client = OpenAiCompatibleClient::from_config(&config(base_url)).expect("client");

        let reply = client
            .complete(&LlmPrompt { system: "sistema".to_string(), user: "tem futsal?".to_string() })
            .await
            .expect("reply");
        assert_eq!(reply.text, "Temos quadras de futsal.");
        assert_eq!(reply.suggested_action, None);

        let calls = captured.lock().await.clone();
        assert_eq!(calls.len(), 1);
        let (auth, body) = &calls[0];
        assert_eq!(auth.as_deref(), Some("Bearer gsk-test"));
        assert_eq!(body["model"], "llama-3.1-8b-instant");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][1]["content"], "tem futsal?");
    }
}
