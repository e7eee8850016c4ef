use std::sync::Arc;
use std::time::Duration;

use crate::llm::{LlmClient, LlmPrompt, LlmReply};

const SYSTEM_PROMPT: &str = "Você é um assistente de reservas de quadras esportivas via WhatsApp.

Responda em português brasileiro, de forma amigável, concisa e com poucos emojis.
Nunca invente preços, horários livres ou reservas: use apenas o contexto recebido.
Você não confirma nem cancela reservas; oriente o usuário a responder 'confirmo' ou 'cancelar'.

Responda SEMPRE com um objeto JSON:
{\"reply\": \"texto para o usuário\", \"suggested_action\": null | \"request_quote\"}
Use \"request_quote\" apenas quando a mensagem pedir uma reserva com data e horário.";

/// Everything the model gets to see about the current turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FallbackContext {
    pub message: String,
    pub catalog: Vec<String>,
    pub reservations: Vec<String>,
    pub recent_turns: Vec<String>,
    pub pending_quote: Option<String>,
}

impl FallbackContext {
    pub fn to_prompt(&self) -> LlmPrompt {
        let section = |lines: &[String], empty: &str| {
            if lines.is_empty() {
                empty.to_string()
            } else {
                lines.join("\n")
            }
        };

        let mut user = format!(
            "QUADRAS:\n{}\n\nRESERVAS DO USUÁRIO:\n{}\n\nCONVERSA RECENTE:\n{}\n",
            section(&self.catalog, "Nenhuma quadra cadastrada"),
            section(&self.reservations, "Nenhuma reserva encontrada"),
            section(&self.recent_turns, "(início da conversa)"),
        );
        if let Some(quote) = &self.pending_quote {
            user.push_str(&format!("\nORÇAMENTO PENDENTE:\n{quote}\n"));
        }
        user.push_str(&format!("\nMENSAGEM DO USUÁRIO: \"{}\"", self.message));

        LlmPrompt { system: SYSTEM_PROMPT.to_string(), user }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FallbackOutcome {
    Answered(LlmReply),
    Degraded { reason: String },
}

/// Calls the model with a hard deadline. Errors and timeouts degrade instead
/// of failing the turn.
pub struct BoundedFallback {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl BoundedFallback {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn answer(&self, context: &FallbackContext, correlation_id: &str) -> FallbackOutcome {
        let prompt = context.to_prompt();
        match tokio::time::timeout(self.timeout, self.client.complete(&prompt)).await {
            Ok(Ok(reply)) if !reply.text.trim().is_empty() => {
                tracing::debug!(
                    event_name = "llm.answered",
                    correlation_id,
                    suggested_action = reply.suggested_action.map(|action| action.as_str()),
                    "llm fallback answered"
                );
                FallbackOutcome::Answered(reply)
            }
            Ok(Ok(_)) => degraded(correlation_id, "empty reply".to_string()),
            Ok(Err(error)) => degraded(correlation_id, error.to_string()),
            Err(_) => {
                degraded(correlation_id, format!("timed out after {}ms", self.timeout.as_millis()))
            }
        }
    }
}

fn degraded(correlation_id: &str, reason: String) -> FallbackOutcome {
    tracing::warn!(
        event_name = "llm.degraded",
        correlation_id,
        reason = %reason,
        "llm fallback unavailable; using canned reply"
    );
    FallbackOutcome::Degraded { reason }
}
