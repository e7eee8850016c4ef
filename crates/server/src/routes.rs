use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use courtside_agent::{AgentRuntime, TurnInput};
use courtside_core::domain::court::Court;
use courtside_core::errors::InterfaceError;
use courtside_whatsapp::{InboundDisposition, InboundForm, MessageSender, EMPTY_TWIML};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<AgentRuntime>,
    pub sender: Arc<dyn MessageSender>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(whatsapp_webhook))
        .route("/test-message", post(test_message))
        .route("/courts", get(list_courts))
        .with_state(state)
}

/// HTTP face of [`InterfaceError`]: status code plus the user-safe message.
pub struct ApiError(InterfaceError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    correlation_id: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, correlation_id) = match &self.0 {
            InterfaceError::BadRequest { correlation_id, .. } => {
                (StatusCode::BAD_REQUEST, correlation_id.clone())
            }
            InterfaceError::ServiceUnavailable { correlation_id, .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, correlation_id.clone())
            }
        };
        warn!(
            event_name = "ingress.http.error",
            correlation_id = %correlation_id,
            error = %self.0,
            "request failed"
        );
        (status, Json(ErrorBody { error: self.0.user_message(), correlation_id })).into_response()
    }
}

fn twiml() -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], EMPTY_TWIML).into_response()
}

/// Twilio retries on anything but a 2xx, so every outcome answers with empty TwiML.
async fn whatsapp_webhook(
    State(state): State<AppState>,
    form: Result<Form<InboundForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!(
                event_name = "ingress.whatsapp.malformed",
                error = %rejection,
                "webhook payload could not be decoded"
            );
            return twiml();
        }
    };

    let message = match form.into_disposition() {
        InboundDisposition::Accepted(message) => message,
        InboundDisposition::Ignored { reason } => {
            info!(event_name = "ingress.whatsapp.ignored", reason, "webhook call ignored");
            return twiml();
        }
    };

    let correlation_id = message.correlation_id.clone();
    info!(
        event_name = "ingress.whatsapp.received",
        correlation_id = %correlation_id,
        sender = %message.sender,
        chars = message.text.chars().count(),
        "whatsapp message received"
    );

    let reply = state
        .runtime
        .handle_turn(TurnInput {
            sender: message.sender.clone(),
            text: message.text,
            correlation_id: Some(correlation_id.clone()),
            profile_name: message.profile_name,
        })
        .await;

    let report = state.sender.send(&message.sender, &reply).await;
    if !report.is_delivered() {
        warn!(
            event_name = "egress.whatsapp.undelivered",
            correlation_id = %correlation_id,
            to = %report.to,
            outcome = ?report.outcome,
            "reply could not be delivered"
        );
    }

    twiml()
}

#[derive(Debug, Deserialize)]
pub struct TestMessageRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TestMessageResponse {
    pub phone: String,
    pub message: String,
    pub reply: String,
}

async fn test_message(
    State(state): State<AppState>,
    Json(request): Json<TestMessageRequest>,
) -> Result<Json<TestMessageResponse>, ApiError> {
    if request.phone.trim().is_empty() || request.message.trim().is_empty() {
        return Err(ApiError(InterfaceError::BadRequest {
            message: "phone and message are required".to_string(),
            correlation_id: "test-message".to_string(),
        }));
    }

    let reply = state
        .runtime
        .handle_turn(TurnInput::new(request.phone.clone(), request.message.clone()))
        .await;

    Ok(Json(TestMessageResponse { phone: request.phone, message: request.message, reply }))
}

async fn list_courts(State(state): State<AppState>) -> Result<Json<Vec<Court>>, ApiError> {
    state
        .runtime
        .booking()
        .catalog()
        .await
        .map(Json)
        .map_err(|error| ApiError(error.into_interface("courts")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use chrono::{TimeZone, Utc};
    use courtside_agent::{AgentDeps, AgentRuntime, RuntimeSettings};
    use courtside_core::clock::ManualClock;
    use courtside_core::config::AppConfig;
    use courtside_core::domain::court::Court;
    use courtside_db::demo_courts;
    use courtside_db::repositories::CourtRepository;
    use courtside_whatsapp::{RecordingSender, EMPTY_TWIML};
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use super::{router, AppState, TestMessageResponse};

    async fn app(sender: Arc<RecordingSender>) -> Router {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap());
        let deps = AgentDeps::in_memory(Arc::new(clock));
        for court in demo_courts() {
            deps.courts.save(court).await.expect("save court");
        }
        let settings = RuntimeSettings::from_config(&AppConfig::default()).expect("settings");
        router(AppState { runtime: Arc::new(AgentRuntime::new(deps, settings)), sender })
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    fn form_post(body: &str) -> Request<Body> {
        Request::post("/webhook")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn webhook_replies_through_sender_and_acks_with_twiml() {
        let sender = Arc::new(RecordingSender::default());
        let response = app(sender.clone())
            .await
            .oneshot(form_post("From=whatsapp%3A%2B5551999990000&Body=ajuda&MessageSid=SM1"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/xml");
        assert_eq!(body_text(response).await, EMPTY_TWIML);

        let sent = sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "whatsapp:+5551999990000");
        assert!(sent[0].1.contains("Como usar o sistema"));
    }

    #[tokio::test]
    async fn webhook_ignores_empty_body_and_garbage() {
        let sender = Arc::new(RecordingSender::default());
        let router = app(sender.clone()).await;

        let empty = router
            .clone()
            .oneshot(form_post("From=whatsapp%3A%2B5551999990000&Body=%20%20"))
            .await
            .expect("response");
        assert_eq!(empty.status(), StatusCode::OK);

        let garbage = router
            .oneshot(
                Request::post("/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(garbage.status(), StatusCode::OK);
        assert_eq!(body_text(garbage).await, EMPTY_TWIML);

        assert!(sender.sent().await.is_empty());
    }

    #[tokio::test]
    async fn webhook_still_acks_when_delivery_fails() {
        let sender = Arc::new(RecordingSender::failing("twilio down"));
        let response = app(sender.clone())
            .await
            .oneshot(form_post("From=whatsapp%3A%2B5551999990000&Body=oi"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(sender.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_message_returns_the_reply() {
        let response = app(Arc::new(RecordingSender::default()))
            .await
            .oneshot(
                Request::post("/test-message")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"phone":"+5551999990000","message":"reservar futsal amanhã 19h"}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let payload: TestMessageResponse =
            serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(payload.phone, "+5551999990000");
        assert!(payload.reply.contains("Confirmação de Reserva"), "{}", payload.reply);
        assert!(payload.reply.contains("R$ 100.00"), "{}", payload.reply);
    }

    #[tokio::test]
    async fn test_message_requires_phone_and_message() {
        let response = app(Arc::new(RecordingSender::default()))
            .await
            .oneshot(
                Request::post("/test-message")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"message":"oi"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("Check inputs"));
    }

    #[tokio::test]
    async fn courts_lists_the_catalog() {
        let response = app(Arc::new(RecordingSender::default()))
            .await
            .oneshot(Request::get("/courts").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let courts: Vec<Court> = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(courts.len(), 4);
        assert!(courts.iter().any(|court| court.hourly_rate == Decimal::new(8_000, 2)));
    }
}
