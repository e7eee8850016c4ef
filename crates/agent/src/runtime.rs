use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, FixedOffset, NaiveDate};
use tracing::{error, info, warn};
use uuid::Uuid;

use courtside_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
};
use courtside_core::availability::BookingPolicy;
use courtside_core::clock::Clock;
use courtside_core::config::{AppConfig, ConfigError};
use courtside_core::domain::court::Court;
use courtside_core::domain::negotiation::NegotiationState;
use courtside_core::domain::session::TurnRole;
use courtside_core::domain::user::{PhoneNumber, User, DEFAULT_DISPLAY_NAME};
use courtside_core::errors::BookingError;
use courtside_core::intent::{classify, Intent};
use courtside_db::repositories::{
    ConversationRepository, CourtRepository, InMemoryConversationRepository,
    InMemoryCourtRepository, InMemoryNegotiationRepository, InMemoryReservationRepository,
    InMemoryUserRepository, NegotiationRepository, RepositoryError, ReservationRepository,
    SqlConversationRepository, SqlCourtRepository, SqlNegotiationRepository,
    SqlReservationRepository, SqlUserRepository, UserRepository,
};
use courtside_db::DbPool;

use crate::booking::{BookingService, ConfirmOutcome};
use crate::conversation::RequestExtractor;
use crate::fallback::{BoundedFallback, FallbackContext, FallbackOutcome};
use crate::guardrails::{GuardrailDecision, GuardrailIntent, GuardrailPolicy};
use crate::history::SessionHistoryManager;
use crate::llm::{DisabledLlmClient, LlmClient};
use crate::locks::SenderLocks;
use crate::replies;

const ACTOR: &str = "agent-runtime";

/// Collaborators of the runtime, injected so tests and binaries pick their own.
#[derive(Clone)]
pub struct AgentDeps {
    pub users: Arc<dyn UserRepository>,
    pub courts: Arc<dyn CourtRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub negotiations: Arc<dyn NegotiationRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub llm: Arc<dyn LlmClient>,
    pub clock: Arc<dyn Clock>,
    pub audit: Arc<dyn AuditSink>,
}

impl AgentDeps {
    pub fn from_pool(
        pool: DbPool,
        llm: Arc<dyn LlmClient>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            users: Arc::new(SqlUserRepository::new(pool.clone())),
            courts: Arc::new(SqlCourtRepository::new(pool.clone())),
            reservations: Arc::new(SqlReservationRepository::new(pool.clone())),
            negotiations: Arc::new(SqlNegotiationRepository::new(pool.clone())),
            conversations: Arc::new(SqlConversationRepository::new(pool)),
            llm,
            clock,
            audit,
        }
    }

    /// Volatile stores, a disabled model and an in-memory audit trail.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::default()),
            courts: Arc::new(InMemoryCourtRepository::default()),
            reservations: Arc::new(InMemoryReservationRepository::default()),
            negotiations: Arc::new(InMemoryNegotiationRepository::default()),
            conversations: Arc::new(InMemoryConversationRepository::default()),
            llm: Arc::new(DisabledLlmClient),
            clock,
            audit: Arc::new(InMemoryAuditSink::default()),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeSettings {
    pub policy: BookingPolicy,
    pub default_country_code: String,
    pub session_timeout: Duration,
    pub retention: Duration,
    pub context_entries: usize,
    pub llm_timeout: StdDuration,
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            policy: config.booking.policy()?,
            default_country_code: config.booking.default_country_code.clone(),
            session_timeout: config.booking.session_timeout(),
            retention: config.booking.retention(),
            context_entries: config.booking.context_entries,
            llm_timeout: StdDuration::from_secs(config.llm.timeout_secs.max(1)),
        })
    }
}

/// One inbound message as delivered by a transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnInput {
    pub sender: String,
    pub text: String,
    pub correlation_id: Option<String>,
    pub profile_name: Option<String>,
}

impl TurnInput {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self { sender: sender.into(), text: text.into(), ..Self::default() }
    }
}

pub struct AgentRuntime {
    users: Arc<dyn UserRepository>,
    turns: SenderLocks,
    booking: BookingService,
    history: SessionHistoryManager,
    fallback: BoundedFallback,
    extractor: RequestExtractor,
    guardrails: GuardrailPolicy,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    settings: RuntimeSettings,
}

impl AgentRuntime {
    pub fn new(deps: AgentDeps, settings: RuntimeSettings) -> Self {
        let booking = BookingService::new(
            deps.courts,
            deps.reservations,
            deps.negotiations,
            Arc::clone(&deps.clock),
            Arc::clone(&deps.audit),
            settings.policy,
        );
        let history = SessionHistoryManager::new(
            deps.conversations,
            Arc::clone(&deps.clock),
            settings.session_timeout,
            settings.retention,
        );

        Self {
            users: deps.users,
            turns: SenderLocks::default(),
            booking,
            history,
            fallback: BoundedFallback::new(deps.llm, settings.llm_timeout),
            extractor: RequestExtractor::with_max_duration(settings.policy.max_duration_hours),
            guardrails: GuardrailPolicy::default(),
            clock: deps.clock,
            audit: deps.audit,
            settings,
        }
    }

    pub fn with_guardrails(mut self, guardrails: GuardrailPolicy) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn booking(&self) -> &BookingService {
        &self.booking
    }

    /// Processes one message and returns the reply. Never fails: anything
    /// unexpected becomes the generic apology.
    pub async fn handle_message(&self, sender: &str, text: &str) -> String {
        self.handle_turn(TurnInput::new(sender, text)).await
    }

    pub async fn handle_turn(&self, input: TurnInput) -> String {
        let correlation_id =
            input.correlation_id.clone().unwrap_or_else(|| format!("turn-{}", Uuid::new_v4()));

        let Some(sender) =
            PhoneNumber::normalize(&input.sender, &self.settings.default_country_code)
        else {
            warn!(
                event_name = "turn.invalid_sender",
                correlation_id = %correlation_id,
                raw_sender = %input.sender,
                "could not normalize sender"
            );
            return replies::SOMETHING_WENT_WRONG.to_string();
        };

        // one turn at a time per sender: history, quote and confirm all
        // observe the effects of that sender's previous message
        let _turn = self.turns.acquire(&sender).await;
        match self.run_turn(&sender, &input, &correlation_id).await {
            Ok(reply) => reply,
            Err(error) => {
                error!(
                    event_name = "turn.failed",
                    correlation_id = %correlation_id,
                    sender = %sender,
                    error = %error,
                    "turn failed; replying with generic apology"
                );
                replies::SOMETHING_WENT_WRONG.to_string()
            }
        }
    }

    async fn run_turn(
        &self,
        sender: &PhoneNumber,
        input: &TurnInput,
        correlation_id: &str,
    ) -> Result<String, BookingError> {
        let text = input.text.trim();
        let user = self.identify(sender, input.profile_name.as_deref()).await.map_err(dependency)?;
        self.history.record_turn(sender, TurnRole::User, text).await.map_err(dependency)?;

        let state = self.booking.state_of(sender).await?;
        let intent = classify(text, state.is_offered());
        info!(
            event_name = "turn.classified",
            correlation_id,
            sender = %sender,
            intent = intent.as_str(),
            offered = state.is_offered(),
            "message classified"
        );

        let audit = AuditContext::new(Some(sender.clone()), correlation_id, ACTOR);
        let reply = match self.dispatch(intent, &user, &state, text, &audit).await {
            Ok(reply) => reply,
            Err(error) => self.recover(error)?,
        };

        // the reply is already decided; history trouble must not replace it
        if let Err(error) = self.history.record_turn(sender, TurnRole::Assistant, &reply).await {
            warn!(
                event_name = "session.record_failed",
                correlation_id,
                error = %error,
                "assistant turn not recorded"
            );
        }
        if let Err(error) = self.history.prune(sender).await {
            warn!(
                event_name = "session.prune_failed",
                correlation_id,
                error = %error,
                "session not pruned"
            );
        }
        Ok(reply)
    }

    async fn identify(
        &self,
        sender: &PhoneNumber,
        profile_name: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let mut user = self.users.find_or_create(sender, self.clock.now()).await?;
        let profile_name = profile_name.map(str::trim).filter(|name| !name.is_empty());
        if let Some(name) = profile_name {
            if user.display_name == DEFAULT_DISPLAY_NAME
                && self.users.update_display_name(sender, name).await?
            {
                user.display_name = name.to_string();
            }
        }
        Ok(user)
    }

    async fn dispatch(
        &self,
        intent: Intent,
        user: &User,
        state: &NegotiationState,
        text: &str,
        audit: &AuditContext,
    ) -> Result<String, BookingError> {
        let sender = &user.phone;
        match intent {
            Intent::Greeting => Ok(replies::greeting(&user.display_name)),
            Intent::Help => Ok(replies::help()),
            Intent::Farewell => Ok(replies::farewell()),
            Intent::Book => {
                let request = self.extractor.extract(text, self.today());
                let quote = self.booking.quote(sender, &request, audit).await?;
                Ok(replies::quote(&quote, self.offset()))
            }
            Intent::Confirm => match self.booking.confirm(sender, audit).await? {
                ConfirmOutcome::NothingPending => Ok(replies::nothing_to_confirm()),
                ConfirmOutcome::Confirmed { reservation, court_name } => {
                    Ok(replies::reservation_confirmed(&reservation, &court_name, self.offset()))
                }
                ConfirmOutcome::Unavailable { hours } => {
                    Ok(replies::slot_unavailable(&hours, self.offset()))
                }
            },
            Intent::Cancel => self.cancel(sender, state, text, audit).await,
            Intent::ListMine => {
                let mine = self.booking.list_mine(sender).await?;
                Ok(replies::reservation_list(&mine, self.offset()))
            }
            Intent::Availability => {
                let request = self.extractor.extract(text, self.today());
                if let Some(issue) = request.issue {
                    return Err(BookingError::Validation(issue));
                }
                let date = request.date.unwrap_or_else(|| self.today());
                let report = self.booking.availability(date, request.sport).await?;
                Ok(replies::availability(date, &report))
            }
            Intent::Unknown => self.fall_back(sender, state, text, audit).await,
        }
    }

    async fn cancel(
        &self,
        sender: &PhoneNumber,
        state: &NegotiationState,
        text: &str,
        audit: &AuditContext,
    ) -> Result<String, BookingError> {
        let request = self.extractor.extract(text, self.today());
        if request.reference.is_some() {
            let cancelled = self.booking.cancel_reservation(sender, &request, audit).await?;
            return Ok(replies::reservation_cancelled(&cancelled, self.offset()));
        }

        if state.is_offered() {
            self.booking.cancel_pending(sender, audit).await?;
            return Ok(replies::negotiation_cancelled());
        }

        if request.has_slot() {
            let cancelled = self.booking.cancel_reservation(sender, &request, audit).await?;
            return Ok(replies::reservation_cancelled(&cancelled, self.offset()));
        }

        self.booking.cancel_pending(sender, audit).await?;
        Ok(replies::nothing_to_cancel())
    }

    async fn fall_back(
        &self,
        sender: &PhoneNumber,
        state: &NegotiationState,
        text: &str,
        audit: &AuditContext,
    ) -> Result<String, BookingError> {
        let offset = self.offset();
        let catalog = self.booking.catalog().await?.iter().map(Court::summary_line).collect();
        let reservations = self
            .booking
            .list_mine(sender)
            .await?
            .into_iter()
            .map(|(reservation, court_name)| {
                let local = reservation.start.with_timezone(&offset);
                format!(
                    "- {court_name} em {} às {}, {} hora(s), código {}",
                    local.format("%d/%m/%Y"),
                    local.format("%H:%M"),
                    reservation.duration_hours,
                    reservation.id.0
                )
            })
            .collect();
        let recent_turns = self
            .history
            .recent_context(sender, self.settings.context_entries)
            .await
            .map_err(dependency)?;

        let context = FallbackContext {
            message: text.to_string(),
            catalog,
            reservations,
            recent_turns,
            pending_quote: state.quote().map(|quote| quote.describe(offset)),
        };

        let reply = match self.fallback.answer(&context, &audit.correlation_id).await {
            FallbackOutcome::Answered(reply) => reply,
            FallbackOutcome::Degraded { .. } => return Ok(replies::not_understood(text)),
        };
        let Some(action) = reply.suggested_action else {
            return Ok(reply.text);
        };

        let intent = GuardrailIntent::from_suggestion(action, text);
        match (self.guardrails.evaluate(&intent), &intent) {
            (GuardrailDecision::Allow, GuardrailIntent::RequestQuote { raw_text }) => {
                let request = self.extractor.extract(raw_text, self.today());
                match self.booking.quote(sender, &request, audit).await {
                    Ok(quote) => Ok(format!("{}\n\n{}", reply.text, replies::quote(&quote, offset))),
                    Err(error) if error.is_recoverable() => {
                        info!(
                            event_name = "llm.quote_skipped",
                            correlation_id = %audit.correlation_id,
                            reason = %error,
                            "suggested quote could not be issued; keeping model reply"
                        );
                        Ok(reply.text)
                    }
                    Err(error) => Err(error),
                }
            }
            (decision, intent) => {
                let reason = match decision {
                    GuardrailDecision::Deny { reason_code, .. } => reason_code,
                    GuardrailDecision::Allow => "unsupported_llm_action",
                };
                self.audit.emit(
                    AuditEvent::new(
                        audit,
                        "guardrail.denied",
                        AuditCategory::Fallback,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("action", intent.action_key())
                    .with_metadata("reason_code", reason),
                );
                Ok(reply.text)
            }
        }
    }

    /// Turns a recoverable booking error into the reply that explains it.
    fn recover(&self, error: BookingError) -> Result<String, BookingError> {
        Ok(match error {
            BookingError::Validation(issue) => replies::clarification(&issue),
            BookingError::OutsideOperatingHours { open_hour, close_hour } => {
                replies::outside_operating_hours(open_hour, close_hour)
            }
            BookingError::NotFound(kind) => replies::not_found(&kind),
            BookingError::Conflict { hours } => replies::slot_unavailable(&hours, self.offset()),
            BookingError::Dependency(_) => return Err(error),
        })
    }

    fn offset(&self) -> FixedOffset {
        self.settings.policy.offset
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.offset()).date_naive()
    }
}

fn dependency(error: RepositoryError) -> BookingError {
    BookingError::Dependency(error.to_string())
}
