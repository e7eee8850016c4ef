use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use rust_decimal::Decimal;
use tempfile::TempDir;
use tokio::sync::Mutex;

use courtside_agent::llm::{LlmPrompt, StaticLlmClient};
use courtside_agent::replies::SOMETHING_WENT_WRONG;
use courtside_agent::{
    AgentDeps, AgentRuntime, LlmClient, LlmReply, RuntimeSettings, SuggestedAction, TurnInput,
};
use courtside_core::audit::InMemoryAuditSink;
use courtside_core::availability::BookingPolicy;
use courtside_core::clock::ManualClock;
use courtside_core::domain::court::{Court, CourtId, SlotModel};
use courtside_core::domain::reservation::ReservationStatus;
use courtside_core::domain::session::TurnRole;
use courtside_core::domain::user::{PhoneNumber, User};
use courtside_db::repositories::{
    ConversationRepository, CourtRepository, InMemoryCourtRepository, InMemoryNegotiationRepository,
    InMemoryReservationRepository, NegotiationRepository, RepositoryError, ReservationRepository,
    SqlConversationRepository, SqlCourtRepository, SqlReservationRepository, UserRepository,
};
use courtside_db::{connect_with_settings, migrations};

const ALICE: &str = "whatsapp:+5551999990001";
const BRUNO: &str = "whatsapp:+5551999990002";

fn phone(raw: &str) -> PhoneNumber {
    PhoneNumber::normalize(raw, "55").expect("valid phone")
}

/// 09:00 local (UTC-3) on Sunday 2026-10-18.
fn start_of_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
}

fn tomorrow_at(local_hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, local_hour + 3, 0, 0).unwrap()
}

fn settings(context_entries: usize) -> RuntimeSettings {
    RuntimeSettings {
        policy: BookingPolicy::new(6, FixedOffset::west_opt(3 * 3600).expect("offset")),
        default_country_code: "55".to_string(),
        session_timeout: Duration::minutes(30),
        retention: Duration::hours(24),
        context_entries,
        llm_timeout: StdDuration::from_secs(2),
    }
}

fn central_court() -> Court {
    Court {
        id: CourtId("court-central".to_string()),
        name: "Quadra Central".to_string(),
        sport: "Futsal".to_string(),
        hourly_rate: Decimal::new(10_000, 2),
        slots: SlotModel::OperatingHours { open_hour: 8, close_hour: 22 },
    }
}

struct Harness {
    runtime: AgentRuntime,
    clock: ManualClock,
    audit: InMemoryAuditSink,
    negotiations: Arc<InMemoryNegotiationRepository>,
    reservations: Arc<InMemoryReservationRepository>,
}

async fn harness_with(llm: Arc<dyn LlmClient>, context_entries: usize) -> Harness {
    let clock = ManualClock::new(start_of_day());
    let audit = InMemoryAuditSink::default();
    let courts = Arc::new(InMemoryCourtRepository::default());
    courts.save(central_court()).await.expect("save court");
    let negotiations = Arc::new(InMemoryNegotiationRepository::default());
    let reservations = Arc::new(InMemoryReservationRepository::default());

    let deps = AgentDeps {
        courts,
        negotiations: negotiations.clone(),
        reservations: reservations.clone(),
        ..AgentDeps::in_memory(Arc::new(clock.clone()))
    }
    .with_llm(llm)
    .with_audit(Arc::new(audit.clone()));

    Harness {
        runtime: AgentRuntime::new(deps, settings(context_entries)),
        clock,
        audit,
        negotiations,
        reservations,
    }
}

async fn harness() -> Harness {
    harness_with(Arc::new(courtside_agent::llm::DisabledLlmClient), 10).await
}

/// Keeps every prompt it receives and answers with a fixed reply.
struct RecordingLlm {
    prompts: Mutex<Vec<LlmPrompt>>,
    reply: LlmReply,
}

impl RecordingLlm {
    fn new(reply: LlmReply) -> Arc<Self> {
        Arc::new(Self { prompts: Mutex::default(), reply })
    }

    async fn last_prompt(&self) -> LlmPrompt {
        self.prompts.lock().await.last().cloned().expect("llm was called")
    }
}

#[async_trait]
impl LlmClient for RecordingLlm {
    async fn complete(&self, prompt: &LlmPrompt) -> anyhow::Result<LlmReply> {
        self.prompts.lock().await.push(prompt.clone());
        Ok(self.reply.clone())
    }
}

#[tokio::test]
async fn booking_request_gets_an_honest_quote() {
    let h = harness().await;

    let reply = h.runtime.handle_message(ALICE, "reservar quadra amanhã 19h por 2 horas").await;

    assert!(reply.contains("Quadra Central"), "{reply}");
    assert!(reply.contains("19:00"), "{reply}");
    assert!(reply.contains("2 horas"), "{reply}");
    assert!(reply.contains("200.00"), "{reply}");

    let pending = h.negotiations.find(&phone(ALICE)).await.expect("find").expect("quote stored");
    assert_eq!(pending.start, tomorrow_at(19));
    assert_eq!(pending.duration_hours, 2);
    assert_eq!(pending.total_price, pending.hourly_rate * Decimal::from(2));
}

#[tokio::test]
async fn confirmation_commits_and_returns_reference() {
    let h = harness().await;
    h.runtime.handle_message(ALICE, "reservar quadra amanhã 19h por 2 horas").await;

    let reply = h.runtime.handle_message(ALICE, "confirmo").await;

    assert!(reply.contains("Reserva confirmada"), "{reply}");
    let mine = h.reservations.list_for_user(&phone(ALICE)).await.expect("list");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, ReservationStatus::Confirmed);
    assert!(reply.contains(&mine[0].id.0), "{reply}");
    assert_eq!(h.negotiations.find(&phone(ALICE)).await.expect("find"), None);

    let again = h.runtime.handle_message(ALICE, "confirmo").await;
    assert!(again.contains("Não há nenhuma reserva aguardando confirmação"), "{again}");
}

#[tokio::test]
async fn raced_confirmation_reports_unavailable_slot() {
    let h = harness().await;
    h.runtime.handle_message(ALICE, "reservar quadra amanhã 19h").await;
    h.runtime.handle_message(BRUNO, "reservar quadra amanhã 19h").await;

    let winner = h.runtime.handle_message(ALICE, "sim").await;
    let loser = h.runtime.handle_message(BRUNO, "confirmo").await;

    assert!(winner.contains("Reserva confirmada"), "{winner}");
    assert!(loser.contains("não está mais disponível"), "{loser}");
    assert_eq!(h.negotiations.find(&phone(BRUNO)).await.expect("find"), None);
    assert!(h.reservations.list_for_user(&phone(BRUNO)).await.expect("list").is_empty());
}

#[tokio::test]
async fn cancel_without_quote_is_neutral() {
    let h = harness().await;

    let reply = h.runtime.handle_message(ALICE, "cancelar").await;

    assert!(reply.contains("Não há nada pendente"), "{reply}");
    assert_eq!(h.negotiations.find(&phone(ALICE)).await.expect("find"), None);
    assert!(h.reservations.list_for_user(&phone(ALICE)).await.expect("list").is_empty());
}

#[tokio::test]
async fn cancel_with_quote_discards_it() {
    let h = harness().await;
    h.runtime.handle_message(ALICE, "reservar quadra amanhã 19h").await;

    let reply = h.runtime.handle_message(ALICE, "não, cancela").await;

    assert!(reply.contains("descartei esse orçamento"), "{reply}");
    assert_eq!(h.negotiations.find(&phone(ALICE)).await.expect("find"), None);
}

#[tokio::test]
async fn cancel_naming_a_reference_targets_the_reservation_not_the_quote() {
    let h = harness().await;
    h.runtime.handle_message(ALICE, "reservar quadra amanhã 10h").await;
    h.runtime.handle_message(ALICE, "confirmo").await;
    let reference = h.reservations.list_for_user(&phone(ALICE)).await.expect("list")[0].id.0.clone();
    h.runtime.handle_message(ALICE, "reservar quadra amanhã 15h").await;

    let reply = h.runtime.handle_message(ALICE, &format!("cancelar {reference}")).await;

    assert!(reply.contains("Reserva cancelada com sucesso"), "{reply}");
    assert!(h.reservations.list_for_user(&phone(ALICE)).await.expect("list").is_empty());
    let pending = h.negotiations.find(&phone(ALICE)).await.expect("find").expect("quote kept");
    assert_eq!(pending.start, tomorrow_at(15));
}

#[tokio::test]
async fn confirmed_reservation_can_be_listed_and_cancelled() {
    let h = harness().await;
    h.runtime.handle_message(ALICE, "reservar quadra amanhã 10h").await;
    h.runtime.handle_message(ALICE, "confirmo").await;

    let listed = h.runtime.handle_message(ALICE, "minhas reservas").await;
    assert!(listed.contains("Quadra Central"), "{listed}");
    assert!(listed.contains("19/10/2026 às 10:00"), "{listed}");

    let reply = h.runtime.handle_message(ALICE, "quero cancelar minha reserva de amanhã às 10h").await;
    assert!(reply.contains("Reserva cancelada com sucesso"), "{reply}");
    assert!(h.reservations.list_for_user(&phone(ALICE)).await.expect("list").is_empty());

    let missing = h.runtime.handle_message(ALICE, "cancelar amanhã às 10h").await;
    assert!(missing.contains("Não encontrei nenhuma reserva sua"), "{missing}");
}

#[tokio::test]
async fn session_gap_resets_llm_context() {
    let llm = RecordingLlm::new(LlmReply::text("Temos estacionamento gratuito."));
    let h = harness_with(llm.clone(), 10).await;

    h.runtime.handle_message(ALICE, "reservar futsal").await;
    h.clock.advance(Duration::minutes(40));
    let reply = h.runtime.handle_message(ALICE, "vocês têm estacionamento?").await;

    assert_eq!(reply, "Temos estacionamento gratuito.");
    let prompt = llm.last_prompt().await;
    assert!(!prompt.user.contains("reservar futsal"), "{}", prompt.user);
    assert!(prompt.user.contains("User: vocês têm estacionamento?"), "{}", prompt.user);
}

#[tokio::test]
async fn short_gap_keeps_llm_context() {
    let llm = RecordingLlm::new(LlmReply::text("Temos estacionamento gratuito."));
    let h = harness_with(llm.clone(), 10).await;

    h.runtime.handle_message(ALICE, "reservar futsal").await;
    h.clock.advance(Duration::minutes(10));
    h.runtime.handle_message(ALICE, "vocês têm estacionamento?").await;

    let prompt = llm.last_prompt().await;
    assert!(prompt.user.contains("User: reservar futsal"), "{}", prompt.user);
}

#[tokio::test]
async fn turns_older_than_retention_never_reach_the_prompt() {
    let llm = RecordingLlm::new(LlmReply::text("ok"));
    let h = harness_with(llm.clone(), 1_000).await;

    h.runtime.handle_message(ALICE, "oi, primeira mensagem").await;
    // stay active so the session never times out
    for _ in 0..75 {
        h.clock.advance(Duration::minutes(20));
        h.runtime.handle_message(ALICE, "oi").await;
    }
    h.runtime.handle_message(ALICE, "vocês têm vestiário?").await;

    let prompt = llm.last_prompt().await;
    assert!(!prompt.user.contains("primeira mensagem"), "{}", prompt.user);
    assert!(prompt.user.contains("vestiário"));
}

#[tokio::test]
async fn invalid_hour_asks_again_without_state() {
    let h = harness().await;

    let reply = h.runtime.handle_message(ALICE, "quero reservar quadra das 25h").await;

    assert!(reply.contains("25h não é um horário válido"), "{reply}");
    assert_eq!(h.negotiations.find(&phone(ALICE)).await.expect("find"), None);
}

#[tokio::test]
async fn missing_pieces_are_asked_for_and_hour_is_never_defaulted() {
    let h = harness().await;

    let no_date = h.runtime.handle_message(ALICE, "quero reservar futsal").await;
    assert!(no_date.contains("Para qual dia"), "{no_date}");

    let no_time = h.runtime.handle_message(ALICE, "quero reservar futsal amanhã").await;
    assert!(no_time.contains("Que horas"), "{no_time}");
    assert_eq!(h.negotiations.find(&phone(ALICE)).await.expect("find"), None);
}

#[tokio::test]
async fn outside_operating_hours_offers_the_window() {
    let h = harness().await;
    let reply = h.runtime.handle_message(ALICE, "reservar quadra amanhã 21h por 2 horas").await;
    assert!(reply.contains("das 08h às 22h"), "{reply}");
}

#[tokio::test]
async fn availability_lists_free_hours() {
    let h = harness().await;
    h.runtime.handle_message(ALICE, "reservar quadra amanhã 19h por 2 horas").await;
    h.runtime.handle_message(ALICE, "confirmo").await;

    let reply = h.runtime.handle_message(BRUNO, "horários disponíveis amanhã").await;
    assert!(reply.contains("Quadra Central"), "{reply}");
    assert!(reply.contains("18h, 21h"), "{reply}");
}

#[tokio::test]
async fn greeting_uses_whatsapp_profile_name() {
    let h = harness().await;
    let reply = h
        .runtime
        .handle_turn(TurnInput {
            sender: ALICE.to_string(),
            text: "oi".to_string(),
            correlation_id: Some("SM-1".to_string()),
            profile_name: Some("Ana".to_string()),
        })
        .await;
    assert!(reply.starts_with("Olá Ana!"), "{reply}");

    let later = h.runtime.handle_message(ALICE, "bom dia").await;
    assert!(later.starts_with("Olá Ana!"), "{later}");
}

#[tokio::test]
async fn disabled_llm_degrades_to_canned_reply() {
    let h = harness().await;
    let reply = h.runtime.handle_message(ALICE, "qual a previsão do tempo?").await;
    assert!(reply.contains("Não entendi sua solicitação"), "{reply}");
}

#[tokio::test]
async fn slow_llm_degrades_to_canned_reply() {
    let slow = StaticLlmClient::new(LlmReply::text("tarde demais"))
        .with_delay(StdDuration::from_secs(10));
    let h = harness_with(Arc::new(slow), 10).await;

    let reply = h.runtime.handle_message(ALICE, "qual a previsão do tempo?").await;
    assert!(reply.contains("Não entendi sua solicitação"), "{reply}");
}

#[tokio::test]
async fn llm_quote_suggestion_runs_the_deterministic_path() {
    let llm = RecordingLlm::new(LlmReply {
        text: "Claro! Veja o orçamento:".to_string(),
        suggested_action: Some(SuggestedAction::RequestQuote),
    });
    let h = harness_with(llm, 10).await;

    let reply = h.runtime.handle_message(ALICE, "tem como jogar amanhã 19h?").await;

    assert!(reply.starts_with("Claro! Veja o orçamento:"), "{reply}");
    assert!(reply.contains("R$ 100.00"), "{reply}");
    let pending = h.negotiations.find(&phone(ALICE)).await.expect("find").expect("quote");
    assert_eq!(pending.start, tomorrow_at(19));
}

#[tokio::test]
async fn llm_cannot_commit_on_its_own() {
    let llm = RecordingLlm::new(LlmReply {
        text: "Pronto, reservei para você!".to_string(),
        suggested_action: Some(SuggestedAction::CommitReservation),
    });
    let h = harness_with(llm, 10).await;
    h.runtime.handle_message(ALICE, "reservar quadra amanhã 19h").await;

    let reply = h.runtime.handle_message(ALICE, "e tem bola lá?").await;

    assert_eq!(reply, "Pronto, reservei para você!");
    assert!(h.negotiations.find(&phone(ALICE)).await.expect("find").is_some());
    assert!(h.reservations.list_for_user(&phone(ALICE)).await.expect("list").is_empty());
    assert!(h.audit.event_types().contains(&"guardrail.denied".to_string()));
}

struct BrokenUsers;

#[async_trait]
impl UserRepository for BrokenUsers {
    async fn find_by_phone(&self, _phone: &PhoneNumber) -> Result<Option<User>, RepositoryError> {
        Err(RepositoryError::Decode("database locked".to_string()))
    }

    async fn find_or_create(
        &self,
        _phone: &PhoneNumber,
        _now: DateTime<Utc>,
    ) -> Result<User, RepositoryError> {
        Err(RepositoryError::Decode("database locked".to_string()))
    }

    async fn update_display_name(
        &self,
        _phone: &PhoneNumber,
        _display_name: &str,
    ) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Decode("database locked".to_string()))
    }
}

#[tokio::test]
async fn store_failure_becomes_generic_apology() {
    let clock = ManualClock::new(start_of_day());
    let deps = AgentDeps { users: Arc::new(BrokenUsers), ..AgentDeps::in_memory(Arc::new(clock)) };
    let runtime = AgentRuntime::new(deps, settings(10));

    assert_eq!(runtime.handle_message(ALICE, "oi").await, SOMETHING_WENT_WRONG);
    assert_eq!(runtime.handle_message("whatsapp:", "oi").await, SOMETHING_WENT_WRONG);
}

#[tokio::test]
async fn concurrent_confirmations_on_sqlite_commit_exactly_once() {
    let dir = TempDir::new().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("race.db").display());
    let pool = connect_with_settings(&url, 4, 5).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    SqlCourtRepository::new(pool.clone()).save(central_court()).await.expect("court");

    let clock = ManualClock::new(start_of_day());
    let deps = AgentDeps::from_pool(
        pool.clone(),
        Arc::new(courtside_agent::llm::DisabledLlmClient),
        Arc::new(clock),
        Arc::new(InMemoryAuditSink::default()),
    );
    let runtime = Arc::new(AgentRuntime::new(deps, settings(10)));

    let senders = ["whatsapp:+5551999990011", "whatsapp:+5551999990012", "whatsapp:+5551999990013"];
    for sender in senders {
        let quote = runtime.handle_message(sender, "reservar quadra amanhã 20h por 2 horas").await;
        assert!(quote.contains("Confirmação de Reserva"), "{quote}");
    }

    let mut handles = Vec::new();
    for sender in senders {
        let runtime = Arc::clone(&runtime);
        handles.push(tokio::spawn(async move { runtime.handle_message(sender, "confirmo").await }));
    }
    let mut replies = Vec::new();
    for handle in handles {
        replies.push(handle.await.expect("task"));
    }

    let confirmed = replies.iter().filter(|reply| reply.contains("Reserva confirmada")).count();
    let unavailable = replies.iter().filter(|reply| reply.contains("não está mais disponível")).count();
    assert_eq!(confirmed, 1, "{replies:?}");
    assert_eq!(unavailable, 2, "{replies:?}");

    let booked = SqlReservationRepository::new(pool.clone())
        .list_confirmed_for_court(
            &CourtId("court-central".to_string()),
            tomorrow_at(0),
            tomorrow_at(0) + Duration::days(1),
        )
        .await
        .expect("list");
    assert_eq!(booked.len(), 1);

    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_messages_from_one_sender_are_processed_in_turn() {
    let dir = TempDir::new().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("turns.db").display());
    let pool = connect_with_settings(&url, 4, 5).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    SqlCourtRepository::new(pool.clone()).save(central_court()).await.expect("court");

    let deps = AgentDeps::from_pool(
        pool.clone(),
        Arc::new(courtside_agent::llm::DisabledLlmClient),
        Arc::new(ManualClock::new(start_of_day())),
        Arc::new(InMemoryAuditSink::default()),
    );
    let runtime = Arc::new(AgentRuntime::new(deps, settings(10)));

    let handles = (0..10)
        .map(|_| {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move { runtime.handle_message(ALICE, "ajuda").await })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        let reply = handle.await.expect("task");
        assert!(reply.contains("Como usar o sistema"), "{reply}");
    }

    let session = SqlConversationRepository::new(pool.clone())
        .load(&phone(ALICE))
        .await
        .expect("load")
        .expect("session stored");
    assert_eq!(session.entries.len(), 20);
    for pair in session.entries.chunks(2) {
        assert_eq!(pair[0].role, TurnRole::User);
        assert_eq!(pair[1].role, TurnRole::Assistant);
    }

    pool.close().await;
}
