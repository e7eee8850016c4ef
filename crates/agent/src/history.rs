use std::sync::Arc;

use chrono::Duration;

use courtside_core::clock::Clock;
use courtside_core::domain::session::{AppendOutcome, ConversationSession, TurnRole};
use courtside_core::domain::user::PhoneNumber;
use courtside_db::repositories::{ConversationRepository, RepositoryError};

use crate::locks::SenderLocks;

/// Time-windowed transcript per sender, persisted after every change.
/// Load-modify-save runs under a per-sender lock so concurrent appends are
/// never lost.
pub struct SessionHistoryManager {
    repo: Arc<dyn ConversationRepository>,
    locks: SenderLocks,
    clock: Arc<dyn Clock>,
    session_timeout: Duration,
    retention: Duration,
}

impl SessionHistoryManager {
    pub fn new(
        repo: Arc<dyn ConversationRepository>,
        clock: Arc<dyn Clock>,
        session_timeout: Duration,
        retention: Duration,
    ) -> Self {
        Self { repo, locks: SenderLocks::default(), clock, session_timeout, retention }
    }

    pub async fn record_turn(
        &self,
        sender: &PhoneNumber,
        role: TurnRole,
        text: &str,
    ) -> Result<AppendOutcome, RepositoryError> {
        let _guard = self.locks.acquire(sender).await;
        let now = self.clock.now();
        let mut session = self
            .repo
            .load(sender)
            .await?
            .unwrap_or_else(|| ConversationSession::start(sender.clone(), now));

        let outcome = session.append(role, text, now, self.session_timeout);
        if outcome == AppendOutcome::StartedNewSession {
            tracing::info!(
                event_name = "session.started",
                sender = %sender,
                timeout_minutes = self.session_timeout.num_minutes(),
                "inactivity gap exceeded; starting a fresh session"
            );
        }
        self.repo.save(session).await?;
        Ok(outcome)
    }

    pub async fn recent_context(
        &self,
        sender: &PhoneNumber,
        max_entries: usize,
    ) -> Result<Vec<String>, RepositoryError> {
        let now = self.clock.now();
        Ok(self
            .repo
            .load(sender)
            .await?
            .map(|session| session.recent_context(now, self.retention, max_entries))
            .unwrap_or_default())
    }

    /// Drops turns older than the retention window. Returns how many went.
    pub async fn prune(&self, sender: &PhoneNumber) -> Result<usize, RepositoryError> {
        let _guard = self.locks.acquire(sender).await;
        let Some(mut session) = self.repo.load(sender).await? else {
            return Ok(0);
        };
        let removed = session.prune(self.clock.now(), self.retention);
        if removed > 0 {
            self.repo.save(session).await?;
            tracing::debug!(event_name = "session.pruned", sender = %sender, removed, "old turns pruned");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use courtside_core::clock::ManualClock;
    use courtside_core::domain::session::{AppendOutcome, TurnRole};
    use courtside_core::domain::user::PhoneNumber;
    use courtside_db::repositories::InMemoryConversationRepository;

    use super::SessionHistoryManager;

    fn manager() -> (SessionHistoryManager, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap());
        let manager = SessionHistoryManager::new(
            Arc::new(InMemoryConversationRepository::default()),
            Arc::new(clock.clone()),
            Duration::minutes(30),
            Duration::hours(24),
        );
        (manager, clock)
    }

    fn sender() -> PhoneNumber {
        PhoneNumber("+5551999990000".to_string())
    }

    #[tokio::test]
    async fn turns_within_timeout_share_a_session() {
        let (history, clock) = manager();
        history.record_turn(&sender(), TurnRole::User, "oi").await.expect("record");
        clock.advance(Duration::minutes(10));
        let outcome =
            history.record_turn(&sender(), TurnRole::Assistant, "Olá!").await.expect("record");

        assert_eq!(outcome, AppendOutcome::Appended);
        assert_eq!(
            history.recent_context(&sender(), 10).await.expect("context"),
            vec!["User: oi".to_string(), "Assistant: Olá!".to_string()]
        );
    }

    #[tokio::test]
    async fn long_gap_starts_fresh_session() {
        let (history, clock) = manager();
        history.record_turn(&sender(), TurnRole::User, "reservar futsal").await.expect("record");
        clock.advance(Duration::minutes(40));
        let outcome = history.record_turn(&sender(), TurnRole::User, "oi").await.expect("record");

        assert_eq!(outcome, AppendOutcome::StartedNewSession);
        assert_eq!(
            history.recent_context(&sender(), 10).await.expect("context"),
            vec!["User: oi".to_string()]
        );
    }

    #[tokio::test]
    async fn context_is_capped_to_most_recent_entries() {
        let (history, clock) = manager();
        for turn in 0..5 {
            history.record_turn(&sender(), TurnRole::User, &format!("msg {turn}")).await.expect("record");
            clock.advance(Duration::minutes(1));
        }
        assert_eq!(
            history.recent_context(&sender(), 2).await.expect("context"),
            vec!["User: msg 3".to_string(), "User: msg 4".to_string()]
        );
        assert!(history.recent_context(&PhoneNumber("+5511000000000".to_string()), 2)
            .await
            .expect("context")
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_from_one_sender_are_all_kept() {
        let (history, _clock) = manager();
        let history = Arc::new(history);

        let tasks = (0..20)
            .map(|turn| {
                let history = Arc::clone(&history);
                tokio::spawn(async move {
                    history.record_turn(&sender(), TurnRole::User, &format!("msg {turn}")).await
                })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            task.await.expect("join").expect("record");
        }

        assert_eq!(history.recent_context(&sender(), 100).await.expect("context").len(), 20);
    }

    #[tokio::test]
    async fn prune_is_a_noop_for_unknown_sender() {
        let (history, _clock) = manager();
        assert_eq!(history.prune(&sender()).await.expect("prune"), 0);
    }
}
