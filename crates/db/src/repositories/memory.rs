use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use courtside_core::availability::hours_of;
use courtside_core::domain::court::{Court, CourtId};
use courtside_core::domain::negotiation::PendingNegotiation;
use courtside_core::domain::reservation::{Reservation, ReservationId, ReservationStatus};
use courtside_core::domain::session::ConversationSession;
use courtside_core::domain::user::{PhoneNumber, User};

use super::{
    CommitOutcome, ConversationRepository, CourtRepository, NegotiationRepository,
    RepositoryError, ReservationRepository, UserRepository,
};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(phone.as_str()).cloned())
    }

    async fn find_or_create(
        &self,
        phone: &PhoneNumber,
        now: DateTime<Utc>,
    ) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        let user =
            users.entry(phone.0.clone()).or_insert_with(|| User::new(phone.clone(), now)).clone();
        Ok(user)
    }

    async fn update_display_name(
        &self,
        phone: &PhoneNumber,
        display_name: &str,
    ) -> Result<bool, RepositoryError> {
        let mut users = self.users.write().await;
        match users.get_mut(phone.as_str()) {
            Some(user) => {
                user.display_name = display_name.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryCourtRepository {
    courts: RwLock<HashMap<String, Court>>,
}

#[async_trait::async_trait]
impl CourtRepository for InMemoryCourtRepository {
    async fn list_all(&self) -> Result<Vec<Court>, RepositoryError> {
        let courts = self.courts.read().await;
        let mut listed = courts.values().cloned().collect::<Vec<_>>();
        listed.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(listed)
    }

    async fn find_by_id(&self, id: &CourtId) -> Result<Option<Court>, RepositoryError> {
        let courts = self.courts.read().await;
        Ok(courts.get(&id.0).cloned())
    }

    async fn save(&self, court: Court) -> Result<(), RepositoryError> {
        let mut courts = self.courts.write().await;
        courts.insert(court.id.0.clone(), court);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryReservationRepository {
    reservations: RwLock<HashMap<String, Reservation>>,
}

#[async_trait::async_trait]
impl ReservationRepository for InMemoryReservationRepository {
    async fn commit_if_free(
        &self,
        reservation: Reservation,
    ) -> Result<CommitOutcome, RepositoryError> {
        if reservation.status != ReservationStatus::Confirmed {
            return Err(RepositoryError::Decode(format!(
                "only confirmed reservations can be committed, got `{}`",
                reservation.status.as_str()
            )));
        }

        // Holding the write guard across check and insert keeps the pair atomic.
        let mut reservations = self.reservations.write().await;
        let hours = hours_of(reservation.start, reservation.duration_hours)
            .into_iter()
            .filter(|hour| {
                reservations.values().any(|held| {
                    held.court_id == reservation.court_id
                        && held.blocks_slot()
                        && held.overlaps(*hour, 1)
                })
            })
            .collect::<Vec<_>>();

        if !hours.is_empty() {
            return Ok(CommitOutcome::Conflict { hours });
        }

        reservations.insert(reservation.id.0.clone(), reservation.clone());
        Ok(CommitOutcome::Committed(reservation))
    }

    async fn find_by_id(
        &self,
        id: &ReservationId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        let reservations = self.reservations.read().await;
        Ok(reservations.get(&id.0).cloned())
    }

    async fn list_for_user(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let reservations = self.reservations.read().await;
        let mut listed = reservations
            .values()
            .filter(|reservation| {
                reservation.user_phone == *phone
                    && reservation.status != ReservationStatus::Cancelled
            })
            .cloned()
            .collect::<Vec<_>>();
        listed.sort_by_key(|reservation| reservation.start);
        Ok(listed)
    }

    async fn list_confirmed_for_court(
        &self,
        court_id: &CourtId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let reservations = self.reservations.read().await;
        let mut listed = reservations
            .values()
            .filter(|reservation| {
                reservation.court_id == *court_id
                    && reservation.blocks_slot()
                    && reservation.start < to
                    && reservation.end() > from
            })
            .cloned()
            .collect::<Vec<_>>();
        listed.sort_by_key(|reservation| reservation.start);
        Ok(listed)
    }

    async fn cancel(&self, id: &ReservationId) -> Result<bool, RepositoryError> {
        let mut reservations = self.reservations.write().await;
        match reservations.get_mut(&id.0) {
            Some(reservation) if reservation.status == ReservationStatus::Confirmed => {
                reservation.status = ReservationStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryNegotiationRepository {
    negotiations: RwLock<HashMap<String, PendingNegotiation>>,
}

#[async_trait::async_trait]
impl NegotiationRepository for InMemoryNegotiationRepository {
    async fn find(
        &self,
        sender: &PhoneNumber,
    ) -> Result<Option<PendingNegotiation>, RepositoryError> {
        let negotiations = self.negotiations.read().await;
        Ok(negotiations.get(sender.as_str()).cloned())
    }

    async fn put(&self, negotiation: PendingNegotiation) -> Result<(), RepositoryError> {
        let mut negotiations = self.negotiations.write().await;
        negotiations.insert(negotiation.sender.0.clone(), negotiation);
        Ok(())
    }

    async fn take(
        &self,
        sender: &PhoneNumber,
    ) -> Result<Option<PendingNegotiation>, RepositoryError> {
        let mut negotiations = self.negotiations.write().await;
        Ok(negotiations.remove(sender.as_str()))
    }

    async fn clear(&self, sender: &PhoneNumber) -> Result<bool, RepositoryError> {
        let mut negotiations = self.negotiations.write().await;
        Ok(negotiations.remove(sender.as_str()).is_some())
    }

    async fn restore(&self, negotiation: PendingNegotiation) -> Result<bool, RepositoryError> {
        let mut negotiations = self.negotiations.write().await;
        if negotiations.contains_key(negotiation.sender.as_str()) {
            return Ok(false);
        }
        negotiations.insert(negotiation.sender.0.clone(), negotiation);
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryConversationRepository {
    sessions: RwLock<HashMap<String, ConversationSession>>,
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn load(
        &self,
        sender: &PhoneNumber,
    ) -> Result<Option<ConversationSession>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(sender.as_str()).cloned())
    }

    async fn save(&self, session: ConversationSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.sender.0.clone(), session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, Utc};
    use rust_decimal::Decimal;

    use courtside_core::domain::court::CourtId;
    use courtside_core::domain::negotiation::{Awaiting, PendingNegotiation};
    use courtside_core::domain::reservation::{Reservation, ReservationId, ReservationStatus};
    use courtside_core::domain::user::PhoneNumber;

    use crate::repositories::{
        CommitOutcome, CourtRepository, InMemoryCourtRepository, InMemoryNegotiationRepository,
        InMemoryReservationRepository, NegotiationRepository, ReservationRepository,
    };

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }

    fn reservation(id: &str, start: DateTime<Utc>, hours: u32) -> Reservation {
        Reservation {
            id: ReservationId(id.to_string()),
            user_phone: PhoneNumber("+5551999990000".to_string()),
            court_id: CourtId("court-1".to_string()),
            start,
            duration_hours: hours,
            status: ReservationStatus::Confirmed,
            created_at: parse_ts("2026-10-18T12:00:00Z"),
        }
    }

    #[tokio::test]
    async fn in_memory_commit_matches_sql_overlap_rules() {
        let repo = InMemoryReservationRepository::default();
        let start = parse_ts("2026-10-19T22:00:00Z");

        let first = reservation("R-00000001", start, 3);
        assert!(matches!(
            repo.commit_if_free(first).await.expect("commit"),
            CommitOutcome::Committed(_)
        ));

        let clash = reservation("R-00000002", start + Duration::hours(2), 2);
        assert_eq!(
            repo.commit_if_free(clash).await.expect("commit"),
            CommitOutcome::Conflict { hours: vec![start + Duration::hours(2)] }
        );
    }

    #[tokio::test]
    async fn in_memory_take_is_exclusive_under_contention() {
        let repo = Arc::new(InMemoryNegotiationRepository::default());
        let quote = PendingNegotiation {
            sender: PhoneNumber("+5551999990000".to_string()),
            court_id: CourtId("court-1".to_string()),
            court_name: "Quadra 1 - Futebol Society".to_string(),
            start: parse_ts("2026-10-19T22:00:00Z"),
            duration_hours: 1,
            hourly_rate: Decimal::new(12_000, 2),
            total_price: Decimal::new(12_000, 2),
            awaiting: Awaiting::Confirmation,
            created_at: parse_ts("2026-10-18T12:00:00Z"),
        };
        repo.put(quote.clone()).await.expect("put");

        let (left, right) = tokio::join!(repo.take(&quote.sender), repo.take(&quote.sender));
        let winners = [left.expect("take"), right.expect("take")]
            .into_iter()
            .filter(Option::is_some)
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn in_memory_courts_list_in_name_order() {
        let repo = InMemoryCourtRepository::default();
        for court in crate::fixtures::demo_courts().into_iter().rev() {
            repo.save(court).await.expect("save court");
        }

        let names = repo
            .list_all()
            .await
            .expect("list")
            .into_iter()
            .map(|court| court.name)
            .collect::<Vec<_>>();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
