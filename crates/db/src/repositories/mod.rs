use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use courtside_core::domain::court::{Court, CourtId};
use courtside_core::domain::negotiation::PendingNegotiation;
use courtside_core::domain::reservation::{Reservation, ReservationId};
use courtside_core::domain::session::ConversationSession;
use courtside_core::domain::user::{PhoneNumber, User};

pub mod conversation;
pub mod court;
pub mod memory;
pub mod negotiation;
pub mod reservation;
pub mod user;

pub use conversation::SqlConversationRepository;
pub use court::SqlCourtRepository;
pub use memory::{
    InMemoryConversationRepository, InMemoryCourtRepository, InMemoryNegotiationRepository,
    InMemoryReservationRepository, InMemoryUserRepository,
};
pub use negotiation::SqlNegotiationRepository;
pub use reservation::SqlReservationRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result of an atomic check-and-insert of a confirmed reservation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(Reservation),
    /// Another confirmed reservation already holds at least one of these hours.
    Conflict { hours: Vec<DateTime<Utc>> },
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, RepositoryError>;

    /// Returns the stored user, registering it with the default display name on first contact.
    async fn find_or_create(
        &self,
        phone: &PhoneNumber,
        now: DateTime<Utc>,
    ) -> Result<User, RepositoryError>;

    async fn update_display_name(
        &self,
        phone: &PhoneNumber,
        display_name: &str,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait CourtRepository: Send + Sync {
    /// All courts ordered by name.
    async fn list_all(&self) -> Result<Vec<Court>, RepositoryError>;
    async fn find_by_id(&self, id: &CourtId) -> Result<Option<Court>, RepositoryError>;
    async fn save(&self, court: Court) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Inserts `reservation` as confirmed unless a confirmed reservation on the
    /// same court overlaps it. The check and the insert are a single step.
    async fn commit_if_free(&self, reservation: Reservation)
        -> Result<CommitOutcome, RepositoryError>;

    async fn find_by_id(&self, id: &ReservationId)
        -> Result<Option<Reservation>, RepositoryError>;

    /// Non-cancelled reservations for a user, earliest first.
    async fn list_for_user(&self, phone: &PhoneNumber)
        -> Result<Vec<Reservation>, RepositoryError>;

    /// Confirmed reservations on a court that intersect `[from, to)`.
    async fn list_confirmed_for_court(
        &self,
        court_id: &CourtId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, RepositoryError>;

    /// Moves a confirmed reservation to cancelled. `false` when it was not confirmed.
    async fn cancel(&self, id: &ReservationId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait NegotiationRepository: Send + Sync {
    async fn find(&self, sender: &PhoneNumber)
        -> Result<Option<PendingNegotiation>, RepositoryError>;

    /// Stores the quote, replacing any previous one for the sender.
    async fn put(&self, negotiation: PendingNegotiation) -> Result<(), RepositoryError>;

    /// Removes and returns the sender's quote. Of two concurrent callers at most one gets it.
    async fn take(&self, sender: &PhoneNumber)
        -> Result<Option<PendingNegotiation>, RepositoryError>;

    async fn clear(&self, sender: &PhoneNumber) -> Result<bool, RepositoryError>;

    /// Puts a taken quote back unless a newer one was stored in the meantime.
    async fn restore(&self, negotiation: PendingNegotiation) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn load(&self, sender: &PhoneNumber)
        -> Result<Option<ConversationSession>, RepositoryError>;
    async fn save(&self, session: ConversationSession) -> Result<(), RepositoryError>;
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_unix(column: &str, value: i64) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::from_timestamp(value, 0).ok_or_else(|| {
        RepositoryError::Decode(format!("invalid unix timestamp in `{column}`: {value}"))
    })
}

pub(crate) fn parse_decimal(
    column: &str,
    value: String,
) -> Result<rust_decimal::Decimal, RepositoryError> {
    value
        .parse::<rust_decimal::Decimal>()
        .map_err(|error| RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})")))
}
