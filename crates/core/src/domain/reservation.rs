use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::court::CourtId;
use crate::domain::user::PhoneNumber;
use crate::errors::DomainError;

/// Human-facing reservation reference, e.g. `R-1A2B3C4D`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReservationId(pub String);

impl ReservationId {
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(format!("R-{}", raw[..8].to_ascii_uppercase()))
    }

    /// Recognizes a reference typed by a user (`r-1a2b3c4d`).
    pub fn parse(token: &str) -> Option<Self> {
        let upper = token.trim().to_ascii_uppercase();
        let suffix = upper.strip_prefix("R-")?;
        let valid = suffix.len() == 8 && suffix.chars().all(|c| c.is_ascii_hexdigit());
        valid.then(|| Self(upper))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub user_phone: PhoneNumber,
    pub court_id: CourtId,
    pub start: DateTime<Utc>,
    pub duration_hours: u32,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::hours(i64::from(self.duration_hours))
    }

    /// Half-open interval overlap against `[start, start + duration_hours)`.
    pub fn overlaps(&self, start: DateTime<Utc>, duration_hours: u32) -> bool {
        let end = start + Duration::hours(i64::from(duration_hours));
        self.start < end && start < self.end()
    }

    pub fn blocks_slot(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        matches!(
            (self.status, next),
            (ReservationStatus::Pending, ReservationStatus::Confirmed)
                | (ReservationStatus::Confirmed, ReservationStatus::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: ReservationStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidReservationTransition { from: self.status, to: next })
    }
}
