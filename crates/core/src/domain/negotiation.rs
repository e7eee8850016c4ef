use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::court::CourtId;
use crate::domain::user::PhoneNumber;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Awaiting {
    Confirmation,
}

impl Awaiting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmation => "confirmation",
        }
    }
}

/// An outstanding quote for one sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNegotiation {
    pub sender: PhoneNumber,
    pub court_id: CourtId,
    pub court_name: String,
    pub start: DateTime<Utc>,
    pub duration_hours: u32,
    pub hourly_rate: Decimal,
    pub total_price: Decimal,
    pub awaiting: Awaiting,
    pub created_at: DateTime<Utc>,
}

impl PendingNegotiation {
    /// One-line description handed to the language model as context.
    pub fn describe(&self, offset: FixedOffset) -> String {
        let local = self.start.with_timezone(&offset);
        format!(
            "{} em {} às {}, {} hora(s), total R$ {:.2} (aguardando confirmação)",
            self.court_name,
            local.format("%d/%m/%Y"),
            local.format("%H:%M"),
            self.duration_hours,
            self.total_price
        )
    }
}

/// The single per-sender view of the negotiation lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    Offered(PendingNegotiation),
}

impl NegotiationState {
    pub fn from_pending(pending: Option<PendingNegotiation>) -> Self {
        match pending {
            Some(quote) => Self::Offered(quote),
            None => Self::Idle,
        }
    }

    pub fn is_offered(&self) -> bool {
        matches!(self, Self::Offered(_))
    }

    pub fn quote(&self) -> Option<&PendingNegotiation> {
        match self {
            Self::Offered(quote) => Some(quote),
            Self::Idle => None,
        }
    }
}
