use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::reservation::ReservationStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid reservation transition from {from:?} to {to:?}")]
    InvalidReservationTransition { from: ReservationStatus, to: ReservationStatus },
}

/// What a booking request is missing or gets wrong.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingDate,
    MissingTime,
    MissingCourt,
    InvalidHour { hour: u32 },
    NotWholeHour { minute: u32 },
    DurationOutOfBounds { requested: u32, max: u32 },
    StartInPast,
    MisalignedStart,
    InvalidDate,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDate => f.write_str("missing date"),
            Self::MissingTime => f.write_str("missing time"),
            Self::MissingCourt => f.write_str("missing court"),
            Self::InvalidHour { hour } => write!(f, "invalid hour {hour}"),
            Self::NotWholeHour { minute } => write!(f, "start minute {minute} is not on the hour"),
            Self::DurationOutOfBounds { requested, max } => {
                write!(f, "duration {requested}h outside 1..={max}")
            }
            Self::StartInPast => f.write_str("start is in the past"),
            Self::MisalignedStart => f.write_str("start is not aligned to the hour"),
            Self::InvalidDate => f.write_str("invalid calendar date"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotFoundKind {
    Court(String),
    Sport(String),
    Reservation(String),
}

impl std::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Court(name) => write!(f, "court `{name}`"),
            Self::Sport(sport) => write!(f, "sport `{sport}`"),
            Self::Reservation(reference) => write!(f, "reservation `{reference}`"),
        }
    }
}

/// Outcome taxonomy of the booking negotiation. Everything except
/// `Dependency` is recovered locally into a user-facing reply.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(ValidationIssue),
    #[error("requested hours fall outside operating hours {open_hour:02}h-{close_hour:02}h")]
    OutsideOperatingHours { open_hour: u32, close_hour: u32 },
    #[error("not found: {0}")]
    NotFound(NotFoundKind),
    #[error("slot conflict at {hours:?}")]
    Conflict { hours: Vec<DateTime<Utc>> },
    #[error("dependency failure: {0}")]
    Dependency(String),
}

impl BookingError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Dependency(_))
    }

    /// Maps the outcome onto the HTTP-facing taxonomy: caller mistakes are
    /// bad requests, a failing store is a temporary outage.
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let message = self.to_string();
        if self.is_recoverable() {
            InterfaceError::BadRequest { message, correlation_id }
        } else {
            InterfaceError::ServiceUnavailable { message, correlation_id }
        }
    }
}

impl From<ValidationIssue> for BookingError {
    fn from(value: ValidationIssue) -> Self {
        Self::Validation(value)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
        }
    }
}
