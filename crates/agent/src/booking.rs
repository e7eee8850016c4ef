//! Quote, confirm and cancel against the court calendar.
//!
//! Side effects on the negotiation store are driven by the actions of the
//! `NegotiationFlow` transition, so every state change is also an audit event.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use courtside_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use courtside_core::availability::{check_block, free_hours, local_day_bounds, BookingPolicy};
use courtside_core::clock::Clock;
use courtside_core::domain::court::Court;
use courtside_core::domain::negotiation::{Awaiting, NegotiationState, PendingNegotiation};
use courtside_core::domain::reservation::{Reservation, ReservationId, ReservationStatus};
use courtside_core::domain::user::PhoneNumber;
use courtside_core::errors::{BookingError, NotFoundKind, ValidationIssue};
use courtside_core::flows::{
    FlowAction, FlowEngine, FlowEvent, FlowState, NegotiationFlow, NegotiationTransitionError,
};
use courtside_core::text::{contains_phrase, words};
use courtside_db::repositories::{
    CommitOutcome, CourtRepository, NegotiationRepository, RepositoryError, ReservationRepository,
};

use crate::conversation::BookingRequest;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    NothingPending,
    Confirmed { reservation: Reservation, court_name: String },
    Unavailable { hours: Vec<DateTime<Utc>> },
}

/// What re-validating a taken quote against the store produced.
enum Settlement {
    Committed(Reservation),
    Rejected(BookingError),
}

pub struct BookingService {
    courts: Arc<dyn CourtRepository>,
    reservations: Arc<dyn ReservationRepository>,
    negotiations: Arc<dyn NegotiationRepository>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    policy: BookingPolicy,
    engine: FlowEngine<NegotiationFlow>,
}

impl BookingService {
    pub fn new(
        courts: Arc<dyn CourtRepository>,
        reservations: Arc<dyn ReservationRepository>,
        negotiations: Arc<dyn NegotiationRepository>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            courts,
            reservations,
            negotiations,
            clock,
            audit,
            policy,
            engine: FlowEngine::default(),
        }
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    pub async fn state_of(&self, sender: &PhoneNumber) -> Result<NegotiationState, BookingError> {
        let pending = self.negotiations.find(sender).await.map_err(dependency)?;
        Ok(NegotiationState::from_pending(pending))
    }

    pub async fn catalog(&self) -> Result<Vec<Court>, BookingError> {
        self.courts.list_all().await.map_err(dependency)
    }

    /// Prices the first free court matching the request and stores the quote,
    /// replacing any outstanding one.
    pub async fn quote(
        &self,
        sender: &PhoneNumber,
        request: &BookingRequest,
        audit: &AuditContext,
    ) -> Result<PendingNegotiation, BookingError> {
        let start = request.start(self.policy.offset)?;
        self.policy.check_duration(request.duration_hours)?;

        let now = self.clock.now();
        let court = self.resolve_court(request, start, now).await?;
        let total_price = court.price_for(request.duration_hours);
        let pending = PendingNegotiation {
            sender: sender.clone(),
            court_id: court.id.clone(),
            court_name: court.name.clone(),
            start,
            duration_hours: request.duration_hours,
            hourly_rate: court.hourly_rate,
            total_price,
            awaiting: Awaiting::Confirmation,
            created_at: now,
        };

        let current = FlowState::from(&self.state_of(sender).await?);
        let outcome = self
            .engine
            .apply_with_audit(current, FlowEvent::QuoteIssued, &*self.audit, audit)
            .map_err(transition_error)?;
        self.run_actions(&outcome.actions, sender, Some(&pending)).await.map_err(dependency)?;

        tracing::info!(
            event_name = "negotiation.quoted",
            correlation_id = %audit.correlation_id,
            sender = %sender,
            court_id = %pending.court_id.0,
            start = %pending.start,
            duration_hours = pending.duration_hours,
            total_price = %pending.total_price,
            "quote issued"
        );
        Ok(pending)
    }

    /// Takes the sender's quote and commits it. A quote can be taken once, so
    /// two concurrent confirmations never both reach the ledger.
    pub async fn confirm(
        &self,
        sender: &PhoneNumber,
        audit: &AuditContext,
    ) -> Result<ConfirmOutcome, BookingError> {
        let Some(pending) = self.negotiations.take(sender).await.map_err(dependency)? else {
            // the engine rejects an Idle commit and audits the rejection
            if let Err(error) = self.engine.apply_with_audit(
                FlowState::Idle,
                FlowEvent::CommitSucceeded,
                &*self.audit,
                audit,
            ) {
                tracing::debug!(
                    event_name = "negotiation.nothing_to_confirm",
                    correlation_id = %audit.correlation_id,
                    sender = %sender,
                    reason = %error,
                    "confirmation without an outstanding quote"
                );
            }
            return Ok(ConfirmOutcome::NothingPending);
        };

        let settlement = self.settle(&pending).await;
        let event = match &settlement {
            Ok(Settlement::Committed(_)) => FlowEvent::CommitSucceeded,
            Ok(Settlement::Rejected(_)) => FlowEvent::CommitConflicted,
            Err(_) => FlowEvent::CommitFailed,
        };
        let outcome = self
            .engine
            .apply_with_audit(FlowState::Offered, event, &*self.audit, audit)
            .map_err(transition_error)?;
        if let Err(error) = self.run_actions(&outcome.actions, sender, Some(&pending)).await {
            tracing::error!(
                event_name = "negotiation.restore_failed",
                correlation_id = %audit.correlation_id,
                sender = %sender,
                error = %error,
                "could not put the quote back after a failed commit"
            );
        }

        match settlement {
            Ok(Settlement::Committed(reservation)) => {
                self.audit.emit(
                    AuditEvent::new(
                        audit,
                        "reservation.committed",
                        AuditCategory::Reservation,
                        AuditOutcome::Success,
                    )
                    .with_metadata("reference", reservation.id.0.clone())
                    .with_metadata("court_id", reservation.court_id.0.clone()),
                );
                Ok(ConfirmOutcome::Confirmed { reservation, court_name: pending.court_name })
            }
            Ok(Settlement::Rejected(BookingError::Conflict { hours })) => {
                tracing::info!(
                    event_name = "reservation.conflict",
                    correlation_id = %audit.correlation_id,
                    sender = %sender,
                    court_id = %pending.court_id.0,
                    "slot was taken before confirmation"
                );
                Ok(ConfirmOutcome::Unavailable { hours })
            }
            Ok(Settlement::Rejected(error)) => Err(error),
            Err(error) => {
                self.audit.emit(
                    AuditEvent::new(
                        audit,
                        "reservation.commit_failed",
                        AuditCategory::Reservation,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("court_id", pending.court_id.0.clone())
                    .with_metadata("error", error.to_string()),
                );
                Err(dependency(error))
            }
        }
    }

    async fn settle(&self, pending: &PendingNegotiation) -> Result<Settlement, RepositoryError> {
        let Some(court) = self.courts.find_by_id(&pending.court_id).await? else {
            return Ok(Settlement::Rejected(BookingError::NotFound(NotFoundKind::Court(
                pending.court_name.clone(),
            ))));
        };

        let now = self.clock.now();
        let booked = self.booked_around(&court, pending.start, pending.duration_hours).await?;
        if let Err(error) =
            check_block(&self.policy, &court, pending.start, pending.duration_hours, &booked, now)
        {
            return Ok(Settlement::Rejected(error));
        }

        let reservation = Reservation {
            id: ReservationId::generate(),
            user_phone: pending.sender.clone(),
            court_id: court.id.clone(),
            start: pending.start,
            duration_hours: pending.duration_hours,
            status: ReservationStatus::Confirmed,
            created_at: now,
        };
        Ok(match self.reservations.commit_if_free(reservation).await? {
            CommitOutcome::Committed(reservation) => Settlement::Committed(reservation),
            CommitOutcome::Conflict { hours } => {
                Settlement::Rejected(BookingError::Conflict { hours })
            }
        })
    }

    /// Drops the outstanding quote, if any. Returns whether there was one.
    /// The quote is taken atomically, so a quote stored after this call
    /// started is never the one discarded.
    pub async fn cancel_pending(
        &self,
        sender: &PhoneNumber,
        audit: &AuditContext,
    ) -> Result<bool, BookingError> {
        let state =
            NegotiationState::from_pending(self.negotiations.take(sender).await.map_err(dependency)?);
        let outcome = self
            .engine
            .apply_with_audit(FlowState::from(&state), FlowEvent::CancelRequested, &*self.audit, audit)
            .map_err(transition_error)?;
        // ClearNegotiation is already satisfied by the take
        let follow_up = outcome
            .actions
            .into_iter()
            .filter(|action| *action != FlowAction::ClearNegotiation)
            .collect::<Vec<_>>();
        self.run_actions(&follow_up, sender, state.quote()).await.map_err(dependency)?;
        Ok(state.is_offered())
    }

    /// Cancels one of the sender's confirmed reservations, named either by
    /// reference or by its local date and start hour.
    pub async fn cancel_reservation(
        &self,
        sender: &PhoneNumber,
        request: &BookingRequest,
        audit: &AuditContext,
    ) -> Result<Reservation, BookingError> {
        let target = match &request.reference {
            Some(reference) => self
                .reservations
                .find_by_id(reference)
                .await
                .map_err(dependency)?
                .filter(|reservation| {
                    &reservation.user_phone == sender
                        && reservation.status == ReservationStatus::Confirmed
                })
                .ok_or_else(|| BookingError::NotFound(NotFoundKind::Reservation(reference.0.clone())))?,
            None => {
                let start = request.start(self.policy.offset)?;
                self.reservations
                    .list_for_user(sender)
                    .await
                    .map_err(dependency)?
                    .into_iter()
                    .find(|reservation| {
                        reservation.start == start
                            && reservation.status == ReservationStatus::Confirmed
                    })
                    .ok_or_else(|| {
                        let local = start.with_timezone(&self.policy.offset);
                        BookingError::NotFound(NotFoundKind::Reservation(
                            local.format("%d/%m às %H:%M").to_string(),
                        ))
                    })?
            }
        };

        if !self.reservations.cancel(&target.id).await.map_err(dependency)? {
            return Err(BookingError::NotFound(NotFoundKind::Reservation(target.id.0.clone())));
        }

        let mut cancelled = target;
        cancelled
            .transition_to(ReservationStatus::Cancelled)
            .map_err(|error| BookingError::Dependency(error.to_string()))?;
        self.audit.emit(
            AuditEvent::new(
                audit,
                "reservation.cancelled",
                AuditCategory::Reservation,
                AuditOutcome::Success,
            )
            .with_metadata("reference", cancelled.id.0.clone()),
        );
        Ok(cancelled)
    }

    /// Non-cancelled reservations of the sender with their court names, earliest first.
    pub async fn list_mine(
        &self,
        sender: &PhoneNumber,
    ) -> Result<Vec<(Reservation, String)>, BookingError> {
        let names = self
            .catalog()
            .await?
            .into_iter()
            .map(|court| (court.id, court.name))
            .collect::<HashMap<_, _>>();
        let reservations = self.reservations.list_for_user(sender).await.map_err(dependency)?;

        Ok(reservations
            .into_iter()
            .map(|reservation| {
                let name =
                    names.get(&reservation.court_id).cloned().unwrap_or_else(|| reservation.court_id.0.clone());
                (reservation, name)
            })
            .collect())
    }

    /// Free one-hour starts per court on a local date, optionally for one sport.
    pub async fn availability(
        &self,
        date: NaiveDate,
        sport: Option<&str>,
    ) -> Result<Vec<(Court, Vec<u32>)>, BookingError> {
        let (from, to) = local_day_bounds(self.policy.offset, date)
            .ok_or(BookingError::Validation(ValidationIssue::InvalidDate))?;
        let now = self.clock.now();

        let mut report = Vec::new();
        for court in self.catalog().await? {
            if sport.is_some_and(|keyword| !court.plays(keyword)) {
                continue;
            }
            let booked = self
                .reservations
                .list_confirmed_for_court(&court.id, from, to)
                .await
                .map_err(dependency)?;
            let hours = free_hours(&self.policy, &court, date, &booked, now);
            report.push((court, hours));
        }

        if report.is_empty() {
            if let Some(keyword) = sport {
                return Err(BookingError::NotFound(NotFoundKind::Sport(keyword.to_string())));
            }
        }
        Ok(report)
    }

    /// Narrows the catalog by `quadra N` or sport, then takes the first court
    /// in name order that can hold the block.
    async fn resolve_court(
        &self,
        request: &BookingRequest,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Court, BookingError> {
        let courts = self.catalog().await?;

        let candidates = if let Some(number) = request.court_hint {
            let label = format!("quadra {number}");
            let named = courts
                .into_iter()
                .filter(|court| contains_phrase(&words(&court.name), &label))
                .collect::<Vec<_>>();
            if named.is_empty() {
                return Err(BookingError::NotFound(NotFoundKind::Court(format!("Quadra {number}"))));
            }
            named
        } else if let Some(sport) = request.sport {
            let playing = courts.into_iter().filter(|court| court.plays(sport)).collect::<Vec<_>>();
            if playing.is_empty() {
                return Err(BookingError::NotFound(NotFoundKind::Sport(sport.to_string())));
            }
            playing
        } else {
            courts
        };

        if candidates.is_empty() {
            return Err(BookingError::Validation(ValidationIssue::MissingCourt));
        }

        let mut conflict = None;
        let mut other = None;
        for court in candidates {
            let booked = self
                .booked_around(&court, start, request.duration_hours)
                .await
                .map_err(dependency)?;
            match check_block(&self.policy, &court, start, request.duration_hours, &booked, now) {
                Ok(()) => return Ok(court),
                Err(error @ BookingError::Validation(_)) => return Err(error),
                Err(error @ BookingError::Conflict { .. }) => {
                    conflict.get_or_insert(error);
                }
                Err(error) => {
                    other.get_or_insert(error);
                }
            }
        }

        Err(conflict.or(other).unwrap_or(BookingError::Validation(ValidationIssue::MissingCourt)))
    }

    async fn booked_around(
        &self,
        court: &Court,
        start: DateTime<Utc>,
        duration_hours: u32,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let end = start + Duration::hours(i64::from(duration_hours));
        self.reservations.list_confirmed_for_court(&court.id, start, end).await
    }

    async fn run_actions(
        &self,
        actions: &[FlowAction],
        sender: &PhoneNumber,
        pending: Option<&PendingNegotiation>,
    ) -> Result<(), RepositoryError> {
        for action in actions {
            match (action, pending) {
                (FlowAction::PersistNegotiation, Some(pending)) => {
                    self.negotiations.put(pending.clone()).await?;
                }
                (FlowAction::RestoreNegotiation, Some(pending)) => {
                    self.negotiations.restore(pending.clone()).await?;
                }
                (FlowAction::ClearNegotiation, _) => {
                    self.negotiations.clear(sender).await?;
                }
                // rendered by the caller
                _ => {}
            }
        }
        Ok(())
    }
}

fn dependency(error: RepositoryError) -> BookingError {
    BookingError::Dependency(error.to_string())
}

fn transition_error(error: NegotiationTransitionError) -> BookingError {
    BookingError::Dependency(error.to_string())
}
