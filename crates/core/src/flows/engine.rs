use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::flows::states::{FlowAction, FlowEvent, FlowState, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> FlowState;
    fn transition(
        &self,
        current: FlowState,
        event: FlowEvent,
    ) -> Result<TransitionOutcome, NegotiationTransitionError>;
}

/// `Idle -> Offered -> Idle` lifecycle of one quote. Requests reach
/// `QuoteIssued` only once they carry a complete slot.
#[derive(Clone, Debug, Default)]
pub struct NegotiationFlow;

impl FlowDefinition for NegotiationFlow {
    fn initial_state(&self) -> FlowState {
        FlowState::Idle
    }

    fn transition(
        &self,
        current: FlowState,
        event: FlowEvent,
    ) -> Result<TransitionOutcome, NegotiationTransitionError> {
        transition_negotiation(current, event)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> FlowState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: FlowState,
        event: FlowEvent,
    ) -> Result<TransitionOutcome, NegotiationTransitionError> {
        self.flow.transition(current, event)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: FlowState,
        event: FlowEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, NegotiationTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "negotiation.transition_applied",
                        AuditCategory::Negotiation,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "negotiation.transition_rejected",
                        AuditCategory::Negotiation,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<NegotiationFlow> {
    fn default() -> Self {
        Self::new(NegotiationFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NegotiationTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
}

fn transition_negotiation(
    current: FlowState,
    event: FlowEvent,
) -> Result<TransitionOutcome, NegotiationTransitionError> {
    use FlowAction::{
        AcknowledgeCancel, ClearNegotiation, PersistNegotiation, ReportSlotUnavailable,
        RestoreNegotiation, SendQuote, SendReservationReference,
    };
    use FlowEvent::{
        CancelRequested, CommitConflicted, CommitFailed, CommitSucceeded, QuoteIssued,
    };
    use FlowState::{Idle, Offered};

    let (to, actions) = match (current, event) {
        (_, QuoteIssued) => (Offered, vec![PersistNegotiation, SendQuote]),
        (Offered, CommitSucceeded) => (Idle, vec![SendReservationReference]),
        (Offered, CommitConflicted) => (Idle, vec![ReportSlotUnavailable]),
        (Offered, CommitFailed) => (Offered, vec![RestoreNegotiation]),
        (Offered, CancelRequested) => (Idle, vec![ClearNegotiation, AcknowledgeCancel]),
        (Idle, CancelRequested) => (Idle, vec![AcknowledgeCancel]),
        (Idle, CommitSucceeded | CommitConflicted | CommitFailed) => {
            return Err(NegotiationTransitionError::InvalidTransition { state: current, event });
        }
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}
