use serde::{Deserialize, Serialize};

use crate::domain::negotiation::NegotiationState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Idle,
    Offered,
}

impl From<&NegotiationState> for FlowState {
    fn from(value: &NegotiationState) -> Self {
        match value {
            NegotiationState::Idle => Self::Idle,
            NegotiationState::Offered(_) => Self::Offered,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    QuoteIssued,
    CommitSucceeded,
    CommitConflicted,
    CommitFailed,
    CancelRequested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    PersistNegotiation,
    SendQuote,
    ClearNegotiation,
    RestoreNegotiation,
    SendReservationReference,
    ReportSlotUnavailable,
    AcknowledgeCancel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowState,
    pub to: FlowState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}
