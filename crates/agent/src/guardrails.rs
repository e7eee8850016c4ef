use crate::llm::SuggestedAction;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailIntent {
    RequestQuote { raw_text: String },
    CommitReservation,
    CancelReservation,
}

impl GuardrailIntent {
    pub fn from_suggestion(action: SuggestedAction, raw_text: &str) -> Self {
        match action {
            SuggestedAction::RequestQuote => Self::RequestQuote { raw_text: raw_text.to_string() },
            SuggestedAction::CommitReservation => Self::CommitReservation,
            SuggestedAction::CancelReservation => Self::CancelReservation,
        }
    }

    pub fn action_key(&self) -> &'static str {
        match self {
            Self::RequestQuote { .. } => "booking.request_quote",
            Self::CommitReservation => "booking.commit",
            Self::CancelReservation => "booking.cancel",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, fallback_path: &'static str },
}

/// What the language model may trigger on its own. Quotes go through the
/// same deterministic availability check as typed requests; commits and
/// cancellations always need the user's own words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub llm_can_request_quotes: bool,
    pub llm_can_commit: bool,
    pub llm_can_cancel: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { llm_can_request_quotes: true, llm_can_commit: false, llm_can_cancel: false }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, intent: &GuardrailIntent) -> GuardrailDecision {
        match intent {
            GuardrailIntent::RequestQuote { .. } if self.llm_can_request_quotes => {
                GuardrailDecision::Allow
            }
            GuardrailIntent::RequestQuote { .. } => GuardrailDecision::Deny {
                reason_code: "llm_quotes_disabled",
                fallback_path: "typed_booking_request",
            },
            GuardrailIntent::CommitReservation => GuardrailDecision::Deny {
                reason_code: if self.llm_can_commit {
                    "commit_requires_user_confirmation"
                } else {
                    "llm_commit_disallowed"
                },
                fallback_path: "user_confirmation",
            },
            GuardrailIntent::CancelReservation => GuardrailDecision::Deny {
                reason_code: if self.llm_can_cancel {
                    "cancel_requires_user_request"
                } else {
                    "llm_cancel_disallowed"
                },
                fallback_path: "user_cancellation",
            },
        }
    }
}
