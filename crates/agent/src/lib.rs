//! Booking agent runtime - turns WhatsApp messages into court reservations
//!
//! This crate is the conversational layer of courtside. For every inbound
//! message it:
//! - Records the turn in the sender's time-windowed session history
//! - Classifies intent against the sender's negotiation state
//! - Extracts a structured booking request from free text
//! - Quotes, confirms or cancels through the booking service
//! - Falls back to a bounded LLM call for anything it cannot classify
//!
//! # Architecture
//!
//! The runtime follows a constrained loop:
//! 0. **Serialization** (`locks`) - one turn at a time per sender
//! 1. **History** (`history`) - append the turn, detect session boundaries
//! 2. **Extraction** (`conversation`) - text into `BookingRequest`
//! 3. **Negotiation** (`booking`) - availability check, quote, atomic commit
//! 4. **Fallback** (`fallback`, `llm`) - model reply under a hard deadline
//! 5. **Guardrails** (`guardrails`) - what a model suggestion may trigger
//!
//! # Safety Principle
//!
//! The LLM is strictly a conversationalist. It NEVER decides prices,
//! availability or commits. A suggested quote runs through the same
//! deterministic path as a typed request.

pub mod booking;
pub mod conversation;
pub mod fallback;
pub mod guardrails;
pub mod history;
pub mod llm;
pub mod locks;
pub mod replies;
pub mod runtime;

pub use booking::{BookingService, ConfirmOutcome};
pub use conversation::{BookingRequest, RequestExtractor};
pub use llm::{build_llm_client, LlmClient, LlmReply, SuggestedAction};
pub use runtime::{AgentDeps, AgentRuntime, RuntimeSettings, TurnInput};
