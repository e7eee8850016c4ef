//! WhatsApp transport for courtside.
//!
//! - **Webhook** (`webhook`) - parses Twilio's inbound form post into an [`webhook::InboundMessage`]
//! - **Sender** (`sender`) - [`sender::MessageSender`] and its Twilio REST, no-op and recording implementations
//!
//! # Flow
//!
//! ```text
//! Twilio POST /webhook → InboundMessage → AgentRuntime → reply → MessageSender
//! ```
//!
//! Delivery failures are reported through [`sender::DeliveryReport`] and never retried here.

pub mod sender;
pub mod webhook;

pub use sender::{
    DeliveryReport, MessageSender, NoopSender, RecordingSender, TransportError, TwilioSender,
};
pub use webhook::{InboundDisposition, InboundForm, InboundMessage, EMPTY_TWIML};
