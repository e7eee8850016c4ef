pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, NegotiationFlow, NegotiationTransitionError};
pub use states::{FlowAction, FlowEvent, FlowState, TransitionOutcome};
