pub mod audit;
pub mod availability;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod intent;
pub mod text;

pub use availability::BookingPolicy;
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::court::{Court, CourtId, SlotModel};
pub use domain::negotiation::{NegotiationState, PendingNegotiation};
pub use domain::reservation::{Reservation, ReservationId, ReservationStatus};
pub use domain::session::{ConversationSession, TurnRole};
pub use domain::user::{PhoneNumber, User};
pub use errors::{BookingError, DomainError, InterfaceError, NotFoundKind, ValidationIssue};
pub use intent::{classify, Intent};
