pub mod court;
pub mod negotiation;
pub mod reservation;
pub mod session;
pub mod user;
