//! Shared types for the messaging core

pub mod errors;
pub mod events;

pub use errors::{MessagingError, RejectReason};
pub use events::{ClientEvent, ServerEvent, WireMessage};

pub type MessagingResult<T> = Result<T, MessagingError>;
