//! Entity definitions for durable storage

pub mod message;

pub use message::{ChatMessage, MessageKind, NewMessage};
