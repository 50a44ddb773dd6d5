//! Domain entities for the database layer

pub mod message;

pub use message::{ChatMessage, NewMessage};
