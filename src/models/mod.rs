//! Data models for the message library

mod message;

pub use message::*;
