//! CreatorOS message library
//!
//! Client-side message history shared by the creator network and library
//! views. History is kept in a local key-value store and mirrored, best
//! effort, to an external record store.

pub mod api;
pub mod config;
pub mod library;
pub mod models;
pub mod storage;
pub mod sync;

pub use library::MessageLibrary;
pub use models::{
    normalize, validate, MessageDirection, MessageRecord, MessageSource, NewMessage,
    ParticipantRole, Rejection,
};
