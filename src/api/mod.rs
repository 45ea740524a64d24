//! Clients for external services

pub mod client;

pub use client::RecordStoreClient;
