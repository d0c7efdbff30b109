//! Pezzottify Library
//!
//! A music library store with a timestamp based change feed, the REST server
//! exposing it and a client keeping a local replica in sync.

pub mod client;
pub mod config;
pub mod library_store;
pub mod replica;
pub mod server;
pub mod sqlite_persistence;
pub mod user;

// Re-export commonly used types for convenience
pub use client::{ClientConfig, ClientError, LibraryClient};
pub use library_store::{LibraryStore, SqliteLibraryStore, StoreError};
pub use replica::{LocalDb, LocalReplica};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
