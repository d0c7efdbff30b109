//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestServer;
//!
//! #[tokio::test]
//! async fn test_read_artist() {
//!     let server = TestServer::spawn().await;
//!     let client = server.library_client().await;
//!
//!     let artist = client.read_artist(&server.seeded.band_id).await.unwrap();
//!     assert_eq!(artist.meta.name, common::ARTIST_1_NAME);
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use client::{error_code, TestClient};
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::SeededLibrary;
#[allow(unused_imports)]
pub use server::{TestCertificate, TestServer};
