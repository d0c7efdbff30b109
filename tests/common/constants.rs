//! Shared constants for end-to-end tests
//!
//! When test data changes (user credentials, names, timeouts),
//! update only this file.

// ============================================================================
// Test User Credentials
// ============================================================================

/// User created in every test server
pub const TEST_USER: &str = "testuser";

/// Password of TEST_USER
pub const TEST_PASS: &str = "testpass123";

/// Second user, for favorites and ownership
pub const OTHER_USER: &str = "otheruser";

/// Password of OTHER_USER
pub const OTHER_PASS: &str = "otherpass123";

// ============================================================================
// Seeded Library Names
// ============================================================================

pub const ARTIST_1_NAME: &str = "The Test Band";

pub const ARTIST_2_NAME: &str = "Jazz Ensemble";

pub const ALBUM_1_NAME: &str = "First Album";

pub const PLAYLIST_1_NAME: &str = "Road Trip";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Hostname the self-signed test certificates are issued for
pub const TLS_HOSTNAME: &str = "localhost";
