//! Shared constants for end-to-end tests
//!
//! When seeded test data changes, update only this file.

// ============================================================================
// Test User Credentials
// ============================================================================

/// Playlist owner in most scenarios
pub const TEST_USER: &str = "testuser";
pub const TEST_PASS: &str = "testpass123";

/// Second user, usually the collaborator
pub const OTHER_USER: &str = "otheruser";
pub const OTHER_PASS: &str = "otherpass123";

/// Third user that is never granted anything
pub const STRANGER_USER: &str = "stranger";
pub const STRANGER_PASS: &str = "strangerpass123";

// ============================================================================
// Seeded Catalog
// ============================================================================

pub const ALBUM_1_NAME: &str = "Ghost Stories";
pub const ALBUM_1_YEAR: i32 = 2014;

pub const SONG_1_TITLE: &str = "Magic";
pub const SONG_2_TITLE: &str = "Midnight";
pub const SONG_PERFORMER: &str = "Coldplay";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval when waiting for server readiness (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Request timeout for HTTP client (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 5;
