//! Axum middleware layers applied to the router.
//!
//! Includes request tracing, timeout enforcement, body size limits, and
//! response compression.

use std::time::Duration;

/// Default per-request timeout applied to all routes.
/// Must exceed `SIGNING_TIMEOUT_SECS`.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Largest accepted request body. Sierra classes sent to `declare` often
/// exceed axum's 2 MiB default.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
