//! Polling error types

use thiserror::Error;

/// Why a single poll tick failed.
///
/// Never propagates past the tick handler; recorded on the endpoint's
/// health counters instead.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
}
