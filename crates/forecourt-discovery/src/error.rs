//! Discovery error types
//!
//! Expected unavailability (a service offline, a spec path 404ing) is status
//! data, not an error; these variants cover lookups against ids that were
//! never discovered and client construction failures.

use thiserror::Error;

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}
