//! forecourt-discovery - Finds backend services and catalogs their APIs
//!
//! The discovery pipeline has three stages, each usable on its own and
//! chained by [`DiscoveryService::full_discovery`]:
//!
//! 1. probe - is each configured candidate reachable?
//! 2. fetch - pull and validate its interface description
//! 3. map - normalize the description into an endpoint catalog

pub mod error;
pub mod fetch;
pub mod mapper;
pub mod probe;
pub mod service;

pub use error::{DiscoveryError, DiscoveryResult};
pub use service::{DiscoveryService, FullDiscovery};
