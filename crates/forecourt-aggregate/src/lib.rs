//! forecourt-aggregate - Turns polled payloads into canonical records and metrics
//!
//! The poller drives registered catalog endpoints on their configured
//! intervals, pushes raw payloads through the field mapping engine and the
//! domain converters into the record store, and feeds the realtime hub.
//! The metrics service derives period rollups from the stored records on
//! demand, behind a time-expiring cache.

pub mod convert;
pub mod error;
pub mod health;
pub mod mapping;
pub mod metrics;
pub mod poller;

pub use error::PollError;
pub use metrics::MetricsService;
pub use poller::Poller;
