//! forecourt-stream - Realtime broadcast hub
//!
//! Transport-agnostic subscriber registry with channel subscriptions, site
//! filtering, and a heartbeat sweep. The WebSocket layer bridges sockets to
//! the hub; tests can attach directly via [`StreamHub::connect`].

pub mod hub;

pub use hub::{should_deliver, ControlOutcome, OutboundMessage, StreamHub, SubscriberId, SweepStats};
