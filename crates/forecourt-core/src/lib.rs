//! forecourt-core - Core types for the forecourt integration hub
//!
//! This crate provides the shared data model: discovered services and their
//! interface descriptions, the normalized endpoint catalog, canonical
//! operational records (fuel transactions and work orders), metric rollups,
//! and the realtime event shapes. It also carries the typed daemon
//! configuration.

pub mod config;
pub mod models;

pub use config::{
    CandidateService, DatabaseConfig, DiscoveryConfig, ForecourtConfig, PollingConfig,
    ServerConfig, StreamConfig,
};
pub use models::*;
