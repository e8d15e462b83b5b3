//! THERMOBRIDGE: real-time co-simulation bridge
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod state;
pub mod device;
pub mod simulation;
pub mod engine;
pub mod status;
pub mod api;
