//! HTTP and WebSocket server for the ringside betting platform.
//!
//! The binary in `main.rs` is the composition root; this library exposes the
//! router and configuration so integration tests can drive them directly.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
