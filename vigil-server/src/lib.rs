//! # Vigil Server
//!
//! Loopback HTTP/WebSocket façade over the Vigil core: dashboards,
//! timeline, tag/rule administration, focus enforcement endpoints, data
//! transfer, and the activity-update stream. The binary in `main.rs`
//! supervises the whole daemon: store, URL ingester, monitor loop and
//! this API.

/// Error types and HTTP mapping
pub mod errors;

/// Request handlers, one module per surface
pub mod handlers;

/// Application state and startup wiring
pub mod infra;

/// Route table
pub mod routes;

/// Activity-update WebSocket
pub mod ws;
