//! # Vigil Core
//!
//! The hard core of the Vigil activity-tracking daemon: the durable
//! activity store, the rule engine, the browser-URL ingester, the OS
//! probes, the sampling monitor loop, the focus enforcer and the notifier.
//!
//! The façade crate (`vigil-server`) owns the HTTP/WS surface and drives
//! this crate through [`store::Database`], [`monitor::MonitorHandle`] and
//! the reload hooks on [`engine::RuleEngine`] / [`focus::FocusEnforcer`].

pub mod engine;
pub mod error;
pub mod focus;
pub mod ingest;
pub mod loggen;
pub mod monitor;
pub mod notify;
pub mod probe;
pub mod store;
pub mod transfer;

pub use error::{CoreError, Result};
pub use store::Database;
