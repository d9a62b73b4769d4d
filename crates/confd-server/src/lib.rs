//! Control-plane HTTP service for the SIP proxy
//!
//! Wires the [`confd_core`] decision engine to an axum router, loads the
//! layered configuration and owns process startup.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod startup;

pub use error::{Result, ServerError};
