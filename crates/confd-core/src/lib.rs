//! Decision engine of the router control plane
//!
//! Answers the questions a SIP proxy asks per call: who is calling
//! ([`auth`]), where the call goes ([`routing`]) and what to record once it
//! ends ([`cdr`]). Tenant configuration is read through the
//! [`store::ConfigAccessor`] trait and decisions are memoized by the
//! [`cache::DecisionCache`].
//!
//! ```no_run
//! # async fn example() -> confd_core::Result<()> {
//! use std::sync::Arc;
//! use confd_core::routing::{RoutingEngine, RoutingRequest};
//! use confd_core::store::SqliteConfigStore;
//!
//! let store = Arc::new(SqliteConfigStore::new("sqlite://router.db?mode=rwc").await?);
//! let engine = RoutingEngine::new(store);
//! let response = engine
//!     .decide(&RoutingRequest {
//!         from_uri: "sip:100@testdomain.com".into(),
//!         to_uri: "sip:200@testdomain.com".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("{}", response.rtjson.success);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod cdr;
pub mod credentials;
pub mod error;
pub mod normalization;
pub mod prefix;
pub mod routing;
pub mod store;
pub mod types;
pub mod uacreg;
pub mod uri;

pub use error::{Error, Result};
