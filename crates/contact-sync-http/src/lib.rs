//! HTTP transport for contact-sync
//!
//! Connects [`contact_sync::CollectionReconciler`] to the hotel admin REST API:
//! - `config`: base URL, bearer token and timeouts, loadable from JSON or the environment
//! - `client`: [`HttpTransport`], a reqwest-backed [`contact_sync::ContactTransport`]

pub mod client;
pub mod config;

pub use client::HttpTransport;
pub use config::{ApiConfig, ENV_API_URL, ENV_TIMEOUT_SECS, ENV_TOKEN};
