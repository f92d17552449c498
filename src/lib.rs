//! # LINE Proxy Library
//!
//! Forwards API calls to the LINE Messaging API with a channel access token
//! attached. The token is issued by exchanging a self-signed JWT assertion,
//! cached in a token store, and refreshed lazily, once per process, when it
//! gets within the safety margin of its expiry.
//!
//! Modules:
//! - `config`: service configuration, loading and validation
//! - `cache`: credential record, freshness, and token store backends
//! - `secrets`: secret provider backends (env, files, Secret Manager)
//! - `line`: assertion signing, token exchange, access token manager
//! - `proxy`: inbound request forwarding
//! - `server`: axum application and lifecycle

pub mod cache;
pub mod config;
pub mod helpers;
pub mod line;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod secrets;
pub mod server;
pub mod sources;
pub mod tests;
pub mod utils;


pub use crate::config::settings::ServiceConfig;
pub use crate::line::error::CredentialError;
pub use crate::line::manager::AccessTokenManager;
