//! LINE channel access token: assertion signing, exchange, and the
//! cached credential lifecycle.

pub mod assertion;
pub mod error;
pub mod exchange;
pub mod manager;
pub mod signing_key;
