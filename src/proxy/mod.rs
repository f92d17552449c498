pub mod error;
pub mod forward;
