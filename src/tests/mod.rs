#[cfg(test)]
pub mod common;

mod config_validation;
