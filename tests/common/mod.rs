//! Common test utilities for blog-migrate integration tests

#[allow(dead_code)]
pub mod config;
#[allow(dead_code)]
pub mod fixtures;

pub use config::*;
pub use fixtures::*;
