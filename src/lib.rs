pub mod app;
pub mod archival;
pub mod cli;
pub mod config;
pub mod context;
pub mod core;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod staleness;
pub mod storage;
pub mod test_utils;

pub use error::{DsrError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
