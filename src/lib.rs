pub mod constants;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod metrics;
pub mod parser;
pub mod paths;
pub mod pipeline;

// Ports and use cases, and the adapters behind them
pub mod app;
pub mod infra;

pub use error::{RepackError, Stage};
