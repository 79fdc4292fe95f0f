// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # llmgate Gateway
//!
//! The request-serving side of llmgate.
//!
//! This crate provides:
//!
//! - **ChatRouter**: resolves a provider, retries, and falls back at most once
//! - **TestHarness**: single-provider diagnostics with full exchange capture
//! - **API**: the axum HTTP surface under `/api`
//! - **Serve**: binding, graceful shutdown and periodic usage flushing
//!
//! ## Usage
//!
//! ```ignore
//! use llmgate_gateway::{GatewayConfig, serve};
//!
//! let config = GatewayConfig::new(data_dir).with_bind("127.0.0.1:8787");
//! let handle = serve(&config).await?;
//! tokio::signal::ctrl_c().await?;
//! handle.shutdown().await?;
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod harness;
pub mod router;
pub mod serve;
pub mod state;

pub use config::{DEFAULT_BIND, DEFAULT_FLUSH_INTERVAL, DEFAULT_REQUEST_TIMEOUT, GatewayConfig};
pub use error::GatewayError;
pub use harness::{
    ChatCheck, ConnectionCheck, DEFAULT_TEST_MESSAGE, ErrorDetails, RawData, RawRequest,
    TestHarness, TestRequest, TestResult,
};
pub use router::ChatRouter;
pub use serve::{ServeHandle, serve, serve_with_gateway};
pub use state::Gateway;
