// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # llmgate Upstream
//!
//! Transport layer between the gateway and upstream chat-completion
//! providers.
//!
//! Every provider speaks the same request/response shape, so there is a
//! single HTTP adapter. What differs per provider family (auth header,
//! which generation parameters are accepted) lives in a [`WireDialect`]
//! selected from the provider's [`ProviderFamily`](llmgate_core::ProviderFamily).
//!
//! ## Key Types
//!
//! - [`ChatCompletion`] - The capability the router and harness call
//! - [`HttpChatClient`] - The HTTP implementation of that capability
//! - [`Exchange`] - One call with its redacted request and raw response
//! - [`UpstreamError`] - Classified failure with status and elapsed time
//! - [`RetryStrategy`] - Backoff policy for same-provider retries
//!
//! The adapter never touches registry or ledger state.

pub mod adapter;
pub mod dialect;
pub mod error;
pub mod http;
pub mod retry;

pub use adapter::{ChatCompletion, Exchange, HttpChatClient, InboundResponse, OutboundRequest};
pub use dialect::{
    LocalDialect, OpenAiDialect, ParsedCompletion, ReasoningDialect, WireDialect, dialect_for,
    error_message, parse_completion,
};
pub use error::{HttpError, UpstreamError, classify_status};
pub use http::{HttpClient, RawResponse};
pub use retry::RetryStrategy;
