//! Thin asynchronous HTTP + JSON request executor.
//!
//! # Overview
//! `NetworkService` turns a URL string, optional headers and an optional JSON
//! body into a request, hands it to a `Transport`, checks the outcome and
//! delivers a `Result` to a completion callback exactly once. Three modes
//! share the pipeline: `fetch_typed` (GET + JSON decode), `post_typed`
//! (POST a JSON body + JSON decode) and `fetch_raw` (GET, bytes as-is).
//!
//! # Design
//! - The executor is stateless; the transport owns the network session.
//! - `build_*` / `parse_*` halves are pure, so validation is testable
//!   without a socket.
//! - Successes are marshaled onto a `CallbackContext`; failures run where
//!   they are detected unless `DeliveryPolicy::AllOnContext` is chosen.
//! - No retries, cancellation, caching or streaming.

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod transport;

pub use client::{Completion, DeliveryPolicy, NetworkService};
pub use config::TransportConfig;
pub use context::{CallbackContext, Inline, Job, MainLoop, MainQueue};
pub use error::{NetworkError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, TransportOutcome};
pub use transport::{OnComplete, Transport, UreqTransport};
