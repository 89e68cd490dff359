//! The transport seam and its `ureq`-backed implementation.
//!
//! # Design
//! A `Transport` receives a finished `HttpRequest` and reports exactly one
//! `TransportOutcome` through a boxed callback, on whatever thread it likes.
//! It does not interpret status codes or bodies; that is the executor's job.
//!
//! `UreqTransport` keeps one `ureq::Agent` for its whole life, so pooled
//! connections are reused across invocations. The blocking call runs on the
//! tokio blocking pool and the callback fires on that pool thread.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;
use tracing::debug;

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, TransportOutcome};

/// Callback a transport invokes once with the outcome of a request.
pub type OnComplete = Box<dyn FnOnce(TransportOutcome) + Send + 'static>;

/// Executes requests asynchronously.
///
/// Implementations must call `on_complete` exactly once and must not block
/// the calling thread on network I/O.
pub trait Transport: Send + Sync + 'static {
    fn dispatch(&self, request: HttpRequest, on_complete: OnComplete);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn dispatch(&self, request: HttpRequest, on_complete: OnComplete) {
        (**self).dispatch(request, on_complete)
    }
}

/// `Transport` backed by a shared `ureq::Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    user_agent: Option<String>,
    max_body_bytes: u64,
    runtime: Handle,
}

impl UreqTransport {
    /// Build a transport that runs requests on `runtime`'s blocking pool.
    pub fn new(config: &TransportConfig, runtime: Handle) -> Self {
        // Non-2xx statuses must come back as data for the executor to classify.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout)
            .build()
            .new_agent();
        Self {
            agent,
            user_agent: config.user_agent.clone(),
            max_body_bytes: config.max_body_bytes.unwrap_or(u64::MAX),
            runtime,
        }
    }

    /// Like `new`, using the runtime of the current tokio context.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn current(config: &TransportConfig) -> Self {
        Self::new(config, Handle::current())
    }

    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ureq::Error> {
        let url = request.url.as_str();
        let has_user_agent = request.header("user-agent").is_some();
        let extra_agent = self
            .user_agent
            .as_deref()
            .filter(|_| !has_user_agent)
            .map(|ua| ("user-agent", ua));
        let headers = request
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(extra_agent);

        let mut response = match request.method {
            HttpMethod::Get => headers
                .fold(self.agent.get(url), |builder, (k, v)| builder.header(k, v))
                .call()?,
            HttpMethod::Post => {
                let builder =
                    headers.fold(self.agent.post(url), |builder, (k, v)| builder.header(k, v));
                match &request.body {
                    Some(body) => builder.send(&body[..])?,
                    None => builder.send_empty()?,
                }
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        // ureq caps bodies at 10 MiB unless told otherwise.
        let body = response
            .body_mut()
            .with_config()
            .limit(self.max_body_bytes)
            .read_to_vec()?;

        Ok(HttpResponse {
            status,
            headers,
            body: Some(Bytes::from(body)),
        })
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("user_agent", &self.user_agent)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

impl Transport for UreqTransport {
    fn dispatch(&self, request: HttpRequest, on_complete: OnComplete) {
        let transport = self.clone();
        self.runtime.spawn_blocking(move || {
            debug!(method = request.method.as_str(), url = %request.url, "sending request");
            on_complete(classify(transport.execute(&request)));
        });
    }
}

/// A peer that answers with bytes that do not parse as HTTP is a protocol
/// anomaly, not a network failure.
fn classify(result: Result<HttpResponse, ureq::Error>) -> TransportOutcome {
    match result {
        Ok(response) => TransportOutcome::Http(response),
        Err(ureq::Error::Protocol(err)) => {
            debug!(error = %err, "peer did not answer with HTTP");
            TransportOutcome::NonHttp
        }
        Err(err) => TransportOutcome::Failed(TransportError::new(err)),
    }
}
