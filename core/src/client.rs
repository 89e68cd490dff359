//! The request executor: URL validation, dispatch, response classification.
//!
//! # Design
//! `NetworkService` holds a transport and a callback context and carries no
//! mutable state between calls. Each operation is split the same way:
//! a `build_*` method produces an `HttpRequest`, the transport runs it, and
//! a `parse_*` method turns the `TransportOutcome` into a result. The build
//! and parse halves are pure and public so they can be tested without I/O.
//!
//! Every invocation ends in exactly one completion call. A `Pending` guard
//! owns the completion from the start; if the transport drops its callback
//! without reporting, the guard delivers a transport error on drop.
//!
//! Successful results are posted to the callback context. Failures are, by
//! default, delivered on the thread that detected them (the caller's thread
//! for URL and serialization errors, the transport's thread otherwise).
//! `DeliveryPolicy::AllOnContext` routes failures through the context too.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::TransportConfig;
use crate::context::CallbackContext;
use crate::error::{NetworkError, TransportError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, TransportOutcome};
use crate::transport::{Transport, UreqTransport};

/// Which deliveries are marshaled onto the callback context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
    /// Only successes go through the context; failures run where detected.
    #[default]
    SuccessOnContext,
    /// Successes and failures both go through the context.
    AllOnContext,
}

/// Completion callback for one invocation.
pub type Completion<T> = Box<dyn FnOnce(Result<T, NetworkError>) + Send + 'static>;

/// Asynchronous HTTP + JSON executor.
#[derive(Debug)]
pub struct NetworkService<Tr, Cx> {
    transport: Arc<Tr>,
    context: Arc<Cx>,
    policy: DeliveryPolicy,
}

impl<Tr, Cx> Clone for NetworkService<Tr, Cx> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            context: self.context.clone(),
            policy: self.policy,
        }
    }
}

impl<Cx: CallbackContext> NetworkService<UreqTransport, Cx> {
    /// Executor backed by `UreqTransport` running on `runtime`.
    pub fn with_ureq(config: &TransportConfig, runtime: tokio::runtime::Handle, context: Cx) -> Self {
        Self::new(UreqTransport::new(config, runtime), context)
    }
}

impl<Tr: Transport, Cx: CallbackContext> NetworkService<Tr, Cx> {
    pub fn new(transport: Tr, context: Cx) -> Self {
        Self {
            transport: Arc::new(transport),
            context: Arc::new(context),
            policy: DeliveryPolicy::default(),
        }
    }

    pub fn delivery_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn transport(&self) -> &Tr {
        &self.transport
    }

    /// GET `url` and decode the JSON body into `T`.
    pub fn fetch_typed<T>(
        &self,
        url: &str,
        headers: Option<&HashMap<String, String>>,
        completion: impl FnOnce(Result<T, NetworkError>) + Send + 'static,
    ) where
        T: DeserializeOwned + Send + 'static,
    {
        let pending = self.pending(completion);
        match build_get_request(url, headers) {
            Ok(request) => self.dispatch(request, pending, parse_typed::<T>),
            Err(err) => pending.deliver(Err(err)),
        }
    }

    /// POST `body` as JSON to `url` and decode the JSON response into `T`.
    ///
    /// Adds `content-type: application/json` unless `headers` already carries
    /// a `Content-Type` (any case); every other header is sent verbatim.
    pub fn post_typed<T, B>(
        &self,
        url: &str,
        body: &B,
        headers: Option<&HashMap<String, String>>,
        completion: impl FnOnce(Result<T, NetworkError>) + Send + 'static,
    ) where
        T: DeserializeOwned + Send + 'static,
        B: Serialize + ?Sized,
    {
        let pending = self.pending(completion);
        match build_post_request(url, body, headers) {
            Ok(request) => self.dispatch(request, pending, parse_typed::<T>),
            Err(err) => pending.deliver(Err(err)),
        }
    }

    /// GET `url` and hand back the body bytes untouched.
    pub fn fetch_raw(
        &self,
        url: &str,
        headers: Option<&HashMap<String, String>>,
        completion: impl FnOnce(Result<Bytes, NetworkError>) + Send + 'static,
    ) {
        let pending = self.pending(completion);
        match build_get_request(url, headers) {
            Ok(request) => self.dispatch(request, pending, parse_raw),
            Err(err) => pending.deliver(Err(err)),
        }
    }

    pub fn build_get_request(
        &self,
        url: &str,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<HttpRequest, NetworkError> {
        build_get_request(url, headers)
    }

    pub fn build_post_request<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<HttpRequest, NetworkError> {
        build_post_request(url, body, headers)
    }

    pub fn parse_typed<T: DeserializeOwned>(&self, outcome: TransportOutcome) -> Result<T, NetworkError> {
        parse_typed(outcome)
    }

    pub fn parse_raw(&self, outcome: TransportOutcome) -> Result<Bytes, NetworkError> {
        parse_raw(outcome)
    }

    fn pending<T: Send + 'static>(
        &self,
        completion: impl FnOnce(Result<T, NetworkError>) + Send + 'static,
    ) -> Pending<T, Cx> {
        Pending {
            completion: Some(Box::new(completion)),
            context: self.context.clone(),
            policy: self.policy,
        }
    }

    fn dispatch<T: Send + 'static>(
        &self,
        request: HttpRequest,
        pending: Pending<T, Cx>,
        parse: fn(TransportOutcome) -> Result<T, NetworkError>,
    ) {
        debug!(method = request.method.as_str(), url = %request.url, "dispatching request");
        self.transport.dispatch(
            request,
            Box::new(move |outcome: TransportOutcome| pending.deliver(parse(outcome))),
        );
    }
}

/// Owns a completion until it has been delivered exactly once.
struct Pending<T: Send + 'static, Cx: CallbackContext> {
    completion: Option<Completion<T>>,
    context: Arc<Cx>,
    policy: DeliveryPolicy,
}

impl<T: Send + 'static, Cx: CallbackContext> Pending<T, Cx> {
    fn deliver(mut self, result: Result<T, NetworkError>) {
        if let Some(completion) = self.completion.take() {
            self.route(completion, result);
        }
    }

    fn route(&self, completion: Completion<T>, result: Result<T, NetworkError>) {
        let on_context = result.is_ok() || self.policy == DeliveryPolicy::AllOnContext;
        if on_context {
            self.context.execute(Box::new(move || completion(result)));
        } else {
            completion(result);
        }
    }
}

impl<T: Send + 'static, Cx: CallbackContext> Drop for Pending<T, Cx> {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            warn!("transport released a request without reporting an outcome");
            self.route(
                completion,
                Err(NetworkError::Transport(TransportError::dropped())),
            );
        }
    }
}

fn parse_url(url: &str) -> Result<Url, NetworkError> {
    Url::parse(url).map_err(|_| NetworkError::InvalidUrl)
}

fn build_get_request(
    url: &str,
    headers: Option<&HashMap<String, String>>,
) -> Result<HttpRequest, NetworkError> {
    Ok(HttpRequest {
        method: HttpMethod::Get,
        url: parse_url(url)?,
        headers: collect_headers(headers),
        body: None,
    })
}

// The URL is validated before the body is serialized.
fn build_post_request<B: Serialize + ?Sized>(
    url: &str,
    body: &B,
    headers: Option<&HashMap<String, String>>,
) -> Result<HttpRequest, NetworkError> {
    let url = parse_url(url)?;
    let body = serde_json::to_vec(body).map_err(NetworkError::Serialization)?;
    let mut headers = collect_headers(headers);
    if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
        headers.push(("content-type".to_string(), "application/json".to_string()));
    }
    Ok(HttpRequest {
        method: HttpMethod::Post,
        url,
        headers,
        body: Some(Bytes::from(body)),
    })
}

fn parse_typed<T: DeserializeOwned>(outcome: TransportOutcome) -> Result<T, NetworkError> {
    let body = parse_raw(outcome)?;
    serde_json::from_slice(&body).map_err(|err| {
        debug!(
            target_type = std::any::type_name::<T>(),
            error = %err,
            "response body did not decode"
        );
        NetworkError::DecodeError
    })
}

// A present but empty body is a success here; only a missing body fails.
fn parse_raw(outcome: TransportOutcome) -> Result<Bytes, NetworkError> {
    let response = match outcome {
        TransportOutcome::Failed(err) => return Err(NetworkError::Transport(err)),
        TransportOutcome::NonHttp => return Err(NetworkError::WrongResponse),
        TransportOutcome::Http(response) => response,
    };
    check_status(&response)?;
    response.body.ok_or(NetworkError::DecodeError)
}

fn collect_headers(headers: Option<&HashMap<String, String>>) -> Vec<(String, String)> {
    headers
        .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

/// Map statuses outside `200..=299` to `WrongStatusCode`.
fn check_status(response: &HttpResponse) -> Result<(), NetworkError> {
    if (200..=299).contains(&response.status) {
        return Ok(());
    }
    Err(NetworkError::WrongStatusCode(response.status))
}
