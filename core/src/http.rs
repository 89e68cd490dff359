//! HTTP request and response descriptors exchanged with the transport.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! executor builds `HttpRequest` values and judges `TransportOutcome` values;
//! the `Transport` implementation is the only code that touches the network.
//! Keeping both halves as data makes every validation step testable without
//! a socket.
//!
//! Bodies are `Bytes` so a response can be handed to `fetch_raw` callers
//! without copying.

use bytes::Bytes;
use url::Url;

use crate::error::TransportError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// A fully assembled outgoing request.
///
/// Built by `NetworkService::build_*` methods and moved into the transport on
/// dispatch.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Look up a header value by name, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
///
/// `body` is `None` when the transport received no body at all, and
/// `Some` (possibly empty) otherwise.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// What a transport reports back for one dispatched request.
#[derive(Debug)]
pub enum TransportOutcome {
    /// The request never produced a response (DNS, refused connection, I/O).
    Failed(TransportError),
    /// The exchange completed but did not yield a well-formed HTTP response.
    NonHttp,
    /// An HTTP response, whatever its status.
    Http(HttpResponse),
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
