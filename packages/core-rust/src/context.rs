use std::net::SocketAddr;

use http::{HeaderMap, Method, Uri};

/// Header consulted for an inbound trace identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request context handed by the transport to handlers that ask for it.
/// Carries the HTTP request line, headers, peer address and a trace identifier.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP method of the inbound request.
    pub method: Method,
    /// Request target as received by the transport.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    /// Peer address, when the transport knows it.
    pub remote_addr: Option<SocketAddr>,
    /// Distributed trace identifier for observability.
    pub trace_id: String,
}

impl RequestContext {
    /// Builds a context from the head of an HTTP request.
    ///
    /// The trace id is taken from the `x-request-id` header when present and
    /// valid UTF-8, otherwise a fresh v4 UUID is generated.
    #[must_use]
    pub fn from_parts(parts: &http::request::Parts, remote_addr: Option<SocketAddr>) -> Self {
        let trace_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);

        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            remote_addr,
            trace_id,
        }
    }

    /// Returns a header value as a string slice, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
