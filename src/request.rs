use bytes::Bytes;
use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Method,
};
use tokio_util::sync::CancellationToken;

use crate::Body;

/// Caller-supplied description of a request: method, headers, body and an
/// optional external cancellation signal.
///
/// Unset fields are filled from instance defaults by
/// [`RequestInit::merged_over`]; a missing method means `GET`.
#[derive(Clone, Debug, Default)]
pub struct RequestInit {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub body: Option<Body>,
    /// Cancelling this token aborts the in-flight attempt of every call
    /// made with this init.
    pub signal: Option<CancellationToken>,
}

impl RequestInit {
    pub fn new(method: Method) -> Self {
        Self {
            method: Some(method),
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Layers `self` over `defaults`.
    ///
    /// Headers merge per name with the values set here replacing the
    /// default's; method, body and signal are taken from `self` when set.
    pub fn merged_over(self, defaults: &RequestInit) -> RequestInit {
        let mut headers = defaults.headers.clone();
        // `extend` replaces every value of a name present in `self.headers`.
        headers.extend(self.headers);

        RequestInit {
            method: self.method.or_else(|| defaults.method.clone()),
            headers,
            body: self.body.or_else(|| defaults.body.clone()),
            signal: self.signal.or_else(|| defaults.signal.clone()),
        }
    }
}

/// Fully resolved request template handed to the transport.
///
/// The body is held as [`Bytes`], so cloning the template for a new attempt
/// never shares a consumed stream with an earlier one.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedRequest {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl PreparedRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Builds the template for one logical call.
    ///
    /// JSON bodies are serialized here and mark the request as
    /// `application/json`; other bodies pass through untouched. The init's
    /// signal is returned separately since it belongs to the call, not to
    /// the wire request.
    pub(crate) fn from_init(uri: String, init: RequestInit) -> (Self, Option<CancellationToken>) {
        let RequestInit {
            method,
            mut headers,
            body,
            signal,
        } = init;

        if body.as_ref().is_some_and(Body::is_structured) {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        let request = Self {
            method: method.unwrap_or(Method::GET),
            uri,
            headers,
            body: body.map(Body::into_bytes),
        };
        (request, signal)
    }

    pub(crate) fn set_accept(&mut self, accept: &'static str) {
        self.headers
            .insert(header::ACCEPT, HeaderValue::from_static(accept));
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}
