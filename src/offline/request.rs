use std::fmt;

use axum::{
    body::Body,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Serialize;
use url::Url;

/// Headers that describe a single connection and never travel with a stored
/// or replayed message.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub(crate) fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// A request as seen by the offline layer.
#[derive(Debug, Clone)]
pub struct OfflineRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl OfflineRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// GET and HEAD are reads; everything else is a mutation.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.method, &self.url)
    }
}

/// Identity of a stored response: method plus normalized URL.
///
/// Scheme and host are lower-cased and default ports dropped by URL parsing;
/// the fragment is stripped and the query kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: String,
    url: String,
}

impl CacheKey {
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        Self {
            method: method.as_str().to_ascii_uppercase(),
            url: normalized.into(),
        }
    }

    pub fn get(url: &Url) -> Self {
        Self::new(&Method::GET, url)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A fully buffered response.
///
/// Deliberately not `Clone`: a response that must be both returned and
/// stored is copied with [`OfflineResponse::duplicate`].
#[derive(Debug, PartialEq, Eq)]
pub struct OfflineResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl OfflineResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: headers
                .into_iter()
                .filter(|(name, _)| !is_hop_by_hop(name))
                .collect(),
            body: body.into(),
        }
    }

    pub fn json<T: Serialize>(status: u16, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(
            status,
            vec![(
                header::CONTENT_TYPE.to_string(),
                "application/json".to_string(),
            )],
            body,
        ))
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(
            status,
            vec![(
                header::CONTENT_TYPE.to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body.into(),
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Explicit copy for the store-and-return path.
    pub fn duplicate(&self) -> Self {
        Self {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

impl IntoResponse for OfflineResponse {
    fn into_response(self) -> Response {
        let mut builder = Response::builder().status(self.status);

        for (name, value) in self.headers {
            if let Ok(header_value) = HeaderValue::from_str(&value) {
                builder = builder.header(name, header_value);
            }
        }

        builder
            .body(Body::from(self.body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("valid url")
    }

    #[test]
    fn cache_key_normalizes_host_port_and_fragment() {
        let a = CacheKey::get(&url("HTTP://Example.COM:80/index.html?x=1#top"));
        let b = CacheKey::get(&url("http://example.com/index.html?x=1"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "GET http://example.com/index.html?x=1");
    }

    #[test]
    fn cache_key_keeps_query_and_method() {
        let a = CacheKey::get(&url("http://example.com/a?x=1"));
        let b = CacheKey::get(&url("http://example.com/a?x=2"));
        let head = CacheKey::new(&Method::HEAD, &url("http://example.com/a?x=1"));
        assert_ne!(a, b);
        assert_ne!(a, head);
    }

    #[test]
    fn hop_by_hop_headers_are_dropped() {
        let response = OfflineResponse::new(
            200,
            vec![
                ("Transfer-Encoding".into(), "chunked".into()),
                ("content-type".into(), "text/css".into()),
            ],
            "body",
        );
        assert_eq!(response.headers.len(), 1);
        assert_eq!(response.header("Content-Type"), Some("text/css"));
    }

    #[test]
    fn duplicate_is_byte_identical() {
        let original = OfflineResponse::text(200, "hello");
        let copy = original.duplicate();
        assert_eq!(original, copy);
    }
}
