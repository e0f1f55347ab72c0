//! Requests as emitted by the client and as seen by handlers

use crate::error::InterceptError;
use crate::method::Method;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use url::{form_urlencoded, Url};

/// Params extracted from dynamic template segments
pub type PathParams = BTreeMap<String, String>;

/// Decoded query string params (first value wins for repeated keys)
pub type QueryParams = BTreeMap<String, String>;

/// Outgoing call before interception
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawRequest {
    /// Method
    pub method: Method,
    /// Path with optional query string; absolute URLs are accepted
    pub url: String,
    /// Body text, if any
    pub body: Option<String>,
}

impl RawRequest {
    /// Create request without body
    #[inline]
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
        }
    }

    /// GET request
    #[inline]
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// POST request with a JSON body
    #[inline]
    #[must_use]
    pub fn post_json(url: impl Into<String>, body: &Value) -> Self {
        Self::new(Method::Post, url).with_body(body.to_string())
    }

    /// Attach body text
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A request after interception, handed to handlers
///
/// Created once per intercepted call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptedRequest {
    method: Method,
    path: String,
    path_params: PathParams,
    query: QueryParams,
    body: Option<Value>,
}

impl InterceptedRequest {
    /// Parse a raw request
    ///
    /// Path params are empty until the request is bound to a route with
    /// [`with_path_params`](Self::with_path_params).
    ///
    /// # Errors
    /// - `InterceptError::MalformedRequest` for an unparsable absolute URL
    ///   or a body that is not JSON
    pub fn parse(raw: &RawRequest) -> Result<Self, InterceptError> {
        let (path, query) = split_url(&raw.url)?;

        let body = match raw.body.as_deref() {
            None => None,
            Some(text) if text.trim().is_empty() => None,
            Some(text) => Some(serde_json::from_str(text).map_err(|e| {
                InterceptError::MalformedRequest(format!(
                    "{} {}: body is not JSON: {e}",
                    raw.method, path
                ))
            })?),
        };

        Ok(Self {
            method: raw.method,
            path,
            path_params: PathParams::new(),
            query,
            body,
        })
    }

    /// Build a request directly (tests and computed handlers)
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: PathParams::new(),
            query: QueryParams::new(),
            body: None,
        }
    }

    /// With query param
    #[inline]
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(key.into()).or_insert_with(|| value.into());
        self
    }

    /// With parsed body
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Bind params extracted by the matched template
    #[inline]
    #[must_use]
    pub fn with_path_params(mut self, params: PathParams) -> Self {
        self.path_params = params;
        self
    }

    /// Method
    #[inline]
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Path without query string
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// All path params
    #[inline]
    #[must_use]
    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    /// One path param
    #[inline]
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// All query params
    #[inline]
    #[must_use]
    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// One query param
    #[inline]
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Parsed JSON body
    #[inline]
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

fn split_url(raw: &str) -> Result<(String, QueryParams), InterceptError> {
    if raw.contains("://") {
        let url = Url::parse(raw)
            .map_err(|e| InterceptError::MalformedRequest(format!("bad url {raw:?}: {e}")))?;
        return Ok((url.path().to_string(), parse_query(url.query().unwrap_or(""))));
    }

    let without_fragment = raw.split('#').next().unwrap_or("");
    match without_fragment.split_once('?') {
        Some((path, query)) => Ok((path.to_string(), parse_query(query))),
        None => Ok((without_fragment.to_string(), QueryParams::new())),
    }
}

fn parse_query(query: &str) -> QueryParams {
    let mut params = QueryParams::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_path_and_query() {
        let raw = RawRequest::get("/api/things/1/snapshots?source=blob&blob_key=a%20b&source=x");
        let req = InterceptedRequest::parse(&raw).unwrap();
        assert_eq!(req.path(), "/api/things/1/snapshots");
        assert_eq!(req.query_param("source"), Some("blob"));
        assert_eq!(req.query_param("blob_key"), Some("a b"));
        assert!(req.body().is_none());
    }

    #[test]
    fn parses_absolute_url() {
        let raw = RawRequest::get("http://localhost:8000/api/x?y=1#frag");
        let req = InterceptedRequest::parse(&raw).unwrap();
        assert_eq!(req.path(), "/api/x");
        assert_eq!(req.query_param("y"), Some("1"));
    }

    #[test]
    fn parses_json_body() {
        let body = json!({"query": {"kind": "EventsQuery"}});
        let req = InterceptedRequest::parse(&RawRequest::post_json("/query", &body)).unwrap();
        assert_eq!(req.body(), Some(&body));
    }

    #[test]
    fn rejects_non_json_body() {
        let raw = RawRequest::new(Method::Post, "/query").with_body("kind=EventsQuery");
        assert!(matches!(
            InterceptedRequest::parse(&raw),
            Err(InterceptError::MalformedRequest(_))
        ));
    }

    #[test]
    fn blank_body_is_absent() {
        let raw = RawRequest::new(Method::Post, "/query").with_body("  ");
        assert!(InterceptedRequest::parse(&raw).unwrap().body().is_none());
    }
}
