//! Response payloads

use serde::Serialize;
use serde_json::{json, Value};

/// Content type for JSON payloads
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type for line-delimited JSON text
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Content type for plain text
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Response body
///
/// Text payloads are handed back byte-for-byte; they are never parsed or
/// re-serialized on the way through.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Payload {
    /// Structured JSON
    Json(Value),
    /// Literal text with its content type
    Text {
        /// Body text
        body: String,
        /// Content type
        content_type: String,
    },
}

impl Payload {
    /// JSON value, if this is a JSON payload
    #[inline]
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text { .. } => None,
        }
    }

    /// Text body, if this is a text payload
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::Text { body, .. } => Some(body),
        }
    }

    /// Content type
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> &str {
        match self {
            Self::Json(_) => JSON_CONTENT_TYPE,
            Self::Text { content_type, .. } => content_type,
        }
    }

    /// Body as it would travel on the wire
    #[must_use]
    pub fn to_body_string(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Text { body, .. } => body.clone(),
        }
    }
}

/// Status code plus payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Body
    pub payload: Payload,
}

impl Response {
    /// 200 with a JSON body
    #[inline]
    #[must_use]
    pub fn json(value: Value) -> Self {
        Self {
            status: 200,
            payload: Payload::Json(value),
        }
    }

    /// 200 with a literal text body
    #[inline]
    #[must_use]
    pub fn text(body: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            status: 200,
            payload: Payload::Text {
                body: body.into(),
                content_type: content_type.into(),
            },
        }
    }

    /// 200 with `{"results": []}`
    ///
    /// The fallback for content-branching routes: nothing matched, so
    /// nothing is fabricated.
    #[inline]
    #[must_use]
    pub fn empty_results() -> Self {
        Self::json(json!({ "results": [] }))
    }

    /// Wrap an existing payload
    #[inline]
    #[must_use]
    pub fn from_payload(payload: Payload) -> Self {
        Self {
            status: 200,
            payload,
        }
    }

    /// Replace the status code
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Check for a 2xx status
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Content type of the payload
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.payload.content_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_payload_is_verbatim() {
        let body = "{\"a\":1}\n{\"b\": 2}\n";
        let response = Response::text(body, NDJSON_CONTENT_TYPE);
        assert_eq!(response.payload.to_body_string(), body);
        assert_eq!(response.content_type(), NDJSON_CONTENT_TYPE);
        assert!(response.payload.as_json().is_none());
    }

    #[test]
    fn status_classification() {
        assert!(Response::empty_results().is_success());
        assert!(!Response::empty_results().with_status(404).is_success());
        assert_eq!(Response::empty_results().content_type(), JSON_CONTENT_TYPE);
    }
}
