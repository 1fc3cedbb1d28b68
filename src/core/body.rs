//! Inbound body classification and the outbound body policy.
//!
//! Bodies arrive as bytes; they are classified by `Content-Type` into raw text
//! (forwarded verbatim) or a parsed structure (re-serialized as JSON, or dropped
//! when it has no fields).
use bytes::Bytes;
use http::{HeaderValue, Method};
use serde_json::{Map, Value};

/// An inbound request body after content-type driven parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundBody {
    Absent,
    Raw(Bytes),
    Structured(Value),
}

/// What actually goes upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundBody {
    /// Inbound bytes, untouched
    Raw(Bytes),
    /// A structured body serialized as JSON
    Json(Bytes),
}

impl OutboundBody {
    pub fn bytes(&self) -> &Bytes {
        match self {
            OutboundBody::Raw(bytes) | OutboundBody::Json(bytes) => bytes,
        }
    }
}

impl InboundBody {
    /// Classify raw inbound bytes using the request's `Content-Type`.
    pub fn classify(content_type: Option<&HeaderValue>, bytes: Bytes) -> Self {
        if bytes.is_empty() {
            return InboundBody::Absent;
        }

        let mime = content_type
            .and_then(|value| value.to_str().ok())
            .map(essence)
            .unwrap_or_default();

        if is_json(&mime) {
            return match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::String(text)) => InboundBody::Raw(Bytes::from(text)),
                Ok(value) => InboundBody::Structured(value),
                Err(e) => {
                    tracing::debug!("Body declared as JSON but failed to parse ({e}); forwarding raw");
                    InboundBody::Raw(bytes)
                }
            };
        }

        if mime == "application/x-www-form-urlencoded" {
            return InboundBody::Structured(parse_form(&bytes));
        }

        InboundBody::Raw(bytes)
    }

    /// Apply the outbound body policy for `method`.
    ///
    /// GET and HEAD never carry a body. Raw bodies pass through verbatim, structured
    /// bodies are serialized only when they have at least one field.
    pub fn into_outbound(self, method: &Method) -> Option<OutboundBody> {
        if *method == Method::GET || *method == Method::HEAD {
            return None;
        }

        match self {
            InboundBody::Absent => None,
            InboundBody::Raw(bytes) => Some(OutboundBody::Raw(bytes)),
            InboundBody::Structured(value) if has_fields(&value) => {
                // serializing a `Value` cannot fail
                serde_json::to_vec(&value)
                    .ok()
                    .map(|json| OutboundBody::Json(Bytes::from(json)))
            }
            InboundBody::Structured(_) => None,
        }
    }
}

/// Whether a parsed body has anything worth sending.
fn has_fields(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

/// Media type without parameters, lowercased.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub(crate) fn is_json(mime: &str) -> bool {
    mime == "application/json" || mime.ends_with("+json")
}

/// Whether a `Content-Type` header value declares a JSON payload.
pub fn is_json_content_type(value: &HeaderValue) -> bool {
    value.to_str().map(|v| is_json(&essence(v))).unwrap_or(false)
}

/// Parse a urlencoded form; repeated keys collect into arrays.
fn parse_form(bytes: &[u8]) -> Value {
    let mut fields = Map::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        let value = Value::String(value.into_owned());
        match fields.get_mut(&*key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                fields.insert(key.into_owned(), value);
            }
        }
    }
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn json_type() -> HeaderValue {
        HeaderValue::from_static("application/json; charset=utf-8")
    }

    #[test]
    fn test_raw_text_forwarded_verbatim() {
        let body = InboundBody::classify(
            Some(&HeaderValue::from_static("text/plain")),
            Bytes::from_static(b"raw-text"),
        );
        assert_eq!(body, InboundBody::Raw(Bytes::from_static(b"raw-text")));
        assert_eq!(
            body.into_outbound(&Method::POST),
            Some(OutboundBody::Raw(Bytes::from_static(b"raw-text")))
        );
    }

    #[test]
    fn test_empty_object_sends_nothing() {
        let body = InboundBody::classify(Some(&json_type()), Bytes::from_static(b"{}"));
        assert_eq!(body, InboundBody::Structured(json!({})));
        assert_eq!(body.into_outbound(&Method::POST), None);
    }

    #[test]
    fn test_object_reserialized_as_json() {
        let body = InboundBody::classify(
            Some(&json_type()),
            Bytes::from_static(b"{ \"status\" :  \"approved\" }"),
        );
        let outbound = body.into_outbound(&Method::PATCH).unwrap();
        assert_eq!(
            outbound,
            OutboundBody::Json(Bytes::from_static(b"{\"status\":\"approved\"}"))
        );
    }

    #[test]
    fn test_get_and_head_never_carry_body() {
        for method in [Method::GET, Method::HEAD] {
            let body = InboundBody::Raw(Bytes::from_static(b"ignored"));
            assert_eq!(body.into_outbound(&method), None);
        }
    }

    #[test]
    fn test_json_string_is_raw() {
        let body = InboundBody::classify(Some(&json_type()), Bytes::from_static(b"\"hi\""));
        assert_eq!(body, InboundBody::Raw(Bytes::from_static(b"hi")));
    }

    #[test]
    fn test_json_scalars_send_nothing() {
        for raw in [&b"null"[..], &b"42"[..], &b"true"[..], &b"[]"[..]] {
            let body = InboundBody::classify(Some(&json_type()), Bytes::copy_from_slice(raw));
            assert_eq!(body.into_outbound(&Method::POST), None, "{raw:?}");
        }
    }

    #[test]
    fn test_json_key_order_kept() {
        let body = InboundBody::classify(
            Some(&json_type()),
            Bytes::from_static(br#"{ "zeta": 1, "alpha": 2, "mid": {"y": true, "b": null} }"#),
        );
        let outbound = body.into_outbound(&Method::POST).unwrap();
        assert_eq!(
            outbound.bytes().as_ref(),
            br#"{"zeta":1,"alpha":2,"mid":{"y":true,"b":null}}"#
        );
    }

    #[test]
    fn test_invalid_json_forwarded_raw() {
        let body = InboundBody::classify(Some(&json_type()), Bytes::from_static(b"{oops"));
        assert_eq!(body, InboundBody::Raw(Bytes::from_static(b"{oops")));
    }

    #[test]
    fn test_form_body_becomes_json() {
        let body = InboundBody::classify(
            Some(&HeaderValue::from_static("application/x-www-form-urlencoded")),
            Bytes::from_static(b"tag=a&tag=b&title=Hello+world"),
        );
        assert_eq!(
            body,
            InboundBody::Structured(json!({"tag": ["a", "b"], "title": "Hello world"}))
        );
    }

    #[test]
    fn test_empty_bytes_are_absent() {
        let body = InboundBody::classify(None, Bytes::new());
        assert_eq!(body, InboundBody::Absent);
        assert_eq!(body.into_outbound(&Method::DELETE), None);
    }

    #[test]
    fn test_json_content_type_detection() {
        assert!(is_json_content_type(&json_type()));
        assert!(is_json_content_type(&HeaderValue::from_static(
            "application/merge-patch+json"
        )));
        assert!(!is_json_content_type(&HeaderValue::from_static("text/plain")));
    }
}
