//! Header sets applied on both legs of a forwarded call.
//!
//! The request side either keeps an allow-list or copies everything minus the
//! hop-by-hop headers, depending on [`HeaderPolicy`]. The response side always
//! drops the headers the inbound transport recomputes.
use http::{
    HeaderMap, HeaderName, StatusCode,
    header::{
        AUTHORIZATION, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HOST,
        TRANSFER_ENCODING,
    },
};

use crate::config::HeaderPolicy;

/// Inbound headers forwarded under [`HeaderPolicy::AllowList`].
pub const FORWARDED_REQUEST_HEADERS: [HeaderName; 2] = [AUTHORIZATION, CONTENT_TYPE];

/// Inbound headers never forwarded; the outbound transport regenerates them.
pub const HOP_BY_HOP_REQUEST_HEADERS: [HeaderName; 3] = [HOST, CONNECTION, CONTENT_LENGTH];

/// Upstream response headers never relayed back to the caller.
pub const STRIPPED_RESPONSE_HEADERS: [HeaderName; 3] =
    [CONTENT_ENCODING, TRANSFER_ENCODING, CONNECTION];

/// Upstream statuses relayed as redirects when a `Location` is present.
pub const REDIRECT_STATUSES: [StatusCode; 5] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

/// Select the inbound headers that travel upstream.
pub fn filter_request_headers(inbound: &HeaderMap, policy: HeaderPolicy) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    match policy {
        HeaderPolicy::AllowList => {
            for name in &FORWARDED_REQUEST_HEADERS {
                for value in inbound.get_all(name) {
                    forwarded.append(name.clone(), value.clone());
                }
            }
        }
        HeaderPolicy::PassThrough => {
            for (name, value) in inbound {
                if !HOP_BY_HOP_REQUEST_HEADERS.contains(name) {
                    forwarded.append(name.clone(), value.clone());
                }
            }
        }
    }
    forwarded
}

/// Copy upstream response headers, minus [`STRIPPED_RESPONSE_HEADERS`].
pub fn filter_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut relayed = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if !STRIPPED_RESPONSE_HEADERS.contains(name) {
            relayed.append(name.clone(), value.clone());
        }
    }
    relayed
}

pub fn is_redirect(status: StatusCode) -> bool {
    REDIRECT_STATUSES.contains(&status)
}

#[cfg(test)]
mod tests {
    use http::{HeaderValue, header};

    use super::*;

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("dashboard.example.com"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("17"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::COOKIE, HeaderValue::from_static("sid=1"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        headers
    }

    #[test]
    fn test_allow_list_keeps_only_auth_and_content_type() {
        let forwarded = filter_request_headers(&inbound(), HeaderPolicy::AllowList);
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded.get(AUTHORIZATION).unwrap(), "Bearer abc");
        assert_eq!(forwarded.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_pass_through_drops_hop_by_hop() {
        let forwarded = filter_request_headers(&inbound(), HeaderPolicy::PassThrough);
        assert!(!forwarded.contains_key(HOST));
        assert!(!forwarded.contains_key(CONNECTION));
        assert!(!forwarded.contains_key(CONTENT_LENGTH));
        assert_eq!(forwarded.get(header::COOKIE).unwrap(), "sid=1");
        assert_eq!(forwarded.get(AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[test]
    fn test_response_headers_stripped() {
        let mut upstream = HeaderMap::new();
        upstream.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        upstream.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        upstream.insert(CONNECTION, HeaderValue::from_static("close"));
        upstream.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        upstream.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        upstream.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));

        let relayed = filter_response_headers(&upstream);
        assert!(!relayed.contains_key(CONTENT_ENCODING));
        assert!(!relayed.contains_key(TRANSFER_ENCODING));
        assert!(!relayed.contains_key(CONNECTION));
        assert_eq!(relayed.get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(relayed.get_all(header::SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn test_redirect_statuses() {
        for code in [301, 302, 303, 307, 308] {
            assert!(is_redirect(StatusCode::from_u16(code).unwrap()));
        }
        assert!(!is_redirect(StatusCode::NOT_MODIFIED));
        assert!(!is_redirect(StatusCode::OK));
    }
}
