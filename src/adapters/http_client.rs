use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::Result;
use hyper::{Request, Response, Version, header, header::HeaderValue};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;
use tower::ServiceExt;
use tower_http::decompression::Decompression;

use crate::ports::http_client::{HttpClient, HttpClientError, HttpClientResult};

const USER_AGENT: &str = concat!("edge-forwarder/", env!("CARGO_PKG_VERSION"));

/// HTTP client adapter using Hyper with Rustls.
///
/// Responsibilities:
/// * Fills in `User-Agent` and `Accept` when the caller did not send them
/// * Never follows redirects (hyper's client has no redirect logic)
/// * Transparently decodes gzip / deflate / brotli / zstd bodies, dropping the
///   matching `Content-Encoding` and `Content-Length` headers
/// * Reports every transport failure as [`HttpClientError::ConnectionError`] with the
///   full error chain, so callers can surface a meaningful message
pub struct HttpClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, AxumBody>,
}

impl HttpClientAdapter {
    /// Create a new HTTP client adapter using the transport's default connect timeout.
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(None)
    }

    /// Create a new HTTP client adapter with an optional connect timeout.
    pub fn with_connect_timeout(connect_timeout: Option<Duration>) -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs
        http_connector.set_connect_timeout(connect_timeout);

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::debug!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, AxumBody>(https_connector);

        tracing::info!(
            connect_timeout_secs = connect_timeout.map(|d| d.as_secs()),
            "Created outbound HTTP client"
        );
        Ok(Self { client })
    }

    /// Inject the defaults a browser-facing fetch would send, if absent.
    fn add_common_headers(req: &mut Request<AxumBody>) {
        let headers = req.headers_mut();
        if !headers.contains_key(header::USER_AGENT) {
            headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        }
        if !headers.contains_key(header::ACCEPT) {
            headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        }
    }
}

/// Render an error and its sources as `outer: inner: root`.
pub(crate) fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn send_request(
        &self,
        mut req: Request<AxumBody>,
    ) -> HttpClientResult<Response<AxumBody>> {
        Self::add_common_headers(&mut req);

        let backend_identifier = format!(
            "{}://{}",
            req.uri().scheme_str().unwrap_or("http"),
            req.uri()
                .authority()
                .map_or_else(|| "unknown".to_string(), |a| a.to_string())
        );

        if req.uri().host().is_none() {
            tracing::error!("Outgoing URI has no host: {}", req.uri());
            return Err(HttpClientError::InvalidRequest(
                "Outgoing URI has no host".to_string(),
            ));
        }

        let (mut parts, body) = req.into_parts();
        parts.version = Version::HTTP_11;

        tracing::debug!(
            backend.url = %backend_identifier,
            "Sending request: {} {}",
            parts.method,
            parts.uri
        );
        tracing::trace!("Outgoing request headers: {:?}", parts.headers);

        let outgoing_request = Request::from_parts(parts, body);
        let method_for_error_log = outgoing_request.method().clone();
        let uri_for_error_log = outgoing_request.uri().clone();

        match Decompression::new(self.client.clone())
            .oneshot(outgoing_request)
            .await
        {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                tracing::debug!(
                    backend.url = %backend_identifier,
                    http.status_code = parts.status.as_u16(),
                    "Backend answered"
                );
                Ok(Response::from_parts(parts, AxumBody::new(body)))
            }
            Err(e) => {
                let message = error_chain(&e);
                tracing::debug!(
                    "Error making request to backend {} ({} {}): {}",
                    backend_identifier,
                    method_for_error_log,
                    uri_for_error_log,
                    message
                );
                Err(HttpClientError::ConnectionError(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        assert!(HttpClientAdapter::new().is_ok());
        assert!(HttpClientAdapter::with_connect_timeout(Some(Duration::from_secs(2))).is_ok());
    }

    #[tokio::test]
    async fn test_add_common_headers() {
        let mut req = Request::builder()
            .uri("https://example.com")
            .body(AxumBody::empty())
            .unwrap();

        HttpClientAdapter::add_common_headers(&mut req);

        let headers = req.headers();
        assert_eq!(headers.get(header::USER_AGENT).unwrap(), USER_AGENT);
        assert_eq!(headers.get(header::ACCEPT).unwrap(), "*/*");
    }

    #[tokio::test]
    async fn test_add_common_headers_keeps_caller_values() {
        let mut req = Request::builder()
            .uri("https://example.com")
            .header(header::ACCEPT, "application/json")
            .body(AxumBody::empty())
            .unwrap();

        HttpClientAdapter::add_common_headers(&mut req);
        assert_eq!(req.headers().get(header::ACCEPT).unwrap(), "application/json");
    }

    #[tokio::test]
    async fn test_relative_uri_rejected() {
        let client = HttpClientAdapter::new().unwrap();
        let req = Request::builder()
            .uri("/api/posts")
            .body(AxumBody::empty())
            .unwrap();

        let result = client.send_request(req).await;
        assert!(matches!(result, Err(HttpClientError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        // Bind then drop to obtain a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClientAdapter::new().unwrap();
        let req = Request::builder()
            .uri(format!("http://{addr}/api/"))
            .body(AxumBody::empty())
            .unwrap();

        match client.send_request(req).await {
            Err(HttpClientError::ConnectionError(message)) => assert!(!message.is_empty()),
            Err(other) => panic!("Expected connection error, got {other}"),
            Ok(response) => panic!("Expected connection error, got {}", response.status()),
        }
    }
}
