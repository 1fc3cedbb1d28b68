use async_trait::async_trait;
use axum::body::Body as AxumBody;
use hyper::{Request, Response};
use thiserror::Error;

/// Custom error type for HTTP client operations.
///
/// Only transport-level failures are errors. A backend that answers with any status,
/// 4xx and 5xx included, produces `Ok(response)`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpClientError {
    /// Error when connection to backend fails (DNS, refused, reset, timeout)
    #[error("{0}")]
    ConnectionError(String),

    /// Error when request is invalid
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for HTTP client operations
pub type HttpClientResult<T> = Result<T, HttpClientError>;

/// HttpClient defines the port (interface) for making HTTP requests to backends
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Send an HTTP request to a backend server.
    ///
    /// Implementations must not follow redirects: a 3xx answer is returned as is.
    ///
    /// # Arguments
    /// * `req` - The HTTP request to send to the backend
    ///
    /// # Returns
    /// A future that resolves to the backend's response or a transport error
    async fn send_request(&self, req: Request<AxumBody>) -> HttpClientResult<Response<AxumBody>>;
}
