//! The edge forwarder.
//!
//! One inbound request becomes one [`ForwardRequest`], which is sent to the first
//! backend origin that accepts a connection. The upstream answer is relayed back
//! with hop-by-hop headers removed, redirects are handed to the caller untouched,
//! and every transport failure turns into a `502` carrying a JSON `detail`.
use std::{sync::Arc, time::Instant};

use axum::body::Body as AxumBody;
use bytes::Bytes;
use http::{
    HeaderMap, HeaderValue, Method, Request, Response, StatusCode,
    header::{CONTENT_TYPE, LOCATION},
};
use http_body_util::BodyExt;
use thiserror::Error;
use url::Url;

use crate::{
    adapters::http_client::error_chain,
    config::{HeaderPolicy, ServerConfig},
    core::{
        backend::{BackendCandidates, BackendUrl},
        body::{InboundBody, OutboundBody, is_json_content_type},
        headers::{filter_request_headers, filter_response_headers, is_redirect},
    },
    metrics,
    ports::http_client::{HttpClient, HttpClientError},
};

/// Errors that end a forwarding attempt with a `502`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ForwardError {
    #[error("no backend origins configured")]
    NoCandidates,

    #[error("invalid upstream URL '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error(transparent)]
    Transport(#[from] HttpClientError),

    #[error("failed reading upstream response body: {0}")]
    ResponseBody(String),
}

/// Per-deployment knobs the forwarder needs on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardSettings {
    pub path_param: String,
    pub upstream_prefix: String,
    pub header_policy: HeaderPolicy,
}

impl Default for ForwardSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ForwardSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            path_param: config.path_param.clone(),
            upstream_prefix: config.upstream_prefix.trim_end_matches('/').to_string(),
            header_policy: config.header_policy,
        }
    }
}

/// Everything needed to replay one inbound call against any backend origin.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    method: Method,
    virtual_path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl ForwardRequest {
    /// Build the descriptor from the pieces of an inbound request.
    ///
    /// * every `path_param` value is consumed, in order, and joined with `/`
    /// * the remaining query pairs are kept in encounter order, repeats included
    /// * headers are filtered by the configured [`HeaderPolicy`]
    /// * the body goes through [`InboundBody::classify`] and the outbound body policy
    pub fn from_inbound(
        method: Method,
        raw_query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
        settings: &ForwardSettings,
    ) -> Self {
        let mut segments = Vec::new();
        let mut query = Vec::new();
        for (key, value) in url::form_urlencoded::parse(raw_query.unwrap_or_default().as_bytes())
        {
            if key == settings.path_param.as_str() {
                segments.push(value.into_owned());
            } else {
                query.push((key.into_owned(), value.into_owned()));
            }
        }

        let mut forwarded_headers = filter_request_headers(headers, settings.header_policy);
        let body = InboundBody::classify(headers.get(CONTENT_TYPE), body).into_outbound(&method);
        if let Some(OutboundBody::Json(_)) = &body {
            let declared_json = forwarded_headers
                .get(CONTENT_TYPE)
                .is_some_and(is_json_content_type);
            if !declared_json {
                forwarded_headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
        }

        Self {
            method,
            virtual_path: segments.join("/"),
            query,
            headers: forwarded_headers,
            body: body.map(|b| b.bytes().clone()),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn virtual_path(&self) -> &str {
        &self.virtual_path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The pass-through query, urlencoded, or `None` when nothing is left.
    pub fn forwarded_query(&self) -> Option<String> {
        if self.query.is_empty() {
            return None;
        }
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.query {
            serializer.append_pair(key, value);
        }
        Some(serializer.finish())
    }

    /// `{origin}{prefix}/{virtual_path}{?forwarded_query}`
    ///
    /// The normalized path must stay under `{origin}{prefix}/`; dot segments that
    /// climb out of it are rejected.
    pub fn target_url(&self, origin: &BackendUrl, prefix: &str) -> Result<Url, ForwardError> {
        let root = format!("{}{}/", origin.as_str(), prefix);
        let mut target = format!("{root}{}", self.virtual_path);
        if let Some(query) = self.forwarded_query() {
            target.push('?');
            target.push_str(&query);
        }

        let invalid = |reason: String| ForwardError::InvalidTarget {
            url: target.clone(),
            reason,
        };
        let root = Url::parse(&root).map_err(|e| invalid(e.to_string()))?;
        let url = Url::parse(&target).map_err(|e| invalid(e.to_string()))?;
        if !url.path().starts_with(root.path()) {
            return Err(invalid(format!("path escapes {}", root.path())));
        }
        Ok(url)
    }

    /// A fresh outbound request for one attempt.
    fn to_http_request(&self, target: &Url) -> Result<Request<AxumBody>, ForwardError> {
        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(target.as_str());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers.clone());
        }
        let body = match &self.body {
            Some(bytes) => AxumBody::from(bytes.clone()),
            None => AxumBody::empty(),
        };
        builder.body(body).map_err(|e| ForwardError::InvalidTarget {
            url: target.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Relays requests to the first reachable backend origin.
pub struct Forwarder {
    settings: Arc<ForwardSettings>,
    candidates: Arc<BackendCandidates>,
    client: Arc<dyn HttpClient>,
}

impl Forwarder {
    pub fn new(
        settings: Arc<ForwardSettings>,
        candidates: Arc<BackendCandidates>,
        client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            settings,
            candidates,
            client,
        }
    }

    pub fn settings(&self) -> &ForwardSettings {
        &self.settings
    }

    pub fn candidates(&self) -> &BackendCandidates {
        &self.candidates
    }

    /// Forward one request and always produce a response.
    pub async fn forward(&self, request: ForwardRequest) -> Response<AxumBody> {
        let start = Instant::now();
        let method = request.method().clone();

        let (outcome, response) = match self.dispatch(&request).await {
            Ok((origin, upstream)) => match relay(upstream).await {
                Ok(response) => {
                    tracing::info!(
                        backend.url = %origin,
                        http.status_code = response.status().as_u16(),
                        "Forwarded request"
                    );
                    let outcome = if is_redirect(response.status())
                        && response.headers().contains_key(LOCATION)
                    {
                        "redirect"
                    } else {
                        "relayed"
                    };
                    (outcome, response)
                }
                Err(e) => ("failed", self.failure(&e)),
            },
            Err(e) => ("failed", self.failure(&e)),
        };

        metrics::increment_forwarded_total(method.as_str(), outcome, response.status().as_u16());
        metrics::record_forward_duration(method.as_str(), start.elapsed());
        response
    }

    /// Sweep the candidates in order until one accepts the connection.
    async fn dispatch(
        &self,
        request: &ForwardRequest,
    ) -> Result<(BackendUrl, Response<AxumBody>), ForwardError> {
        let mut last_error = ForwardError::NoCandidates;

        for (attempt, origin) in self.candidates.iter().enumerate() {
            let target = request.target_url(origin, &self.settings.upstream_prefix)?;
            let outbound = request.to_http_request(&target)?;

            if attempt > 0 {
                metrics::increment_failover_total(origin.as_str());
            }

            match self.client.send_request(outbound).await {
                Ok(response) => {
                    metrics::increment_backend_attempt_total(origin.as_str(), "connected");
                    return Ok((origin.clone(), response));
                }
                Err(e) => {
                    metrics::increment_backend_attempt_total(origin.as_str(), "transport_error");
                    tracing::warn!(
                        backend.url = %origin,
                        attempt = attempt + 1,
                        remaining = self.candidates.len() - attempt - 1,
                        "Backend unreachable: {e}"
                    );
                    last_error = ForwardError::Transport(e);
                }
            }
        }

        Err(last_error)
    }

    fn failure(&self, error: &ForwardError) -> Response<AxumBody> {
        let message = error_chain(error);
        tracing::error!(candidates = self.candidates.len(), "Proxy failed: {message}");
        proxy_failure(&message)
    }
}

/// Turn the upstream answer into the caller's response.
///
/// Redirects with a `Location` are relayed as status + `Location` only, without
/// touching the upstream body.
async fn relay(upstream: Response<AxumBody>) -> Result<Response<AxumBody>, ForwardError> {
    let status = upstream.status();

    if is_redirect(status) {
        if let Some(location) = upstream.headers().get(LOCATION) {
            tracing::debug!(http.status_code = status.as_u16(), "Relaying upstream redirect");
            let mut response = Response::new(AxumBody::empty());
            *response.status_mut() = status;
            response.headers_mut().insert(LOCATION, location.clone());
            return Ok(response);
        }
    }

    let (parts, body) = upstream.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| ForwardError::ResponseBody(error_chain(&e)))?
        .to_bytes();

    let mut response = Response::new(AxumBody::from(bytes));
    *response.status_mut() = parts.status;
    *response.headers_mut() = filter_response_headers(&parts.headers);
    Ok(response)
}

/// The fixed `502` answer: `{"detail": "Proxy failed: <message>"}`.
pub fn proxy_failure(message: &str) -> Response<AxumBody> {
    let body = serde_json::json!({ "detail": format!("Proxy failed: {message}") });
    let mut response = Response::new(AxumBody::from(body.to_string()));
    *response.status_mut() = StatusCode::BAD_GATEWAY;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
