use std::{sync::Arc, time::Instant};

use axum::{
    Router,
    body::Body as AxumBody,
    extract::Request,
    http::{StatusCode, header},
    response::Response,
    routing::{any, get},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    core::forwarder::{ForwardRequest, Forwarder},
    tracing_setup::create_request_span,
};

/// HTTP handler exposing the forwarder on the inbound surface.
#[derive(Clone)]
pub struct HttpHandler {
    forwarder: Arc<Forwarder>,
    max_body_bytes: usize,
}

impl HttpHandler {
    pub fn new(forwarder: Arc<Forwarder>, max_body_bytes: usize) -> Self {
        Self {
            forwarder,
            max_body_bytes,
        }
    }

    /// Axum router: the forwarder on `mount_path`, plus `/health`.
    pub fn router(self, mount_path: &str) -> Router {
        let forward_handler = self.clone();
        let health_handler = self;

        Router::new()
            .route(
                mount_path,
                any(move |req: Request| {
                    let handler = forward_handler.clone();
                    async move { handler.handle_request(req).await }
                }),
            )
            .route(
                "/health",
                get(move || {
                    let handler = health_handler.clone();
                    async move { handler.handle_health_check() }
                }),
            )
            .layer(TraceLayer::new_for_http())
    }

    /// Turn one inbound request into a forwarded call. Always answers.
    pub async fn handle_request(&self, req: Request) -> Response<AxumBody> {
        let request_id = Uuid::new_v4().to_string();
        let start = Instant::now();
        let (parts, body) = req.into_parts();

        let body = match Limited::new(body, self.max_body_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                tracing::warn!(request.id = %request_id, "Inbound body exceeds {} bytes", self.max_body_bytes);
                return detail_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    &format!("Request body exceeds {} bytes", self.max_body_bytes),
                );
            }
            Err(e) => {
                tracing::warn!(request.id = %request_id, "Failed to read inbound body: {e}");
                return detail_response(
                    StatusCode::BAD_REQUEST,
                    &format!("Invalid request body: {e}"),
                );
            }
        };

        let request = ForwardRequest::from_inbound(
            parts.method,
            parts.uri.query(),
            &parts.headers,
            body,
            self.forwarder.settings(),
        );

        let span = create_request_span(
            request.method().as_str(),
            request.virtual_path(),
            &request_id,
        );
        let response = self
            .forwarder
            .forward(request)
            .instrument(span.clone())
            .await;

        span.record("http.status_code", response.status().as_u16());
        span.record(
            "duration_ms",
            u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        );
        response
    }

    /// Report the configured origins; 503 when there is nothing to forward to.
    pub fn handle_health_check(&self) -> Response<AxumBody> {
        let candidates = self.forwarder.candidates();
        let status = if candidates.is_empty() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::OK
        };

        let health_data = serde_json::json!({
            "status": if status == StatusCode::OK { "healthy" } else { "unhealthy" },
            "backends": candidates.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        json_response(status, health_data.to_string())
    }
}

fn detail_response(status: StatusCode, detail: &str) -> Response<AxumBody> {
    json_response(status, serde_json::json!({ "detail": detail }).to_string())
}

fn json_response(status: StatusCode, body: String) -> Response<AxumBody> {
    let mut response = Response::new(AxumBody::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}
