//! Request span and response logging for the JSON API.

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::application::posts::CacheStatus;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Search details the posts handler leaves for the response log.
#[derive(Debug, Clone)]
pub struct SearchTrace {
    pub signature: String,
    pub cache: CacheStatus,
    pub count: usize,
}

impl SearchTrace {
    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Assign a request id and run the rest of the stack inside its span.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!(
        "http.request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    request
        .extensions_mut()
        .insert(RequestContext { request_id });

    next.run(request).instrument(span).await
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    if let Some(trace) = response.extensions_mut().remove::<SearchTrace>() {
        info!(
            target = "tagfeed::http::response",
            status = status.as_u16(),
            signature = %trace.signature,
            cache = trace.cache.as_str(),
            posts = trace.count,
            elapsed_ms = elapsed_ms,
            request_id = request_id,
            "search served",
        );
    }

    if status.is_client_error() || status.is_server_error() {
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "tagfeed::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "tagfeed::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                request_id = request_id,
                "client request error",
            );
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::{
        Extension, Router, middleware as axum_middleware,
        response::IntoResponse,
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;

    fn router() -> Router {
        Router::new()
            .route(
                "/search",
                get(|Extension(ctx): Extension<RequestContext>| async move {
                    let mut response = ctx.request_id.into_response();
                    SearchTrace {
                        signature: "tech--".to_string(),
                        cache: CacheStatus::Hit,
                        count: 3,
                    }
                    .attach(&mut response);
                    response
                }),
            )
            .layer(axum_middleware::from_fn(log_responses))
            .layer(axum_middleware::from_fn(set_request_context))
    }

    #[tokio::test]
    async fn handlers_see_a_request_id_and_traces_are_consumed() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/search")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert!(response.status().is_success());
        assert!(response.extensions().get::<SearchTrace>().is_none());
        assert!(response.extensions().get::<RequestContext>().is_none());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let request_id = std::str::from_utf8(&body).expect("utf8 request id");
        assert!(Uuid::parse_str(request_id).is_ok());
    }
}
