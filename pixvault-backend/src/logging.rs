//! Request tracing
//!

use std::time::Duration;

use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, Request, Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{MakeSpan, OnRequest, OnResponse, TraceLayer};
use tracing::{error, info, trace, warn, Span};

#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct RequestSpanner;

impl<B> MakeSpan<B> for RequestSpanner {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
            bytes = tracing::field::Empty
        )
    }
}

impl<B> OnRequest<B> for RequestSpanner {
    fn on_request(&mut self, _request: &Request<B>, _span: &Span) {
        trace!("request received");
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

impl<B> OnResponse<B> for RequestSpanner {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status();
        span.record("status", status.as_u16());
        span.record("latency_ms", latency.as_millis() as u64);
        if let Some(bytes) = content_length(response.headers()) {
            span.record("bytes", bytes);
        }

        if status.is_server_error() {
            error!("response sent");
        } else if status.is_client_error() {
            warn!("response sent");
        } else {
            info!("response sent");
        }
    }
}

pub(crate) fn logging_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpanner,
    RequestSpanner,
    RequestSpanner,
> {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpanner)
        .on_request(RequestSpanner)
        .on_response(RequestSpanner)
}
