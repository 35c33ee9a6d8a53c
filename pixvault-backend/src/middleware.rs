//! Axum middleware things
//!

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, Response, StatusCode};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

/// Image bytes only change through a backfill, let browsers keep them a while.
pub const IMAGE_CACHE_CONTROL: &str = "private, max-age=3600";
pub const DEFAULT_CACHE_CONTROL: &str = "private, no-transform, max-age=0";

pub fn corslayer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_origin(Any)
}

fn cache_control(response: &Response<Body>) -> Option<HeaderValue> {
    if response.status() != StatusCode::OK {
        return None;
    }
    let is_image = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("image/"));
    match is_image {
        true => Some(HeaderValue::from_static(IMAGE_CACHE_CONTROL)),
        false => Some(HeaderValue::from_static(DEFAULT_CACHE_CONTROL)),
    }
}

pub fn cache_control_layer(
) -> SetResponseHeaderLayer<fn(&Response<Body>) -> Option<HeaderValue>> {
    SetResponseHeaderLayer::overriding(CACHE_CONTROL, cache_control as fn(&Response<Body>) -> _)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: StatusCode, content_type: &str) -> Response<Body> {
        Response::builder()
            .status(status)
            .header(CONTENT_TYPE, content_type)
            .body(Body::empty())
            .expect("response builds")
    }

    #[test]
    fn test_cache_control() {
        assert_eq!(
            cache_control(&response(StatusCode::OK, "image/webp")),
            Some(HeaderValue::from_static(IMAGE_CACHE_CONTROL))
        );
        assert_eq!(
            cache_control(&response(StatusCode::OK, "application/json")),
            Some(HeaderValue::from_static(DEFAULT_CACHE_CONTROL))
        );
        assert_eq!(
            cache_control(&response(StatusCode::NOT_FOUND, "application/json")),
            None
        );
    }
}
