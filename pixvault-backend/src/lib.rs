pub mod backfill;
pub mod cli;
pub mod entity;
pub mod images;
pub mod import;
pub mod ingest;
pub mod logging;
pub mod middleware;
pub mod migration;
pub mod openapi;
pub mod placeholder;
pub mod retry;
pub mod storage;
pub mod store;
#[cfg(test)]
mod tests;
#[cfg(test)]
pub(crate) mod testutil;
pub mod transcode;

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use pixvault_shared::error::VaultError;
use std::{borrow::Cow, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tower::{BoxError, ServiceBuilder};
use tracing::{error, info};

use crate::{
    cli::CliOpts,
    images::{delete_image, get_image, get_image_file, get_thumbnail, list_images, upload_image},
    ingest::MAX_UPLOAD_BYTES,
    logging::logging_layer,
    store::Store,
};

/// Room for the multipart framing and text fields around the file itself.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

pub type SharedState = Arc<RwLock<AppState>>;

pub struct AppState {
    pub store: Store,
}

impl AppState {
    pub async fn new(cli: &CliOpts) -> Result<Self, VaultError> {
        let db_path = cli.db_path();
        let store = Store::open(Some(db_path.as_path()), cli.store_options()).await?;
        match cli.no_migrate {
            true => info!("Skipping schema migrations"),
            false => store
                .migrate()
                .await
                .inspect_err(|err| error!(error = %err, "Failed to apply migrations"))?,
        }
        Ok(Self { store })
    }

    #[cfg(test)]
    pub async fn test() -> Self {
        Self {
            store: Store::test().await,
        }
    }
}

pub fn build_app<T>(shared_state: &SharedState) -> Router<T> {
    let router = Router::new()
        .route(
            "/api/v1/images",
            get(list_images)
                .post(upload_image)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/v1/images/{id}", get(get_image).delete(delete_image))
        .route("/api/v1/images/{id}/thumbnail", get(get_thumbnail))
        .route("/api/v1/images/{id}/file", get(get_image_file))
        .merge(openapi::api_route());

    router
        .layer(
            ServiceBuilder::new()
                .layer(middleware::corslayer())
                .layer(middleware::cache_control_layer())
                // Handle errors from middleware
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .concurrency_limit(1024)
                .timeout(Duration::from_secs(30))
                .layer(logging_layer()),
        )
        .with_state(shared_state.clone())
}

async fn handle_error(error: BoxError) -> impl IntoResponse {
    if error.is::<tower::timeout::error::Elapsed>() {
        return (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out"));
    }

    if error.is::<tower::load_shed::error::Overloaded>() {
        let msg = "service is overloaded, try again later";
        error!("{}", msg);
        return (StatusCode::SERVICE_UNAVAILABLE, Cow::from(msg));
    }

    let msg = format!("Unhandled internal error: {error}");
    error!("{}", msg);
    (StatusCode::INTERNAL_SERVER_ERROR, Cow::from(msg))
}

#[tokio::test]
async fn test_handle_error() {
    let err = tower::timeout::error::Elapsed::new();
    let res = handle_error(Box::new(err)).await.into_response();
    assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);

    let err = tower::load_shed::error::Overloaded::new();
    let res = handle_error(Box::new(err)).await.into_response();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = handle_error("boom".into()).await.into_response();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
