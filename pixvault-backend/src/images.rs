//! Image API handlers
//!

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pixvault_shared::asset::{validate_id, AssetMetadata, AssetPage, AssetSummary, IngestOutcome};
use pixvault_shared::error::VaultError;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use utoipa::{IntoParams, ToSchema};

use crate::ingest::ingest;
use crate::store::AssetBytes;
use crate::SharedState;

pub const ACCEPTED_CONTENT_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
];
pub const DEFAULT_PAGE_SIZE: u64 = 40;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub struct WebError {
    status: StatusCode,
    message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        WebError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<VaultError> for WebError {
    fn from(err: VaultError) -> Self {
        let status = match &err {
            VaultError::Validation(_) | VaultError::Decode(_) => StatusCode::BAD_REQUEST,
            VaultError::NotFound(_) => StatusCode::NOT_FOUND,
            VaultError::TransientStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }
        WebError::new(status, err.to_string())
    }
}

impl From<MultipartError> for WebError {
    fn from(err: MultipartError) -> Self {
        WebError::new(err.status(), format!("Failed to read upload: {}", err.body_text()))
    }
}

/// Shape of the upload form, for the API docs.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    description: Option<String>,
    /// Alias for `description`
    title: Option<String>,
    category: Option<String>,
    /// Comma separated, at most three are kept including the category
    tags: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Page size, 1 to 100
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

fn bytes_response(asset: AssetBytes) -> Response {
    ([(CONTENT_TYPE, asset.mime_type)], asset.bytes).into_response()
}

#[utoipa::path(
    post,
    path = "/api/v1/images",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored", body = IngestOutcome),
        (status = 400, description = "Invalid upload", body = ErrorBody),
        (status = 503, description = "Store unavailable", body = ErrorBody),
    )
)]
pub async fn upload_image(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<IngestOutcome>), WebError> {
    let mut data = None;
    let mut description = None;
    let mut category = None;
    let mut tags = None;
    let mut status = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                if let Some(content_type) = field.content_type() {
                    if !ACCEPTED_CONTENT_TYPES.contains(&content_type) {
                        return Err(WebError::bad_request(format!(
                            "Unsupported file type {content_type}, expected one of {}",
                            ACCEPTED_CONTENT_TYPES.join(", ")
                        )));
                    }
                }
                data = Some(field.bytes().await?.to_vec());
            }
            "description" | "title" => {
                let text = field.text().await?;
                // an explicit description beats a title
                if field_name == "description" || description.is_none() {
                    description = Some(text);
                }
            }
            "category" => category = Some(field.text().await?),
            "tags" => tags = Some(field.text().await?),
            "status" => status = Some(field.text().await?),
            _ => {
                debug!("Ignoring unknown multipart field: {}", field_name);
            }
        }
    }

    let data = data.ok_or_else(|| WebError::bad_request("Missing file in upload"))?;
    debug!(bytes = data.len(), "received upload");

    let metadata = AssetMetadata::from_form(description, category, tags.as_deref(), status);
    let state = state.read().await;
    let outcome = ingest(&state.store, data, metadata).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/v1/images",
    params(ListQuery),
    responses(
        (status = 200, description = "Live images, newest first", body = AssetPage),
    )
)]
pub async fn list_images(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<AssetPage>, WebError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let state = state.read().await;
    let data = state
        .store
        .list_assets(limit, offset)
        .await?
        .into_iter()
        .map(AssetSummary::from)
        .collect();
    let total = state.store.count_assets().await?;

    Ok(Json(AssetPage {
        data,
        limit,
        offset,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/images/{id}",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Image metadata", body = AssetSummary),
        (status = 404, description = "No such image", body = ErrorBody),
    )
)]
pub async fn get_image(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<AssetSummary>, WebError> {
    let id = validate_id(id)?;
    let state = state.read().await;

    if let Err(err) = state.store.record_view(id).await {
        warn!(asset_id = id, error = %err, "Failed to record view");
    }
    let asset = state
        .store
        .get_asset(id)
        .await?
        .ok_or_else(|| WebError::not_found(format!("Image {id} not found")))?;
    Ok(Json(asset.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/images/{id}/thumbnail",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Thumbnail bytes, WebP once the asset is normalized"),
        (status = 404, description = "No such image", body = ErrorBody),
    )
)]
pub async fn get_thumbnail(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let id = validate_id(id)?;
    let asset = state.read().await.store.fetch_thumbnail(id).await?;
    Ok(bytes_response(asset))
}

#[utoipa::path(
    get,
    path = "/api/v1/images/{id}/file",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Full size image bytes, WebP once the asset is normalized"),
        (status = 404, description = "No such image", body = ErrorBody),
    )
)]
pub async fn get_image_file(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let id = validate_id(id)?;
    let state = state.read().await;
    let asset = state.store.fetch_full(id).await?;
    if let Err(err) = state.store.record_download(id).await {
        warn!(asset_id = id, error = %err, "Failed to record download");
    }
    Ok(bytes_response(asset))
}

#[utoipa::path(
    delete,
    path = "/api/v1/images/{id}",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 204, description = "Image deleted"),
        (status = 404, description = "No such image", body = ErrorBody),
    )
)]
pub async fn delete_image(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, WebError> {
    let id = validate_id(id)?;
    match state.read().await.store.soft_delete(id).await? {
        true => {
            debug!(asset_id = id, "deleted asset");
            Ok(StatusCode::NO_CONTENT)
        }
        false => Err(WebError::not_found(format!("Image {id} not found"))),
    }
}
