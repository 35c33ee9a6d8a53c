use axum::Router;
use pixvault_shared::asset::{AssetMetadata, AssetPage, AssetSummary, IngestOutcome};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::images::{ErrorBody, UploadForm};

#[derive(OpenApi)]
#[openapi(
    info(description = "pixvault image store API", license(name = "MIT or Apache2", identifier = "MIT OR Apache-2.0"), title = "pixvault", version = env!("CARGO_PKG_VERSION")),
    paths(
        crate::images::upload_image,
        crate::images::list_images,
        crate::images::get_image,
        crate::images::get_thumbnail,
        crate::images::get_image_file,
        crate::images::delete_image
    ),
    components(schemas(AssetMetadata, AssetPage, AssetSummary, IngestOutcome, ErrorBody, UploadForm))
)]
pub struct ApiDoc;

pub(crate) fn api_route<T: Clone + Sync + Send + 'static>() -> Router<T> {
    let doc = ApiDoc::openapi();
    Router::new().merge(SwaggerUi::new("/api/v1/swagger-ui").url("/api/v1/openapi.json", doc))
}
