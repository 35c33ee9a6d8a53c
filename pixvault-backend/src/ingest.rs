//! Turns one raw image into a persisted, normalized asset.
//!
//! The placeholder and both transcodes are computed up front, then written
//! with a single statement, so a decode failure never leaves a half-updated
//! row behind.

use std::sync::Arc;

use pixvault_shared::asset::{AssetMetadata, IngestOutcome};
use pixvault_shared::error::VaultError;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info, instrument};

use crate::placeholder::generate_placeholder;
use crate::store::Store;
use crate::transcode::{image_dimensions, transcode, ResizeSpec};

/// Largest upload accepted, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Everything derived from one raw image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessedImage {
    pub placeholder: String,
    pub thumbnail: Vec<u8>,
    pub full: Vec<u8>,
    /// Dimensions of the original input
    pub width: u32,
    pub height: u32,
    pub original_size: usize,
}

pub fn validate_raw(raw: &[u8]) -> Result<(), VaultError> {
    if raw.is_empty() {
        return Err(VaultError::Validation("image data is empty".to_string()));
    }
    if raw.len() > MAX_UPLOAD_BYTES {
        return Err(VaultError::Validation(format!(
            "image is {} bytes, limit is {MAX_UPLOAD_BYTES}",
            raw.len()
        )));
    }
    Ok(())
}

async fn blocking<T, F>(work: F) -> Result<T, VaultError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, VaultError> + Send + 'static,
{
    spawn_blocking(work)
        .await
        .map_err(|err| VaultError::Other(format!("image worker failed: {err}")))?
}

/// Computes the placeholder and both derivatives of `raw`. The three run as
/// separate blocking tasks and are joined before returning.
pub async fn process_image(raw: Arc<[u8]>) -> Result<ProcessedImage, VaultError> {
    let original_size = raw.len();
    let (width, height) = image_dimensions(&raw)?;

    let (placeholder, thumbnail, full) = tokio::try_join!(
        blocking({
            let raw = raw.clone();
            move || generate_placeholder(&raw)
        }),
        blocking({
            let raw = raw.clone();
            move || transcode(&raw, ResizeSpec::THUMBNAIL)
        }),
        blocking({
            let raw = raw.clone();
            move || transcode(&raw, ResizeSpec::FULL)
        }),
    )?;

    debug!(
        width,
        height,
        original_size,
        thumbnail_size = thumbnail.len(),
        full_size = full.len(),
        "processed image"
    );

    Ok(ProcessedImage {
        placeholder,
        thumbnail,
        full,
        width,
        height,
        original_size,
    })
}

/// Validates, processes and inserts a new asset.
#[instrument(level = "debug", skip_all, fields(original_size = raw.len()))]
pub async fn ingest(
    store: &Store,
    raw: Vec<u8>,
    metadata: AssetMetadata,
) -> Result<IngestOutcome, VaultError> {
    let metadata = metadata.validated()?;
    validate_raw(&raw)?;

    let image = process_image(raw.into()).await?;
    let id = store
        .insert_asset(&metadata, &image)
        .await
        .inspect_err(|err| error!(error = %err, "Failed to store new asset"))?;

    info!(
        asset_id = id,
        width = image.width,
        height = image.height,
        "ingested asset"
    );

    Ok(IngestOutcome {
        id,
        width: image.width,
        height: image.height,
        thumbnail_size: image.thumbnail.len(),
        full_size: image.full.len(),
        original_size: image.original_size,
        placeholder: image.placeholder,
    })
}

/// Regenerates every derived field of an existing row from `raw` and
/// overwrites them with one update.
///
/// Stored payloads aren't held to the upload size limit, rows older than
/// the limit still have to be normalized.
#[instrument(level = "debug", skip(store, raw), fields(original_size = raw.len()))]
pub async fn reprocess(store: &Store, id: i64, raw: Vec<u8>) -> Result<ProcessedImage, VaultError> {
    let image = process_image(raw.into()).await?;
    store.update_derivatives(id, &image).await?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder::decode_placeholder;
    use crate::testutil::{legacy_row, png_bytes};
    use crate::transcode::NORMALIZED_MIME_TYPE;

    fn webp_size(bytes: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory_with_format(bytes, image::ImageFormat::WebP)
            .expect("valid webp");
        (img.width(), img.height())
    }

    #[tokio::test]
    async fn test_ingest_large_image() {
        let store = Store::test().await;
        let raw = png_bytes(3000, 2000);
        let original_size = raw.len();

        let outcome = ingest(&store, raw, AssetMetadata::default())
            .await
            .expect("ingest");
        assert_eq!((outcome.width, outcome.height), (3000, 2000));
        assert_eq!(outcome.original_size, original_size);
        assert!(!outcome.placeholder.is_empty());
        decode_placeholder(&outcome.placeholder, 16, 16).expect("placeholder decodes");

        let meta = store
            .get_asset(outcome.id)
            .await
            .expect("get")
            .expect("stored");
        assert_eq!(meta.mime_type.as_deref(), Some(NORMALIZED_MIME_TYPE));
        assert_eq!((meta.width, meta.height), (Some(3000), Some(2000)));
        assert_eq!(meta.byte_size, Some(outcome.full_size as i64));
        assert_eq!(meta.placeholder, Some(outcome.placeholder.clone()));

        let full = store.fetch_full(outcome.id).await.expect("full");
        assert_eq!(webp_size(&full.bytes), (800, 533));
        let thumb = store.fetch_thumbnail(outcome.id).await.expect("thumb");
        assert_eq!(webp_size(&thumb.bytes), (150, 150));
        assert_eq!(thumb.bytes.len(), outcome.thumbnail_size);
    }

    #[tokio::test]
    async fn test_corrupt_input_writes_nothing() {
        let store = Store::test().await;
        let res = ingest(
            &store,
            b"\x89PNG\r\n\x1a\nnot really".to_vec(),
            AssetMetadata::default(),
        )
        .await;
        assert!(matches!(res, Err(VaultError::Decode(_))));
        assert_eq!(store.count_assets().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_validation_happens_first() {
        let store = Store::test().await;

        let res = ingest(&store, Vec::new(), AssetMetadata::default()).await;
        assert!(matches!(res, Err(VaultError::Validation(_))));

        let res = ingest(
            &store,
            vec![0u8; MAX_UPLOAD_BYTES + 1],
            AssetMetadata::default(),
        )
        .await;
        assert!(matches!(res, Err(VaultError::Validation(_))));

        let metadata = AssetMetadata {
            description: Some("x".repeat(1000)),
            ..Default::default()
        };
        let res = ingest(&store, png_bytes(10, 10), metadata).await;
        assert!(matches!(res, Err(VaultError::Validation(_))));

        assert_eq!(store.count_assets().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_ingest_without_placeholder_column() {
        let store = Store::test_legacy().await;
        let outcome = ingest(&store, png_bytes(64, 48), AssetMetadata::default())
            .await
            .expect("ingest on old schema");
        assert!(!outcome.placeholder.is_empty());

        let meta = store
            .get_asset(outcome.id)
            .await
            .expect("get")
            .expect("stored");
        assert_eq!(meta.placeholder, None);
        assert_eq!(meta.mime_type.as_deref(), Some(NORMALIZED_MIME_TYPE));
    }

    #[tokio::test]
    async fn test_reprocess_legacy_row() {
        let store = Store::test().await;
        let raw = png_bytes(900, 300);
        let id = legacy_row(&store, &raw, "image/png").await;

        let image = reprocess(&store, id, raw).await.expect("reprocess");
        assert_eq!((image.width, image.height), (900, 300));

        let meta = store.get_asset(id).await.expect("get").expect("stored");
        assert_eq!(meta.mime_type.as_deref(), Some(NORMALIZED_MIME_TYPE));
        assert_eq!(meta.placeholder, Some(image.placeholder));
        assert_eq!(meta.width, Some(900));
        let full = store.fetch_full(id).await.expect("full");
        assert_eq!(webp_size(&full.bytes), (800, 267));
    }

    #[tokio::test]
    async fn test_reprocess_corrupt_row_is_untouched() {
        let store = Store::test().await;
        let id = legacy_row(&store, b"garbage", "image/jpeg").await;

        let res = reprocess(&store, id, b"garbage".to_vec()).await;
        assert!(matches!(res, Err(VaultError::Decode(_))));

        let meta = store.get_asset(id).await.expect("get").expect("stored");
        assert_eq!(meta.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(meta.placeholder, None);
    }

    #[tokio::test]
    async fn test_reprocess_empty_row_fails_to_decode() {
        let store = Store::test().await;
        let id = legacy_row(&store, b"", "image/png").await;

        let res = reprocess(&store, id, Vec::new()).await;
        assert!(matches!(res, Err(VaultError::Decode(_))));
    }

    #[tokio::test]
    async fn test_reprocess_missing_row() {
        let store = Store::test().await;
        let res = reprocess(&store, 99, png_bytes(8, 8)).await;
        assert!(matches!(res, Err(VaultError::NotFound(_))));
    }
}
