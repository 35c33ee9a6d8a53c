//! Raw image bytes in, size-bounded lossy WebP out.
//!

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use pixvault_shared::error::VaultError;
use webp::{Encoder, WebPConfig};

pub const NORMALIZED_MIME_TYPE: &str = "image/webp";
pub const FULL_MAX_SIDE: u32 = 800;
pub const THUMBNAIL_SIDE: u32 = 150;
pub const WEBP_QUALITY: f32 = 85.0;
pub const WEBP_METHOD: i32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeSpec {
    /// Longest side capped at `max_side`, aspect kept, never enlarged
    Bounding { max_side: u32 },
    /// Exactly `side` x `side`, scaled to cover then center-cropped
    CoverCrop { side: u32 },
}

impl ResizeSpec {
    pub const FULL: ResizeSpec = ResizeSpec::Bounding {
        max_side: FULL_MAX_SIDE,
    };
    pub const THUMBNAIL: ResizeSpec = ResizeSpec::CoverCrop {
        side: THUMBNAIL_SIDE,
    };

    pub fn apply(&self, img: DynamicImage) -> DynamicImage {
        match *self {
            ResizeSpec::Bounding { max_side } => {
                if img.width() <= max_side && img.height() <= max_side {
                    img
                } else {
                    img.resize(max_side, max_side, FilterType::Lanczos3)
                }
            }
            ResizeSpec::CoverCrop { side } => img.resize_to_fill(side, side, FilterType::Lanczos3),
        }
    }
}

pub fn decode(raw: &[u8]) -> Result<DynamicImage, VaultError> {
    if raw.is_empty() {
        return Err(VaultError::Decode("empty input".to_string()));
    }
    image::load_from_memory(raw).map_err(|err| VaultError::Decode(err.to_string()))
}

/// Width and height of the original, read from the header only.
pub fn image_dimensions(raw: &[u8]) -> Result<(u32, u32), VaultError> {
    ImageReader::new(Cursor::new(raw))
        .with_guessed_format()
        .map_err(|err| VaultError::Decode(err.to_string()))?
        .into_dimensions()
        .map_err(|err| VaultError::Decode(err.to_string()))
}

/// Decodes, resizes per `spec` and re-encodes as WebP. Nothing is returned
/// unless every step succeeded.
pub fn transcode(raw: &[u8], spec: ResizeSpec) -> Result<Vec<u8>, VaultError> {
    let img = spec.apply(decode(raw)?);
    encode_webp(&img)
}

pub fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, VaultError> {
    let mut config = WebPConfig::new()
        .map_err(|_| VaultError::Other("failed to initialise the WebP encoder".to_string()))?;
    config.quality = WEBP_QUALITY;
    config.method = WEBP_METHOD;

    let (width, height) = (img.width(), img.height());
    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        Encoder::from_rgba(rgba.as_raw(), width, height).encode_advanced(&config)
    } else {
        let rgb = img.to_rgb8();
        Encoder::from_rgb(rgb.as_raw(), width, height).encode_advanced(&config)
    };

    encoded
        .map(|memory| memory.to_vec())
        .map_err(|err| VaultError::Other(format!("WebP encoding failed: {err:?}")))
}
