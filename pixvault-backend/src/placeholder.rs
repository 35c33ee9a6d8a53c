//! BlurHash placeholders, computed from the original upload.

use image::imageops::FilterType;
use pixvault_shared::error::VaultError;

use crate::transcode::decode;

pub const PLACEHOLDER_GRID: u32 = 32;
pub const PLACEHOLDER_COMPONENTS: u32 = 4;
/// Width of the `placeholder` column
pub const PLACEHOLDER_MAX_LEN: usize = 64;

pub fn generate_placeholder(raw: &[u8]) -> Result<String, VaultError> {
    let grid = decode(raw)?
        .resize_to_fill(PLACEHOLDER_GRID, PLACEHOLDER_GRID, FilterType::Triangle)
        .to_rgba8();

    let hash = blurhash::encode(
        PLACEHOLDER_COMPONENTS,
        PLACEHOLDER_COMPONENTS,
        grid.width(),
        grid.height(),
        grid.as_raw(),
    )
    .map_err(|err| VaultError::Other(format!("placeholder encoding failed: {err:?}")))?;

    match hash.len() <= PLACEHOLDER_MAX_LEN {
        true => Ok(hash),
        false => Err(VaultError::Other(format!(
            "placeholder is {} characters, limit is {PLACEHOLDER_MAX_LEN}",
            hash.len()
        ))),
    }
}

/// Renders a placeholder as `width` x `height` RGBA pixels.
pub fn decode_placeholder(hash: &str, width: u32, height: u32) -> Result<Vec<u8>, VaultError> {
    blurhash::decode(hash, width, height, 1.0)
        .map_err(|err| VaultError::Decode(format!("invalid placeholder {hash:?}: {err:?}")))
}
