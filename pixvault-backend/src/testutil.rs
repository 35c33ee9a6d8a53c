//! Shared fixtures for the unit and API tests.

use std::io::Cursor;

use chrono::Utc;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::EntityTrait;

use crate::entity::asset;
use crate::store::Store;

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).expect("fixture encodes");
    out.into_inner()
}

/// A gradient PNG, so compressed output isn't trivially small.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

/// A small valid PNG padded after its end chunk until it is at least
/// `min_len` bytes long.
pub fn padded_png_bytes(width: u32, height: u32, min_len: usize) -> Vec<u8> {
    let mut bytes = png_bytes(width, height);
    if bytes.len() < min_len {
        bytes.resize(min_len, 0);
    }
    bytes
}

pub fn rgba_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, 90, (y % 256) as u8, ((x * 4) % 256) as u8])
    });
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(y % 256) as u8, (x % 256) as u8, 128])
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

/// Inserts a row the way the old upload path stored them: raw bytes in
/// `full_bytes`, no thumbnail, no placeholder.
pub async fn legacy_row(store: &Store, raw: &[u8], mime_type: &str) -> i64 {
    let now = Utc::now();
    let model = asset::ActiveModel {
        id: NotSet,
        description: Set(Some("legacy upload".to_string())),
        tag1: Set(None),
        tag2: Set(None),
        tag3: Set(None),
        status: Set("approved".to_string()),
        full_bytes: Set(Some(raw.to_vec())),
        thumbnail_bytes: Set(None),
        mime_type: Set(Some(mime_type.to_string())),
        width: Set(None),
        height: Set(None),
        byte_size: Set(Some(raw.len() as i64)),
        placeholder: NotSet,
        is_deleted: Set(false),
        view_count: Set(0),
        download_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };
    asset::Entity::insert(model)
        .exec(store.conn())
        .await
        .expect("legacy row inserts")
        .last_insert_id
}
