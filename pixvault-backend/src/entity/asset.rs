use chrono::{DateTime, Utc};
use pixvault_shared::asset::AssetSummary;
use sea_orm::{entity::prelude::*, FromQueryResult, Iterable};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "asset")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub description: Option<String>,
    pub tag1: Option<String>,
    pub tag2: Option<String>,
    pub tag3: Option<String>,
    pub status: String,
    /// Normalized full image, or the raw upload on rows that predate the pipeline
    #[sea_orm(column_type = "VarBinary(StringLen::Max)", nullable)]
    pub full_bytes: Option<Vec<u8>>,
    #[sea_orm(column_type = "VarBinary(StringLen::Max)", nullable)]
    pub thumbnail_bytes: Option<Vec<u8>>,
    pub mime_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub byte_size: Option<i64>,
    /// Optional column, older schemas don't have it
    pub placeholder: Option<String>,
    pub is_deleted: bool,
    pub view_count: i64,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Columns that are safe to select on any schema version.
pub fn base_columns() -> impl Iterator<Item = Column> {
    Column::iter().filter(|c| !matches!(c, Column::Placeholder))
}

/// Everything except the image payloads.
pub fn meta_columns() -> impl Iterator<Item = Column> {
    base_columns().filter(|c| !matches!(c, Column::FullBytes | Column::ThumbnailBytes))
}

/// Asset row without the binary columns, used for listings and lookups.
#[derive(Clone, Debug, PartialEq, Eq, FromQueryResult)]
pub struct AssetMeta {
    pub id: i64,
    pub description: Option<String>,
    pub tag1: Option<String>,
    pub tag2: Option<String>,
    pub tag3: Option<String>,
    pub status: String,
    pub mime_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub byte_size: Option<i64>,
    pub placeholder: Option<String>,
    pub is_deleted: bool,
    pub view_count: i64,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AssetMeta> for AssetSummary {
    fn from(meta: AssetMeta) -> Self {
        let tags = [meta.tag1, meta.tag2, meta.tag3]
            .into_iter()
            .flatten()
            .collect();
        Self {
            id: meta.id,
            description: meta.description,
            tags,
            status: meta.status,
            width: meta.width,
            height: meta.height,
            byte_size: meta.byte_size,
            mime_type: meta.mime_type,
            placeholder: meta.placeholder,
            view_count: meta.view_count,
            download_count: meta.download_count,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
            thumbnail_url: AssetSummary::thumbnail_url(meta.id),
            image_url: AssetSummary::image_url(meta.id),
        }
    }
}
