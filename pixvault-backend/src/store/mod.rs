//! Asset store handle
//!
//! Every statement goes through the retry policy, and everything touching
//! the `placeholder` column goes through the schema probe so it keeps working
//! against databases that haven't had that column added yet.

pub mod probe;

use std::path::Path;

use chrono::Utc;
use pixvault_shared::asset::{AssetMetadata, DEFAULT_STATUS};
use pixvault_shared::error::VaultError;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};
use sea_orm_migration::MigratorTrait;
use sea_query::Expr;
use tracing::debug;

use crate::entity::asset::{self, AssetMeta, Column};
use crate::ingest::ProcessedImage;
use crate::migration::Migrator;
use crate::retry::RetryPolicy;
use crate::storage;
use crate::transcode::NORMALIZED_MIME_TYPE;

pub use probe::{ColumnState, ProbeMode, SchemaProbe};

pub const PLACEHOLDER_COLUMN: &str = "placeholder";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreOptions {
    pub retry: RetryPolicy,
    pub probe_mode: ProbeMode,
    pub slow_query_ms: Option<u64>,
}

/// Bytes ready to serve, plus the type to serve them as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetBytes {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Pooled connection to the asset table. Built once at startup and handed to
/// whatever needs it, closed with [`Store::close`].
#[derive(Debug)]
pub struct Store {
    conn: DatabaseConnection,
    retry: RetryPolicy,
    placeholder: SchemaProbe,
}

impl Store {
    pub async fn open(db_path: Option<&Path>, options: StoreOptions) -> Result<Self, VaultError> {
        let conn = options
            .retry
            .run(|| storage::connect(db_path, options.slow_query_ms))
            .await?;
        Ok(Self::with_connection(conn, options))
    }

    pub fn with_connection(conn: DatabaseConnection, options: StoreOptions) -> Self {
        Self {
            conn,
            retry: options.retry,
            placeholder: SchemaProbe::new(PLACEHOLDER_COLUMN, options.probe_mode),
        }
    }

    #[cfg(test)]
    pub async fn test() -> Self {
        let store = Self::open(None, StoreOptions::default())
            .await
            .expect("Failed to start test DB");
        store.migrate().await.expect("Failed to migrate test DB");
        store
    }

    /// A store on the layout from before placeholders existed.
    #[cfg(test)]
    pub async fn test_legacy() -> Self {
        let store = Self::open(None, StoreOptions::default())
            .await
            .expect("Failed to start test DB");
        Migrator::up(store.conn(), Some(1))
            .await
            .expect("Failed to migrate test DB");
        store
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn placeholder_probe(&self) -> &SchemaProbe {
        &self.placeholder
    }

    /// Applies any pending schema migrations.
    pub async fn migrate(&self) -> Result<(), VaultError> {
        Migrator::up(&self.conn, None).await?;
        Ok(())
    }

    pub async fn close(self) -> Result<(), VaultError> {
        self.conn.close().await?;
        Ok(())
    }

    /// Inserts a fully processed asset in one statement, returns its id.
    pub async fn insert_asset(
        &self,
        metadata: &AssetMetadata,
        image: &ProcessedImage,
    ) -> Result<i64, VaultError> {
        let now = Utc::now();
        let build = |with_placeholder: bool| asset::ActiveModel {
            id: NotSet,
            description: Set(metadata.description.clone()),
            tag1: Set(metadata.tag1.clone()),
            tag2: Set(metadata.tag2.clone()),
            tag3: Set(metadata.tag3.clone()),
            status: Set(metadata
                .status
                .clone()
                .unwrap_or_else(|| DEFAULT_STATUS.to_string())),
            full_bytes: Set(Some(image.full.clone())),
            thumbnail_bytes: Set(Some(image.thumbnail.clone())),
            mime_type: Set(Some(NORMALIZED_MIME_TYPE.to_string())),
            width: Set(Some(dimension(image.width))),
            height: Set(Some(dimension(image.height))),
            byte_size: Set(Some(image.full.len() as i64)),
            placeholder: match with_placeholder {
                true => Set(Some(image.placeholder.clone())),
                false => NotSet,
            },
            is_deleted: Set(false),
            view_count: Set(0),
            download_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let id = self
            .placeholder
            .run(
                || self.insert_model(build(true)),
                || self.insert_model(build(false)),
            )
            .await?;
        debug!(asset_id = id, "inserted asset");
        Ok(id)
    }

    async fn insert_model(&self, model: asset::ActiveModel) -> Result<i64, VaultError> {
        let conn = &self.conn;
        self.retry
            .run(|| {
                let model = model.clone();
                async move {
                    let res = asset::Entity::insert(model).exec(conn).await?;
                    Ok::<_, VaultError>(res.last_insert_id)
                }
            })
            .await
    }

    /// Overwrites every derived field of an existing row in one statement.
    pub async fn update_derivatives(
        &self,
        id: i64,
        image: &ProcessedImage,
    ) -> Result<(), VaultError> {
        let build = |with_placeholder: bool| {
            let update = asset::Entity::update_many()
                .col_expr(Column::FullBytes, Expr::value(image.full.clone()))
                .col_expr(Column::ThumbnailBytes, Expr::value(image.thumbnail.clone()))
                .col_expr(Column::MimeType, Expr::value(NORMALIZED_MIME_TYPE))
                .col_expr(Column::Width, Expr::value(dimension(image.width)))
                .col_expr(Column::Height, Expr::value(dimension(image.height)))
                .col_expr(Column::ByteSize, Expr::value(image.full.len() as i64))
                .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(Column::Id.eq(id));
            match with_placeholder {
                true => update.col_expr(Column::Placeholder, Expr::value(image.placeholder.clone())),
                false => update,
            }
        };

        let conn = &self.conn;
        let build = &build;
        let update = |with_placeholder: bool| {
            self.retry.run(move || {
                let stmt = build(with_placeholder);
                async move { Ok::<_, VaultError>(stmt.exec(conn).await?.rows_affected) }
            })
        };

        let rows = self
            .placeholder
            .run(|| update(true), || update(false))
            .await?;
        match rows {
            0 => Err(VaultError::NotFound(format!("asset {id}"))),
            _ => {
                debug!(asset_id = id, "updated asset derivatives");
                Ok(())
            }
        }
    }

    fn meta_select(with_placeholder: bool) -> Select<asset::Entity> {
        let select = asset::Entity::find()
            .select_only()
            .columns(asset::meta_columns());
        match with_placeholder {
            true => select.column(Column::Placeholder),
            // keep the result shape, the field just comes back unset
            false => select.column_as(Expr::value(Option::<String>::None), PLACEHOLDER_COLUMN),
        }
    }

    /// Metadata of a live asset, `None` if it's unknown or soft-deleted.
    pub async fn get_asset(&self, id: i64) -> Result<Option<AssetMeta>, VaultError> {
        let conn = &self.conn;
        let fetch = |with_placeholder: bool| {
            self.retry.run(move || async move {
                Ok::<_, VaultError>(Self::meta_select(with_placeholder)
                    .filter(Column::Id.eq(id))
                    .filter(Column::IsDeleted.eq(false))
                    .into_model::<AssetMeta>()
                    .one(conn)
                    .await?)
            })
        };
        self.placeholder.run(|| fetch(true), || fetch(false)).await
    }

    /// Live assets, newest first.
    pub async fn list_assets(&self, limit: u64, offset: u64) -> Result<Vec<AssetMeta>, VaultError> {
        let conn = &self.conn;
        let fetch = |with_placeholder: bool| {
            self.retry.run(move || async move {
                Ok::<_, VaultError>(Self::meta_select(with_placeholder)
                    .filter(Column::IsDeleted.eq(false))
                    .order_by(Column::CreatedAt, Order::Desc)
                    .order_by(Column::Id, Order::Desc)
                    .limit(limit)
                    .offset(offset)
                    .into_model::<AssetMeta>()
                    .all(conn)
                    .await?)
            })
        };
        self.placeholder.run(|| fetch(true), || fetch(false)).await
    }

    pub async fn count_assets(&self) -> Result<u64, VaultError> {
        let conn = &self.conn;
        self.retry
            .run(|| async move {
                Ok::<_, VaultError>(asset::Entity::find()
                    .filter(Column::IsDeleted.eq(false))
                    .count(conn)
                    .await?)
            })
            .await
    }

    /// Thumbnail bytes, falling back to the full image on rows without one.
    pub async fn fetch_thumbnail(&self, id: i64) -> Result<AssetBytes, VaultError> {
        let conn = &self.conn;
        let row = self
            .retry
            .run(|| async move {
                Ok::<_, VaultError>(asset::Entity::find()
                    .select_only()
                    .column(Column::ThumbnailBytes)
                    .column(Column::FullBytes)
                    .column(Column::MimeType)
                    .filter(Column::Id.eq(id))
                    .filter(Column::IsDeleted.eq(false))
                    .into_tuple::<(Option<Vec<u8>>, Option<Vec<u8>>, Option<String>)>()
                    .one(conn)
                    .await?)
            })
            .await?;

        let (thumbnail, full, mime_type) =
            row.ok_or_else(|| VaultError::NotFound(format!("asset {id}")))?;
        let bytes = thumbnail
            .or(full)
            .ok_or_else(|| VaultError::NotFound(format!("image data for asset {id}")))?;
        Ok(AssetBytes {
            bytes,
            mime_type: mime_type.unwrap_or_else(|| NORMALIZED_MIME_TYPE.to_string()),
        })
    }

    pub async fn fetch_full(&self, id: i64) -> Result<AssetBytes, VaultError> {
        let conn = &self.conn;
        let row = self
            .retry
            .run(|| async move {
                Ok::<_, VaultError>(asset::Entity::find()
                    .select_only()
                    .column(Column::FullBytes)
                    .column(Column::MimeType)
                    .filter(Column::Id.eq(id))
                    .filter(Column::IsDeleted.eq(false))
                    .into_tuple::<(Option<Vec<u8>>, Option<String>)>()
                    .one(conn)
                    .await?)
            })
            .await?;

        let (full, mime_type) = row.ok_or_else(|| VaultError::NotFound(format!("asset {id}")))?;
        let bytes = full.ok_or_else(|| VaultError::NotFound(format!("image data for asset {id}")))?;
        Ok(AssetBytes {
            bytes,
            mime_type: mime_type.unwrap_or_else(|| NORMALIZED_MIME_TYPE.to_string()),
        })
    }

    /// Ids of live rows that hold image bytes but are missing a placeholder
    /// or aren't in the normalized format yet, lowest id first.
    pub async fn backfill_candidates(&self) -> Result<Vec<i64>, VaultError> {
        let conn = &self.conn;
        let fetch = |with_placeholder: bool| {
            self.retry.run(move || async move {
                let mut needs_work = Condition::any()
                    .add(Column::MimeType.is_null())
                    .add(Column::MimeType.ne(NORMALIZED_MIME_TYPE));
                if with_placeholder {
                    needs_work = needs_work.add(Column::Placeholder.is_null());
                }
                Ok::<_, VaultError>(asset::Entity::find()
                    .select_only()
                    .column(Column::Id)
                    .filter(Column::IsDeleted.eq(false))
                    .filter(Column::FullBytes.is_not_null())
                    .filter(needs_work)
                    .order_by(Column::Id, Order::Asc)
                    .into_tuple::<i64>()
                    .all(conn)
                    .await?)
            })
        };
        self.placeholder.run(|| fetch(true), || fetch(false)).await
    }

    /// The stored bytes of a live row, which are the raw upload until the
    /// row has been through the pipeline.
    pub async fn load_source(&self, id: i64) -> Result<Option<Vec<u8>>, VaultError> {
        let conn = &self.conn;
        let row = self
            .retry
            .run(|| async move {
                Ok::<_, VaultError>(asset::Entity::find()
                    .select_only()
                    .column(Column::FullBytes)
                    .filter(Column::Id.eq(id))
                    .filter(Column::IsDeleted.eq(false))
                    .into_tuple::<Option<Vec<u8>>>()
                    .one(conn)
                    .await?)
            })
            .await?;
        Ok(row.flatten())
    }

    /// Flags a live asset as deleted, returns false if there was nothing to delete.
    pub async fn soft_delete(&self, id: i64) -> Result<bool, VaultError> {
        let conn = &self.conn;
        let rows = self
            .retry
            .run(|| async move {
                Ok::<_, VaultError>(asset::Entity::update_many()
                    .col_expr(Column::IsDeleted, Expr::value(true))
                    .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(Column::Id.eq(id))
                    .filter(Column::IsDeleted.eq(false))
                    .exec(conn)
                    .await?
                    .rows_affected)
            })
            .await?;
        Ok(rows > 0)
    }

    pub async fn record_view(&self, id: i64) -> Result<(), VaultError> {
        self.bump_counter(id, Column::ViewCount).await
    }

    pub async fn record_download(&self, id: i64) -> Result<(), VaultError> {
        self.bump_counter(id, Column::DownloadCount).await
    }

    async fn bump_counter(&self, id: i64, column: Column) -> Result<(), VaultError> {
        let conn = &self.conn;
        self.retry
            .run(|| async move {
                asset::Entity::update_many()
                    .col_expr(column, Expr::col(column).add(1))
                    .filter(Column::Id.eq(id))
                    .filter(Column::IsDeleted.eq(false))
                    .exec(conn)
                    .await?;
                Ok::<_, VaultError>(())
            })
            .await
    }
}

fn dimension(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
