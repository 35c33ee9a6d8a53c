use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // The pre-placeholder layout, rows may still hold raw uploads in full_bytes
        manager
            .create_table(
                Table::create()
                    .table(Asset::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Asset::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Asset::Description).string())
                    .col(ColumnDef::new(Asset::Tag1).string())
                    .col(ColumnDef::new(Asset::Tag2).string())
                    .col(ColumnDef::new(Asset::Tag3).string())
                    .col(
                        ColumnDef::new(Asset::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Asset::FullBytes).blob())
                    .col(ColumnDef::new(Asset::ThumbnailBytes).blob())
                    .col(ColumnDef::new(Asset::MimeType).string())
                    .col(ColumnDef::new(Asset::Width).integer())
                    .col(ColumnDef::new(Asset::Height).integer())
                    .col(ColumnDef::new(Asset::ByteSize).big_integer())
                    .col(
                        ColumnDef::new(Asset::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Asset::ViewCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Asset::DownloadCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Asset::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Asset::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-asset-deleted-created")
                    .table(Asset::Table)
                    .col(Asset::IsDeleted)
                    .col(Asset::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Asset::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Asset {
    Table,
    Id,
    Description,
    Tag1,
    Tag2,
    Tag3,
    Status,
    FullBytes,
    ThumbnailBytes,
    MimeType,
    Width,
    Height,
    ByteSize,
    IsDeleted,
    ViewCount,
    DownloadCount,
    CreatedAt,
    UpdatedAt,
}
