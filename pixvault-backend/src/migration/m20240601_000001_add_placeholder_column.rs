use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .exec_stmt(
                TableAlterStatement::new()
                    .table(Asset::Table)
                    .add_column(ColumnDef::new(Asset::Placeholder).string_len(64).null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .exec_stmt(
                TableAlterStatement::new()
                    .table(Asset::Table)
                    .drop_column(Asset::Placeholder)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Asset {
    Table,
    Placeholder,
}
