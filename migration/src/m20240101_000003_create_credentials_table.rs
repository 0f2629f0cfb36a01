use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Credentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Credentials::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Credentials::Owner).string_len(64).not_null())
                    .col(ColumnDef::new(Credentials::ProviderId).integer().not_null())
                    .col(ColumnDef::new(Credentials::Ciphertext).text().not_null())
                    .col(ColumnDef::new(Credentials::Iv).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Credentials::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Credentials::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_credentials_provider_id")
                            .from(Credentials::Table, Credentials::ProviderId)
                            .to(Providers::Table, Providers::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 每个 (owner, provider) 只允许一条记录
        manager
            .create_index(
                Index::create()
                    .name("idx_credentials_owner_provider")
                    .table(Credentials::Table)
                    .col(Credentials::Owner)
                    .col(Credentials::ProviderId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Credentials::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Credentials {
    Table,
    Id,
    Owner,
    ProviderId,
    Ciphertext,
    Iv,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Providers {
    Table,
    Id,
}
