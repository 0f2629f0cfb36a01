//! # 数据库凭据存储
//!
//! 每次写入都是单条 SQL 语句，依赖 `(owner, provider_id)` 唯一索引保证原子性。

use std::sync::Arc;

use async_trait::async_trait;
use entity::credentials;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};

use super::store::{CredentialStore, record_label};
use super::types::{EncryptedSecretRecord, Owner, WriteMode};
use crate::error::{GatewayError, Result};

/// 基于 sea-orm 的凭据存储
#[derive(Debug, Clone)]
pub struct DatabaseCredentialStore {
    db: Arc<DatabaseConnection>,
}

impl DatabaseCredentialStore {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn to_record(model: credentials::Model) -> EncryptedSecretRecord {
        EncryptedSecretRecord {
            owner: Owner::from_key(&model.owner),
            provider_id: model.provider_id,
            ciphertext: model.ciphertext,
            iv: model.iv,
            updated_at: model.updated_at.and_utc(),
        }
    }

    fn map_write_error(err: DbErr, record: &EncryptedSecretRecord) -> GatewayError {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => GatewayError::conflict(
                "credential",
                record_label(&record.owner, record.provider_id),
            ),
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                GatewayError::not_found("provider", record.provider_id.to_string())
            }
            _ => GatewayError::database_with_source("failed to write credential", err),
        }
    }

    async fn insert(&self, record: &EncryptedSecretRecord) -> Result<()> {
        let now = record.updated_at.naive_utc();
        credentials::ActiveModel {
            owner: Set(record.owner.as_key().to_string()),
            provider_id: Set(record.provider_id),
            ciphertext: Set(record.ciphertext.clone()),
            iv: Set(record.iv.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| Self::map_write_error(e, record))?;
        Ok(())
    }

    async fn update(&self, record: &EncryptedSecretRecord) -> Result<()> {
        let result = credentials::Entity::update_many()
            .col_expr(credentials::Column::Ciphertext, Expr::value(record.ciphertext.clone()))
            .col_expr(credentials::Column::Iv, Expr::value(record.iv.clone()))
            .col_expr(
                credentials::Column::UpdatedAt,
                Expr::value(record.updated_at.naive_utc()),
            )
            .filter(credentials::Column::Owner.eq(record.owner.as_key()))
            .filter(credentials::Column::ProviderId.eq(record.provider_id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(GatewayError::not_found(
                "credential",
                record_label(&record.owner, record.provider_id),
            ));
        }
        Ok(())
    }

    async fn upsert(&self, record: &EncryptedSecretRecord) -> Result<()> {
        let now = record.updated_at.naive_utc();
        let model = credentials::ActiveModel {
            owner: Set(record.owner.as_key().to_string()),
            provider_id: Set(record.provider_id),
            ciphertext: Set(record.ciphertext.clone()),
            iv: Set(record.iv.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        credentials::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([credentials::Column::Owner, credentials::Column::ProviderId])
                    .update_columns([
                        credentials::Column::Ciphertext,
                        credentials::Column::Iv,
                        credentials::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.db.as_ref())
            .await
            .map_err(|e| Self::map_write_error(e, record))?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for DatabaseCredentialStore {
    async fn get(&self, owner: &Owner, provider_id: i32) -> Result<Option<EncryptedSecretRecord>> {
        let model = credentials::Entity::find()
            .filter(credentials::Column::Owner.eq(owner.as_key()))
            .filter(credentials::Column::ProviderId.eq(provider_id))
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Self::to_record))
    }

    async fn put(&self, record: EncryptedSecretRecord, mode: WriteMode) -> Result<()> {
        match mode {
            WriteMode::Create => self.insert(&record).await,
            WriteMode::Update => self.update(&record).await,
            WriteMode::Upsert => self.upsert(&record).await,
        }
    }

    async fn delete(&self, owner: &Owner, provider_id: i32) -> Result<bool> {
        let result = credentials::Entity::delete_many()
            .filter(credentials::Column::Owner.eq(owner.as_key()))
            .filter(credentials::Column::ProviderId.eq(provider_id))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }
}
