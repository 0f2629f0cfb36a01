//! # 凭据存储
//!
//! 存储层只处理密文；每个 (owner, provider) 键上的写入是原子的，后写者生效。

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::types::{EncryptedSecretRecord, Owner, WriteMode};
use crate::error::{GatewayError, Result};

/// 凭据键的展示形式，用于错误信息
#[must_use]
pub fn record_label(owner: &Owner, provider_id: i32) -> String {
    format!("{owner}/{provider_id}")
}

/// 凭据持久化接口
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 读取记录
    async fn get(&self, owner: &Owner, provider_id: i32) -> Result<Option<EncryptedSecretRecord>>;

    /// 按写入模式写入记录
    async fn put(&self, record: EncryptedSecretRecord, mode: WriteMode) -> Result<()>;

    /// 删除记录，返回是否存在过
    async fn delete(&self, owner: &Owner, provider_id: i32) -> Result<bool>;
}

/// 内存凭据存储
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: DashMap<(String, i32), EncryptedSecretRecord>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, owner: &Owner, provider_id: i32) -> Result<Option<EncryptedSecretRecord>> {
        Ok(self
            .records
            .get(&(owner.as_key().to_string(), provider_id))
            .map(|entry| entry.value().clone()))
    }

    async fn put(&self, record: EncryptedSecretRecord, mode: WriteMode) -> Result<()> {
        let key = (record.owner.as_key().to_string(), record.provider_id);
        match (self.records.entry(key), mode) {
            (Entry::Occupied(_), WriteMode::Create) => Err(GatewayError::conflict(
                "credential",
                record_label(&record.owner, record.provider_id),
            )),
            (Entry::Vacant(_), WriteMode::Update) => Err(GatewayError::not_found(
                "credential",
                record_label(&record.owner, record.provider_id),
            )),
            (Entry::Occupied(mut slot), _) => {
                slot.insert(record);
                Ok(())
            }
            (Entry::Vacant(slot), _) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn delete(&self, owner: &Owner, provider_id: i32) -> Result<bool> {
        Ok(self
            .records
            .remove(&(owner.as_key().to_string(), provider_id))
            .is_some())
    }
}
