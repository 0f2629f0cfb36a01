//! 服务商目录：按名称（不区分大小写）或ID查找。

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use entity::providers;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};

use super::types::{ProviderDescriptor, ProviderKind, canonical_name};
use crate::error::{GatewayError, Result};

/// 服务商目录接口
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<ProviderDescriptor>>;

    async fn find_by_id(&self, id: i32) -> Result<Option<ProviderDescriptor>>;

    async fn list(&self) -> Result<Vec<ProviderDescriptor>>;

    /// 新建服务商；同名时返回冲突错误
    async fn create(&self, name: &str, kind: ProviderKind) -> Result<ProviderDescriptor>;
}

/// 内存服务商目录
#[derive(Debug)]
pub struct MemoryProviderDirectory {
    by_name: DashMap<String, ProviderDescriptor>,
    next_id: AtomicI32,
}

impl Default for MemoryProviderDirectory {
    fn default() -> Self {
        Self {
            by_name: DashMap::new(),
            next_id: AtomicI32::new(1),
        }
    }
}

impl MemoryProviderDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProviderDirectory for MemoryProviderDirectory {
    async fn find_by_name(&self, name: &str) -> Result<Option<ProviderDescriptor>> {
        Ok(self
            .by_name
            .get(&canonical_name(name))
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<ProviderDescriptor>> {
        Ok(self
            .by_name
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> Result<Vec<ProviderDescriptor>> {
        let mut providers: Vec<_> = self.by_name.iter().map(|e| e.value().clone()).collect();
        providers.sort_by_key(|p| p.id);
        Ok(providers)
    }

    async fn create(&self, name: &str, kind: ProviderKind) -> Result<ProviderDescriptor> {
        let name = canonical_name(name);
        match self.by_name.entry(name.clone()) {
            Entry::Occupied(_) => Err(GatewayError::conflict("provider", name)),
            Entry::Vacant(slot) => {
                let descriptor = ProviderDescriptor {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    name,
                    kind,
                    created_at: Utc::now(),
                };
                slot.insert(descriptor.clone());
                Ok(descriptor)
            }
        }
    }
}

/// 数据库服务商目录
#[derive(Debug, Clone)]
pub struct DatabaseProviderDirectory {
    db: Arc<DatabaseConnection>,
}

impl DatabaseProviderDirectory {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn to_descriptor(model: providers::Model) -> Result<ProviderDescriptor> {
        let kind = ProviderKind::parse(&model.kind).ok_or_else(|| {
            GatewayError::database(format!(
                "provider {} has unknown kind {}",
                model.name, model.kind
            ))
        })?;
        Ok(ProviderDescriptor {
            id: model.id,
            name: model.name,
            kind,
            created_at: model.created_at.and_utc(),
        })
    }
}

#[async_trait]
impl ProviderDirectory for DatabaseProviderDirectory {
    async fn find_by_name(&self, name: &str) -> Result<Option<ProviderDescriptor>> {
        providers::Entity::find()
            .filter(providers::Column::Name.eq(canonical_name(name)))
            .one(self.db.as_ref())
            .await?
            .map(Self::to_descriptor)
            .transpose()
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<ProviderDescriptor>> {
        providers::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(Self::to_descriptor)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<ProviderDescriptor>> {
        providers::Entity::find()
            .order_by_asc(providers::Column::Id)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(Self::to_descriptor)
            .collect()
    }

    async fn create(&self, name: &str, kind: ProviderKind) -> Result<ProviderDescriptor> {
        let name = canonical_name(name);
        let model = providers::ActiveModel {
            name: Set(name.clone()),
            kind: Set(kind.as_str().to_string()),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                GatewayError::conflict("provider", name.clone())
            }
            _ => GatewayError::database_with_source("failed to create provider", err),
        })?;

        Self::to_descriptor(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_directory_lookup() {
        let directory = MemoryProviderDirectory::new();
        let created = directory.create("Gemini", ProviderKind::Gemini).await.unwrap();
        assert_eq!(created.name, "gemini");

        let by_name = directory.find_by_name("GEMINI").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);

        let by_id = directory.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.kind, ProviderKind::Gemini);

        assert!(directory.find_by_name("claude").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_directory_duplicate() {
        let directory = MemoryProviderDirectory::new();
        directory.create("openai", ProviderKind::OpenAi).await.unwrap();
        directory.create("mistral", ProviderKind::Mistral).await.unwrap();

        let err = directory.create("OpenAI", ProviderKind::OpenAi).await.unwrap_err();
        assert!(matches!(err, GatewayError::Conflict { .. }));

        let names: Vec<_> = directory
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["openai", "mistral"]);
    }
}
