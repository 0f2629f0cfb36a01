//! # 用户目录
//!
//! 登录时按邮箱查找用户。用户 CRUD 不在网关职责内，这里只提供查找与
//! 命令行初始化所需的创建操作。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use entity::users;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::auth::permissions::UserRole;
use crate::auth::types::SessionIdentity;
use crate::error::{GatewayError, Result};

/// 用户记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

impl UserRecord {
    /// 会话身份
    #[must_use]
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// 用户查找接口
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// 按邮箱查找（不区分大小写）
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// 新建用户；邮箱重复时返回冲突错误
    async fn create(&self, record: UserRecord) -> Result<UserRecord>;
}

/// 内存用户目录
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: DashMap<String, UserRecord>,
}

impl MemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .users
            .get(&normalize_email(email))
            .map(|entry| entry.value().clone()))
    }

    async fn create(&self, mut record: UserRecord) -> Result<UserRecord> {
        record.email = normalize_email(&record.email);
        match self.users.entry(record.email.clone()) {
            Entry::Occupied(_) => Err(GatewayError::conflict("user", record.email)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }
}

/// 数据库用户目录
#[derive(Debug, Clone)]
pub struct DatabaseUserDirectory {
    db: Arc<DatabaseConnection>,
}

impl DatabaseUserDirectory {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn to_record(model: users::Model) -> Result<UserRecord> {
        let role = UserRole::parse(&model.role).ok_or_else(|| {
            GatewayError::database(format!("user {} has unknown role {}", model.id, model.role))
        })?;
        Ok(UserRecord {
            id: model.id,
            name: model.name,
            email: model.email,
            password_hash: model.password_hash,
            role,
        })
    }
}

#[async_trait]
impl UserDirectory for DatabaseUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .one(self.db.as_ref())
            .await?
            .map(Self::to_record)
            .transpose()
    }

    async fn create(&self, record: UserRecord) -> Result<UserRecord> {
        let email = normalize_email(&record.email);
        if self.find_by_email(&email).await?.is_some() {
            return Err(GatewayError::conflict("user", email));
        }

        let now = Utc::now().naive_utc();
        let model = users::ActiveModel {
            id: Set(record.id),
            name: Set(record.name),
            email: Set(email),
            password_hash: Set(record.password_hash),
            role: Set(record.role.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        Self::to_record(model)
    }
}
