//! 应用上下文（DI 容器）
//!
//! 统一持有跨模块共享的服务实例，便于在测试中注入替身实现。

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::auth::users::{DatabaseUserDirectory, MemoryUserDirectory, UserDirectory};
use crate::auth::{AuthService, TokenService};
use crate::config::{AppConfig, SecurityConfig};
use crate::error::Result;
use crate::provider::{
    DatabaseProviderDirectory, MemoryProviderDirectory, ProviderDirectory, ProviderService,
};
use crate::relay::{HttpUpstream, StreamingRelay, UpstreamClient};
use crate::vault::{CredentialStore, CredentialVault, DatabaseCredentialStore, MemoryCredentialStore};

/// 三类存储的实现组合
#[derive(Clone)]
pub struct StoreSet {
    pub users: Arc<dyn UserDirectory>,
    pub providers: Arc<dyn ProviderDirectory>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl StoreSet {
    /// 内存实现
    #[must_use]
    pub fn memory() -> Self {
        Self {
            users: Arc::new(MemoryUserDirectory::new()),
            providers: Arc::new(MemoryProviderDirectory::new()),
            credentials: Arc::new(MemoryCredentialStore::new()),
        }
    }

    /// 数据库实现
    #[must_use]
    pub fn database(db: &Arc<DatabaseConnection>) -> Self {
        Self {
            users: Arc::new(DatabaseUserDirectory::new(Arc::clone(db))),
            providers: Arc::new(DatabaseProviderDirectory::new(Arc::clone(db))),
            credentials: Arc::new(DatabaseCredentialStore::new(Arc::clone(db))),
        }
    }
}

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub vault: Arc<CredentialVault>,
    pub providers: Arc<ProviderService>,
    pub relay: Arc<StreamingRelay>,
}

impl AppContext {
    /// 由配置、存储与上游客户端组装
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        security: &SecurityConfig,
        stores: StoreSet,
        upstream: Arc<dyn UpstreamClient>,
    ) -> Self {
        let tokens = Arc::new(TokenService::from_config(security));
        let cipher = Arc::new(security.cipher());
        let vault = Arc::new(CredentialVault::new(stores.credentials, cipher));
        let auth = Arc::new(AuthService::new(stores.users, tokens));
        let providers = Arc::new(ProviderService::new(
            Arc::clone(&stores.providers),
            Arc::clone(&vault),
        ));
        let relay = Arc::new(StreamingRelay::new(
            stores.providers,
            Arc::clone(&vault),
            upstream,
            Arc::new(config.upstream.clone()),
        ));

        Self {
            config,
            auth,
            vault,
            providers,
            relay,
        }
    }

    /// 使用数据库存储与 HTTP 上游
    pub fn with_database(
        config: Arc<AppConfig>,
        security: &SecurityConfig,
        db: Arc<DatabaseConnection>,
    ) -> Result<Self> {
        let upstream = HttpUpstream::new(Duration::from_secs(config.upstream.connect_timeout_secs))?;
        Ok(Self::new(
            config,
            security,
            StoreSet::database(&db),
            Arc::new(upstream),
        ))
    }
}
