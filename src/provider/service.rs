//! 服务商注册与查找

use std::sync::Arc;

use super::registry::ProviderDirectory;
use super::types::{ProviderDescriptor, ProviderKind};
use crate::error::{GatewayError, Result};
use crate::linfo;
use crate::logging::{LogComponent, LogStage};
use crate::vault::{CredentialVault, Owner, WriteMode};

/// 服务商服务
pub struct ProviderService {
    directory: Arc<dyn ProviderDirectory>,
    vault: Arc<CredentialVault>,
}

impl ProviderService {
    #[must_use]
    pub fn new(directory: Arc<dyn ProviderDirectory>, vault: Arc<CredentialVault>) -> Self {
        Self { directory, vault }
    }

    /// 所有服务商
    pub async fn list(&self) -> Result<Vec<ProviderDescriptor>> {
        self.directory.list().await
    }

    /// 按名称查找，不存在时返回未找到错误
    pub async fn require(&self, name: &str) -> Result<ProviderDescriptor> {
        self.directory
            .find_by_name(name)
            .await?
            .ok_or_else(|| GatewayError::not_found("provider", name.trim()))
    }

    /// 注册服务商并加密保存其默认密钥
    pub async fn register(
        &self,
        name: &str,
        kind: ProviderKind,
        default_secret: &str,
        request_id: &str,
    ) -> Result<ProviderDescriptor> {
        if name.trim().is_empty() {
            return Err(GatewayError::validation_field("provider name must not be empty", "name"));
        }
        if default_secret.trim().is_empty() {
            return Err(GatewayError::validation_field(
                "default secret must not be empty",
                "default_secret",
            ));
        }

        let descriptor = self.directory.create(name, kind).await?;
        self.vault
            .store(
                &Owner::Default,
                descriptor.id,
                default_secret,
                WriteMode::Create,
                request_id,
            )
            .await?;

        linfo!(
            request_id,
            LogStage::CredentialWrite,
            LogComponent::Provider,
            "register",
            format!("🆕 服务商已注册 name={} kind={}", descriptor.name, descriptor.kind)
        );
        Ok(descriptor)
    }
}
