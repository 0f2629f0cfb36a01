//! # 凭据保险库
//!
//! 写入时加密，读取时解密并按「用户 → 默认」顺序解析。

use std::sync::Arc;

use chrono::Utc;

use super::store::CredentialStore;
use super::types::{
    EncryptedSecretRecord, FallbackReason, Owner, ProviderSecret, Resolution, WriteMode,
};
use crate::cipher::{EncryptedValue, SecretCipher};
use crate::error::{GatewayError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lerror, linfo, lwarn};

/// 用户记录的读取结果
enum OwnLookup {
    Secret(ProviderSecret),
    Missing,
    Undecryptable,
}

/// 凭据保险库
pub struct CredentialVault {
    store: Arc<dyn CredentialStore>,
    cipher: Arc<SecretCipher>,
}

impl CredentialVault {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, cipher: Arc<SecretCipher>) -> Self {
        Self { store, cipher }
    }

    fn open(&self, record: &EncryptedSecretRecord) -> Result<ProviderSecret> {
        let value = EncryptedValue {
            ciphertext: record.ciphertext.clone(),
            iv: record.iv.clone(),
        };
        Ok(ProviderSecret::new(self.cipher.open(&value)?))
    }

    /// 加密并写入
    pub async fn store(
        &self,
        owner: &Owner,
        provider_id: i32,
        secret: &str,
        mode: WriteMode,
        request_id: &str,
    ) -> Result<()> {
        if secret.trim().is_empty() {
            return Err(GatewayError::validation_field("secret must not be empty", "secret"));
        }

        let sealed = self.cipher.seal(secret)?;
        let record = EncryptedSecretRecord {
            owner: owner.clone(),
            provider_id,
            ciphertext: sealed.ciphertext,
            iv: sealed.iv,
            updated_at: Utc::now(),
        };
        self.store.put(record, mode).await?;

        linfo!(
            request_id,
            LogStage::CredentialWrite,
            LogComponent::Vault,
            "store",
            format!("凭据已写入 owner={owner} provider_id={provider_id} mode={mode:?}")
        );
        Ok(())
    }

    /// 删除凭据，不存在时为空操作
    pub async fn remove(&self, owner: &Owner, provider_id: i32, request_id: &str) -> Result<bool> {
        let existed = self.store.delete(owner, provider_id).await?;
        linfo!(
            request_id,
            LogStage::CredentialWrite,
            LogComponent::Vault,
            "remove",
            format!("凭据删除 owner={owner} provider_id={provider_id} existed={existed}")
        );
        Ok(existed)
    }

    async fn lookup_own(&self, owner: &Owner, provider_id: i32, request_id: &str) -> Result<OwnLookup> {
        let Some(record) = self.store.get(owner, provider_id).await? else {
            return Ok(OwnLookup::Missing);
        };

        match self.open(&record) {
            Ok(secret) => Ok(OwnLookup::Secret(secret)),
            Err(err) => {
                lwarn!(
                    request_id,
                    LogStage::CredentialResolution,
                    LogComponent::Vault,
                    "resolve",
                    format!("用户凭据无法解密，回退默认凭据 owner={owner} provider_id={provider_id}: {err}")
                );
                Ok(OwnLookup::Undecryptable)
            }
        }
    }

    /// 解析 (owner, provider) 应使用的密钥
    ///
    /// 用户记录缺失或无法解密时回退到服务商默认记录；默认记录无法解密属于
    /// 服务端故障，返回解密错误。
    pub async fn resolve(&self, owner: &Owner, provider_id: i32, request_id: &str) -> Result<Resolution> {
        let reason = match owner {
            Owner::Default => FallbackReason::Missing,
            Owner::User(_) => match self.lookup_own(owner, provider_id, request_id).await? {
                OwnLookup::Secret(secret) => {
                    ldebug!(
                        request_id,
                        LogStage::CredentialResolution,
                        LogComponent::Vault,
                        "resolve",
                        format!("使用用户凭据 owner={owner} provider_id={provider_id}")
                    );
                    return Ok(Resolution::Found(secret));
                }
                OwnLookup::Missing => FallbackReason::Missing,
                OwnLookup::Undecryptable => FallbackReason::Undecryptable,
            },
        };

        let Some(record) = self.store.get(&Owner::Default, provider_id).await? else {
            lwarn!(
                request_id,
                LogStage::CredentialResolution,
                LogComponent::Vault,
                "resolve",
                format!("无可用凭据 owner={owner} provider_id={provider_id}")
            );
            return Ok(Resolution::NotFound);
        };

        let secret = self.open(&record).inspect_err(|err| {
            lerror!(
                request_id,
                LogStage::CredentialResolution,
                LogComponent::Vault,
                "resolve",
                format!("默认凭据无法解密 provider_id={provider_id}: {err}")
            );
        })?;

        ldebug!(
            request_id,
            LogStage::CredentialResolution,
            LogComponent::Vault,
            "resolve",
            format!("回退默认凭据 owner={owner} provider_id={provider_id} reason={reason:?}")
        );
        Ok(Resolution::FellBackToDefault { secret, reason })
    }

    /// 解析并要求存在可用密钥
    pub async fn resolve_secret(
        &self,
        owner: &Owner,
        provider_id: i32,
        provider_name: &str,
        request_id: &str,
    ) -> Result<ProviderSecret> {
        match self.resolve(owner, provider_id, request_id).await? {
            Resolution::Found(secret) | Resolution::FellBackToDefault { secret, .. } => Ok(secret),
            Resolution::NotFound => Err(GatewayError::no_credential(provider_name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::store::MemoryCredentialStore;
    use pretty_assertions::assert_eq;

    fn vault_with_store() -> (CredentialVault, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let cipher = Arc::new(SecretCipher::new(&[3u8; 32]));
        (CredentialVault::new(store.clone(), cipher), store)
    }

    #[tokio::test]
    async fn test_three_outcomes() {
        let (vault, _) = vault_with_store();
        let user = Owner::user("u1");

        assert_eq!(vault.resolve(&user, 1, "t").await.unwrap(), Resolution::NotFound);

        vault
            .store(&Owner::Default, 1, "default-key", WriteMode::Create, "t")
            .await
            .unwrap();
        assert_eq!(
            vault.resolve(&user, 1, "t").await.unwrap(),
            Resolution::FellBackToDefault {
                secret: ProviderSecret::new("default-key"),
                reason: FallbackReason::Missing,
            }
        );

        vault
            .store(&user, 1, "user-key", WriteMode::Create, "t")
            .await
            .unwrap();
        assert_eq!(
            vault.resolve(&user, 1, "t").await.unwrap(),
            Resolution::Found(ProviderSecret::new("user-key"))
        );
    }

    #[tokio::test]
    async fn test_store_then_delete_falls_back() {
        let (vault, _) = vault_with_store();
        let user = Owner::user("u1");
        vault
            .store(&Owner::Default, 7, "default-key", WriteMode::Upsert, "t")
            .await
            .unwrap();
        vault
            .store(&user, 7, "mine", WriteMode::Create, "t")
            .await
            .unwrap();

        assert!(vault.remove(&user, 7, "t").await.unwrap());

        let resolution = vault.resolve(&user, 7, "t").await.unwrap();
        assert_eq!(resolution.secret().unwrap().expose(), "default-key");
        assert_eq!(resolution.source(), "default");
    }

    #[tokio::test]
    async fn test_corrupted_user_record_falls_back() {
        let (vault, store) = vault_with_store();
        let user = Owner::user("u2");
        vault
            .store(&Owner::Default, 1, "default-key", WriteMode::Create, "t")
            .await
            .unwrap();

        let foreign = SecretCipher::new(&[9u8; 32]).seal("foreign").unwrap();
        store
            .put(
                EncryptedSecretRecord {
                    owner: user.clone(),
                    provider_id: 1,
                    ciphertext: foreign.ciphertext,
                    iv: foreign.iv,
                    updated_at: Utc::now(),
                },
                WriteMode::Upsert,
            )
            .await
            .unwrap();

        assert_eq!(
            vault.resolve(&user, 1, "t").await.unwrap(),
            Resolution::FellBackToDefault {
                secret: ProviderSecret::new("default-key"),
                reason: FallbackReason::Undecryptable,
            }
        );
    }

    #[tokio::test]
    async fn test_corrupted_default_is_server_error() {
        let (vault, store) = vault_with_store();
        store
            .put(
                EncryptedSecretRecord {
                    owner: Owner::Default,
                    provider_id: 1,
                    ciphertext: "AAAA".to_string(),
                    iv: "AAAA".to_string(),
                    updated_at: Utc::now(),
                },
                WriteMode::Create,
            )
            .await
            .unwrap();

        let err = vault.resolve(&Owner::user("u3"), 1, "t").await.unwrap_err();
        assert!(matches!(err, GatewayError::Decryption { .. }));
    }

    #[tokio::test]
    async fn test_resolve_secret_reports_no_credential() {
        let (vault, _) = vault_with_store();
        let err = vault
            .resolve_secret(&Owner::user("u1"), 1, "gemini", "t")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoCredential { .. }));
    }

    #[tokio::test]
    async fn test_stored_value_is_ciphertext() {
        let (vault, store) = vault_with_store();
        vault
            .store(&Owner::user("u1"), 1, "sk-plain", WriteMode::Create, "t")
            .await
            .unwrap();

        let record = store.get(&Owner::user("u1"), 1).await.unwrap().unwrap();
        assert!(!record.ciphertext.contains("sk-plain"));
    }

    #[tokio::test]
    async fn test_empty_secret_rejected() {
        let (vault, _) = vault_with_store();
        let err = vault
            .store(&Owner::user("u1"), 1, "  ", WriteMode::Upsert, "t")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
    }
}
