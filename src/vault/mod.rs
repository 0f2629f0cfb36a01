//! # 凭据保险库模块
//!
//! 服务商密钥静态加密存储，按 (owner, provider) 解析。

pub mod database;
pub mod service;
pub mod store;
pub mod types;

pub use database::DatabaseCredentialStore;
pub use service::CredentialVault;
pub use store::{CredentialStore, MemoryCredentialStore};
pub use types::{
    DEFAULT_OWNER, EncryptedSecretRecord, FallbackReason, Owner, ProviderSecret, Resolution,
    WriteMode,
};
