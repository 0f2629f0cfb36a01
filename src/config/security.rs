//! # 安全配置
//!
//! 三个密钥只从环境变量读取，启动时校验一次，之后不可变。

use std::fmt;

use crate::cipher::{KEY_LEN, SecretCipher};
use crate::error::{GatewayError, Result};

/// 访问令牌签名密钥
pub const ACCESS_TOKEN_SECRET_ENV: &str = "ACCESS_TOKEN_SECRET";
/// 刷新令牌签名密钥
pub const REFRESH_TOKEN_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";
/// 服务商密钥加密密钥（64 位十六进制）
pub const SECRET_ENCRYPTION_KEY_ENV: &str = "SECRET_ENCRYPTION_KEY";

/// 访问令牌有效期：15 分钟
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
/// 刷新令牌有效期：7 天
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// 安全配置
#[derive(Clone)]
pub struct SecurityConfig {
    access_token_secret: String,
    refresh_token_secret: String,
    encryption_key: [u8; KEY_LEN],
    /// 访问令牌有效期（秒）
    pub access_token_ttl_secs: i64,
    /// 刷新令牌有效期（秒）
    pub refresh_token_ttl_secs: i64,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("access_token_secret", &"<redacted>")
            .field("refresh_token_secret", &"<redacted>")
            .field("encryption_key", &"<redacted>")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .finish()
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(GatewayError::config(format!("{name} must be set and non-empty"))),
    }
}

impl SecurityConfig {
    /// 直接构造（测试与嵌入场景）
    pub fn new(
        access_token_secret: impl Into<String>,
        refresh_token_secret: impl Into<String>,
        encryption_key_hex: &str,
    ) -> Result<Self> {
        let access_token_secret = access_token_secret.into();
        let refresh_token_secret = refresh_token_secret.into();

        if access_token_secret.trim().is_empty() || refresh_token_secret.trim().is_empty() {
            return Err(GatewayError::config("token secrets must not be empty"));
        }
        crate::ensure_config!(
            access_token_secret != refresh_token_secret,
            "{} and {} must differ",
            ACCESS_TOKEN_SECRET_ENV,
            REFRESH_TOKEN_SECRET_ENV
        );

        let key_hex = encryption_key_hex.trim();
        if key_hex.len() != KEY_LEN * 2 {
            return Err(GatewayError::config(format!(
                "{SECRET_ENCRYPTION_KEY_ENV} must be {} hex characters",
                KEY_LEN * 2
            )));
        }
        let key_bytes = hex::decode(key_hex).map_err(|e| {
            GatewayError::config_with_source(format!("{SECRET_ENCRYPTION_KEY_ENV} is not valid hex"), e)
        })?;
        let encryption_key: [u8; KEY_LEN] = key_bytes
            .try_into()
            .map_err(|_| GatewayError::config(format!("{SECRET_ENCRYPTION_KEY_ENV} must decode to 32 bytes")))?;

        Ok(Self {
            access_token_secret,
            refresh_token_secret,
            encryption_key,
            access_token_ttl_secs: ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: REFRESH_TOKEN_TTL_SECS,
        })
    }

    /// 通过查找函数读取三个密钥
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access = required(&lookup, ACCESS_TOKEN_SECRET_ENV)?;
        let refresh = required(&lookup, REFRESH_TOKEN_SECRET_ENV)?;
        let key = required(&lookup, SECRET_ENCRYPTION_KEY_ENV)?;
        Self::new(access, refresh, &key)
    }

    /// 从进程环境变量读取
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    #[must_use]
    pub fn access_token_secret(&self) -> &str {
        &self.access_token_secret
    }

    #[must_use]
    pub fn refresh_token_secret(&self) -> &str {
        &self.refresh_token_secret
    }

    /// 根据加密密钥创建加密器
    #[must_use]
    pub fn cipher(&self) -> SecretCipher {
        SecretCipher::new(&self.encryption_key)
    }
}
