//! # 凭据类型定义

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 默认凭据的所有者标记
pub const DEFAULT_OWNER: &str = "default";

/// 凭据所有者：某个用户，或服务商默认
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    User(String),
    Default,
}

impl Owner {
    /// 用户所有者
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    /// 存储层使用的键
    #[must_use]
    pub fn as_key(&self) -> &str {
        match self {
            Self::User(id) => id,
            Self::Default => DEFAULT_OWNER,
        }
    }

    /// 从存储层键还原
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        if key == DEFAULT_OWNER {
            Self::Default
        } else {
            Self::User(key.to_string())
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

/// 加密凭据记录。密文与 IV 均为 Base64。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSecretRecord {
    pub owner: Owner,
    pub provider_id: i32,
    pub ciphertext: String,
    pub iv: String,
    pub updated_at: DateTime<Utc>,
}

/// 写入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// 已存在则冲突
    Create,
    /// 不存在则报未找到
    Update,
    /// 总是写入
    Upsert,
}

/// 解密后的服务商密钥，`Debug` 不输出内容
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSecret(String);

impl ProviderSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// 明文，仅用于构造上游请求
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// 掩码展示：保留末尾 4 个字符
    #[must_use]
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len().max(4));
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{tail}", "*".repeat(8))
    }
}

impl fmt::Debug for ProviderSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProviderSecret(<redacted>)")
    }
}

/// 回退到默认凭据的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// 用户没有记录
    Missing,
    /// 用户记录无法解密
    Undecryptable,
}

/// 凭据解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// 使用用户自己的密钥
    Found(ProviderSecret),
    /// 使用服务商默认密钥
    FellBackToDefault {
        secret: ProviderSecret,
        reason: FallbackReason,
    },
    /// 用户与默认密钥都不可用
    NotFound,
}

impl Resolution {
    /// 可用的密钥
    #[must_use]
    pub const fn secret(&self) -> Option<&ProviderSecret> {
        match self {
            Self::Found(secret) | Self::FellBackToDefault { secret, .. } => Some(secret),
            Self::NotFound => None,
        }
    }

    /// 解析路径名称
    #[must_use]
    pub const fn source(&self) -> &'static str {
        match self {
            Self::Found(_) => "user",
            Self::FellBackToDefault { .. } => "default",
            Self::NotFound => "none",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_keys() {
        assert_eq!(Owner::Default.as_key(), "default");
        assert_eq!(Owner::from_key("default"), Owner::Default);
        assert_eq!(Owner::from_key("u-1"), Owner::user("u-1"));
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = ProviderSecret::new("sk-abcdefghijklmnop");
        assert_eq!(format!("{secret:?}"), "ProviderSecret(<redacted>)");
        assert_eq!(secret.masked(), "********mnop");
        assert_eq!(ProviderSecret::new("abc").masked(), "****");
    }
}
