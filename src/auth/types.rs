//! # 认证类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::permissions::UserRole;

/// 令牌签发者
pub const TOKEN_ISSUER: &str = "ai-gateway";

/// 会话中的用户身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// 用户ID
    pub id: String,
    /// 显示名称
    pub name: String,
    /// 邮箱
    pub email: String,
    /// 角色
    pub role: UserRole,
}

/// 令牌种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// 短期访问令牌
    Access,
    /// 长期刷新令牌
    Refresh,
}

impl TokenKind {
    /// 令牌受众
    #[must_use]
    pub const fn audience(self) -> &'static str {
        match self {
            Self::Access => "ai-gateway-access",
            Self::Refresh => "ai-gateway-refresh",
        }
    }
}

/// JWT 载荷。每次签发或刷新都会生成新值，创建后不再修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// 用户ID
    pub sub: String,
    /// 显示名称
    pub name: String,
    /// 邮箱
    pub email: String,
    /// 角色
    pub role: UserRole,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
    /// 签发者
    pub iss: String,
    /// 受众
    pub aud: String,
    /// JWT ID
    pub jti: String,
}

impl SessionClaims {
    /// 以指定时间为起点创建载荷
    #[must_use]
    pub fn new(
        identity: &SessionIdentity,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> Self {
        let iat = issued_at.timestamp();
        Self {
            sub: identity.id.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: identity.role,
            iat,
            exp: iat + ttl_seconds,
            iss: TOKEN_ISSUER.to_string(),
            aud: kind.audience().to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// 提取身份信息
    #[must_use]
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            id: self.sub.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }

    /// 有效期（秒）
    #[must_use]
    pub const fn lifetime_seconds(&self) -> i64 {
        self.exp - self.iat
    }
}
