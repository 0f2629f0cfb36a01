//! # 错误类型定义

use axum::http::StatusCode;
use thiserror::Error;

use super::ErrorCategory;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 配置相关错误
    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 数据库相关错误
    #[error("database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 访问令牌缺失、无效或过期
    #[error("authentication failed: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 会话有效但角色不足
    #[error("forbidden: {message}")]
    Authorization { message: String },

    /// 刷新令牌缺失或无效
    #[error("refresh rejected: {message}")]
    RefreshRejected { message: String },

    /// 资源不存在
    #[error("{resource_type} not found: {identifier}")]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    /// 资源冲突（重复创建）
    #[error("{resource_type} already exists: {identifier}")]
    Conflict {
        resource_type: String,
        identifier: String,
    },

    /// 请求体格式错误
    #[error("invalid request: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// 用户密钥与默认密钥均不可用
    #[error("no credential available for provider {provider}")]
    NoCredential { provider: String },

    /// 密文无法解密（错误密钥、截断或篡改）
    #[error("decryption failed: {message}")]
    Decryption {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 上游服务商调用失败
    #[error("upstream provider {provider} failed: {message}")]
    Upstream {
        message: String,
        provider: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("io error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 附加上下文的错误
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<GatewayError>,
    },
}

impl GatewayError {
    /// 将错误转换为HTTP状态码和错误代码
    #[must_use]
    pub fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::Database { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            Self::Authentication { .. } => (StatusCode::UNAUTHORIZED, "AUTHENTICATION_ERROR"),
            Self::Authorization { .. } => (StatusCode::FORBIDDEN, "AUTHORIZATION_ERROR"),
            Self::RefreshRejected { .. } => (StatusCode::FORBIDDEN, "REFRESH_REJECTED"),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND"),
            Self::Conflict { .. } => (StatusCode::CONFLICT, "RESOURCE_CONFLICT"),
            Self::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::NoCredential { .. } => (StatusCode::FORBIDDEN, "NO_CREDENTIAL"),
            Self::Decryption { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "DECRYPTION_ERROR"),
            Self::Upstream { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_ERROR"),
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Self::Context { source, .. } => source.to_http_response_parts(),
        }
    }

    /// 错误分类，用于日志与告警
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        if self.to_http_response_parts().0.is_server_error() {
            ErrorCategory::Server
        } else {
            ErrorCategory::Client
        }
    }

    /// 可返回给调用方的消息。服务端错误只返回通用描述，细节写入日志。
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.category() {
            ErrorCategory::Client => match self {
                Self::Context { source, .. } => source.public_message(),
                other => other.to_string(),
            },
            ErrorCategory::Server => match self.to_http_response_parts().1 {
                "UPSTREAM_ERROR" => "upstream provider request failed".to_string(),
                _ => "internal server error".to_string(),
            },
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建数据库错误
    pub fn database<T: Into<String>>(message: T) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的数据库错误
    pub fn database_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建认证错误
    pub fn authentication<T: Into<String>>(message: T) -> Self {
        Self::Authentication {
            message: message.into(),
            source: None,
        }
    }

    /// 创建授权错误
    pub fn authorization<T: Into<String>>(message: T) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// 创建刷新拒绝错误
    pub fn refresh_rejected<T: Into<String>>(message: T) -> Self {
        Self::RefreshRejected {
            message: message.into(),
        }
    }

    /// 创建资源未找到错误
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, identifier: I) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
        }
    }

    /// 创建资源冲突错误
    pub fn conflict<R: Into<String>, I: Into<String>>(resource_type: R, identifier: I) -> Self {
        Self::Conflict {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
        }
    }

    /// 创建请求校验错误
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// 创建指定字段的校验错误
    pub fn validation_field<T: Into<String>, F: Into<String>>(message: T, field: F) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// 创建无可用凭据错误
    pub fn no_credential<T: Into<String>>(provider: T) -> Self {
        Self::NoCredential {
            provider: provider.into(),
        }
    }

    /// 创建带来源的上游错误
    pub fn upstream_with_source<T: Into<String>, P: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        provider: P,
        source: E,
    ) -> Self {
        Self::Upstream {
            message: message.into(),
            provider: provider.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: "file or socket operation failed".to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("failed to parse TOML configuration", err)
    }
}

impl From<sea_orm::error::DbErr> for GatewayError {
    fn from(err: sea_orm::error::DbErr) -> Self {
        Self::database_with_source("database operation failed", err)
    }
}

impl From<bcrypt::BcryptError> for GatewayError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::internal_with_source("password hashing failed", err)
    }
}

impl From<crate::cipher::CipherError> for GatewayError {
    fn from(err: crate::cipher::CipherError) -> Self {
        use crate::cipher::CipherError;
        match err {
            CipherError::InvalidKey(_) => Self::config_with_source("invalid encryption key", err),
            CipherError::Encryption | CipherError::IvExhausted => {
                Self::internal_with_source("secret encryption failed", err)
            }
            _ => Self::Decryption {
                message: "stored secret could not be decrypted".to_string(),
                source: Some(err.into()),
            },
        }
    }
}

impl From<crate::auth::jwt::TokenError> for GatewayError {
    fn from(err: crate::auth::jwt::TokenError) -> Self {
        use crate::auth::jwt::TokenError;
        match err {
            TokenError::Encoding(_) => Self::internal_with_source("token signing failed", err),
            // 库错误文本只保留在 source 中
            _ => Self::Authentication {
                message: err.public_reason().to_string(),
                source: Some(err.into()),
            },
        }
    }
}
