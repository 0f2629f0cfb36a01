//! # HTTP 处理器

pub mod auth;
pub mod chat;
pub mod credentials;
pub mod providers;
pub mod system;

use serde::de::DeserializeOwned;

use crate::error::{GatewayError, Result};

/// 解析 JSON 请求体；格式错误或缺少字段一律按 400 处理
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    crate::ensure_valid!(!body.is_empty(), "request body is required");
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::validation(format!("malformed request body: {e}")))
}
