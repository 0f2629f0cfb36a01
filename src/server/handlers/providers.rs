//! # 服务商处理器

use axum::Extension;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;

use super::parse_json;
use crate::error::{GatewayError, Result};
use crate::provider::ProviderKind;
use crate::server::AppState;
use crate::server::middleware::RequestId;
use crate::server::response;

/// 创建服务商请求
#[derive(Debug, Deserialize)]
pub struct CreateProviderRequest {
    pub name: String,
    pub default_secret: String,
    /// 协议类型；省略时按名称推断
    #[serde(default)]
    pub kind: Option<String>,
}

impl CreateProviderRequest {
    fn kind(&self) -> Result<ProviderKind> {
        match self.kind.as_deref() {
            Some(kind) => kind.parse(),
            None => ProviderKind::parse(&self.name).ok_or_else(|| {
                GatewayError::validation_field(
                    format!("cannot infer provider kind from name '{}'", self.name.trim()),
                    "kind",
                )
            }),
        }
    }
}

/// 列出服务商
pub async fn list_providers(State(state): State<AppState>) -> Result<Response> {
    let providers = state.providers.list().await?;
    Ok(response::success(providers))
}

/// 创建服务商并保存默认密钥（仅管理员）
pub async fn create_provider(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Response> {
    let request: CreateProviderRequest = parse_json(&body)?;
    let kind = request.kind()?;
    let descriptor = state
        .providers
        .register(&request.name, kind, &request.default_secret, &request_id)
        .await?;
    Ok(response::created(descriptor))
}
