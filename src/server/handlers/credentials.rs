//! # 凭据处理器
//!
//! 会话主体即凭据所有者。响应中只返回掩码后的密钥。

use axum::Extension;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};

use super::parse_json;
use crate::error::{GatewayError, Result};
use crate::server::AppState;
use crate::server::middleware::{AuthContext, RequestId};
use crate::server::response;
use crate::vault::{FallbackReason, Owner, ProviderSecret, Resolution, WriteMode};

/// 写入凭据请求
#[derive(Debug, Deserialize)]
pub struct CredentialRequest {
    pub provider: String,
    pub secret: String,
}

/// 凭据视图
#[derive(Debug, Serialize)]
pub struct CredentialView {
    pub provider: String,
    /// `user` 或 `default`
    pub source: &'static str,
    pub masked_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

/// 删除结果
#[derive(Debug, Serialize)]
pub struct RemovedCredential {
    pub provider: String,
    pub removed: bool,
}

async fn write(
    state: &AppState,
    session: &AuthContext,
    request_id: &str,
    body: &[u8],
    mode: WriteMode,
) -> Result<CredentialView> {
    let request: CredentialRequest = parse_json(body)?;
    let provider = state.providers.require(&request.provider).await?;
    state
        .vault
        .store(
            &Owner::user(session.user_id()),
            provider.id,
            &request.secret,
            mode,
            request_id,
        )
        .await?;

    Ok(CredentialView {
        provider: provider.name,
        source: "user",
        masked_secret: ProviderSecret::new(request.secret).masked(),
        fallback_reason: None,
    })
}

/// 新建凭据：已存在返回 409
pub async fn create_credential(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    session: AuthContext,
    body: Bytes,
) -> Result<Response> {
    let view = write(&state, &session, &request_id, &body, WriteMode::Create).await?;
    Ok(response::created(view))
}

/// 替换凭据：不存在返回 404
pub async fn update_credential(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    session: AuthContext,
    body: Bytes,
) -> Result<Response> {
    let view = write(&state, &session, &request_id, &body, WriteMode::Update).await?;
    Ok(response::success(view))
}

/// 查询当前会话对某服务商实际使用的凭据
pub async fn get_credential(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    session: AuthContext,
    Path(provider): Path<String>,
) -> Result<Response> {
    let provider = state.providers.require(&provider).await?;
    let resolution = state
        .vault
        .resolve(&Owner::user(session.user_id()), provider.id, &request_id)
        .await?;

    let fallback_reason = match &resolution {
        Resolution::FellBackToDefault { reason, .. } => Some(*reason),
        _ => None,
    };
    let Some(secret) = resolution.secret() else {
        return Err(GatewayError::not_found("credential", provider.name));
    };

    Ok(response::success(CredentialView {
        provider: provider.name,
        source: resolution.source(),
        masked_secret: secret.masked(),
        fallback_reason,
    }))
}

/// 删除当前会话的凭据；不存在时同样返回 200
pub async fn delete_credential(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    session: AuthContext,
    Path(provider): Path<String>,
) -> Result<Response> {
    let provider = state.providers.require(&provider).await?;
    let removed = state
        .vault
        .remove(&Owner::user(session.user_id()), provider.id, &request_id)
        .await?;

    Ok(response::success(RemovedCredential {
        provider: provider.name,
        removed,
    }))
}
