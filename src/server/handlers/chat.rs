//! # 对话转发处理器
//!
//! 请求体 `{user_id, provider, contents[]}`，响应为分块的 NDJSON 流，
//! 每行一个 `{"message": "..."}` 片段。

use axum::Extension;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::Response;
use serde_json::Value;

use super::parse_json;
use crate::error::{GatewayError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::lwarn;
use crate::relay::{RelayRequest, parse_turns};
use crate::server::AppState;
use crate::server::middleware::{AuthContext, RequestId};

/// NDJSON 内容类型
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

fn required_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| GatewayError::validation_field(format!("{field} is required"), field))
}

/// 解析请求体并检查调用者身份
fn relay_request(payload: &Value, session: &AuthContext) -> Result<RelayRequest> {
    let user_id = required_str(payload, "user_id")?;
    let turns = parse_turns(payload.get("contents"))?;
    let provider = required_str(payload, "provider")?;

    // 管理员可以代表其他用户发起对话
    if user_id != session.user_id() && !session.is_admin() {
        return Err(GatewayError::authorization(
            "user_id does not match the session subject",
        ));
    }

    Ok(RelayRequest {
        caller_id: user_id.to_string(),
        provider: provider.to_string(),
        turns,
    })
}

/// 流式对话
pub async fn chat(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    session: AuthContext,
    body: Bytes,
) -> Result<Response> {
    let payload: Value = parse_json(&body)?;
    let request = relay_request(&payload, &session).inspect_err(|err| {
        if matches!(err, GatewayError::Authorization { .. }) {
            lwarn!(
                request_id,
                LogStage::Authorization,
                LogComponent::Relay,
                "chat",
                format!("拒绝代他人发起对话 session={}", session.user_id())
            );
        }
    })?;

    let stream = state.relay.open(request, &request_id).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(stream.into_body())
        .map_err(|e| GatewayError::internal_with_source("failed to build stream response", e))
}
